mod dict;
mod encode;
mod engine;
mod error;
mod frozen;
mod persist;
mod record;
mod segment;
mod store;
mod templates;
mod writer;

pub use engine::{EngineConfig, LogEngine, QueryOptions};
pub use error::StoreError;
pub use persist::{IMAGE_MAGIC, IMAGE_VERSION, open_image, write_image_atomic};
pub use record::{
    BrokerExtra, DomainKind, Extra, Level, LevelMask, LogExtra, NewRecord, Record,
};
pub use segment::{CHECKPOINT_STRIDE, ClusterSummary, SealedStorage, Segment};
pub use store::{RecordStore, Storage, StoreConfig};
pub use templates::{StoredTemplate, TemplateRegistry};
pub use writer::{PutHandle, SealHandle};
