pub mod t64;
pub mod varint;

pub use t64::{OutOfRange, T64};
pub use varint::DecodeError;
