use serde::{Deserialize, Serialize};

/// Severity of a record. Wire ordinals are the declaration order and are
/// part of the storage format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Info,
    Warn,
    Debug,
    Error,
    Unknown,
    Message,
}

impl Level {
    pub const ALL: [Level; 6] = [
        Level::Info,
        Level::Warn,
        Level::Debug,
        Level::Error,
        Level::Unknown,
        Level::Message,
    ];

    #[inline]
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(v: u64) -> Option<Level> {
        Level::ALL.get(v as usize).copied()
    }
}

bitflags::bitflags! {
    /// Set of levels, used to post-filter query results.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LevelMask: u8 {
        const INFO = 1 << 0;
        const WARN = 1 << 1;
        const DEBUG = 1 << 2;
        const ERROR = 1 << 3;
        const UNKNOWN = 1 << 4;
        const MESSAGE = 1 << 5;
    }
}

impl LevelMask {
    pub fn of(level: Level) -> LevelMask {
        LevelMask::from_bits_truncate(1 << level.ordinal())
    }

    pub fn matches(self, level: Level) -> bool {
        self.intersects(LevelMask::of(level))
    }
}

impl FromIterator<Level> for LevelMask {
    fn from_iter<I: IntoIterator<Item = Level>>(iter: I) -> Self {
        iter.into_iter()
            .fold(LevelMask::empty(), |m, l| m | LevelMask::of(l))
    }
}

/// Which family a record belongs to. Part of the wire format and of the
/// sealed segment grouping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainKind {
    Log,
    Broker,
}

impl DomainKind {
    pub fn tag(self) -> u64 {
        match self {
            DomainKind::Log => 1,
            DomainKind::Broker => 2,
        }
    }

    pub fn from_tag(v: u64) -> Option<DomainKind> {
        match v {
            1 => Some(DomainKind::Log),
            2 => Some(DomainKind::Broker),
            _ => None,
        }
    }
}

/// Application-log specific fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogExtra {
    pub thread: String,
    pub service: String,
    pub service_version: String,
    pub logger: String,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub stack_trace: Option<String>,
}

/// Broker-message specific fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BrokerExtra {
    pub topic: String,
    #[serde(default)]
    pub key: Option<String>,
    pub offset: i64,
    pub partition: i32,
    /// All headers flattened into one string by the consumer.
    #[serde(default)]
    pub headers: String,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    /// Composite id assembled by the producer side.
    #[serde(default)]
    pub event_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Extra {
    Log(LogExtra),
    Broker(BrokerExtra),
}

impl Extra {
    pub fn domain(&self) -> DomainKind {
        match self {
            Extra::Log(_) => DomainKind::Log,
            Extra::Broker(_) => DomainKind::Broker,
        }
    }
}

/// A record as handed to `put`: everything but the sequence number, which
/// the store assigns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    /// Event time, milliseconds since the epoch.
    pub ts_ms: i64,
    pub level: Level,
    /// Short source label (pod name, topic consumer, ...).
    pub source: String,
    pub message: String,
    #[serde(default)]
    pub extra: Option<Extra>,
}

impl NewRecord {
    /// Records without an extra block group with the plain logs.
    pub fn domain(&self) -> DomainKind {
        self.extra
            .as_ref()
            .map_or(DomainKind::Log, Extra::domain)
    }
}

/// A stored record. `seq` doubles as the record's id everywhere: in the
/// index, in search results, and in `get`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub seq: u64,
    pub ts_ms: i64,
    pub level: Level,
    pub source: String,
    pub message: String,
    pub extra: Option<Extra>,
}

impl Record {
    pub fn domain(&self) -> DomainKind {
        self.extra
            .as_ref()
            .map_or(DomainKind::Log, Extra::domain)
    }

    /// The text the trigram index sees for this record.
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.source, self.message)
    }
}
