use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IndexError {
    /// Mutation attempted on an index that has been converted to
    /// higher rank and is read-only from then on.
    #[error("index is sealed and read-only")]
    AlreadySealed,
}
