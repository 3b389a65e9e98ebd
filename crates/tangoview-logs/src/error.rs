use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// A row index outside the current filtered view; the caller is working
    /// from a stale row count
    #[error("row {row} out of range for view of {rows} rows")]
    OutOfRange { row: usize, rows: usize },

    #[error("memory probe failed: {0}")]
    Probe(String),

    #[error("gc hint failed: {0}")]
    GcHint(String),

    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
