use thiserror::Error;

/// Rejected tuning or rate configuration. Raised once at construction, never
/// from the per-tick path.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} rate must be positive and finite, was {value}")]
    InvalidRate { name: &'static str, value: f32 },

    #[error("zero-below threshold must be in [0, 1), was {0}")]
    InvalidZeroBelow(f32),

    #[error("{name} must be in ({low}, {high}), was {value}")]
    OutOfRange {
        name: &'static str,
        value: f32,
        low: f32,
        high: f32,
    },

    #[error("{0} must be non-zero")]
    Zero(&'static str),
}

/// Failure to encode or decode the persisted settings record.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to encode settings record")]
    Encode,

    #[error("failed to decode settings record: {0}")]
    Decode(minicbor::decode::Error),

    #[error("unsupported settings version {0}")]
    Version(u8),
}
