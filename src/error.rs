use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FssError {
    #[error("Invalid key length: expected 16 bytes, got {actual}")]
    Configuration { actual: usize },

    #[error("Input size mismatch: expected {expected} bytes, got {actual}")]
    InputSize { expected: usize, actual: usize },

    #[error("Range size {range_size} exceeds the maximum of {max}")]
    DomainTooLarge { range_size: usize, max: usize },

    #[error("Key corrupted: expected {expected} bytes, got {actual}")]
    KeyCorruption { expected: usize, actual: usize },

    #[error("Key header mismatch on {field}: expected {expected}, got {actual}")]
    KeyHeaderMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Special indices are not strictly increasing at position {position}")]
    UnorderedInput { position: usize },

    #[error("Index {index} is outside the domain of size 2^{range_size}")]
    IndexOutOfDomain { index: u64, range_size: usize },

    #[error("Point count {points} not supported, expected 1..={max}")]
    PointCount { points: usize, max: usize },

    #[error("Keys do not form a pair: {field} differs")]
    KeyPairMismatch { field: &'static str },
}

pub type Result<T> = std::result::Result<T, FssError>;
