use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiskMapError {
    #[error("Invalid disk map character {character:?} at offset {offset}")]
    Parse { character: char, offset: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Block list invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Step limit of {0} reached before compaction finished")]
    StepLimitReached(u64),

    #[error("Unknown compaction policy: {0} (expected fragment or whole-file)")]
    UnknownPolicy(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DiskMapError {
    /// True for malformed disk map input
    pub fn is_parse_error(&self) -> bool {
        matches!(self, DiskMapError::Parse { .. })
    }
}

pub type Result<T> = std::result::Result<T, DiskMapError>;
