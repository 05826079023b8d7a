use thiserror::Error;

#[derive(Error, Debug)]
pub enum SegmentationError {
    #[error("Stage '{stage}' expected {expected} input, got {found}")]
    UnexpectedInput {
        stage: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Stage '{stage}' reads attribute '{attribute}' but nothing delivered it")]
    MissingAttribute { stage: String, attribute: String },

    #[error("Filter '{stage}' returned a mask of {mask_len} entries for {segment_count} segments")]
    FilterMaskMismatch {
        stage: String,
        mask_len: usize,
        segment_count: usize,
    },

    #[error("A stage named '{0}' is already part of this stack")]
    DuplicateStage(String),

    #[error("Stack '{stack}' has no stage with id {stage}")]
    UnknownStage { stack: String, stage: usize },

    #[error("Invalid configuration for '{parameter}': {reason}")]
    Configuration { parameter: String, reason: String },

    #[error("Segment {column} value {value} does not fit in 16 bits")]
    OutOfRange { column: &'static str, value: i64 },

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to load image: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl SegmentationError {
    pub(crate) fn config(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Invalid parameters or values that cannot be represented. Fatal, never clamped.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::OutOfRange { .. } | Self::UnsupportedFormat(_)
        )
    }

    /// Wiring defects in how the pipeline was assembled.
    pub fn is_programming(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedInput { .. }
                | Self::MissingAttribute { .. }
                | Self::FilterMaskMismatch { .. }
                | Self::DuplicateStage(_)
                | Self::UnknownStage { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SegmentationError>;
