use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid canvas dimensions: {width}x{height}")]
    InvalidDimensions { width: f64, height: f64 },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Template {id} is invalid: {reason}")]
    InvalidTemplate { id: u32, reason: String },
    #[error("Duplicate template id {0}")]
    DuplicateTemplateId(u32),
    #[error("Unknown template id {0}")]
    UnknownTemplate(u32),
    #[error("Rendering produced no image: {0}")]
    RenderFailed(String),
    #[error("Encoding error: {0}")]
    Encode(String),
    #[error("Entitlement check failed: {0}")]
    Entitlement(String),
}

pub type Result<T> = std::result::Result<T, CollageError>;
