use cage_traits::TagId;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum CageError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("timeout waiting for sensor")]
    Timeout,
    #[error("tag {0} is not in the registry")]
    UnknownTag(TagId),
    #[error("no weight samples within [{lower_g}, {upper_g}] g")]
    NoWeightData { lower_g: f32, upper_g: f32 },
    #[error("registry {path}: {msg}")]
    Registry { path: String, msg: String },
    #[error("io error: {0}")]
    Io(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    State(String),
}

impl From<std::io::Error> for CageError {
    fn from(e: std::io::Error) -> Self {
        CageError::Io(e.to_string())
    }
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing presence sensor")]
    MissingPresence,
    #[error("missing tag reader")]
    MissingReader,
    #[error("missing scale")]
    MissingScale,
    #[error("missing touch sensor")]
    MissingTouch,
    #[error("missing water dispenser")]
    MissingWater,
    #[error("missing drug dispenser")]
    MissingDrug,
    #[error("missing animal registry")]
    MissingRegistry,
    #[error("missing event recorder")]
    MissingRecorder,
}

pub type Result<T> = std::result::Result<T, CageError>;
pub use eyre::Report;
