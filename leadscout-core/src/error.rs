use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Could not write configuration: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Scanner error: {0}")]
    Scan(#[from] leadscout_scanner::ScanError),

    #[error("Invalid template: {0}")]
    Template(String),

    #[error("Mail setup error: {0}")]
    Mail(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
