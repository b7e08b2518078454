use thiserror::Error;

/// Error type for invalid operations.
#[derive(Error, Debug)]
pub enum PvError {
    #[error("No data found for year {year}{}", panel_suffix(.panel))]
    NotFound { year: i64, panel: Option<String> },
    #[error("Required constant '{0}' is missing")]
    MissingField(String),
    #[error("Unknown unit '{0}'. Expected one of kg, wafer, cell, module, Wp")]
    UnknownUnit(String),
    #[error("Required column '{0}' is missing")]
    MissingColumn(String),
    #[error("Invalid value '{value}' in column '{column}'")]
    InvalidValue { column: String, value: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

fn panel_suffix(panel: &Option<String>) -> String {
    match panel {
        Some(p) => format!(" and solar_panel='{p}'"),
        None => String::new(),
    }
}

/// Convenience type for `Result<T, PvError>`.
pub type PvResult<T> = Result<T, PvError>;
