use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Failures of the database, report and export layer.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Please select a .db database file: {0}")]
    NotADatabaseFile(String),

    #[error("The database is missing required tables (WL_MSG, Contact)")]
    MissingTables,

    #[error("Unable to read the database file: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("No group chats found in this database")]
    NoGroups,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON export failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures while turning a weighted term set into an image.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("No usable font found (tried: {0})")]
    FontUnavailable(String),

    #[error("Invalid font file {0}")]
    InvalidFont(String),

    #[error("Drawing failed: {0}")]
    Backend(String),

    #[error("PNG encoding failed: {0}")]
    Encode(String),
}

/// Malformed escape sequence in message text.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated \\{kind} escape at byte {offset}")]
    Truncated { kind: char, offset: usize },

    #[error("invalid code point in escape at byte {offset}")]
    InvalidCodePoint { offset: usize },
}
