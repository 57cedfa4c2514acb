use thiserror::Error;

#[derive(Error, Debug)]
pub enum MutationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Can't load module {path}: {reason}")]
    ModuleLoad { path: String, reason: String },

    #[error("Compilation of module {module} failed: {reason}")]
    Compile { module: String, reason: String },

    #[error("Can't build AST for {path}: {reason}")]
    SourceParse { path: String, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Mutation point {0} is already applied")]
    AlreadyApplied(String),

    #[error("Mutation point {0} is not applied")]
    NotApplied(String),

    #[error("Mutation point {0} does not match the instruction it addresses")]
    StaleMutationPoint(String),

    #[error("Module {module} does not recompile to its original object after reverting {point}")]
    RevertMismatch { module: String, point: String },

    #[error("Logger setup failed: {0}")]
    Logger(String),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Walkdir error: {0}")]
    Walkdir(#[from] walkdir::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MutationError>;
