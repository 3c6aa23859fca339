use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrintError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Printer offline: {0}")]
    Offline(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    /// The printer answered but refused the job.
    #[error("Printer rejected the job with status {0}")]
    Rejected(u16),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

pub type PrintResult<T> = Result<T, PrintError>;
