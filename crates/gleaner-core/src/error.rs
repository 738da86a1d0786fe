use thiserror::Error;

/// Application-wide error types for Gleaner.
#[derive(Error, Debug)]
pub enum AppError {
    /// The server answered with a non-success status code.
    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// Generic HTTP-layer failure (building the client, reading the body, ...).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    Network(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Invalid configuration for a single operation (e.g. empty multipart body).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cookie jar could not be read or written.
    #[error("Cookie jar error: {0}")]
    CookieJar(String),

    /// CSV serialization failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Filesystem error (attaching multipart files, writing downloads).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Returns true if this error came from the transport rather than from
    /// local configuration. Transport failures are always tolerable at the
    /// orchestrator level; configuration failures usually indicate a bug in
    /// the caller.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AppError::HttpStatus { .. }
                | AppError::Http(_)
                | AppError::Network(_)
                | AppError::Timeout(_)
        )
    }
}
