use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    /// Anything the Google APIs (or the transport to them) reported. Carries the raw message.
    #[error("{0}")]
    Upstream(String),
    #[error("credentials error: {0}")]
    Credentials(String),
}

impl ServiceError {
    pub fn not_found(what: &str) -> Self { Self::NotFound(format!("{} not found", what)) }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self { Self::Upstream(e.to_string()) }
}
