//! Environment/runtime helpers
//!
//! Sanity checks run once at startup, before any Google client is built.

use tracing::warn;

/// Ensure the service-account key file is readable when one is configured.
///
/// A missing file is only a warning when inline credentials are present in
/// `GOOGLE_CREDENTIALS_JSON`; otherwise it is an error.
pub async fn ensure_credentials(path: &str) -> Result<(), String> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(format!("credentials path {path} is not a file")),
        Err(e) => {
            if std::env::var("GOOGLE_CREDENTIALS_JSON").is_ok() {
                warn!(%path, "credentials file not found; using GOOGLE_CREDENTIALS_JSON");
                Ok(())
            } else {
                Err(format!("cannot read credentials file {path}: {e}"))
            }
        }
    }
}
