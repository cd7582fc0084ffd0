use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header as JwtHeader};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::errors::ServiceError;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Tokens are refreshed this long before Google says they expire.
const REFRESH_MARGIN_SECS: i64 = 60;

/// The parts of a service-account key file this service needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String { DEFAULT_TOKEN_URI.to_string() }

impl ServiceAccount {
    pub fn from_json(input: &str) -> Result<Self, ServiceError> {
        serde_json::from_str(input).map_err(|e| ServiceError::Credentials(format!("invalid service account json: {e}")))
    }

    pub async fn from_file(path: &str) -> Result<Self, ServiceError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ServiceError::Credentials(format!("cannot read {path}: {e}")))?;
        Self::from_json(&content)
    }

    /// Prefer inline `GOOGLE_CREDENTIALS_JSON`, otherwise read the key file at `path`.
    pub async fn load(path: &str) -> Result<Self, ServiceError> {
        match std::env::var("GOOGLE_CREDENTIALS_JSON") {
            Ok(json) if !json.trim().is_empty() => Self::from_json(&json),
            _ => Self::from_file(path).await,
        }
    }

    /// Signed RS256 assertion for the JWT-bearer grant.
    pub fn signed_assertion(&self, scope: &str, now: DateTime<Utc>) -> Result<String, ServiceError> {
        let claims = self.claims(scope, now);
        let mut header = JwtHeader::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| ServiceError::Credentials(format!("invalid private key: {e}")))?;
        encode(&header, &claims, &key).map_err(|e| ServiceError::Credentials(format!("cannot sign assertion: {e}")))
    }

    fn claims<'a>(&'a self, scope: &'a str, now: DateTime<Utc>) -> JwtClaims<'a> {
        JwtClaims {
            iss: &self.client_email,
            scope,
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        }
    }
}

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 { 3600 }

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Exchanges service-account assertions for access tokens and caches the result.
///
/// Nothing is fetched until the first request needs a token; afterwards the
/// cached token is reused until it is about to expire.
pub struct TokenProvider {
    account: ServiceAccount,
    http: reqwest::Client,
    scope: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(account: ServiceAccount, http: reqwest::Client, scope: &str) -> Self {
        Self { account, http, scope: scope.to_string(), cached: Mutex::new(None) }
    }

    pub fn client_email(&self) -> &str { &self.account.client_email }

    #[instrument(skip(self), fields(client_email = %self.account.client_email))]
    pub async fn access_token(&self) -> Result<String, ServiceError> {
        // held across the refresh so concurrent callers wait for one exchange
        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(tok) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(tok.token.clone());
        }

        debug!("requesting access token");
        let assertion = self.account.signed_assertion(&self.scope, now)?;
        let resp = self
            .http
            .post(&self.account.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        let tok: TokenResponse = super::read_json(resp).await?;
        let fresh = CachedToken { token: tok.access_token, expires_at: now + Duration::seconds(tok.expires_in) };
        info!(expires_at = %fresh.expires_at, "access token refreshed");
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> ServiceAccount {
        ServiceAccount::from_json(
            r#"{
                "type": "service_account",
                "project_id": "demo",
                "private_key_id": "kid-1",
                "private_key": "not-a-key",
                "client_email": "sheets@demo.iam.gserviceaccount.com"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn key_file_defaults_token_uri() {
        let acct = account();
        assert_eq!(acct.token_uri, DEFAULT_TOKEN_URI);
        assert_eq!(acct.private_key_id.as_deref(), Some("kid-1"));
    }

    #[test]
    fn claims_span_one_hour() {
        let acct = account();
        let now = Utc::now();
        let claims = acct.claims("scope-a", now);
        assert_eq!(claims.iss, "sheets@demo.iam.gserviceaccount.com");
        assert_eq!(claims.aud, DEFAULT_TOKEN_URI);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn bad_private_key_is_a_credentials_error() {
        let err = account().signed_assertion(super::super::SCOPES, Utc::now()).unwrap_err();
        assert!(matches!(err, ServiceError::Credentials(_)));
    }

    #[test]
    fn malformed_key_file_is_rejected() {
        assert!(matches!(ServiceAccount::from_json("{}"), Err(ServiceError::Credentials(_))));
    }

    #[test]
    fn cached_token_expires_early() {
        let now = Utc::now();
        let tok = CachedToken { token: "t".into(), expires_at: now + Duration::seconds(90) };
        assert!(tok.is_fresh(now));
        assert!(!tok.is_fresh(now + Duration::seconds(31)));
    }
}
