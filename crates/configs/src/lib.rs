use anyhow::Result;
use serde::Deserialize;
use anyhow::anyhow;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub google: GoogleConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port(), worker_threads: Some(4), max_upload_mb: default_max_upload_mb() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    #[serde(default)]
    pub spreadsheet_id: String,
    #[serde(default = "default_credentials_path")]
    pub credentials_path: String,
    #[serde(default)]
    pub drive_folder_id: Option<String>,
    #[serde(default = "default_sheet")]
    pub default_sheet: String,
    #[serde(default = "default_range")]
    pub default_range: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            credentials_path: default_credentials_path(),
            drive_folder_id: None,
            default_sheet: default_sheet(),
            default_range: default_range(),
        }
    }
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 3001 }
fn default_max_upload_mb() -> usize { 10 }
fn default_credentials_path() -> String { "serviceAccount.json".into() }
fn default_sheet() -> String { "Sheet1".into() }
fn default_range() -> String { "A1:M".into() }

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

pub fn parse(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Load `config.toml` (or `CONFIG_PATH`), falling back to defaults when the
    /// file is absent, then apply environment overrides and validate.
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = match load_default() {
            Ok(cfg) => cfg,
            Err(e) => match e.downcast_ref::<std::io::Error>() {
                Some(io) if io.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
                _ => return Err(e),
            },
        };
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.normalize_with(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::normalize_and_validate`] with an injectable env lookup.
    pub fn normalize_with<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.server.normalize(&env)?;
        self.google.normalize_from_env(&env);
        self.google.validate(&env)?;
        Ok(())
    }
}

impl ServerConfig {
    fn normalize<F: Fn(&str) -> Option<String>>(&mut self, env: &F) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = default_host();
        }
        if let Some(host) = env("SERVER_HOST") {
            self.host = host;
        }
        if let Some(port) = env("PORT").or_else(|| env("SERVER_PORT")) {
            self.port = port
                .trim()
                .parse::<u16>()
                .map_err(|_| anyhow!("PORT must be an integer in 1..=65535, got {port}"))?;
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be in 1..=65535"));
        }
        if let Some(w) = self.worker_threads {
            if w == 0 { self.worker_threads = Some(4); }
        } else {
            self.worker_threads = Some(4);
        }
        if self.max_upload_mb == 0 {
            self.max_upload_mb = default_max_upload_mb();
        }
        Ok(())
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }
}

impl GoogleConfig {
    pub fn normalize_from_env<F: Fn(&str) -> Option<String>>(&mut self, env: &F) {
        if let Some(id) = env("SPREADSHEET_ID") {
            self.spreadsheet_id = id;
        }
        if let Some(path) = env("GOOGLE_APPLICATION_CREDENTIALS") {
            self.credentials_path = path;
        }
        if let Some(folder) = env("DRIVE_FOLDER_ID") {
            self.drive_folder_id = Some(folder);
        }
        // an empty folder id means "upload to the drive root"
        if self.drive_folder_id.as_deref().is_some_and(|f| f.trim().is_empty()) {
            self.drive_folder_id = None;
        }
        if self.default_sheet.trim().is_empty() {
            self.default_sheet = default_sheet();
        }
        if self.default_range.trim().is_empty() {
            self.default_range = default_range();
        }
    }

    pub fn validate<F: Fn(&str) -> Option<String>>(&self, env: &F) -> Result<()> {
        if self.spreadsheet_id.trim().is_empty() {
            return Err(anyhow!("google.spreadsheet_id is empty; set it in config.toml or SPREADSHEET_ID"));
        }
        if self.credentials_path.trim().is_empty() && env("GOOGLE_CREDENTIALS_JSON").is_none() {
            return Err(anyhow!("no service account credentials; set google.credentials_path or GOOGLE_CREDENTIALS_JSON"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn parses_full_file() {
        let cfg = parse(
            r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            max_upload_mb = 4

            [google]
            spreadsheet_id = "abc"
            credentials_path = "/etc/sa.json"
            drive_folder_id = "folder-1"
            default_sheet = "Products"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.max_upload_bytes(), 4 * 1024 * 1024);
        assert_eq!(cfg.google.spreadsheet_id, "abc");
        assert_eq!(cfg.google.drive_folder_id.as_deref(), Some("folder-1"));
        assert_eq!(cfg.google.default_sheet, "Products");
        assert_eq!(cfg.google.default_range, "A1:M");
    }

    #[test]
    fn env_overrides_port_and_spreadsheet() {
        let mut cfg = AppConfig::default();
        cfg.normalize_with(env_of(&[("PORT", "9000"), ("SPREADSHEET_ID", "sheet-xyz")])).unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.google.spreadsheet_id, "sheet-xyz");
        assert_eq!(cfg.server.worker_threads, Some(4));
    }

    #[test]
    fn missing_spreadsheet_id_is_rejected() {
        let mut cfg = AppConfig::default();
        let err = cfg.normalize_with(env_of(&[])).unwrap_err();
        assert!(err.to_string().contains("spreadsheet_id"));
    }

    #[test]
    fn invalid_port_is_rejected() {
        let mut cfg = AppConfig::default();
        assert!(cfg.normalize_with(env_of(&[("PORT", "0"), ("SPREADSHEET_ID", "x")])).is_err());
        let mut cfg = AppConfig::default();
        assert!(cfg.normalize_with(env_of(&[("PORT", "http"), ("SPREADSHEET_ID", "x")])).is_err());
    }

    #[test]
    fn blank_drive_folder_means_root() {
        let mut cfg = AppConfig::default();
        cfg.normalize_with(env_of(&[("SPREADSHEET_ID", "x"), ("DRIVE_FOLDER_ID", "  ")])).unwrap();
        assert!(cfg.google.drive_folder_id.is_none());
    }
}
