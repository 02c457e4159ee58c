use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logs: LogConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    #[serde(default = "default_jwt_secret")]
    pub secret: String,
    #[serde(default)]
    pub previous_secrets: Vec<String>,
    #[serde(default = "default_access_token_expire")]
    pub access_token_expire_minutes: u64,
    #[serde(default = "default_refresh_token_expire")]
    pub refresh_token_expire_days: u64,
    #[serde(default)]
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_local_path")]
    pub local_path: String,
    /// Prefix for public object URLs; objects are served from `/media`.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

/// Upload ceilings, in bytes
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,
    #[serde(default = "default_max_video_bytes")]
    pub max_video_bytes: u64,
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default = "default_prune_interval")]
    pub prune_interval_hours: u64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    /// Accounts registering with one of these addresses get the admin role
    #[serde(default)]
    pub admin_emails: Vec<String>,
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_db_path() -> String {
    "data/lectern.db".to_string()
}

fn default_jwt_secret() -> String {
    "change-me-lectern-secret".to_string()
}

fn default_access_token_expire() -> u64 {
    15
}

fn default_refresh_token_expire() -> u64 {
    7
}

fn default_local_path() -> String {
    "data/media".to_string()
}

fn default_public_base_url() -> String {
    "/media".to_string()
}

fn default_max_image_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_max_video_bytes() -> u64 {
    25 * 1024 * 1024
}

fn default_max_attachment_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_retention_days() -> u32 {
    90
}

fn default_prune_interval() -> u64 {
    24
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: default_jwt_secret(),
            previous_secrets: Vec::new(),
            access_token_expire_minutes: default_access_token_expire(),
            refresh_token_expire_days: default_refresh_token_expire(),
            cookie_secure: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            local_path: default_local_path(),
            public_base_url: default_public_base_url(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: default_max_image_bytes(),
            max_video_bytes: default_max_video_bytes(),
            max_attachment_bytes: default_max_attachment_bytes(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            prune_interval_hours: default_prune_interval(),
        }
    }
}

impl AuthConfig {
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|e| e.trim().eq_ignore_ascii_case(email.trim()))
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides();
        config.ensure_directories()?;
        config.ensure_jwt_secret()?;
        tracing::info!(
            "Storage at {} served under {}, cache ttl {}s",
            config.storage.local_path,
            config.storage.public_base_url,
            config.cache.ttl_secs
        );
        Ok(config)
    }

    /// Replace a default/empty JWT secret with a generated one persisted on disk
    fn ensure_jwt_secret(&mut self) -> anyhow::Result<()> {
        if self.jwt.secret == default_jwt_secret() || self.jwt.secret.is_empty() {
            let secret_path = Path::new("data/.jwt_secret");

            if secret_path.exists() {
                let secret = fs::read_to_string(secret_path)?;
                self.jwt.secret = secret.trim().to_string();
                tracing::info!("Loaded persisted JWT secret from data/.jwt_secret");
            } else {
                let secret = format!("{}{}", uuid::Uuid::new_v4(), uuid::Uuid::new_v4());

                if let Some(parent) = secret_path.parent() {
                    fs::create_dir_all(parent)?;
                }

                fs::write(secret_path, &secret)?;
                self.jwt.secret = secret;
                tracing::info!("Generated and persisted new JWT secret to data/.jwt_secret");
            }
        }
        Ok(())
    }

    /// Load configuration from the first TOML file found
    fn load_from_file() -> anyhow::Result<Self> {
        let config_paths = ["conf.toml", "config.toml", "data/conf.toml", "data/config.toml"];

        for path in config_paths {
            if Path::new(path).exists() {
                let content = fs::read_to_string(path)?;
                let config: Config = toml::from_str(&content)?;
                tracing::info!("Loaded configuration from {}", path);
                return Ok(config);
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Config::default())
    }

    /// Apply environment variable overrides
    /// Format: LT_CONF_<SECTION>_<KEY>
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("LT_CONF_SERVER_HOST") {
            self.server.host = val;
        }
        override_parsed("LT_CONF_SERVER_PORT", &mut self.server.port);

        if let Ok(val) = env::var("LT_CONF_DATABASE_PATH") {
            self.database.path = val;
        }

        if let Ok(val) = env::var("LT_CONF_JWT_SECRET") {
            self.jwt.secret = val;
        }
        if let Ok(val) = env::var("LT_CONF_JWT_PREVIOUS_SECRETS") {
            self.jwt.previous_secrets = split_list(&val);
        }
        override_parsed("LT_CONF_JWT_ACCESS_EXPIRE", &mut self.jwt.access_token_expire_minutes);
        override_parsed("LT_CONF_JWT_REFRESH_EXPIRE", &mut self.jwt.refresh_token_expire_days);
        override_parsed("LT_CONF_JWT_COOKIE_SECURE", &mut self.jwt.cookie_secure);

        if let Ok(val) = env::var("LT_CONF_STORAGE_LOCAL_PATH") {
            self.storage.local_path = val;
        }
        if let Ok(val) = env::var("LT_CONF_STORAGE_PUBLIC_BASE_URL") {
            self.storage.public_base_url = val;
        }

        override_parsed("LT_CONF_UPLOADS_MAX_IMAGE_BYTES", &mut self.uploads.max_image_bytes);
        override_parsed("LT_CONF_UPLOADS_MAX_VIDEO_BYTES", &mut self.uploads.max_video_bytes);
        override_parsed(
            "LT_CONF_UPLOADS_MAX_ATTACHMENT_BYTES",
            &mut self.uploads.max_attachment_bytes,
        );

        override_parsed("LT_CONF_CACHE_TTL_SECS", &mut self.cache.ttl_secs);

        override_parsed("LT_CONF_LOGS_RETENTION_DAYS", &mut self.logs.retention_days);
        override_parsed("LT_CONF_LOGS_PRUNE_INTERVAL_HOURS", &mut self.logs.prune_interval_hours);

        if let Ok(val) = env::var("LT_CONF_AUTH_ADMIN_EMAILS") {
            self.auth.admin_emails = split_list(&val);
        }
    }

    /// Ensure required directories exist
    fn ensure_directories(&self) -> anyhow::Result<()> {
        if let Some(parent) = Path::new(&self.database.path).parent() {
            fs::create_dir_all(parent)?;
        }

        fs::create_dir_all(&self.storage.local_path)?;

        Ok(())
    }
}

fn override_parsed<T: std::str::FromStr>(key: &str, target: &mut T) {
    if let Ok(val) = env::var(key) {
        match val.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!("Ignoring unparsable value for {}: {}", key, val),
        }
    }
}

fn split_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9000

            [uploads]
            max_video_bytes = 1048576

            [auth]
            admin_emails = ["Owner@Example.com"]
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.uploads.max_video_bytes, 1_048_576);
        assert_eq!(config.uploads.max_image_bytes, 5 * 1024 * 1024);
        assert_eq!(config.cache.ttl_secs, 300);
        assert!(config.auth.is_admin_email("owner@example.com"));
        assert!(!config.auth.is_admin_email("someone@example.com"));
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" a, ,b "), vec!["a".to_string(), "b".to_string()]);
    }
}
