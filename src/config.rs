use secrecy::Secret;
use serde::Deserialize;
use std::path::PathBuf;

/// 5 MiB, the largest proof document accepted at registration.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: Secret<String>,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,

    // Proof documents
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,

    // Security
    pub admin_token: Option<Secret<String>>,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 3000)?
            .set_default("database_max_connections", 10)?
            .set_default("upload_dir", "uploads/documents")?
            .set_default("max_upload_bytes", DEFAULT_MAX_UPLOAD_BYTES as u64)?
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        Ok(Self {
            database_url: Secret::new(config.get("database_url")?),
            database_max_connections: config.get("database_max_connections")?,
            host: config.get("host")?,
            port: config.get("port")?,

            upload_dir: PathBuf::from(config.get::<String>("upload_dir")?),
            max_upload_bytes: config.get("max_upload_bytes")?,

            admin_token: config
                .get::<String>("admin_token")
                .ok()
                .filter(|token| !token.trim().is_empty())
                .map(Secret::new),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
