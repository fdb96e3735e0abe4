use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;

#[derive(Debug, Clone, PartialEq)]
pub enum StorageConfig {
    Fs { root: String },
    S3 {
        endpoint: String,
        bucket: String,
        region: String,
        access_key_id: String,
        secret_access_key: String,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env_mode: String,
    pub listen_addr: SocketAddr,
    pub database_path: String,
    pub db_pool_size: u32,
    pub storage: StorageConfig,
    pub template_dir: Option<PathBuf>,
    pub system_fonts: bool,
    pub font_dir: Option<PathBuf>,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
    pub allowed_origins: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let storage = match get("STORAGE_BACKEND").unwrap_or_else(|| "fs".into()).as_str() {
            "fs" => StorageConfig::Fs { root: get("MEDIA_ROOT").unwrap_or_else(|| "media".into()) },
            "s3" => {
                let required = |key: &str| get(key).with_context(|| format!("{} must be set when STORAGE_BACKEND=s3", key));
                StorageConfig::S3 {
                    endpoint: required("OBJECT_STORAGE_ENDPOINT")?,
                    bucket: required("OBJECT_STORAGE_BUCKET")?,
                    region: required("OBJECT_STORAGE_REGION")?,
                    access_key_id: required("OBJECT_STORAGE_ACCESS_KEY_ID")?,
                    secret_access_key: required("OBJECT_STORAGE_SECRET_ACCESS_KEY")?,
                }
            }
            other => anyhow::bail!("Unknown STORAGE_BACKEND {:?} (expected fs or s3)", other),
        };

        Ok(Self {
            env_mode: get("RUST_ENV").unwrap_or_else(|| "development".into()),
            listen_addr: parse_or(&get, "LISTEN_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            database_path: get("DATABASE_PATH").unwrap_or_else(|| "cerfa_filler.sqlite3".into()),
            db_pool_size: parse_or(&get, "DB_POOL_SIZE", 10)?,
            storage,
            template_dir: get("TEMPLATE_DIR").map(PathBuf::from),
            system_fonts: parse_flag(&get, "CERFA_SYSTEM_FONTS", true)?,
            font_dir: get("CERFA_FONT_DIR").map(PathBuf::from),
            rate_limit_per_second: parse_or(&get, "RATE_LIMIT_PER_SECOND", 50)?,
            rate_limit_burst: parse_or(&get, "RATE_LIMIT_BURST", 100)?,
            allowed_origins: get("ALLOWED_ORIGINS"),
        })
    }

    pub fn is_production(&self) -> bool {
        self.env_mode == "production"
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse::<T>().map_err(|e| anyhow::anyhow!("Invalid {}={:?}: {}", key, raw, e)),
        None => Ok(default),
    }
}

fn parse_flag<G>(get: &G, key: &str, default: bool) -> anyhow::Result<bool>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if v == "1" || v == "true" || v == "yes" => Ok(true),
        Some(v) if v == "0" || v == "false" || v == "no" => Ok(false),
        Some(v) => anyhow::bail!("Invalid {}={:?}: expected true or false", key, v),
    }
}
