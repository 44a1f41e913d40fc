//! TOML configuration, loaded the way `pageserver::tenant::Tenant::load_tenant_config`
//! loads `LocationConf`: `toml_edit::de::from_str` into a `serde::Deserialize`
//! struct, with a dedicated `LoadConfigError` distinguishing "file absent"
//! from "file present but malformed" (mirroring `pageserver`'s own
//! `LoadConfigError`).

use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::region::CuboidSize;

#[derive(Debug, thiserror::Error)]
pub enum LoadConfigError {
    #[error("config not found at {0}")]
    NotFound(Utf8PathBuf),
    #[error("TOML deserialization error: {0}")]
    DeserializeToml(#[from] toml_edit::de::Error),
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    pub bucket: String,
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStoreConfig {
    pub redis_url: String,
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateStoreConfig {
    pub redis_url: String,
    #[serde(with = "humantime_serde")]
    pub page_out_scratch_ttl: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagingConfig {
    #[serde(with = "humantime_serde")]
    pub page_in_timeout: Duration,
    pub page_out_max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub page_out_base_backoff: Duration,
    #[serde(with = "humantime_serde")]
    pub page_out_max_backoff: Duration,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            page_in_timeout: Duration::from_secs(30),
            page_out_max_attempts: 200,
            page_out_base_backoff: Duration::from_millis(1),
            page_out_max_backoff: Duration::from_millis(50),
        }
    }
}

fn default_cuboid_size() -> CuboidSize {
    CuboidSize::default()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub object_store: ObjectStoreConfig,
    pub cache_store: CacheStoreConfig,
    pub state_store: StateStoreConfig,
    #[serde(default)]
    pub paging: PagingConfig,
    #[serde(default = "default_cuboid_size", with = "cuboid_size_tuple")]
    pub cuboid_size: CuboidSize,
}

// `CuboidSize` has no derived (De)Serialize (it lives in `region`, which has
// no reason to depend on serde); encode it as a plain `(x, y, z)` tuple in
// TOML instead.
mod cuboid_size_tuple {
    use super::CuboidSize;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &CuboidSize, s: S) -> Result<S::Ok, S::Error> {
        (value.x, value.y, value.z).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<CuboidSize, D::Error> {
        let (x, y, z) = <(i64, i64, i64)>::deserialize(d)?;
        Ok(CuboidSize { x, y, z })
    }
}

impl Config {
    pub fn load(path: &Utf8PathBuf) -> Result<Self, LoadConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LoadConfigError::NotFound(path.clone()),
            _ => LoadConfigError::Read {
                path: path.clone(),
                source: e,
            },
        })?;
        Self::parse_toml(&text)
    }

    pub fn parse_toml(text: &str) -> Result<Self, LoadConfigError> {
        Ok(toml_edit::de::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_config() {
        let toml = r#"
            [object_store]
            bucket = "spdb-cuboids"
            region = "us-east-1"

            [cache_store]
            redis_url = "redis://127.0.0.1/0"
            default_ttl = "30s"

            [state_store]
            redis_url = "redis://127.0.0.1/1"
            page_out_scratch_ttl = "15s"
        "#;
        let config = Config::parse_toml(toml).unwrap();
        assert_eq!(config.object_store.bucket, "spdb-cuboids");
        assert_eq!(config.cache_store.default_ttl, Duration::from_secs(30));
        assert_eq!(config.paging.page_out_max_attempts, 200);
        assert_eq!(config.cuboid_size, CuboidSize::default());
    }

    #[test]
    fn missing_file_reports_not_found() {
        let err = Config::load(&Utf8PathBuf::from("/nonexistent/spdb.toml")).unwrap_err();
        assert!(matches!(err, LoadConfigError::NotFound(_)));
    }
}
