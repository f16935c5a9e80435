// SPDX-License-Identifier: MIT

// Deployment configuration. A `.voseqconfig` JSON file is looked up in $HOME and then in the
// working directory; every field is optional, so a partial file still works. Fields are read one
// by one from the parsed value rather than through a rigid Deserialize struct.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::errors::VoseqError;

pub const CONFIG_FILE_NAME: &str = ".voseqconfig";

const DEFAULT_DATABASE: &str = "voseq.sqlite3";
const DEFAULT_MEDIA_ROOT: &str = "media";
const DEFAULT_BLAST_DB_DIR: &str = "blast_db";

// Where the BLAST databases live and, optionally, where the NCBI binaries are installed. Without
// a bin dir the tools are expected on $PATH.
#[derive(Debug, Clone)]
pub struct BlastConfig {
    pub db_dir: PathBuf,
    pub bin_dir: Option<PathBuf>,
}

impl BlastConfig {
    pub fn from_value(value: &Value) -> Self {
        let db_dir = value
            .get("blast_db_dir")
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BLAST_DB_DIR));
        let bin_dir = value
            .get("blast_bin_dir")
            .and_then(Value::as_str)
            .map(PathBuf::from);
        BlastConfig { db_dir, bin_dir }
    }
}

#[derive(Debug, Clone)]
pub struct FlickrConfig {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

impl FlickrConfig {
    pub fn from_value(value: &Value) -> Self {
        let api_key = value
            .get("flickr_api_key")
            .and_then(Value::as_str)
            .map(String::from);
        let api_secret = value
            .get("flickr_api_secret")
            .and_then(Value::as_str)
            .map(String::from);
        FlickrConfig {
            api_key,
            api_secret,
        }
    }

    /// Both credentials, or None if either is missing.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.api_key, &self.api_secret) {
            (Some(key), Some(secret)) => Some((key, secret)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VoseqConfig {
    pub database: PathBuf,
    pub media_root: PathBuf,
    pub blast: BlastConfig,
    pub flickr: FlickrConfig,
}

impl VoseqConfig {
    pub fn from_value(value: &Value) -> Self {
        let database = value
            .get("database")
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE));
        let media_root = value
            .get("media_root")
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MEDIA_ROOT));
        VoseqConfig {
            database,
            media_root,
            blast: BlastConfig::from_value(value),
            flickr: FlickrConfig::from_value(value),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, VoseqError> {
        let text = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| VoseqError::Format(format!("{}: {}", path.display(), e)))?;
        Ok(Self::from_value(&value))
    }
}

impl Default for VoseqConfig {
    fn default() -> Self {
        // get() on a non-object yields None for every field
        Self::from_value(&Value::Null)
    }
}

pub fn find_voseq_config() -> Option<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        let path = PathBuf::from(home).join(CONFIG_FILE_NAME);
        if path.exists() {
            return Some(path);
        }
    }
    if let Ok(cwd) = std::env::current_dir() {
        let path = cwd.join(CONFIG_FILE_NAME);
        if path.exists() {
            return Some(path);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_voseq_config_from_value() {
        let value = json!({
            "database": "/var/lib/voseq/voseq.sqlite3",
            "media_root": "/var/lib/voseq/media",
            "blast_db_dir": "/var/lib/voseq/blast_db",
            "blast_bin_dir": "/usr/local/ncbi/blast/bin",
            "flickr_api_key": "a89c1e6a",
            "flickr_api_secret": "1f3e"
        });
        let config = VoseqConfig::from_value(&value);
        assert_eq!(config.database, PathBuf::from("/var/lib/voseq/voseq.sqlite3"));
        assert_eq!(config.media_root, PathBuf::from("/var/lib/voseq/media"));
        assert_eq!(config.blast.db_dir, PathBuf::from("/var/lib/voseq/blast_db"));
        assert_eq!(
            config.blast.bin_dir,
            Some(PathBuf::from("/usr/local/ncbi/blast/bin"))
        );
        assert_eq!(config.flickr.credentials(), Some(("a89c1e6a", "1f3e")));
    }

    #[test]
    fn test_voseq_config_partial_value() {
        let value = json!({ "database": "test.sqlite3" });
        let config = VoseqConfig::from_value(&value);
        assert_eq!(config.database, PathBuf::from("test.sqlite3"));
        assert_eq!(config.media_root, PathBuf::from(DEFAULT_MEDIA_ROOT));
        assert_eq!(config.blast.db_dir, PathBuf::from(DEFAULT_BLAST_DB_DIR));
        assert_eq!(config.blast.bin_dir, None);
        assert_eq!(config.flickr.credentials(), None);
    }

    #[test]
    fn test_voseq_config_default() {
        let config = VoseqConfig::default();
        assert_eq!(config.database, PathBuf::from(DEFAULT_DATABASE));
        assert_eq!(config.flickr.api_key, None);
    }
}
