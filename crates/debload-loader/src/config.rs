use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use debload_types::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LoaderError, LoaderResult};

/// Authority under which snapshot occurrences are asserted.
pub const SNAPSHOT_AUTHORITY: Uuid = Uuid::from_u128(0x5f4d4c51_498a_4e28_88b3_b3e4e8396cba);

const KEYRING_DIR: &str = "/usr/share/keyrings";

/// When pending objects are written to the store.
///
/// Each limit fires on its own once the measured value reaches it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlushThresholds {
    /// Pending content count.
    pub content_packet_size: usize,
    /// Pending content bytes, counting only contents under the ceiling.
    pub content_packet_length: u64,
    /// Length ceiling above which a content is stored absent.
    pub content_max_length_one: u64,
    /// Pending directory count.
    pub directory_packet_size: usize,
    /// Ask the store which pending directories it lacks and write only those.
    pub check_directories: bool,
}

impl Default for FlushThresholds {
    fn default() -> Self {
        Self {
            content_packet_size: 10_000,
            content_packet_length: 1024 * 1024 * 1024,
            content_max_length_one: 100 * 1024 * 1024,
            directory_packet_size: 25_000,
            check_directories: false,
        }
    }
}

/// Provenance attached to every branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authority {
    pub authority: Uuid,
    /// Snapshot instant the authority vouches for.
    pub validity: DateTime<FixedOffset>,
}

impl Authority {
    pub fn validity_timestamp(&self) -> Timestamp {
        Timestamp::from(self.validity)
    }
}

impl Default for Authority {
    fn default() -> Self {
        Self {
            authority: SNAPSHOT_AUTHORITY,
            validity: DateTime::<FixedOffset>::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub command: PathBuf,
    /// Watchdog for a single extraction. `None` waits forever.
    pub timeout_secs: Option<u64>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            command: PathBuf::from("dpkg-source"),
            timeout_secs: None,
        }
    }
}

impl ExtractorConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Loader configuration, read from TOML.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub thresholds: FlushThresholds,
    /// Parent of the per-package temporary directories. System temp dir when unset.
    pub work_dir: Option<PathBuf>,
    /// Keyrings handed to the signature verifier.
    pub keyrings: Vec<PathBuf>,
    pub authorities: Vec<Authority>,
    pub extractor: ExtractorConfig,
    pub gpgv: PathBuf,
    /// Delete on-disk copies of duplicate contents as soon as they are found.
    pub remove_duplicates: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            thresholds: FlushThresholds::default(),
            work_dir: None,
            keyrings: default_keyrings(),
            authorities: vec![Authority::default()],
            extractor: ExtractorConfig::default(),
            gpgv: PathBuf::from("gpgv"),
            remove_duplicates: true,
        }
    }
}

impl LoaderConfig {
    pub fn from_toml_str(text: &str) -> LoaderResult<Self> {
        toml::from_str(text).map_err(|e| LoaderError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> LoaderResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| LoaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Every file under the system keyring directory, sorted.
fn default_keyrings() -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(KEYRING_DIR) else {
        return Vec::new();
    };
    let mut keyrings: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    keyrings.sort();
    keyrings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thresholds() {
        let t = FlushThresholds::default();
        assert_eq!(t.content_packet_size, 10_000);
        assert_eq!(t.content_packet_length, 1 << 30);
        assert_eq!(t.content_max_length_one, 100 << 20);
        assert_eq!(t.directory_packet_size, 25_000);
        assert!(!t.check_directories);
    }

    #[test]
    fn default_authority_is_snapshot() {
        let c = LoaderConfig::default();
        assert_eq!(c.authorities.len(), 1);
        assert_eq!(
            c.authorities[0].authority.to_string(),
            "5f4d4c51-498a-4e28-88b3-b3e4e8396cba"
        );
        assert_eq!(c.authorities[0].validity_timestamp(), Timestamp::from_unix(0));
        assert!(c.remove_duplicates);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = LoaderConfig::from_toml_str(
            r#"
            work_dir = "/var/tmp/debload"
            keyrings = []

            [thresholds]
            content_packet_size = 5
            check_directories = true

            [extractor]
            timeout_secs = 600

            [[authorities]]
            authority = "5f4d4c51-498a-4e28-88b3-b3e4e8396cba"
            validity = "2015-02-03T04:05:06+00:00"
            "#,
        )
        .unwrap();
        assert_eq!(c.thresholds.content_packet_size, 5);
        assert_eq!(c.thresholds.directory_packet_size, 25_000);
        assert!(c.thresholds.check_directories);
        assert_eq!(c.work_dir(), PathBuf::from("/var/tmp/debload"));
        assert_eq!(c.extractor.timeout(), Some(Duration::from_secs(600)));
        assert_eq!(c.extractor.command, PathBuf::from("dpkg-source"));
        assert_eq!(
            c.authorities[0].validity_timestamp(),
            Timestamp::from_unix(1_422_936_306)
        );
    }

    #[test]
    fn invalid_toml_is_config_error() {
        assert!(matches!(
            LoaderConfig::from_toml_str("thresholds = 3"),
            Err(LoaderError::Config(_))
        ));
    }
}
