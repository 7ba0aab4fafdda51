use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LoaderError, LoaderResult};
use crate::package::SourcePackage;

/// Candidate packages for one batch, read from TOML:
///
/// ```toml
/// [[package]]
/// name = "hello"
/// version = "2.10-1"
/// dsc = "pool/h/hello/hello_2.10-1.dsc"
/// id = 42
/// ```
///
/// Relative descriptor paths are resolved against the manifest's directory.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, rename = "package")]
    pub packages: Vec<SourcePackage>,
}

impl Manifest {
    pub fn from_toml_str(text: &str) -> LoaderResult<Self> {
        toml::from_str(text).map_err(|e| LoaderError::Config(format!("invalid manifest: {e}")))
    }

    pub fn load(path: &Path) -> LoaderResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| LoaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut manifest = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            manifest.resolve_against(base);
        }
        Ok(manifest)
    }

    fn resolve_against(&mut self, base: &Path) {
        for package in &mut self.packages {
            if package.dsc.is_relative() {
                package.dsc = base.join(&package.dsc);
            }
        }
    }

    pub fn into_packages(self) -> Vec<SourcePackage> {
        self.packages
    }

    /// Descriptor paths, in manifest order.
    pub fn descriptors(&self) -> Vec<PathBuf> {
        self.packages.iter().map(|p| p.dsc.clone()).collect()
    }
}
