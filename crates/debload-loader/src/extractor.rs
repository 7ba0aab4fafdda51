use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use crate::error::PackageError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Unpacks a source package into a directory.
pub trait Extractor {
    /// Extract the package described by `dsc` so that `dest` becomes the root
    /// of its tree. `dest` must not exist yet.
    fn extract(&self, dsc: &Path, dest: &Path) -> Result<(), PackageError>;
}

impl<E: Extractor + ?Sized> Extractor for &E {
    fn extract(&self, dsc: &Path, dest: &Path) -> Result<(), PackageError> {
        (**self).extract(dsc, dest)
    }
}

/// Extractor running `dpkg-source -x`.
///
/// The tool unpacks into `<dest>.tmp`, which is renamed to `dest` only on
/// success. Its combined output goes to `<dest>.log`.
#[derive(Clone, Debug)]
pub struct DpkgSourceExtractor {
    command: PathBuf,
    timeout: Option<Duration>,
}

impl Default for DpkgSourceExtractor {
    fn default() -> Self {
        Self {
            command: PathBuf::from("dpkg-source"),
            timeout: None,
        }
    }
}

impl DpkgSourceExtractor {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            timeout: None,
        }
    }

    /// Kill the tool if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn run(&self, dsc: &Path, staging: &Path, log: &File) -> Result<ExitStatus, String> {
        let mut child = Command::new(&self.command)
            .args(["--no-copy", "--no-check", "--ignore-bad-version", "-x"])
            .arg(dsc)
            .arg(staging)
            .stdin(Stdio::null())
            .stdout(log.try_clone().map_err(|e| e.to_string())?)
            .stderr(log.try_clone().map_err(|e| e.to_string())?)
            .spawn()
            .map_err(|e| format!("cannot run {}: {e}", self.command.display()))?;

        let Some(timeout) = self.timeout else {
            return child.wait().map_err(|e| e.to_string());
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait().map_err(|e| e.to_string())? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(format!("timed out after {}s", timeout.as_secs_f64()));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Extractor for DpkgSourceExtractor {
    fn extract(&self, dsc: &Path, dest: &Path) -> Result<(), PackageError> {
        tracing::debug!(
            kind = "deb_extract",
            dsc = %dsc.display(),
            dest = %dest.display(),
            "extracting Debian source package"
        );

        let staging = with_suffix(dest, ".tmp");
        let log_path = with_suffix(dest, ".log");
        let log = File::create(&log_path)?;

        let failure = match self.run(dsc, &staging, &log) {
            Ok(status) if status.success() => None,
            Ok(status) => Some(format!("{} exited with {status}", self.command.display())),
            Err(reason) => Some(reason),
        };

        if let Some(reason) = failure {
            let output = std::fs::read_to_string(&log_path).unwrap_or_default();
            tracing::warn!(
                kind = "deb_extract_failed",
                dsc = %dsc.display(),
                log = %output,
                "extracting Debian package failed: {reason}"
            );
            return Err(PackageError::ExtractionFailed {
                dsc: dsc.to_path_buf(),
                reason,
            });
        }

        std::fs::rename(&staging, dest)?;
        Ok(())
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
