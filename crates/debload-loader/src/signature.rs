use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use debload_types::{Person, Timestamp};

use crate::package::SignatureInfo;

/// Checks the inline signature of a descriptor.
pub trait SignatureVerifier {
    /// Signer and signing time, or `None` when no signature can be found.
    fn verify(&self, dsc: &Path, keyrings: &[PathBuf]) -> Option<SignatureInfo>;
}

impl<V: SignatureVerifier + ?Sized> SignatureVerifier for &V {
    fn verify(&self, dsc: &Path, keyrings: &[PathBuf]) -> Option<SignatureInfo> {
        (**self).verify(dsc, keyrings)
    }
}

/// Verifier that never finds a signature.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSignature;

impl SignatureVerifier for NoSignature {
    fn verify(&self, _dsc: &Path, _keyrings: &[PathBuf]) -> Option<SignatureInfo> {
        None
    }
}

/// Verifier running `gpgv --status-fd 1` against the configured keyrings.
#[derive(Clone, Debug)]
pub struct GpgvVerifier {
    command: PathBuf,
}

impl Default for GpgvVerifier {
    fn default() -> Self {
        Self::new("gpgv")
    }
}

impl GpgvVerifier {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl SignatureVerifier for GpgvVerifier {
    fn verify(&self, dsc: &Path, keyrings: &[PathBuf]) -> Option<SignatureInfo> {
        let mut command = Command::new(&self.command);
        command.args(["--status-fd", "1"]);
        for keyring in keyrings {
            command.arg("--keyring").arg(keyring);
        }
        // gpgv exits non-zero for ERRSIG too; the status lines still count.
        let output = command
            .arg(dsc)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output();
        match output {
            Ok(output) => parse_gpg_status(&String::from_utf8_lossy(&output.stdout)),
            Err(e) => {
                tracing::debug!(command = %self.command.display(), error = %e, "cannot run gpgv");
                None
            }
        }
    }
}

/// Extract the signature from `gpg --status-fd` output.
///
/// `VALIDSIG` gives the key id (field 0) and time (field 2), with the uid
/// taken from the matching `GOODSIG`-family line. `ERRSIG` gives the key id
/// (field 0) and time (field 4). Anything else yields `None`.
pub fn parse_gpg_status(status: &str) -> Option<SignatureInfo> {
    let mut validsig = None;
    let mut errsig = None;
    let mut uid = None;

    for line in status.lines() {
        let Some(rest) = line.strip_prefix("[GNUPG:] ") else {
            continue;
        };
        let (keyword, args) = rest.split_once(' ').unwrap_or((rest, ""));
        match keyword {
            "VALIDSIG" => validsig = Some(args.split_whitespace().collect::<Vec<_>>()),
            "ERRSIG" => errsig = Some(args.split_whitespace().collect::<Vec<_>>()),
            "GOODSIG" | "EXPSIG" | "EXPKEYSIG" | "REVKEYSIG" if uid.is_none() => {
                uid = args.split_once(' ').map(|(_, uid)| uid.to_string());
            }
            _ => {}
        }
    }

    let (keyid, time, uid) = if let Some(fields) = validsig {
        (*fields.first()?, *fields.get(2)?, uid)
    } else if let Some(fields) = errsig {
        (*fields.first()?, *fields.get(4)?, None)
    } else {
        return None;
    };

    let seconds: i64 = time.parse().ok()?;
    Some(SignatureInfo {
        date: Timestamp::from_unix(seconds),
        keyid: keyid.to_string(),
        person: uid.as_deref().map(Person::from_identity).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validsig_with_uid() {
        let status = "\
[GNUPG:] NEWSIG
[GNUPG:] KEY_CONSIDERED 0123456789ABCDEF0123456789ABCDEF01234567 0
[GNUPG:] SIG_ID abc 2015-01-05 1420449072
[GNUPG:] GOODSIG 89ABCDEF01234567 Jane Doe <jane@example.org>
[GNUPG:] VALIDSIG 0123456789ABCDEF0123456789ABCDEF01234567 2015-01-05 1420449072 0 4 0 1 8 01 0123456789ABCDEF0123456789ABCDEF01234567
";
        let info = parse_gpg_status(status).unwrap();
        assert_eq!(info.keyid, "0123456789ABCDEF0123456789ABCDEF01234567");
        assert_eq!(info.date, Timestamp::from_unix(1_420_449_072));
        assert_eq!(info.person, Person::new("Jane Doe", "jane@example.org"));
    }

    #[test]
    fn errsig_without_key() {
        let status = "[GNUPG:] ERRSIG 89ABCDEF01234567 1 8 01 1420449072 9 -\n[GNUPG:] NO_PUBKEY 89ABCDEF01234567\n";
        let info = parse_gpg_status(status).unwrap();
        assert_eq!(info.keyid, "89ABCDEF01234567");
        assert_eq!(info.date, Timestamp::from_unix(1_420_449_072));
        assert_eq!(info.person, Person::default());
    }

    #[test]
    fn no_signature_lines() {
        assert!(parse_gpg_status("[GNUPG:] NODATA 1\n").is_none());
        assert!(parse_gpg_status("").is_none());
    }

    #[test]
    fn malformed_timestamp_is_no_signature() {
        assert!(parse_gpg_status("[GNUPG:] ERRSIG K 1 8 01 notatime 9\n").is_none());
    }

    #[test]
    fn missing_gpgv_is_no_signature() {
        let verifier = GpgvVerifier::new("/nonexistent/gpgv");
        assert!(verifier.verify(Path::new("x.dsc"), &[]).is_none());
    }
}
