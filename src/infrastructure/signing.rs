//! Signing authority for prescriptions and bills.
//!
//! Payloads are hashed with SHA-256 and the digest is signed with a single
//! process-wide Ed25519 key. Signatures travel as standard base64 text.
//!
//! The key is kept in a file holding the base64-encoded 32-byte secret.
//! [`SigningAuthority::load_or_create`] reads that file, or generates and
//! writes a fresh key when none exists; an existing key is never replaced.

use crate::domain::ports::PayloadSigner;
use crate::error::IntegrityError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{error, info};
use zeroize::Zeroize;

pub struct SigningAuthority {
    key: Option<SigningKey>,
    degraded_reason: Option<String>,
}

impl SigningAuthority {
    /// Wraps an existing key.
    pub fn from_key(signing_key: SigningKey) -> Self {
        Self {
            key: Some(signing_key),
            degraded_reason: None,
        }
    }

    /// Generates a key that lives only as long as this value.
    pub fn ephemeral() -> Self {
        Self::from_key(generate_key())
    }

    /// An authority without key material. Every `sign` call fails with
    /// [`IntegrityError::Unavailable`] and every `verify` call answers `false`.
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            key: None,
            degraded_reason: Some(reason.into()),
        }
    }

    /// Loads the key stored at `path`, creating it first if it does not exist.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, IntegrityError> {
        let path = path.as_ref();
        match read_key(path) {
            Ok(key) => {
                info!(path = %path.display(), "signing key loaded");
                Ok(Self::from_key(key))
            }
            Err(ReadKeyError::Missing) => {
                let key = generate_key();
                match write_new_key(path, &key) {
                    Ok(()) => {
                        info!(path = %path.display(), "signing key generated");
                        Ok(Self::from_key(key))
                    }
                    // Another process created the key first; use theirs.
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                        read_key(path).map(Self::from_key).map_err(IntegrityError::from)
                    }
                    Err(e) => Err(IntegrityError::Unavailable(format!(
                        "cannot write {}: {e}",
                        path.display()
                    ))),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Like [`Self::load_or_create`], but falls back to a degraded authority
    /// instead of failing, so the process can keep serving.
    pub fn load_or_degrade<P: AsRef<Path>>(path: P) -> Self {
        match Self::load_or_create(path) {
            Ok(authority) => authority,
            Err(e) => {
                error!(error = %e, "signing key unavailable; running without signing");
                Self::degraded(e.to_string())
            }
        }
    }

    pub fn verifying_key(&self) -> Option<VerifyingKey> {
        self.key.as_ref().map(SigningKey::verifying_key)
    }

    fn digest(payload: &[u8]) -> [u8; 32] {
        Sha256::digest(payload).into()
    }
}

impl PayloadSigner for SigningAuthority {
    fn sign(&self, payload: &[u8]) -> Result<String, IntegrityError> {
        let key = self.key.as_ref().ok_or_else(|| {
            IntegrityError::Unavailable(
                self.degraded_reason
                    .clone()
                    .unwrap_or_else(|| "no signing key".to_string()),
            )
        })?;
        let signature = key.sign(&Self::digest(payload));
        Ok(STANDARD.encode(signature.to_bytes()))
    }

    fn verify(&self, payload: &[u8], signature: &str) -> bool {
        let Some(key) = self.key.as_ref() else {
            return false;
        };
        let Ok(raw) = STANDARD.decode(signature.trim()) else {
            return false;
        };
        let Ok(bytes) = <[u8; 64]>::try_from(raw.as_slice()) else {
            return false;
        };
        let signature = Signature::from_bytes(&bytes);
        key.verifying_key()
            .verify(&Self::digest(payload), &signature)
            .is_ok()
    }

    fn is_available(&self) -> bool {
        self.key.is_some()
    }
}

enum ReadKeyError {
    Missing,
    Io(std::io::Error),
    Malformed(String),
}

impl From<ReadKeyError> for IntegrityError {
    fn from(e: ReadKeyError) -> Self {
        match e {
            ReadKeyError::Missing => IntegrityError::Unavailable("key file missing".to_string()),
            ReadKeyError::Io(e) => IntegrityError::Unavailable(e.to_string()),
            ReadKeyError::Malformed(reason) => IntegrityError::KeyMaterial(reason),
        }
    }
}

fn generate_key() -> SigningKey {
    let mut secret = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut secret);
    let key = SigningKey::from_bytes(&secret);
    secret.zeroize();
    key
}

fn read_key(path: &Path) -> Result<SigningKey, ReadKeyError> {
    let encoded = match std::fs::read_to_string(path) {
        Ok(encoded) => encoded,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(ReadKeyError::Missing),
        Err(e) => return Err(ReadKeyError::Io(e)),
    };
    let mut raw = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ReadKeyError::Malformed(format!("key file is not base64: {e}")))?;
    let secret = <[u8; 32]>::try_from(raw.as_slice()).map_err(|_| {
        ReadKeyError::Malformed(format!("key is {} bytes, expected 32", raw.len()))
    });
    raw.zeroize();
    let mut secret = secret?;
    let key = SigningKey::from_bytes(&secret);
    secret.zeroize();
    Ok(key)
}

/// Writes the key to a temporary file and links it into place without
/// overwriting anything already at `path`.
fn write_new_key(path: &Path, key: &SigningKey) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    let mut encoded = STANDARD.encode(key.to_bytes());
    tmp.write_all(encoded.as_bytes())?;
    encoded.zeroize();
    tmp.as_file().sync_all()?;
    tmp.persist_noclobber(path).map_err(|e| e.error)?;
    Ok(())
}
