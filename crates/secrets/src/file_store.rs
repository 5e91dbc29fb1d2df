use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::{Mutex, MutexGuard},
};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use log::{debug, warn};
use papertrade_market_data::{normalize_provider_id, CredentialPersistence, MarketDataError};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SecretsError};

const FILE_VERSION: u32 = 1;
const NONCE_LEN: usize = 12;
const KEY_ENV: &str = "PAPERTRADE_SECRET_KEY";

/// On-disk credential map.
#[derive(Serialize, Deserialize, Default)]
struct CredentialFile {
    version: u32,
    secrets: HashMap<String, String>,
}

/// A [`CredentialFile`] sealed with ChaCha20-Poly1305.
#[derive(Serialize, Deserialize)]
struct SealedFile {
    version: u32,
    nonce: String,
    ciphertext: String,
}

/// Provider API keys kept in a JSON file, optionally encrypted.
///
/// Saves merge into what is already on disk, so keys for providers missing
/// from an update survive.
pub struct FileCredentialStore {
    path: PathBuf,
    cipher: Option<ChaCha20Poly1305>,
    lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Open the store at `path`.
    ///
    /// `encryption_key` (normally the value of `PAPERTRADE_SECRET_KEY`) is
    /// base64 for 32 bytes or a 32-character ASCII string. A missing or blank
    /// key stores the file as plain JSON.
    pub fn new(path: PathBuf, encryption_key: Option<&str>) -> Result<Self> {
        let cipher = match encryption_key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(raw) => {
                let key = decode_key(raw)?;
                Some(ChaCha20Poly1305::new(Key::from_slice(&key)))
            }
            None => {
                debug!("Credential file {} is stored unencrypted", path.display());
                None
            }
        };

        Ok(Self {
            path,
            cipher,
            lock: Mutex::new(()),
        })
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| {
            warn!("Credential file lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn read_file(&self) -> Result<CredentialFile> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(CredentialFile::default())
            }
            Err(e) => return Err(e.into()),
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(CredentialFile::default());
        }

        let value: serde_json::Value = serde_json::from_slice(&raw)?;
        let file: CredentialFile = if value.get("ciphertext").is_some() {
            let cipher = self.cipher.as_ref().ok_or_else(|| {
                SecretsError::Secret(format!("{} is required to read {}", KEY_ENV, self.path.display()))
            })?;
            open_sealed(cipher, serde_json::from_value(value)?)?
        } else {
            serde_json::from_value(value)?
        };

        if file.version > FILE_VERSION {
            warn!(
                "Credential file version {} is newer than {}, reading it anyway",
                file.version, FILE_VERSION
            );
        }
        Ok(file)
    }

    fn write_file(&self, file: &CredentialFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = match &self.cipher {
            Some(cipher) => serde_json::to_string_pretty(&seal(cipher, file)?)?,
            None => serde_json::to_string_pretty(file)?,
        };
        fs::write(&self.path, json)?;

        debug!(
            "Saved {} provider keys to {}",
            file.secrets.len(),
            self.path.display()
        );
        Ok(())
    }
}

impl CredentialPersistence for FileCredentialStore {
    fn load_credentials(&self) -> std::result::Result<HashMap<String, String>, MarketDataError> {
        let _guard = self.guard();
        Ok(self.read_file()?.secrets)
    }

    fn save_credentials(
        &self,
        updates: &HashMap<String, String>,
    ) -> std::result::Result<(), MarketDataError> {
        let _guard = self.guard();
        let mut file = self.read_file()?;
        file.version = FILE_VERSION;
        file.secrets.extend(
            updates
                .iter()
                .map(|(provider, key)| (normalize_provider_id(provider), key.clone())),
        );
        self.write_file(&file)?;
        Ok(())
    }
}

fn seal(cipher: &ChaCha20Poly1305, file: &CredentialFile) -> Result<SealedFile> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let plaintext = serde_json::to_vec(file)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_ref())
        .map_err(|_| SecretsError::Secret("Failed to encrypt credentials".into()))?;

    Ok(SealedFile {
        version: FILE_VERSION,
        nonce: BASE64.encode(nonce),
        ciphertext: BASE64.encode(ciphertext),
    })
}

fn open_sealed(cipher: &ChaCha20Poly1305, sealed: SealedFile) -> Result<CredentialFile> {
    let nonce = BASE64
        .decode(sealed.nonce)
        .map_err(|e| SecretsError::Secret(format!("Bad nonce encoding: {e}")))?;
    if nonce.len() != NONCE_LEN {
        return Err(SecretsError::Secret("Invalid nonce length".into()));
    }
    let ciphertext = BASE64
        .decode(sealed.ciphertext)
        .map_err(|e| SecretsError::Secret(format!("Bad ciphertext encoding: {e}")))?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref())
        .map_err(|_| SecretsError::Secret("Wrong key or corrupted credential file".into()))?;
    Ok(serde_json::from_slice(&plaintext)?)
}

/// Accepts base64 for 32 bytes, or exactly 32 ASCII characters.
fn decode_key(raw: &str) -> Result<[u8; 32]> {
    let decoded = BASE64.decode(raw).ok().filter(|bytes| bytes.len() == 32);
    let bytes = decoded.as_deref().unwrap_or(raw.as_bytes());

    <[u8; 32]>::try_from(bytes)
        .map_err(|_| SecretsError::Secret(format!("{} must be 32 bytes, raw or base64", KEY_ENV)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use papertrade_market_data::CredentialStore;
    use tempfile::tempdir;

    fn updates(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn saves_merge_without_encryption() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("credentials.json");
        let store = FileCredentialStore::new(file.clone(), None).unwrap();

        assert!(store.load_credentials().unwrap().is_empty());

        store
            .save_credentials(&updates(&[("finnhub", "abc"), ("NEWSAPI", "n1")]))
            .unwrap();
        store
            .save_credentials(&updates(&[("newsapi", "n2")]))
            .unwrap();

        let loaded = store.load_credentials().unwrap();
        assert_eq!(loaded.get("FINNHUB").map(String::as_str), Some("abc"));
        assert_eq!(loaded.get("NEWSAPI").map(String::as_str), Some("n2"));

        let raw = fs::read_to_string(&file).unwrap();
        assert!(raw.contains("\"version\": 1"));
    }

    #[test]
    fn encrypted_file_needs_the_key() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("credentials.json");
        let key = BASE64.encode([7u8; 32]);
        let store = FileCredentialStore::new(file.clone(), Some(&key)).unwrap();

        store
            .save_credentials(&updates(&[("twelve_data", "secret")]))
            .unwrap();

        let raw = fs::read_to_string(&file).unwrap();
        assert!(raw.contains("ciphertext"));
        assert!(!raw.contains("secret"));

        let reopened = FileCredentialStore::new(file.clone(), Some(&key)).unwrap();
        assert_eq!(
            reopened.load_credentials().unwrap().get("TWELVE_DATA").map(String::as_str),
            Some("secret")
        );

        let without_key = FileCredentialStore::new(file.clone(), None).unwrap();
        assert!(matches!(
            without_key.load_credentials(),
            Err(MarketDataError::Persistence(_))
        ));

        let wrong_key = FileCredentialStore::new(file, Some(&BASE64.encode([9u8; 32]))).unwrap();
        assert!(matches!(
            wrong_key.load_credentials(),
            Err(MarketDataError::Persistence(_))
        ));
    }

    #[test]
    fn key_formats() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("credentials.json");
        assert!(FileCredentialStore::new(file.clone(), Some("too-short")).is_err());
        assert!(FileCredentialStore::new(file.clone(), Some("0123456789abcdef0123456789abcdef")).is_ok());
        assert!(FileCredentialStore::new(file, Some("   ")).is_ok());
    }

    #[test]
    fn corrupt_file_is_a_persistence_error() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("credentials.json");
        fs::write(&file, "{not json").unwrap();

        let store = FileCredentialStore::new(file, None).unwrap();
        assert!(matches!(
            store.load_credentials(),
            Err(MarketDataError::Persistence(_))
        ));
        assert!(store.save_credentials(&updates(&[("finnhub", "x")])).is_err());
    }

    #[test]
    fn backs_a_credential_store() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("nested").join("credentials.json");

        let credentials =
            CredentialStore::load(Box::new(FileCredentialStore::new(file.clone(), None).unwrap()))
                .unwrap();
        credentials
            .update(updates(&[("finnhub", "abc"), ("alpha_vantage", "")]))
            .unwrap();

        let reloaded =
            CredentialStore::load(Box::new(FileCredentialStore::new(file, None).unwrap()))
                .unwrap();
        assert_eq!(reloaded.get("finnhub").as_deref(), Some("abc"));
        assert!(!reloaded.has("ALPHA_VANTAGE"));
    }
}
