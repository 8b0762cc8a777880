use crate::constants::crypto::{IV_SIZE, KEY_SIZE, TAG_SIZE};
use crate::errors::ToolError;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::Aes256Gcm;
use base64::Engine;
use rand::RngCore;
use std::fs;
use std::io::Write;
use std::path::Path;

fn decode_key(raw: &str) -> Option<Vec<u8>> {
    let trimmed = raw.trim();
    if trimmed.len() == KEY_SIZE * 2 {
        return hex::decode(trimmed).ok();
    }
    let engine = base64::engine::general_purpose::STANDARD;
    if let Ok(decoded) = engine.decode(trimmed.as_bytes()) {
        if decoded.len() == KEY_SIZE {
            return Some(decoded);
        }
    }
    if trimmed.len() == KEY_SIZE {
        return Some(trimmed.as_bytes().to_vec());
    }
    None
}

/// AES-256-GCM sealing for values kept in the credential file.
#[derive(Clone)]
pub struct Cipher {
    inner: Aes256Gcm,
}

impl Cipher {
    /// Uses `RELAY_ENCRYPTION_KEY` when set, else the key file (created on first use).
    pub fn load_or_create(key_path: &Path) -> Result<Self, ToolError> {
        let secret = Self::load_or_create_secret(key_path)?;
        Ok(Self::from_key(&secret))
    }

    pub fn from_key(secret: &[u8]) -> Self {
        let key = aes_gcm::Key::<Aes256Gcm>::from_slice(secret);
        Self {
            inner: Aes256Gcm::new(key),
        }
    }

    fn load_or_create_secret(path: &Path) -> Result<Vec<u8>, ToolError> {
        if let Ok(raw) = std::env::var("RELAY_ENCRYPTION_KEY") {
            if let Some(decoded) = decode_key(&raw) {
                return Ok(decoded);
            }
        }

        if path.exists() {
            let stored = fs::read_to_string(path)?;
            return decode_key(&stored).ok_or_else(|| {
                ToolError::config(format!("Key file {} is corrupt", path.display()))
                    .with_hint("Delete the key file and re-run `relay auth set`.")
            });
        }

        let mut generated = vec![0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut generated);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(hex::encode(&generated).as_bytes())?;
        Ok(generated)
    }

    pub fn encrypt(&self, text: &str) -> Result<String, ToolError> {
        let mut iv = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut iv);
        let nonce = aes_gcm::Nonce::from_slice(&iv);
        let mut ciphertext = self
            .inner
            .encrypt(nonce, text.as_bytes())
            .map_err(|_| ToolError::internal("Failed to encrypt credential"))?;
        if ciphertext.len() < TAG_SIZE {
            return Err(ToolError::internal("Failed to encrypt credential"));
        }
        let tag = ciphertext.split_off(ciphertext.len() - TAG_SIZE);
        Ok(format!(
            "{}:{}:{}",
            hex::encode(iv),
            hex::encode(tag),
            hex::encode(ciphertext)
        ))
    }

    pub fn decrypt(&self, payload: &str) -> Result<String, ToolError> {
        let malformed = || ToolError::internal("Stored credential is malformed");
        let parts: Vec<&str> = payload.split(':').collect();
        if parts.len() != 3 {
            return Err(malformed());
        }
        let iv = hex::decode(parts[0]).map_err(|_| malformed())?;
        let tag = hex::decode(parts[1]).map_err(|_| malformed())?;
        let data = hex::decode(parts[2]).map_err(|_| malformed())?;
        if iv.len() != IV_SIZE || tag.len() != TAG_SIZE {
            return Err(malformed());
        }
        let mut combined = Vec::with_capacity(data.len() + tag.len());
        combined.extend_from_slice(&data);
        combined.extend_from_slice(&tag);
        let nonce = aes_gcm::Nonce::from_slice(&iv);
        let decrypted = self.inner.decrypt(nonce, combined.as_ref()).map_err(|_| {
            ToolError::auth("Failed to decrypt stored credential").with_hint(
                "RELAY_ENCRYPTION_KEY (or the key file) changed since the token was stored. Run `relay auth set` again.",
            )
        })?;
        String::from_utf8(decrypted).map_err(|_| malformed())
    }
}
