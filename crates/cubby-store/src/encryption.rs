use aes::{
    cipher::{AsyncStreamCipher, KeyIvInit},
    Aes256,
};
use cubby_core::error::StoreError;
use rand::{rngs::OsRng, RngCore};

type Aes256CfbEnc = cfb_mode::Encryptor<Aes256>;
type Aes256CfbDec = cfb_mode::Decryptor<Aes256>;

const KEY_LEN: usize = 32;
/// AES block size; every ciphertext starts with an IV of this length.
pub const IV_LEN: usize = 16;

/// Symmetric confidentiality for serialized record bytes at rest.
pub trait EncryptionService: Send + Sync {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, StoreError>;
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, StoreError>;
}

/// AES-256-CFB with a password-derived key.
///
/// The password is truncated or zero-padded to the 32-byte key length rather
/// than run through a real KDF. That keeps stored files portable across
/// implementations of the same format, but offers no stretching against
/// brute force on weak passwords: treat the password itself as key material.
/// CFB is unauthenticated, so decrypting with a wrong key yields garbage
/// bytes rather than an error; the caller's deserialization catches that.
pub struct AesCfbEncryption {
    key: [u8; KEY_LEN],
}

impl AesCfbEncryption {
    pub fn new(password: &str) -> Self {
        let mut key = [0u8; KEY_LEN];
        let bytes = password.as_bytes();
        let len = bytes.len().min(KEY_LEN);
        key[..len].copy_from_slice(&bytes[..len]);
        Self { key }
    }
}

impl EncryptionService for AesCfbEncryption {
    /// Returns IV ‖ ciphertext with a fresh random IV per call. Reusing an
    /// IV under the same key would break the stream cipher, so the IV is
    /// never cached.
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, StoreError> {
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let mut out = Vec::with_capacity(IV_LEN + data.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(data);

        let cipher = Aes256CfbEnc::new_from_slices(&self.key, &iv)
            .map_err(|err| StoreError::Encrypt {
                reason: err.to_string(),
            })?;
        cipher.encrypt(&mut out[IV_LEN..]);
        Ok(out)
    }

    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, StoreError> {
        if data.len() < IV_LEN {
            return Err(StoreError::Decrypt {
                reason: format!("input shorter than {IV_LEN}-byte iv"),
            });
        }

        let (iv, body) = data.split_at(IV_LEN);
        let mut out = body.to_vec();
        let cipher = Aes256CfbDec::new_from_slices(&self.key, iv)
            .map_err(|err| StoreError::Decrypt {
                reason: err.to_string(),
            })?;
        cipher.decrypt(&mut out);
        Ok(out)
    }
}
