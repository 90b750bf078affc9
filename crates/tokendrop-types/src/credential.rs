//! The service's signing credential (treasury authority keypair).
//!
//! Loaded once at startup and shared read-only for the process lifetime.
//! Never printed: `Debug` only reveals the public address.

use std::fmt;

use ed25519_dalek::{KEYPAIR_LENGTH, SECRET_KEY_LENGTH, Signature, Signer, SigningKey};

use crate::{AccountRef, ConfigError};

/// An ed25519 keypair able to sign ledger transactions.
#[derive(Clone)]
pub struct SigningCredential {
    key: SigningKey,
}

impl SigningCredential {
    /// Decode a credential from its configured text form.
    ///
    /// Accepted encodings:
    /// - JSON byte array (`[12,34,...]`) of a 64-byte keypair or 32-byte seed
    /// - base58 of a 64-byte keypair or 32-byte seed
    ///
    /// # Errors
    /// [`ConfigError::MissingCredential`] for an empty string,
    /// [`ConfigError::InvalidCredentialFormat`] for anything undecodable.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConfigError::MissingCredential);
        }

        let bytes = if raw.starts_with('[') {
            serde_json::from_str::<Vec<u8>>(raw).map_err(|e| {
                ConfigError::InvalidCredentialFormat {
                    reason: format!("JSON byte array: {e}"),
                }
            })?
        } else {
            bs58::decode(raw)
                .into_vec()
                .map_err(|e| ConfigError::InvalidCredentialFormat {
                    reason: format!("base58: {e}"),
                })?
        };

        Self::from_bytes(&bytes)
    }

    /// Build from raw keypair (64) or seed (32) bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let key = match bytes.len() {
            KEYPAIR_LENGTH => {
                let mut keypair = [0u8; KEYPAIR_LENGTH];
                keypair.copy_from_slice(bytes);
                SigningKey::from_keypair_bytes(&keypair).map_err(|e| {
                    ConfigError::InvalidCredentialFormat {
                        reason: format!("keypair public half does not match secret: {e}"),
                    }
                })?
            }
            SECRET_KEY_LENGTH => {
                let mut seed = [0u8; SECRET_KEY_LENGTH];
                seed.copy_from_slice(bytes);
                SigningKey::from_bytes(&seed)
            }
            other => {
                return Err(ConfigError::InvalidCredentialFormat {
                    reason: format!("expected 64 or 32 bytes, got {other}"),
                });
            }
        };
        Ok(Self { key })
    }

    #[must_use]
    pub fn from_signing_key(key: SigningKey) -> Self {
        Self { key }
    }

    /// The address controlled by this credential.
    #[must_use]
    pub fn address(&self) -> AccountRef {
        AccountRef::from_bytes(&self.key.verifying_key().to_bytes())
    }

    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.key.sign(message)
    }

    #[must_use]
    pub fn signing_key(&self) -> &SigningKey {
        &self.key
    }
}

impl fmt::Debug for SigningCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCredential")
            .field("address", &self.address().as_str())
            .finish_non_exhaustive()
    }
}
