//! Ledger-facing identifiers used throughout TokenDrop.
//!
//! Every address on the ledger is a base58-encoded 32-byte public key. The
//! newtypes here keep claimant identities, token accounts, assets and
//! transaction ids from being mixed up at call sites.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Decode a base58 ledger address into its raw 32 bytes.
///
/// Returns `None` if the string is not base58 or does not decode to
/// exactly 32 bytes.
#[must_use]
pub fn decode_address(encoded: &str) -> Option<[u8; 32]> {
    let bytes = bs58::decode(encoded.trim()).into_vec().ok()?;
    bytes.try_into().ok()
}

/// Encode raw 32 bytes as a base58 ledger address.
#[must_use]
pub fn encode_address(bytes: &[u8; 32]) -> String {
    bs58::encode(bytes).into_string()
}

// ---------------------------------------------------------------------------
// ClaimIdentity
// ---------------------------------------------------------------------------

/// The recipient's wallet address; the uniqueness key for claims.
///
/// Always holds a canonical base58 string that decodes to 32 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClaimIdentity(String);

impl ClaimIdentity {
    /// Parse and validate a base58 wallet address.
    pub fn parse(encoded: &str) -> Result<Self, String> {
        let bytes = decode_address(encoded)
            .ok_or_else(|| format!("identity `{encoded}` is not a base58 32-byte address"))?;
        Ok(Self(encode_address(&bytes)))
    }

    #[must_use]
    pub fn from_public_key(bytes: &[u8; 32]) -> Self {
        Self(encode_address(bytes))
    }

    /// Raw public key bytes behind this identity.
    #[must_use]
    pub fn public_key_bytes(&self) -> [u8; 32] {
        // Construction guarantees the encoding is valid.
        decode_address(&self.0).unwrap_or([0u8; 32])
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identity viewed as a ledger account owner.
    #[must_use]
    pub fn as_account(&self) -> AccountRef {
        AccountRef(self.0.clone())
    }

    /// First eight characters, for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl TryFrom<String> for ClaimIdentity {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ClaimIdentity> for String {
    fn from(value: ClaimIdentity) -> Self {
        value.0
    }
}

impl fmt::Display for ClaimIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// AccountRef
// ---------------------------------------------------------------------------

/// A ledger account address (wallet owner or token account).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountRef(String);

impl AccountRef {
    pub fn parse(encoded: &str) -> Result<Self, String> {
        let bytes = decode_address(encoded)
            .ok_or_else(|| format!("account `{encoded}` is not a base58 32-byte address"))?;
        Ok(Self(encode_address(&bytes)))
    }

    #[must_use]
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(encode_address(bytes))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        decode_address(&self.0).unwrap_or([0u8; 32])
    }
}

impl TryFrom<String> for AccountRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AccountRef> for String {
    fn from(value: AccountRef) -> Self {
        value.0
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// AssetId
// ---------------------------------------------------------------------------

/// The mint address of the fungible token being disbursed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetId(String);

impl AssetId {
    pub fn parse(encoded: &str) -> Result<Self, String> {
        let bytes = decode_address(encoded)
            .ok_or_else(|| format!("asset `{encoded}` is not a base58 32-byte mint address"))?;
        Ok(Self(encode_address(&bytes)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        decode_address(&self.0).unwrap_or([0u8; 32])
    }
}

impl TryFrom<String> for AssetId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AssetId> for String {
    fn from(value: AssetId) -> Self {
        value.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// TransactionId
// ---------------------------------------------------------------------------

/// Ledger transaction identifier (the base58 first signature on Solana).
///
/// Opaque to TokenDrop: whatever the ledger client hands back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl TransactionId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYSTEM_PROGRAM: &str = "11111111111111111111111111111111";
    const CBS_MINT: &str = "B9z8cEWFmc7LvQtjKsaLoKqW5MJmGRCWqs1DPKupCfkk";

    #[test]
    fn identity_parses_valid_address() {
        let id = ClaimIdentity::parse(SYSTEM_PROGRAM).unwrap();
        assert_eq!(id.as_str(), SYSTEM_PROGRAM);
        assert_eq!(id.public_key_bytes(), [0u8; 32]);
    }

    #[test]
    fn identity_rejects_garbage() {
        assert!(ClaimIdentity::parse("not-base58-0OIl").is_err());
        assert!(ClaimIdentity::parse("").is_err());
        // Valid base58 but only a few bytes long.
        assert!(ClaimIdentity::parse("3yZe7d").is_err());
    }

    #[test]
    fn identity_trims_whitespace() {
        let id = ClaimIdentity::parse(&format!("  {CBS_MINT}\n")).unwrap();
        assert_eq!(id.as_str(), CBS_MINT);
    }

    #[test]
    fn identity_roundtrips_through_bytes() {
        let bytes = [7u8; 32];
        let id = ClaimIdentity::from_public_key(&bytes);
        assert_eq!(id.public_key_bytes(), bytes);
        assert_eq!(id.as_account().to_bytes(), bytes);
    }

    #[test]
    fn identity_serde_validates() {
        let ok: ClaimIdentity = serde_json::from_str(&format!("\"{CBS_MINT}\"")).unwrap();
        assert_eq!(ok.as_str(), CBS_MINT);
        assert!(serde_json::from_str::<ClaimIdentity>("\"nope\"").is_err());
    }

    #[test]
    fn asset_id_parses_mint() {
        let asset = AssetId::parse(CBS_MINT).unwrap();
        assert_eq!(asset.to_string(), CBS_MINT);
    }

    #[test]
    fn short_identity_is_prefix() {
        let id = ClaimIdentity::parse(CBS_MINT).unwrap();
        assert_eq!(id.short(), "B9z8cEWF");
    }
}
