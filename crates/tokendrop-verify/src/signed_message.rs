//! Signed-message verification.
//!
//! The claimant signs `<tag>:<identity>:<unix_ts>` with their wallet key.
//! Checks run in a fixed order so the reported reason is deterministic:
//!
//! 1. template parse → `BadFormat`
//! 2. identity field equals the claimant → `BuyerMismatch`
//! 3. ed25519 signature over the exact message bytes → `InvalidSignature`
//! 4. timestamp freshness → `MessageExpired`
//!
//! There is no replay store. A replayed message can at most re-request the
//! same identity's claim, which the claim lock already refuses.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use tokendrop_types::constants::MAX_MESSAGE_FUTURE_SKEW_SECS;
use tokendrop_types::{ClaimIdentity, VerificationError};

/// A claim message split into its three fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimMessage<'a> {
    pub tag: &'a str,
    pub identity: &'a str,
    pub issued_at: i64,
}

impl<'a> ClaimMessage<'a> {
    /// Split `message` on its last two colons.
    pub fn parse(message: &'a str) -> Result<Self, VerificationError> {
        let mut parts = message.rsplitn(3, ':');
        let (Some(ts), Some(identity), Some(tag)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(VerificationError::bad_format(
                "message must be <tag>:<identity>:<timestamp>",
            ));
        };
        if tag.is_empty() || identity.is_empty() {
            return Err(VerificationError::bad_format("empty message field"));
        }
        let issued_at = ts
            .parse::<i64>()
            .map_err(|_| VerificationError::bad_format(format!("timestamp `{ts}` is not an integer")))?;
        Ok(Self {
            tag,
            identity,
            issued_at,
        })
    }
}

/// Render the message a claimant must sign.
#[must_use]
pub fn render_claim_message(tag: &str, identity: &ClaimIdentity, issued_at: i64) -> String {
    format!("{tag}:{identity}:{issued_at}")
}

/// Verifies ed25519-signed claim messages.
#[derive(Debug, Clone)]
pub struct SignedMessageVerifier {
    program_tag: String,
    freshness: Duration,
    future_skew: Duration,
}

impl SignedMessageVerifier {
    pub fn new(program_tag: impl Into<String>, freshness: Duration) -> Self {
        Self {
            program_tag: program_tag.into(),
            freshness,
            future_skew: Duration::from_secs(MAX_MESSAGE_FUTURE_SKEW_SECS),
        }
    }

    #[must_use]
    pub fn program_tag(&self) -> &str {
        &self.program_tag
    }

    /// Returns the message timestamp on success.
    pub fn verify(
        &self,
        identity: &ClaimIdentity,
        message: &str,
        signature_base64: &str,
        now: DateTime<Utc>,
    ) -> Result<i64, VerificationError> {
        let parsed = ClaimMessage::parse(message)?;
        if parsed.tag != self.program_tag {
            return Err(VerificationError::bad_format(format!(
                "unexpected program tag `{}`",
                parsed.tag
            )));
        }

        if parsed.identity != identity.as_str() {
            return Err(VerificationError::BuyerMismatch);
        }

        verify_signature(identity, message.as_bytes(), signature_base64)?;

        self.check_freshness(parsed.issued_at, now)?;
        Ok(parsed.issued_at)
    }

    fn check_freshness(&self, issued_at: i64, now: DateTime<Utc>) -> Result<(), VerificationError> {
        let now = now.timestamp();
        let window = i64::try_from(self.freshness.as_secs()).unwrap_or(i64::MAX);
        let skew = i64::try_from(self.future_skew.as_secs()).unwrap_or(i64::MAX);

        if now.saturating_sub(issued_at) > window || issued_at.saturating_sub(now) > skew {
            return Err(VerificationError::MessageExpired);
        }
        Ok(())
    }
}

fn verify_signature(
    identity: &ClaimIdentity,
    message: &[u8],
    signature_base64: &str,
) -> Result<(), VerificationError> {
    let raw = STANDARD
        .decode(signature_base64.trim())
        .map_err(|_| VerificationError::InvalidSignature)?;
    let signature = Signature::from_slice(&raw).map_err(|_| VerificationError::InvalidSignature)?;
    let key = VerifyingKey::from_bytes(&identity.public_key_bytes())
        .map_err(|_| VerificationError::InvalidSignature)?;
    key.verify(message, &signature)
        .map_err(|_| VerificationError::InvalidSignature)
}
