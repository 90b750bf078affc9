//! Configuration for a TokenDrop deployment.
//!
//! One [`ServiceConfig`] parameterizes the whole disbursement policy:
//! which asset, how much, how callers prove they may claim, and where
//! claims are recorded. It is loaded once from the process environment
//! with Figment and converted into typed values at startup; any
//! [`ConfigError`] aborts the process before it serves a request.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use figment::Figment;
use figment::providers::Env;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{AccountRef, AssetId, ConfigError, SigningCredential, amount, constants};

/// Environment variables read by [`ServiceConfig::from_env`].
pub const ENV_KEYS: &[&str] = &[
    "LEDGER_ENDPOINT",
    "RPC_PROXY_ENDPOINT",
    "SIGNING_CREDENTIAL",
    "ASSET_ID",
    "ASSET_AMOUNT",
    "ASSET_DECIMALS",
    "TREASURY_ADDRESS",
    "MIN_PAYMENT_AMOUNT",
    "MESSAGE_FRESHNESS_WINDOW",
    "PAYMENT_STALENESS_WINDOW",
    "CLAIM_STORE_ENDPOINT",
    "CLAIM_LOCK_TTL",
    "CLAIM_COOLDOWN",
    "TRANSFER_TIMEOUT",
    "VERIFIER_MODE",
    "PROGRAM_TAG",
    "ACCOUNT_CREATION_PAYER",
    "ALLOW_ORIGINS",
    "LISTEN_ADDR",
    "LOG_FORMAT",
];

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

/// How callers authorize a claim. Exactly one per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifierMode {
    /// Caller signs `<tag>:<identity>:<timestamp>` with their wallet key.
    #[default]
    #[serde(alias = "signed-message", alias = "SIGNED_MESSAGE")]
    SignedMessage,
    /// Caller references a payment they made to the treasury.
    #[serde(alias = "external-payment", alias = "EXTERNAL_PAYMENT")]
    ExternalPayment,
}

/// Who pays rent when the recipient's token account must be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountCreationPayer {
    #[default]
    Treasury,
    Recipient,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Where claim records live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimStoreEndpoint {
    /// In-process map. Not durable across restarts.
    Memory,
    /// `SQLite` database file.
    Sqlite(PathBuf),
}

/// Where the ledger lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEndpoint {
    /// In-process simulated ledger (development only).
    Memory,
    /// JSON-RPC URL of a ledger node.
    Rpc(String),
}

impl LedgerEndpoint {
    #[must_use]
    pub fn rpc_url(&self) -> Option<&str> {
        match self {
            Self::Memory => None,
            Self::Rpc(url) => Some(url),
        }
    }
}

// ---------------------------------------------------------------------------
// Typed pieces
// ---------------------------------------------------------------------------

/// Static description of the asset being disbursed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Mint address.
    pub asset_id: AssetId,
    /// Human amount sent per claim.
    pub unit_amount: Decimal,
    /// Operator-declared decimals. Only a cross-check: the live mint wins.
    pub declared_decimals: Option<u8>,
}

/// A string that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(<redacted>)")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        lenient::string(deserializer).map(Self)
    }
}

// ---------------------------------------------------------------------------
// ServiceConfig
// ---------------------------------------------------------------------------

/// Raw deployment configuration, one field per environment variable.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// `memory` or a JSON-RPC URL.
    #[serde(default = "default_ledger_endpoint", deserialize_with = "lenient::string")]
    pub ledger_endpoint: String,
    /// Upstream JSON-RPC URL for `/api/rpc`. Falls back to an http(s)
    /// `LEDGER_ENDPOINT`; unset with a memory ledger disables the proxy.
    /// Redacted because node URLs often embed an API key.
    #[serde(default)]
    pub rpc_proxy_endpoint: Option<SecretString>,
    #[serde(default)]
    pub signing_credential: Option<SecretString>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub asset_id: Option<String>,
    #[serde(default = "default_asset_amount", deserialize_with = "lenient::decimal")]
    pub asset_amount: Decimal,
    #[serde(default)]
    pub asset_decimals: Option<u8>,
    /// Defaults to the signing credential's address.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub treasury_address: Option<String>,
    /// Minimum payment in native units (SOL). Payment mode only.
    #[serde(default, deserialize_with = "lenient::opt_decimal")]
    pub min_payment_amount: Option<Decimal>,
    /// Seconds.
    #[serde(default = "default_freshness")]
    pub message_freshness_window: u64,
    /// Seconds.
    #[serde(default = "default_staleness")]
    pub payment_staleness_window: u64,
    /// `memory` or `sqlite://<path>`.
    #[serde(default = "default_claim_store", deserialize_with = "lenient::string")]
    pub claim_store_endpoint: String,
    /// Seconds.
    #[serde(default = "default_lock_ttl")]
    pub claim_lock_ttl: u64,
    /// Seconds after which a finalized identity may claim again. Unset means never.
    #[serde(default)]
    pub claim_cooldown: Option<u64>,
    /// Seconds.
    #[serde(default = "default_transfer_timeout")]
    pub transfer_timeout: u64,
    #[serde(default)]
    pub verifier_mode: VerifierMode,
    #[serde(default = "default_program_tag", deserialize_with = "lenient::string")]
    pub program_tag: String,
    #[serde(default)]
    pub account_creation_payer: AccountCreationPayer,
    /// Comma-separated; the first entry is the fallback origin.
    #[serde(default = "default_allow_origins", deserialize_with = "lenient::string")]
    pub allow_origins: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_ledger_endpoint() -> String {
    constants::DEFAULT_LEDGER_ENDPOINT.to_string()
}

fn default_asset_amount() -> Decimal {
    Decimal::from(constants::DEFAULT_ASSET_AMOUNT)
}

fn default_freshness() -> u64 {
    constants::DEFAULT_MESSAGE_FRESHNESS_SECS
}

fn default_staleness() -> u64 {
    constants::DEFAULT_PAYMENT_STALENESS_SECS
}

fn default_claim_store() -> String {
    constants::DEFAULT_CLAIM_STORE_ENDPOINT.to_string()
}

fn default_lock_ttl() -> u64 {
    constants::DEFAULT_CLAIM_LOCK_TTL_SECS
}

fn default_transfer_timeout() -> u64 {
    constants::DEFAULT_TRANSFER_TIMEOUT_SECS
}

fn default_program_tag() -> String {
    constants::DEFAULT_PROGRAM_TAG.to_string()
}

fn default_allow_origins() -> String {
    constants::DEFAULT_ALLOW_ORIGINS.to_string()
}

fn default_listen_addr() -> SocketAddr {
    constants::DEFAULT_LISTEN_ADDR
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 8080)))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            ledger_endpoint: default_ledger_endpoint(),
            rpc_proxy_endpoint: None,
            signing_credential: None,
            asset_id: None,
            asset_amount: default_asset_amount(),
            asset_decimals: None,
            treasury_address: None,
            min_payment_amount: None,
            message_freshness_window: default_freshness(),
            payment_staleness_window: default_staleness(),
            claim_store_endpoint: default_claim_store(),
            claim_lock_ttl: default_lock_ttl(),
            claim_cooldown: None,
            transfer_timeout: default_transfer_timeout(),
            verifier_mode: VerifierMode::default(),
            program_tag: default_program_tag(),
            account_creation_payer: AccountCreationPayer::default(),
            allow_origins: default_allow_origins(),
            listen_addr: default_listen_addr(),
            log_format: LogFormat::default(),
        }
    }
}

impl ServiceConfig {
    /// Figment reading exactly [`ENV_KEYS`] from the process environment.
    #[must_use]
    pub fn figment() -> Figment {
        Figment::new().merge(Env::raw().only(ENV_KEYS))
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment())
    }

    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        figment
            .extract()
            .map_err(|e| ConfigError::invalid("environment", e))
    }

    /// Run every typed conversion once so misconfiguration fails at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let credential = self.signing_credential()?;
        self.asset_config()?;
        self.treasury_address(&credential)?;
        self.claim_store()?;
        self.ledger()?;
        self.rpc_proxy_url()?;
        if self.verifier_mode == VerifierMode::ExternalPayment {
            self.min_payment_lamports()?;
        }
        if self.program_tag.trim().is_empty() {
            return Err(ConfigError::invalid("PROGRAM_TAG", "must not be empty"));
        }
        if self.allowed_origins().is_empty() {
            return Err(ConfigError::invalid("ALLOW_ORIGINS", "needs at least one origin"));
        }
        if self.transfer_timeout == 0 {
            return Err(ConfigError::invalid("TRANSFER_TIMEOUT", "must be positive"));
        }
        // The lock must outlive the whole transfer phase, or a second request
        // for the same identity can take it over while the first is paying.
        let min_ttl = self
            .transfer_timeout
            .saturating_add(constants::CLAIM_LOCK_TTL_MARGIN_SECS);
        if self.claim_lock_ttl < min_ttl {
            return Err(ConfigError::invalid(
                "CLAIM_LOCK_TTL",
                format!(
                    "must be at least TRANSFER_TIMEOUT + {}s ({min_ttl}s), got {}s",
                    constants::CLAIM_LOCK_TTL_MARGIN_SECS,
                    self.claim_lock_ttl
                ),
            ));
        }
        Ok(())
    }

    pub fn signing_credential(&self) -> Result<SigningCredential, ConfigError> {
        let raw = self
            .signing_credential
            .as_ref()
            .ok_or(ConfigError::MissingCredential)?;
        SigningCredential::parse(raw.expose())
    }

    pub fn asset_config(&self) -> Result<AssetConfig, ConfigError> {
        let raw = self
            .asset_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingAssetConfig { field: "ASSET_ID" })?;
        let asset_id = AssetId::parse(raw).map_err(|e| ConfigError::invalid("ASSET_ID", e))?;

        if self.asset_amount <= Decimal::ZERO {
            return Err(ConfigError::invalid("ASSET_AMOUNT", "must be positive"));
        }
        if let Some(decimals) = self.asset_decimals {
            if decimals > constants::MAX_ASSET_DECIMALS {
                return Err(ConfigError::invalid(
                    "ASSET_DECIMALS",
                    format!("{decimals} exceeds {}", constants::MAX_ASSET_DECIMALS),
                ));
            }
        }

        Ok(AssetConfig {
            asset_id,
            unit_amount: self.asset_amount,
            declared_decimals: self.asset_decimals,
        })
    }

    /// The treasury wallet: `TREASURY_ADDRESS`, or the credential's address.
    pub fn treasury_address(&self, credential: &SigningCredential) -> Result<AccountRef, ConfigError> {
        match self.treasury_address.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(raw) => AccountRef::parse(raw).map_err(|e| ConfigError::invalid("TREASURY_ADDRESS", e)),
            None => Ok(credential.address()),
        }
    }

    /// Minimum treasury payment in lamports (external payment mode).
    pub fn min_payment_lamports(&self) -> Result<u64, ConfigError> {
        let human = self.min_payment_amount.ok_or(ConfigError::invalid(
            "MIN_PAYMENT_AMOUNT",
            "required when VERIFIER_MODE=external_payment",
        ))?;
        if human <= Decimal::ZERO {
            return Err(ConfigError::invalid("MIN_PAYMENT_AMOUNT", "must be positive"));
        }
        amount::to_base_units(human, constants::NATIVE_DECIMALS)
            .map_err(|e| ConfigError::invalid("MIN_PAYMENT_AMOUNT", e))
    }

    pub fn claim_store(&self) -> Result<ClaimStoreEndpoint, ConfigError> {
        let raw = self.claim_store_endpoint.trim();
        if raw.eq_ignore_ascii_case(constants::MEMORY_ENDPOINT) {
            return Ok(ClaimStoreEndpoint::Memory);
        }
        match raw.strip_prefix(constants::SQLITE_SCHEME) {
            Some(path) if !path.is_empty() => Ok(ClaimStoreEndpoint::Sqlite(PathBuf::from(path))),
            _ => Err(ConfigError::invalid(
                "CLAIM_STORE_ENDPOINT",
                format!("expected `memory` or `sqlite://<path>`, got `{raw}`"),
            )),
        }
    }

    pub fn ledger(&self) -> Result<LedgerEndpoint, ConfigError> {
        let raw = self.ledger_endpoint.trim();
        if raw.eq_ignore_ascii_case(constants::MEMORY_ENDPOINT) {
            return Ok(LedgerEndpoint::Memory);
        }
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return Ok(LedgerEndpoint::Rpc(raw.to_string()));
        }
        Err(ConfigError::invalid(
            "LEDGER_ENDPOINT",
            format!("expected `memory` or an http(s) URL, got `{raw}`"),
        ))
    }

    /// Upstream for the JSON-RPC proxy, if enabled.
    pub fn rpc_proxy_url(&self) -> Result<Option<String>, ConfigError> {
        let explicit = self
            .rpc_proxy_endpoint
            .as_ref()
            .map(|s| s.expose().trim())
            .filter(|s| !s.is_empty());
        match explicit {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => Ok(Some(url.to_string())),
            Some(other) => Err(ConfigError::invalid(
                "RPC_PROXY_ENDPOINT",
                format!("expected an http(s) URL, got `{other}`"),
            )),
            None => Ok(self.ledger()?.rpc_url().map(ToString::to_string)),
        }
    }

    #[must_use]
    pub fn allowed_origins(&self) -> Vec<String> {
        self.allow_origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect()
    }

    #[must_use]
    pub fn message_freshness(&self) -> Duration {
        Duration::from_secs(self.message_freshness_window)
    }

    #[must_use]
    pub fn payment_staleness(&self) -> Duration {
        Duration::from_secs(self.payment_staleness_window)
    }

    #[must_use]
    pub fn claim_lock_ttl(&self) -> Duration {
        Duration::from_secs(self.claim_lock_ttl)
    }

    #[must_use]
    pub fn claim_cooldown(&self) -> Option<Duration> {
        self.claim_cooldown.map(Duration::from_secs)
    }

    #[must_use]
    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout)
    }
}

/// Deserializers that tolerate Figment parsing env values into numbers,
/// booleans or arrays when the field wants text.
mod lenient {
    use super::{Decimal, Deserialize, Deserializer, FromStr};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
        Flag(bool),
        Bytes(Vec<u8>),
    }

    impl Scalar {
        fn into_text(self) -> String {
            match self {
                Self::Text(s) => s,
                Self::Unsigned(n) => n.to_string(),
                Self::Signed(n) => n.to_string(),
                Self::Float(n) => n.to_string(),
                Self::Flag(b) => b.to_string(),
                Self::Bytes(bytes) => serde_json::to_string(&bytes).unwrap_or_default(),
            }
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Scalar::deserialize(deserializer).map(Scalar::into_text)
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        string(deserializer).map(Some)
    }

    pub fn decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        let text = string(deserializer)?;
        Decimal::from_str(text.trim()).map_err(serde::de::Error::custom)
    }

    pub fn opt_decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Decimal>, D::Error> {
        decimal(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    use super::*;

    const CBS_MINT: &str = "B9z8cEWFmc7LvQtjKsaLoKqW5MJmGRCWqs1DPKupCfkk";

    fn keypair_json() -> String {
        let key = SigningKey::generate(&mut OsRng);
        serde_json::to_string(&key.to_keypair_bytes().to_vec()).unwrap()
    }

    fn minimal() -> ServiceConfig {
        ServiceConfig {
            signing_credential: Some(SecretString::new(keypair_json())),
            asset_id: Some(CBS_MINT.to_string()),
            ..ServiceConfig::default()
        }
    }

    #[test]
    fn defaults_are_sane() {
        let cfg = ServiceConfig::default();
        assert_eq!(cfg.asset_amount, Decimal::from(250));
        assert_eq!(cfg.message_freshness(), Duration::from_secs(600));
        assert_eq!(cfg.payment_staleness(), Duration::from_secs(1800));
        assert_eq!(cfg.verifier_mode, VerifierMode::SignedMessage);
        assert_eq!(cfg.program_tag, "CBS_AIRDROP");
        assert!(cfg.claim_cooldown().is_none());
    }

    #[test]
    fn minimal_config_validates() {
        let cfg = minimal();
        cfg.validate().unwrap();
        let credential = cfg.signing_credential().unwrap();
        assert_eq!(cfg.treasury_address(&credential).unwrap(), credential.address());
    }

    #[test]
    fn missing_credential_is_config_error() {
        let cfg = ServiceConfig {
            signing_credential: None,
            ..minimal()
        };
        assert_eq!(cfg.validate().unwrap_err(), ConfigError::MissingCredential);
    }

    #[test]
    fn missing_asset_is_config_error() {
        let cfg = ServiceConfig {
            asset_id: None,
            ..minimal()
        };
        assert_eq!(
            cfg.validate().unwrap_err(),
            ConfigError::MissingAssetConfig { field: "ASSET_ID" }
        );
    }

    #[test]
    fn payment_mode_requires_minimum() {
        let mut cfg = ServiceConfig {
            verifier_mode: VerifierMode::ExternalPayment,
            ..minimal()
        };
        assert!(matches!(
            cfg.validate().unwrap_err(),
            ConfigError::Invalid { field: "MIN_PAYMENT_AMOUNT", .. }
        ));
        cfg.min_payment_amount = Some(Decimal::new(5, 2));
        cfg.validate().unwrap();
        assert_eq!(cfg.min_payment_lamports().unwrap(), 50_000_000);
    }

    #[test]
    fn claim_store_endpoints() {
        let mut cfg = minimal();
        cfg.claim_store_endpoint = "memory".into();
        assert_eq!(cfg.claim_store().unwrap(), ClaimStoreEndpoint::Memory);
        cfg.claim_store_endpoint = "sqlite:///var/lib/tokendrop/claims.db".into();
        assert_eq!(
            cfg.claim_store().unwrap(),
            ClaimStoreEndpoint::Sqlite(PathBuf::from("/var/lib/tokendrop/claims.db"))
        );
        cfg.claim_store_endpoint = "redis://localhost".into();
        assert!(cfg.claim_store().is_err());
    }

    #[test]
    fn ledger_endpoints() {
        let mut cfg = minimal();
        assert_eq!(cfg.ledger().unwrap(), LedgerEndpoint::Memory);
        cfg.ledger_endpoint = "https://api.mainnet-beta.solana.com".into();
        assert!(matches!(cfg.ledger().unwrap(), LedgerEndpoint::Rpc(_)));
        cfg.ledger_endpoint = "ftp://nope".into();
        assert!(cfg.ledger().is_err());
    }

    #[test]
    fn rpc_proxy_is_independent_of_ledger_backend() {
        let mut cfg = minimal();
        assert_eq!(cfg.rpc_proxy_url().unwrap(), None);

        cfg.rpc_proxy_endpoint = Some(SecretString::new("https://rpc.example/?api-key=k"));
        assert_eq!(
            cfg.rpc_proxy_url().unwrap().as_deref(),
            Some("https://rpc.example/?api-key=k")
        );
        assert_eq!(cfg.ledger().unwrap(), LedgerEndpoint::Memory);
        cfg.validate().unwrap();
        assert!(!format!("{cfg:?}").contains("api-key"));

        cfg.rpc_proxy_endpoint = Some(SecretString::new("rpc.example"));
        assert!(matches!(
            cfg.validate().unwrap_err(),
            ConfigError::Invalid { field: "RPC_PROXY_ENDPOINT", .. }
        ));
    }

    #[test]
    fn rpc_proxy_falls_back_to_rpc_ledger() {
        let cfg = ServiceConfig {
            ledger_endpoint: "https://node.example".into(),
            ..minimal()
        };
        assert_eq!(cfg.rpc_proxy_url().unwrap().as_deref(), Some("https://node.example"));
    }

    #[test]
    fn lock_ttl_must_outlive_transfer() {
        for ttl in [0, 30, 60, 69] {
            let cfg = ServiceConfig {
                claim_lock_ttl: ttl,
                transfer_timeout: 60,
                ..minimal()
            };
            assert!(
                matches!(
                    cfg.validate().unwrap_err(),
                    ConfigError::Invalid { field: "CLAIM_LOCK_TTL", .. }
                ),
                "ttl {ttl} accepted"
            );
        }
        let cfg = ServiceConfig {
            claim_lock_ttl: 70,
            transfer_timeout: 60,
            ..minimal()
        };
        cfg.validate().unwrap();
    }

    #[test]
    fn origins_split_and_trim() {
        let cfg = ServiceConfig {
            allow_origins: " https://a.example , ,https://b.example".into(),
            ..minimal()
        };
        assert_eq!(
            cfg.allowed_origins(),
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn secret_debug_is_redacted() {
        let cfg = minimal();
        let dbg = format!("{cfg:?}");
        assert!(dbg.contains("<redacted>"));
        assert!(!dbg.contains(cfg.signing_credential.as_ref().unwrap().expose()));
    }

    #[test]
    fn loads_from_environment() {
        let credential = keypair_json();
        figment::Jail::expect_with(|jail| {
            jail.set_env("ASSET_ID", CBS_MINT);
            jail.set_env("ASSET_AMOUNT", "50000");
            jail.set_env("ASSET_DECIMALS", "5");
            jail.set_env("SIGNING_CREDENTIAL", &credential);
            jail.set_env("VERIFIER_MODE", "external_payment");
            jail.set_env("MIN_PAYMENT_AMOUNT", "0.25");
            jail.set_env("CLAIM_STORE_ENDPOINT", "memory");
            jail.set_env("MESSAGE_FRESHNESS_WINDOW", "300");
            jail.set_env("ALLOW_ORIGINS", "https://cbs-coin.vercel.app");
            jail.set_env("RPC_PROXY_ENDPOINT", "https://rpc.example");

            let cfg = ServiceConfig::from_env().map_err(|e| e.to_string())?;
            assert_eq!(cfg.asset_amount, Decimal::from(50_000));
            assert_eq!(cfg.asset_decimals, Some(5));
            assert_eq!(cfg.verifier_mode, VerifierMode::ExternalPayment);
            assert_eq!(cfg.min_payment_lamports().map_err(|e| e.to_string())?, 250_000_000);
            assert_eq!(cfg.message_freshness(), Duration::from_secs(300));
            assert_eq!(cfg.claim_store().map_err(|e| e.to_string())?, ClaimStoreEndpoint::Memory);
            assert_eq!(cfg.ledger().map_err(|e| e.to_string())?, LedgerEndpoint::Memory);
            assert_eq!(
                cfg.rpc_proxy_url().map_err(|e| e.to_string())?.as_deref(),
                Some("https://rpc.example")
            );
            cfg.validate().map_err(|e| e.to_string())?;
            Ok(())
        });
    }

    #[test]
    fn environment_with_bad_mode_fails() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("VERIFIER_MODE", "trust_me");
            assert!(ServiceConfig::from_env().is_err());
            Ok(())
        });
    }
}
