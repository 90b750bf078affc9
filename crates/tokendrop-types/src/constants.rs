//! System-wide constants and configuration defaults for TokenDrop.

/// Prefix of every claim key in the claim store.
pub const CLAIM_KEY_PREFIX: &str = "claim:";

/// Default tag that opens every signed claim message (`<tag>:<identity>:<ts>`).
pub const DEFAULT_PROGRAM_TAG: &str = "CBS_AIRDROP";

/// Default freshness window for signed claim messages, in seconds.
pub const DEFAULT_MESSAGE_FRESHNESS_SECS: u64 = 600;

/// Maximum tolerated clock skew for message timestamps in the future, in seconds.
pub const MAX_MESSAGE_FUTURE_SKEW_SECS: u64 = 60;

/// Default staleness window for external payment transactions, in seconds.
pub const DEFAULT_PAYMENT_STALENESS_SECS: u64 = 1800;

/// Default TTL of a LOCKED claim record, in seconds. After this a crashed
/// holder's lock lapses and the identity may retry.
pub const DEFAULT_CLAIM_LOCK_TTL_SECS: u64 = 120;

/// Minimum headroom of the claim lock TTL over the transfer timeout, in
/// seconds. Covers confirmation polling and the finalize write.
pub const CLAIM_LOCK_TTL_MARGIN_SECS: u64 = 10;

/// Default upper bound on the whole transfer phase, in seconds.
pub const DEFAULT_TRANSFER_TIMEOUT_SECS: u64 = 60;

/// Attempts at writing the FINALIZED record after a confirmed transfer
/// before falling back to a permanent marker.
pub const FINALIZE_ATTEMPTS: u32 = 4;

/// First backoff between finalize attempts, in milliseconds. Doubles on
/// each retry.
pub const FINALIZE_BACKOFF_MS: u64 = 50;

/// Interval between confirmation status polls, in milliseconds.
pub const DEFAULT_CONFIRM_POLL_INTERVAL_MS: u64 = 500;

/// Default human amount disbursed per claim.
pub const DEFAULT_ASSET_AMOUNT: u64 = 250;

/// Decimals of the ledger's native currency (SOL → lamports).
pub const NATIVE_DECIMALS: u8 = 9;

/// Largest decimals value accepted for an asset. `10^19` is the last power
/// of ten that fits a `u64`.
pub const MAX_ASSET_DECIMALS: u8 = 19;

/// Default HTTP listen address.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Claim store endpoint selecting the in-process store.
pub const MEMORY_ENDPOINT: &str = "memory";

/// URL scheme selecting the `SQLite`-backed claim store.
pub const SQLITE_SCHEME: &str = "sqlite://";

/// Default claim store endpoint.
pub const DEFAULT_CLAIM_STORE_ENDPOINT: &str = "sqlite://tokendrop-claims.db";

/// Default ledger endpoint.
pub const DEFAULT_LEDGER_ENDPOINT: &str = MEMORY_ENDPOINT;

/// Default CORS allow-list (first entry is the fallback origin).
pub const DEFAULT_ALLOW_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:5500";

/// Maximum accepted request body, in bytes.
pub const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service name.
pub const SERVICE_NAME: &str = "TokenDrop";
