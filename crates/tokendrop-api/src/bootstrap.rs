//! Startup wiring: configuration → ledger, claim store, service, state.

use std::sync::Arc;

use tokendrop_settlement::{DisbursementService, InMemoryLedger, open_claim_store};
use tokendrop_types::{ConfigError, LedgerClient, LedgerEndpoint, ServiceConfig, TokendropError, constants};

use crate::cors::CorsPolicy;
use crate::handlers::rpc::RpcProxy;
use crate::state::AppState;

/// Build handler state using the ledger named by `LEDGER_ENDPOINT`.
///
/// Only the in-process ledger is built in. Deployments against a real
/// ledger node embed the service and pass their own client to
/// [`build_state_with_ledger`].
pub fn build_state(config: &ServiceConfig) -> Result<AppState, TokendropError> {
    config.validate()?;
    let ledger: Arc<dyn LedgerClient> = match config.ledger()? {
        LedgerEndpoint::Memory => Arc::new(development_ledger(config)?),
        LedgerEndpoint::Rpc(_) => {
            return Err(ConfigError::invalid(
                "LEDGER_ENDPOINT",
                "this binary only ships the in-memory ledger; set LEDGER_ENDPOINT=memory or embed a LedgerClient",
            )
            .into());
        }
    };
    build_state_with_ledger(config, ledger)
}

/// Build handler state around a caller-supplied ledger client.
///
/// The `/api/rpc` proxy is enabled by `RPC_PROXY_ENDPOINT`, or by an RPC
/// `LEDGER_ENDPOINT` when no separate proxy target is set.
pub fn build_state_with_ledger(
    config: &ServiceConfig,
    ledger: Arc<dyn LedgerClient>,
) -> Result<AppState, TokendropError> {
    let store = open_claim_store(&config.claim_store()?)?;
    let service = DisbursementService::from_config(config, ledger, store)?;

    tracing::info!(
        asset = %service.asset().asset_id,
        amount = %service.asset().unit_amount,
        treasury = %service.treasury(),
        mode = ?service.verifier_mode(),
        "Disbursement service configured"
    );

    let mut state = AppState::new(Arc::new(service), CorsPolicy::new(config.allowed_origins()));
    if let Some(url) = config.rpc_proxy_url()? {
        let proxy = RpcProxy::new(url).map_err(|e| TokendropError::Internal(format!("rpc proxy client: {e}")))?;
        state = state.with_rpc_proxy(proxy);
    }
    Ok(state)
}

/// In-process ledger with the configured mint and a funded treasury.
fn development_ledger(config: &ServiceConfig) -> Result<InMemoryLedger, ConfigError> {
    let asset = config.asset_config()?;
    let credential = config.signing_credential()?;
    let treasury = config.treasury_address(&credential)?;
    let decimals = asset.declared_decimals.unwrap_or(constants::NATIVE_DECIMALS);

    let ledger = InMemoryLedger::new();
    ledger.add_asset(&asset.asset_id, decimals);
    ledger.fund(&treasury, &asset.asset_id, u64::MAX / 2);
    tracing::warn!(
        asset = %asset.asset_id,
        decimals,
        "Using in-memory ledger: no real tokens will move"
    );
    Ok(ledger)
}
