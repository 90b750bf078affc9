//! Shared handler state.

use std::sync::Arc;

use tokendrop_settlement::DisbursementService;

use crate::cors::CorsPolicy;
use crate::handlers::rpc::RpcProxy;

/// Everything a request handler needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DisbursementService>,
    pub cors: Arc<CorsPolicy>,
    /// `None` when the ledger is in-process and there is nothing to proxy to.
    pub rpc: Option<RpcProxy>,
}

impl AppState {
    pub fn new(service: Arc<DisbursementService>, cors: CorsPolicy) -> Self {
        Self {
            service,
            cors: Arc::new(cors),
            rpc: None,
        }
    }

    #[must_use]
    pub fn with_rpc_proxy(mut self, proxy: RpcProxy) -> Self {
        self.rpc = Some(proxy);
        self
    }
}
