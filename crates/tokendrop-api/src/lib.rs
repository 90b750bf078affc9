//! # tokendrop-api
//!
//! HTTP transport for the TokenDrop disbursement service.
//!
//! ## Routes
//!
//! - `POST /api/claim` (alias `/api/airdrop`): request a disbursement
//! - `POST /api/rpc`: JSON-RPC pass-through to the ledger node
//! - `GET /health`, `GET /ready`: liveness and claim store readiness
//!
//! Every response carries CORS headers; `OPTIONS` preflights get 204.

pub mod bootstrap;
pub mod cors;
pub mod handlers;
pub mod logging;
pub mod router;
pub mod state;
pub mod wire;

pub use bootstrap::{build_state, build_state_with_ledger};
pub use cors::CorsPolicy;
pub use handlers::rpc::RpcProxy;
pub use logging::init_tracing;
pub use router::{build_router, serve};
pub use state::AppState;
pub use wire::{ClaimBody, ClaimResponse};
