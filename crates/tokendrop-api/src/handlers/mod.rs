pub mod claim;
pub mod health;
pub mod rpc;
