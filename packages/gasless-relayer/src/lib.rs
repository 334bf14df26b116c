//! # Gasless Relayer
//!
//! Keeps the custodial fee-payer wallet of a gasless relayer solvent.
//! Users pay relay fees in a token; the wallet pays network fees in the
//! native currency. A periodic fund manager tops the native balance up from
//! a faucet, converts accumulated fee tokens back into the native currency
//! (or forwards them to the operator), and an admission gate refuses
//! fee-paying requests while the wallet cannot cover them.
//!
//! ## Quick Start
//! ```bash
//! RELAYER_TOKEN_MINT=<mint> RELAYER_OPERATOR_ADDRESS=<pubkey> \
//! RELAYER_KEYPAIR_PATH=~/.config/solana/id.json cargo run --bin gasless-relayer
//! ```
//!
//! ## Endpoints
//! - `GET /health` - Wallet, RPC and scheduler health
//! - `GET /metrics` - Prometheus metrics
//! - `GET /fund-manager/status` - Scheduler status
//! - `POST /fund-manager/trigger` - Start an out-of-band maintenance cycle

pub mod admission;
pub mod config;
mod error;
mod handlers;
pub mod inspector;
pub mod integrity;
pub mod key_store;
pub mod ledger;
pub mod maintenance;
pub mod metrics;
mod middleware;
pub mod replenish;
mod response;
mod router;
mod state;
pub mod surplus;
pub mod sweep;
pub mod wallet;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::Error;
pub use maintenance::MaintenanceScheduler;
pub use router::create as create_router;
pub use router::{create_with, guarded};
pub use state::AppState;
