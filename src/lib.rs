//! # LinkLockr Relayer
//!
//! Gas-profitability relay for LinkLockr paid links. Buyers ask the relay to
//! pay gas on their behalf; the relay agrees only when the platform fee it
//! earns covers the gas cost with margin to spare, then broadcasts the
//! purchase with its custodial key.
//!
//! ## Quick Start
//! ```bash
//! RELAYER_PRIVATE_KEY=0x... cargo run --bin relayer
//! ```
//!
//! ## Endpoints
//! - `GET /health` - Health check with basic metrics
//! - `POST /relay` - Decide profitability and broadcast a purchase
//! - `GET /tx/{tx_hash}` - Status of an earlier broadcast

pub mod chain;
pub mod config;
pub mod engine;
mod error;
mod handlers;
mod middleware;
pub mod oracle;
mod response;
mod router;
pub mod schemas;
mod state;
pub mod units;

pub use config::Config;
pub use error::Error;
pub use router::create as create_router;
pub use state::AppState;
