//! # cubelink-app
//!
//! Application layer: the **cube facade**, channel handlers and **port
//! definitions** (traits).
//!
//! ## Responsibilities
//! - Define the **transport port** that radio adapters implement:
//!   - `Transport`: connect, discover sub-channels, disconnect
//!   - `SubChannel`: write, read, subscribe to notifications
//! - Bind one **channel handler** per discovered domain and pump its
//!   notifications through the domain decoders
//! - Correlate request/reply exchanges through **pending-reply slots**
//!   bounded by timeouts
//! - Negotiate the protocol version once per connection
//! - Publish decoded events on an in-process **event bus**
//! - Expose everything through the `Cube` facade
//!
//! ## Dependency rule
//! Depends on `cubelink-domain` only (plus `tokio` for sync primitives,
//! timers and notification pumps). Never imports adapter crates.

mod channels;
mod negotiator;
mod pending;

pub mod config;
pub mod cube;
pub mod event_bus;
pub mod ports;
pub mod router;

pub use config::CubeConfig;
pub use cube::{ConnectionState, Cube};
pub use event_bus::EventBus;
