//! # fusehub-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `DeviceBackend` — one backend account: listing, message hook, commands
//!   - `VirtualFunctionRegistry` — virtual functions per device category
//!   - `EventPublisher` — platform notifications
//! - Define the **driving/inbound port** `MessageSink` that ingestion adapters
//!   hand decoded envelopes to
//! - Keep one `AccountStore` per backend account and fold them into the
//!   aggregated view (`Aggregator`)
//! - Route inbound envelopes (`InboundRouter`), track status deltas, classify
//!   and dispatch outbound commands (`classifier`, `Dispatcher`)
//! - Orchestrate all of the above behind `DeviceHub`
//! - Provide **in-process infrastructure** (event bus, virtual function
//!   registry) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `fusehub-domain` only (plus `tokio` for channels, tasks and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod aggregator;
pub mod classifier;
pub mod dispatcher;
pub mod event_bus;
pub mod hub;
pub mod options;
pub mod ports;
pub mod router;
pub mod status_delta;
pub mod store;
pub mod virtual_functions;
pub mod watcher;
