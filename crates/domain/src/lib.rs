//! # fusehub-domain
//!
//! Pure domain model for the fusehub device aggregation engine.
//!
//! ## Responsibilities
//! - Foundational types: identifiers, account sources, error conventions, timestamps
//! - Define **Device Records** (one physical device as seen by one account) and
//!   the key-union merge rule used to reconcile them
//! - Define the **local strategy** table and the data-point code/id resolver
//! - Define inbound **Envelopes** and the status items they carry
//! - Define outbound **Commands**, batch kinds and property-update normalization
//! - Define **Virtual Function** descriptors
//! - Define **Events** published to the host platform
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod account;
pub mod command;
pub mod device;
pub mod envelope;
pub mod event;
pub mod local_strategy;
pub mod resolver;
pub mod virtual_function;
