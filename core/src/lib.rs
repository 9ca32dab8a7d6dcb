//! # rsocket-flow-core
//!
//! This crate provides the core types for [`rsocket-flow`](https://docs.rs/rsocket-flow).
//! It includes the credit counter, payloads, stream identifiers, error types and the
//! reactive-streams capability traits shared by the state machines in
//! [`rsocket-flow-stream`](https://docs.rs/rsocket-flow-stream).

mod allowance;
pub use allowance::Allowance;
mod config;
pub use config::*;
pub mod error;
mod payload;
pub use payload::Payload;
pub mod reactive;
mod types;
pub use types::*;
