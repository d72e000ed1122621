//! # chainledger-registry
//!
//! Maps raw entries to the ordered list of protocol decoders that should
//! see them.
//!
//! Lookup tiers, in order:
//! 1. exact `(address, topic)` registrations
//! 2. address-only registrations
//! 3. topic-only registrations (any emitter)
//! 4. global registrations
//!
//! A registry is built once at startup and frozen into an `Arc`; it is
//! never mutated while transactions are being decoded.

pub mod registry;
pub mod set;

pub use registry::{DecoderRegistry, RegisteredDecoder};
pub use set::RegistrySet;
