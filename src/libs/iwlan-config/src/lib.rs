//! Carrier configuration for ePDG tunnel bring-up.
//!
//! Carrier config arrives from the platform as a key/value bag. This crate
//! defines the `iwlan.`-prefixed key space, the enumerated value domains
//! (IANA ipsec-registry constants), the built-in defaults applied when a key
//! is absent, and the accessor trait the rest of the control plane reads
//! configuration through.

pub mod bundle;
pub mod keys;
pub mod subscription;

pub use bundle::{CarrierConfigSource, ConfigBundle, ConfigValue, StaticConfigSource};
pub use subscription::{StaticSubscriptionSource, SubscriptionSource};
