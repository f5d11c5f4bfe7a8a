//! IWLAN control-plane daemon.
//!
//! Hosts the per-slot service stack: event bus, error policy engine, ePDG
//! selector, tunnel lifecycle manager, and the data / network-registration
//! surfaces the platform talks to. Platform bindings (IKE library, telephony
//! broadcast delivery, callback transport) are injected at construction.

pub mod context;
pub mod data_service;
pub mod error_reporter;
pub mod nai;
pub mod network_service;


pub use context::{ContextDeps, IwlanContext, PlatformNotifier, SlotServices};
pub use data_service::DataServiceProvider;
pub use error_reporter::{BroadcastSink, ErrorReporter};
pub use network_service::{NetworkServiceCallback, NetworkServiceProvider};
