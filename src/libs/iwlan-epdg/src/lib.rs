//! ePDG selection and tunnel lifecycle management.
//!
//! [`selector`] turns the carrier's prioritized address sources into a
//! validated endpoint list; [`manager`] runs the per-APN tunnel state
//! machine on a serial worker, driving the external IKE library through the
//! [`driver`] contract and the error policy engine on every failure.

pub mod dns;
pub mod driver;
pub mod manager;
pub mod selector;
pub mod transport;
pub mod tunnel;

pub use dns::{CancelToken, DnsResolver, SystemDnsResolver, DEFAULT_DNS_TIMEOUT};
pub use driver::{IkeDriver, IkeSessionConfig, TunnelCallback};
pub use manager::{
    DataServiceCallback, SetupDataCallRequest, TunnelEventListener, TunnelManager,
    TunnelManagerDeps,
};
pub use selector::{CellInfoSource, EpdgEndpoint, EpdgSelector, EpdgSource, NoCellInfo, ProtoFilter};
pub use transport::{ConnectivityState, Transport};
pub use tunnel::{TunnelLinkProperties, TunnelSetupRequest};
