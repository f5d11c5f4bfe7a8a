//! Value types exchanged with the platform.
//!
//! These mirror the telephony data-service and network-service surfaces: data
//! profiles, data-call responses, registration info, and the fixed data fail
//! cause code space. All composite types are immutable once built; the
//! builders validate required fields at `build()`.

pub mod data;
pub mod fail_cause;
pub mod net;
pub mod registration;

pub use data::{
    apn_cid, AccessNetworkType, ApnProtocol, ApnType, DataCallResponse, DataCallResponseBuilder,
    DataProfile, DataRequestReason, HandoverFailureMode, LinkStatus, ServiceResult, SliceInfo,
    TrafficDescriptor, LINK_MTU,
};
pub use fail_cause::DataFailCause;
pub use net::{LinkAddress, LinkProperties, Network};
pub use registration::{
    Domain, NetworkRegistrationInfo, NetworkRegistrationInfoBuilder, RegistrationState,
    TransportType,
};
