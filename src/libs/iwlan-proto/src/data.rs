//! Data-call surface types: profiles, requests, responses.

use std::net::IpAddr;

use thiserror::Error;

use crate::fail_cause::DataFailCause;
use crate::net::LinkAddress;

/// Fixed link MTU reported on every IWLAN data call. 1280 is the minimum
/// packet size IPv6 routers must handle, the safest ceiling absent path-MTU
/// discovery.
pub const LINK_MTU: u32 = 1280;

/// Access network a data call is requested on. Only IWLAN is served here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessNetworkType {
    Eutran,
    Iwlan,
    Ngran,
    Unknown,
}

/// IP protocol family of an APN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApnProtocol {
    Ipv4,
    Ipv6,
    Ipv4v6,
}

impl ApnProtocol {
    pub fn name(&self) -> &'static str {
        match self {
            ApnProtocol::Ipv4 => "IP",
            ApnProtocol::Ipv6 => "IPV6",
            ApnProtocol::Ipv4v6 => "IPV4V6",
        }
    }
}

/// APN type bits carried by a data profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApnType(pub u32);

impl ApnType {
    pub const DEFAULT: u32 = 1 << 0;
    pub const MMS: u32 = 1 << 1;
    pub const IMS: u32 = 1 << 6;
    pub const EMERGENCY: u32 = 1 << 9;

    pub fn has_ims(&self) -> bool {
        self.0 & Self::IMS != 0
    }

    pub fn has_emergency(&self) -> bool {
        self.0 & Self::EMERGENCY != 0
    }
}

/// Data profile describing the APN to bring up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataProfile {
    pub apn: String,
    pub protocol: ApnProtocol,
    pub roaming_protocol: ApnProtocol,
    pub apn_type: ApnType,
}

impl DataProfile {
    pub fn new(apn: &str, protocol: ApnProtocol) -> Self {
        DataProfile {
            apn: apn.to_string(),
            protocol,
            roaming_protocol: protocol,
            apn_type: ApnType(ApnType::DEFAULT),
        }
    }

    pub fn with_apn_type(mut self, apn_type: u32) -> Self {
        self.apn_type = ApnType(apn_type);
        self
    }

    pub fn with_roaming_protocol(mut self, protocol: ApnProtocol) -> Self {
        self.roaming_protocol = protocol;
        self
    }
}

/// Reason attached to a setup or deactivate request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataRequestReason {
    Normal,
    Shutdown,
    Handover,
}

/// Result of a service operation, delivered through completion callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceResult {
    Success,
    ErrorIllegalState,
    ErrorInvalidArg,
    ErrorUnsupported,
}

/// Link status reported in a data-call response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Unknown,
    Inactive,
    Active,
}

/// What the framework should do after a handover bring-up failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoverFailureMode {
    /// Retry the failed handover; do not fall back to a normal setup.
    NoFallbackRetryHandover,
    /// Retry as a normal setup on the target.
    NoFallbackRetrySetupNormal,
}

/// 5G network slice descriptor attached to a data call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceInfo {
    pub sst: u8,
    pub sd: Option<u32>,
}

/// Traffic descriptor used for URSP matching. The optional DNN, when
/// present, must be used for matching; it never selects the endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrafficDescriptor {
    pub dnn: Option<String>,
    pub os_app_id: Option<Vec<u8>>,
}

/// The data-call identifier for an APN: Java's `String.hashCode`, which is
/// what the platform historically used as the cid for IWLAN calls.
pub fn apn_cid(apn: &str) -> i32 {
    let mut hash: i32 = 0;
    for b in apn.bytes() {
        hash = hash.wrapping_mul(31).wrapping_add(b as i32);
    }
    hash
}

/// Snapshot of one data call, reported to the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataCallResponse {
    pub id: i32,
    pub protocol: ApnProtocol,
    pub cause: DataFailCause,
    pub retry_duration_ms: i64,
    pub link_status: LinkStatus,
    pub interface_name: String,
    pub addresses: Vec<LinkAddress>,
    pub dns_addresses: Vec<IpAddr>,
    pub gateway_addresses: Vec<IpAddr>,
    pub pcscf_addresses: Vec<IpAddr>,
    pub mtu_v4: u32,
    pub mtu_v6: u32,
    pub handover_failure_mode: Option<HandoverFailureMode>,
    pub slice_info: Option<SliceInfo>,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DataCallResponseError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Builder for [`DataCallResponse`]. `id` and `protocol` are required.
#[derive(Debug, Default)]
pub struct DataCallResponseBuilder {
    id: Option<i32>,
    protocol: Option<ApnProtocol>,
    cause: DataFailCause,
    retry_duration_ms: i64,
    link_status: Option<LinkStatus>,
    interface_name: String,
    addresses: Vec<LinkAddress>,
    dns_addresses: Vec<IpAddr>,
    gateway_addresses: Vec<IpAddr>,
    pcscf_addresses: Vec<IpAddr>,
    mtu_v4: u32,
    mtu_v6: u32,
    handover_failure_mode: Option<HandoverFailureMode>,
    slice_info: Option<SliceInfo>,
}

impl DataCallResponseBuilder {
    pub fn new() -> Self {
        DataCallResponseBuilder {
            cause: DataFailCause::NONE,
            ..Default::default()
        }
    }

    pub fn id(mut self, id: i32) -> Self {
        self.id = Some(id);
        self
    }

    pub fn protocol(mut self, protocol: ApnProtocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn cause(mut self, cause: DataFailCause) -> Self {
        self.cause = cause;
        self
    }

    pub fn retry_duration_ms(mut self, ms: i64) -> Self {
        self.retry_duration_ms = ms;
        self
    }

    pub fn link_status(mut self, status: LinkStatus) -> Self {
        self.link_status = Some(status);
        self
    }

    pub fn interface_name(mut self, name: &str) -> Self {
        self.interface_name = name.to_string();
        self
    }

    pub fn addresses(mut self, addresses: Vec<LinkAddress>) -> Self {
        self.addresses = addresses;
        self
    }

    pub fn dns_addresses(mut self, addresses: Vec<IpAddr>) -> Self {
        self.dns_addresses = addresses;
        self
    }

    pub fn gateway_addresses(mut self, addresses: Vec<IpAddr>) -> Self {
        self.gateway_addresses = addresses;
        self
    }

    pub fn pcscf_addresses(mut self, addresses: Vec<IpAddr>) -> Self {
        self.pcscf_addresses = addresses;
        self
    }

    pub fn mtu(mut self, mtu: u32) -> Self {
        self.mtu_v4 = mtu;
        self.mtu_v6 = mtu;
        self
    }

    pub fn handover_failure_mode(mut self, mode: HandoverFailureMode) -> Self {
        self.handover_failure_mode = Some(mode);
        self
    }

    pub fn slice_info(mut self, slice_info: SliceInfo) -> Self {
        self.slice_info = Some(slice_info);
        self
    }

    pub fn build(self) -> Result<DataCallResponse, DataCallResponseError> {
        Ok(DataCallResponse {
            id: self.id.ok_or(DataCallResponseError::MissingField("id"))?,
            protocol: self
                .protocol
                .ok_or(DataCallResponseError::MissingField("protocol"))?,
            cause: self.cause,
            retry_duration_ms: self.retry_duration_ms,
            link_status: self.link_status.unwrap_or(LinkStatus::Unknown),
            interface_name: self.interface_name,
            addresses: self.addresses,
            dns_addresses: self.dns_addresses,
            gateway_addresses: self.gateway_addresses,
            pcscf_addresses: self.pcscf_addresses,
            mtu_v4: self.mtu_v4,
            mtu_v6: self.mtu_v6,
            handover_failure_mode: self.handover_failure_mode,
            slice_info: self.slice_info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apn_cid_matches_java_string_hash() {
        // Reference values from String.hashCode.
        assert_eq!(apn_cid("ims"), 104399);
        assert_eq!(apn_cid("mms"), 108243);
        assert_eq!(apn_cid(""), 0);
        assert_ne!(apn_cid("ims"), apn_cid("mms"));
    }

    #[test]
    fn test_builder_requires_id_and_protocol() {
        let err = DataCallResponseBuilder::new().build().unwrap_err();
        assert_eq!(err, DataCallResponseError::MissingField("id"));

        let err = DataCallResponseBuilder::new().id(1).build().unwrap_err();
        assert_eq!(err, DataCallResponseError::MissingField("protocol"));

        let response = DataCallResponseBuilder::new()
            .id(apn_cid("ims"))
            .protocol(ApnProtocol::Ipv4v6)
            .build()
            .unwrap();
        assert_eq!(response.cause, DataFailCause::NONE);
        assert_eq!(response.link_status, LinkStatus::Unknown);
    }

    #[test]
    fn test_apn_type_bits() {
        let t = ApnType(ApnType::IMS | ApnType::EMERGENCY);
        assert!(t.has_ims());
        assert!(t.has_emergency());
        assert!(!ApnType(ApnType::MMS).has_ims());
    }
}
