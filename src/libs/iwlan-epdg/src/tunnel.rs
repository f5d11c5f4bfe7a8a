//! Tunnel setup request and link properties.
//!
//! Both are immutable values produced by validating builders; once built
//! they are shared freely between workers.

use std::net::IpAddr;

use thiserror::Error;

use iwlan_proto::{ApnProtocol, LinkAddress, Network, SliceInfo};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TunnelValueError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
}

/// Everything the IKE driver needs to bring a tunnel up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelSetupRequest {
    pub apn_name: String,
    pub apn_ip_protocol: ApnProtocol,
    pub network: Network,
    pub src_ipv4_address: Option<IpAddr>,
    pub src_ipv6_address: Option<IpAddr>,
    pub src_ipv6_address_prefix_len: u8,
    pub pdu_session_id: u8,
    pub is_roaming: bool,
    pub is_emergency: bool,
    pub request_pcscf: bool,
}

impl TunnelSetupRequest {
    pub fn builder() -> TunnelSetupRequestBuilder {
        TunnelSetupRequestBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct TunnelSetupRequestBuilder {
    apn_name: Option<String>,
    apn_ip_protocol: Option<ApnProtocol>,
    network: Option<Network>,
    src_ipv4_address: Option<IpAddr>,
    src_ipv6_address: Option<IpAddr>,
    src_ipv6_address_prefix_len: u8,
    pdu_session_id: u8,
    is_roaming: bool,
    is_emergency: bool,
    request_pcscf: bool,
}

impl TunnelSetupRequestBuilder {
    pub fn apn_name(mut self, apn: &str) -> Self {
        self.apn_name = Some(apn.to_string());
        self
    }

    pub fn apn_ip_protocol(mut self, protocol: ApnProtocol) -> Self {
        self.apn_ip_protocol = Some(protocol);
        self
    }

    pub fn network(mut self, network: Network) -> Self {
        self.network = Some(network);
        self
    }

    pub fn src_ipv4_address(mut self, address: IpAddr) -> Self {
        self.src_ipv4_address = Some(address);
        self
    }

    pub fn src_ipv6_address(mut self, address: IpAddr, prefix_len: u8) -> Self {
        self.src_ipv6_address = Some(address);
        self.src_ipv6_address_prefix_len = prefix_len;
        self
    }

    pub fn pdu_session_id(mut self, id: u8) -> Self {
        self.pdu_session_id = id;
        self
    }

    pub fn is_roaming(mut self, roaming: bool) -> Self {
        self.is_roaming = roaming;
        self
    }

    pub fn is_emergency(mut self, emergency: bool) -> Self {
        self.is_emergency = emergency;
        self
    }

    pub fn request_pcscf(mut self, request: bool) -> Self {
        self.request_pcscf = request;
        self
    }

    pub fn build(self) -> Result<TunnelSetupRequest, TunnelValueError> {
        let apn_name = self
            .apn_name
            .ok_or(TunnelValueError::MissingField("apn_name"))?;
        if apn_name.is_empty() {
            return Err(TunnelValueError::InvalidField {
                field: "apn_name",
                reason: "empty",
            });
        }
        // PDU session ids live in 0..=15; zero means unattached.
        if self.pdu_session_id > 15 {
            return Err(TunnelValueError::InvalidField {
                field: "pdu_session_id",
                reason: "out of range",
            });
        }
        Ok(TunnelSetupRequest {
            apn_name,
            apn_ip_protocol: self
                .apn_ip_protocol
                .ok_or(TunnelValueError::MissingField("apn_ip_protocol"))?,
            network: self
                .network
                .ok_or(TunnelValueError::MissingField("network"))?,
            src_ipv4_address: self.src_ipv4_address,
            src_ipv6_address: self.src_ipv6_address,
            src_ipv6_address_prefix_len: self.src_ipv6_address_prefix_len,
            pdu_session_id: self.pdu_session_id,
            is_roaming: self.is_roaming,
            is_emergency: self.is_emergency,
            request_pcscf: self.request_pcscf,
        })
    }
}

/// Link parameters negotiated for an established tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelLinkProperties {
    pub internal_addresses: Vec<LinkAddress>,
    pub dns_addresses: Vec<IpAddr>,
    pub pcscf_addresses: Vec<IpAddr>,
    pub iface_name: String,
    pub slice_info: Option<SliceInfo>,
}

impl TunnelLinkProperties {
    pub fn builder() -> TunnelLinkPropertiesBuilder {
        TunnelLinkPropertiesBuilder::default()
    }

    pub fn has_ipv4_address(&self) -> bool {
        self.internal_addresses.iter().any(|a| a.is_ipv4())
    }

    pub fn has_ipv6_address(&self) -> bool {
        self.internal_addresses.iter().any(|a| a.is_ipv6())
    }
}

#[derive(Debug, Default)]
pub struct TunnelLinkPropertiesBuilder {
    internal_addresses: Vec<LinkAddress>,
    dns_addresses: Vec<IpAddr>,
    pcscf_addresses: Vec<IpAddr>,
    iface_name: Option<String>,
    slice_info: Option<SliceInfo>,
}

impl TunnelLinkPropertiesBuilder {
    pub fn internal_addresses(mut self, addresses: Vec<LinkAddress>) -> Self {
        self.internal_addresses = addresses;
        self
    }

    pub fn dns_addresses(mut self, addresses: Vec<IpAddr>) -> Self {
        self.dns_addresses = addresses;
        self
    }

    pub fn pcscf_addresses(mut self, addresses: Vec<IpAddr>) -> Self {
        self.pcscf_addresses = addresses;
        self
    }

    pub fn iface_name(mut self, name: &str) -> Self {
        self.iface_name = Some(name.to_string());
        self
    }

    pub fn slice_info(mut self, slice_info: SliceInfo) -> Self {
        self.slice_info = Some(slice_info);
        self
    }

    pub fn build(self) -> Result<TunnelLinkProperties, TunnelValueError> {
        if self.internal_addresses.is_empty() {
            return Err(TunnelValueError::MissingField("internal_addresses"));
        }
        let iface_name = self
            .iface_name
            .ok_or(TunnelValueError::MissingField("iface_name"))?;
        if iface_name.is_empty() {
            return Err(TunnelValueError::InvalidField {
                field: "iface_name",
                reason: "empty",
            });
        }
        Ok(TunnelLinkProperties {
            internal_addresses: self.internal_addresses,
            dns_addresses: self.dns_addresses,
            pcscf_addresses: self.pcscf_addresses,
            iface_name,
            slice_info: self.slice_info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v4(addr: &str) -> IpAddr {
        addr.parse().unwrap()
    }

    #[test]
    fn test_setup_request_requires_core_fields() {
        let err = TunnelSetupRequest::builder().build().unwrap_err();
        assert_eq!(err, TunnelValueError::MissingField("apn_name"));

        let err = TunnelSetupRequest::builder()
            .apn_name("ims")
            .build()
            .unwrap_err();
        assert_eq!(err, TunnelValueError::MissingField("apn_ip_protocol"));

        let request = TunnelSetupRequest::builder()
            .apn_name("ims")
            .apn_ip_protocol(ApnProtocol::Ipv4v6)
            .network(Network(7))
            .pdu_session_id(5)
            .request_pcscf(true)
            .build()
            .unwrap();
        assert_eq!(request.apn_name, "ims");
        assert_eq!(request.pdu_session_id, 5);
        assert!(request.request_pcscf);
        assert!(request.src_ipv4_address.is_none());
    }

    #[test]
    fn test_setup_request_rejects_bad_pdu_session_id() {
        let err = TunnelSetupRequest::builder()
            .apn_name("ims")
            .apn_ip_protocol(ApnProtocol::Ipv4)
            .network(Network(1))
            .pdu_session_id(16)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            TunnelValueError::InvalidField {
                field: "pdu_session_id",
                ..
            }
        ));
    }

    #[test]
    fn test_handover_source_addresses() {
        let request = TunnelSetupRequest::builder()
            .apn_name("ims")
            .apn_ip_protocol(ApnProtocol::Ipv4v6)
            .network(Network(1))
            .src_ipv4_address(v4("10.1.2.3"))
            .src_ipv6_address("2001:db8::1".parse().unwrap(), 64)
            .build()
            .unwrap();
        assert_eq!(request.src_ipv4_address, Some(v4("10.1.2.3")));
        assert_eq!(request.src_ipv6_address_prefix_len, 64);
    }

    #[test]
    fn test_link_properties_require_address_and_iface() {
        let err = TunnelLinkProperties::builder().build().unwrap_err();
        assert_eq!(err, TunnelValueError::MissingField("internal_addresses"));

        let props = TunnelLinkProperties::builder()
            .internal_addresses(vec![LinkAddress::new(v4("192.0.2.100"), 32)])
            .dns_addresses(vec![v4("8.8.8.8")])
            .iface_name("ipsec0")
            .build()
            .unwrap();
        assert!(props.has_ipv4_address());
        assert!(!props.has_ipv6_address());
        assert!(props.slice_info.is_none());
    }
}
