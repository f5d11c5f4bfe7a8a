//! Network-layer value types: network handles and link addresses.

use std::net::IpAddr;

/// Opaque handle to a platform network. DNS lookups and tunnel setup must be
/// bound to a specific network so traffic takes the intended interface even
/// when the default route points elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Network(pub u64);

impl Network {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// An address assigned to a link, with its prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkAddress {
    address: IpAddr,
    prefix_len: u8,
}

impl LinkAddress {
    pub fn new(address: IpAddr, prefix_len: u8) -> Self {
        LinkAddress {
            address,
            prefix_len,
        }
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn is_ipv4(&self) -> bool {
        self.address.is_ipv4()
    }

    pub fn is_ipv6(&self) -> bool {
        self.address.is_ipv6()
    }
}

/// Link properties of an existing connection, handed in on handover so the
/// source addresses survive the transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkProperties {
    pub interface_name: String,
    pub link_addresses: Vec<LinkAddress>,
}

impl LinkProperties {
    pub fn new(interface_name: &str, link_addresses: Vec<LinkAddress>) -> Self {
        LinkProperties {
            interface_name: interface_name.to_string(),
            link_addresses,
        }
    }
}
