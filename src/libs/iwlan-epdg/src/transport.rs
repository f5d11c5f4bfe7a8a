//! Default-transport tracking and the bring-up gate.
//!
//! Process-wide, single writer (the connectivity monitor), read by every
//! tunnel manager. The gate distinguishes the default-data slot, which may
//! only tunnel over Wi-Fi, from a non-default slot with cross-SIM calling,
//! which may use any transport.

use std::sync::{Arc, Mutex};

use iwlan_proto::Network;

/// Classification of the default network's transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Unspecified,
    Cellular,
    Wifi,
}

impl Transport {
    pub fn name(&self) -> &'static str {
        match self {
            Transport::Unspecified => "UNSPECIFIED",
            Transport::Cellular => "CELLULAR",
            Transport::Wifi => "WIFI",
        }
    }
}

#[derive(Debug, Clone)]
struct ConnectivityInner {
    connected: bool,
    network: Option<Network>,
    transport: Transport,
}

/// Latest default-network observation.
pub struct ConnectivityState {
    inner: Mutex<ConnectivityInner>,
}

impl Default for ConnectivityState {
    fn default() -> Self {
        ConnectivityState {
            inner: Mutex::new(ConnectivityInner {
                connected: false,
                network: None,
                transport: Transport::Unspecified,
            }),
        }
    }
}

impl ConnectivityState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record a connectivity observation. Returns true when the default
    /// transport switched between two specified values, in which case the
    /// caller must force-close all tunnels before proceeding.
    pub fn update(&self, connected: bool, network: Option<Network>, transport: Transport) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.connected = connected;
        inner.network = network;
        let mut switched = false;
        if connected {
            if transport == Transport::Unspecified {
                log::error!("network connected but transport unspecified");
                return false;
            }
            if inner.transport != Transport::Unspecified && inner.transport != transport {
                log::debug!(
                    "default transport changed {} -> {}",
                    inner.transport.name(),
                    transport.name()
                );
                switched = true;
            }
        }
        inner.transport = transport;
        switched
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).connected
    }

    pub fn network(&self) -> Option<Network> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).network
    }

    pub fn transport(&self) -> Transport {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).transport
    }

    /// The bring-up gate: the default-data slot requires the Wi-Fi
    /// transport; a non-default slot with cross-SIM calling enabled may use
    /// any connected transport.
    pub fn is_network_connected(&self, is_dds: bool, is_cst_enabled: bool) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if !is_dds && is_cst_enabled {
            inner.connected
        } else {
            inner.connected && inner.transport == Transport::Wifi
        }
    }
}
