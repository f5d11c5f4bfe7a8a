//! Contract of the external IKEv2 library.
//!
//! The control plane never touches IKE packets; it hands the driver a setup
//! request plus the negotiated session parameters and reacts to the opened /
//! closed callbacks. Driver-internal timeouts (retransmits, DPD) are
//! configuration, not manager-side timers.

use std::sync::Arc;

use iwlan_config::{keys, ConfigBundle};

use iwlan_policy::IwlanError;

use crate::selector::EpdgEndpoint;
use crate::tunnel::{TunnelLinkProperties, TunnelSetupRequest};

/// Completion callbacks for a tunnel. Implementations post to the tunnel
/// manager's worker; they never run manager logic on the driver's thread.
pub trait TunnelCallback: Send + Sync {
    fn on_opened(&self, apn: &str, link_properties: TunnelLinkProperties);
    fn on_closed(&self, apn: &str, error: IwlanError);
}

/// The IKE driver surface consumed by the tunnel manager.
pub trait IkeDriver: Send + Sync {
    /// Start bringing a tunnel up toward the given endpoints. Returns false
    /// when the request is rejected synchronously (malformed request, no
    /// session slot); otherwise the outcome arrives via the callback.
    fn bring_up_tunnel(
        &self,
        request: &TunnelSetupRequest,
        session: &IkeSessionConfig,
        endpoints: &[EpdgEndpoint],
        callback: Arc<dyn TunnelCallback>,
    ) -> bool;

    /// Tear a tunnel down. With `force_close` the driver must not wait for
    /// the peer.
    fn close_tunnel(&self, apn: &str, force_close: bool);
}

/// IKEv2 session parameters assembled from carrier configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IkeSessionConfig {
    pub dh_groups: Vec<i64>,
    pub ike_encryption_algorithms: Vec<i64>,
    pub child_encryption_algorithms: Vec<i64>,
    pub integrity_algorithms: Vec<i64>,
    pub prf_algorithms: Vec<i64>,
    pub ike_aes_cbc_key_sizes: Vec<i64>,
    pub child_aes_cbc_key_sizes: Vec<i64>,
    pub ike_rekey_soft_timer_sec: i64,
    pub ike_rekey_hard_timer_sec: i64,
    pub child_rekey_soft_timer_sec: i64,
    pub child_rekey_hard_timer_sec: i64,
    pub dpd_timer_sec: i64,
    pub natt_keep_alive_timer_sec: i64,
    pub max_retries: i64,
    /// Retransmission schedule handed to the driver, milliseconds.
    pub retransmit_timeouts_ms: Vec<i64>,
    pub local_id_type: i64,
    pub remote_id_type: i64,
    pub epdg_authentication_method: i64,
    pub add_ke_to_child_session_rekey: bool,
}

impl IkeSessionConfig {
    pub fn from_bundle(bundle: &ConfigBundle) -> Self {
        IkeSessionConfig {
            dh_groups: bundle.int_array(keys::KEY_DIFFIE_HELLMAN_GROUPS_INT_ARRAY),
            ike_encryption_algorithms: bundle
                .int_array(keys::KEY_SUPPORTED_IKE_SESSION_ENCRYPTION_ALGORITHMS_INT_ARRAY),
            child_encryption_algorithms: bundle
                .int_array(keys::KEY_SUPPORTED_CHILD_SESSION_ENCRYPTION_ALGORITHMS_INT_ARRAY),
            integrity_algorithms: bundle
                .int_array(keys::KEY_SUPPORTED_INTEGRITY_ALGORITHMS_INT_ARRAY),
            prf_algorithms: bundle.int_array(keys::KEY_SUPPORTED_PRF_ALGORITHMS_INT_ARRAY),
            ike_aes_cbc_key_sizes: bundle
                .int_array(keys::KEY_IKE_SESSION_AES_CBC_KEY_SIZE_INT_ARRAY),
            child_aes_cbc_key_sizes: bundle
                .int_array(keys::KEY_CHILD_SESSION_AES_CBC_KEY_SIZE_INT_ARRAY),
            ike_rekey_soft_timer_sec: bundle.int_value(keys::KEY_IKE_REKEY_SOFT_TIMER_SEC_INT),
            ike_rekey_hard_timer_sec: bundle.int_value(keys::KEY_IKE_REKEY_HARD_TIMER_SEC_INT),
            child_rekey_soft_timer_sec: bundle
                .int_value(keys::KEY_CHILD_SA_REKEY_SOFT_TIMER_SEC_INT),
            child_rekey_hard_timer_sec: bundle
                .int_value(keys::KEY_CHILD_SA_REKEY_HARD_TIMER_SEC_INT),
            dpd_timer_sec: bundle.int_value(keys::KEY_DPD_TIMER_SEC_INT),
            natt_keep_alive_timer_sec: bundle.int_value(keys::KEY_NATT_KEEP_ALIVE_TIMER_SEC_INT),
            max_retries: bundle.int_value(keys::KEY_MAX_RETRIES_INT),
            retransmit_timeouts_ms: bundle.int_array(keys::KEY_RETRANSMIT_TIMER_MSEC_INT_ARRAY),
            local_id_type: bundle.int_value(keys::KEY_IKE_LOCAL_ID_TYPE_INT),
            remote_id_type: bundle.int_value(keys::KEY_IKE_REMOTE_ID_TYPE_INT),
            epdg_authentication_method: bundle
                .int_value(keys::KEY_EPDG_AUTHENTICATION_METHOD_INT),
            add_ke_to_child_session_rekey: bundle
                .bool_value(keys::KEY_ADD_KE_TO_CHILD_SESSION_REKEY_BOOL),
        }
    }
}

impl Default for IkeSessionConfig {
    fn default() -> Self {
        Self::from_bundle(&ConfigBundle::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_config_defaults() {
        let config = IkeSessionConfig::default();
        assert_eq!(config.retransmit_timeouts_ms, vec![500, 1000, 2000, 4000, 8000]);
        assert_eq!(config.natt_keep_alive_timer_sec, 20);
        assert_eq!(config.dpd_timer_sec, 120);
        assert_eq!(config.local_id_type, keys::ID_TYPE_RFC822_ADDR);
        assert_eq!(config.remote_id_type, keys::ID_TYPE_FQDN);
    }

    #[test]
    fn test_carrier_override_flows_through() {
        let mut bundle = ConfigBundle::new();
        bundle.put_int_array(keys::KEY_RETRANSMIT_TIMER_MSEC_INT_ARRAY, vec![1000, 2000]);
        bundle.put_int(keys::KEY_DPD_TIMER_SEC_INT, 60);
        let config = IkeSessionConfig::from_bundle(&bundle);
        assert_eq!(config.retransmit_timeouts_ms, vec![1000, 2000]);
        assert_eq!(config.dpd_timer_sec, 60);
        // Unset keys keep their defaults.
        assert_eq!(config.natt_keep_alive_timer_sec, 20);
    }
}
