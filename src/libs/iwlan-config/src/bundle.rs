//! Typed key/value configuration bundle with built-in defaults.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::keys;

/// A single configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    IntArray(Vec<i64>),
    String(String),
    StringArray(Vec<String>),
}

/// In-memory key/value bag. Lookups that miss fall through to the built-in
/// defaults, so a partially populated carrier bundle always yields a usable
/// value for every documented key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigBundle {
    values: HashMap<String, ConfigValue>,
}

impl ConfigBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in defaults applied when a carrier does not configure a key.
    pub fn defaults() -> Self {
        let mut bundle = ConfigBundle::new();
        bundle.put_int(keys::KEY_IKE_REKEY_SOFT_TIMER_SEC_INT, 7200);
        bundle.put_int(keys::KEY_IKE_REKEY_HARD_TIMER_SEC_INT, 14400);
        bundle.put_int(keys::KEY_CHILD_SA_REKEY_SOFT_TIMER_SEC_INT, 3600);
        bundle.put_int(keys::KEY_CHILD_SA_REKEY_HARD_TIMER_SEC_INT, 7200);
        bundle.put_int_array(
            keys::KEY_RETRANSMIT_TIMER_MSEC_INT_ARRAY,
            vec![500, 1000, 2000, 4000, 8000],
        );
        bundle.put_int(keys::KEY_DPD_TIMER_SEC_INT, 120);
        bundle.put_int(keys::KEY_MAX_RETRIES_INT, 3);
        bundle.put_int_array(
            keys::KEY_DIFFIE_HELLMAN_GROUPS_INT_ARRAY,
            vec![
                keys::DH_GROUP_1024_BIT_MODP,
                keys::DH_GROUP_1536_BIT_MODP,
                keys::DH_GROUP_2048_BIT_MODP,
            ],
        );
        bundle.put_int_array(
            keys::KEY_SUPPORTED_IKE_SESSION_ENCRYPTION_ALGORITHMS_INT_ARRAY,
            vec![keys::ENCRYPTION_ALGORITHM_AES_CBC],
        );
        bundle.put_int_array(
            keys::KEY_SUPPORTED_CHILD_SESSION_ENCRYPTION_ALGORITHMS_INT_ARRAY,
            vec![keys::ENCRYPTION_ALGORITHM_AES_CBC],
        );
        bundle.put_int_array(
            keys::KEY_SUPPORTED_INTEGRITY_ALGORITHMS_INT_ARRAY,
            vec![
                keys::INTEGRITY_ALGORITHM_AES_XCBC_96,
                keys::INTEGRITY_ALGORITHM_HMAC_SHA1_96,
                keys::INTEGRITY_ALGORITHM_HMAC_SHA2_256_128,
                keys::INTEGRITY_ALGORITHM_HMAC_SHA2_384_192,
                keys::INTEGRITY_ALGORITHM_HMAC_SHA2_512_256,
            ],
        );
        bundle.put_int_array(
            keys::KEY_SUPPORTED_PRF_ALGORITHMS_INT_ARRAY,
            vec![
                keys::PSEUDORANDOM_FUNCTION_HMAC_SHA1,
                keys::PSEUDORANDOM_FUNCTION_AES128_XCBC,
                keys::PSEUDORANDOM_FUNCTION_SHA2_256,
                keys::PSEUDORANDOM_FUNCTION_SHA2_384,
                keys::PSEUDORANDOM_FUNCTION_SHA2_512,
            ],
        );
        bundle.put_int(
            keys::KEY_EPDG_AUTHENTICATION_METHOD_INT,
            keys::AUTHENTICATION_METHOD_EAP_ONLY,
        );
        bundle.put_string(keys::KEY_EPDG_STATIC_ADDRESS_STRING, "");
        bundle.put_string(keys::KEY_EPDG_STATIC_ADDRESS_ROAMING_STRING, "");
        bundle.put_int(keys::KEY_NATT_KEEP_ALIVE_TIMER_SEC_INT, 20);
        bundle.put_int_array(
            keys::KEY_IKE_SESSION_AES_CBC_KEY_SIZE_INT_ARRAY,
            vec![keys::KEY_LEN_AES_128, keys::KEY_LEN_AES_192, keys::KEY_LEN_AES_256],
        );
        bundle.put_int_array(
            keys::KEY_CHILD_SESSION_AES_CBC_KEY_SIZE_INT_ARRAY,
            vec![keys::KEY_LEN_AES_128, keys::KEY_LEN_AES_192, keys::KEY_LEN_AES_256],
        );
        bundle.put_int_array(
            keys::KEY_IKE_SESSION_AES_CTR_KEY_SIZE_INT_ARRAY,
            vec![keys::KEY_LEN_AES_128, keys::KEY_LEN_AES_192, keys::KEY_LEN_AES_256],
        );
        bundle.put_int_array(
            keys::KEY_CHILD_SESSION_AES_CTR_KEY_SIZE_INT_ARRAY,
            vec![keys::KEY_LEN_AES_128, keys::KEY_LEN_AES_192, keys::KEY_LEN_AES_256],
        );
        bundle.put_int_array(
            keys::KEY_EPDG_ADDRESS_PRIORITY_INT_ARRAY,
            vec![keys::EPDG_ADDRESS_PLMN, keys::EPDG_ADDRESS_STATIC],
        );
        bundle.put_string_array(keys::KEY_MCC_MNCS_STRING_ARRAY, vec![]);
        bundle.put_bool(keys::KEY_ADD_WIFI_MAC_ADDR_TO_NAI_BOOL, false);
        bundle.put_int(keys::KEY_IKE_LOCAL_ID_TYPE_INT, keys::ID_TYPE_RFC822_ADDR);
        bundle.put_int(keys::KEY_IKE_REMOTE_ID_TYPE_INT, keys::ID_TYPE_FQDN);
        bundle.put_bool(keys::KEY_ADD_KE_TO_CHILD_SESSION_REKEY_BOOL, false);
        bundle.put_int(keys::KEY_EPDG_PCO_ID_IPV6_INT, 0);
        bundle.put_int(keys::KEY_EPDG_PCO_ID_IPV4_INT, 0);
        bundle
    }

    pub fn put_bool(&mut self, key: &str, value: bool) {
        self.values.insert(key.to_string(), ConfigValue::Bool(value));
    }

    pub fn put_int(&mut self, key: &str, value: i64) {
        self.values.insert(key.to_string(), ConfigValue::Int(value));
    }

    pub fn put_int_array(&mut self, key: &str, value: Vec<i64>) {
        self.values
            .insert(key.to_string(), ConfigValue::IntArray(value));
    }

    pub fn put_string(&mut self, key: &str, value: &str) {
        self.values
            .insert(key.to_string(), ConfigValue::String(value.to_string()));
    }

    pub fn put_string_array(&mut self, key: &str, value: Vec<String>) {
        self.values
            .insert(key.to_string(), ConfigValue::StringArray(value));
    }

    fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    /// Typed lookup falling through to the defaults bundle on a miss or a
    /// type mismatch.
    fn get_or_default(&self, key: &str) -> Option<ConfigValue> {
        if let Some(value) = self.get(key) {
            return Some(value.clone());
        }
        Self::defaults().get(key).cloned()
    }

    pub fn bool_value(&self, key: &str) -> bool {
        match self.get_or_default(key) {
            Some(ConfigValue::Bool(value)) => value,
            _ => false,
        }
    }

    pub fn int_value(&self, key: &str) -> i64 {
        match self.get_or_default(key) {
            Some(ConfigValue::Int(value)) => value,
            _ => 0,
        }
    }

    pub fn int_array(&self, key: &str) -> Vec<i64> {
        match self.get_or_default(key) {
            Some(ConfigValue::IntArray(value)) => value,
            _ => Vec::new(),
        }
    }

    pub fn string_value(&self, key: &str) -> String {
        match self.get_or_default(key) {
            Some(ConfigValue::String(value)) => value,
            _ => String::new(),
        }
    }

    pub fn string_array(&self, key: &str) -> Vec<String> {
        match self.get_or_default(key) {
            Some(ConfigValue::StringArray(value)) => value,
            _ => Vec::new(),
        }
    }
}

/// Accessor for the current carrier configuration of a slot. The platform
/// binding is an external collaborator; inside this repository the daemon
/// keeps a [`StaticConfigSource`] it updates from carrier-config events.
pub trait CarrierConfigSource: Send + Sync {
    /// Current bundle for the slot, or `None` while the carrier is unknown.
    fn config_for_slot(&self, slot: u32) -> Option<ConfigBundle>;
}

/// Shared in-memory configuration store, one bundle per slot.
#[derive(Default)]
pub struct StaticConfigSource {
    bundles: RwLock<HashMap<u32, ConfigBundle>>,
}

impl StaticConfigSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_config(&self, slot: u32, bundle: ConfigBundle) {
        log::debug!("slot {slot}: carrier config updated");
        let mut bundles = self.bundles.write().unwrap_or_else(|e| e.into_inner());
        bundles.insert(slot, bundle);
    }

    pub fn clear_config(&self, slot: u32) {
        log::debug!("slot {slot}: carrier config cleared");
        let mut bundles = self.bundles.write().unwrap_or_else(|e| e.into_inner());
        bundles.remove(&slot);
    }
}

impl CarrierConfigSource for StaticConfigSource {
    fn config_for_slot(&self, slot: u32) -> Option<ConfigBundle> {
        let bundles = self.bundles.read().unwrap_or_else(|e| e.into_inner());
        bundles.get(&slot).cloned()
    }
}
