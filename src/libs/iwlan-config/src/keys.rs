//! Configuration keys and enumerated value domains.
//!
//! Constant values follow RFC 7296 and IANA's ipsec-registry; the ePDG
//! address source ids and IKE identity types are the platform-defined
//! domains consumed by the selector and the IKE driver configuration.

/// Prefix of every key in this namespace.
pub const KEY_PREFIX: &str = "iwlan.";

/// Seconds before the child SA is terminated if rekey does not complete.
pub const KEY_CHILD_SA_REKEY_HARD_TIMER_SEC_INT: &str = "iwlan.child_sa_rekey_hard_timer_sec_int";
/// Seconds before the child SA rekey procedure starts.
pub const KEY_CHILD_SA_REKEY_SOFT_TIMER_SEC_INT: &str = "iwlan.child_sa_rekey_soft_timer_sec_int";
/// Supported DH groups for IKE negotiation.
pub const KEY_DIFFIE_HELLMAN_GROUPS_INT_ARRAY: &str = "iwlan.diffie_hellman_groups_int_array";
/// Seconds between dead peer detection requests.
pub const KEY_DPD_TIMER_SEC_INT: &str = "iwlan.dpd_timer_sec_int";
/// Method used to authenticate the ePDG server.
pub const KEY_EPDG_AUTHENTICATION_METHOD_INT: &str = "iwlan.epdg_authentication_method_int";
/// Priority list of ePDG address sources.
pub const KEY_EPDG_ADDRESS_PRIORITY_INT_ARRAY: &str = "iwlan.epdg_address_priority_int_array";
/// ePDG static IP address or FQDN.
pub const KEY_EPDG_STATIC_ADDRESS_STRING: &str = "iwlan.epdg_static_address_string";
/// ePDG static IP address or FQDN used while roaming.
pub const KEY_EPDG_STATIC_ADDRESS_ROAMING_STRING: &str =
    "iwlan.epdg_static_address_roaming_string";
/// AES-CBC key sizes for the child session.
pub const KEY_CHILD_SESSION_AES_CBC_KEY_SIZE_INT_ARRAY: &str =
    "iwlan.child_session_aes_cbc_key_size_int_array";
/// AES-CTR key sizes for the child session.
pub const KEY_CHILD_SESSION_AES_CTR_KEY_SIZE_INT_ARRAY: &str =
    "iwlan.child_session_aes_ctr_key_size_int_array";
/// Supported child session encryption algorithms.
pub const KEY_SUPPORTED_CHILD_SESSION_ENCRYPTION_ALGORITHMS_INT_ARRAY: &str =
    "iwlan.supported_child_session_encryption_algorithms_int_array";
/// Seconds before the IKE session is terminated if rekey does not complete.
pub const KEY_IKE_REKEY_HARD_TIMER_SEC_INT: &str = "iwlan.ike_rekey_hard_timer_in_sec";
/// Seconds before the IKE session rekey procedure starts.
pub const KEY_IKE_REKEY_SOFT_TIMER_SEC_INT: &str = "iwlan.ike_rekey_soft_timer_sec_int";
/// AES-CBC key sizes for the IKE session.
pub const KEY_IKE_SESSION_AES_CBC_KEY_SIZE_INT_ARRAY: &str =
    "iwlan.ike_session_encryption_aes_cbc_key_size_int_array";
/// AES-CTR key sizes for the IKE session.
pub const KEY_IKE_SESSION_AES_CTR_KEY_SIZE_INT_ARRAY: &str =
    "iwlan.ike_session_encryption_aes_ctr_key_size_int_array";
/// Supported IKE session encryption algorithms.
pub const KEY_SUPPORTED_IKE_SESSION_ENCRYPTION_ALGORITHMS_INT_ARRAY: &str =
    "iwlan.supported_ike_session_encryption_algorithms_int_array";
/// Supported integrity algorithms.
pub const KEY_SUPPORTED_INTEGRITY_ALGORITHMS_INT_ARRAY: &str =
    "iwlan.supported_integrity_algorithms_int_array";
/// Maximum retries for tunnel establishment.
pub const KEY_MAX_RETRIES_INT: &str = "iwlan.max_retries_int";
/// Seconds between NATT keep-alive messages.
pub const KEY_NATT_KEEP_ALIVE_TIMER_SEC_INT: &str = "iwlan.natt_keep_alive_timer_sec_int";
/// `-`-separated MCC/MNC pairs used to build additional ePDG FQDNs.
pub const KEY_MCC_MNCS_STRING_ARRAY: &str = "iwlan.mcc_mncs_string_array";
/// Supported pseudo-random functions.
pub const KEY_SUPPORTED_PRF_ALGORITHMS_INT_ARRAY: &str =
    "iwlan.supported_prf_algorithms_int_array";
/// IKE retransmission timeouts in milliseconds (1..=10 entries, each
/// 500..=1800000).
pub const KEY_RETRANSMIT_TIMER_MSEC_INT_ARRAY: &str = "iwlan.retransmit_timer_sec_int_array";
/// Whether the Wi-Fi MAC is inserted into the NAI.
pub const KEY_ADD_WIFI_MAC_ADDR_TO_NAI_BOOL: &str = "iwlan.add_wifi_mac_addr_to_nai_bool";
/// Local identity type for IKE negotiations.
pub const KEY_IKE_LOCAL_ID_TYPE_INT: &str = "iwlan.ike_local_id_type_int";
/// Remote identity type for IKE negotiations.
pub const KEY_IKE_REMOTE_ID_TYPE_INT: &str = "iwlan.ike_remote_id_type_int";
/// Whether a KE payload is added during child session local rekey.
pub const KEY_ADD_KE_TO_CHILD_SESSION_REKEY_BOOL: &str =
    "iwlan.add_ke_to_child_session_rekey_bool";
/// PCO id carrying the IPv6 ePDG address.
pub const KEY_EPDG_PCO_ID_IPV6_INT: &str = "iwlan.epdg_pco_id_ipv6_int";
/// PCO id carrying the IPv4 ePDG address.
pub const KEY_EPDG_PCO_ID_IPV4_INT: &str = "iwlan.epdg_pco_id_ipv4_int";
/// Carrier error-policy JSON document.
pub const KEY_ERROR_POLICY_CONFIG_STRING: &str = "iwlan.key_error_policy_config_string";

/// Certificate from the server is ignored; EAP only.
pub const AUTHENTICATION_METHOD_EAP_ONLY: i64 = 0;
/// Server authenticated by certificate.
pub const AUTHENTICATION_METHOD_CERT: i64 = 1;

/// Use the statically configured ePDG address.
pub const EPDG_ADDRESS_STATIC: i64 = 0;
/// Construct the ePDG address from the PLMN.
pub const EPDG_ADDRESS_PLMN: i64 = 1;
/// Use the ePDG address received in PCO from the network.
pub const EPDG_ADDRESS_PCO: i64 = 2;
/// Derive the ePDG address from the cellular location.
pub const EPDG_ADDRESS_CELLULAR_LOC: i64 = 3;

pub const KEY_LEN_UNUSED: i64 = 0;
/// AES key length 128 bits.
pub const KEY_LEN_AES_128: i64 = 128;
/// AES key length 192 bits.
pub const KEY_LEN_AES_192: i64 = 192;
/// AES key length 256 bits.
pub const KEY_LEN_AES_256: i64 = 256;

pub const DH_GROUP_NONE: i64 = 0;
/// 1024-bit MODP group.
pub const DH_GROUP_1024_BIT_MODP: i64 = 2;
/// 1536-bit MODP group.
pub const DH_GROUP_1536_BIT_MODP: i64 = 5;
/// 2048-bit MODP group.
pub const DH_GROUP_2048_BIT_MODP: i64 = 14;
/// 3072-bit MODP group.
pub const DH_GROUP_3072_BIT_MODP: i64 = 15;
/// 4096-bit MODP group.
pub const DH_GROUP_4096_BIT_MODP: i64 = 16;

/// AES-CBC encryption.
pub const ENCRYPTION_ALGORITHM_AES_CBC: i64 = 12;
/// AES-CTR encryption.
pub const ENCRYPTION_ALGORITHM_AES_CTR: i64 = 13;

pub const INTEGRITY_ALGORITHM_NONE: i64 = 0;
/// HMAC-SHA1-96.
pub const INTEGRITY_ALGORITHM_HMAC_SHA1_96: i64 = 2;
/// AES-XCBC-96.
pub const INTEGRITY_ALGORITHM_AES_XCBC_96: i64 = 5;
/// HMAC-SHA2-256-128.
pub const INTEGRITY_ALGORITHM_HMAC_SHA2_256_128: i64 = 12;
/// HMAC-SHA2-384-192.
pub const INTEGRITY_ALGORITHM_HMAC_SHA2_384_192: i64 = 13;
/// HMAC-SHA2-512-256.
pub const INTEGRITY_ALGORITHM_HMAC_SHA2_512_256: i64 = 14;

/// HMAC-SHA1 PRF.
pub const PSEUDORANDOM_FUNCTION_HMAC_SHA1: i64 = 2;
/// AES128-XCBC PRF.
pub const PSEUDORANDOM_FUNCTION_AES128_XCBC: i64 = 4;
/// HMAC-SHA2-256 PRF.
pub const PSEUDORANDOM_FUNCTION_SHA2_256: i64 = 5;
/// HMAC-SHA2-384 PRF.
pub const PSEUDORANDOM_FUNCTION_SHA2_384: i64 = 6;
/// HMAC-SHA2-512 PRF.
pub const PSEUDORANDOM_FUNCTION_SHA2_512: i64 = 7;

/// FQDN identity.
pub const ID_TYPE_FQDN: i64 = 2;
/// RFC 822 address identity.
pub const ID_TYPE_RFC822_ADDR: i64 = 3;
/// Key-id identity.
pub const ID_TYPE_KEY_ID: i64 = 11;
