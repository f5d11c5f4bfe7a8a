//! Data fail cause code space.
//!
//! The platform reports data-call failures as integer codes from a fixed
//! registry. Only the subset this control plane can actually raise is
//! defined here; the IWLAN-prefixed codes sit in the private IKEv2 notify
//! range (0x2000+) and carry the notify value itself.

/// Platform data fail cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DataFailCause(pub i32);

impl DataFailCause {
    /// No failure.
    pub const NONE: DataFailCause = DataFailCause(0);
    /// User authentication failed.
    pub const USER_AUTHENTICATION: DataFailCause = DataFailCause(29);
    /// Network failure.
    pub const NETWORK_FAILURE: DataFailCause = DataFailCause(38);
    /// PDN connection rejected by the ePDG (private notify 8192).
    pub const IWLAN_PDN_CONNECTION_REJECTION: DataFailCause = DataFailCause(0x2000);
    /// Maximum connections reached at the ePDG (private notify 8193).
    pub const IWLAN_MAX_CONNECTION_REACHED: DataFailCause = DataFailCause(0x2001);
    /// Semantic error in the TFT operation (private notify 8241).
    pub const IWLAN_SEMANTIC_ERROR_IN_THE_TFT_OPERATION: DataFailCause = DataFailCause(0x2031);
    /// Syntactical error in the TFT operation (private notify 8242).
    pub const IWLAN_SYNTACTICAL_ERROR_IN_THE_TFT_OPERATION: DataFailCause = DataFailCause(0x2032);
    /// Non-3GPP access to EPC not allowed (private notify 9290).
    pub const IWLAN_NON_3GPP_ACCESS_TO_EPC_NOT_ALLOWED: DataFailCause = DataFailCause(0x244A);
    /// Catch-all for everything without a dedicated code.
    pub const ERROR_UNSPECIFIED: DataFailCause = DataFailCause(0xFFFF);

    pub fn value(&self) -> i32 {
        self.0
    }

    pub fn is_none(&self) -> bool {
        *self == DataFailCause::NONE
    }
}
