//! Tunnel error taxonomy.

use std::fmt;

use iwlan_proto::DataFailCause;

/// Well-known IKEv2 notify message types raised by the IKE driver. The
/// 8192+ range holds the 3GPP private-use codes an ePDG answers with.
pub mod ike_notify {
    pub const UNSUPPORTED_CRITICAL_PAYLOAD: u16 = 1;
    pub const INVALID_SYNTAX: u16 = 7;
    pub const NO_PROPOSAL_CHOSEN: u16 = 14;
    pub const AUTHENTICATION_FAILED: u16 = 24;
    pub const SINGLE_PAIR_REQUIRED: u16 = 34;
    pub const INTERNAL_ADDRESS_FAILURE: u16 = 36;
    pub const TS_UNACCEPTABLE: u16 = 38;
    pub const TEMPORARY_FAILURE: u16 = 43;
    pub const CHILD_SA_NOT_FOUND: u16 = 44;

    pub const PDN_CONNECTION_REJECTION: u16 = 8192;
    pub const MAX_CONNECTION_REACHED: u16 = 8193;
    pub const SEMANTIC_ERROR_IN_THE_TFT_OPERATION: u16 = 8241;
    pub const SYNTACTICAL_ERROR_IN_THE_TFT_OPERATION: u16 = 8242;
    pub const NON_3GPP_ACCESS_TO_EPC_NOT_ALLOWED: u16 = 9290;
}

/// A tunnel bring-up or bring-down outcome.
///
/// `NoError` is a sentinel: reporting it clears the APN's policy state
/// instead of scheduling anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IwlanError {
    NoError,
    /// IKEv2 notify error raised by the driver.
    IkeProtocolError(u16),
    /// The IKE library gave up retransmitting (network loss, unresponsive
    /// ePDG, socket failure).
    IkeInternalIoException,
    /// Any other exception out of the IKE library.
    IkeGenericException,
    /// The ePDG selector produced no usable endpoint.
    ServerSelectionFailed,
    /// IPsec transform negotiation failed.
    TunnelTransformFailed,
    /// SIM not ready while building the request.
    SimNotReady,
    /// Close requested for a tunnel that does not exist.
    TunnelNotFound,
    /// Underlying network disappeared.
    NetworkFailure,
}

impl IwlanError {
    /// Symbolic name used by `GENERIC_ERROR_TYPE` policy details. IKE
    /// protocol errors are matched by code instead and have no generic name.
    pub fn generic_name(&self) -> Option<&'static str> {
        match self {
            IwlanError::IkeInternalIoException => Some("IKE_INTERNAL_IO_EXCEPTION"),
            IwlanError::IkeGenericException => Some("IKE_GENERIC_EXCEPTION"),
            IwlanError::ServerSelectionFailed => Some("SERVER_SELECTION_FAILED"),
            IwlanError::TunnelTransformFailed => Some("TUNNEL_TRANSFORM_FAILED"),
            IwlanError::SimNotReady => Some("SIM_NOT_READY_EXCEPTION"),
            IwlanError::TunnelNotFound => Some("TUNNEL_NOT_FOUND"),
            IwlanError::NetworkFailure => Some("NETWORK_FAILURE"),
            IwlanError::NoError | IwlanError::IkeProtocolError(_) => None,
        }
    }

    /// True for every generic name the policy schema accepts.
    pub fn is_known_generic_name(name: &str) -> bool {
        matches!(
            name,
            "IKE_INTERNAL_IO_EXCEPTION"
                | "IKE_GENERIC_EXCEPTION"
                | "SERVER_SELECTION_FAILED"
                | "TUNNEL_TRANSFORM_FAILED"
                | "SIM_NOT_READY_EXCEPTION"
                | "TUNNEL_NOT_FOUND"
                | "NETWORK_FAILURE"
        )
    }

    /// Platform fail cause reported for this error. Fixed table; private
    /// IKEv2 notify codes map onto the IWLAN-prefixed causes that carry the
    /// same value.
    pub fn data_fail_cause(&self) -> DataFailCause {
        match self {
            IwlanError::NoError => DataFailCause::NONE,
            IwlanError::IkeProtocolError(code) => match *code {
                ike_notify::AUTHENTICATION_FAILED => DataFailCause::USER_AUTHENTICATION,
                ike_notify::PDN_CONNECTION_REJECTION => {
                    DataFailCause::IWLAN_PDN_CONNECTION_REJECTION
                }
                ike_notify::MAX_CONNECTION_REACHED => DataFailCause::IWLAN_MAX_CONNECTION_REACHED,
                ike_notify::SEMANTIC_ERROR_IN_THE_TFT_OPERATION => {
                    DataFailCause::IWLAN_SEMANTIC_ERROR_IN_THE_TFT_OPERATION
                }
                ike_notify::SYNTACTICAL_ERROR_IN_THE_TFT_OPERATION => {
                    DataFailCause::IWLAN_SYNTACTICAL_ERROR_IN_THE_TFT_OPERATION
                }
                ike_notify::NON_3GPP_ACCESS_TO_EPC_NOT_ALLOWED => {
                    DataFailCause::IWLAN_NON_3GPP_ACCESS_TO_EPC_NOT_ALLOWED
                }
                _ => DataFailCause::ERROR_UNSPECIFIED,
            },
            IwlanError::ServerSelectionFailed | IwlanError::NetworkFailure => {
                DataFailCause::NETWORK_FAILURE
            }
            IwlanError::IkeInternalIoException
            | IwlanError::IkeGenericException
            | IwlanError::TunnelTransformFailed
            | IwlanError::SimNotReady
            | IwlanError::TunnelNotFound => DataFailCause::ERROR_UNSPECIFIED,
        }
    }
}

impl fmt::Display for IwlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IwlanError::NoError => write!(f, "NO_ERROR"),
            IwlanError::IkeProtocolError(code) => {
                write!(f, "IKE_PROTOCOL_ERROR_TYPE({code})")
            }
            other => write!(f, "{}", other.generic_name().unwrap_or("UNKNOWN")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_cause_table() {
        assert_eq!(
            IwlanError::IkeProtocolError(ike_notify::AUTHENTICATION_FAILED).data_fail_cause(),
            DataFailCause::USER_AUTHENTICATION
        );
        assert_eq!(
            IwlanError::IkeProtocolError(ike_notify::PDN_CONNECTION_REJECTION).data_fail_cause(),
            DataFailCause::IWLAN_PDN_CONNECTION_REJECTION
        );
        assert_eq!(
            IwlanError::ServerSelectionFailed.data_fail_cause(),
            DataFailCause::NETWORK_FAILURE
        );
        assert_eq!(IwlanError::NoError.data_fail_cause(), DataFailCause::NONE);
        assert_eq!(
            IwlanError::IkeProtocolError(12345).data_fail_cause(),
            DataFailCause::ERROR_UNSPECIFIED
        );
    }

    #[test]
    fn test_generic_names_are_closed_set() {
        assert!(IwlanError::is_known_generic_name("SERVER_SELECTION_FAILED"));
        assert!(!IwlanError::is_known_generic_name("SOMETHING_ELSE"));
        assert_eq!(
            IwlanError::ServerSelectionFailed.generic_name(),
            Some("SERVER_SELECTION_FAILED")
        );
        assert_eq!(IwlanError::IkeProtocolError(24).generic_name(), None);
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(IwlanError::NoError.to_string(), "NO_ERROR");
        assert_eq!(
            IwlanError::IkeProtocolError(24).to_string(),
            "IKE_PROTOCOL_ERROR_TYPE(24)"
        );
        assert_eq!(
            IwlanError::TunnelTransformFailed.to_string(),
            "TUNNEL_TRANSFORM_FAILED"
        );
    }
}
