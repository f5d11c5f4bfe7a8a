//! Network-registration surface types.

use thiserror::Error;

/// Registration domain. Only the packet-switched domain is served by the
/// IWLAN network surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Cs,
    Ps,
}

/// Transport the registration rides on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportType {
    Wwan,
    Wlan,
}

/// Registration state reported for the IWLAN pseudo-network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    NotRegisteredIdle,
    NotRegisteredSearching,
    Home,
    Roaming,
}

impl RegistrationState {
    pub fn name(&self) -> &'static str {
        match self {
            RegistrationState::NotRegisteredIdle => "NOT_REGISTERED_IDLE",
            RegistrationState::NotRegisteredSearching => "NOT_REGISTERED_SEARCHING",
            RegistrationState::Home => "HOME",
            RegistrationState::Roaming => "ROAMING",
        }
    }
}

/// Immutable registration info snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRegistrationInfo {
    pub domain: Domain,
    pub transport: TransportType,
    pub registration_state: RegistrationState,
    pub emergency_only: bool,
    /// Access network technology; always IWLAN here.
    pub access_network_iwlan: bool,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistrationInfoError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Builder validating the required fields at `build()`.
#[derive(Debug, Default)]
pub struct NetworkRegistrationInfoBuilder {
    domain: Option<Domain>,
    transport: Option<TransportType>,
    registration_state: Option<RegistrationState>,
    emergency_only: bool,
}

impl NetworkRegistrationInfoBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn domain(mut self, domain: Domain) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn transport(mut self, transport: TransportType) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn registration_state(mut self, state: RegistrationState) -> Self {
        self.registration_state = Some(state);
        self
    }

    pub fn emergency_only(mut self, emergency_only: bool) -> Self {
        self.emergency_only = emergency_only;
        self
    }

    pub fn build(self) -> Result<NetworkRegistrationInfo, RegistrationInfoError> {
        Ok(NetworkRegistrationInfo {
            domain: self
                .domain
                .ok_or(RegistrationInfoError::MissingField("domain"))?,
            transport: self
                .transport
                .ok_or(RegistrationInfoError::MissingField("transport"))?,
            registration_state: self
                .registration_state
                .ok_or(RegistrationInfoError::MissingField("registration_state"))?,
            emergency_only: self.emergency_only,
            access_network_iwlan: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_all_fields() {
        let err = NetworkRegistrationInfoBuilder::new().build().unwrap_err();
        assert_eq!(err, RegistrationInfoError::MissingField("domain"));

        let info = NetworkRegistrationInfoBuilder::new()
            .domain(Domain::Ps)
            .transport(TransportType::Wlan)
            .registration_state(RegistrationState::Home)
            .build()
            .unwrap();
        assert!(info.access_network_iwlan);
        assert!(!info.emergency_only);
    }
}
