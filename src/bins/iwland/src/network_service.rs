//! Network-registration surface.
//!
//! Presents the IWLAN pseudo-network to the platform: registered HOME
//! whenever Wi-Fi is connected, searching otherwise, emergency-only while
//! the slot has no active subscription. Only the PS domain exists here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use iwlan_config::SubscriptionSource;
use iwlan_proto::{
    Domain, NetworkRegistrationInfo, NetworkRegistrationInfoBuilder, RegistrationState,
    ServiceResult, TransportType,
};

use crate::context::PlatformNotifier;

/// Completion callback for a registration-info request.
pub trait NetworkServiceCallback: Send + Sync {
    fn on_request_network_registration_info_complete(
        &self,
        result: ServiceResult,
        info: Option<NetworkRegistrationInfo>,
    );
}

pub struct NetworkServiceProvider {
    slot: u32,
    subscription: Arc<dyn SubscriptionSource>,
    wifi_connected: Arc<AtomicBool>,
    notifier: Arc<dyn PlatformNotifier>,
    is_sub_active: Mutex<bool>,
}

impl NetworkServiceProvider {
    pub fn new(
        slot: u32,
        subscription: Arc<dyn SubscriptionSource>,
        wifi_connected: Arc<AtomicBool>,
        notifier: Arc<dyn PlatformNotifier>,
    ) -> Arc<Self> {
        Arc::new(NetworkServiceProvider {
            slot,
            subscription,
            wifi_connected,
            notifier,
            is_sub_active: Mutex::new(false),
        })
    }

    pub fn request_network_registration_info(
        &self,
        domain: Domain,
        callback: &dyn NetworkServiceCallback,
    ) {
        if domain != Domain::Ps {
            callback
                .on_request_network_registration_info_complete(ServiceResult::ErrorUnsupported, None);
            return;
        }

        let is_sub_active = *self.is_sub_active.lock().unwrap_or_else(|e| e.into_inner());
        let registration_state = if self.wifi_connected.load(Ordering::Acquire) {
            RegistrationState::Home
        } else {
            RegistrationState::NotRegisteredSearching
        };
        log::debug!(
            "slot {}: registration state {}",
            self.slot,
            registration_state.name()
        );

        let info = NetworkRegistrationInfoBuilder::new()
            .domain(Domain::Ps)
            .transport(TransportType::Wlan)
            .registration_state(registration_state)
            .emergency_only(!is_sub_active)
            .build();
        match info {
            Ok(info) => callback
                .on_request_network_registration_info_complete(ServiceResult::Success, Some(info)),
            Err(e) => {
                log::error!("slot {}: registration info unbuildable: {e}", self.slot);
                callback.on_request_network_registration_info_complete(
                    ServiceResult::ErrorInvalidArg,
                    None,
                );
            }
        }
    }

    /// Re-read subscription state; notify the platform only on a change.
    pub fn subscription_changed(&self) {
        let active = self.subscription.is_subscription_active(self.slot);
        let mut is_sub_active = self.is_sub_active.lock().unwrap_or_else(|e| e.into_inner());
        if *is_sub_active == active {
            return;
        }
        *is_sub_active = active;
        log::debug!(
            "slot {}: subscription changed to {}",
            self.slot,
            if active { "ready" } else { "not_ready" }
        );
        drop(is_sub_active);
        self.notifier
            .notify_network_registration_info_changed(self.slot);
    }

    /// The Wi-Fi connection state flipped; registration state follows it.
    pub fn wifi_state_changed(&self) {
        self.notifier
            .notify_network_registration_info_changed(self.slot);
    }
}
