//! Per-slot service registry and global event entry points.
//!
//! The registry owns every per-slot instance (bus, policy engine, selector,
//! tunnel manager, surfaces) with an explicit init/teardown lifecycle, plus
//! the two process-wide single-writer cells: the last-seen Wi-Fi SSID and
//! the default-transport classification. Platform broadcasts funnel through
//! the methods here and fan out as bus events.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use iwlan_config::{CarrierConfigSource, ConfigBundle, StaticConfigSource,
    StaticSubscriptionSource, SubscriptionSource};
use iwlan_core::{EventBus, IwlanEvent, WifiSsidTracker};
use iwlan_epdg::{
    CellInfoSource, ConnectivityState, DnsResolver, EpdgSelector, IkeDriver, Transport,
    TunnelEventListener, TunnelManager, TunnelManagerDeps,
};
use iwlan_policy::{ErrorPolicyManager, IwlanError};
use iwlan_proto::{DataCallResponse, Network};

use crate::data_service::DataServiceProvider;
use crate::error_reporter::{BroadcastSink, ErrorReporter};
use crate::network_service::NetworkServiceProvider;

/// Unsolicited indications toward the platform.
pub trait PlatformNotifier: Send + Sync {
    fn notify_data_call_list_changed(&self, slot: u32, list: Vec<DataCallResponse>);
    fn notify_network_registration_info_changed(&self, slot: u32);
}

/// Everything the daemon is wired to at startup.
pub struct ContextDeps {
    pub config_source: Arc<StaticConfigSource>,
    pub subscription: Arc<StaticSubscriptionSource>,
    pub driver: Arc<dyn IkeDriver>,
    pub resolver: Arc<dyn DnsResolver>,
    pub cell_source: Arc<dyn CellInfoSource>,
    pub broadcast: Arc<dyn BroadcastSink>,
    pub notifier: Arc<dyn PlatformNotifier>,
}

/// The service stack of one SIM slot.
pub struct SlotServices {
    pub bus: Arc<EventBus>,
    pub policy: Arc<ErrorPolicyManager>,
    pub selector: Arc<EpdgSelector>,
    pub tunnel_manager: Arc<TunnelManager>,
    pub data_service: Arc<DataServiceProvider>,
    pub network_service: Arc<NetworkServiceProvider>,
}

/// Forwards tunnel manager notifications to the platform and the error
/// reporter.
struct SurfaceListener {
    slot: u32,
    notifier: Arc<dyn PlatformNotifier>,
    reporter: Arc<ErrorReporter>,
}

impl TunnelEventListener for SurfaceListener {
    fn on_data_call_list_changed(&self, list: Vec<DataCallResponse>) {
        self.notifier.notify_data_call_list_changed(self.slot, list);
    }

    fn on_tunnel_bring_up_error(&self, _apn: &str, error: IwlanError) {
        self.reporter.report_tunnel_bring_up_error(error);
    }
}

pub struct IwlanContext {
    config_source: Arc<StaticConfigSource>,
    subscription: Arc<StaticSubscriptionSource>,
    driver: Arc<dyn IkeDriver>,
    resolver: Arc<dyn DnsResolver>,
    cell_source: Arc<dyn CellInfoSource>,
    notifier: Arc<dyn PlatformNotifier>,
    reporter: Arc<ErrorReporter>,
    connectivity: Arc<ConnectivityState>,
    ssid_tracker: WifiSsidTracker,
    wifi_connected: Arc<AtomicBool>,
    apm_state: Mutex<Option<bool>>,
    slots: Mutex<HashMap<u32, Arc<SlotServices>>>,
}

impl IwlanContext {
    pub fn new(deps: ContextDeps) -> Arc<Self> {
        Arc::new(IwlanContext {
            config_source: deps.config_source,
            subscription: deps.subscription,
            driver: deps.driver,
            resolver: deps.resolver,
            cell_source: deps.cell_source,
            notifier: deps.notifier,
            reporter: Arc::new(ErrorReporter::new(deps.broadcast)),
            connectivity: ConnectivityState::new(),
            ssid_tracker: WifiSsidTracker::new(),
            wifi_connected: Arc::new(AtomicBool::new(false)),
            apm_state: Mutex::new(None),
            slots: Mutex::new(HashMap::new()),
        })
    }

    pub fn connectivity(&self) -> Arc<ConnectivityState> {
        Arc::clone(&self.connectivity)
    }

    pub fn subscription(&self) -> Arc<StaticSubscriptionSource> {
        Arc::clone(&self.subscription)
    }

    pub fn config_source(&self) -> Arc<StaticConfigSource> {
        Arc::clone(&self.config_source)
    }

    /// Bring up the full service stack for a slot.
    pub fn init_slot(&self, slot: u32) -> Arc<SlotServices> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = slots.get(&slot) {
            log::warn!("slot {slot} already initialized");
            return Arc::clone(existing);
        }

        log::info!("initializing slot {slot}");
        let bus = Arc::new(EventBus::new(slot));

        let policy = ErrorPolicyManager::new(
            slot,
            Arc::clone(&self.config_source) as Arc<dyn CarrierConfigSource>,
        );
        policy.attach(&bus);

        let selector = EpdgSelector::new(
            slot,
            Arc::clone(&self.config_source) as Arc<dyn CarrierConfigSource>,
            Arc::clone(&self.subscription) as Arc<dyn SubscriptionSource>,
            Arc::clone(&self.cell_source),
            Arc::clone(&self.resolver),
        );

        let listener = Arc::new(SurfaceListener {
            slot,
            notifier: Arc::clone(&self.notifier),
            reporter: Arc::clone(&self.reporter),
        });
        let tunnel_manager = TunnelManager::new(TunnelManagerDeps {
            slot,
            selector: Arc::clone(&selector),
            driver: Arc::clone(&self.driver),
            policy: Arc::clone(&policy),
            listener,
            connectivity: Arc::clone(&self.connectivity),
            subscription: Arc::clone(&self.subscription) as Arc<dyn SubscriptionSource>,
            config_source: Arc::clone(&self.config_source) as Arc<dyn CarrierConfigSource>,
        });

        let data_service = DataServiceProvider::new(
            slot,
            Arc::clone(&tunnel_manager),
            Arc::clone(&selector),
            Arc::clone(&self.subscription) as Arc<dyn SubscriptionSource>,
            Arc::clone(&self.connectivity),
        );
        data_service.attach(&bus);

        let network_service = NetworkServiceProvider::new(
            slot,
            Arc::clone(&self.subscription) as Arc<dyn SubscriptionSource>,
            Arc::clone(&self.wifi_connected),
            Arc::clone(&self.notifier),
        );

        let services = Arc::new(SlotServices {
            bus,
            policy,
            selector,
            tunnel_manager,
            data_service,
            network_service,
        });
        slots.insert(slot, Arc::clone(&services));
        services
    }

    /// Tear a slot down, stopping its workers.
    pub fn teardown_slot(&self, slot: u32) {
        let services = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.remove(&slot)
        };
        let Some(services) = services else {
            log::warn!("teardown for unknown slot {slot}");
            return;
        };
        log::info!("tearing down slot {slot}");
        services.tunnel_manager.force_close_all();
        services.data_service.detach(&services.bus);
        services.policy.detach(&services.bus);
        services.tunnel_manager.shutdown();
        services.selector.shutdown();
    }

    pub fn slot(&self, slot: u32) -> Option<Arc<SlotServices>> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.get(&slot).cloned()
    }

    fn all_slots(&self) -> Vec<Arc<SlotServices>> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.values().cloned().collect()
    }

    /// New carrier configuration for a slot; `None` means the carrier is
    /// unknown.
    pub fn on_carrier_config_changed(&self, slot: u32, bundle: Option<ConfigBundle>) {
        let event = match bundle {
            Some(bundle) => {
                self.config_source.set_config(slot, bundle);
                IwlanEvent::CarrierConfigChanged
            }
            None => {
                self.config_source.clear_config(slot);
                IwlanEvent::CarrierConfigUnknownCarrier
            }
        };
        if let Some(services) = self.slot(slot) {
            services.bus.publish(event);
        }
    }

    /// Airplane-mode broadcast; repeats of the same state are ignored.
    pub fn on_airplane_mode_changed(&self, enabled: bool) {
        {
            let mut apm_state = self.apm_state.lock().unwrap_or_else(|e| e.into_inner());
            if *apm_state == Some(enabled) {
                return;
            }
            *apm_state = Some(enabled);
        }
        let event = if enabled {
            IwlanEvent::ApmEnable
        } else {
            IwlanEvent::ApmDisable
        };
        for services in self.all_slots() {
            services.bus.publish(event);
        }
    }

    /// Wi-Fi radio turned off.
    pub fn on_wifi_disabled(&self) {
        for services in self.all_slots() {
            services.bus.publish(IwlanEvent::WifiDisable);
        }
    }

    /// User toggled Wi-Fi calling for a slot.
    pub fn on_wifi_calling_changed(&self, slot: u32, enabled: bool) {
        let event = if enabled {
            IwlanEvent::WifiCallingEnable
        } else {
            IwlanEvent::WifiCallingDisable
        };
        if let Some(services) = self.slot(slot) {
            services.bus.publish(event);
        }
    }

    /// A Wi-Fi network with the given SSID became usable.
    pub fn on_wifi_network_available(&self, ssid: &str) {
        if self.ssid_tracker.report_connected(ssid) {
            for services in self.all_slots() {
                services.bus.publish(IwlanEvent::WifiApChanged);
            }
        }
        if !self.wifi_connected.swap(true, Ordering::AcqRel) {
            for services in self.all_slots() {
                services.network_service.wifi_state_changed();
            }
        }
    }

    /// The Wi-Fi network is gone.
    pub fn on_wifi_network_lost(&self) {
        if self.wifi_connected.swap(false, Ordering::AcqRel) {
            for services in self.all_slots() {
                services.network_service.wifi_state_changed();
            }
        }
    }

    /// Default-network observation from the connectivity monitor. A switch
    /// of the default transport, or a disconnect, force-closes every
    /// tunnel; a connect re-evaluates the DNS prefetch.
    pub fn on_default_network_changed(
        &self,
        connected: bool,
        network: Option<Network>,
        transport: Transport,
    ) {
        let switched = self.connectivity.update(connected, network, transport);
        if switched || !connected {
            for services in self.all_slots() {
                services.tunnel_manager.force_close_all();
            }
        }
        if connected {
            for services in self.all_slots() {
                services.data_service.network_state_changed();
            }
        }
    }

    /// Subscription database changed; every slot re-evaluates.
    pub fn on_subscriptions_changed(&self) {
        for services in self.all_slots() {
            services.network_service.subscription_changed();
        }
    }

    pub fn shutdown(&self) {
        let slot_ids: Vec<u32> = {
            let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.keys().copied().collect()
        };
        for slot in slot_ids {
            self.teardown_slot(slot);
        }
    }
}
