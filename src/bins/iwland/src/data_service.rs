//! Data-call surface.
//!
//! Thin front of the tunnel lifecycle manager: forwards the platform's
//! setup / deactivate / list requests, tracks carrier-config and Wi-Fi
//! calling readiness on its own worker, and warms the ePDG DNS caches when
//! everything is in place and no tunnel exists yet.

use std::sync::{Arc, Mutex, Weak};

use iwlan_config::SubscriptionSource;
use iwlan_core::{EventBus, EventConsumer, IwlanEvent, SerialWorker, SubscriberId, WorkerHandle};
use iwlan_epdg::{
    CancelToken, ConnectivityState, DataServiceCallback, EpdgSelector, ProtoFilter,
    SetupDataCallRequest, TunnelManager,
};
use iwlan_proto::DataRequestReason;

/// Events this surface cares about.
const SURFACE_EVENTS: [IwlanEvent; 4] = [
    IwlanEvent::CarrierConfigChanged,
    IwlanEvent::CarrierConfigUnknownCarrier,
    IwlanEvent::WifiCallingEnable,
    IwlanEvent::WifiCallingDisable,
];

#[derive(Debug, Default, Clone, Copy)]
struct SurfaceFlags {
    wfc_enabled: bool,
    carrier_config_ready: bool,
}

pub struct DataServiceProvider {
    slot: u32,
    tunnel_manager: Arc<TunnelManager>,
    selector: Arc<EpdgSelector>,
    subscription: Arc<dyn SubscriptionSource>,
    connectivity: Arc<ConnectivityState>,
    flags: Mutex<SurfaceFlags>,
    worker: Mutex<Option<SerialWorker<IwlanEvent>>>,
    bus_subscription: Mutex<Option<SubscriberId>>,
}

struct SurfacePoster {
    handle: WorkerHandle<IwlanEvent>,
}

impl EventConsumer for SurfacePoster {
    fn post_event(&self, event: IwlanEvent) {
        self.handle.post(event);
    }
}

impl DataServiceProvider {
    pub fn new(
        slot: u32,
        tunnel_manager: Arc<TunnelManager>,
        selector: Arc<EpdgSelector>,
        subscription: Arc<dyn SubscriptionSource>,
        connectivity: Arc<ConnectivityState>,
    ) -> Arc<Self> {
        Arc::new(DataServiceProvider {
            slot,
            tunnel_manager,
            selector,
            subscription,
            connectivity,
            flags: Mutex::new(SurfaceFlags::default()),
            worker: Mutex::new(None),
            bus_subscription: Mutex::new(None),
        })
    }

    /// Start the surface worker and subscribe it to the slot's bus.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) {
        let weak: Weak<DataServiceProvider> = Arc::downgrade(self);
        let worker = SerialWorker::spawn(&format!("data-service-{}", self.slot), move |event| {
            if let Some(provider) = weak.upgrade() {
                provider.handle_event(event);
            }
        });
        let poster = Arc::new(SurfacePoster {
            handle: worker.handle(),
        });
        let id = bus.subscribe(&SURFACE_EVENTS, poster);
        *self.worker.lock().unwrap_or_else(|e| e.into_inner()) = Some(worker);
        *self.bus_subscription.lock().unwrap_or_else(|e| e.into_inner()) = Some(id);
    }

    pub fn detach(&self, bus: &EventBus) {
        if let Some(id) = self
            .bus_subscription
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            bus.unsubscribe(id);
        }
        if let Some(worker) = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take() {
            worker.shutdown();
        }
    }

    pub fn setup_data_call(
        &self,
        request: SetupDataCallRequest,
        callback: Arc<dyn DataServiceCallback>,
    ) {
        log::debug!(
            "slot {}: setupDataCall apn={:?} reason={:?}",
            self.slot,
            request.profile.as_ref().map(|p| p.apn.as_str()),
            request.reason
        );
        self.tunnel_manager.setup_data_call(request, callback);
    }

    pub fn deactivate_data_call(
        &self,
        cid: i32,
        reason: DataRequestReason,
        callback: Arc<dyn DataServiceCallback>,
    ) {
        log::debug!("slot {}: deactivateDataCall cid={cid} reason={reason:?}", self.slot);
        self.tunnel_manager.deactivate_data_call(cid, reason, callback);
    }

    pub fn request_data_call_list(&self, callback: Arc<dyn DataServiceCallback>) {
        self.tunnel_manager.request_data_call_list(callback);
    }

    /// Bus event entry point; also callable directly from tests.
    pub fn handle_event(&self, event: IwlanEvent) {
        log::debug!("slot {}: data surface event {}", self.slot, event.name());
        let mut prefetch = false;
        {
            let mut flags = self.flags.lock().unwrap_or_else(|e| e.into_inner());
            match event {
                IwlanEvent::CarrierConfigChanged => {
                    flags.carrier_config_ready = true;
                    prefetch = true;
                }
                IwlanEvent::CarrierConfigUnknownCarrier => flags.carrier_config_ready = false,
                IwlanEvent::WifiCallingEnable => {
                    flags.wfc_enabled = true;
                    prefetch = true;
                }
                IwlanEvent::WifiCallingDisable => flags.wfc_enabled = false,
                _ => {}
            }
        }
        if prefetch {
            self.dns_prefetch_check();
        }
    }

    /// The default network changed; re-evaluate the prefetch conditions.
    pub fn network_state_changed(&self) {
        self.dns_prefetch_check();
    }

    /// Warm the ePDG DNS caches when carrier config is ready, Wi-Fi calling
    /// is on, the network is usable and no tunnel exists. Results are
    /// discarded; failures are ignored.
    fn dns_prefetch_check(&self) {
        let flags = *self.flags.lock().unwrap_or_else(|e| e.into_inner());
        let is_dds = self.subscription.is_default_data_slot(self.slot);
        let is_cst = self.subscription.is_cross_sim_calling_enabled(self.slot);
        let connected = self.connectivity.is_network_connected(is_dds, is_cst);

        if !(connected
            && flags.carrier_config_ready
            && flags.wfc_enabled
            && !self.tunnel_manager.has_tunnels())
        {
            return;
        }
        let network = match self.connectivity.network() {
            Some(network) => network,
            None => return,
        };

        log::debug!("slot {}: prefetching epdg server list", self.slot);
        for is_roaming in [false, true] {
            self.selector.resolve_on_worker(
                ProtoFilter::Ipv4v6,
                is_roaming,
                network,
                CancelToken::new(),
                Box::new(|_result| {}),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iwlan_config::{keys, ConfigBundle, StaticConfigSource, StaticSubscriptionSource};
    use iwlan_epdg::{
        IkeDriver, IkeSessionConfig, NoCellInfo, Transport, TunnelCallback, TunnelEventListener,
        TunnelManagerDeps,
    };
    use iwlan_epdg::dns::DnsResolver;
    use iwlan_policy::ErrorPolicyManager;
    use iwlan_proto::{DataCallResponse, Network};
    use std::net::IpAddr;
    use std::time::Duration;

    const SLOT: u32 = 0;

    #[derive(Default)]
    struct CountingResolver {
        queries: Mutex<Vec<String>>,
    }

    impl CountingResolver {
        fn count(&self) -> usize {
            self.queries.lock().unwrap().len()
        }
    }

    impl DnsResolver for CountingResolver {
        fn resolve(&self, _network: Network, fqdn: &str, _timeout: Duration) -> Vec<IpAddr> {
            self.queries.lock().unwrap().push(fqdn.to_string());
            vec!["192.0.2.1".parse().unwrap()]
        }
    }

    #[derive(Default)]
    struct NullDriver;

    impl IkeDriver for NullDriver {
        fn bring_up_tunnel(
            &self,
            _request: &iwlan_epdg::TunnelSetupRequest,
            _session: &IkeSessionConfig,
            _endpoints: &[iwlan_epdg::EpdgEndpoint],
            _callback: Arc<dyn TunnelCallback>,
        ) -> bool {
            false
        }

        fn close_tunnel(&self, _apn: &str, _force_close: bool) {}
    }

    #[derive(Default)]
    struct NullListener;

    impl TunnelEventListener for NullListener {
        fn on_data_call_list_changed(&self, _list: Vec<DataCallResponse>) {}
    }

    fn wait_for(deadline_ms: u64, mut condition: impl FnMut() -> bool) {
        let deadline = std::time::Instant::now() + Duration::from_millis(deadline_ms);
        while !condition() {
            if std::time::Instant::now() > deadline {
                panic!("condition not reached in {deadline_ms}ms");
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    struct Fixture {
        provider: Arc<DataServiceProvider>,
        bus: Arc<EventBus>,
        resolver: Arc<CountingResolver>,
        connectivity: Arc<ConnectivityState>,
    }

    fn fixture() -> Fixture {
        let config = StaticConfigSource::new();
        let mut bundle = ConfigBundle::new();
        bundle.put_int_array(
            keys::KEY_EPDG_ADDRESS_PRIORITY_INT_ARRAY,
            vec![keys::EPDG_ADDRESS_STATIC],
        );
        bundle.put_string(keys::KEY_EPDG_STATIC_ADDRESS_STRING, "epdg.example.com");
        config.set_config(SLOT, bundle);

        let subscription = StaticSubscriptionSource::new();
        subscription.set_default_data_slot(SLOT, true);

        let connectivity = ConnectivityState::new();
        connectivity.update(true, Some(Network(4)), Transport::Wifi);

        let resolver = Arc::new(CountingResolver::default());
        let selector = EpdgSelector::new(
            SLOT,
            Arc::clone(&config) as _,
            Arc::clone(&subscription) as _,
            Arc::new(NoCellInfo),
            Arc::clone(&resolver) as _,
        );
        let policy = ErrorPolicyManager::new(SLOT, Arc::clone(&config) as _);
        let tunnel_manager = TunnelManager::new(TunnelManagerDeps {
            slot: SLOT,
            selector: Arc::clone(&selector),
            driver: Arc::new(NullDriver),
            policy,
            listener: Arc::new(NullListener),
            connectivity: Arc::clone(&connectivity),
            subscription: Arc::clone(&subscription) as _,
            config_source: Arc::clone(&config) as _,
        });

        let bus = Arc::new(EventBus::new(SLOT));
        let provider = DataServiceProvider::new(
            SLOT,
            tunnel_manager,
            selector,
            subscription as _,
            Arc::clone(&connectivity),
        );
        provider.attach(&bus);

        Fixture {
            provider,
            bus,
            resolver,
            connectivity,
        }
    }

    #[test]
    fn test_prefetch_fires_when_all_conditions_met() {
        let fixture = fixture();
        fixture.bus.publish(IwlanEvent::CarrierConfigChanged);
        fixture.bus.publish(IwlanEvent::WifiCallingEnable);

        // Two resolutions (home + roaming), one query each.
        wait_for(2000, || fixture.resolver.count() == 2);
    }

    #[test]
    fn test_no_prefetch_without_wifi_calling() {
        let fixture = fixture();
        fixture.bus.publish(IwlanEvent::CarrierConfigChanged);
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(fixture.resolver.count(), 0);
    }

    #[test]
    fn test_no_prefetch_when_network_down() {
        let fixture = fixture();
        fixture
            .connectivity
            .update(false, None, Transport::Unspecified);
        fixture.bus.publish(IwlanEvent::CarrierConfigChanged);
        fixture.bus.publish(IwlanEvent::WifiCallingEnable);
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(fixture.resolver.count(), 0);
    }

    #[test]
    fn test_unknown_carrier_clears_readiness() {
        let fixture = fixture();
        fixture.bus.publish(IwlanEvent::CarrierConfigChanged);
        fixture.bus.publish(IwlanEvent::WifiCallingEnable);
        wait_for(2000, || fixture.resolver.count() == 2);

        fixture.bus.publish(IwlanEvent::CarrierConfigUnknownCarrier);
        // Wi-Fi calling toggling alone must not prefetch anymore.
        fixture.bus.publish(IwlanEvent::WifiCallingDisable);
        fixture.bus.publish(IwlanEvent::WifiCallingEnable);
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(fixture.resolver.count(), 2);
        fixture.provider.detach(&fixture.bus);
    }
}
