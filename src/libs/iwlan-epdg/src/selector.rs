//! ePDG server selection.
//!
//! Converts the carrier's prioritized address-source list into an ordered,
//! deduplicated, protocol-filtered list of ePDG endpoints. DNS-heavy, so
//! the whole pipeline runs on a selector-owned worker and consults a cancel
//! token between sources and between queries.

use std::collections::HashMap;
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, Weak};

use iwlan_config::{keys, CarrierConfigSource, ConfigBundle, SubscriptionSource};
use iwlan_core::{SerialWorker, Tai, WorkerHandle};
use iwlan_policy::IwlanError;
use iwlan_proto::Network;

use crate::dns::{CancelToken, DnsResolver, DEFAULT_DNS_TIMEOUT};

/// Requested IP family filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtoFilter {
    Ipv4,
    Ipv6,
    Ipv4v6,
}

impl ProtoFilter {
    fn admits(&self, address: &IpAddr) -> bool {
        match self {
            ProtoFilter::Ipv4 => address.is_ipv4(),
            ProtoFilter::Ipv6 => address.is_ipv6(),
            ProtoFilter::Ipv4v6 => true,
        }
    }
}

/// Where an endpoint came from, in carrier priority terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpdgSource {
    Static,
    Plmn,
    Pco,
    CellularLoc,
}

impl EpdgSource {
    pub fn name(&self) -> &'static str {
        match self {
            EpdgSource::Static => "STATIC",
            EpdgSource::Plmn => "PLMN",
            EpdgSource::Pco => "PCO",
            EpdgSource::CellularLoc => "CELLULAR_LOC",
        }
    }
}

/// A candidate ePDG endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpdgEndpoint {
    pub address: IpAddr,
    pub source: EpdgSource,
}

/// Current cell identity, for location-derived FQDNs.
pub trait CellInfoSource: Send + Sync {
    fn current_tai(&self, slot: u32) -> Option<Tai>;
}

/// A cell source that never knows where it is; used when the platform
/// provides no cell identity.
#[derive(Debug, Default)]
pub struct NoCellInfo;

impl CellInfoSource for NoCellInfo {
    fn current_tai(&self, _slot: u32) -> Option<Tai> {
        None
    }
}

type ResolveCompletion = Box<dyn FnOnce(Result<Vec<EpdgEndpoint>, IwlanError>) + Send>;

struct ResolveJob {
    filter: ProtoFilter,
    is_roaming: bool,
    network: Network,
    token: CancelToken,
    completion: ResolveCompletion,
}

/// Per-slot ePDG selector.
pub struct EpdgSelector {
    slot: u32,
    config_source: Arc<dyn CarrierConfigSource>,
    subscription: Arc<dyn SubscriptionSource>,
    cell_source: Arc<dyn CellInfoSource>,
    resolver: Arc<dyn DnsResolver>,
    /// PCO-delivered addresses keyed by PCO id, fed from the cellular
    /// attach path.
    pco_data: Mutex<HashMap<i64, Vec<IpAddr>>>,
    worker_handle: WorkerHandle<ResolveJob>,
    worker: Mutex<Option<SerialWorker<ResolveJob>>>,
}

impl EpdgSelector {
    pub fn new(
        slot: u32,
        config_source: Arc<dyn CarrierConfigSource>,
        subscription: Arc<dyn SubscriptionSource>,
        cell_source: Arc<dyn CellInfoSource>,
        resolver: Arc<dyn DnsResolver>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<EpdgSelector>| {
            let job_selector = weak.clone();
            let worker =
                SerialWorker::spawn(&format!("epdg-selector-{slot}"), move |job: ResolveJob| {
                    let result = match job_selector.upgrade() {
                        Some(selector) => {
                            selector.resolve(job.filter, job.is_roaming, job.network, &job.token)
                        }
                        None => Err(IwlanError::ServerSelectionFailed),
                    };
                    (job.completion)(result);
                });
            EpdgSelector {
                slot,
                config_source,
                subscription,
                cell_source,
                resolver,
                pco_data: Mutex::new(HashMap::new()),
                worker_handle: worker.handle(),
                worker: Mutex::new(Some(worker)),
            }
        })
    }

    /// Record ePDG addresses received in a PCO container.
    pub fn set_pco_data(&self, pco_id: i64, addresses: Vec<IpAddr>) {
        let mut pco = self.pco_data.lock().unwrap_or_else(|e| e.into_inner());
        pco.insert(pco_id, addresses);
    }

    /// Forget all PCO-delivered addresses (e.g. on detach).
    pub fn clear_pco_data(&self) {
        let mut pco = self.pco_data.lock().unwrap_or_else(|e| e.into_inner());
        pco.clear();
    }

    /// Queue a resolution on the selector's worker; the completion fires
    /// there. Callers never block on DNS.
    pub fn resolve_on_worker(
        &self,
        filter: ProtoFilter,
        is_roaming: bool,
        network: Network,
        token: CancelToken,
        completion: ResolveCompletion,
    ) {
        let posted = self.worker_handle.post(ResolveJob {
            filter,
            is_roaming,
            network,
            token,
            completion,
        });
        if !posted {
            log::warn!("slot {}: selector worker gone, resolution dropped", self.slot);
        }
    }

    /// Run the selection pipeline. Blocking (DNS); called on the selector
    /// worker or from prefetch threads.
    pub fn resolve(
        &self,
        filter: ProtoFilter,
        is_roaming: bool,
        network: Network,
        token: &CancelToken,
    ) -> Result<Vec<EpdgEndpoint>, IwlanError> {
        let config = self
            .config_source
            .config_for_slot(self.slot)
            .unwrap_or_default();

        let mut endpoints: Vec<EpdgEndpoint> = Vec::new();
        let mut seen: HashSet<IpAddr> = HashSet::new();

        for source_id in config.int_array(keys::KEY_EPDG_ADDRESS_PRIORITY_INT_ARRAY) {
            if token.is_cancelled() {
                break;
            }
            let (source, addresses) = match source_id {
                keys::EPDG_ADDRESS_STATIC => (
                    EpdgSource::Static,
                    self.resolve_static(&config, is_roaming, network, token),
                ),
                keys::EPDG_ADDRESS_PLMN => (
                    EpdgSource::Plmn,
                    self.resolve_plmn(&config, network, token),
                ),
                keys::EPDG_ADDRESS_PCO => (EpdgSource::Pco, self.resolve_pco(&config)),
                keys::EPDG_ADDRESS_CELLULAR_LOC => (
                    EpdgSource::CellularLoc,
                    self.resolve_cellular_loc(network, token),
                ),
                other => {
                    log::warn!("slot {}: unknown epdg address source {other}", self.slot);
                    continue;
                }
            };

            for address in addresses {
                if filter.admits(&address) && seen.insert(address) {
                    endpoints.push(EpdgEndpoint { address, source });
                }
            }
        }

        if endpoints.is_empty() && !token.is_cancelled() {
            log::warn!("slot {}: no epdg endpoint from any source", self.slot);
            return Err(IwlanError::ServerSelectionFailed);
        }
        log::debug!(
            "slot {}: selected {} epdg endpoint(s)",
            self.slot,
            endpoints.len()
        );
        Ok(endpoints)
    }

    fn resolve_static(
        &self,
        config: &ConfigBundle,
        is_roaming: bool,
        network: Network,
        token: &CancelToken,
    ) -> Vec<IpAddr> {
        let mut address = String::new();
        if is_roaming {
            address = config.string_value(keys::KEY_EPDG_STATIC_ADDRESS_ROAMING_STRING);
        }
        if address.is_empty() {
            address = config.string_value(keys::KEY_EPDG_STATIC_ADDRESS_STRING);
        }
        if address.is_empty() {
            return Vec::new();
        }
        if let Ok(literal) = address.parse::<IpAddr>() {
            return vec![literal];
        }
        self.resolve_fqdn(network, &address, token)
    }

    fn resolve_plmn(
        &self,
        config: &ConfigBundle,
        network: Network,
        token: &CancelToken,
    ) -> Vec<IpAddr> {
        let mut plmns = Vec::new();
        match self.subscription.sim_plmn(self.slot) {
            Some(plmn) => plmns.push(plmn),
            None => log::warn!("slot {}: no SIM PLMN for epdg fqdn", self.slot),
        }
        for pair in config.string_array(keys::KEY_MCC_MNCS_STRING_ARRAY) {
            match iwlan_core::Plmn::from_dashed_pair(&pair) {
                Ok(plmn) => plmns.push(plmn),
                Err(e) => log::warn!("slot {}: bad mcc-mnc entry {pair:?}: {e}", self.slot),
            }
        }

        let mut addresses = Vec::new();
        for plmn in plmns {
            if token.is_cancelled() {
                break;
            }
            addresses.extend(self.resolve_fqdn(network, &plmn.epdg_fqdn(), token));
        }
        addresses
    }

    fn resolve_pco(&self, config: &ConfigBundle) -> Vec<IpAddr> {
        let pco = self.pco_data.lock().unwrap_or_else(|e| e.into_inner());
        let mut addresses = Vec::new();
        for key in [keys::KEY_EPDG_PCO_ID_IPV4_INT, keys::KEY_EPDG_PCO_ID_IPV6_INT] {
            let pco_id = config.int_value(key);
            if pco_id == 0 {
                continue;
            }
            if let Some(found) = pco.get(&pco_id) {
                addresses.extend(found.iter().copied());
            }
        }
        addresses
    }

    fn resolve_cellular_loc(&self, network: Network, token: &CancelToken) -> Vec<IpAddr> {
        match self.cell_source.current_tai(self.slot) {
            Some(tai) => self.resolve_fqdn(network, &tai.epdg_fqdn(), token),
            None => {
                log::debug!("slot {}: no cell identity for epdg fqdn", self.slot);
                Vec::new()
            }
        }
    }

    fn resolve_fqdn(&self, network: Network, fqdn: &str, token: &CancelToken) -> Vec<IpAddr> {
        if token.is_cancelled() {
            return Vec::new();
        }
        self.resolver.resolve(network, fqdn, DEFAULT_DNS_TIMEOUT)
    }

    /// Stop the selector worker. In-flight jobs finish first.
    pub fn shutdown(&self) {
        if let Some(worker) = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take() {
            worker.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iwlan_config::{StaticConfigSource, StaticSubscriptionSource};
    use iwlan_core::Plmn;
    use std::sync::mpsc;
    use std::time::Duration;

    const SLOT: u32 = 0;
    const NET: Network = Network(3);

    #[derive(Default)]
    struct FakeDnsResolver {
        answers: Mutex<HashMap<String, Vec<IpAddr>>>,
        queries: Mutex<Vec<String>>,
    }

    impl FakeDnsResolver {
        fn insert(&self, fqdn: &str, addrs: &[&str]) {
            self.answers.lock().unwrap().insert(
                fqdn.to_string(),
                addrs.iter().map(|a| a.parse().unwrap()).collect(),
            );
        }

        fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    impl DnsResolver for FakeDnsResolver {
        fn resolve(&self, _network: Network, fqdn: &str, _timeout: Duration) -> Vec<IpAddr> {
            self.queries.lock().unwrap().push(fqdn.to_string());
            self.answers
                .lock()
                .unwrap()
                .get(fqdn)
                .cloned()
                .unwrap_or_default()
        }
    }

    struct FixedCell(Tai);

    impl CellInfoSource for FixedCell {
        fn current_tai(&self, _slot: u32) -> Option<Tai> {
            Some(self.0.clone())
        }
    }

    struct Fixture {
        selector: Arc<EpdgSelector>,
        resolver: Arc<FakeDnsResolver>,
        config: Arc<StaticConfigSource>,
    }

    fn fixture(priority: Vec<i64>, cell: Option<Tai>) -> Fixture {
        let config = StaticConfigSource::new();
        let mut bundle = ConfigBundle::new();
        bundle.put_int_array(keys::KEY_EPDG_ADDRESS_PRIORITY_INT_ARRAY, priority);
        config.set_config(SLOT, bundle);

        let subscription = StaticSubscriptionSource::new();
        subscription.set_sim_plmn(SLOT, Plmn::new("310", "260").unwrap());

        let resolver = Arc::new(FakeDnsResolver::default());
        let cell_source: Arc<dyn CellInfoSource> = match cell {
            Some(tai) => Arc::new(FixedCell(tai)),
            None => Arc::new(NoCellInfo),
        };
        let selector = EpdgSelector::new(
            SLOT,
            Arc::clone(&config) as _,
            subscription as _,
            cell_source,
            Arc::clone(&resolver) as _,
        );
        Fixture {
            selector,
            resolver,
            config,
        }
    }

    fn update_bundle(fixture: &Fixture, apply: impl FnOnce(&mut ConfigBundle)) {
        let mut bundle = fixture.config.config_for_slot(SLOT).unwrap();
        apply(&mut bundle);
        fixture.config.set_config(SLOT, bundle);
    }

    fn addrs(endpoints: &[EpdgEndpoint]) -> Vec<String> {
        endpoints.iter().map(|e| e.address.to_string()).collect()
    }

    #[test]
    fn test_plmn_fqdn_resolution() {
        let fixture = fixture(vec![keys::EPDG_ADDRESS_PLMN], None);
        fixture.resolver.insert(
            "epdg.epc.mnc260.mcc310.pub.3gppnetwork.org",
            &["192.0.2.10", "2001:db8::10"],
        );

        let endpoints = fixture
            .selector
            .resolve(ProtoFilter::Ipv4v6, false, NET, &CancelToken::new())
            .unwrap();

        assert_eq!(addrs(&endpoints), vec!["192.0.2.10", "2001:db8::10"]);
        assert!(endpoints.iter().all(|e| e.source == EpdgSource::Plmn));
    }

    #[test]
    fn test_additional_mcc_mnc_pairs_append_in_order() {
        let fixture = fixture(vec![keys::EPDG_ADDRESS_PLMN], None);
        update_bundle(&fixture, |bundle| {
            bundle.put_string_array(
                keys::KEY_MCC_MNCS_STRING_ARRAY,
                vec!["311-480".to_string()],
            );
        });
        fixture
            .resolver
            .insert("epdg.epc.mnc260.mcc310.pub.3gppnetwork.org", &["192.0.2.10"]);
        fixture
            .resolver
            .insert("epdg.epc.mnc480.mcc311.pub.3gppnetwork.org", &["192.0.2.20"]);

        let endpoints = fixture
            .selector
            .resolve(ProtoFilter::Ipv4, false, NET, &CancelToken::new())
            .unwrap();

        assert_eq!(addrs(&endpoints), vec!["192.0.2.10", "192.0.2.20"]);
    }

    #[test]
    fn test_static_literal_needs_no_dns() {
        let fixture = fixture(vec![keys::EPDG_ADDRESS_STATIC], None);
        update_bundle(&fixture, |bundle| {
            bundle.put_string(keys::KEY_EPDG_STATIC_ADDRESS_STRING, "198.51.100.7");
        });

        let endpoints = fixture
            .selector
            .resolve(ProtoFilter::Ipv4v6, false, NET, &CancelToken::new())
            .unwrap();

        assert_eq!(addrs(&endpoints), vec!["198.51.100.7"]);
        assert!(fixture.resolver.queries().is_empty());
    }

    #[test]
    fn test_static_roaming_address_preferred_when_roaming() {
        let fixture = fixture(vec![keys::EPDG_ADDRESS_STATIC], None);
        update_bundle(&fixture, |bundle| {
            bundle.put_string(keys::KEY_EPDG_STATIC_ADDRESS_STRING, "epdg.home.example");
            bundle.put_string(
                keys::KEY_EPDG_STATIC_ADDRESS_ROAMING_STRING,
                "epdg.roam.example",
            );
        });
        fixture.resolver.insert("epdg.home.example", &["192.0.2.1"]);
        fixture.resolver.insert("epdg.roam.example", &["192.0.2.2"]);

        let home = fixture
            .selector
            .resolve(ProtoFilter::Ipv4, false, NET, &CancelToken::new())
            .unwrap();
        assert_eq!(addrs(&home), vec!["192.0.2.1"]);

        let roaming = fixture
            .selector
            .resolve(ProtoFilter::Ipv4, true, NET, &CancelToken::new())
            .unwrap();
        assert_eq!(addrs(&roaming), vec!["192.0.2.2"]);
    }

    #[test]
    fn test_pco_addresses_yield_directly() {
        let fixture = fixture(vec![keys::EPDG_ADDRESS_PCO], None);
        update_bundle(&fixture, |bundle| {
            bundle.put_int(keys::KEY_EPDG_PCO_ID_IPV4_INT, 0xFF00);
            bundle.put_int(keys::KEY_EPDG_PCO_ID_IPV6_INT, 0xFF01);
        });
        fixture
            .selector
            .set_pco_data(0xFF00, vec!["203.0.113.4".parse().unwrap()]);
        fixture
            .selector
            .set_pco_data(0xFF01, vec!["2001:db8::4".parse().unwrap()]);

        let endpoints = fixture
            .selector
            .resolve(ProtoFilter::Ipv4v6, false, NET, &CancelToken::new())
            .unwrap();

        assert_eq!(addrs(&endpoints), vec!["203.0.113.4", "2001:db8::4"]);
        assert!(fixture.resolver.queries().is_empty());

        fixture.selector.clear_pco_data();
        assert!(fixture
            .selector
            .resolve(ProtoFilter::Ipv4v6, false, NET, &CancelToken::new())
            .is_err());
    }

    #[test]
    fn test_cellular_loc_fqdn() {
        let tai = Tai::new(Plmn::new("310", "260").unwrap(), 0x0102);
        let fixture = fixture(vec![keys::EPDG_ADDRESS_CELLULAR_LOC], Some(tai));
        fixture.resolver.insert(
            "tac-lb02.tac-hb01.tac.epdg.epc.mnc260.mcc310.pub.3gppnetwork.org",
            &["192.0.2.40"],
        );

        let endpoints = fixture
            .selector
            .resolve(ProtoFilter::Ipv4, false, NET, &CancelToken::new())
            .unwrap();
        assert_eq!(addrs(&endpoints), vec!["192.0.2.40"]);
    }

    #[test]
    fn test_priority_order_and_dedup() {
        let fixture = fixture(
            vec![keys::EPDG_ADDRESS_PLMN, keys::EPDG_ADDRESS_STATIC],
            None,
        );
        update_bundle(&fixture, |bundle| {
            bundle.put_string(keys::KEY_EPDG_STATIC_ADDRESS_STRING, "epdg.static.example");
        });
        fixture.resolver.insert(
            "epdg.epc.mnc260.mcc310.pub.3gppnetwork.org",
            &["192.0.2.10", "192.0.2.11"],
        );
        // The static FQDN repeats one PLMN answer; the repeat is dropped.
        fixture
            .resolver
            .insert("epdg.static.example", &["192.0.2.11", "192.0.2.12"]);

        let endpoints = fixture
            .selector
            .resolve(ProtoFilter::Ipv4, false, NET, &CancelToken::new())
            .unwrap();

        assert_eq!(
            addrs(&endpoints),
            vec!["192.0.2.10", "192.0.2.11", "192.0.2.12"]
        );
        assert_eq!(endpoints[0].source, EpdgSource::Plmn);
        assert_eq!(endpoints[2].source, EpdgSource::Static);
    }

    #[test]
    fn test_protocol_filter() {
        let fixture = fixture(vec![keys::EPDG_ADDRESS_PLMN], None);
        fixture.resolver.insert(
            "epdg.epc.mnc260.mcc310.pub.3gppnetwork.org",
            &["192.0.2.10", "2001:db8::10"],
        );

        let v4 = fixture
            .selector
            .resolve(ProtoFilter::Ipv4, false, NET, &CancelToken::new())
            .unwrap();
        assert_eq!(addrs(&v4), vec!["192.0.2.10"]);

        let v6 = fixture
            .selector
            .resolve(ProtoFilter::Ipv6, false, NET, &CancelToken::new())
            .unwrap();
        assert_eq!(addrs(&v6), vec!["2001:db8::10"]);
    }

    #[test]
    fn test_all_sources_empty_is_selection_failure() {
        let fixture = fixture(
            vec![keys::EPDG_ADDRESS_PLMN, keys::EPDG_ADDRESS_STATIC],
            None,
        );
        let result = fixture
            .selector
            .resolve(ProtoFilter::Ipv4v6, false, NET, &CancelToken::new());
        assert_eq!(result.unwrap_err(), IwlanError::ServerSelectionFailed);
    }

    #[test]
    fn test_cancellation_returns_partial_list() {
        let fixture = fixture(
            vec![keys::EPDG_ADDRESS_PLMN, keys::EPDG_ADDRESS_STATIC],
            None,
        );
        update_bundle(&fixture, |bundle| {
            bundle.put_string(keys::KEY_EPDG_STATIC_ADDRESS_STRING, "epdg.static.example");
        });
        fixture
            .resolver
            .insert("epdg.epc.mnc260.mcc310.pub.3gppnetwork.org", &["192.0.2.10"]);
        fixture.resolver.insert("epdg.static.example", &["192.0.2.20"]);

        // Cancel after the first source has produced answers: the partial
        // list comes back as a success.
        let token = CancelToken::new();
        token.cancel();
        let result = fixture
            .selector
            .resolve(ProtoFilter::Ipv4v6, false, NET, &token)
            .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_resolution_on_worker_posts_completion() {
        let fixture = fixture(vec![keys::EPDG_ADDRESS_PLMN], None);
        fixture
            .resolver
            .insert("epdg.epc.mnc260.mcc310.pub.3gppnetwork.org", &["192.0.2.10"]);

        let (tx, rx) = mpsc::channel();
        fixture.selector.resolve_on_worker(
            ProtoFilter::Ipv4v6,
            false,
            NET,
            CancelToken::new(),
            Box::new(move |result| {
                tx.send(result).unwrap();
            }),
        );

        let result = rx.recv_timeout(Duration::from_secs(2)).unwrap().unwrap();
        assert_eq!(addrs(&result), vec!["192.0.2.10"]);
        fixture.selector.shutdown();
    }
}
