//! Per-APN tunnel lifecycle management.
//!
//! One manager per slot. Every mutating operation and every IKE driver
//! callback is posted onto the manager's serial worker as a command, so the
//! APN map is only ever touched from that worker. Absence of an APN from
//! the map is the DOWN state; a present record is in exactly one of
//! BRINGING_UP, UP or BRINGING_DOWN, with at most one in-flight transition
//! per APN.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use iwlan_config::{CarrierConfigSource, SubscriptionSource};
use iwlan_core::{SerialWorker, WorkerHandle};
use iwlan_policy::{ErrorPolicyManager, IwlanError};
use iwlan_proto::{
    apn_cid, AccessNetworkType, ApnProtocol, DataCallResponse, DataCallResponseBuilder,
    DataFailCause, DataProfile, DataRequestReason, HandoverFailureMode, LinkProperties,
    LinkStatus, ServiceResult, SliceInfo, TrafficDescriptor, LINK_MTU,
};

use crate::dns::CancelToken;
use crate::driver::{IkeDriver, IkeSessionConfig, TunnelCallback};
use crate::selector::{EpdgEndpoint, EpdgSelector, ProtoFilter};
use crate::transport::ConnectivityState;
use crate::tunnel::{TunnelLinkProperties, TunnelSetupRequest};

/// A data-call setup request as the platform hands it over.
#[derive(Debug, Clone)]
pub struct SetupDataCallRequest {
    pub access_network: AccessNetworkType,
    pub profile: Option<DataProfile>,
    pub is_roaming: bool,
    pub allow_roaming: bool,
    pub reason: DataRequestReason,
    /// Link properties of the existing connection; required for handover.
    pub link_properties: Option<LinkProperties>,
    /// 0 means no PDU session attached; 1..=15 otherwise.
    pub pdu_session_id: u8,
    pub slice_info: Option<SliceInfo>,
    pub traffic_descriptor: Option<TrafficDescriptor>,
    pub match_all_allowed: bool,
}

/// Completion callbacks toward the platform for one request.
pub trait DataServiceCallback: Send + Sync {
    fn on_setup_data_call_complete(
        &self,
        result: ServiceResult,
        response: Option<DataCallResponse>,
    );
    fn on_deactivate_data_call_complete(&self, result: ServiceResult);
    fn on_request_data_call_list_complete(&self, result: ServiceResult, list: Vec<DataCallResponse>);
}

/// Unsolicited notifications from the manager.
pub trait TunnelEventListener: Send + Sync {
    /// Fired on every tunnel state transition with the full call list.
    fn on_data_call_list_changed(&self, list: Vec<DataCallResponse>);
    /// Fired once per tunnel bring-up failure, before the setup completion.
    fn on_tunnel_bring_up_error(&self, _apn: &str, _error: IwlanError) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TunnelStateKind {
    BringingUp,
    Up,
    BringingDown,
}

impl TunnelStateKind {
    fn name(&self) -> &'static str {
        match self {
            TunnelStateKind::BringingUp => "BRINGING_UP",
            TunnelStateKind::Up => "UP",
            TunnelStateKind::BringingDown => "BRINGING_DOWN",
        }
    }
}

struct TunnelRecord {
    state: TunnelStateKind,
    protocol: ApnProtocol,
    is_handover: bool,
    callback: Arc<dyn DataServiceCallback>,
    link_properties: Option<TunnelLinkProperties>,
    /// Endpoint selection still in flight; the IKE driver has not been
    /// invoked yet.
    selecting: bool,
    cancel: Option<CancelToken>,
    pending_request: Option<TunnelSetupRequest>,
}

enum TunnelCmd {
    SetupDataCall {
        request: SetupDataCallRequest,
        callback: Arc<dyn DataServiceCallback>,
    },
    DeactivateDataCall {
        cid: i32,
        reason: DataRequestReason,
        callback: Arc<dyn DataServiceCallback>,
    },
    RequestDataCallList {
        callback: Arc<dyn DataServiceCallback>,
    },
    EndpointsResolved {
        apn: String,
        result: Result<Vec<EpdgEndpoint>, IwlanError>,
    },
    TunnelOpened {
        apn: String,
        link_properties: TunnelLinkProperties,
    },
    TunnelClosed {
        apn: String,
        error: IwlanError,
    },
    ForceCloseAll,
}

/// Posts driver callbacks onto the manager worker.
struct ManagerTunnelCallback {
    handle: WorkerHandle<TunnelCmd>,
}

impl TunnelCallback for ManagerTunnelCallback {
    fn on_opened(&self, apn: &str, link_properties: TunnelLinkProperties) {
        self.handle.post(TunnelCmd::TunnelOpened {
            apn: apn.to_string(),
            link_properties,
        });
    }

    fn on_closed(&self, apn: &str, error: IwlanError) {
        self.handle.post(TunnelCmd::TunnelClosed {
            apn: apn.to_string(),
            error,
        });
    }
}

/// Everything a tunnel manager is wired to.
pub struct TunnelManagerDeps {
    pub slot: u32,
    pub selector: Arc<EpdgSelector>,
    pub driver: Arc<dyn IkeDriver>,
    pub policy: Arc<ErrorPolicyManager>,
    pub listener: Arc<dyn TunnelEventListener>,
    pub connectivity: Arc<ConnectivityState>,
    pub subscription: Arc<dyn SubscriptionSource>,
    pub config_source: Arc<dyn CarrierConfigSource>,
}

struct ManagerInner {
    slot: u32,
    selector: Arc<EpdgSelector>,
    driver: Arc<dyn IkeDriver>,
    policy: Arc<ErrorPolicyManager>,
    listener: Arc<dyn TunnelEventListener>,
    connectivity: Arc<ConnectivityState>,
    subscription: Arc<dyn SubscriptionSource>,
    config_source: Arc<dyn CarrierConfigSource>,
    self_handle: WorkerHandle<TunnelCmd>,
    tunnel_callback: Arc<dyn TunnelCallback>,
    records: HashMap<String, TunnelRecord>,
}

/// Per-slot tunnel lifecycle manager.
pub struct TunnelManager {
    slot: u32,
    handle: WorkerHandle<TunnelCmd>,
    inner: Arc<Mutex<Option<ManagerInner>>>,
    worker: Mutex<Option<SerialWorker<TunnelCmd>>>,
}

impl TunnelManager {
    pub fn new(deps: TunnelManagerDeps) -> Arc<Self> {
        let slot = deps.slot;
        let inner: Arc<Mutex<Option<ManagerInner>>> = Arc::new(Mutex::new(None));
        let worker_inner = Arc::clone(&inner);
        let worker = SerialWorker::spawn(&format!("tunnel-manager-{slot}"), move |cmd| {
            let mut guard = worker_inner.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(state) = guard.as_mut() {
                state.handle_cmd(cmd);
            }
        });
        let handle = worker.handle();
        let tunnel_callback: Arc<dyn TunnelCallback> = Arc::new(ManagerTunnelCallback {
            handle: handle.clone(),
        });
        *inner.lock().unwrap_or_else(|e| e.into_inner()) = Some(ManagerInner {
            slot,
            selector: deps.selector,
            driver: deps.driver,
            policy: deps.policy,
            listener: deps.listener,
            connectivity: deps.connectivity,
            subscription: deps.subscription,
            config_source: deps.config_source,
            self_handle: handle.clone(),
            tunnel_callback,
            records: HashMap::new(),
        });
        Arc::new(TunnelManager {
            slot,
            handle,
            inner,
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn setup_data_call(
        &self,
        request: SetupDataCallRequest,
        callback: Arc<dyn DataServiceCallback>,
    ) {
        self.handle.post(TunnelCmd::SetupDataCall { request, callback });
    }

    pub fn deactivate_data_call(
        &self,
        cid: i32,
        reason: DataRequestReason,
        callback: Arc<dyn DataServiceCallback>,
    ) {
        self.handle.post(TunnelCmd::DeactivateDataCall {
            cid,
            reason,
            callback,
        });
    }

    pub fn request_data_call_list(&self, callback: Arc<dyn DataServiceCallback>) {
        self.handle.post(TunnelCmd::RequestDataCallList { callback });
    }

    /// Tear everything down without waiting; used on transport switches and
    /// network loss.
    pub fn force_close_all(&self) {
        self.handle.post(TunnelCmd::ForceCloseAll);
    }

    /// Whether any tunnel record exists (any APN not DOWN).
    pub fn has_tunnels(&self) -> bool {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .as_ref()
            .map(|state| !state.records.is_empty())
            .unwrap_or(false)
    }

    pub fn shutdown(&self) {
        if let Some(worker) = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take() {
            worker.shutdown();
        }
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl ManagerInner {
    fn handle_cmd(&mut self, cmd: TunnelCmd) {
        match cmd {
            TunnelCmd::SetupDataCall { request, callback } => {
                self.handle_setup(request, callback)
            }
            TunnelCmd::DeactivateDataCall {
                cid,
                reason,
                callback,
            } => self.handle_deactivate(cid, reason, callback),
            TunnelCmd::RequestDataCallList { callback } => {
                callback.on_request_data_call_list_complete(ServiceResult::Success, self.call_list())
            }
            TunnelCmd::EndpointsResolved { apn, result } => {
                self.handle_endpoints_resolved(&apn, result)
            }
            TunnelCmd::TunnelOpened {
                apn,
                link_properties,
            } => self.handle_opened(&apn, link_properties),
            TunnelCmd::TunnelClosed { apn, error } => self.handle_closed(&apn, error),
            TunnelCmd::ForceCloseAll => self.handle_force_close_all(),
        }
    }

    fn gate_open(&self) -> bool {
        let is_dds = self.subscription.is_default_data_slot(self.slot);
        let is_cst = self.subscription.is_cross_sim_calling_enabled(self.slot);
        self.connectivity.is_network_connected(is_dds, is_cst)
    }

    fn handle_setup(
        &mut self,
        request: SetupDataCallRequest,
        callback: Arc<dyn DataServiceCallback>,
    ) {
        let valid_args = request.access_network == AccessNetworkType::Iwlan
            && request.profile.is_some()
            && request.pdu_session_id <= 15
            && !(request.reason == DataRequestReason::Handover && request.link_properties.is_none());
        if !valid_args {
            log::warn!("slot {}: setupDataCall with invalid arguments", self.slot);
            callback.on_setup_data_call_complete(ServiceResult::ErrorInvalidArg, None);
            return;
        }
        let profile = request
            .profile
            .as_ref()
            .unwrap_or_else(|| unreachable!("validated above"));
        let apn = profile.apn.clone();

        if !self.gate_open()
            || self.records.contains_key(&apn)
            || !self.policy.can_bring_up_tunnel(&apn)
        {
            log::warn!(
                "slot {}: setupDataCall rejected for {apn}: gate={} exists={} throttled={}",
                self.slot,
                self.gate_open(),
                self.records.contains_key(&apn),
                !self.policy.can_bring_up_tunnel(&apn)
            );
            callback.on_setup_data_call_complete(ServiceResult::ErrorIllegalState, None);
            return;
        }

        let network = match self.connectivity.network() {
            Some(network) => network,
            None => {
                callback.on_setup_data_call_complete(ServiceResult::ErrorIllegalState, None);
                return;
            }
        };

        let protocol = if request.is_roaming {
            profile.roaming_protocol
        } else {
            profile.protocol
        };
        let is_handover = request.reason == DataRequestReason::Handover;

        let mut builder = TunnelSetupRequest::builder()
            .apn_name(&apn)
            .apn_ip_protocol(protocol)
            .network(network)
            .pdu_session_id(request.pdu_session_id)
            .is_roaming(request.is_roaming)
            .is_emergency(profile.apn_type.has_emergency())
            .request_pcscf(profile.apn_type.has_ims() || profile.apn_type.has_emergency());
        if is_handover {
            if let Some(link_properties) = &request.link_properties {
                for address in &link_properties.link_addresses {
                    if address.is_ipv4() {
                        builder = builder.src_ipv4_address(address.address());
                    } else {
                        builder = builder.src_ipv6_address(address.address(), address.prefix_len());
                    }
                }
            }
        }
        let setup_request = match builder.build() {
            Ok(setup_request) => setup_request,
            Err(e) => {
                log::warn!("slot {}: tunnel request for {apn} invalid: {e}", self.slot);
                callback.on_setup_data_call_complete(ServiceResult::ErrorInvalidArg, None);
                return;
            }
        };

        let token = CancelToken::new();
        log::debug!("slot {}: {apn} -> BRINGING_UP", self.slot);
        self.records.insert(
            apn.clone(),
            TunnelRecord {
                state: TunnelStateKind::BringingUp,
                protocol,
                is_handover,
                callback,
                link_properties: None,
                selecting: true,
                cancel: Some(token.clone()),
                pending_request: Some(setup_request),
            },
        );

        let filter = match protocol {
            ApnProtocol::Ipv4 => ProtoFilter::Ipv4,
            ApnProtocol::Ipv6 => ProtoFilter::Ipv6,
            ApnProtocol::Ipv4v6 => ProtoFilter::Ipv4v6,
        };
        let handle = self.self_handle.clone();
        let resolved_apn = apn.clone();
        self.selector.resolve_on_worker(
            filter,
            request.is_roaming,
            network,
            token,
            Box::new(move |result| {
                handle.post(TunnelCmd::EndpointsResolved {
                    apn: resolved_apn,
                    result,
                });
            }),
        );
    }

    fn handle_endpoints_resolved(
        &mut self,
        apn: &str,
        result: Result<Vec<EpdgEndpoint>, IwlanError>,
    ) {
        let (state, pending_request) = match self.records.get_mut(apn) {
            Some(record) => {
                record.selecting = false;
                (record.state, record.pending_request.take())
            }
            None => {
                log::debug!("slot {}: selection finished for closed {apn}", self.slot);
                return;
            }
        };

        if state == TunnelStateKind::BringingDown {
            // Deactivated while still selecting; the driver never saw this
            // tunnel, so the close completes here.
            self.handle_closed(apn, IwlanError::NoError);
            return;
        }

        let endpoints = match result {
            Ok(endpoints) if !endpoints.is_empty() => endpoints,
            Ok(_) | Err(_) => {
                self.handle_closed(apn, IwlanError::ServerSelectionFailed);
                return;
            }
        };

        let session = IkeSessionConfig::from_bundle(
            &self
                .config_source
                .config_for_slot(self.slot)
                .unwrap_or_default(),
        );
        let setup_request = match pending_request {
            Some(setup_request) => setup_request,
            None => {
                log::error!("slot {}: no pending request for {apn}", self.slot);
                self.handle_closed(apn, IwlanError::IkeGenericException);
                return;
            }
        };

        let accepted = self.driver.bring_up_tunnel(
            &setup_request,
            &session,
            &endpoints,
            Arc::clone(&self.tunnel_callback),
        );
        log::debug!("slot {}: driver bring-up for {apn}: accepted={accepted}", self.slot);
        if !accepted {
            if let Some(record) = self.records.remove(apn) {
                record
                    .callback
                    .on_setup_data_call_complete(ServiceResult::ErrorInvalidArg, None);
            }
            self.notify_list_changed();
        }
    }

    fn handle_deactivate(
        &mut self,
        cid: i32,
        reason: DataRequestReason,
        callback: Arc<dyn DataServiceCallback>,
    ) {
        let apn = self
            .records
            .keys()
            .find(|apn| apn_cid(apn) == cid)
            .cloned();
        let apn = match apn {
            Some(apn) => apn,
            None => {
                log::warn!("slot {}: deactivate for unknown cid {cid}", self.slot);
                callback.on_deactivate_data_call_complete(ServiceResult::ErrorInvalidArg);
                return;
            }
        };

        // The framework serializes setup and deactivate per cid, so no
        // state check is needed here.
        let force_close = !self.gate_open();
        let record = self
            .records
            .get_mut(&apn)
            .unwrap_or_else(|| unreachable!("apn found above"));
        log::debug!(
            "slot {}: {apn} {} -> BRINGING_DOWN (reason {reason:?})",
            self.slot,
            record.state.name()
        );
        record.state = TunnelStateKind::BringingDown;
        record.callback = callback;
        if let Some(token) = &record.cancel {
            token.cancel();
        }
        if !record.selecting {
            self.driver.close_tunnel(&apn, force_close);
        }
        // A still-selecting tunnel completes its close when the selection
        // result arrives.
    }

    fn handle_opened(&mut self, apn: &str, link_properties: TunnelLinkProperties) {
        match self.records.get(apn).map(|record| record.state) {
            None => {
                // The record was force-closed while the driver was opening;
                // close immediately and treat the later closed callback as
                // success.
                log::warn!("slot {}: opened callback for closed {apn}", self.slot);
                self.driver.close_tunnel(apn, true);
                return;
            }
            Some(TunnelStateKind::BringingDown) => {
                // A deactivate raced the driver's open. Close the fresh
                // session right away; its closed callback completes the
                // deactivate as success.
                log::debug!("slot {}: opened callback for deactivating {apn}", self.slot);
                let force_close = !self.gate_open();
                self.driver.close_tunnel(apn, force_close);
                return;
            }
            Some(_) => {}
        }

        let record = self
            .records
            .get_mut(apn)
            .unwrap_or_else(|| unreachable!("record checked above"));
        log::debug!("slot {}: {apn} {} -> UP", self.slot, record.state.name());
        record.state = TunnelStateKind::Up;
        record.link_properties = Some(link_properties);
        record.cancel = None;

        let response = self.response_for(apn);
        if let Some(record) = self.records.get(apn) {
            record
                .callback
                .on_setup_data_call_complete(ServiceResult::Success, response);
        }
        self.notify_list_changed();
    }

    fn handle_closed(&mut self, apn: &str, error: IwlanError) {
        let record = match self.records.remove(apn) {
            Some(record) => record,
            None => {
                log::debug!("slot {}: closed callback for unknown {apn}: {error}", self.slot);
                return;
            }
        };
        log::debug!(
            "slot {}: {apn} {} -> DOWN ({error})",
            self.slot,
            record.state.name()
        );

        match record.state {
            TunnelStateKind::BringingUp => {
                self.complete_failed_bring_up(apn, &record, error);
            }
            TunnelStateKind::BringingDown => {
                // The only tolerated errors on a solicited close are no
                // error at all and the IKE library's retransmission give-up;
                // anything else means the driver broke its contract.
                if error != IwlanError::NoError && error != IwlanError::IkeInternalIoException {
                    panic!("unexpected error during tunnel bring down: {error}");
                }
                record
                    .callback
                    .on_deactivate_data_call_complete(ServiceResult::Success);
            }
            TunnelStateKind::Up => {
                // Unsolicited close; nothing to answer, just republish.
            }
        }
        self.notify_list_changed();
    }

    fn complete_failed_bring_up(&self, apn: &str, record: &TunnelRecord, error: IwlanError) {
        self.policy.report_error(apn, error);
        if error != IwlanError::NoError {
            self.listener.on_tunnel_bring_up_error(apn, error);
        }
        let cause = self.policy.get_data_fail_cause(apn);
        let retry_ms = self.policy.get_current_retry_time_ms(apn);
        let mode = if record.is_handover {
            HandoverFailureMode::NoFallbackRetryHandover
        } else {
            HandoverFailureMode::NoFallbackRetrySetupNormal
        };
        let response = DataCallResponseBuilder::new()
            .id(apn_cid(apn))
            .protocol(record.protocol)
            .cause(cause)
            .retry_duration_ms(retry_ms)
            .handover_failure_mode(mode)
            .build();
        match response {
            Ok(response) => record
                .callback
                .on_setup_data_call_complete(ServiceResult::Success, Some(response)),
            Err(e) => {
                log::error!("slot {}: failure response for {apn} unbuildable: {e}", self.slot);
                record
                    .callback
                    .on_setup_data_call_complete(ServiceResult::Success, None);
            }
        }
    }

    fn handle_force_close_all(&mut self) {
        let apns: Vec<String> = self.records.keys().cloned().collect();
        log::info!("slot {}: force closing {} tunnel(s)", self.slot, apns.len());
        for apn in apns {
            let record = self
                .records
                .remove(&apn)
                .unwrap_or_else(|| unreachable!("key collected above"));
            if let Some(token) = &record.cancel {
                token.cancel();
            }
            self.driver.close_tunnel(&apn, true);
            match record.state {
                TunnelStateKind::BringingUp => {
                    self.complete_failed_bring_up(&apn, &record, IwlanError::NetworkFailure);
                }
                TunnelStateKind::BringingDown => {
                    record
                        .callback
                        .on_deactivate_data_call_complete(ServiceResult::Success);
                }
                TunnelStateKind::Up => {}
            }
        }
        self.notify_list_changed();
    }

    /// Build the platform response for one APN, irrespective of state.
    fn response_for(&self, apn: &str) -> Option<DataCallResponse> {
        let record = self.records.get(apn)?;
        let builder = DataCallResponseBuilder::new()
            .id(apn_cid(apn))
            .protocol(record.protocol)
            .cause(DataFailCause::NONE);

        if record.state != TunnelStateKind::Up {
            return builder.link_status(LinkStatus::Unknown).build().ok();
        }

        let link_properties = record.link_properties.as_ref()?;
        // Wildcard gateways tell the platform to install default routes
        // over the tunnel interface.
        let mut gateways: Vec<IpAddr> = Vec::new();
        if link_properties.has_ipv4_address() {
            gateways.push(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED));
        }
        if link_properties.has_ipv6_address() {
            gateways.push(IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED));
        }

        let mut builder = builder
            .link_status(LinkStatus::Active)
            .interface_name(&link_properties.iface_name)
            .addresses(link_properties.internal_addresses.clone())
            .dns_addresses(link_properties.dns_addresses.clone())
            .pcscf_addresses(link_properties.pcscf_addresses.clone())
            .gateway_addresses(gateways)
            .mtu(LINK_MTU);
        if let Some(slice_info) = &link_properties.slice_info {
            builder = builder.slice_info(slice_info.clone());
        }
        builder.build().ok()
    }

    fn call_list(&self) -> Vec<DataCallResponse> {
        self.records
            .keys()
            .filter_map(|apn| self.response_for(apn))
            .collect()
    }

    fn notify_list_changed(&self) {
        self.listener.on_data_call_list_changed(self.call_list());
    }
}
