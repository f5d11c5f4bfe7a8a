//! Per-slot error policy engine.
//!
//! The engine owns one throttle record per APN, keyed by the error that
//! created it. Reports advance a cursor through the policy's retry array;
//! queries answer whether a bring-up is currently allowed and what fail
//! cause the platform should see. Carrier reconfiguration swaps the policy
//! table atomically while preserving in-flight throttles.
//!
//! All state sits behind one mutex, so callers observe linearizable
//! semantics. Bus events arrive through an engine-owned serial worker and
//! take the same mutex.

use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use iwlan_config::{keys, CarrierConfigSource};
use iwlan_core::{Clock, EventBus, EventConsumer, IwlanEvent, MonotonicClock, SerialWorker,
    SubscriberId, WorkerHandle};
use iwlan_proto::DataFailCause;

use crate::error::IwlanError;
use crate::policy::{PolicyEntry, PolicyTable};

/// Sentinel returned when no retry should be scheduled.
pub const NO_RETRY: i64 = -1;

/// Events the engine listens for: configuration plus every event the policy
/// schema can name as unthrottling.
const ENGINE_EVENTS: [IwlanEvent; 7] = [
    IwlanEvent::CarrierConfigChanged,
    IwlanEvent::CarrierConfigUnknownCarrier,
    IwlanEvent::WifiDisable,
    IwlanEvent::ApmEnable,
    IwlanEvent::ApmDisable,
    IwlanEvent::WifiApChanged,
    IwlanEvent::WifiCallingDisable,
];

/// Throttle bookkeeping for one APN. Keyed by the error that created it: a
/// different error replaces the record and restarts the cursor.
struct ThrottleRecord {
    error: IwlanError,
    policy: PolicyEntry,
    /// None until the first report lands; then the index of the last wait
    /// returned.
    index: Option<usize>,
    /// Configured array fully consumed; the APN stays throttled until an
    /// unthrottling event or a NoError report.
    exhausted: bool,
    last_wait_secs: i64,
    throttle_until: Option<Instant>,
}

impl ThrottleRecord {
    fn new(error: IwlanError, policy: PolicyEntry) -> Self {
        ThrottleRecord {
            error,
            policy,
            index: None,
            exhausted: false,
            last_wait_secs: NO_RETRY,
            throttle_until: None,
        }
    }

    /// Advance the cursor and compute the next wait.
    fn advance(&mut self, now: Instant) -> i64 {
        if self.exhausted {
            self.last_wait_secs = NO_RETRY;
            return NO_RETRY;
        }

        let retry = self.policy.retry_secs();
        let next = match self.index {
            None => 0,
            Some(i) => i + 1,
        };

        if next >= retry.len() && !self.policy.is_builtin() {
            // A carrier-configured array gives up once consumed.
            self.exhausted = true;
            self.index = Some(retry.len() - 1);
            self.last_wait_secs = NO_RETRY;
            self.throttle_until = None;
            return NO_RETRY;
        }

        let index = next.min(retry.len() - 1);
        let wait = retry[index] as i64;
        self.index = Some(index);
        self.last_wait_secs = wait;
        self.throttle_until = Some(now + Duration::from_secs(wait as u64));
        wait
    }

    fn unthrottle(&mut self) {
        self.index = None;
        self.exhausted = false;
        self.throttle_until = None;
    }

    fn is_throttled(&self, now: Instant) -> bool {
        if self.exhausted {
            return true;
        }
        match self.throttle_until {
            Some(until) => now < until,
            None => false,
        }
    }
}

struct EngineState {
    table: PolicyTable,
    records: std::collections::HashMap<String, ThrottleRecord>,
}

/// Per-slot error policy engine.
pub struct ErrorPolicyManager {
    slot: u32,
    clock: Arc<dyn Clock>,
    config_source: Arc<dyn CarrierConfigSource>,
    state: Mutex<EngineState>,
    worker: Mutex<Option<SerialWorker<IwlanEvent>>>,
    subscription: Mutex<Option<SubscriberId>>,
}

struct EnginePoster {
    handle: WorkerHandle<IwlanEvent>,
}

impl EventConsumer for EnginePoster {
    fn post_event(&self, event: IwlanEvent) {
        self.handle.post(event);
    }
}

impl ErrorPolicyManager {
    pub fn new(slot: u32, config_source: Arc<dyn CarrierConfigSource>) -> Arc<Self> {
        Self::with_clock(slot, config_source, Arc::new(MonotonicClock))
    }

    pub fn with_clock(
        slot: u32,
        config_source: Arc<dyn CarrierConfigSource>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        Arc::new(ErrorPolicyManager {
            slot,
            clock,
            config_source,
            state: Mutex::new(EngineState {
                table: PolicyTable::empty(),
                records: std::collections::HashMap::new(),
            }),
            worker: Mutex::new(None),
            subscription: Mutex::new(None),
        })
    }

    /// Start the engine worker and subscribe it to the slot's bus.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) {
        let weak: Weak<ErrorPolicyManager> = Arc::downgrade(self);
        let worker = SerialWorker::spawn(&format!("error-policy-{}", self.slot), move |event| {
            if let Some(engine) = weak.upgrade() {
                engine.handle_event(event);
            }
        });
        let poster = Arc::new(EnginePoster {
            handle: worker.handle(),
        });
        let id = bus.subscribe(&ENGINE_EVENTS, poster);
        *self.worker.lock().unwrap_or_else(|e| e.into_inner()) = Some(worker);
        *self.subscription.lock().unwrap_or_else(|e| e.into_inner()) = Some(id);
    }

    /// Unsubscribe and stop the worker.
    pub fn detach(&self, bus: &EventBus) {
        if let Some(id) = self
            .subscription
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

    /// Record a tunnel error and return the wait in seconds before the next
    /// attempt, or [`NO_RETRY`].
    ///
    /// `NoError` clears the APN's record and returns [`NO_RETRY`].
    pub fn report_error(&self, apn: &str, error: IwlanError) -> i64 {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if error == IwlanError::NoError {
            state.records.remove(apn);
            return NO_RETRY;
        }

        let needs_new_record = match state.records.get(apn) {
            Some(record) => record.error != error,
            None => true,
        };
        if needs_new_record {
            let policy = state.table.find(apn, &error);
            state
                .records
                .insert(apn.to_string(), ThrottleRecord::new(error, policy));
        }

        let record = state
            .records
            .get_mut(apn)
            .unwrap_or_else(|| unreachable!("record inserted above"));
        let wait = record.advance(now);
        log::debug!(
            "slot {}: reportError apn={apn} error={error} wait={wait}s",
            self.slot
        );
        wait
    }

    /// True when the APN is not currently throttled.
    pub fn can_bring_up_tunnel(&self, apn: &str) -> bool {
        let now = self.clock.now();
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match state.records.get(apn) {
            Some(record) => !record.is_throttled(now),
            None => true,
        }
    }

    /// Last wait returned for the APN, in seconds.
    pub fn get_current_retry_time(&self, apn: &str) -> i64 {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .records
            .get(apn)
            .map(|r| r.last_wait_secs)
            .unwrap_or(NO_RETRY)
    }

    /// Last wait returned for the APN, in milliseconds.
    pub fn get_current_retry_time_ms(&self, apn: &str) -> i64 {
        let secs = self.get_current_retry_time(apn);
        if secs < 0 {
            NO_RETRY
        } else {
            secs * 1000
        }
    }

    /// Fail cause of the APN's most recently recorded error.
    pub fn get_data_fail_cause(&self, apn: &str) -> DataFailCause {
        self.get_last_error(apn).data_fail_cause()
    }

    /// Most recently recorded error, `NoError` when the APN has none.
    pub fn get_last_error(&self, apn: &str) -> IwlanError {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .records
            .get(apn)
            .map(|r| r.error)
            .unwrap_or(IwlanError::NoError)
    }

    /// Bus event entry point; also callable directly from tests.
    pub fn handle_event(&self, event: IwlanEvent) {
        match event {
            IwlanEvent::CarrierConfigChanged => {
                self.reload_config();
                self.unthrottle_for(event);
            }
            IwlanEvent::CarrierConfigUnknownCarrier => {
                // Keep serving the last good configuration.
                log::debug!("slot {}: carrier unknown, keeping last policy table", self.slot);
            }
            other => self.unthrottle_for(other),
        }
    }

    /// Swap in the carrier's policy table. Existing throttle records keep
    /// their cursor and deadline but re-resolve their policy against the new
    /// table, so unthrottling-event sets follow the configuration.
    fn reload_config(&self) {
        let table = match self.config_source.config_for_slot(self.slot) {
            Some(bundle) => {
                let json = bundle.string_value(keys::KEY_ERROR_POLICY_CONFIG_STRING);
                if json.is_empty() {
                    PolicyTable::empty()
                } else {
                    PolicyTable::from_json(&json)
                }
            }
            None => PolicyTable::empty(),
        };

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.table == table {
            log::debug!("slot {}: unchanged error policy config", self.slot);
            return;
        }
        state.table = table;
        let mut rebound: Vec<(String, PolicyEntry)> = Vec::new();
        for (apn, record) in state.records.iter() {
            rebound.push((apn.clone(), state.table.find(apn, &record.error)));
        }
        for (apn, policy) in rebound {
            if let Some(record) = state.records.get_mut(&apn) {
                record.policy = policy;
            }
        }
        log::info!("slot {}: error policy config updated", self.slot);
    }

    fn unthrottle_for(&self, event: IwlanEvent) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        for (apn, record) in state.records.iter_mut() {
            if record.policy.unthrottles_on(event) {
                log::debug!(
                    "slot {}: unthrottling apn={apn} on {}",
                    self.slot,
                    event.name()
                );
                record.unthrottle();
            }
        }
    }
}
