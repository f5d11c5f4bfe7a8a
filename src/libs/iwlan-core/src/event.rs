//! Per-slot event bus.
//!
//! External conditions (carrier config, airplane mode, Wi-Fi state, Wi-Fi
//! calling) are fanned out to subsystems as [`IwlanEvent`]s. The bus never
//! runs subscriber logic on the publisher's thread: delivery is a call to
//! [`EventConsumer::post_event`], whose implementations enqueue onto the
//! consumer's own serial worker.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::sync::Arc;

/// External events observed by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IwlanEvent {
    /// Carrier configuration for the slot changed.
    CarrierConfigChanged,
    /// Carrier configuration became unavailable (unknown carrier).
    CarrierConfigUnknownCarrier,
    /// Wi-Fi turned off or disabled.
    WifiDisable,
    /// Airplane mode enabled.
    ApmEnable,
    /// Airplane mode disabled.
    ApmDisable,
    /// Wi-Fi access point (SSID) changed.
    WifiApChanged,
    /// Wi-Fi calling enabled by the user.
    WifiCallingEnable,
    /// Wi-Fi calling disabled by the user.
    WifiCallingDisable,
}

impl IwlanEvent {
    pub fn name(&self) -> &'static str {
        match self {
            IwlanEvent::CarrierConfigChanged => "CARRIER_CONFIG_CHANGED_EVENT",
            IwlanEvent::CarrierConfigUnknownCarrier => "CARRIER_CONFIG_UNKNOWN_CARRIER_EVENT",
            IwlanEvent::WifiDisable => "WIFI_DISABLE_EVENT",
            IwlanEvent::ApmEnable => "APM_ENABLE_EVENT",
            IwlanEvent::ApmDisable => "APM_DISABLE_EVENT",
            IwlanEvent::WifiApChanged => "WIFI_AP_CHANGED_EVENT",
            IwlanEvent::WifiCallingEnable => "WIFI_CALLING_ENABLE_EVENT",
            IwlanEvent::WifiCallingDisable => "WIFI_CALLING_DISABLE_EVENT",
        }
    }

    /// Map an unthrottling-event name from carrier policy JSON to an event.
    /// Unknown names yield `None` and are dropped by the caller; the policy
    /// format is carrier-supplied and must not be able to break parsing.
    pub fn from_unthrottling_name(name: &str) -> Option<IwlanEvent> {
        match name {
            "CARRIER_CONFIG_CHANGED_EVENT" => Some(IwlanEvent::CarrierConfigChanged),
            "WIFI_DISABLE_EVENT" => Some(IwlanEvent::WifiDisable),
            "APM_DISABLE_EVENT" => Some(IwlanEvent::ApmDisable),
            "APM_ENABLE_EVENT" => Some(IwlanEvent::ApmEnable),
            "WIFI_AP_CHANGED_EVENT" => Some(IwlanEvent::WifiApChanged),
            "WIFI_CALLING_DISABLE_EVENT" => Some(IwlanEvent::WifiCallingDisable),
            _ => None,
        }
    }
}

/// Receiving side of the bus. `post_event` must only enqueue; the actual
/// handling happens on the consumer's worker.
pub trait EventConsumer: Send + Sync {
    fn post_event(&self, event: IwlanEvent);
}

/// Token identifying a subscription, used for unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

struct Subscriber {
    id: SubscriberId,
    consumer: Arc<dyn EventConsumer>,
}

/// Per-slot event fan-out.
pub struct EventBus {
    slot: u32,
    subscribers: Mutex<HashMap<IwlanEvent, Vec<Subscriber>>>,
}

impl EventBus {
    pub fn new(slot: u32) -> Self {
        EventBus {
            slot,
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// Register a consumer for a set of events.
    pub fn subscribe(
        &self,
        events: &[IwlanEvent],
        consumer: Arc<dyn EventConsumer>,
    ) -> SubscriberId {
        let id = SubscriberId(NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed));
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        for event in events {
            subscribers.entry(*event).or_default().push(Subscriber {
                id,
                consumer: Arc::clone(&consumer),
            });
        }
        id
    }

    /// Remove a consumer from every event it is registered for.
    pub fn unsubscribe(&self, id: SubscriberId) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|_, list| {
            list.retain(|s| s.id != id);
            !list.is_empty()
        });
    }

    /// True when no consumer remains; the owning registry releases the bus.
    pub fn has_no_subscribers(&self) -> bool {
        let subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.is_empty()
    }

    /// Deliver an event to every registered consumer. An event with no
    /// subscribers is dropped.
    pub fn publish(&self, event: IwlanEvent) {
        let subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        match subscribers.get(&event) {
            Some(list) => {
                log::debug!(
                    "slot {}: publishing {} to {} consumer(s)",
                    self.slot,
                    event.name(),
                    list.len()
                );
                for subscriber in list {
                    subscriber.consumer.post_event(event);
                }
            }
            None => {
                log::debug!("slot {}: {} dropped, no subscribers", self.slot, event.name());
            }
        }
    }
}

/// Process-wide last-seen Wi-Fi SSID. Single writer: the connectivity
/// monitor. [`report_connected`] decides whether an access-point change
/// event should fire.
#[derive(Default)]
pub struct WifiSsidTracker {
    last_ssid: Mutex<String>,
}

impl WifiSsidTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a Wi-Fi connection with the given SSID. Returns true when the
    /// SSID differs from a previously recorded one, i.e. when
    /// [`IwlanEvent::WifiApChanged`] should be published. The first SSID
    /// after process start is recorded but never fires the event, so the
    /// initial camp does not unthrottle anything.
    pub fn report_connected(&self, ssid: &str) -> bool {
        let mut last = self.last_ssid.lock().unwrap_or_else(|e| e.into_inner());
        let changed = !last.is_empty() && *last != ssid;
        if changed {
            log::debug!("wifi SSID changed");
        }
        *last = ssid.to_string();
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingConsumer {
        events: StdMutex<Vec<IwlanEvent>>,
    }

    impl EventConsumer for RecordingConsumer {
        fn post_event(&self, event: IwlanEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl RecordingConsumer {
        fn received(&self) -> Vec<IwlanEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    #[test]
    fn test_publish_reaches_subscribed_consumers_only() {
        let bus = EventBus::new(0);
        let apm = Arc::new(RecordingConsumer::default());
        let wifi = Arc::new(RecordingConsumer::default());

        bus.subscribe(&[IwlanEvent::ApmEnable], Arc::clone(&apm) as _);
        bus.subscribe(&[IwlanEvent::WifiDisable], Arc::clone(&wifi) as _);

        bus.publish(IwlanEvent::ApmEnable);

        assert_eq!(apm.received(), vec![IwlanEvent::ApmEnable]);
        assert!(wifi.received().is_empty());
    }

    #[test]
    fn test_publish_without_subscribers_is_dropped() {
        let bus = EventBus::new(0);
        // Nothing to assert beyond "does not panic"; the event disappears.
        bus.publish(IwlanEvent::WifiApChanged);
    }

    #[test]
    fn test_unsubscribe_removes_all_registrations() {
        let bus = EventBus::new(0);
        let consumer = Arc::new(RecordingConsumer::default());

        let id = bus.subscribe(
            &[IwlanEvent::ApmEnable, IwlanEvent::ApmDisable],
            Arc::clone(&consumer) as _,
        );
        bus.unsubscribe(id);

        bus.publish(IwlanEvent::ApmEnable);
        bus.publish(IwlanEvent::ApmDisable);

        assert!(consumer.received().is_empty());
        assert!(bus.has_no_subscribers());
    }

    #[test]
    fn test_multiple_consumers_per_event() {
        let bus = EventBus::new(1);
        let a = Arc::new(RecordingConsumer::default());
        let b = Arc::new(RecordingConsumer::default());

        bus.subscribe(&[IwlanEvent::CarrierConfigChanged], Arc::clone(&a) as _);
        bus.subscribe(&[IwlanEvent::CarrierConfigChanged], Arc::clone(&b) as _);

        bus.publish(IwlanEvent::CarrierConfigChanged);

        assert_eq!(a.received().len(), 1);
        assert_eq!(b.received().len(), 1);
    }

    #[test]
    fn test_ssid_tracker_first_camp_is_silent() {
        let tracker = WifiSsidTracker::new();
        assert!(!tracker.report_connected("home-ap"));
        assert!(!tracker.report_connected("home-ap"));
        assert!(tracker.report_connected("office-ap"));
        assert!(!tracker.report_connected("office-ap"));
    }

    #[test]
    fn test_unthrottling_name_round_trip() {
        for event in [
            IwlanEvent::CarrierConfigChanged,
            IwlanEvent::WifiDisable,
            IwlanEvent::ApmEnable,
            IwlanEvent::ApmDisable,
            IwlanEvent::WifiApChanged,
            IwlanEvent::WifiCallingDisable,
        ] {
            assert_eq!(IwlanEvent::from_unthrottling_name(event.name()), Some(event));
        }
        assert_eq!(IwlanEvent::from_unthrottling_name("NOT_AN_EVENT"), None);
    }
}
