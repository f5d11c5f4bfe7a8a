//! Subscription and SIM accessors.
//!
//! The platform owns subscription state; the control plane only reads it.
//! [`StaticSubscriptionSource`] is the in-process store the daemon (and the
//! tests) feed from platform callbacks.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use iwlan_core::Plmn;

/// Read-only view of per-slot subscription state.
pub trait SubscriptionSource: Send + Sync {
    /// Whether this slot carries the default data subscription.
    fn is_default_data_slot(&self, slot: u32) -> bool;
    /// Whether cross-SIM calling is enabled for this slot.
    fn is_cross_sim_calling_enabled(&self, slot: u32) -> bool;
    /// Whether a subscription is active on this slot.
    fn is_subscription_active(&self, slot: u32) -> bool;
    /// Whether the subscription is currently roaming.
    fn is_roaming(&self, slot: u32) -> bool;
    /// Home PLMN of the SIM in this slot.
    fn sim_plmn(&self, slot: u32) -> Option<Plmn>;
    /// IMSI of the SIM in this slot.
    fn imsi(&self, slot: u32) -> Option<String>;
}

#[derive(Debug, Clone, Default)]
struct SlotSubscription {
    default_data: bool,
    cross_sim_calling: bool,
    active: bool,
    roaming: bool,
    plmn: Option<Plmn>,
    imsi: Option<String>,
}

/// Mutable per-slot subscription store.
#[derive(Default)]
pub struct StaticSubscriptionSource {
    slots: RwLock<HashMap<u32, SlotSubscription>>,
}

impl StaticSubscriptionSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn update(&self, slot: u32, apply: impl FnOnce(&mut SlotSubscription)) {
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        apply(slots.entry(slot).or_default());
    }

    fn read<T>(&self, slot: u32, get: impl FnOnce(&SlotSubscription) -> T, fallback: T) -> T {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        slots.get(&slot).map(get).unwrap_or(fallback)
    }

    pub fn set_default_data_slot(&self, slot: u32, default_data: bool) {
        self.update(slot, |s| s.default_data = default_data);
    }

    pub fn set_cross_sim_calling_enabled(&self, slot: u32, enabled: bool) {
        self.update(slot, |s| s.cross_sim_calling = enabled);
    }

    pub fn set_subscription_active(&self, slot: u32, active: bool) {
        self.update(slot, |s| s.active = active);
    }

    pub fn set_roaming(&self, slot: u32, roaming: bool) {
        self.update(slot, |s| s.roaming = roaming);
    }

    pub fn set_sim_plmn(&self, slot: u32, plmn: Plmn) {
        self.update(slot, |s| s.plmn = Some(plmn));
    }

    pub fn set_imsi(&self, slot: u32, imsi: &str) {
        self.update(slot, |s| s.imsi = Some(imsi.to_string()));
    }
}

impl SubscriptionSource for StaticSubscriptionSource {
    fn is_default_data_slot(&self, slot: u32) -> bool {
        self.read(slot, |s| s.default_data, false)
    }

    fn is_cross_sim_calling_enabled(&self, slot: u32) -> bool {
        self.read(slot, |s| s.cross_sim_calling, false)
    }

    fn is_subscription_active(&self, slot: u32) -> bool {
        self.read(slot, |s| s.active, false)
    }

    fn is_roaming(&self, slot: u32) -> bool {
        self.read(slot, |s| s.roaming, false)
    }

    fn sim_plmn(&self, slot: u32) -> Option<Plmn> {
        self.read(slot, |s| s.plmn.clone(), None)
    }

    fn imsi(&self, slot: u32) -> Option<String> {
        self.read(slot, |s| s.imsi.clone(), None)
    }
}
