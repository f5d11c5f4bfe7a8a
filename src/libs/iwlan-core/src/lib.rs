//! Core primitives shared by the IWLAN control plane.
//!
//! Everything here is deliberately platform-free: a bounded thread-safe
//! queue, a serial worker built on it, the per-slot event bus, a clock
//! abstraction, and PLMN identity types used by the FQDN builders.

pub mod clock;
pub mod event;
pub mod plmn;
pub mod queue;
pub mod worker;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use event::{EventBus, EventConsumer, IwlanEvent, SubscriberId, WifiSsidTracker};
pub use plmn::{Plmn, PlmnError, Tai};
pub use queue::{BoundedQueue, QueueStatus};
pub use worker::{SerialWorker, WorkerHandle};
