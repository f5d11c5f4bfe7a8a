//! One-shot error report broadcast.
//!
//! Each distinct tunnel bring-up error is broadcast to privileged listeners
//! exactly once; repeats only bump a counter.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use iwlan_policy::IwlanError;

/// Delivery of privileged error-report broadcasts; the platform transport
/// is an external collaborator.
pub trait BroadcastSink: Send + Sync {
    fn broadcast_error_report(&self, message: &str);
}

pub struct ErrorReporter {
    sink: Arc<dyn BroadcastSink>,
    counts: Mutex<HashMap<IwlanError, u32>>,
}

impl ErrorReporter {
    pub fn new(sink: Arc<dyn BroadcastSink>) -> Self {
        ErrorReporter {
            sink,
            counts: Mutex::new(HashMap::new()),
        }
    }

    /// Broadcast a tunnel bring-up error string, once per distinct error.
    pub fn report_tunnel_bring_up_error(&self, error: IwlanError) {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        let count = counts.entry(error).or_insert(0);
        *count += 1;
        if *count > 1 {
            return;
        }
        log::debug!("broadcasting tunnel bring-up error: {error}");
        self.sink
            .broadcast_error_report(&format!("Tunnel_bring_up_error: {error}"));
    }
}
