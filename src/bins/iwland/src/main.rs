//! IWLAN control-plane daemon entry point.
//!
//! Starts the per-slot service stacks and waits for shutdown. The platform
//! integration points (IKE library, telephony callback transport, privileged
//! broadcast delivery) are bound by the embedding layer; this standalone
//! binary installs placeholder bindings that log and reject, which is enough
//! to exercise configuration and event plumbing end to end.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use iwland::{BroadcastSink, ContextDeps, IwlanContext, PlatformNotifier};
use iwlan_config::{StaticConfigSource, StaticSubscriptionSource};
use iwlan_epdg::{
    EpdgEndpoint, IkeDriver, IkeSessionConfig, NoCellInfo, SystemDnsResolver, TunnelCallback,
    TunnelSetupRequest,
};
use iwlan_proto::DataCallResponse;

/// IWLAN tunnel control-plane daemon
#[derive(Parser, Debug)]
#[command(name = "iwland")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "IWLAN tunnel control plane", long_about = None)]
struct Args {
    /// Number of SIM slots to serve
    #[arg(short = 's', long, default_value = "1")]
    slots: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'e', long, default_value = "info")]
    log_level: String,
}

/// Stands in until a real IKE library is bound: rejects every bring-up.
struct UnboundIkeDriver;

impl IkeDriver for UnboundIkeDriver {
    fn bring_up_tunnel(
        &self,
        request: &TunnelSetupRequest,
        _session: &IkeSessionConfig,
        _endpoints: &[EpdgEndpoint],
        _callback: Arc<dyn TunnelCallback>,
    ) -> bool {
        log::error!("no IKE library bound; rejecting bring-up for {}", request.apn_name);
        false
    }

    fn close_tunnel(&self, _apn: &str, _force_close: bool) {}
}

/// Logs unsolicited indications instead of delivering them.
struct LogNotifier;

impl PlatformNotifier for LogNotifier {
    fn notify_data_call_list_changed(&self, slot: u32, list: Vec<DataCallResponse>) {
        log::info!("slot {slot}: data call list changed ({} entries)", list.len());
    }

    fn notify_network_registration_info_changed(&self, slot: u32) {
        log::info!("slot {slot}: network registration info changed");
    }
}

/// Logs error-report broadcasts instead of delivering them.
struct LogBroadcastSink;

impl BroadcastSink for LogBroadcastSink {
    fn broadcast_error_report(&self, message: &str) {
        log::warn!("error report: {message}");
    }
}

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    log::info!("iwland v{} starting...", env!("CARGO_PKG_VERSION"));

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        log::info!("received shutdown signal");
        shutdown_flag.store(true, Ordering::SeqCst);
        SHUTDOWN.store(true, Ordering::SeqCst);
    })?;

    let context = IwlanContext::new(ContextDeps {
        config_source: StaticConfigSource::new(),
        subscription: StaticSubscriptionSource::new(),
        driver: Arc::new(UnboundIkeDriver),
        resolver: Arc::new(SystemDnsResolver),
        cell_source: Arc::new(NoCellInfo),
        broadcast: Arc::new(LogBroadcastSink),
        notifier: Arc::new(LogNotifier),
    });

    for slot in 0..args.slots {
        context.init_slot(slot);
    }
    log::info!("iwland ready ({} slot(s))", args.slots);

    while !shutdown.load(Ordering::SeqCst) && !SHUTDOWN.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }

    log::info!("shutting down...");
    context.shutdown();
    log::info!("iwland stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default() {
        let args = Args::parse_from(["iwland"]);
        assert_eq!(args.slots, 1);
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn test_args_custom() {
        let args = Args::parse_from(["iwland", "-s", "2", "-e", "debug"]);
        assert_eq!(args.slots, 2);
        assert_eq!(args.log_level, "debug");
    }

    #[test]
    fn test_args_log_options() {
        let args = Args::parse_from(["iwland", "--log-level", "trace"]);
        assert_eq!(args.log_level, "trace");

        let args = Args::parse_from(["iwland", "--slots", "3"]);
        assert_eq!(args.slots, 3);
        assert_eq!(args.log_level, "info");
    }
}
