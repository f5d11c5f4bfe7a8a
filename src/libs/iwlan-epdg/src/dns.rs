//! DNS resolution for ePDG FQDNs.
//!
//! Lookups are bound to a platform [`Network`] so answers come from the DNS
//! servers of the intended interface. Each query is bounded, and a
//! [`CancelToken`] lets the selector abandon a resolution between queries.

use std::net::{IpAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use iwlan_proto::Network;

/// Per-source resolution budget.
pub const DEFAULT_DNS_TIMEOUT: Duration = Duration::from_secs(5);

/// Cooperative cancellation flag, consulted between address sources and
/// between DNS queries.
#[derive(Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Name resolution on a specific network.
pub trait DnsResolver: Send + Sync {
    /// Resolve `fqdn` on `network`, returning every answer within
    /// `timeout`. An empty answer list is not an error.
    fn resolve(&self, network: Network, fqdn: &str, timeout: Duration) -> Vec<IpAddr>;
}

/// Resolver backed by the system stub resolver.
///
/// The platform binds lookups to a network by routing the resolver socket;
/// in-process we only get the default resolver, so the network handle is
/// logged for diagnosis and the query itself runs through
/// `ToSocketAddrs` on a helper thread to honor the timeout.
#[derive(Debug, Default)]
pub struct SystemDnsResolver;

impl DnsResolver for SystemDnsResolver {
    fn resolve(&self, network: Network, fqdn: &str, timeout: Duration) -> Vec<IpAddr> {
        let (tx, rx) = mpsc::channel();
        let name = fqdn.to_string();
        let spawned = std::thread::Builder::new()
            .name("dns-query".to_string())
            .spawn(move || {
                // Port is irrelevant; ToSocketAddrs requires one.
                let result: Vec<IpAddr> = match (name.as_str(), 443u16).to_socket_addrs() {
                    Ok(addrs) => addrs.map(|a| a.ip()).collect(),
                    Err(e) => {
                        log::debug!("dns lookup failed for {name}: {e}");
                        Vec::new()
                    }
                };
                let _ = tx.send(result);
            });

        if spawned.is_err() {
            log::error!("failed to spawn dns query thread");
            return Vec::new();
        }

        match rx.recv_timeout(timeout) {
            Ok(addresses) => {
                log::debug!(
                    "dns {} -> {} answer(s) on network {}",
                    fqdn,
                    addresses.len(),
                    network.id()
                );
                addresses
            }
            Err(_) => {
                log::warn!("dns lookup timed out for {fqdn}");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Table-driven resolver for tests.
    #[derive(Default)]
    pub struct FakeDnsResolver {
        answers: Mutex<HashMap<String, Vec<IpAddr>>>,
    }

    impl FakeDnsResolver {
        pub fn insert(&self, fqdn: &str, addrs: Vec<IpAddr>) {
            self.answers.lock().unwrap().insert(fqdn.to_string(), addrs);
        }
    }

    impl DnsResolver for FakeDnsResolver {
        fn resolve(&self, _network: Network, fqdn: &str, _timeout: Duration) -> Vec<IpAddr> {
            self.answers
                .lock()
                .unwrap()
                .get(fqdn)
                .cloned()
                .unwrap_or_default()
        }
    }

    #[test]
    fn test_cancel_token_flags() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_fake_resolver_table() {
        let resolver = FakeDnsResolver::default();
        resolver.insert("epdg.example.com", vec!["192.0.2.1".parse().unwrap()]);
        let answers = resolver.resolve(Network(1), "epdg.example.com", DEFAULT_DNS_TIMEOUT);
        assert_eq!(answers, vec!["192.0.2.1".parse::<IpAddr>().unwrap()]);
        assert!(resolver
            .resolve(Network(1), "missing.example.com", DEFAULT_DNS_TIMEOUT)
            .is_empty());
    }
}
