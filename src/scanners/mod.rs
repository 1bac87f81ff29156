// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Probe Rules
 * Execution contract shared by every active scan rule
 *
 * A rule is instantiated once per (rule, base message), initialised with
 * the strength and threshold from the effective policy, then driven by
 * `scan()`. Rules only talk to the target through `RuleContext`.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use async_trait::async_trait;
use rand::distr::Alphanumeric;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use url::Url;

use crate::alerts::{AlertBuilder, AlertSink};
use crate::errors::{EngineResult, TransportError};
use crate::registry::{RuleDescriptor, RuleFactory};
use crate::transport::{HttpResponse, ProbeRequest, Transport, TunnelResponse};
use crate::types::{Strength, Threshold};

pub mod insecure_http_method;
pub mod proxy_disclosure;

pub use insecure_http_method::InsecureHttpMethodScanner;
pub use proxy_disclosure::ProxyDisclosureScanner;

const LOWER_ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Scan-wide cooperative cancellation flag
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Active scan rule
#[async_trait]
pub trait ScanRule: Send + Sync {
    fn descriptor(&self) -> &RuleDescriptor;

    fn id(&self) -> i32 {
        self.descriptor().id
    }

    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Called once before `scan()` with the base message and the parameters
    /// taken from the effective policy
    fn init(&mut self, base: &ProbeRequest, strength: Strength, threshold: Threshold);

    /// Run the probe protocol. Transport failures are handled per round
    /// inside the rule; an `Err` here is logged by the scheduler.
    async fn scan(&mut self, ctx: &RuleContext) -> EngineResult<()>;
}

/// Everything a running rule may touch
pub struct RuleContext {
    transport: Arc<dyn Transport>,
    sink: AlertSink,
    stop: StopFlag,
    descriptor: RuleDescriptor,
    base: ProbeRequest,
    strength: Strength,
    threshold: Threshold,
}

impl RuleContext {
    pub fn new(
        transport: Arc<dyn Transport>,
        sink: AlertSink,
        stop: StopFlag,
        descriptor: RuleDescriptor,
        base: ProbeRequest,
    ) -> Self {
        Self {
            transport,
            sink,
            stop,
            descriptor,
            base,
            strength: Strength::Medium,
            threshold: Threshold::Medium,
        }
    }

    pub fn with_strength(mut self, strength: Strength) -> Self {
        self.strength = strength;
        self
    }

    pub fn with_threshold(mut self, threshold: Threshold) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn base(&self) -> &ProbeRequest {
        &self.base
    }

    pub fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    pub fn strength(&self) -> Strength {
        self.strength
    }

    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    pub fn sink(&self) -> &AlertSink {
        &self.sink
    }

    /// Send a probe. Redirects are never followed.
    pub async fn send(&self, request: &ProbeRequest) -> Result<HttpResponse, TransportError> {
        self.transport.send(request, false).await
    }

    pub async fn open_tunnel(
        &self,
        host: &str,
        port: u16,
        payload: &str,
    ) -> Result<Option<TunnelResponse>, TransportError> {
        self.transport
            .open_tunnel(&self.base.url, host, port, payload)
            .await
    }

    pub fn is_stop(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Alert builder seeded from the rule metadata and the base message
    pub fn new_alert(&self) -> AlertBuilder {
        AlertBuilder::for_rule(&self.descriptor, self.sink.clone()).message(&self.base)
    }
}

/// Factories for the rules shipped with the engine
pub fn builtin_rules() -> Vec<RuleFactory> {
    vec![
        Arc::new(|| Box::new(InsecureHttpMethodScanner::new()) as Box<dyn ScanRule>),
        Arc::new(|| Box::new(ProxyDisclosureScanner::new()) as Box<dyn ScanRule>),
    ]
}

/// Random string over `[A-Za-z0-9]`
pub fn random_alphanumeric(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Random string over `[a-z0-9]`
pub fn random_lower_alphanumeric(len: usize) -> String {
    random_from(LOWER_ALPHANUMERIC, len)
}

/// Random string drawn from `charset`
pub fn random_from(charset: &[u8], len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| charset[rng.random_range(0..charset.len())] as char)
        .collect()
}

/// `<base path>/<segment>`, keeping the base URL's scheme and authority
pub(crate) fn child_url(base: &Url, segment: &str) -> Url {
    let mut url = base.clone();
    let path = format!("{}/{}", base.path().trim_end_matches('/'), segment);
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_strings() {
        let value = random_alphanumeric(40);
        assert_eq!(value.len(), 40);
        assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));

        let lower = random_lower_alphanumeric(10);
        assert!(lower.bytes().all(|b| LOWER_ALPHANUMERIC.contains(&b)));

        let upper = random_from(b"ABC", 5);
        assert!(upper.chars().all(|c| "ABC".contains(c)));
    }

    #[test]
    fn test_stop_flag_is_shared() {
        let flag = StopFlag::new();
        let other = flag.clone();
        assert!(!other.is_stopped());
        flag.stop();
        assert!(other.is_stopped());
    }

    #[test]
    fn test_child_url() {
        let base = Url::parse("https://example.com/app/?q=1").unwrap();
        assert_eq!(child_url(&base, "abc").as_str(), "https://example.com/app/abc");

        let root = Url::parse("http://example.com").unwrap();
        assert_eq!(child_url(&root, "x").as_str(), "http://example.com/x");
    }

    #[test]
    fn test_builtin_rule_ids() {
        let ids: Vec<i32> = builtin_rules().iter().map(|f| f().id()).collect();
        assert_eq!(ids, vec![90028, 40025]);
    }
}
