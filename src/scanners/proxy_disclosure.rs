// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Proxy Disclosure Scanner
 * Enumerates and fingerprints the proxies between the scanner and the
 * origin web server
 *
 * 1. TRACE with Max-Forwards: check whether there is no proxy at all
 * 2. TRACE and OPTIONS with increasing Max-Forwards: count nodes by
 *    Server / X-Powered-By signature and status code
 * 3. TRACK on a random path: fingerprint the origin server error page
 * 4. Report the topology when more than one node (or a silent proxy)
 *    was seen
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use super::{random_alphanumeric, random_from, RuleContext, ScanRule};
use crate::errors::EngineResult;
use crate::registry::{RuleCategory, RuleDescriptor, RuleStatus};
use crate::transport::{HttpResponse, HttpVersion, ProbeRequest};
use crate::types::{Confidence, Risk, Strength, Threshold};

pub const RULE_ID: i32 = 40025;

const MAX_FORWARD_METHODS: &[&str] = &["TRACE", "OPTIONS"];

const UPPER_ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const ATTACK: &str = "TRACE, OPTIONS methods with 'Max-Forwards' header. TRACK method.";

const UNKNOWN_NODE: &str = "Unknown";

static NOT_SUPPORTED_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^<address>(.+)\s+Server[^<]*</address>\r?$")
        .expect("valid origin server pattern")
});

static MAX_FORWARDS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^Max-Forwards:\s*([0-9]+)\s*$").expect("valid Max-Forwards pattern")
});

/// Cookies set by proxies, matched against the response header block.
/// The first capture group is the cookie name.
static PROXY_COOKIES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![(
        Regex::new(r"(?is)Set-Cookie: (NSC_[a-z0-9]+)=").expect("valid NetScaler pattern"),
        "Citrix NetScaler",
    )]
});

/// Request headers added by proxies, visible in an echoed TRACE body.
/// Product-specific patterns go first, generic ones after.
static PROXY_REQUEST_HEADERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?ims)^(X-Forwarded-For):\s*([0-9.]+)\s*$",
        r"(?ims)^(X-Forwarded-Port):\s*([0-9]+)\s*$",
        r"(?ims)^(X-Forwarded-Proto):\s*(.+)\s*$",
        r"(?ims)^(Via):\s*(.+)\s*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid proxy header pattern"))
    .collect()
});

pub fn rule_descriptor() -> RuleDescriptor {
    RuleDescriptor::new(RULE_ID, "Proxy Disclosure", RuleCategory::InfoGather, Risk::Medium)
        .with_solution(
            "Disable the 'TRACE' method on the proxy servers, as well as the origin \
             web/application server. Disable the 'OPTIONS' method on the proxy servers, as \
             well as the origin web/application server, if it is not required for other \
             purposes, such as CORS. Configure the web and application servers with custom \
             error pages, to prevent 'fingerprintable' product-specific error pages being \
             leaked to the user in the event of HTTP errors, such as 'TRACK' requests for \
             non-existent pages. Configure all proxies, application servers, and web servers \
             to prevent disclosure of the technology and version information in the 'Server' \
             and 'X-Powered-By' HTTP response headers.",
        )
        .with_reference("https://tools.ietf.org/html/rfc7231#section-5.1.2")
        .with_cwe(204)
        .with_wasc(45)
        .with_tag(
            "OWASP_2021_A05",
            "https://owasp.org/Top10/A05_2021-Security_Misconfiguration/",
        )
        .with_tag(
            "OWASP_2017_A06",
            "https://owasp.org/www-project-top-ten/2017/A6_2017-Security_Misconfiguration.html",
        )
        .with_tag("PENTEST", "")
        .with_status(RuleStatus::Beta)
}

/// Max-Forwards ceiling for a strength
pub fn max_forwards_for(strength: Strength) -> u32 {
    match strength {
        Strength::Low => 2,
        Strength::High => 4,
        Strength::Insane => 5,
        Strength::Medium | Strength::Default => 3,
    }
}

/// Server header plus the X-Powered-By list, formatted as `[a, b]`
fn node_signature(response: &HttpResponse) -> String {
    let server = response.header("server").unwrap_or("");
    let powered_by = response.header_values("x-powered-by");
    if powered_by.is_empty() {
        server.to_string()
    } else {
        format!("{}[{}]", server, powered_by.join(", "))
    }
}

fn display_node(node: &str) -> &str {
    if node.is_empty() {
        UNKNOWN_NODE
    } else {
        node
    }
}

/// Request carrying Max-Forwards and cache-busting headers
fn max_forwards_request(base: &ProbeRequest, method: &str, max_forwards: u32) -> ProbeRequest {
    base.derive(method)
        .with_version(HttpVersion::Http11)
        .with_header("Max-Forwards", &max_forwards.to_string())
        .with_header("Cache-Control", "no-cache")
        .with_header("Pragma", "no-cache")
}

/// What has been learned about the path to the origin server
#[derive(Debug, Default)]
struct Topology {
    nodes: Vec<String>,
    silent_proxies: BTreeSet<String>,
    end_to_end_trace: bool,
    proxy_trace: bool,
}

impl Topology {
    fn trace_enabled(&self) -> bool {
        self.end_to_end_trace || self.proxy_trace
    }

    fn proxy_count(&self) -> usize {
        self.nodes.len().saturating_sub(1) + self.silent_proxies.len()
    }

    fn other_info(&self) -> String {
        let mut info = String::new();
        if let Some((origin, proxies)) = self.nodes.split_last() {
            info.push_str(
                "Using the TRACE, OPTIONS, and TRACK methods, the following proxy servers have \
                 been identified between the scanner and the application/web server:\n",
            );
            for proxy in proxies {
                info.push_str(&format!("- {}\n", display_node(proxy)));
            }
            info.push_str("The following web/application server has been identified:\n");
            info.push_str(&format!("- {}\n", display_node(origin)));
        }
        if !self.silent_proxies.is_empty() {
            info.push_str(
                "The following 'silent' proxy servers were identified. They do not honour \
                 Max-Forwards, so their position in the topology is unknown:\n",
            );
            for proxy in &self.silent_proxies {
                info.push_str(&format!("- {}\n", display_node(proxy)));
            }
        }
        if self.trace_enabled() {
            info.push_str(
                "The 'TRACE' method is enabled on one or more of the proxy servers, or on the \
                 origin server. This method leaks all information submitted from the web \
                 browser and proxies back to the user agent. This may facilitate \
                 'Cross Site Tracing' attacks.\n",
            );
        }
        info
    }
}

/// Result of the initial end-to-end TRACE
enum TraceCheck {
    /// TRACE reached the origin untouched and nothing points to a proxy
    NoProxy,
    /// Keep probing. `proxy_hint` is the proxy count suggested by the echoed
    /// Max-Forwards, 0 when unknown.
    Continue { proxy_hint: u32 },
}

/// Rule 40025
pub struct ProxyDisclosureScanner {
    descriptor: RuleDescriptor,
    max_forwards: u32,
}

impl Default for ProxyDisclosureScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyDisclosureScanner {
    pub fn new() -> Self {
        Self {
            descriptor: rule_descriptor(),
            max_forwards: max_forwards_for(Strength::Medium),
        }
    }

    async fn check_for_no_proxy(&self, ctx: &RuleContext, topology: &mut Topology) -> TraceCheck {
        let cookie_value = random_alphanumeric(40);
        let request = max_forwards_request(ctx.base(), "TRACE", self.max_forwards)
            .with_cookie(&random_alphanumeric(15), &cookie_value);

        let response = match ctx.send(&request).await {
            Ok(response) => response,
            Err(e) => {
                debug!("Initial TRACE failed: {}", e);
                return TraceCheck::Continue { proxy_hint: 0 };
            }
        };

        if !response.contains(&cookie_value) {
            debug!("TRACE is not supported, falling back to Max-Forwards enumeration");
            return TraceCheck::Continue { proxy_hint: 0 };
        }
        topology.end_to_end_trace = true;

        let Some(echoed) = MAX_FORWARDS_PATTERN
            .captures(&response.body)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
        else {
            debug!("TRACE echoed the cookie but not Max-Forwards, assuming a proxy");
            return TraceCheck::Continue { proxy_hint: 0 };
        };

        if echoed != self.max_forwards {
            let proxy_hint = self.max_forwards.saturating_sub(echoed);
            debug!(
                "TRACE with Max-Forwards {} came back with {}, likely {} proxies",
                self.max_forwards, echoed, proxy_hint
            );
            return TraceCheck::Continue { proxy_hint };
        }

        // Max-Forwards untouched; only a non-compliant proxy can still be present
        let header_block = response.header_block();
        for (pattern, product) in PROXY_COOKIES.iter() {
            if let Some(cookie) = pattern.captures(&header_block).and_then(|c| c.get(1)) {
                debug!(
                    "Proxy cookie {} ({}) contradicts the untouched Max-Forwards",
                    cookie.as_str(),
                    product
                );
                if !product.is_empty() {
                    topology.silent_proxies.insert(product.to_string());
                }
                return TraceCheck::Continue { proxy_hint: 0 };
            }
        }

        for pattern in PROXY_REQUEST_HEADERS.iter() {
            if let Some(header) = pattern.captures(&response.body).and_then(|c| c.get(1)) {
                debug!(
                    "Proxy request header {} contradicts the untouched Max-Forwards",
                    header.as_str()
                );
                return TraceCheck::Continue { proxy_hint: 0 };
            }
        }

        TraceCheck::NoProxy
    }

    /// Count nodes with TRACE then OPTIONS. Returns `None` when stopped.
    async fn count_nodes(
        &self,
        ctx: &RuleContext,
        proxy_hint: u32,
        topology: &mut Topology,
    ) -> Option<Vec<String>> {
        let bound = if proxy_hint > 0 {
            proxy_hint + 1
        } else {
            self.max_forwards
        };
        let mut best: Vec<String> = Vec::new();

        for method in MAX_FORWARD_METHODS {
            let mut nodes: Vec<String> = Vec::new();
            let mut previous_signature = random_from(UPPER_ALPHANUMERIC, 15);
            let mut previous_status = 0u16;
            let mut plaintext_pending = ctx.base().is_secure();
            let mut max_forwards = 0;

            while max_forwards < bound {
                // HTTPS hides proxies that only terminate plaintext, so probe the
                // first hop once over HTTP as well
                let plaintext = plaintext_pending && max_forwards == 0;
                let cookie_value = random_alphanumeric(40);
                let mut request = max_forwards_request(ctx.base(), method, max_forwards)
                    .with_cookie(&random_alphanumeric(15), &cookie_value);
                if plaintext {
                    let mut url = request.url.clone();
                    if url.set_scheme("http").is_err() {
                        debug!("Cannot downgrade {} to plain HTTP", url);
                    }
                    request = request.with_url(url);
                }
                debug!("Trying {} with Max-Forwards {}", method, max_forwards);

                let response = match ctx.send(&request).await {
                    Ok(response) => response,
                    Err(e) => {
                        warn!(
                            "Failed to send {} with Max-Forwards {}: {}",
                            method, max_forwards, e
                        );
                        break;
                    }
                };

                if response.contains(&cookie_value) {
                    topology.proxy_trace = true;
                }

                let signature = node_signature(&response);
                if signature != previous_signature || response.status_code != previous_status {
                    debug!(
                        "New node for {}: '{}' (status {}), {} so far",
                        method,
                        signature,
                        response.status_code,
                        nodes.len() + 1
                    );
                    nodes.push(signature.clone());
                }
                previous_signature = signature;
                previous_status = response.status_code;

                if plaintext {
                    plaintext_pending = false;
                } else {
                    max_forwards += 1;
                }

                if ctx.is_stop() {
                    debug!("Stopping proxy enumeration on request");
                    return None;
                }
            }

            debug!("{} nodes detected using {}", nodes.len(), method);
            if nodes.len() > best.len() {
                best = nodes;
            }
        }

        Some(best)
    }

    /// TRACK on a random path usually produces an error page from the origin
    /// server. Returns `Err(())` when the probe timed out.
    async fn fingerprint_origin(&self, ctx: &RuleContext) -> Result<Option<String>, ()> {
        let mut url = ctx.base().url.clone();
        let path = format!("{}{}", url.path(), random_from(UPPER_ALPHANUMERIC, 5));
        url.set_path(&path);
        url.set_query(None);
        url.set_fragment(None);

        let request = max_forwards_request(ctx.base(), "TRACK", self.max_forwards).with_url(url);
        let response = match ctx.send(&request).await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                warn!(
                    "A timeout occurred while checking [TRACK] [{}] for Proxy Disclosure: {}",
                    request.url, e
                );
                return Err(());
            }
            Err(e) => {
                debug!("TRACK probe failed: {}", e);
                return Ok(None);
            }
        };

        Ok(NOT_SUPPORTED_PATTERN
            .captures(&response.body)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string()))
    }
}

#[async_trait]
impl ScanRule for ProxyDisclosureScanner {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn init(&mut self, _base: &ProbeRequest, strength: Strength, _threshold: Threshold) {
        self.max_forwards = max_forwards_for(strength);
    }

    async fn scan(&mut self, ctx: &RuleContext) -> EngineResult<()> {
        let mut topology = Topology::default();

        let proxy_hint = match self.check_for_no_proxy(ctx, &mut topology).await {
            TraceCheck::NoProxy => {
                debug!("TRACE indicates there is no proxy in front of {}", ctx.base().url);
                return Ok(());
            }
            TraceCheck::Continue { proxy_hint } => proxy_hint,
        };

        if ctx.is_stop() {
            return Ok(());
        }

        let Some(nodes) = self.count_nodes(ctx, proxy_hint, &mut topology).await else {
            return Ok(());
        };
        topology.nodes = nodes;

        match self.fingerprint_origin(ctx).await {
            Err(()) => return Ok(()),
            Ok(Some(origin)) => {
                if topology.nodes.last() != Some(&origin) {
                    debug!("Origin server '{}' not yet recorded, appending it", origin);
                    topology.nodes.push(origin);
                }
            }
            Ok(None) => {}
        }

        for (i, node) in topology.nodes.iter().enumerate() {
            debug!("Node {} is {}", i, display_node(node));
        }

        if topology.nodes.len() <= 1 && topology.silent_proxies.is_empty() {
            return Ok(());
        }

        let proxies = topology.proxy_count();
        info!(
            "[ProxyDisclosure] {} proxy server(s) detected in front of {}",
            proxies,
            ctx.base().url
        );

        let risk = if topology.trace_enabled() {
            Risk::High
        } else {
            self.descriptor.risk
        };
        ctx.new_alert()
            .risk(risk)
            .confidence(Confidence::Medium)
            .description(format!(
                "{} proxy server(s) were detected or fingerprinted. This information helps a \
                 potential attacker to determine \n - A list of targets for an attack against \
                 the application.\n - Potential vulnerabilities on the proxy servers that \
                 service the application.\n - The presence or absence of any proxy-based \
                 components that might cause attacks against the application to be detected, \
                 prevented, or mitigated.",
                proxies
            ))
            .attack(ATTACK)
            .other_info(topology.other_info())
            .raise()?;
        Ok(())
    }
}
