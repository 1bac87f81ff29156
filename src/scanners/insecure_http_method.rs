// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Insecure HTTP Method Scanner
 * Detects dangerous HTTP methods enabled on a resource
 *
 * Flow: OPTIONS discovery, then either direct reporting (LOW threshold),
 * per-method confirmation, or a brute force of every dangerous method
 * at HIGH/INSANE strength.
 *
 * Tests:
 * - DELETE advertised by OPTIONS (never invoked)
 * - TRACE / TRACK cookie reflection (Cross Site Tracing)
 * - CONNECT tunnelling to a third party
 * - PUT / PATCH / WebDAV method acceptance
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use super::{child_url, random_alphanumeric, random_lower_alphanumeric, RuleContext, ScanRule};
use crate::errors::EngineResult;
use crate::registry::{RuleCategory, RuleDescriptor, RuleStatus};
use crate::transport::{HttpVersion, ProbeRequest, TunnelResponse};
use crate::types::{Confidence, Risk, Strength, Threshold};

pub const RULE_ID: i32 = 90028;

const THIRD_PARTY_HOST: &str = "www.google.com";
const THIRD_PARTY_PORT: u16 = 80;

pub const WEBDAV_METHODS: &[&str] = &[
    "COPY", "LOCK", "MKCOL", "MOVE", "PROPFIND", "PROPPATCH", "UNLOCK",
];

/// Methods probed directly: PUT and PATCH followed by the WebDAV set
pub const INSECURE_METHODS: &[&str] = &[
    "PUT", "PATCH", "COPY", "LOCK", "MKCOL", "MOVE", "PROPFIND", "PROPPATCH", "UNLOCK",
];

const TRACING_METHODS: &[&str] = &["TRACE", "TRACK"];

/// Status codes showing the method exists but the request was refused
const BLOCKED_STATUS_CODES: &[u16] = &[401, 402, 403];

static THIRD_PARTY_CONTENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<title.{1,10}Google.{1,25}/title>").expect("valid third party pattern")
});

pub fn rule_descriptor() -> RuleDescriptor {
    RuleDescriptor::new(RULE_ID, "Insecure HTTP Method", RuleCategory::Server, Risk::Medium)
        .with_description(
            "The most common methodology for attackers is to first footprint the target's \
             web presence and enumerate as much information as possible. Enabled HTTP methods \
             that are not required by the application widen the attack surface.",
        )
        .with_solution(
            "Disable insecure methods such as TRACK, TRACE, and CONNECT on the web server, \
             and ensure that the underlying service implementation does not support insecure methods.",
        )
        .with_reference("https://cwe.mitre.org/data/definitions/749.html")
        .with_reference(
            "https://owasp.org/www-project-web-security-testing-guide/v42/4-Web_Application_Security_Testing/02-Configuration_and_Deployment_Management_Testing/06-Test_HTTP_Methods",
        )
        .with_cwe(749)
        .with_wasc(45)
        .with_tag(
            "OWASP_2021_A05",
            "https://owasp.org/Top10/A05_2021-Security_Misconfiguration/",
        )
        .with_tag(
            "OWASP_2017_A06",
            "https://owasp.org/www-project-top-ten/2017/A6_2017-Security_Misconfiguration.html",
        )
        .with_tag(
            "WSTG-v42-CONF-06",
            "https://owasp.org/www-project-web-security-testing-guide/v42/4-Web_Application_Security_Testing/02-Configuration_and_Deployment_Management_Testing/06-Test_HTTP_Methods",
        )
        .with_tag("DEV_FULL", "")
        .with_tag("QA_FULL", "")
        .with_tag("PENTEST", "")
        .with_status(RuleStatus::Beta)
}

/// Methods this rule treats as dangerous when advertised
pub fn is_unsafe_method(method: &str) -> bool {
    INSECURE_METHODS.contains(&method)
        || TRACING_METHODS.contains(&method)
        || method == "CONNECT"
}

fn is_webdav(method: &str) -> bool {
    WEBDAV_METHODS.contains(&method)
}

/// Split an `Allow`/`Public` value into upper-cased, trimmed, de-duplicated
/// method names, keeping first-seen order
pub fn parse_methods(header_value: &str) -> Vec<String> {
    let mut methods: Vec<String> = Vec::new();
    for method in header_value.to_uppercase().split(',') {
        let method = method.trim();
        if method.is_empty() || methods.iter().any(|m| m == method) {
            continue;
        }
        methods.push(method.to_string());
    }
    methods
}

fn detailed_name(method: &str) -> String {
    format!("Insecure HTTP Method - {}", method)
}

fn advertised_description(method: &str) -> String {
    format!(
        "The insecure HTTP method [{}] is enabled on the web server for this resource. \
         Depending on the web server configuration, and the underlying implementation \
         responsible for serving the resource, this might or might not be exploitable.",
        method
    )
}

fn advertised_other_info(advertised: &str) -> String {
    format!(
        "The OPTIONS method disclosed the following enabled HTTP methods for this resource: [{}]",
        advertised
    )
}

fn exploitable_description(method: &str) -> (String, String) {
    if is_webdav(method) {
        return (
            format!(
                "The WebDAV method [{}] is enabled on the web server. WebDAV methods allow \
                 remote clients to manipulate resources on the server.",
                method
            ),
            "WebDAV is enabled and may allow an attacker to manage files remotely.".to_string(),
        );
    }
    match method {
        "PUT" => (
            format!(
                "The HTTP {} method appears to be accepted. It may allow an attacker to \
                 upload arbitrary files to the web server.",
                method
            ),
            "See the discussion on stackexchange: https://security.stackexchange.com/questions/21413/how-to-exploit-http-methods".to_string(),
        ),
        "PATCH" => (
            format!(
                "The HTTP {} method appears to be accepted. It may allow an attacker to \
                 modify existing resources on the web server.",
                method
            ),
            "PATCH applies partial modifications to a resource.".to_string(),
        ),
        _ => (
            format!("The HTTP {} method appears to be accepted.", method),
            String::new(),
        ),
    }
}

/// Rule 90028
pub struct InsecureHttpMethodScanner {
    descriptor: RuleDescriptor,
    strength: Strength,
    threshold: Threshold,
}

impl Default for InsecureHttpMethodScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl InsecureHttpMethodScanner {
    pub fn new() -> Self {
        Self {
            descriptor: rule_descriptor(),
            strength: Strength::Medium,
            threshold: Threshold::Medium,
        }
    }

    async fn brute_force(&self, ctx: &RuleContext) -> EngineResult<()> {
        info!("[InsecureHttpMethod] Probing all insecure methods on {}", ctx.base().url);

        for method in ["TRACK", "TRACE"] {
            if ctx.is_stop() {
                return Ok(());
            }
            self.test_trace_or_track(ctx, method).await?;
        }

        if ctx.is_stop() {
            return Ok(());
        }
        self.test_connect(ctx).await?;

        for method in INSECURE_METHODS {
            if ctx.is_stop() {
                return Ok(());
            }
            self.test_http_method(ctx, method).await?;
        }
        Ok(())
    }

    async fn check_advertised(
        &self,
        ctx: &RuleContext,
        methods: &[String],
        advertised: &str,
        options: &ProbeRequest,
    ) -> EngineResult<()> {
        for method in methods {
            if ctx.is_stop() {
                return Ok(());
            }
            debug!("Checking enabled method '{}'", method);

            if self.threshold != Threshold::Low {
                let method = method.as_str();
                if method == "CONNECT" {
                    self.test_connect(ctx).await?;
                } else if TRACING_METHODS.contains(&method) {
                    self.test_trace_or_track(ctx, method).await?;
                } else if INSECURE_METHODS.contains(&method) {
                    self.test_http_method(ctx, method).await?;
                } else {
                    debug!("Untested method: {}", method);
                }
                continue;
            }

            if !is_unsafe_method(method) {
                continue;
            }

            let risk = if is_webdav(method) { Risk::Info } else { Risk::Medium };
            ctx.new_alert()
                .risk(risk)
                .confidence(Confidence::Medium)
                .name(detailed_name(method))
                .description(advertised_description(method))
                .other_info(advertised_other_info(advertised))
                .evidence(method.as_str())
                .message(options)
                .raise()?;
        }
        Ok(())
    }

    /// Cross Site Tracing check: a random cookie echoed in the response body
    async fn test_trace_or_track(&self, ctx: &RuleContext, method: &str) -> EngineResult<()> {
        let cookie_name = random_alphanumeric(15);
        let cookie_value = random_alphanumeric(40);
        let request = ctx
            .base()
            .derive(method)
            .with_version(HttpVersion::Http10)
            .with_cookie(&cookie_name, &cookie_value);

        let response = match ctx.send(&request).await {
            Ok(response) => response,
            Err(e) => {
                debug!("{} probe failed: {}", method, e);
                return Ok(());
            }
        };

        if !response.contains(&cookie_value) {
            return Ok(());
        }

        info!("[InsecureHttpMethod] {} reflects request cookies on {}", method, request.url);
        ctx.new_alert()
            .confidence(Confidence::Medium)
            .name(detailed_name(method))
            .description(format!(
                "The {} method is enabled and echoes the request, including cookies. \
                 This may be exploited in a Cross Site Tracing (XST) attack to steal \
                 HttpOnly cookies or authentication headers.",
                method
            ))
            .other_info(format!(
                "A cookie was set with the value [{}] and was echoed back in the response body.",
                cookie_value
            ))
            .evidence(cookie_value.as_str())
            .message(&request)
            .raise()?;
        Ok(())
    }

    /// Ask the target to CONNECT to a third party and check the content
    /// returned through the tunnel
    async fn test_connect(&self, ctx: &RuleContext) -> EngineResult<()> {
        let payload = format!(
            "GET http://{host}:{port}/ HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n",
            host = THIRD_PARTY_HOST,
            port = THIRD_PARTY_PORT
        );

        let tunnel = match ctx
            .open_tunnel(THIRD_PARTY_HOST, THIRD_PARTY_PORT, &payload)
            .await
        {
            Ok(Some(tunnel)) => tunnel,
            Ok(None) => {
                debug!("No CONNECT tunnel could be established via {}", ctx.base().url);
                return Ok(());
            }
            Err(e) => {
                debug!("CONNECT probe failed: {}", e);
                return Ok(());
            }
        };

        let content = match tunnel {
            TunnelResponse {
                status_code: 200,
                payload_response: Some(content),
            } => content,
            other => {
                debug!("CONNECT refused or returned no content (status {})", other.status_code);
                return Ok(());
            }
        };

        if !THIRD_PARTY_CONTENT.is_match(&content) {
            debug!("Tunnelled response does not match the expected third party content");
            return Ok(());
        }

        info!("[InsecureHttpMethod] CONNECT tunnel to {} established", THIRD_PARTY_HOST);
        ctx.new_alert()
            .confidence(Confidence::Medium)
            .name(detailed_name("CONNECT"))
            .description(
                "The CONNECT method can be used to establish a raw socket connection to a \
                 third party through the web server. This may be used to bypass network \
                 controls or to relay attacks.",
            )
            .other_info(format!(
                "A connection was established to [{}] through the web server.",
                THIRD_PARTY_HOST
            ))
            .evidence(content)
            .raise()?;
        Ok(())
    }

    async fn test_http_method(&self, ctx: &RuleContext, method: &str) -> EngineResult<()> {
        let mut request = ctx.base().derive(method).with_version(HttpVersion::Http11);
        let writes_body = method == "PUT" || method == "PATCH";
        if writes_body {
            let body = format!("\"{}\":\"{}\"", random_alphanumeric(15), random_alphanumeric(15));
            let resource = random_lower_alphanumeric(10);
            request = request
                .with_url(child_url(&ctx.base().url, &resource))
                .with_body(body);
        }

        let response = match ctx.send(&request).await {
            Ok(response) => response,
            Err(e) => {
                debug!("{} probe failed: {}", method, e);
                return Ok(());
            }
        };
        debug!("Method {} answered with {}", method, response.status_code);

        // Structured responses to PUT/PATCH are API endpoints, not file writes
        if writes_body && (response.is_json() || response.is_xml()) {
            return Ok(());
        }

        let status = response.status_code;
        let (evidence, confidence) = if status == 200 || status == 201 {
            (
                format!("response code {} for insecure HTTP METHOD", status),
                Confidence::Medium,
            )
        } else if BLOCKED_STATUS_CODES.contains(&status) {
            (
                format!("response code {} for potentially insecure HTTP METHOD", status),
                Confidence::Low,
            )
        } else {
            return Ok(());
        };

        let risk = if is_webdav(method) { Risk::Info } else { Risk::Medium };
        let (description, other_info) = exploitable_description(method);
        ctx.new_alert()
            .risk(risk)
            .confidence(confidence)
            .name(detailed_name(method))
            .description(description)
            .other_info(other_info)
            .evidence(evidence)
            .message(&request)
            .raise()?;
        Ok(())
    }
}

#[async_trait]
impl ScanRule for InsecureHttpMethodScanner {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn init(&mut self, _base: &ProbeRequest, strength: Strength, threshold: Threshold) {
        self.strength = strength.or(Strength::Medium);
        self.threshold = threshold.or(Threshold::Medium);
    }

    async fn scan(&mut self, ctx: &RuleContext) -> EngineResult<()> {
        let options = ctx.base().derive("OPTIONS").with_version(HttpVersion::Http11);
        let brute_force = matches!(self.strength, Strength::High | Strength::Insane);
        let mut advertised = String::new();
        match ctx.send(&options).await {
            Ok(response) => {
                advertised = response.header("allow").unwrap_or("").trim().to_string();
                let public = response.header("public").unwrap_or("").trim();
                if !public.is_empty() {
                    if advertised.is_empty() {
                        advertised = public.to_string();
                    } else {
                        advertised = format!("{}, {}", advertised, public);
                    }
                }
                debug!("Advertised methods for {}: '{}'", options.url, advertised);
            }
            // Brute force does not depend on what OPTIONS advertises
            Err(e) if brute_force => {
                debug!("OPTIONS request failed for {}, trying every method: {}", options.url, e);
            }
            Err(e) => {
                debug!("OPTIONS request failed for {}: {}", options.url, e);
                return Ok(());
            }
        }

        let mut methods = parse_methods(&advertised);
        if methods.is_empty() && !brute_force {
            return Ok(());
        }

        if let Some(position) = methods.iter().position(|m| m == "DELETE") {
            // Reported from OPTIONS only; a DELETE request is never sent
            methods.remove(position);
            ctx.new_alert()
                .confidence(Confidence::Medium)
                .name(detailed_name("DELETE"))
                .description(advertised_description("DELETE"))
                .other_info(advertised_other_info(&advertised))
                .evidence("DELETE")
                .message(&options)
                .raise()?;
        }

        if ctx.is_stop() {
            return Ok(());
        }

        if brute_force {
            self.brute_force(ctx).await
        } else {
            self.check_advertised(ctx, &methods, &advertised, &options).await
        }
    }
}
