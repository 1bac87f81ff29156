// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Shared test helpers: an in-process transport driven by a closure

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use url::Url;

use lonkero_probe::alerts::AlertSink;
use lonkero_probe::errors::TransportError;
use lonkero_probe::scanners::{RuleContext, ScanRule, StopFlag};
use lonkero_probe::transport::{HttpResponse, ProbeRequest, Transport, TunnelResponse};
use lonkero_probe::types::{Strength, Threshold};

type Responder = dyn Fn(&ProbeRequest) -> Result<HttpResponse, TransportError> + Send + Sync;

/// Answers every request with the scripted closure and records what was sent
pub struct ScriptedTransport {
    responder: Box<Responder>,
    tunnel: Option<TunnelResponse>,
    requests: Mutex<Vec<ProbeRequest>>,
    tunnels_opened: Mutex<Vec<(String, u16)>>,
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ProbeRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            tunnel: None,
            requests: Mutex::new(Vec::new()),
            tunnels_opened: Mutex::new(Vec::new()),
        }
    }

    pub fn with_tunnel(mut self, tunnel: TunnelResponse) -> Self {
        self.tunnel = Some(tunnel);
        self
    }

    pub fn requests(&self) -> Vec<ProbeRequest> {
        self.requests.lock().clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.method.clone()).collect()
    }

    pub fn tunnels_opened(&self) -> Vec<(String, u16)> {
        self.tunnels_opened.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: &ProbeRequest,
        follow_redirects: bool,
    ) -> Result<HttpResponse, TransportError> {
        assert!(!follow_redirects, "probes must not follow redirects");
        self.requests.lock().push(request.clone());
        (self.responder)(request)
    }

    async fn open_tunnel(
        &self,
        _target: &Url,
        host: &str,
        port: u16,
        _payload: &str,
    ) -> Result<Option<TunnelResponse>, TransportError> {
        self.tunnels_opened.lock().push((host.to_string(), port));
        Ok(self.tunnel.clone())
    }
}

/// The request rendered the way a TRACE-enabled server echoes it
pub fn echo(request: &ProbeRequest) -> String {
    let mut body = format!("{} {} HTTP/1.1\r\n", request.method, request.url.path());
    for (name, value) in &request.headers {
        body.push_str(&format!("{}: {}\r\n", name, value));
    }
    if let Some(cookie) = request.cookie_header() {
        body.push_str(&format!("Cookie: {}\r\n", cookie));
    }
    body
}

/// Run a single rule the way the scheduler does and return its alerts
pub async fn run_rule(
    mut rule: Box<dyn ScanRule>,
    transport: Arc<dyn Transport>,
    base: &ProbeRequest,
    strength: Strength,
    threshold: Threshold,
    stop: StopFlag,
) -> AlertSink {
    let sink = AlertSink::new();
    rule.init(base, strength, threshold);
    let ctx = RuleContext::new(
        transport,
        sink.clone(),
        stop,
        rule.descriptor().clone(),
        base.clone(),
    )
    .with_strength(strength)
    .with_threshold(threshold);
    rule.scan(&ctx).await.expect("rule scan failed");
    sink
}
