// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};
use url::Url;

use crate::config::EngineConfig;
use crate::errors::TransportError;
use crate::transport::{HttpResponse, HttpVersion, ProbeRequest, Transport, TunnelResponse};

/// Maximum response body size (10MB) to prevent memory exhaustion
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Upper bound for the CONNECT status line and headers
const MAX_TUNNEL_HEADER_SIZE: usize = 8 * 1024;

const MAX_REDIRECTS: usize = 5;

/// reqwest-backed transport. Keeps one client that never follows redirects
/// and one that does, so every probe controls redirect handling itself.
#[derive(Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    redirecting_client: Arc<Client>,
    timeout: Duration,
    max_body_size: usize,
    user_agent: String,
}

impl HttpClient {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        Self::from_config(&EngineConfig {
            request_timeout_secs: timeout_secs,
            ..EngineConfig::default()
        })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        if config.accept_invalid_certs {
            warn!("Certificate validation is DISABLED. Only use this against test targets.");
        }

        let build = |policy: reqwest::redirect::Policy| {
            Client::builder()
                .timeout(Duration::from_secs(config.request_timeout_secs))
                .danger_accept_invalid_certs(config.accept_invalid_certs)
                .redirect(policy)
                .user_agent(config.user_agent.clone())
                .tcp_nodelay(true)
                .build()
        };

        let client = build(reqwest::redirect::Policy::none())
            .context("Failed to create HTTP client")?;
        let redirecting_client = build(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .context("Failed to create redirecting HTTP client")?;

        Ok(Self {
            client: Arc::new(client),
            redirecting_client: Arc::new(redirecting_client),
            timeout: Duration::from_secs(config.request_timeout_secs),
            max_body_size: config.max_body_size.unwrap_or(MAX_BODY_SIZE),
            user_agent: config.user_agent.clone(),
        })
    }

    fn map_error(&self, url: &str, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            }
        } else {
            TransportError::io(url, error)
        }
    }

    async fn tunnel(
        &self,
        target: &Url,
        host: &str,
        port: u16,
        payload: &str,
    ) -> Result<Option<TunnelResponse>, TransportError> {
        let target_host = target
            .host_str()
            .ok_or_else(|| TransportError::InvalidUrl {
                url: target.to_string(),
            })?;
        let target_port = target.port_or_known_default().unwrap_or(80);
        let url = target.as_str();

        let mut stream = TcpStream::connect((target_host, target_port))
            .await
            .map_err(|e| TransportError::io(url, e))?;

        let connect = format!(
            "CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\nUser-Agent: {}\r\n\r\n",
            self.user_agent
        );
        stream
            .write_all(connect.as_bytes())
            .await
            .map_err(|e| TransportError::io(url, e))?;

        let head = read_head(&mut stream)
            .await
            .map_err(|e| TransportError::io(url, e))?;
        let Some(status_code) = parse_status_code(&head) else {
            debug!("CONNECT to {}:{} via {} returned no status line", host, port, url);
            return Ok(None);
        };
        debug!("CONNECT status line from {}: {}", url, head.lines().next().unwrap_or(""));

        if status_code != 200 {
            return Ok(Some(TunnelResponse {
                status_code,
                payload_response: None,
            }));
        }

        stream
            .write_all(payload.as_bytes())
            .await
            .map_err(|e| TransportError::io(url, e))?;

        let mut buffer = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let read = stream
                .read(&mut chunk)
                .await
                .map_err(|e| TransportError::io(url, e))?;
            if read == 0 || buffer.len() >= self.max_body_size {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);
        }

        Ok(Some(TunnelResponse {
            status_code,
            payload_response: Some(String::from_utf8_lossy(&buffer).to_string()),
        }))
    }
}

/// Read up to the end of the response head (blank line)
async fn read_head(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while head.len() < MAX_TUNNEL_HEADER_SIZE {
        if stream.read(&mut byte).await? == 0 {
            break;
        }
        head.push(byte[0]);
        if head.ends_with(b"\r\n\r\n") || head.ends_with(b"\n\n") {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&head).to_string())
}

fn parse_status_code(head: &str) -> Option<u16> {
    let status_line = head.lines().next()?;
    if !status_line.starts_with("HTTP/") {
        return None;
    }
    status_line.split_whitespace().nth(1)?.parse().ok()
}

#[async_trait]
impl Transport for HttpClient {
    async fn send(
        &self,
        request: &ProbeRequest,
        follow_redirects: bool,
    ) -> Result<HttpResponse, TransportError> {
        let url = request.url.as_str();
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| TransportError::InvalidMethod(request.method.clone()))?;

        let client = if follow_redirects {
            &self.redirecting_client
        } else {
            &self.client
        };

        let mut builder = client.request(method, request.url.clone());
        if request.version == HttpVersion::Http10 {
            builder = builder.version(reqwest::Version::HTTP_10);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(cookie) = request.cookie_header() {
            builder = builder.header("Cookie", cookie);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let started = Instant::now();
        let mut response = builder
            .send()
            .await
            .map_err(|e| self.map_error(url, e))?;

        let status_code = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_lowercase(),
                    String::from_utf8_lossy(v.as_bytes()).to_string(),
                )
            })
            .collect();

        // Stop reading once the cap is reached; the rest is never buffered
        let mut body_bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.map_error(url, e))? {
            let remaining = self.max_body_size - body_bytes.len();
            if chunk.len() >= remaining {
                body_bytes.extend_from_slice(&chunk[..remaining]);
                debug!("Response body from {} truncated at {} bytes", url, self.max_body_size);
                break;
            }
            body_bytes.extend_from_slice(&chunk);
        }
        let body = String::from_utf8_lossy(&body_bytes).to_string();

        Ok(HttpResponse {
            status_code,
            headers,
            body,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn open_tunnel(
        &self,
        target: &Url,
        host: &str,
        port: u16,
        payload: &str,
    ) -> Result<Option<TunnelResponse>, TransportError> {
        if target.scheme() != "http" {
            debug!("CONNECT tunnelling is only attempted over plain HTTP, skipping {}", target);
            return Ok(None);
        }

        match tokio::time::timeout(self.timeout, self.tunnel(target, host, port, payload)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                url: target.to_string(),
                timeout: self.timeout,
            }),
        }
    }
}
