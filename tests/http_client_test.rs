// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - HTTP Client Tests
 * Tests for method pass-through, redirect control, timeouts and CONNECT tunnels
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use lonkero_probe::config::EngineConfig;
use lonkero_probe::errors::TransportError;
use lonkero_probe::http_client::HttpClient;
use lonkero_probe::transport::{ProbeRequest, Transport};

fn request(method_name: &str, url: &str) -> ProbeRequest {
    ProbeRequest::get(url).unwrap().derive(method_name)
}

#[tokio::test]
async fn test_options_returns_all_header_values() {
    let mock_server = MockServer::start().await;

    Mock::given(method("OPTIONS"))
        .and(path("/app"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Allow", "GET, POST, PUT")
                .append_header("X-Powered-By", "PHP/8.1")
                .append_header("X-Powered-By", "Express"),
        )
        .mount(&mock_server)
        .await;

    let client = HttpClient::new(10).unwrap();
    let url = format!("{}/app", mock_server.uri());
    let response = client.send(&request("OPTIONS", &url), false).await.unwrap();

    assert_eq!(response.status_code, 200);
    assert_eq!(response.header("allow"), Some("GET, POST, PUT"));
    assert_eq!(response.header_values("X-Powered-By"), vec!["PHP/8.1", "Express"]);
}

#[tokio::test]
async fn test_webdav_method_with_headers_and_cookies() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .and(path("/dav"))
        .and(header("max-forwards", "2"))
        .and(header("cookie", "session=abc; theme=dark"))
        .respond_with(ResponseTemplate::new(207).set_body_string("<multistatus/>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpClient::new(10).unwrap();
    let url = format!("{}/dav", mock_server.uri());
    let probe = request("PROPFIND", &url)
        .with_header("Max-Forwards", "2")
        .with_cookie("session", "abc")
        .with_cookie("theme", "dark");
    let response = client.send(&probe, false).await.unwrap();

    assert_eq!(response.status_code, 207);
    assert_eq!(response.body, "<multistatus/>");
}

#[tokio::test]
async fn test_redirects_only_followed_on_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/new"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
        .mount(&mock_server)
        .await;

    let client = HttpClient::new(10).unwrap();
    let probe = request("GET", &format!("{}/old", mock_server.uri()));

    let response = client.send(&probe, false).await.unwrap();
    assert_eq!(response.status_code, 302);
    assert_eq!(response.header("location"), Some("/new"));

    let response = client.send(&probe, true).await.unwrap();
    assert_eq!(response.status_code, 200);
    assert_eq!(response.body, "moved");
}

#[tokio::test]
async fn test_slow_response_maps_to_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("TRACK"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let client = HttpClient::new(1).unwrap();
    let result = client
        .send(&request("TRACK", &format!("{}/x", mock_server.uri())), false)
        .await;

    match result {
        Err(e) => assert!(e.is_timeout(), "expected a timeout, got {}", e),
        Ok(response) => panic!("expected a timeout, got status {}", response.status_code),
    }
}

#[tokio::test]
async fn test_body_is_capped() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("a".repeat(4096)))
        .mount(&mock_server)
        .await;

    let config = EngineConfig {
        max_body_size: Some(100),
        ..EngineConfig::default()
    };
    let client = HttpClient::from_config(&config).unwrap();
    let response = client
        .send(&request("GET", &mock_server.uri()), false)
        .await
        .unwrap();

    assert_eq!(response.body.len(), 100);
}

#[tokio::test]
async fn test_body_read_stops_at_cap() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    // Announces far more than it sends and then holds the connection open
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_until_blank_line(&mut stream).await;
        stream
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 10000000\r\n\r\n")
            .await
            .unwrap();
        stream.write_all(&[b'a'; 512]).await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let config = EngineConfig {
        max_body_size: Some(100),
        request_timeout_secs: 20,
        ..EngineConfig::default()
    };
    let client = HttpClient::from_config(&config).unwrap();
    let response = tokio::time::timeout(
        Duration::from_secs(5),
        client.send(&request("GET", &format!("http://{}/", address)), false),
    )
    .await
    .expect("body read should stop at the cap")
    .unwrap();

    assert_eq!(response.status_code, 200);
    assert_eq!(response.body, "a".repeat(100));
    server.abort();
}

#[tokio::test]
async fn test_connection_refused_is_io_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let client = HttpClient::new(5).unwrap();
    let result = client
        .send(&request("OPTIONS", &format!("http://{}/", address)), false)
        .await;

    assert!(matches!(result, Err(TransportError::Io { .. })));
}

async fn read_until_blank_line(stream: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut byte = [0u8; 1];
    while !data.ends_with(b"\r\n\r\n") {
        if stream.read(&mut byte).await.unwrap() == 0 {
            break;
        }
        data.push(byte[0]);
    }
    String::from_utf8_lossy(&data).to_string()
}

#[tokio::test]
async fn test_connect_tunnel_relays_payload() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    let proxy = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let connect = read_until_blank_line(&mut stream).await;
        stream
            .write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
            .await
            .unwrap();
        let payload = read_until_blank_line(&mut stream).await;
        stream
            .write_all(b"HTTP/1.1 200 OK\r\n\r\n<html><title>Google</title></html>")
            .await
            .unwrap();
        (connect, payload)
    });

    let client = HttpClient::new(5).unwrap();
    let target = Url::parse(&format!("http://{}/", address)).unwrap();
    let tunnel = client
        .open_tunnel(
            &target,
            "www.google.com",
            80,
            "GET http://www.google.com:80/ HTTP/1.1\r\nHost: www.google.com\r\n\r\n",
        )
        .await
        .unwrap()
        .expect("tunnel established");

    assert_eq!(tunnel.status_code, 200);
    assert!(tunnel.payload_response.unwrap().contains("<title>Google</title>"));

    let (connect, payload) = proxy.await.unwrap();
    assert!(connect.starts_with("CONNECT www.google.com:80 HTTP/1.1\r\n"));
    assert!(payload.starts_with("GET http://www.google.com:80/"));
}

#[tokio::test]
async fn test_refused_connect_has_no_payload() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_until_blank_line(&mut stream).await;
        stream
            .write_all(b"HTTP/1.1 405 Method Not Allowed\r\n\r\n")
            .await
            .unwrap();
    });

    let client = HttpClient::new(5).unwrap();
    let target = Url::parse(&format!("http://{}/", address)).unwrap();
    let tunnel = client
        .open_tunnel(&target, "www.google.com", 80, "GET / HTTP/1.1\r\n\r\n")
        .await
        .unwrap()
        .expect("CONNECT answered");

    assert_eq!(tunnel.status_code, 405);
    assert!(tunnel.payload_response.is_none());
}
