//! Shared utilities for integration testing.
//!
//! Mock backends speak raw HTTP/1.1 over TCP so tests control every byte
//! of the response, including reason phrases, chunk boundaries and
//! timing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use mount_proxy::config::ProxyConfig;
use mount_proxy::{HttpServer, HyperBackendClient, ProxyService, Shutdown};

/// A request as seen by a mock backend.
#[derive(Debug, Clone, Default)]
pub struct Captured {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Captured {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_count(&self, name: &str) -> usize {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .count()
    }
}

/// Requests received by a mock backend, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<Captured>>>);

impl Recorder {
    pub fn requests(&self) -> Vec<Captured> {
        self.0.lock().unwrap().clone()
    }

    pub fn last(&self) -> Captured {
        self.0.lock().unwrap().last().cloned().expect("backend saw no request")
    }

    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

async fn read_request(socket: &mut TcpStream) -> Option<Captured> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
        .collect();

    let mut captured = Captured {
        request_line,
        headers,
        body: Vec::new(),
    };
    let mut rest = buf[head_end + 4..].to_vec();

    if let Some(len) = captured.header("content-length").and_then(|v| v.parse::<usize>().ok()) {
        while rest.len() < len {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                break;
            }
            rest.extend_from_slice(&chunk[..n]);
        }
        rest.truncate(len);
        captured.body = rest;
    } else if captured
        .header("transfer-encoding")
        .is_some_and(|v| v.eq_ignore_ascii_case("chunked"))
    {
        loop {
            if let Some(body) = decode_chunked(&rest) {
                captured.body = body;
                break;
            }
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                break;
            }
            rest.extend_from_slice(&chunk[..n]);
        }
    }

    Some(captured)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Decode a complete chunked body, or `None` if more bytes are needed.
fn decode_chunked(mut data: &[u8]) -> Option<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let line_end = find(data, b"\r\n")?;
        let size_line = std::str::from_utf8(&data[..line_end]).ok()?;
        let size = usize::from_str_radix(size_line.split(';').next()?.trim(), 16).ok()?;
        data = &data[line_end + 2..];
        if size == 0 {
            return Some(body);
        }
        if data.len() < size + 2 {
            return None;
        }
        body.extend_from_slice(&data[..size]);
        data = &data[size + 2..];
    }
}

/// Start a backend that records each request and lets `handler` write the
/// raw response to the socket.
pub async fn start_backend<F, Fut>(addr: SocketAddr, handler: F) -> Recorder
where
    F: Fn(Captured, TcpStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let recorder = Recorder::default();
    let handler = Arc::new(handler);

    let recorded = recorder.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let handler = handler.clone();
                    let recorded = recorded.clone();
                    tokio::spawn(async move {
                        if let Some(request) = read_request(&mut socket).await {
                            recorded.0.lock().unwrap().push(request.clone());
                            handler(request, socket).await;
                        }
                    });
                }
                Err(_) => break,
            }
        }
    });

    recorder
}

/// Start a backend that answers every request with the same raw response.
pub async fn start_fixed_backend(addr: SocketAddr, response: impl Into<Vec<u8>>) -> Recorder {
    let response: Arc<Vec<u8>> = Arc::new(response.into());
    start_backend(addr, move |_, mut socket| {
        let response = response.clone();
        async move {
            let _ = socket.write_all(&response).await;
            let _ = socket.shutdown().await;
        }
    })
    .await
}

/// Start a backend that echoes the request body back.
pub async fn start_echo_backend(addr: SocketAddr) -> Recorder {
    start_backend(addr, |request, mut socket| async move {
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            request.body.len()
        );
        let _ = socket.write_all(head.as_bytes()).await;
        let _ = socket.write_all(&request.body).await;
        let _ = socket.shutdown().await;
    })
    .await
}

/// A `200 OK` response with a text body.
pub fn ok_response(body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}

/// Encode one chunk of a chunked body.
pub fn chunk(data: &[u8]) -> Vec<u8> {
    let mut out = format!("{:x}\r\n", data.len()).into_bytes();
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
    out
}

/// Configuration for a proxy on `proxy_addr` mounted at `mount_path`.
pub fn proxy_config(proxy_addr: SocketAddr, mount_path: &str, target: &str) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = proxy_addr.to_string();
    config.listener.mount_path = mount_path.to_string();
    config.target.uri = target.to_string();
    config.cookies.namespace = "test".to_string();
    config.client.connect_timeout_ms = Some(2_000);
    config.client.read_timeout_ms = Some(5_000);
    config
}

/// Start a proxy with the bundled hyper client. The listener is bound
/// before this returns, so requests can be sent right away.
pub async fn start_proxy(config: ProxyConfig) -> Shutdown {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let client = HyperBackendClient::new(&config.client, &config.forwarding);
    let service = ProxyService::new(Arc::new(config), client).unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(service);
    let signalled = shutdown.signalled();
    tokio::spawn(async move {
        let _ = server.run(listener, signalled).await;
    });
    shutdown
}

/// HTTP client that does not follow redirects or use pooled connections.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Send a raw request and read the whole response until the server closes.
pub async fn raw_request(addr: SocketAddr, request: &str) -> String {
    let mut socket = TcpStream::connect(addr).await.unwrap();
    socket.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(5), socket.read_to_end(&mut response)).await;
    String::from_utf8_lossy(&response).to_string()
}
