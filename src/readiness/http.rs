// ABOUTME: Minimal HTTP/1.1 GET client over TCP and the HTTP readiness probe.
// ABOUTME: Probes the observed application through a local tunnel port.

use super::{Probe, ProbeStatus};
use async_trait::async_trait;
use http_body_util::BodyExt;
use hyper_util::rt::TokioIo;
use std::time::Duration;
use tokio::net::TcpStream;

/// Status and body of a completed GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issue a single GET request, bounded by `timeout` end to end.
pub async fn http_get(
    host: &str,
    port: u16,
    path: &str,
    timeout: Duration,
) -> Result<HttpResponse, String> {
    tokio::time::timeout(timeout, get(host, port, path))
        .await
        .map_err(|_| format!("request timed out after {:?}", timeout))?
}

async fn get(host: &str, port: u16, path: &str) -> Result<HttpResponse, String> {
    let stream = TcpStream::connect((host, port))
        .await
        .map_err(|e| format!("failed to connect to {}:{}: {}", host, port, e))?;

    let io = TokioIo::new(stream);

    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| format!("HTTP handshake failed: {}", e))?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!("probe connection error: {}", e);
        }
    });

    let req = hyper::Request::builder()
        .method("GET")
        .uri(path)
        .header("Host", format!("{}:{}", host, port))
        .body(http_body_util::Empty::<bytes::Bytes>::new())
        .map_err(|e| format!("failed to build request: {}", e))?;

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| format!("request failed: {}", e))?;

    let status = resp.status().as_u16();
    let body = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| format!("failed to read response: {}", e))?
        .to_bytes();

    Ok(HttpResponse {
        status,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

/// Ready when GET returns 2xx and the body contains the expected token, if any.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub expect_body: Option<String>,
    pub attempt_timeout: Duration,
}

impl HttpProbe {
    pub fn new(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            path: path.into(),
            expect_body: None,
            attempt_timeout: Duration::from_secs(5),
        }
    }

    pub fn expect_body(mut self, token: impl Into<String>) -> Self {
        self.expect_body = Some(token.into());
        self
    }

    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }
}

#[async_trait]
impl Probe for HttpProbe {
    fn describe(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.path)
    }

    async fn check(&self) -> ProbeStatus {
        let response = match http_get(&self.host, self.port, &self.path, self.attempt_timeout).await
        {
            Ok(response) => response,
            Err(e) => return ProbeStatus::NotReady(e),
        };

        if !response.is_success() {
            return ProbeStatus::NotReady(format!("HTTP {}", response.status));
        }

        match &self.expect_body {
            Some(token) if !response.body.contains(token.as_str()) => {
                ProbeStatus::NotReady(format!("response body does not contain '{}'", token))
            }
            _ => ProbeStatus::Ready,
        }
    }
}
