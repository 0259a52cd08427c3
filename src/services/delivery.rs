//! Outbound transport to the downstream consumer.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use http::header::{HOST, USER_AGENT};
use http::{HeaderMap, HeaderValue, Method, Request, StatusCode};
use http_body_util::Full;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::UnixStream;
use tracing::debug;

/// Request path used when delivering over a Unix socket.
const UNIX_REQUEST_PATH: &str = "/webhook";

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("unsupported target URL: {0}")]
    UnsupportedTarget(String),

    #[error("request to target failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unix socket exchange failed: {0}")]
    Socket(#[from] hyper::Error),

    #[error("failed to build request: {0}")]
    Request(#[from] http::Error),

    #[error("target did not answer within {0:?}")]
    Timeout(Duration),

    #[error("target returned error: {0}")]
    Status(StatusCode),
}

/// Where forwarded events go.
#[derive(Debug, Clone)]
pub enum ForwardTarget {
    Http { client: reqwest::Client, url: String },
    Unix { path: PathBuf },
}

impl ForwardTarget {
    /// Parse `http(s)://...` or `unix:///path/to.sock`.
    pub fn parse(url: &str, timeout: Duration) -> Result<Self, ForwardError> {
        if let Some(path) = url.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(ForwardError::UnsupportedTarget(url.to_string()));
            }
            return Ok(Self::Unix {
                path: PathBuf::from(path),
            });
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            let client = reqwest::Client::builder().timeout(timeout).build()?;
            return Ok(Self::Http {
                client,
                url: url.to_string(),
            });
        }
        Err(ForwardError::UnsupportedTarget(url.to_string()))
    }

    /// POST `body` with `headers`; any status of 400 or above is an error.
    pub async fn send(
        &self,
        headers: HeaderMap,
        body: Bytes,
        timeout: Duration,
    ) -> Result<StatusCode, ForwardError> {
        let status = match self {
            Self::Http { client, url } => {
                client
                    .post(url)
                    .headers(headers)
                    .body(body)
                    .send()
                    .await?
                    .status()
            }
            Self::Unix { path } => tokio::time::timeout(timeout, send_unix(path, headers, body))
                .await
                .map_err(|_| ForwardError::Timeout(timeout))??,
        };

        if status.is_client_error() || status.is_server_error() {
            return Err(ForwardError::Status(status));
        }
        Ok(status)
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Http { url, .. } => url.clone(),
            Self::Unix { path } => format!("unix://{}", path.display()),
        }
    }
}

async fn send_unix(
    path: &Path,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ForwardError> {
    let stream = UnixStream::connect(path)
        .await
        .map_err(|source| ForwardError::Connect {
            path: path.to_path_buf(),
            source,
        })?;
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "unix socket connection closed with error");
        }
    });

    let mut request = Request::builder()
        .method(Method::POST)
        .uri(UNIX_REQUEST_PATH)
        .body(Full::new(body))?;
    *request.headers_mut() = headers;
    request
        .headers_mut()
        .insert(HOST, HeaderValue::from_static("localhost"));
    request
        .headers_mut()
        .entry(USER_AGENT)
        .or_insert(HeaderValue::from_static("hubrelay"));

    let response = sender.send_request(request).await?;
    Ok(response.status())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_targets() {
        let timeout = Duration::from_secs(1);
        assert!(matches!(
            ForwardTarget::parse("http://localhost:9000/hook", timeout),
            Ok(ForwardTarget::Http { .. })
        ));
        match ForwardTarget::parse("unix:///run/consumer.sock", timeout).unwrap() {
            ForwardTarget::Unix { path } => assert_eq!(path, PathBuf::from("/run/consumer.sock")),
            other => panic!("expected unix target, got {other:?}"),
        }
        assert!(ForwardTarget::parse("unix://", timeout).is_err());
        assert!(ForwardTarget::parse("ftp://example.com", timeout).is_err());
    }

    #[tokio::test]
    async fn test_missing_socket_is_a_connect_error() {
        let dir = tempfile::tempdir().unwrap();
        let target = ForwardTarget::Unix {
            path: dir.path().join("absent.sock"),
        };
        let err = target
            .send(HeaderMap::new(), Bytes::from_static(b"{}"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ForwardError::Connect { .. }));
    }
}
