//! HTTP transport abstraction.
//!
//! The invoker talks to the server through [`HttpTransport`] so that the
//! whole client can be exercised against [`crate::MockTransport`] without a
//! network. A transport returns `Ok` for every HTTP status; `Err` is
//! reserved for faults below HTTP.

use std::error::Error as _;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use ccs_protocol::{WireRequest, WireResponse};
use ccs_types::HttpMethod;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &WireRequest) -> ClientResult<WireResponse>;
}

/// reqwest-backed transport with a keep-alive connection pool.
///
/// Connection resets, refusals, broken pipes and permission faults are
/// retried once before being reported.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> ClientResult<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| ClientError::fatal_transport(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn send_once(&self, request: &WireRequest) -> Result<WireResponse, reqwest::Error> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let mut wire = WireResponse::new(status);
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                wire = wire.with_header(name.as_str(), value);
            }
        }
        let body = response.bytes().await?;
        Ok(wire.with_body(body.to_vec()))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &WireRequest) -> ClientResult<WireResponse> {
        debug!(method = %request.method, url = %request.url, "sending request");
        match self.send_once(request).await {
            Ok(response) => Ok(response),
            Err(e) if is_transient(&e) => {
                warn!(url = %request.url, error = %e, "transient network fault, retrying once");
                self.send_once(request)
                    .await
                    .map_err(|e| ClientError::Transport { transient: is_transient(&e), message: e.to_string() })
            }
            Err(e) => Err(ClientError::fatal_transport(e.to_string())),
        }
    }
}

fn is_transient(err: &reqwest::Error) -> bool {
    if err.is_connect() {
        return true;
    }
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return is_transient_io(io_err.kind());
        }
        source = cause.source();
    }
    false
}

fn is_transient_io(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::PermissionDenied
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    #[test]
    fn transient_io_kinds() {
        assert!(is_transient_io(io::ErrorKind::ConnectionReset));
        assert!(is_transient_io(io::ErrorKind::ConnectionRefused));
        assert!(is_transient_io(io::ErrorKind::BrokenPipe));
        assert!(is_transient_io(io::ErrorKind::PermissionDenied));
        assert!(!is_transient_io(io::ErrorKind::NotFound));
        assert!(!is_transient_io(io::ErrorKind::InvalidData));
    }

    #[test]
    fn transport_builds() {
        assert!(ReqwestTransport::new().is_ok());
    }

    const OK: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok";

    enum Conn {
        Reset,
        Reply(&'static [u8]),
    }

    /// Serve the scripted connections in order, then answer 200 forever.
    async fn serve(script: Vec<Conn>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/ping", listener.local_addr().unwrap());
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            let mut script = script.into_iter();
            loop {
                let (mut stream, _) = listener.accept().await.unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
                read_request(&mut stream).await;
                match script.next().unwrap_or(Conn::Reply(OK)) {
                    Conn::Reset => {
                        #[allow(deprecated)]
                        stream.set_linger(Some(Duration::ZERO)).unwrap();
                        drop(stream);
                    }
                    Conn::Reply(bytes) => {
                        stream.write_all(bytes).await.unwrap();
                        stream.shutdown().await.ok();
                    }
                }
            }
        });
        (url, accepted)
    }

    async fn read_request(stream: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }
    }

    fn get(url: String) -> WireRequest {
        WireRequest {
            method: HttpMethod::Get,
            url,
            headers: Default::default(),
            body: None,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn connection_reset_is_retried_once() {
        let (url, accepted) = serve(vec![Conn::Reset]).await;
        let transport = ReqwestTransport::new().unwrap();
        let response = transport.send(&get(url)).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.text(), "ok");
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn malformed_response_is_not_retried() {
        let (url, accepted) = serve(vec![Conn::Reply(b"NOT HTTP AT ALL\r\n\r\n")]).await;
        let transport = ReqwestTransport::new().unwrap();
        let err = transport.send(&get(url)).await.unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }
}
