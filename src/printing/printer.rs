//! Receipt printer transports.
//!
//! - Network printers listening on a raw TCP port for JSON receipts
//! - HTTP print endpoints taking a multipart text upload

use std::net::SocketAddr;
use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::{Client, multipart};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{info, instrument};

use super::{
    ReceiptPrinter,
    error::{PrintError, PrintResult},
    receipt::Receipt,
};

/// Printer reachable over a raw TCP socket. The receipt is written as one JSON document.
#[derive(Debug, Clone)]
pub struct NetworkPrinter {
    addr: SocketAddr,
    timeout: Duration,
}

impl NetworkPrinter {
    /// Create from a socket address string (e.g., "192.168.1.100:9100")
    pub fn from_addr(addr: &str) -> PrintResult<Self> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|_| PrintError::InvalidConfig(format!("Invalid address: {}", addr)))?;

        Ok(Self {
            addr,
            timeout: Duration::from_secs(5),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    #[instrument(skip(self, payload), fields(addr = %self.addr, data_len = payload.len()))]
    async fn send_bytes(&self, payload: Vec<u8>) -> PrintResult<()> {
        info!("Connecting to printer");

        let mut stream = tokio::time::timeout(self.timeout, TcpStream::connect(self.addr))
            .await
            .map_err(|_| PrintError::Timeout(format!("Connection timeout: {}", self.addr)))?
            .map_err(|e| PrintError::Connection(format!("{}: {}", self.addr, e)))?;

        tokio::time::timeout(self.timeout, async {
            stream.write_all(&payload).await?;
            stream.flush().await?;
            stream.shutdown().await
        })
        .await
        .map_err(|_| PrintError::Timeout(format!("Write timeout: {}", self.addr)))??;

        info!("Receipt sent");
        Ok(())
    }
}

impl ReceiptPrinter for NetworkPrinter {
    fn name(&self) -> String {
        format!("tcp://{}", self.addr)
    }

    fn send_receipt<'a>(&'a self, receipt: &'a Receipt) -> BoxFuture<'a, PrintResult<()>> {
        Box::pin(async move {
            let payload = serde_json::to_vec(receipt)
                .map_err(|e| PrintError::InvalidConfig(format!("Unserializable receipt: {e}")))?;
            self.send_bytes(payload).await
        })
    }
}

/// Print endpoint accepting the rendered receipt as a `textFile` multipart field.
#[derive(Debug, Clone)]
pub struct HttpPrinter {
    client: Client,
    url: String,
    width: usize,
}

impl HttpPrinter {
    pub fn new(url: &str, timeout: Duration, width: usize) -> PrintResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PrintError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.to_string(),
            width,
        })
    }
}

impl ReceiptPrinter for HttpPrinter {
    fn name(&self) -> String {
        self.url.clone()
    }

    fn send_receipt<'a>(&'a self, receipt: &'a Receipt) -> BoxFuture<'a, PrintResult<()>> {
        Box::pin(async move {
            let part = multipart::Part::text(receipt.render_text(self.width))
                .file_name("receipt.txt")
                .mime_str("text/plain; charset=utf-8")
                .map_err(|e| PrintError::InvalidConfig(e.to_string()))?;
            let form = multipart::Form::new().part("textFile", part);

            let response = self
                .client
                .post(&self.url)
                .multipart(form)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        PrintError::Timeout(format!("{}: {}", self.url, e))
                    } else {
                        PrintError::Connection(format!("{}: {}", self.url, e))
                    }
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(PrintError::Rejected(status.as_u16()));
            }

            info!(url = %self.url, "Receipt uploaded");
            Ok(())
        })
    }
}
