//! Receipt printing. Services build a [`Receipt`] and hand it to whichever
//! [`ReceiptPrinter`] the process was configured with.

pub mod error;
pub mod printer;
pub mod receipt;

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::common::config::PrinterConfig;

pub use error::{PrintError, PrintResult};
pub use printer::{HttpPrinter, NetworkPrinter};
pub use receipt::{Receipt, ReceiptField, ReceiptLine};

pub trait ReceiptPrinter: Send + Sync {
    /// Where jobs go, for logs.
    fn name(&self) -> String;

    fn send_receipt<'a>(&'a self, receipt: &'a Receipt) -> BoxFuture<'a, PrintResult<()>>;
}

/// Stand-in when no printer is configured. Every job fails as offline.
#[derive(Debug, Clone, Default)]
pub struct DisabledPrinter;

impl ReceiptPrinter for DisabledPrinter {
    fn name(&self) -> String {
        "disabled".to_string()
    }

    fn send_receipt<'a>(&'a self, _receipt: &'a Receipt) -> BoxFuture<'a, PrintResult<()>> {
        Box::pin(async { Err(PrintError::Offline("No printer configured".into())) })
    }
}

/// `PRINTER_ADDR` wins over `PRINTER_URL`; with neither set printing is disabled.
pub fn printer_from_config(config: &PrinterConfig) -> PrintResult<Arc<dyn ReceiptPrinter>> {
    if let Some(addr) = &config.addr {
        let printer = NetworkPrinter::from_addr(addr)?.with_timeout(config.timeout);
        return Ok(Arc::new(printer));
    }

    if let Some(url) = &config.url {
        let printer = HttpPrinter::new(url, config.timeout, config.receipt_width)?;
        return Ok(Arc::new(printer));
    }

    tracing::warn!("No printer configured, receipts will not be printed");
    Ok(Arc::new(DisabledPrinter))
}
