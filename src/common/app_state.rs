use std::sync::Arc;

use crate::{printing::ReceiptPrinter, services::statistics::Aggregator};

use super::aliases::DbPool;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub printer: Arc<dyn ReceiptPrinter>,
    pub aggregator: Aggregator,
}
