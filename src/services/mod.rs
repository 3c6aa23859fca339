pub mod orders;
pub mod receipts;
pub mod statistics;
pub mod tables;
