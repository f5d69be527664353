pub mod commissions;
pub mod locks;
pub mod reports;
pub mod summaries;
