pub mod commission;
pub mod commission_adjustment;
pub mod commission_summary;
