pub mod commissions;
pub mod common;
pub mod health;
pub mod reports;
pub mod summaries;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    commissions::CommissionService, locks::CommissionLockRegistry, reports::ReportService,
    summaries::CommissionSummaryService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub commissions: Arc<CommissionService>,
    pub summaries: Arc<CommissionSummaryService>,
    pub reports: Arc<ReportService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        config: &AppConfig,
    ) -> Self {
        let locks = Arc::new(CommissionLockRegistry::new());

        let commissions = Arc::new(CommissionService::new(
            db_pool.clone(),
            event_sender.clone(),
            locks,
            config.lock_wait_timeout(),
        ));
        let summaries = Arc::new(CommissionSummaryService::new(
            db_pool.clone(),
            event_sender,
        ));
        let reports = Arc::new(ReportService::new(
            db_pool,
            config.dashboard_top_staff as usize,
        ));

        Self {
            commissions,
            summaries,
            reports,
        }
    }
}
