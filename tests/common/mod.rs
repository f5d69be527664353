use std::sync::Arc;

use commission_api::{
    config::AppConfig,
    db::{self, DbPool},
    events::{self, EventSender},
    handlers::AppServices,
    models::CommissionType,
    services::commissions::{CommissionResponse, CreateCommissionRequest},
    AppState,
};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Test harness backed by an in-memory SQLite database.
///
/// `db_max_connections` is pinned to 1 so every query sees the same
/// `sqlite::memory:` instance.
pub struct TestContext {
    pub services: AppServices,
    pub db: Arc<DbPool>,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestContext {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = Arc::new(
            db::establish_connection_from_app_config(&cfg)
                .await
                .expect("failed to create test database"),
        );
        db::run_migrations(&pool).await.expect("migrations apply");

        let (tx, rx) = mpsc::channel(64);
        let event_sender = Arc::new(EventSender::new(tx));
        let event_task = tokio::spawn(events::process_events(rx));

        let services = AppServices::new(pool.clone(), Some(event_sender), &cfg);
        let state = AppState {
            db: pool.clone(),
            config: cfg,
            services: services.clone(),
        };

        Self {
            services,
            db: pool,
            state,
            _event_task: event_task,
        }
    }

    /// Creates a percentage commission for the given scope and returns it.
    pub async fn seed_commission(
        &self,
        staff_id: Uuid,
        branch_id: Uuid,
        base_amount: Decimal,
        rate: Decimal,
    ) -> CommissionResponse {
        self.services
            .commissions
            .create_commission(CreateCommissionRequest {
                staff_id,
                branch_id,
                appointment_id: Uuid::new_v4(),
                service_id: Uuid::new_v4(),
                base_amount,
                rate,
                commission_type: CommissionType::Percentage,
            })
            .await
            .expect("commission created")
    }
}
