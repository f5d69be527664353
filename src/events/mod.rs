//! In-process event channel for commission lifecycle notifications.
//!
//! Services emit an [`Event`] after each committed mutation; a spawned
//! consumer logs them. Delivery is best effort: a full or closed channel is
//! reported to the caller as an `EventError` by services that require
//! delivery, or logged and ignored where the mutation itself already
//! succeeded.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Events emitted by the commission engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CommissionCreated {
        commission_id: Uuid,
        staff_id: Uuid,
        branch_id: Uuid,
        amount: Decimal,
    },
    CommissionApproved(Uuid),
    CommissionLocked(Uuid),
    CommissionReversed(Uuid),
    CommissionAdjusted {
        commission_id: Uuid,
        previous_amount: Decimal,
        new_amount: Decimal,
    },
    SummaryGenerated {
        summary_id: Uuid,
        staff_id: Uuid,
        branch_id: Uuid,
        month: String,
        total_commission: Decimal,
    },
    SummaryApproved(Uuid),
    SummaryLocked(Uuid),
}

impl Event {
    fn describe(&self) -> String {
        match self {
            Event::CommissionCreated {
                commission_id,
                amount,
                ..
            } => format!("commission {} created with amount {}", commission_id, amount),
            Event::CommissionApproved(id) => format!("commission {} approved", id),
            Event::CommissionLocked(id) => format!("commission {} locked", id),
            Event::CommissionReversed(id) => format!("commission {} reversed", id),
            Event::CommissionAdjusted {
                commission_id,
                previous_amount,
                new_amount,
            } => format!(
                "commission {} adjusted {} -> {}",
                commission_id, previous_amount, new_amount
            ),
            Event::SummaryGenerated {
                summary_id, month, ..
            } => format!("summary {} generated for {}", summary_id, month),
            Event::SummaryApproved(id) => format!("summary {} approved", id),
            Event::SummaryLocked(id) => format!("summary {} locked", id),
        }
    }
}

/// Consumes events from the channel until all senders are dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        info!(event = %event.describe(), "processed commission event");
    }
    info!("event channel closed, consumer exiting");
}
