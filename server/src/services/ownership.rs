use std::sync::Arc;

use tracing::debug;

use crate::store::{StoreError, TicketStore};

/// Decides whether an actor may scan tickets of an event: only the organizer
/// whose approved request created the event may.
#[derive(Clone)]
pub struct OwnershipGuard {
    store: Arc<dyn TicketStore>,
}

impl OwnershipGuard {
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self { store }
    }

    /// `Ok(false)` is a denial; `Err` means the answer is unknown.
    pub async fn verify(&self, actor_id: i64, event_id: i64) -> Result<bool, StoreError> {
        let organizer = self.store.event_organizer(event_id).await?;
        let owns = organizer == Some(actor_id);
        if !owns {
            debug!(actor_id, event_id, ?organizer, "Actor does not own event");
        }
        Ok(owns)
    }
}
