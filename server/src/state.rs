use std::sync::Arc;

use crate::config::CheckinWindowStore;
use crate::services::{RefundTransactionCoordinator, TicketStateMachine};
use crate::store::TicketStore;

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub scanner: TicketStateMachine,
    pub refunds: RefundTransactionCoordinator,
    pub windows: Arc<CheckinWindowStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn TicketStore>, windows: Arc<CheckinWindowStore>) -> Self {
        Self {
            scanner: TicketStateMachine::new(store.clone(), windows.clone()),
            refunds: RefundTransactionCoordinator::new(store),
            windows,
        }
    }
}
