//! HTTP bridge to the chat transport and the web login

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::db::Database;
use crate::runtime::{OutboundPrompt, OutboxTransport, ProductionDispatcher};
use crate::state_machine::DialogContext;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Prompts buffered for a slow outbox reader before it starts lagging
const OUTBOX_CAPACITY: usize = 256;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<ProductionDispatcher>,
    pub db: Database,
    pub outbox_tx: broadcast::Sender<OutboundPrompt>,
}

impl AppState {
    pub fn new(db: Database, dialog: Arc<DialogContext>) -> Self {
        let (outbox_tx, _) = broadcast::channel(OUTBOX_CAPACITY);
        let dispatcher = ProductionDispatcher::new(
            db.clone(),
            OutboxTransport::new(outbox_tx.clone()),
            dialog,
        );
        Self {
            dispatcher: Arc::new(dispatcher),
            db,
            outbox_tx,
        }
    }
}
