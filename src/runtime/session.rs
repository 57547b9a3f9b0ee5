//! One conversant's live dialog

use super::traits::RecordStore;
use crate::db::ConversantId;
use crate::state_machine::{
    transition, DialogContext, EngineFault, InboundMessage, Prompt, Step, Transition,
    MAX_DELEGATION_DEPTH,
};
use std::sync::Arc;

/// What the dispatcher should do after a message was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Send this question; the session waits for the answer
    Reply(Prompt),
    /// The session ended, with a last reply if there is one
    Closed(Option<Prompt>),
}

/// Dialog state for one conversant
///
/// `step` is `Some` while the session can take another message. Once it is
/// `None` the store handle has been closed and every further `advance`
/// fails with [`EngineFault::SessionClosed`].
pub struct Session<S: RecordStore> {
    conversant: ConversantId,
    step: Option<Step>,
    store: S,
    dialog: Arc<DialogContext>,
}

impl<S: RecordStore> Session<S> {
    pub fn create(conversant: ConversantId, store: S, dialog: Arc<DialogContext>) -> Self {
        Self {
            conversant,
            step: Some(Step::Root),
            store,
            dialog,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.step.is_none()
    }

    /// Step the next message will resume, if the session is still open
    pub fn step(&self) -> Option<&Step> {
        self.step.as_ref()
    }

    /// Feed one message through the step tree
    pub async fn advance(&mut self, msg: &InboundMessage) -> Result<Outcome, EngineFault> {
        let mut step = self.step.take().ok_or(EngineFault::SessionClosed)?;

        for depth in 0..=MAX_DELEGATION_DEPTH {
            tracing::debug!(
                conversant_id = self.conversant,
                step = step.kind(),
                depth,
                "Running step"
            );

            let result = transition(step, msg, &mut self.store, &self.dialog).await;
            match result {
                Ok(Transition::Delegate(child)) => step = child,
                Ok(Transition::Suspend { prompt, resume }) => {
                    tracing::debug!(
                        conversant_id = self.conversant,
                        step = resume.kind(),
                        "Waiting for answer"
                    );
                    self.step = Some(resume);
                    return Ok(Outcome::Reply(prompt));
                }
                Ok(Transition::Finish(reply)) => {
                    self.store.close().await;
                    tracing::debug!(conversant_id = self.conversant, "Session finished");
                    return Ok(Outcome::Closed(reply));
                }
                Err(fault) => {
                    self.store.close().await;
                    return Err(fault);
                }
            }
        }

        self.store.close().await;
        Err(EngineFault::DelegationTooDeep(MAX_DELEGATION_DEPTH))
    }

    /// Drop the dialog and release the store handle; idempotent
    pub async fn close(&mut self) {
        if self.step.take().is_some() {
            self.store.close().await;
        }
    }
}
