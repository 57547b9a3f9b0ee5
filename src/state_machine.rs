//! Conversation step tree
//!
//! A dialog is a tree of steps. Every message enters at [`Step::Root`] and is
//! handed down until some step answers it, asks a question, or gives up.
//! Steps never talk to the transport; they return a [`Transition`] and the
//! session decides what to send.

pub mod event;
pub mod prompt;
pub mod state;
pub mod texts;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use event::InboundMessage;
pub use prompt::Prompt;
pub use state::{DialogContext, Step};
pub use transition::{transition, EngineFault, Transition, MAX_DELEGATION_DEPTH};
