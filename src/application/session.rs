//! Session-wide mutable state: the single active retriever slot and the
//! append-only conversation. Everything else in the pipeline is immutable or
//! transient.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::application::services::Retriever;
use crate::domain::{Conversation, DomainError, Message, MessageRole, Result};

struct ActiveSlot {
    /// Ticket of the ingestion attempt that published the current retriever.
    /// Publishing is last-writer-wins: a slower attempt with an older ticket
    /// is discarded.
    ticket: u64,
    retriever: Option<Arc<Retriever>>,
}

pub struct SessionContext {
    slot: RwLock<ActiveSlot>,
    tickets: AtomicU64,
    conversation: Mutex<Conversation>,
    system_prompt: String,
}

impl SessionContext {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let system_prompt = system_prompt.into();
        Self {
            slot: RwLock::new(ActiveSlot {
                ticket: 0,
                retriever: None,
            }),
            tickets: AtomicU64::new(0),
            conversation: Mutex::new(Conversation::with_system(&system_prompt)),
            system_prompt,
        }
    }

    /// Ticket for a new ingestion attempt. Higher tickets win at publish
    /// time, making the newest attempt authoritative.
    pub fn issue_ticket(&self) -> u64 {
        self.tickets.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whatever retriever is published at call time. An in-flight question
    /// sees either the fully-previous or fully-next index, never a partial
    /// build.
    pub fn retriever(&self) -> Result<Option<Arc<Retriever>>> {
        let slot = self
            .slot
            .read()
            .map_err(|e| DomainError::internal(e.to_string()))?;
        Ok(slot.retriever.clone())
    }

    pub fn has_document(&self) -> bool {
        self.retriever().map(|r| r.is_some()).unwrap_or(false)
    }

    /// Swap in a newly built retriever, unless a newer attempt already
    /// published. Returns whether the swap happened.
    pub fn publish(&self, ticket: u64, retriever: Arc<Retriever>) -> Result<bool> {
        let mut slot = self
            .slot
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?;
        if ticket <= slot.ticket {
            return Ok(false);
        }
        slot.ticket = ticket;
        slot.retriever = Some(retriever);
        Ok(true)
    }

    /// "New document": clear the active retriever and reduce the
    /// conversation to the system message.
    pub fn reset(&self) -> Result<()> {
        {
            let mut slot = self
                .slot
                .write()
                .map_err(|e| DomainError::internal(e.to_string()))?;
            slot.retriever = None;
        }
        let mut conversation = self
            .conversation
            .lock()
            .map_err(|e| DomainError::internal(e.to_string()))?;
        conversation.reset();
        Ok(())
    }

    pub fn record_message(&self, role: MessageRole, content: impl Into<String>) {
        if let Ok(mut conversation) = self.conversation.lock() {
            conversation.push(role, content);
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.conversation
            .lock()
            .map(|c| c.messages.clone())
            .unwrap_or_default()
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }
}
