//! Pending exchanges awaiting cross-validation.
//!
//! An exchange is one AT command/response round trip observed from two
//! sources: the physical modem and the behavioral model. It enters the
//! [`PendingQueue`] when the first of the two responses arrives and leaves it
//! when the second arrives or the modem's response window expires.
//!
//! # Invariants
//!
//! - Exactly one side: a queued exchange holds either the modem value or the
//!   model value, never both and never neither.
//! - Timer ownership: only exchanges waiting on the modem carry a timer, and
//!   each timer belongs to exactly one exchange.
//! - Homogeneous queue: pairing always consumes the head, and a new exchange
//!   is only appended when the head waits on the other side, so all queued
//!   exchanges wait on the same side.
//! - Stable identity: [`ExchangeId`]s increase monotonically and are never
//!   reused, so a stale id resolves to nothing.

use std::{collections::VecDeque, fmt};

use crate::link::TimerHandle;

/// Stable identifier of a pending exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExchangeId(pub u64);

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exchange#{}", self.0)
    }
}

/// One half-observed AT round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingExchange {
    id: ExchangeId,
    modem_value: Option<String>,
    model_value: Option<String>,
    timer: Option<TimerHandle>,
}

impl PendingExchange {
    /// Identifier handed to the scheduler for this exchange.
    pub fn id(&self) -> ExchangeId {
        self.id
    }

    /// Value observed from the physical modem, if it arrived first.
    pub fn modem_value(&self) -> Option<&str> {
        self.modem_value.as_deref()
    }

    /// Value observed from the behavioral model, if it arrived first.
    pub fn model_value(&self) -> Option<&str> {
        self.model_value.as_deref()
    }

    /// Timer guarding the modem's response window.
    pub fn timer(&self) -> Option<TimerHandle> {
        self.timer
    }

    /// Whether the model answered and the modem has not.
    pub fn awaits_modem(&self) -> bool {
        self.model_value.is_some() && self.modem_value.is_none()
    }

    /// Whether the modem answered and the model has not.
    pub fn awaits_model(&self) -> bool {
        self.modem_value.is_some() && self.model_value.is_none()
    }

    /// Consume the exchange, returning the value that did arrive and the
    /// timer, if any.
    pub fn into_parts(self) -> (Option<String>, Option<String>, Option<TimerHandle>) {
        (self.modem_value, self.model_value, self.timer)
    }
}

/// FIFO of exchanges awaiting their second response.
#[derive(Debug, Default)]
pub struct PendingQueue {
    entries: VecDeque<PendingExchange>,
    next_id: u64,
}

impl PendingQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending exchanges.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest pending exchange.
    pub fn head(&self) -> Option<&PendingExchange> {
        self.entries.front()
    }

    /// Pending exchanges, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &PendingExchange> {
        self.entries.iter()
    }

    /// Look up a live exchange.
    pub fn get(&self, id: ExchangeId) -> Option<&PendingExchange> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Append an exchange holding the modem's value.
    pub fn push_modem_value(&mut self, value: String) -> ExchangeId {
        let id = self.allocate_id();
        self.entries.push_back(PendingExchange {
            id,
            modem_value: Some(value),
            model_value: None,
            timer: None,
        });
        id
    }

    /// Append an exchange holding the model's value.
    ///
    /// `arm_timer` is called with the new exchange's id before it is queued
    /// and must return the handle of the timer guarding the modem's response.
    pub fn push_model_value(
        &mut self,
        value: String,
        arm_timer: impl FnOnce(ExchangeId) -> TimerHandle,
    ) -> ExchangeId {
        let id = self.allocate_id();
        let timer = arm_timer(id);
        self.entries.push_back(PendingExchange {
            id,
            modem_value: None,
            model_value: Some(value),
            timer: Some(timer),
        });
        id
    }

    /// Remove and return the head if it waits on the modem.
    pub fn pop_awaiting_modem(&mut self) -> Option<PendingExchange> {
        if self.entries.front().is_some_and(PendingExchange::awaits_modem) {
            self.entries.pop_front()
        } else {
            None
        }
    }

    /// Remove and return the head if it waits on the model.
    pub fn pop_awaiting_model(&mut self) -> Option<PendingExchange> {
        if self.entries.front().is_some_and(PendingExchange::awaits_model) {
            self.entries.pop_front()
        } else {
            None
        }
    }

    /// Remove the exchange with the given id, wherever it sits.
    pub fn remove(&mut self, id: ExchangeId) -> Option<PendingExchange> {
        let position = self.entries.iter().position(|e| e.id == id)?;
        self.entries.remove(position)
    }

    /// Remove every pending exchange, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = PendingExchange> + '_ {
        self.entries.drain(..)
    }

    fn allocate_id(&mut self) -> ExchangeId {
        let id = ExchangeId(self.next_id);
        self.next_id += 1;
        id
    }
}
