//! Collaborator interfaces consumed by the transceiver.
//!
//! The transceiver is driven by a single-threaded event loop that owns the
//! real endpoints. These traits are the only way the transceiver reaches the
//! outside world, which keeps it deterministic under simulation.
//!
//! # Invariants
//!
//! - Non-blocking: `send`, `post`, `schedule_after` and `cancel` return
//!   immediately. Delivery happens at a later turn of the event loop.
//! - Timer tokens are data: the scheduler stores the [`ExchangeId`] it was
//!   given and the owning event loop hands it back through
//!   [`AtTransceiver::on_timeout`](crate::AtTransceiver::on_timeout).

use std::{fmt, time::Duration};

use crate::{error::ChannelError, exchange::ExchangeId};

/// One end of an AT line endpoint (physical modem or modem-manager).
///
/// Framing and encoding of AT lines are the channel's business. Lines the
/// channel receives are delivered to the transceiver by the event loop.
pub trait CommandChannel {
    /// Queue `line` for transmission.
    fn send(&mut self, line: &str) -> Result<(), ChannelError>;
}

/// Link to the behavioral model.
///
/// Behaves like a third channel, except that commands have to be pushed to
/// it. The model's answer arrives later through
/// [`AtTransceiver::on_model_line`](crate::AtTransceiver::on_model_line).
pub trait ModelLink {
    /// Hand `command` to the model for evaluation.
    fn post(&mut self, command: &str) -> Result<(), ChannelError>;
}

/// Handle to a timer registered with a [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub u64);

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Single-threaded cooperative timer facility.
pub trait Scheduler {
    /// Arrange for the event loop to call `on_timeout(exchange)` after
    /// `delay`.
    fn schedule_after(&mut self, delay: Duration, exchange: ExchangeId) -> TimerHandle;

    /// Cancel a timer. A cancelled timer never fires. Cancelling a timer that
    /// already fired or was already cancelled is a no-op.
    fn cancel(&mut self, handle: TimerHandle);
}

impl<T: CommandChannel + ?Sized> CommandChannel for Box<T> {
    fn send(&mut self, line: &str) -> Result<(), ChannelError> {
        (**self).send(line)
    }
}

impl<T: ModelLink + ?Sized> ModelLink for Box<T> {
    fn post(&mut self, command: &str) -> Result<(), ChannelError> {
        (**self).post(command)
    }
}

impl<T: Scheduler + ?Sized> Scheduler for Box<T> {
    fn schedule_after(&mut self, delay: Duration, exchange: ExchangeId) -> TimerHandle {
        (**self).schedule_after(delay, exchange)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        (**self).cancel(handle);
    }
}
