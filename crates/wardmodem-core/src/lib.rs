//! Wardmodem AT transceiver.
//!
//! The transceiver sits between a modem-manager client, an optional physical
//! modem, and a behavioral model of the modem ("wardmodem"). Depending on the
//! active [`Mode`] it routes AT lines between them, and in
//! [`Mode::SplitVerify`] it pairs every model response with the physical
//! modem's response to the same command, reports divergences, and always
//! answers the modem-manager with the model's value.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!  modem-manager ─┤                              ├─ physical modem
//!   (CommandChannel)       AtTransceiver          (CommandChannel)
//!                 │  Mode  ·  PendingQueue       │
//!                 └──────┬───────────────┬───────┘
//!                        │               │
//!                    ModelLink       Scheduler ──► on_timeout(ExchangeId)
//!                        │
//!              VerificationReporter
//! ```
//!
//! All collaborators are traits so the same transceiver runs against real
//! endpoints or the deterministic simulation in `wardmodem-harness`. The
//! transceiver never performs I/O itself and never blocks.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod exchange;
pub mod link;
pub mod mode;
pub mod report;
pub mod transceiver;

pub use config::{DEFAULT_RESPONSE_TIMEOUT, TransceiverConfig};
pub use error::ChannelError;
pub use exchange::{ExchangeId, PendingExchange, PendingQueue};
pub use link::{CommandChannel, ModelLink, Scheduler, TimerHandle};
pub use mode::{Mode, ParseModeError};
pub use report::{FailureLog, TracingReporter, VerificationFailure, VerificationReporter};
pub use transceiver::{AtTransceiver, TransceiverStats};
