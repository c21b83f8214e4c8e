//! Reference model for model-based testing.
//!
//! The model captures WHAT the transceiver must do with the simplest possible
//! data structures. Operation sequences are applied to both the model and
//! the real transceiver (through [`RecordedTransceiver`]) and the observable
//! effects are compared.
//!
//! # Design Principles
//!
//! - Simplicity: the model should be obviously correct
//! - Observable behavior only: lines sent and failures reported, in order
//! - Deterministic: same operations produce same observations

pub mod operation;
mod recorded;
mod reference;

pub use operation::{ModeChoice, Observation, Operation, SmallLine, VOCABULARY};
pub use recorded::RecordedTransceiver;
pub use reference::ModelTransceiver;
