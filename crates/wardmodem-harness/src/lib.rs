//! Deterministic simulation harness for the wardmodem AT transceiver.
//!
//! Virtual-time implementations of the transceiver's collaborators (AT
//! channels, model link, scheduler, reporter) driven by a single-threaded
//! event loop. Runs are reproducible from a seed.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation for model-based
//! testing. Operations are applied to both the model and the real
//! transceiver, and their observable effects are compared.
//!
//! # Scenarios
//!
//! [`Scenario`] describes a whole session (endpoints, timeline, expected
//! outcome) either in code or in TOML, and runs it through a [`SimWorld`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod responder;
pub mod scenario;
pub mod sim_env;
pub mod sim_link;
pub mod world;

pub use model::{ModelTransceiver, Observation, Operation, RecordedTransceiver};
pub use responder::{Responder, ResponderConfig};
pub use scenario::{Expectations, Scenario, ScenarioError, ScenarioReport, Step};
pub use sim_env::{Endpoint, SimEnv, SimEvent, Trace, TranscriptEntry};
pub use sim_link::{SimChannel, SimModelLink, SimReporter, SimScheduler};
pub use world::{MAX_STEPS, SimConfig, SimReporters, SimTransceiver, SimWorld};
