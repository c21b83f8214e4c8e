//! Simulated session: the single-threaded event loop around a transceiver.
//!
//! The world owns the transceiver and pops one event at a time from the
//! [`SimEnv`] queue, dispatching it to exactly one transceiver entry point.
//! Every entry point runs to completion before the next event is popped.

use std::time::Duration;

use wardmodem_core::{
    AtTransceiver, Mode, TracingReporter, TransceiverConfig, TransceiverStats, VerificationFailure,
};

use crate::{
    responder::{Responder, ResponderConfig},
    sim_env::{Endpoint, SimEnv, SimEvent, Trace, TranscriptEntry},
    sim_link::{SimChannel, SimModelLink, SimReporter, SimScheduler},
};

/// Upper bound on events processed by [`SimWorld::run`].
pub const MAX_STEPS: usize = 100_000;

/// Failures go to the transcript and to the `tracing` log.
pub type SimReporters = (SimReporter, TracingReporter);

/// Transceiver wired to simulated collaborators.
pub type SimTransceiver = AtTransceiver<SimChannel, SimModelLink, SimScheduler, SimReporters>;

/// Everything needed to build a [`SimWorld`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimConfig {
    /// Seed for responder jitter.
    pub seed: u64,
    /// Transceiver configuration.
    pub transceiver: TransceiverConfig,
    /// Physical modem; `None` runs without hardware.
    pub modem: Option<ResponderConfig>,
    /// Behavioral model.
    pub model: ResponderConfig,
}

/// A simulated session.
#[derive(Debug)]
pub struct SimWorld {
    env: SimEnv,
    transceiver: SimTransceiver,
    steps: usize,
}

impl SimWorld {
    /// Build a session at virtual time zero, in [`Mode::WardModel`].
    pub fn new(config: SimConfig) -> Self {
        let env = SimEnv::with_seed(config.seed);
        let modem = config.modem.map(|m| SimChannel::modem(env.clone(), Responder::new(m)));
        let transceiver = AtTransceiver::new(
            config.transceiver,
            SimChannel::modem_manager(env.clone()),
            modem,
            SimModelLink::new(env.clone(), Responder::new(config.model)),
            SimScheduler::new(env.clone()),
            (SimReporter::new(env.clone()), TracingReporter),
        );
        Self { env, transceiver, steps: 0 }
    }

    /// The shared environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// The transceiver under test.
    pub fn transceiver(&self) -> &SimTransceiver {
        &self.transceiver
    }

    /// Current mode of the transceiver.
    pub fn mode(&self) -> Mode {
        self.transceiver.mode()
    }

    /// Transceiver counters.
    pub fn stats(&self) -> TransceiverStats {
        self.transceiver.stats()
    }

    /// Events processed so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Change mode now, outside the event queue.
    pub fn set_mode(&mut self, mode: Mode) -> Mode {
        let effective = self.transceiver.set_mode(mode);
        self.env.record(Trace::ModeChange { requested: mode, effective });
        effective
    }

    /// Deliver `line` from `from` after `delay`.
    pub fn inject(&self, delay: Duration, from: Endpoint, line: &str) {
        self.env.schedule(delay, SimEvent::Line { from, line: line.to_string() });
    }

    /// Modem-manager issues `command` after `delay`.
    pub fn command(&self, delay: Duration, command: &str) {
        self.inject(delay, Endpoint::ModemManager, command);
    }

    /// Change mode after `delay`.
    pub fn schedule_mode(&self, delay: Duration, mode: Mode) {
        self.env.schedule(delay, SimEvent::SetMode(mode));
    }

    /// Process the earliest queued event. Returns `false` when idle.
    pub fn step(&mut self) -> bool {
        let Some(due) = self.env.pop_next() else {
            return false;
        };
        self.steps += 1;

        match due.event {
            SimEvent::Line { from, line } => {
                self.env.record(Trace::Received { from, line: line.clone() });
                match from {
                    Endpoint::ModemManager => self.transceiver.on_modem_manager_line(&line),
                    Endpoint::Modem => self.transceiver.on_modem_line(&line),
                    Endpoint::Model => self.transceiver.on_model_line(&line),
                }
            },
            SimEvent::Timer { exchange } => {
                self.env.record(Trace::TimerFired {
                    handle: wardmodem_core::TimerHandle(due.key),
                    exchange,
                });
                self.transceiver.on_timeout(exchange);
            },
            SimEvent::SetMode(mode) => {
                self.set_mode(mode);
            },
        }
        true
    }

    /// Process events until the queue is empty or [`MAX_STEPS`] is reached.
    /// Returns the number of events processed by this call.
    pub fn run(&mut self) -> usize {
        let mut processed = 0;
        while processed < MAX_STEPS && self.step() {
            processed += 1;
        }
        if processed == MAX_STEPS {
            tracing::warn!(seed = self.env.seed(), "simulation stopped after {MAX_STEPS} steps");
        }
        processed
    }

    /// Process every event due at or before `deadline`, then advance the
    /// clock to `deadline`.
    pub fn run_until(&mut self, deadline: Duration) -> usize {
        let mut processed = 0;
        while self.env.next_due().is_some_and(|at| at <= deadline) && self.step() {
            processed += 1;
        }
        self.env.advance_to(deadline);
        processed
    }

    /// Full transcript so far.
    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.env.transcript()
    }

    /// Lines delivered to the modem-manager, in order.
    pub fn delivered(&self) -> Vec<String> {
        self.sent_to(Endpoint::ModemManager)
    }

    /// Lines sent to `endpoint`, in order.
    pub fn sent_to(&self, endpoint: Endpoint) -> Vec<String> {
        self.env
            .transcript()
            .into_iter()
            .filter_map(|entry| match entry.trace {
                Trace::Sent { to, line } if to == endpoint => Some(line),
                _ => None,
            })
            .collect()
    }

    /// Verification failures, in report order.
    pub fn failures(&self) -> Vec<VerificationFailure> {
        self.env
            .transcript()
            .into_iter()
            .filter_map(|entry| match entry.trace {
                Trace::Mismatch { modem, model } => {
                    Some(VerificationFailure::Mismatch { modem, model })
                },
                Trace::Timeout { model } => Some(VerificationFailure::Timeout { model }),
                _ => None,
            })
            .collect()
    }
}
