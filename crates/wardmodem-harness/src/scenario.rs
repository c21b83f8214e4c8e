//! Declarative session scenarios.
//!
//! A scenario describes the endpoints (modem and model response tables), a
//! timeline of modem-manager commands, injected lines and mode changes, and
//! what the modem-manager should end up seeing. Scenarios are built in code
//! or loaded from TOML:
//!
//! ```toml
//! name = "modem answers late"
//! mode = "split-verify"
//!
//! [transceiver]
//! response_timeout_ms = 200
//!
//! [modem]
//! latency_ms = 500
//! responses = { "AT" = "OK" }
//!
//! [model]
//! latency_ms = 5
//! responses = { "AT" = "OK" }
//!
//! [[step]]
//! kind = "command"
//! at_ms = 0
//! line = "AT"
//!
//! [expect]
//! responses = ["OK"]
//! timeouts = 1
//! ```

use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use thiserror::Error;
use wardmodem_core::{Mode, TransceiverConfig, TransceiverStats, VerificationFailure};

use crate::{
    responder::ResponderConfig,
    sim_env::Endpoint,
    world::{SimConfig, SimWorld},
};

/// Errors from loading or checking a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The scenario file could not be read.
    #[error("cannot read scenario {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The scenario file is not valid TOML or has unknown fields.
    #[error("invalid scenario: {0}")]
    Parse(#[from] toml::de::Error),

    /// The scenario parsed but describes an impossible session.
    #[error("invalid scenario: {0}")]
    Invalid(String),

    /// The session ran but did not meet the scenario's expectations.
    #[error("scenario {name:?} failed: {}", violations.join("; "))]
    Unmet {
        /// Scenario name.
        name: String,
        /// Each unmet expectation.
        violations: Vec<String>,
    },
}

/// One timed action on the session timeline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Step {
    /// The modem-manager issues a command.
    Command {
        /// Virtual time of the step.
        at_ms: u64,
        /// The AT command.
        line: String,
    },
    /// A line arrives unprompted from an endpoint.
    Inject {
        /// Virtual time of the step.
        at_ms: u64,
        /// Origin of the line.
        from: Endpoint,
        /// The line.
        line: String,
    },
    /// The harness switches the transceiver mode.
    SetMode {
        /// Virtual time of the step.
        at_ms: u64,
        /// Requested mode.
        mode: Mode,
    },
}

/// What the session must produce. Absent fields are not checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Expectations {
    /// Exact sequence of lines delivered to the modem-manager.
    pub responses: Option<Vec<String>>,
    /// Number of reported mismatches.
    pub mismatches: Option<usize>,
    /// Number of reported timeouts.
    pub timeouts: Option<usize>,
    /// Mode in effect at the end.
    pub mode: Option<Mode>,
}

/// A complete session description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Scenario {
    /// Human-readable name.
    pub name: String,
    /// Seed for responder jitter.
    pub seed: u64,
    /// Mode selected at time zero.
    pub mode: Mode,
    /// Transceiver configuration.
    pub transceiver: TransceiverConfig,
    /// Physical modem, absent for model-only sessions.
    pub modem: Option<ResponderConfig>,
    /// Behavioral model.
    pub model: ResponderConfig,
    /// Timeline.
    #[serde(rename = "step")]
    pub steps: Vec<Step>,
    /// Expected outcome.
    pub expect: Expectations,
}

/// Outcome of running a scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    /// Scenario name.
    pub name: String,
    /// Seed used.
    pub seed: u64,
    /// Mode at the end of the session.
    pub final_mode: Mode,
    /// Lines delivered to the modem-manager.
    pub delivered: Vec<String>,
    /// Reported verification failures.
    pub failures: Vec<VerificationFailure>,
    /// Transceiver counters.
    pub stats: TransceiverStats,
    /// Virtual time when the session went idle.
    pub elapsed: Duration,
    /// Expectations the session did not meet.
    pub violations: Vec<String>,
}

impl ScenarioReport {
    /// Whether every expectation was met.
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Number of reported mismatches.
    pub fn mismatches(&self) -> usize {
        self.failures.iter().filter(|f| !f.is_timeout()).count()
    }

    /// Number of reported timeouts.
    pub fn timeouts(&self) -> usize {
        self.failures.iter().filter(|f| f.is_timeout()).count()
    }

    /// Turn unmet expectations into an error.
    pub fn into_result(self) -> Result<Self, ScenarioError> {
        if self.passed() {
            Ok(self)
        } else {
            Err(ScenarioError::Unmet { name: self.name, violations: self.violations })
        }
    }
}

impl Scenario {
    /// Empty scenario named `name`: model-only, ward-model mode.
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Self::default() }
    }

    /// Parse a scenario from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ScenarioError> {
        let scenario: Self = toml::from_str(text)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Reject timelines that no AT session could produce.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        for (index, step) in self.steps.iter().enumerate() {
            match step {
                Step::Command { line, .. } | Step::Inject { line, .. } if line.is_empty() => {
                    return Err(ScenarioError::Invalid(format!(
                        "step {index} carries an empty line"
                    )));
                },
                Step::Inject { from: Endpoint::Modem, .. } if self.modem.is_none() => {
                    return Err(ScenarioError::Invalid(format!(
                        "step {index} injects a modem line but no [modem] is configured"
                    )));
                },
                _ => {},
            }
        }
        Ok(())
    }

    /// Read and parse a scenario file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|source| ScenarioError::Io { path: path.display().to_string(), source })?;
        Self::from_toml_str(&text)
    }

    /// Override the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Select `mode` at time zero.
    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the modem response window.
    #[must_use]
    pub fn with_timeout_ms(mut self, millis: u64) -> Self {
        self.transceiver = TransceiverConfig::with_timeout_ms(millis);
        self
    }

    /// Attach a physical modem.
    #[must_use]
    pub fn with_modem(mut self, modem: ResponderConfig) -> Self {
        self.modem = Some(modem);
        self
    }

    /// Replace the behavioral model.
    #[must_use]
    pub fn with_model(mut self, model: ResponderConfig) -> Self {
        self.model = model;
        self
    }

    /// Modem-manager issues `line` at `at_ms`.
    #[must_use]
    pub fn command(mut self, at_ms: u64, line: &str) -> Self {
        self.steps.push(Step::Command { at_ms, line: line.to_string() });
        self
    }

    /// `from` emits `line` unprompted at `at_ms`.
    #[must_use]
    pub fn inject(mut self, at_ms: u64, from: Endpoint, line: &str) -> Self {
        self.steps.push(Step::Inject { at_ms, from, line: line.to_string() });
        self
    }

    /// Switch to `mode` at `at_ms`.
    #[must_use]
    pub fn set_mode(mut self, at_ms: u64, mode: Mode) -> Self {
        self.steps.push(Step::SetMode { at_ms, mode });
        self
    }

    /// Expect exactly these modem-manager deliveries.
    #[must_use]
    pub fn expect_responses(mut self, responses: &[&str]) -> Self {
        self.expect.responses = Some(responses.iter().map(|r| (*r).to_string()).collect());
        self
    }

    /// Expect this many mismatches.
    #[must_use]
    pub fn expect_mismatches(mut self, count: usize) -> Self {
        self.expect.mismatches = Some(count);
        self
    }

    /// Expect this many timeouts.
    #[must_use]
    pub fn expect_timeouts(mut self, count: usize) -> Self {
        self.expect.timeouts = Some(count);
        self
    }

    /// Build the session with every step queued, without running it.
    pub fn build_world(&self) -> SimWorld {
        let mut world = SimWorld::new(SimConfig {
            seed: self.seed,
            transceiver: self.transceiver,
            modem: self.modem.clone(),
            model: self.model.clone(),
        });
        world.set_mode(self.mode);

        for step in &self.steps {
            match step {
                Step::Command { at_ms, line } => world.command(Duration::from_millis(*at_ms), line),
                Step::Inject { at_ms, from, line } => {
                    world.inject(Duration::from_millis(*at_ms), *from, line);
                },
                Step::SetMode { at_ms, mode } => {
                    world.schedule_mode(Duration::from_millis(*at_ms), *mode);
                },
            }
        }
        world
    }

    /// Run the session to completion and check expectations.
    pub fn run(&self) -> ScenarioReport {
        let mut world = self.build_world();
        world.run();
        tracing::debug!(
            scenario = %self.name,
            steps = world.steps(),
            "scenario finished at {:?}",
            world.env().now()
        );
        self.report(&world)
    }

    /// Summarize `world` against this scenario's expectations.
    pub fn report(&self, world: &SimWorld) -> ScenarioReport {
        let delivered = world.delivered();
        let failures = world.failures();
        let mut report = ScenarioReport {
            name: self.name.clone(),
            seed: self.seed,
            final_mode: world.mode(),
            delivered,
            failures,
            stats: world.stats(),
            elapsed: world.env().now(),
            violations: Vec::new(),
        };

        let mut violations = Vec::new();
        if let Some(expected) = &self.expect.responses {
            if *expected != report.delivered {
                violations.push(format!(
                    "expected responses {expected:?}, modem-manager got {:?}",
                    report.delivered
                ));
            }
        }
        if let Some(expected) = self.expect.mismatches {
            let actual = report.mismatches();
            if expected != actual {
                violations.push(format!("expected {expected} mismatches, got {actual}"));
            }
        }
        if let Some(expected) = self.expect.timeouts {
            let actual = report.timeouts();
            if expected != actual {
                violations.push(format!("expected {expected} timeouts, got {actual}"));
            }
        }
        if let Some(expected) = self.expect.mode {
            if expected != report.final_mode {
                violations.push(format!(
                    "expected final mode {expected}, got {}",
                    report.final_mode
                ));
            }
        }

        report.violations = violations;
        report
    }
}
