//! Scripted endpoints that answer AT commands after a delay.
//!
//! Both the simulated physical modem and the simulated behavioral model are
//! a response table plus latency. A responder is half-duplex: it answers in
//! the order it was asked, so its answers never overtake each other, while
//! two independent responders may interleave freely.

use std::{collections::BTreeMap, time::Duration};

use serde::Deserialize;

use crate::sim_env::SimEnv;

/// Declarative description of a responder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResponderConfig {
    /// Fixed delay before every answer, in milliseconds.
    pub latency_ms: u64,
    /// Upper bound of the seeded random delay added to `latency_ms`.
    pub jitter_ms: u64,
    /// Answer for each known command.
    pub responses: BTreeMap<String, String>,
    /// Answer for commands missing from `responses`. Unknown commands are
    /// left unanswered when absent.
    pub fallback: Option<String>,
}

impl ResponderConfig {
    /// A responder answering after `latency_ms` with no jitter.
    pub fn with_latency(latency_ms: u64) -> Self {
        Self { latency_ms, ..Self::default() }
    }

    /// Add an answer for `command`.
    #[must_use]
    pub fn respond(mut self, command: &str, response: &str) -> Self {
        self.responses.insert(command.to_string(), response.to_string());
        self
    }

    /// Answer unknown commands with `response`.
    #[must_use]
    pub fn fallback(mut self, response: &str) -> Self {
        self.fallback = Some(response.to_string());
        self
    }

    /// Add up to `jitter_ms` of seeded random delay.
    #[must_use]
    pub fn jitter(mut self, jitter_ms: u64) -> Self {
        self.jitter_ms = jitter_ms;
        self
    }
}

/// Live responder state.
#[derive(Debug, Clone)]
pub struct Responder {
    config: ResponderConfig,
    busy_until: Duration,
}

impl Responder {
    /// Build a responder from its description.
    pub fn new(config: ResponderConfig) -> Self {
        Self { config, busy_until: Duration::ZERO }
    }

    /// Answer for `command`, if any, and the delay from now until it is
    /// delivered.
    pub fn answer(&mut self, command: &str, env: &SimEnv) -> Option<(Duration, String)> {
        let response = self
            .config
            .responses
            .get(command)
            .or(self.config.fallback.as_ref())?
            .clone();

        let now = env.now();
        let delay = Duration::from_millis(self.config.latency_ms)
            + env.jitter(Duration::from_millis(self.config.jitter_ms));
        let due = (now + delay).max(self.busy_until);
        self.busy_until = due;
        Some((due - now, response))
    }
}
