//! Verification failure reporting.
//!
//! Every divergence between the physical modem and the behavioral model is
//! reported, never swallowed. Reporters are fast local sinks: they must not
//! block and must not panic.

use std::fmt;

/// A divergence detected while cross-validating in split-verify mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationFailure {
    /// Both sides answered, with different text.
    Mismatch {
        /// What the physical modem answered.
        modem: String,
        /// What the behavioral model answered (forwarded to modem-manager).
        model: String,
    },

    /// The physical modem did not answer within the response window.
    Timeout {
        /// What the behavioral model answered (forwarded to modem-manager).
        model: String,
    },
}

impl VerificationFailure {
    /// The modem's value, absent for timeouts.
    pub fn modem_value(&self) -> Option<&str> {
        match self {
            Self::Mismatch { modem, .. } => Some(modem),
            Self::Timeout { .. } => None,
        }
    }

    /// The model's value, which was forwarded regardless.
    pub fn model_value(&self) -> &str {
        match self {
            Self::Mismatch { model, .. } | Self::Timeout { model } => model,
        }
    }

    /// Whether this is a [`VerificationFailure::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mismatch { modem, model } => {
                write!(f, "mismatch: modem |{modem}| vs model |{model}|")
            },
            Self::Timeout { model } => write!(f, "modem timed out; model answered |{model}|"),
        }
    }
}

/// Sink for verification failures.
pub trait VerificationReporter {
    /// The modem and the model disagreed on the same exchange.
    fn report_mismatch(&mut self, modem: &str, model: &str);

    /// The modem never answered an exchange the model answered.
    fn report_timeout(&mut self, model: &str);
}

impl<T: VerificationReporter + ?Sized> VerificationReporter for Box<T> {
    fn report_mismatch(&mut self, modem: &str, model: &str) {
        (**self).report_mismatch(modem, model);
    }

    fn report_timeout(&mut self, model: &str) {
        (**self).report_timeout(model);
    }
}

/// Fan out to two reporters, left first.
impl<A: VerificationReporter, B: VerificationReporter> VerificationReporter for (A, B) {
    fn report_mismatch(&mut self, modem: &str, model: &str) {
        self.0.report_mismatch(modem, model);
        self.1.report_mismatch(modem, model);
    }

    fn report_timeout(&mut self, model: &str) {
        self.0.report_timeout(model);
        self.1.report_timeout(model);
    }
}

/// In-memory record of every reported failure, in report order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureLog {
    failures: Vec<VerificationFailure>,
}

impl FailureLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// All failures, oldest first.
    pub fn failures(&self) -> &[VerificationFailure] {
        &self.failures
    }

    /// Number of mismatches recorded.
    pub fn mismatches(&self) -> usize {
        self.failures.iter().filter(|f| !f.is_timeout()).count()
    }

    /// Number of timeouts recorded.
    pub fn timeouts(&self) -> usize {
        self.failures.iter().filter(|f| f.is_timeout()).count()
    }

    /// Whether no failure was recorded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl VerificationReporter for FailureLog {
    fn report_mismatch(&mut self, modem: &str, model: &str) {
        self.failures.push(VerificationFailure::Mismatch {
            modem: modem.to_string(),
            model: model.to_string(),
        });
    }

    fn report_timeout(&mut self, model: &str) {
        self.failures.push(VerificationFailure::Timeout { model: model.to_string() });
    }
}

/// Reporter that writes each failure to the `tracing` log at warn level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl VerificationReporter for TracingReporter {
    fn report_mismatch(&mut self, modem: &str, model: &str) {
        tracing::warn!(modem, model, "response verification failed: mismatch");
    }

    fn report_timeout(&mut self, model: &str) {
        tracing::warn!(model, "response verification failed: modem timed out");
    }
}
