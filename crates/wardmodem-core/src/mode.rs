//! Transceiver operating mode.

use std::{fmt, str::FromStr};

use serde::Deserialize;

/// Determines how AT lines are routed between the modem-manager, the physical
/// modem and the behavioral model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// The modem-manager talks to the behavioral model alone.
    #[default]
    WardModel,

    /// The modem-manager talks to the physical modem; the model is idle.
    PassThrough,

    /// Commands go to both the physical modem and the model. Responses are
    /// cross-checked and the model's response is forwarded.
    SplitVerify,
}

impl Mode {
    /// All modes, in declaration order.
    pub const ALL: [Self; 3] = [Self::WardModel, Self::PassThrough, Self::SplitVerify];

    /// Whether entering this mode needs a physical-modem channel.
    pub fn requires_modem(self) -> bool {
        matches!(self, Self::PassThrough | Self::SplitVerify)
    }

    /// Stable kebab-case name, as accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WardModel => "ward-model",
            Self::PassThrough => "pass-through",
            Self::SplitVerify => "split-verify",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known [`Mode`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown transceiver mode: {0:?}")]
pub struct ParseModeError(pub String);

impl FromStr for Mode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseModeError(s.to_string()))
    }
}
