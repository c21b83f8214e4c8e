//! Operations for model-based testing.
//!
//! Operations are generated randomly (by proptest or the fuzzer) and applied
//! to both the reference model and the real transceiver.

use arbitrary::Arbitrary;
use wardmodem_core::Mode;

/// Small vocabulary of AT lines. Keeping it small makes equal and unequal
/// pairs both common.
pub const VOCABULARY: [&str; 6] = ["OK", "ERROR", "AT", "AT+CGMI", "+CSQ: 20,99", "+CREG: 0,1"];

/// A line drawn from [`VOCABULARY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub struct SmallLine(pub u8);

impl SmallLine {
    /// The line's text.
    pub fn text(self) -> &'static str {
        VOCABULARY[usize::from(self.0) % VOCABULARY.len()]
    }
}

/// Operations that can be applied to the system.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// The modem-manager issues a command.
    Command(SmallLine),

    /// The physical modem emits a line.
    ModemLine(SmallLine),

    /// The behavioral model emits a line.
    ModelLine(SmallLine),

    /// The oldest armed response timer fires.
    FireOldestTimer,

    /// A timer that already fired or was cancelled fires again.
    ///
    /// Exercises the stale-identifier path. The scheduler contract forbids
    /// this, so both sides must treat it as a no-op.
    FireStaleTimer,

    /// The harness selects a mode.
    SetMode(ModeChoice),
}

/// Arbitrary-friendly mirror of [`Mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum ModeChoice {
    /// [`Mode::WardModel`]
    WardModel,
    /// [`Mode::PassThrough`]
    PassThrough,
    /// [`Mode::SplitVerify`]
    SplitVerify,
}

impl From<ModeChoice> for Mode {
    fn from(choice: ModeChoice) -> Self {
        match choice {
            ModeChoice::WardModel => Self::WardModel,
            ModeChoice::PassThrough => Self::PassThrough,
            ModeChoice::SplitVerify => Self::SplitVerify,
        }
    }
}

/// Externally observable effect of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// A line went to the modem-manager.
    ToModemManager(String),
    /// A line went to the physical modem.
    ToModem(String),
    /// A command was posted to the model.
    ToModel(String),
    /// A mismatch was reported (modem, model).
    Mismatch(String, String),
    /// A timeout was reported (model).
    Timeout(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_line_wraps_into_vocabulary() {
        assert_eq!(SmallLine(0).text(), "OK");
        assert_eq!(SmallLine(6).text(), "OK");
        assert_eq!(SmallLine(255).text(), VOCABULARY[255 % VOCABULARY.len()]);
    }
}
