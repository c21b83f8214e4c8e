//! Fuzz target for the [`AtTransceiver`] pairing state machine
//!
//! Catch divergence between the transceiver and its reference model under
//! arbitrary interleavings of commands, responses, timer firings and mode
//! changes.
//!
//! # Strategy
//!
//! - Operation sequences: commands, modem and model lines from a small
//!   vocabulary so equal and unequal pairs are both common
//! - Timer races: the oldest live timer fires, or a retired one fires again
//! - Mode churn: mode changes with exchanges in flight
//!
//! # Invariants
//!
//! - Real and reference transceivers make identical observations, in order
//! - Mode and pending count agree after every operation
//! - A timer is never cancelled twice
//! - Live timers never outnumber pending exchanges
//! - Nothing is pending and no timer is live outside split-verify
//! - NEVER panic on a stale timer or a stray line
//!
//! [`AtTransceiver`]: wardmodem_core::AtTransceiver

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use wardmodem_core::Mode;
use wardmodem_harness::{ModelTransceiver, Operation, RecordedTransceiver};

#[derive(Debug, Clone, Arbitrary)]
struct FuzzInput {
    /// Whether a physical modem is attached.
    has_modem: bool,
    /// Operation sequence to apply.
    ops: Vec<Operation>,
}

fuzz_target!(|input: FuzzInput| {
    let mut model = ModelTransceiver::new(input.has_modem);
    let mut real = RecordedTransceiver::new(input.has_modem);

    for (i, op) in input.ops.iter().enumerate() {
        let expected = model.apply(op);
        let actual = real.apply(op);

        assert_eq!(expected, actual, "divergence at operation {i}: {op:?}");
        assert_eq!(model.mode(), real.mode(), "mode diverged at operation {i}");
        assert_eq!(model.pending(), real.pending(), "pending diverged at operation {i}");

        assert_eq!(real.double_cancels(), 0, "timer cancelled twice at operation {i}");
        assert!(real.live_timers() <= real.pending());
        if real.mode() != Mode::SplitVerify {
            assert_eq!(real.pending(), 0);
            assert_eq!(real.live_timers(), 0);
        }
        if !input.has_modem {
            assert_eq!(real.mode(), Mode::WardModel);
        }
    }
});
