//! Simulated environment: virtual clock, event queue, transcript and RNG.
//!
//! A `SimEnv` is a cheap handle to state shared by every simulated
//! collaborator of one session. Nothing here touches the system clock, so a
//! session replays identically for the same seed.
//!
//! # Invariants
//!
//! - Monotonicity: `now()` never goes backwards; events are delivered in
//!   (due time, insertion order).
//! - Cancellation: a cancelled event is never delivered, and cancelling twice
//!   is a no-op.
//! - Isolation: two `SimEnv`s created separately share nothing.

use std::{cell::RefCell, collections::BTreeMap, fmt, rc::Rc, time::Duration};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use wardmodem_core::{ExchangeId, Mode, TimerHandle};

/// Where an AT line comes from (or goes to).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Endpoint {
    /// The modem-manager client.
    ModemManager,
    /// The physical modem.
    Modem,
    /// The behavioral model.
    Model,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ModemManager => "mm",
            Self::Modem => "modem",
            Self::Model => "wardmodem",
        })
    }
}

/// Something the event loop will hand to the transceiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    /// A line arrives from an endpoint.
    Line {
        /// Origin of the line.
        from: Endpoint,
        /// The line itself.
        line: String,
    },
    /// A response timer fires.
    Timer {
        /// Exchange the timer guards.
        exchange: ExchangeId,
    },
    /// The harness changes the transceiver mode.
    SetMode(Mode),
}

/// Observable happening during a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trace {
    /// A line was delivered to the transceiver.
    Received {
        /// Origin of the line.
        from: Endpoint,
        /// The line.
        line: String,
    },
    /// The transceiver sent a line to a channel or posted to the model.
    Sent {
        /// Destination of the line.
        to: Endpoint,
        /// The line.
        line: String,
    },
    /// A response timer was armed.
    TimerArmed {
        /// Handle returned to the transceiver.
        handle: TimerHandle,
        /// Exchange the timer guards.
        exchange: ExchangeId,
    },
    /// The transceiver cancelled a timer.
    TimerCancelled {
        /// The cancelled handle.
        handle: TimerHandle,
        /// Whether the timer was still pending.
        live: bool,
    },
    /// A timer fired and was delivered.
    TimerFired {
        /// The fired handle.
        handle: TimerHandle,
        /// Exchange the timer guarded.
        exchange: ExchangeId,
    },
    /// Modem and model disagreed.
    Mismatch {
        /// Modem's answer.
        modem: String,
        /// Model's answer.
        model: String,
    },
    /// The modem never answered.
    Timeout {
        /// Model's answer.
        model: String,
    },
    /// The harness requested a mode change.
    ModeChange {
        /// Requested mode.
        requested: Mode,
        /// Mode in effect afterwards.
        effective: Mode,
    },
}

/// A [`Trace`] stamped with virtual time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    /// Virtual time since session start.
    pub at: Duration,
    /// What happened.
    pub trace: Trace,
}

/// An event popped from the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Due {
    /// Key the event was scheduled under.
    pub key: u64,
    /// Virtual time of delivery.
    pub at: Duration,
    /// The event.
    pub event: SimEvent,
}

struct SimState {
    now: Duration,
    next_key: u64,
    queue: BTreeMap<(Duration, u64), SimEvent>,
    due_by_key: BTreeMap<u64, Duration>,
    transcript: Vec<TranscriptEntry>,
    rng: ChaCha8Rng,
}

/// Shared handle to the simulated environment of one session.
#[derive(Clone)]
pub struct SimEnv {
    state: Rc<RefCell<SimState>>,
    seed: u64,
}

impl SimEnv {
    /// Create an environment whose jitter is drawn from `seed`.
    pub fn with_seed(seed: u64) -> Self {
        let state = SimState {
            now: Duration::ZERO,
            next_key: 0,
            queue: BTreeMap::new(),
            due_by_key: BTreeMap::new(),
            transcript: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        };
        Self { state: Rc::new(RefCell::new(state)), seed }
    }

    /// Seed this environment was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    /// Queue `event` for delivery `delay` from now. Returns its key.
    pub fn schedule(&self, delay: Duration, event: SimEvent) -> u64 {
        let mut state = self.state.borrow_mut();
        let key = state.next_key;
        state.next_key += 1;
        let at = state.now + delay;
        state.queue.insert((at, key), event);
        state.due_by_key.insert(key, at);
        key
    }

    /// Drop a queued event. Returns whether it was still queued.
    pub fn cancel(&self, key: u64) -> bool {
        let mut state = self.state.borrow_mut();
        match state.due_by_key.remove(&key) {
            Some(at) => state.queue.remove(&(at, key)).is_some(),
            None => false,
        }
    }

    /// Pop the earliest event and advance the clock to its due time.
    pub fn pop_next(&self) -> Option<Due> {
        let mut state = self.state.borrow_mut();
        let ((at, key), event) = state.queue.pop_first()?;
        state.due_by_key.remove(&key);
        state.now = state.now.max(at);
        Some(Due { key, at, event })
    }

    /// Due time of the earliest queued event.
    pub fn next_due(&self) -> Option<Duration> {
        self.state.borrow().queue.keys().next().map(|(at, _)| *at)
    }

    /// Advance the clock without delivering anything.
    pub fn advance_to(&self, at: Duration) {
        let mut state = self.state.borrow_mut();
        state.now = state.now.max(at);
    }

    /// Number of queued events.
    pub fn queued(&self) -> usize {
        self.state.borrow().queue.len()
    }

    /// Uniform jitter in `[0, max]`.
    pub fn jitter(&self, max: Duration) -> Duration {
        if max.is_zero() {
            return Duration::ZERO;
        }
        let max_millis = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(self.state.borrow_mut().rng.gen_range(0..=max_millis))
    }

    /// Append to the transcript at the current time.
    pub fn record(&self, trace: Trace) {
        let mut state = self.state.borrow_mut();
        let at = state.now;
        state.transcript.push(TranscriptEntry { at, trace });
    }

    /// Copy of the transcript so far.
    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.state.borrow().transcript.clone()
    }
}

impl fmt::Debug for SimEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("SimEnv")
            .field("seed", &self.seed)
            .field("now", &state.now)
            .field("queued", &state.queue.len())
            .finish_non_exhaustive()
    }
}
