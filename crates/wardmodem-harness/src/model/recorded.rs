//! The real transceiver, driven operation by operation.
//!
//! Collaborators append to one shared observation log, and the scheduler is
//! manual: timers only fire when an [`Operation`] says so.

use std::{cell::RefCell, rc::Rc, time::Duration};

use wardmodem_core::{
    AtTransceiver, ChannelError, CommandChannel, ExchangeId, Mode, ModelLink, Scheduler,
    TimerHandle, TransceiverConfig, TransceiverStats, VerificationReporter,
};

use super::operation::{Observation, Operation};

type Log = Rc<RefCell<Vec<Observation>>>;

#[derive(Debug)]
struct LogChannel {
    log: Log,
    to_modem: bool,
}

impl CommandChannel for LogChannel {
    fn send(&mut self, line: &str) -> Result<(), ChannelError> {
        let observation = if self.to_modem {
            Observation::ToModem(line.to_string())
        } else {
            Observation::ToModemManager(line.to_string())
        };
        self.log.borrow_mut().push(observation);
        Ok(())
    }
}

#[derive(Debug)]
struct LogModel(Log);

impl ModelLink for LogModel {
    fn post(&mut self, command: &str) -> Result<(), ChannelError> {
        self.0.borrow_mut().push(Observation::ToModel(command.to_string()));
        Ok(())
    }
}

#[derive(Debug)]
struct LogReporter(Log);

impl VerificationReporter for LogReporter {
    fn report_mismatch(&mut self, modem: &str, model: &str) {
        self.0.borrow_mut().push(Observation::Mismatch(modem.to_string(), model.to_string()));
    }

    fn report_timeout(&mut self, model: &str) {
        self.0.borrow_mut().push(Observation::Timeout(model.to_string()));
    }
}

#[derive(Debug, Default)]
struct TimerBook {
    next: u64,
    live: Vec<(TimerHandle, ExchangeId)>,
    retired: Vec<ExchangeId>,
    double_cancels: usize,
}

/// Timers that fire only on request.
#[derive(Debug, Clone, Default)]
struct ManualScheduler(Rc<RefCell<TimerBook>>);

impl Scheduler for ManualScheduler {
    fn schedule_after(&mut self, _delay: Duration, exchange: ExchangeId) -> TimerHandle {
        let mut book = self.0.borrow_mut();
        let handle = TimerHandle(book.next);
        book.next += 1;
        book.live.push((handle, exchange));
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        let mut book = self.0.borrow_mut();
        match book.live.iter().position(|(h, _)| *h == handle) {
            Some(index) => {
                let (_, exchange) = book.live.remove(index);
                book.retired.push(exchange);
            },
            None => book.double_cancels += 1,
        }
    }
}

/// Real transceiver with recording collaborators.
#[derive(Debug)]
pub struct RecordedTransceiver {
    transceiver: AtTransceiver<LogChannel, LogModel, ManualScheduler, LogReporter>,
    log: Log,
    timers: ManualScheduler,
}

impl RecordedTransceiver {
    /// Real transceiver, with or without a physical modem.
    pub fn new(has_modem: bool) -> Self {
        let log: Log = Rc::default();
        let timers = ManualScheduler::default();
        let modem = has_modem.then(|| LogChannel { log: log.clone(), to_modem: true });
        let transceiver = AtTransceiver::new(
            TransceiverConfig::with_timeout_ms(0),
            LogChannel { log: log.clone(), to_modem: false },
            modem,
            LogModel(log.clone()),
            timers.clone(),
            LogReporter(log.clone()),
        );
        Self { transceiver, log, timers }
    }

    /// Current mode.
    pub fn mode(&self) -> Mode {
        self.transceiver.mode()
    }

    /// Exchanges awaiting their second response.
    pub fn pending(&self) -> usize {
        self.transceiver.pending_exchanges().len()
    }

    /// Timers armed and neither fired nor cancelled.
    pub fn live_timers(&self) -> usize {
        self.timers.0.borrow().live.len()
    }

    /// Times the transceiver cancelled a timer that was not live.
    pub fn double_cancels(&self) -> usize {
        self.timers.0.borrow().double_cancels
    }

    /// Transceiver counters.
    pub fn stats(&self) -> TransceiverStats {
        self.transceiver.stats()
    }

    /// Apply an operation and return what it made observable.
    pub fn apply(&mut self, op: &Operation) -> Vec<Observation> {
        match op {
            Operation::Command(line) => self.transceiver.on_modem_manager_line(line.text()),
            Operation::ModemLine(line) => self.transceiver.on_modem_line(line.text()),
            Operation::ModelLine(line) => self.transceiver.on_model_line(line.text()),
            Operation::FireOldestTimer => {
                let fired = {
                    let mut book = self.timers.0.borrow_mut();
                    if book.live.is_empty() {
                        None
                    } else {
                        let (_, exchange) = book.live.remove(0);
                        book.retired.push(exchange);
                        Some(exchange)
                    }
                };
                if let Some(exchange) = fired {
                    self.transceiver.on_timeout(exchange);
                }
            },
            Operation::FireStaleTimer => {
                let stale = self.timers.0.borrow().retired.last().copied();
                self.transceiver.on_timeout(stale.unwrap_or(ExchangeId(u64::MAX)));
            },
            Operation::SetMode(choice) => {
                self.transceiver.set_mode(Mode::from(*choice));
            },
        }
        std::mem::take(&mut *self.log.borrow_mut())
    }
}
