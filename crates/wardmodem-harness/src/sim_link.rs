//! Simulated collaborators of the transceiver.
//!
//! Each one records what it was asked to do in the shared transcript and,
//! where a real endpoint would eventually answer, queues the answer on the
//! [`SimEnv`] event queue.

use std::time::Duration;

use wardmodem_core::{
    ChannelError, CommandChannel, ExchangeId, ModelLink, Scheduler, TimerHandle,
    VerificationReporter,
};

use crate::{
    responder::Responder,
    sim_env::{Endpoint, SimEnv, SimEvent, Trace},
};

/// Simulated AT channel.
///
/// The modem-manager side only records what it is sent. The modem side may
/// carry a [`Responder`] standing in for the physical modem.
#[derive(Debug)]
pub struct SimChannel {
    env: SimEnv,
    endpoint: Endpoint,
    responder: Option<Responder>,
    closed: bool,
}

impl SimChannel {
    /// Channel to the modem-manager.
    pub fn modem_manager(env: SimEnv) -> Self {
        Self { env, endpoint: Endpoint::ModemManager, responder: None, closed: false }
    }

    /// Channel to a physical modem that answers with `responder`.
    pub fn modem(env: SimEnv, responder: Responder) -> Self {
        Self { env, endpoint: Endpoint::Modem, responder: Some(responder), closed: false }
    }

    /// Make every further send fail.
    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl CommandChannel for SimChannel {
    fn send(&mut self, line: &str) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed { channel: self.endpoint.to_string() });
        }

        self.env.record(Trace::Sent { to: self.endpoint, line: line.to_string() });
        if let Some((delay, response)) =
            self.responder.as_mut().and_then(|r| r.answer(line, &self.env))
        {
            self.env.schedule(delay, SimEvent::Line { from: self.endpoint, line: response });
        }
        Ok(())
    }
}

/// Simulated behavioral model.
#[derive(Debug)]
pub struct SimModelLink {
    env: SimEnv,
    responder: Responder,
}

impl SimModelLink {
    /// Model that answers with `responder`.
    pub fn new(env: SimEnv, responder: Responder) -> Self {
        Self { env, responder }
    }
}

impl ModelLink for SimModelLink {
    fn post(&mut self, command: &str) -> Result<(), ChannelError> {
        self.env.record(Trace::Sent { to: Endpoint::Model, line: command.to_string() });
        if let Some((delay, response)) = self.responder.answer(command, &self.env) {
            self.env.schedule(delay, SimEvent::Line { from: Endpoint::Model, line: response });
        }
        Ok(())
    }
}

/// Virtual-time scheduler backed by the [`SimEnv`] event queue.
#[derive(Debug, Clone)]
pub struct SimScheduler {
    env: SimEnv,
}

impl SimScheduler {
    /// Scheduler sharing `env`'s clock.
    pub fn new(env: SimEnv) -> Self {
        Self { env }
    }
}

impl Scheduler for SimScheduler {
    fn schedule_after(&mut self, delay: Duration, exchange: ExchangeId) -> TimerHandle {
        let handle = TimerHandle(self.env.schedule(delay, SimEvent::Timer { exchange }));
        self.env.record(Trace::TimerArmed { handle, exchange });
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        let live = self.env.cancel(handle.0);
        self.env.record(Trace::TimerCancelled { handle, live });
    }
}

/// Reporter that writes failures into the transcript.
#[derive(Debug, Clone)]
pub struct SimReporter {
    env: SimEnv,
}

impl SimReporter {
    /// Reporter sharing `env`'s transcript.
    pub fn new(env: SimEnv) -> Self {
        Self { env }
    }
}

impl VerificationReporter for SimReporter {
    fn report_mismatch(&mut self, modem: &str, model: &str) {
        self.env.record(Trace::Mismatch { modem: modem.to_string(), model: model.to_string() });
    }

    fn report_timeout(&mut self, model: &str) {
        self.env.record(Trace::Timeout { model: model.to_string() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responder::ResponderConfig;

    #[test]
    fn modem_channel_queues_its_answer() {
        let env = SimEnv::with_seed(0);
        let mut modem = SimChannel::modem(
            env.clone(),
            Responder::new(ResponderConfig::with_latency(15).respond("AT", "OK")),
        );

        modem.send("AT").unwrap();
        let due = env.pop_next().unwrap();
        assert_eq!(due.at, Duration::from_millis(15));
        assert_eq!(due.event, SimEvent::Line { from: Endpoint::Modem, line: "OK".to_string() });
    }

    #[test]
    fn closed_channel_refuses_lines() {
        let env = SimEnv::with_seed(0);
        let mut mm = SimChannel::modem_manager(env.clone());
        mm.close();

        assert!(matches!(mm.send("OK"), Err(ChannelError::Closed { .. })));
        assert!(env.transcript().is_empty());
    }

    #[test]
    fn cancel_reports_whether_timer_was_live() {
        let env = SimEnv::with_seed(0);
        let mut scheduler = SimScheduler::new(env.clone());
        let handle = scheduler.schedule_after(Duration::from_millis(1), ExchangeId(0));

        scheduler.cancel(handle);
        scheduler.cancel(handle);

        let cancels: Vec<_> = env
            .transcript()
            .into_iter()
            .filter_map(|entry| match entry.trace {
                Trace::TimerCancelled { live, .. } => Some(live),
                _ => None,
            })
            .collect();
        assert_eq!(cancels, vec![true, false]);
        assert_eq!(env.queued(), 0);
    }
}
