//! AT Transceiver
//!
//! Routes AT lines between the modem-manager, the physical modem and the
//! behavioral model, and cross-validates the two response sources.
//!
//! ## Routing
//!
//! | Line from      | `WardModel`      | `PassThrough`   | `SplitVerify`          |
//! |----------------|------------------|-----------------|------------------------|
//! | modem-manager  | post to model    | send to modem   | send to modem + post   |
//! | physical modem | dropped          | send to mm      | pair, see below        |
//! | model          | send to mm       | dropped         | pair, see below        |
//!
//! ## Pairing
//!
//! Responses are paired positionally against the head of the
//! [`PendingQueue`]. When the model answers first a timer is armed; if the
//! modem has not answered when it fires, a timeout is reported and the
//! model's answer is forwarded anyway. When both answers are in, they are
//! compared and the model's answer is forwarded. The physical modem's text
//! never reaches the modem-manager in split-verify mode.
//!
//! ## Execution model
//!
//! Every entry point is called by a single-threaded event loop, one at a
//! time, and runs to completion. Nothing here blocks, suspends or panics on
//! bad input; failures are reported and processing continues.

use std::fmt;

use tracing::{debug, error, info, warn};

use crate::{
    config::TransceiverConfig,
    exchange::{ExchangeId, PendingExchange, PendingQueue},
    link::{CommandChannel, ModelLink, Scheduler},
    mode::Mode,
    report::VerificationReporter,
};

/// Counters describing what the transceiver has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransceiverStats {
    /// Lines delivered to the modem-manager channel.
    pub sent_to_modem_manager: u64,
    /// Lines delivered to the physical-modem channel.
    pub sent_to_modem: u64,
    /// Commands posted to the behavioral model.
    pub posted_to_model: u64,
    /// Exchanges whose two responses agreed.
    pub matched: u64,
    /// Exchanges whose two responses disagreed.
    pub mismatched: u64,
    /// Exchanges the physical modem never answered.
    pub timed_out: u64,
    /// Timer firings for exchanges that no longer exist.
    pub stale_timeouts: u64,
    /// Lines from a source the current mode does not listen to.
    pub dropped_lines: u64,
    /// Exchanges flushed by a mode change.
    pub drained: u64,
    /// Modem answers that arrived after a mode change had already
    /// completed their exchange.
    pub late_modem_lines: u64,
    /// Sends or posts a collaborator refused.
    pub send_failures: u64,
}

/// The AT transceiver.
///
/// # Type Parameters
///
/// - `C`: command channel used for both the modem-manager and the modem
/// - `M`: link to the behavioral model
/// - `S`: timer facility of the owning event loop
/// - `R`: sink for verification failures
pub struct AtTransceiver<C, M, S, R> {
    config: TransceiverConfig,
    mode: Mode,
    mm_channel: C,
    modem_channel: Option<C>,
    model: M,
    scheduler: S,
    reporter: R,
    pending: PendingQueue,
    /// Modem answers still in flight for exchanges a drain completed.
    owed_modem_lines: usize,
    stats: TransceiverStats,
}

impl<C, M, S, R> AtTransceiver<C, M, S, R>
where
    C: CommandChannel,
    M: ModelLink,
    S: Scheduler,
    R: VerificationReporter,
{
    /// Create a transceiver in [`Mode::WardModel`].
    ///
    /// Without a `modem_channel` the transceiver can never leave
    /// [`Mode::WardModel`].
    pub fn new(
        config: TransceiverConfig,
        mm_channel: C,
        modem_channel: Option<C>,
        model: M,
        scheduler: S,
        reporter: R,
    ) -> Self {
        Self {
            config,
            mode: Mode::WardModel,
            mm_channel,
            modem_channel,
            model,
            scheduler,
            reporter,
            pending: PendingQueue::new(),
            owed_modem_lines: 0,
            stats: TransceiverStats::default(),
        }
    }

    /// Current operating mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Configuration the transceiver was built with.
    pub fn config(&self) -> &TransceiverConfig {
        &self.config
    }

    /// Whether a physical-modem channel is attached.
    pub fn has_modem(&self) -> bool {
        self.modem_channel.is_some()
    }

    /// Exchanges awaiting their second response.
    pub fn pending_exchanges(&self) -> &PendingQueue {
        &self.pending
    }

    /// Counters so far.
    pub fn stats(&self) -> TransceiverStats {
        self.stats
    }

    /// The verification reporter.
    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Switch operating mode and return the mode now in effect.
    ///
    /// [`Mode::WardModel`] is always accepted. Hardware modes are ignored
    /// when no physical-modem channel is attached. Leaving
    /// [`Mode::SplitVerify`] first drains the pending queue so that every
    /// in-flight command still gets exactly one answer:
    ///
    /// - exchanges the model already answered are reported as timeouts and
    ///   the model's answer is forwarded; the modem's answer, when it comes,
    ///   is dropped
    /// - exchanges only the modem answered are forwarded when switching to
    ///   [`Mode::PassThrough`] and discarded otherwise, since the model's
    ///   answer will then be routed under [`Mode::WardModel`]
    pub fn set_mode(&mut self, mode: Mode) -> Mode {
        if mode.requires_modem() && self.modem_channel.is_none() {
            warn!(requested = %mode, current = %self.mode, "cannot switch mode: no modem channel");
            return self.mode;
        }
        if mode == self.mode {
            return self.mode;
        }

        self.drain_pending(mode);
        if mode == Mode::SplitVerify {
            self.owed_modem_lines = 0;
        }
        info!(from = %self.mode, to = %mode, "set transceiver mode");
        self.mode = mode;
        self.mode
    }

    /// A line arrived from the modem-manager channel.
    pub fn on_modem_manager_line(&mut self, line: &str) {
        debug!("command {{mm ==> []}}: |{line}|");
        match self.mode {
            Mode::WardModel => self.post_to_model(line),
            Mode::PassThrough => self.send_to_modem(line),
            Mode::SplitVerify => {
                self.send_to_modem(line);
                self.post_to_model(line);
            },
        }
    }

    /// A line arrived from the physical-modem channel.
    pub fn on_modem_line(&mut self, line: &str) {
        debug!("command {{modem ==> []}}: |{line}|");
        match self.mode {
            Mode::WardModel | Mode::PassThrough if self.owed_modem_lines > 0 => {
                self.owed_modem_lines -= 1;
                self.stats.late_modem_lines += 1;
                debug!(
                    owed = self.owed_modem_lines,
                    "dropping late modem answer to a drained exchange: |{line}|"
                );
            },
            Mode::WardModel => self.drop_line("modem", line),
            Mode::PassThrough => self.send_to_modem_manager(line),
            Mode::SplitVerify => {
                match self.pending.pop_awaiting_modem().map(PendingExchange::into_parts) {
                    Some((_, Some(model), timer)) => {
                        if let Some(timer) = timer {
                            debug!(%timer, "modem answered in time, cancelling timer");
                            self.scheduler.cancel(timer);
                        }
                        self.complete(line, &model);
                    },
                    _ => {
                        let id = self.pending.push_modem_value(line.to_string());
                        debug!(
                            exchange = %id,
                            pending = self.pending.len(),
                            "modem answered first"
                        );
                    },
                }
            },
        }
    }

    /// A response arrived from the behavioral model.
    pub fn on_model_line(&mut self, line: &str) {
        debug!("command {{wardmodem ==> []}}: |{line}|");
        match self.mode {
            Mode::WardModel => self.send_to_modem_manager(line),
            Mode::PassThrough => self.drop_line("wardmodem", line),
            Mode::SplitVerify => {
                match self.pending.pop_awaiting_model().map(PendingExchange::into_parts) {
                    Some((Some(modem), ..)) => self.complete(&modem, line),
                    _ => {
                        let delay = self.config.response_timeout;
                        let scheduler = &mut self.scheduler;
                        let id = self
                            .pending
                            .push_model_value(line.to_string(), |id| {
                                scheduler.schedule_after(delay, id)
                            });
                        debug!(
                            exchange = %id,
                            pending = self.pending.len(),
                            "wardmodem answered first, waiting {delay:?} for modem"
                        );
                    },
                }
            },
        }
    }

    /// The response timer of `exchange` fired.
    ///
    /// Timers for exchanges that were already completed or drained are
    /// ignored.
    pub fn on_timeout(&mut self, exchange: ExchangeId) {
        if !self.pending.get(exchange).is_some_and(PendingExchange::awaits_modem) {
            self.stats.stale_timeouts += 1;
            debug!(%exchange, "ignoring timer for an exchange that is no longer pending");
            return;
        }

        let removed = self.pending.remove(exchange).map(PendingExchange::into_parts);
        if let Some((_, Some(model), _)) = removed {
            warn!(%exchange, "modem response timed out, forwarding wardmodem response |{model}|");
            self.stats.timed_out += 1;
            self.reporter.report_timeout(&model);
            self.send_to_modem_manager(&model);
        }
    }

    /// Both sides answered: compare and forward the model's answer.
    fn complete(&mut self, modem: &str, model: &str) {
        if modem == model {
            self.stats.matched += 1;
            debug!("response verified: |{model}|");
        } else {
            self.stats.mismatched += 1;
            warn!(
                modem,
                model,
                "response verification failed, wardmodem response takes precedence"
            );
            self.reporter.report_mismatch(modem, model);
        }
        self.send_to_modem_manager(model);
    }

    fn drain_pending(&mut self, next: Mode) {
        if self.pending.is_empty() {
            return;
        }

        let drained: Vec<_> = self.pending.drain().collect();
        info!(count = drained.len(), "draining pending exchanges before mode change");
        for exchange in drained {
            self.stats.drained += 1;
            let id = exchange.id();
            match exchange.into_parts() {
                (_, Some(model), timer) => {
                    if let Some(timer) = timer {
                        self.scheduler.cancel(timer);
                    }
                    warn!(exchange = %id, "abandoning modem response on mode change");
                    self.owed_modem_lines += 1;
                    self.stats.timed_out += 1;
                    self.reporter.report_timeout(&model);
                    self.send_to_modem_manager(&model);
                },
                (Some(modem), None, _) if next == Mode::PassThrough => {
                    info!(exchange = %id, "forwarding modem response on switch to {next}");
                    self.send_to_modem_manager(&modem);
                },
                (modem, None, _) => {
                    warn!(exchange = %id, ?modem, "discarding unpaired modem response");
                },
            }
        }
    }

    fn send_to_modem_manager(&mut self, line: &str) {
        debug!("command {{[] ==> mm}}: |{line}|");
        match self.mm_channel.send(line) {
            Ok(()) => self.stats.sent_to_modem_manager += 1,
            Err(e) => {
                self.stats.send_failures += 1;
                error!(error = %e, "failed to send |{line}| to modem-manager");
            },
        }
    }

    fn send_to_modem(&mut self, line: &str) {
        let Some(modem) = self.modem_channel.as_mut() else {
            self.stats.send_failures += 1;
            error!("no modem channel for |{line}| in {} mode", self.mode);
            return;
        };

        debug!("command {{[] ==> modem}}: |{line}|");
        match modem.send(line) {
            Ok(()) => self.stats.sent_to_modem += 1,
            Err(e) => {
                self.stats.send_failures += 1;
                error!(error = %e, "failed to send |{line}| to modem");
            },
        }
    }

    fn post_to_model(&mut self, line: &str) {
        debug!("command {{[] ==> wardmodem}}: |{line}|");
        match self.model.post(line) {
            Ok(()) => self.stats.posted_to_model += 1,
            Err(e) => {
                self.stats.send_failures += 1;
                error!(error = %e, "failed to post |{line}| to wardmodem");
            },
        }
    }

    fn drop_line(&mut self, source: &str, line: &str) {
        self.stats.dropped_lines += 1;
        warn!(source, mode = %self.mode, "dropping unexpected line |{line}|");
    }
}

impl<C, M, S, R> fmt::Debug for AtTransceiver<C, M, S, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtTransceiver")
            .field("mode", &self.mode)
            .field("has_modem", &self.modem_channel.is_some())
            .field("pending", &self.pending.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
