//! AT transceiver tests
//!
//! Every collaborator writes into one shared journal so the tests can assert
//! the relative order of sends, posts, reports and timer operations.

use std::{cell::RefCell, rc::Rc, time::Duration};

use wardmodem_core::{
    AtTransceiver, ChannelError, CommandChannel, ExchangeId, Mode, ModelLink, Scheduler,
    TimerHandle, TransceiverConfig, VerificationReporter,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    ToModemManager(String),
    ToModem(String),
    ToModel(String),
    Scheduled(TimerHandle, ExchangeId),
    Cancelled(TimerHandle),
    Mismatch(String, String),
    Timeout(String),
}

type Journal = Rc<RefCell<Vec<Entry>>>;

#[derive(Clone, Copy)]
enum Side {
    ModemManager,
    Modem,
}

struct TestChannel {
    side: Side,
    journal: Journal,
    fail: bool,
}

impl CommandChannel for TestChannel {
    fn send(&mut self, line: &str) -> Result<(), ChannelError> {
        if self.fail {
            return Err(ChannelError::Closed { channel: "test".to_string() });
        }
        let entry = match self.side {
            Side::ModemManager => Entry::ToModemManager(line.to_string()),
            Side::Modem => Entry::ToModem(line.to_string()),
        };
        self.journal.borrow_mut().push(entry);
        Ok(())
    }
}

struct TestModel(Journal);

impl ModelLink for TestModel {
    fn post(&mut self, command: &str) -> Result<(), ChannelError> {
        self.0.borrow_mut().push(Entry::ToModel(command.to_string()));
        Ok(())
    }
}

struct TestScheduler {
    journal: Journal,
    next: u64,
}

impl Scheduler for TestScheduler {
    fn schedule_after(&mut self, _delay: Duration, exchange: ExchangeId) -> TimerHandle {
        let handle = TimerHandle(self.next);
        self.next += 1;
        self.journal.borrow_mut().push(Entry::Scheduled(handle, exchange));
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.journal.borrow_mut().push(Entry::Cancelled(handle));
    }
}

struct TestReporter(Journal);

impl VerificationReporter for TestReporter {
    fn report_mismatch(&mut self, modem: &str, model: &str) {
        self.0.borrow_mut().push(Entry::Mismatch(modem.to_string(), model.to_string()));
    }

    fn report_timeout(&mut self, model: &str) {
        self.0.borrow_mut().push(Entry::Timeout(model.to_string()));
    }
}

type Transceiver = AtTransceiver<TestChannel, TestModel, TestScheduler, TestReporter>;

struct Fixture {
    transceiver: Transceiver,
    journal: Journal,
}

impl Fixture {
    fn new(with_modem: bool) -> Self {
        Self::build(with_modem, false)
    }

    fn build(with_modem: bool, failing_mm: bool) -> Self {
        let journal: Journal = Rc::default();
        let mm =
            TestChannel { side: Side::ModemManager, journal: journal.clone(), fail: failing_mm };
        let modem = with_modem
            .then(|| TestChannel { side: Side::Modem, journal: journal.clone(), fail: false });
        let transceiver = AtTransceiver::new(
            TransceiverConfig::with_timeout_ms(0),
            mm,
            modem,
            TestModel(journal.clone()),
            TestScheduler { journal: journal.clone(), next: 3 },
            TestReporter(journal.clone()),
        );
        Self { transceiver, journal }
    }

    fn in_mode(mode: Mode) -> Self {
        let mut fixture = Self::new(true);
        assert_eq!(fixture.transceiver.set_mode(mode), mode);
        fixture
    }

    fn take(&self) -> Vec<Entry> {
        std::mem::take(&mut *self.journal.borrow_mut())
    }

    fn scheduled_exchange(entries: &[Entry], index: usize) -> ExchangeId {
        entries
            .iter()
            .filter_map(|e| match e {
                Entry::Scheduled(_, id) => Some(*id),
                _ => None,
            })
            .nth(index)
            .unwrap()
    }
}

fn mm(line: &str) -> Entry {
    Entry::ToModemManager(line.to_string())
}

#[test]
fn all_modes_selectable_with_modem() {
    let mut t = Fixture::new(true).transceiver;
    assert_eq!(t.set_mode(Mode::WardModel), Mode::WardModel);
    assert_eq!(t.set_mode(Mode::PassThrough), Mode::PassThrough);
    assert_eq!(t.set_mode(Mode::SplitVerify), Mode::SplitVerify);
    assert_eq!(t.set_mode(Mode::WardModel), Mode::WardModel);
    assert_eq!(t.mode(), Mode::WardModel);
}

#[test]
fn only_ward_model_selectable_without_modem() {
    let mut t = Fixture::new(false).transceiver;
    assert_eq!(t.set_mode(Mode::WardModel), Mode::WardModel);
    assert_eq!(t.set_mode(Mode::PassThrough), Mode::WardModel);
    assert_eq!(t.set_mode(Mode::SplitVerify), Mode::WardModel);
    assert_eq!(t.mode(), Mode::WardModel);
}

#[test]
fn ward_model_posts_modem_manager_commands() {
    let mut f = Fixture::in_mode(Mode::WardModel);
    f.transceiver.on_modem_manager_line("AT+CGMI");
    assert_eq!(f.take(), vec![Entry::ToModel("AT+CGMI".to_string())]);
}

#[test]
fn ward_model_forwards_model_responses_once() {
    let mut f = Fixture::in_mode(Mode::WardModel);
    f.transceiver.on_model_line("AT+commmmmmmmmand");
    assert_eq!(f.take(), vec![mm("AT+commmmmmmmmand")]);
}

#[test]
fn ward_model_drops_modem_lines() {
    let mut f = Fixture::in_mode(Mode::WardModel);
    f.transceiver.on_modem_line("RING");
    assert!(f.take().is_empty());
    assert_eq!(f.transceiver.stats().dropped_lines, 1);
}

#[test]
fn pass_through_routes_both_ways_without_model() {
    let mut f = Fixture::in_mode(Mode::PassThrough);
    f.transceiver.on_modem_manager_line("AT+CSQ");
    f.transceiver.on_modem_line("+CSQ: 20,99");
    assert_eq!(f.take(), vec![Entry::ToModem("AT+CSQ".to_string()), mm("+CSQ: 20,99")]);

    f.transceiver.on_model_line("+CSQ: 31,99");
    assert!(f.take().is_empty());
    assert_eq!(f.transceiver.stats().posted_to_model, 0);
}

#[test]
fn split_verify_fans_out_commands() {
    let mut f = Fixture::in_mode(Mode::SplitVerify);
    f.transceiver.on_modem_manager_line("AT+commmmmmmmmand");

    let entries = f.take();
    assert_eq!(entries.len(), 2);
    assert!(entries.contains(&Entry::ToModem("AT+commmmmmmmmand".to_string())));
    assert!(entries.contains(&Entry::ToModel("AT+commmmmmmmmand".to_string())));
    assert!(f.transceiver.pending_exchanges().is_empty());
}

#[test]
fn model_then_modem_cancels_timer_and_forwards() {
    let mut f = Fixture::in_mode(Mode::SplitVerify);
    f.transceiver.on_modem_manager_line("AT+X");
    f.take();

    f.transceiver.on_model_line("AT+X");
    let exchange = Fixture::scheduled_exchange(&f.take(), 0);
    assert_eq!(f.transceiver.pending_exchanges().head().map(|e| e.id()), Some(exchange));

    f.transceiver.on_modem_line("AT+X");
    assert_eq!(f.take(), vec![Entry::Cancelled(TimerHandle(3)), mm("AT+X")]);
    assert!(f.transceiver.pending_exchanges().is_empty());
}

#[test]
fn modem_then_model_needs_no_timer() {
    let mut f = Fixture::in_mode(Mode::SplitVerify);
    f.transceiver.on_modem_line("AT+commmmmmmmmand");
    assert!(f.take().is_empty());
    assert_eq!(f.transceiver.pending_exchanges().len(), 1);

    f.transceiver.on_model_line("AT+commmmmmmmmand");
    assert_eq!(f.take(), vec![mm("AT+commmmmmmmmand")]);
    assert_eq!(f.transceiver.stats().matched, 1);
}

#[test]
fn mismatch_is_reported_before_model_value_is_forwarded() {
    let mut f = Fixture::in_mode(Mode::SplitVerify);
    f.transceiver.on_modem_line("AT+modem");
    f.transceiver.on_model_line("AT+ward");

    assert_eq!(
        f.take(),
        vec![Entry::Mismatch("AT+modem".to_string(), "AT+ward".to_string()), mm("AT+ward")]
    );
    assert_eq!(f.transceiver.stats().mismatched, 1);
}

#[test]
fn timeout_is_reported_before_model_value_is_forwarded() {
    let mut f = Fixture::in_mode(Mode::SplitVerify);
    f.transceiver.on_model_line("AT+X");
    let exchange = Fixture::scheduled_exchange(&f.take(), 0);

    f.transceiver.on_timeout(exchange);
    assert_eq!(f.take(), vec![Entry::Timeout("AT+X".to_string()), mm("AT+X")]);
    assert!(f.transceiver.pending_exchanges().is_empty());
}

#[test]
fn late_modem_response_does_not_pair_with_timed_out_exchange() {
    let mut f = Fixture::in_mode(Mode::SplitVerify);
    f.transceiver.on_model_line("AT+X");
    let exchange = Fixture::scheduled_exchange(&f.take(), 0);
    f.transceiver.on_timeout(exchange);
    f.take();

    f.transceiver.on_modem_line("AT+X");
    assert!(f.take().is_empty(), "late response must not be forwarded or cancel anything");
    let head = f.transceiver.pending_exchanges().head().unwrap();
    assert_eq!(head.modem_value(), Some("AT+X"));
    assert_ne!(head.id(), exchange);

    // Firing the old timer again is harmless
    f.transceiver.on_timeout(exchange);
    assert!(f.take().is_empty());
    assert_eq!(f.transceiver.stats().stale_timeouts, 1);
}

#[test]
fn overlapping_exchanges_pair_in_fifo_order() {
    let mut f = Fixture::in_mode(Mode::SplitVerify);
    f.transceiver.on_model_line("AT+first");
    f.transceiver.on_model_line("AT+second");
    let entries = f.take();
    assert_eq!(
        entries,
        vec![
            Entry::Scheduled(TimerHandle(3), Fixture::scheduled_exchange(&entries, 0)),
            Entry::Scheduled(TimerHandle(4), Fixture::scheduled_exchange(&entries, 1)),
        ]
    );

    f.transceiver.on_modem_line("AT+first");
    f.transceiver.on_modem_line("AT+second");
    assert_eq!(
        f.take(),
        vec![
            Entry::Cancelled(TimerHandle(3)),
            mm("AT+first"),
            Entry::Cancelled(TimerHandle(4)),
            mm("AT+second"),
        ]
    );
    assert_eq!(f.transceiver.stats().matched, 2);
}

#[test]
fn modem_first_exchanges_pair_in_fifo_order() {
    let mut f = Fixture::in_mode(Mode::SplitVerify);
    f.transceiver.on_modem_line("1");
    f.transceiver.on_modem_line("2");
    f.transceiver.on_model_line("1");
    f.transceiver.on_model_line("two");

    assert_eq!(
        f.take(),
        vec![mm("1"), Entry::Mismatch("2".to_string(), "two".to_string()), mm("two")]
    );
}

#[test]
fn leaving_split_verify_drains_pending_exchanges() {
    let mut f = Fixture::in_mode(Mode::SplitVerify);
    f.transceiver.on_model_line("OK");
    f.take();

    assert_eq!(f.transceiver.set_mode(Mode::WardModel), Mode::WardModel);
    assert_eq!(
        f.take(),
        vec![Entry::Cancelled(TimerHandle(3)), Entry::Timeout("OK".to_string()), mm("OK")]
    );
    assert!(f.transceiver.pending_exchanges().is_empty());
    assert_eq!(f.transceiver.stats().drained, 1);
}

#[test]
fn draining_into_ward_model_leaves_answer_to_the_model() {
    let mut f = Fixture::in_mode(Mode::SplitVerify);
    f.transceiver.on_modem_manager_line("AT+CSQ");
    f.transceiver.on_modem_line("+CSQ: 20,99");
    f.take();

    f.transceiver.set_mode(Mode::WardModel);
    assert!(f.take().is_empty());
    assert!(f.transceiver.pending_exchanges().is_empty());

    f.transceiver.on_model_line("+CSQ: 18,99");
    assert_eq!(f.take(), vec![mm("+CSQ: 18,99")]);
}

#[test]
fn modem_first_exchange_is_answered_once_after_switch_to_pass_through() {
    let mut f = Fixture::in_mode(Mode::SplitVerify);
    f.transceiver.on_modem_manager_line("AT+CSQ");
    f.transceiver.on_modem_line("+CSQ: 20,99");
    f.take();

    f.transceiver.set_mode(Mode::PassThrough);
    assert_eq!(f.take(), vec![mm("+CSQ: 20,99")]);

    // The model's late answer has no listener in pass-through.
    f.transceiver.on_model_line("+CSQ: 20,99");
    assert!(f.take().is_empty());
    assert_eq!(f.transceiver.stats().sent_to_modem_manager, 1);
}

#[test]
fn model_first_exchange_is_answered_once_after_switch_to_pass_through() {
    let mut f = Fixture::in_mode(Mode::SplitVerify);
    f.transceiver.on_modem_manager_line("AT+CSQ");
    f.transceiver.on_model_line("+CSQ: 20,99");
    f.take();

    f.transceiver.set_mode(Mode::PassThrough);
    assert_eq!(
        f.take(),
        vec![
            Entry::Cancelled(TimerHandle(3)),
            Entry::Timeout("+CSQ: 20,99".to_string()),
            mm("+CSQ: 20,99"),
        ]
    );

    // The modem's late answer belongs to the drained exchange.
    f.transceiver.on_modem_line("+CSQ: 20,99");
    assert!(f.take().is_empty());
    assert_eq!(f.transceiver.stats().late_modem_lines, 1);

    f.transceiver.on_modem_manager_line("AT+CGMI");
    f.transceiver.on_modem_line("Fibocom");
    assert_eq!(f.take(), vec![Entry::ToModem("AT+CGMI".to_string()), mm("Fibocom")]);
}

#[test]
fn reentering_split_verify_forgets_owed_modem_lines() {
    let mut f = Fixture::in_mode(Mode::SplitVerify);
    f.transceiver.on_model_line("OK");
    f.transceiver.set_mode(Mode::PassThrough);
    f.transceiver.set_mode(Mode::SplitVerify);
    f.take();

    f.transceiver.on_modem_line("OK");
    assert!(f.take().is_empty());
    assert_eq!(f.transceiver.pending_exchanges().len(), 1);
    assert_eq!(f.transceiver.stats().late_modem_lines, 0);
}

#[test]
fn reselecting_current_mode_keeps_pending_exchanges() {
    let mut f = Fixture::in_mode(Mode::SplitVerify);
    f.transceiver.on_model_line("OK");
    f.take();

    f.transceiver.set_mode(Mode::SplitVerify);
    assert!(f.take().is_empty());
    assert_eq!(f.transceiver.pending_exchanges().len(), 1);
}

#[test]
fn failed_send_does_not_stop_processing() {
    let mut f = Fixture::build(true, true);
    f.transceiver.set_mode(Mode::SplitVerify);

    f.transceiver.on_modem_line("AT+modem");
    f.transceiver.on_model_line("AT+ward");
    f.transceiver.on_model_line("OK");

    assert_eq!(f.transceiver.stats().send_failures, 1);
    assert_eq!(f.transceiver.stats().mismatched, 1);
    assert_eq!(f.transceiver.pending_exchanges().len(), 1);
}
