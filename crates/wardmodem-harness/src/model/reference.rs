//! Reference transceiver.
//!
//! Two plain FIFO queues, one per response source. Whenever both are
//! non-empty their heads are paired; a timeout pops the oldest model
//! response while the modem queue is empty. A mode change flushes both
//! queues and remembers how many modem answers are still owed to flushed
//! exchanges. No ids, no timers, nothing clever: it should be obviously
//! correct.

use std::collections::VecDeque;

use wardmodem_core::Mode;

use super::operation::{Observation, Operation};

/// The reference model of the transceiver.
#[derive(Debug, Clone)]
pub struct ModelTransceiver {
    mode: Mode,
    has_modem: bool,
    modem_responses: VecDeque<String>,
    model_responses: VecDeque<String>,
    owed_modem_lines: usize,
}

impl ModelTransceiver {
    /// Reference transceiver, with or without a physical modem.
    pub fn new(has_modem: bool) -> Self {
        Self {
            mode: Mode::WardModel,
            has_modem,
            modem_responses: VecDeque::new(),
            model_responses: VecDeque::new(),
            owed_modem_lines: 0,
        }
    }

    /// Current mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Exchanges awaiting their second response.
    pub fn pending(&self) -> usize {
        self.modem_responses.len() + self.model_responses.len()
    }

    /// Apply an operation and return what it made observable.
    pub fn apply(&mut self, op: &Operation) -> Vec<Observation> {
        let mut out = Vec::new();
        match op {
            Operation::Command(line) => {
                let line = line.text().to_string();
                match self.mode {
                    Mode::WardModel => out.push(Observation::ToModel(line)),
                    Mode::PassThrough => out.push(Observation::ToModem(line)),
                    Mode::SplitVerify => {
                        out.push(Observation::ToModem(line.clone()));
                        out.push(Observation::ToModel(line));
                    },
                }
            },
            Operation::ModemLine(line) => match self.mode {
                Mode::WardModel | Mode::PassThrough if self.owed_modem_lines > 0 => {
                    self.owed_modem_lines -= 1;
                },
                Mode::WardModel => {},
                Mode::PassThrough => out.push(Observation::ToModemManager(line.text().to_string())),
                Mode::SplitVerify => {
                    self.modem_responses.push_back(line.text().to_string());
                    self.pair(&mut out);
                },
            },
            Operation::ModelLine(line) => match self.mode {
                Mode::WardModel => out.push(Observation::ToModemManager(line.text().to_string())),
                Mode::PassThrough => {},
                Mode::SplitVerify => {
                    self.model_responses.push_back(line.text().to_string());
                    self.pair(&mut out);
                },
            },
            Operation::FireOldestTimer => {
                if self.modem_responses.is_empty() {
                    if let Some(model) = self.model_responses.pop_front() {
                        out.push(Observation::Timeout(model.clone()));
                        out.push(Observation::ToModemManager(model));
                    }
                }
            },
            Operation::FireStaleTimer => {},
            Operation::SetMode(choice) => {
                let mode = Mode::from(*choice);
                if (mode.requires_modem() && !self.has_modem) || mode == self.mode {
                    return out;
                }
                for model in self.model_responses.drain(..) {
                    self.owed_modem_lines += 1;
                    out.push(Observation::Timeout(model.clone()));
                    out.push(Observation::ToModemManager(model));
                }
                for modem in self.modem_responses.drain(..) {
                    if mode == Mode::PassThrough {
                        out.push(Observation::ToModemManager(modem));
                    }
                }
                if mode == Mode::SplitVerify {
                    self.owed_modem_lines = 0;
                }
                self.mode = mode;
            },
        }
        out
    }

    fn pair(&mut self, out: &mut Vec<Observation>) {
        while !self.modem_responses.is_empty() && !self.model_responses.is_empty() {
            let (Some(modem), Some(model)) =
                (self.modem_responses.pop_front(), self.model_responses.pop_front())
            else {
                break;
            };
            if modem != model {
                out.push(Observation::Mismatch(modem, model.clone()));
            }
            out.push(Observation::ToModemManager(model));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::operation::{ModeChoice, SmallLine};

    #[test]
    fn pairs_heads_in_order() {
        let mut model = ModelTransceiver::new(true);
        model.apply(&Operation::SetMode(ModeChoice::SplitVerify));

        assert!(model.apply(&Operation::ModelLine(SmallLine(0))).is_empty());
        assert!(model.apply(&Operation::ModelLine(SmallLine(1))).is_empty());
        assert_eq!(model.apply(&Operation::ModemLine(SmallLine(0))), vec![
            Observation::ToModemManager("OK".to_string())
        ]);
        assert_eq!(model.apply(&Operation::ModemLine(SmallLine(0))), vec![
            Observation::Mismatch("OK".to_string(), "ERROR".to_string()),
            Observation::ToModemManager("ERROR".to_string()),
        ]);
        assert_eq!(model.pending(), 0);
    }

    #[test]
    fn switch_to_pass_through_answers_each_command_once() {
        let mut model = ModelTransceiver::new(true);
        model.apply(&Operation::SetMode(ModeChoice::SplitVerify));
        model.apply(&Operation::ModelLine(SmallLine(0)));

        assert_eq!(model.apply(&Operation::SetMode(ModeChoice::PassThrough)), vec![
            Observation::Timeout("OK".to_string()),
            Observation::ToModemManager("OK".to_string()),
        ]);
        assert!(model.apply(&Operation::ModemLine(SmallLine(0))).is_empty());
        assert_eq!(model.apply(&Operation::ModemLine(SmallLine(1))), vec![
            Observation::ToModemManager("ERROR".to_string())
        ]);
    }

    #[test]
    fn no_modem_pins_ward_model() {
        let mut model = ModelTransceiver::new(false);
        model.apply(&Operation::SetMode(ModeChoice::PassThrough));
        assert_eq!(model.mode(), Mode::WardModel);
    }
}
