use crate::channel;
use crate::clock;
use crate::flag;
use crate::log;
use crate::packet;
use crate::registers;
use crate::transport;
use crate::types;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum State {
    Disarmed,
    Armed,
    DataReady,
    Downloading,
    /// The last download returned nothing or the transport failed.
    Error,
}

impl std::fmt::Display for State {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disarmed => write!(formatter, "disarmed"),
            Self::Armed => write!(formatter, "armed"),
            Self::DataReady => write!(formatter, "data ready"),
            Self::Downloading => write!(formatter, "downloading"),
            Self::Error => write!(formatter, "error"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Polling {
    pub interval: std::time::Duration,
    /// `None` waits indefinitely.
    pub timeout: Option<std::time::Duration>,
}

impl Default for Polling {
    fn default() -> Self {
        Self {
            interval: std::time::Duration::from_millis(50),
            timeout: None,
        }
    }
}

/// Why the wait for data ended. The download proceeds in every case.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Wait {
    Ready,
    Aborted,
    TimedOut,
}

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("{operation} is not allowed while {state}")]
    InvalidState {
        operation: &'static str,
        state: State,
    },

    #[error("the board returned no image data after {attempts} attempts")]
    EmptyPayload { attempts: usize },

    #[error(transparent)]
    Registers(#[from] registers::Error),

    #[error(transparent)]
    Transport(#[from] transport::Error),
}

/// Registers read to clear the latched status bits.
pub const STATUS_SOURCES: [&str; 2] = ["STAT_REG_SRC", "STAT_REG2_SRC"];

pub fn trigger_messages(mode: types::TriggerMode) -> Vec<registers::Message> {
    let messages: &[(&'static str, u32)] = match mode {
        types::TriggerMode::Software => &[
            ("HW_TRIG_EN", 0),
            ("DUAL_EDGE_TRIG_EN", 0),
            ("SW_TRIG_EN", 1),
            ("SW_TRIG_START", 1),
        ],
        types::TriggerMode::Dual => &[
            ("SW_TRIG_EN", 0),
            ("HW_TRIG_EN", 1),
            ("DUAL_EDGE_TRIG_EN", 1),
        ],
        types::TriggerMode::Hardware => &[
            ("DUAL_EDGE_TRIG_EN", 0),
            ("SW_TRIG_EN", 0),
            ("HW_TRIG_EN", 1),
        ],
    };
    messages
        .iter()
        .map(|(name, value)| registers::Message::new(*name, *value))
        .collect()
}

/// Reads the status source registers, which clears their latched bits.
pub fn clear_status<Device: registers::Bus>(
    registers: &mut registers::Registers<Device>,
) -> Result<(), registers::Error> {
    for name in STATUS_SOURCES {
        registers.get_register(name)?;
    }
    Ok(())
}

/// Arm, wait, download and disarm sequencing.
///
/// `abort_handle` may be raised from another thread; only the wait loop
/// checks it. Arming clears any earlier request.
pub struct Controller<Time: clock::Clock> {
    state: State,
    abort: flag::Flag,
    polling: Polling,
    clock: Time,
    span: tracing::Span,
}

impl<Time: clock::Clock> Controller<Time> {
    pub fn new(polling: Polling, clock: Time, context: &log::Context) -> Self {
        Self {
            state: State::Disarmed,
            abort: flag::Flag::new(),
            polling,
            clock,
            span: context.span("acquisition"),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn polling(&self) -> &Polling {
        &self.polling
    }

    pub fn set_polling(&mut self, polling: Polling) {
        self.polling = polling;
    }

    pub fn abort_handle(&self) -> flag::Flag {
        self.abort.clone()
    }

    fn transition(&mut self, state: State) {
        if self.state != state {
            let _entered = self.span.enter();
            tracing::info!(from = %self.state, to = %state, "state");
            self.state = state;
        }
    }

    /// Clears status, latches pots, enables the ADCs and the timing mode, then
    /// enables the trigger source.
    pub fn arm<Device: registers::Bus>(
        &mut self,
        registers: &mut registers::Registers<Device>,
        latch: &[registers::Message],
        manual_timing: bool,
        mode: types::TriggerMode,
    ) -> Result<(), Error> {
        self.abort.clear();
        clear_status(registers)?;
        registers.submit(latch)?;
        let mut messages = vec![
            registers::Message::new("ADC_CTL", 0xf),
            registers::Message::new(
                if manual_timing {
                    "MANSHUT_MODE"
                } else {
                    "HST_MODE"
                },
                1,
            ),
        ];
        messages.extend(trigger_messages(mode));
        registers.submit(&messages)?;
        {
            let _entered = self.span.enter();
            tracing::debug!(%mode, manual_timing, "trigger enabled");
        }
        self.transition(State::Armed);
        Ok(())
    }

    /// Polls `SRAM_READY` until it is set, the abort flag is raised or the timeout
    /// elapses. Read failures are logged and polling continues.
    pub fn wait_for_data<Device: registers::Bus>(
        &mut self,
        registers: &mut registers::Registers<Device>,
    ) -> Result<Wait, Error> {
        if self.state != State::Armed {
            return Err(Error::InvalidState {
                operation: "waiting for data",
                state: self.state,
            });
        }
        let start = self.clock.now();
        let wait = loop {
            match registers.get_subregister("SRAM_READY") {
                Ok(0) => (),
                Ok(_) => break Wait::Ready,
                Err(error) => {
                    let _entered = self.span.enter();
                    tracing::error!(%error, "status read failed while waiting for data");
                }
            }
            if self.abort.take() {
                break Wait::Aborted;
            }
            if let Some(timeout) = self.polling.timeout {
                if self.clock.now().duration_since(start) > timeout {
                    let _entered = self.span.enter();
                    tracing::warn!(?timeout, "data not ready, proceeding with download");
                    break Wait::TimedOut;
                }
            }
            self.clock.sleep(self.polling.interval);
        };
        self.transition(State::DataReady);
        Ok(wait)
    }

    /// Starts the SRAM readout and collects the payload.
    pub fn read_bulk<Link, LinkTime>(
        &mut self,
        registers: &mut registers::Registers<transport::Transport<Link, LinkTime>>,
        expected_payload_bytes: usize,
        policy: &transport::RetryPolicy,
    ) -> Result<transport::Readout, Error>
    where
        Link: channel::Channel,
        LinkTime: clock::Clock,
    {
        if self.state != State::DataReady {
            return Err(Error::InvalidState {
                operation: "reading image data",
                state: self.state,
            });
        }
        self.transition(State::Downloading);
        let result = registers
            .splice_subregister("READ_SRAM", 1)
            .map_err(Error::from)
            .and_then(|(address, value)| {
                let transport = registers.bus_mut();
                let timeout = transport.timeouts().bulk;
                transport
                    .send_receive_bulk(
                        &packet::Single::write(address, value),
                        expected_payload_bytes,
                        timeout,
                        policy,
                    )
                    .map_err(Error::from)
            });
        match result {
            Ok(readout) if readout.outcome == transport::PayloadOutcome::Empty => {
                self.transition(State::Error);
                Err(Error::EmptyPayload {
                    attempts: readout.attempts,
                })
            }
            Ok(readout) => {
                {
                    let _entered = self.span.enter();
                    tracing::info!(
                        bytes = readout.byte_count,
                        outcome = ?readout.outcome,
                        "download complete"
                    );
                }
                self.transition(State::Disarmed);
                Ok(readout)
            }
            Err(error) => {
                self.transition(State::Error);
                Err(error)
            }
        }
    }

    /// Leaves any state. The controller is disarmed even if the writes fail.
    pub fn disarm<Device: registers::Bus>(
        &mut self,
        registers: &mut registers::Registers<Device>,
    ) -> Result<(), Error> {
        self.transition(State::Disarmed);
        clear_status(registers)?;
        registers.submit(&[
            registers::Message::new("HW_TRIG_EN", 0),
            registers::Message::new("DUAL_EDGE_TRIG_EN", 0),
            registers::Message::new("SW_TRIG_EN", 0),
        ])?;
        Ok(())
    }
}
