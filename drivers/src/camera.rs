use crate::acquisition;
use crate::boards;
use crate::channel;
use crate::clock;
use crate::configuration;
use crate::device;
use crate::flag;
use crate::registers;
use crate::sensors;
use crate::sensors::daedalus;
use crate::timing;
use crate::transport;
use crate::tuner;
use crate::types;

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error(transparent)]
    Channel(#[from] channel::Error),

    #[error(transparent)]
    Transport(#[from] transport::Error),

    #[error(transparent)]
    Registers(#[from] registers::Error),

    #[error(transparent)]
    Timing(#[from] timing::Error),

    #[error(transparent)]
    Tuner(#[from] tuner::Error),

    #[error(transparent)]
    Acquisition(#[from] acquisition::Error),

    #[error(transparent)]
    Readout(#[from] daedalus::Error),

    #[error("selection {0:?} ends before it starts")]
    EmptyRegion(types::Region),

    #[error("frames {requested:?} are outside the sensor range {allowed:?}")]
    FrameRange {
        requested: types::Region,
        allowed: types::Region,
    },

    #[error("rows {requested:?} are outside the sensor range {allowed:?}")]
    RowRange {
        requested: types::Region,
        allowed: types::Region,
    },

    #[error("{sensor} does not support {feature}")]
    Unsupported {
        sensor: &'static str,
        feature: &'static str,
    },
}

/// One board and sensor pair behind one link.
///
/// The camera must be the only writer of its board (subregister writes are
/// read-modify-write). Only `abort_handle` may be used from another thread.
pub struct Camera<Link, Time = clock::SystemClock>
where
    Link: channel::Channel,
    Time: clock::Clock,
{
    board: boards::Type,
    sensor: sensors::Type,
    registers: registers::Registers<transport::Transport<Link, Time>>,
    controller: acquisition::Controller<Time>,
    tuner: tuner::Tuner<Time>,
    tuning: tuner::Tuning,
    retry: transport::RetryPolicy,
    frames: types::Region,
    rows: types::Region,
    timing: timing::TimingMode,
    modes: daedalus::Modes,
    span: tracing::Span,
}

impl Camera<channel::Interface, clock::SystemClock> {
    /// Opens the configured link. The board is not touched until `initialize`.
    pub fn open(configuration: &configuration::Configuration) -> Result<Self, Error> {
        let interface = configuration
            .interface
            .open(configuration.timeouts.single)?;
        Self::new(interface, clock::SystemClock, configuration)
    }
}

impl<Link, Time> Camera<Link, Time>
where
    Link: channel::Channel,
    Time: clock::Clock,
{
    pub fn new(
        channel: Link,
        clock: Time,
        configuration: &configuration::Configuration,
    ) -> Result<Self, Error> {
        let board = configuration.board;
        let sensor = configuration.sensor;
        let context = &configuration.log;
        let mut map = board.register_map(sensor.properties().family)?;
        sensor.extend_register_map(&mut map, board.properties())?;
        let transport =
            transport::Transport::new(channel, clock.clone(), configuration.timeouts, context);
        let camera = Self {
            board,
            sensor,
            registers: registers::Registers::new(map, transport, context),
            controller: acquisition::Controller::new(configuration.polling, clock.clone(), context),
            tuner: tuner::Tuner::new(clock, configuration.tuning.settle, context),
            tuning: configuration.tuning,
            retry: configuration.retry,
            frames: sensor.properties().frames,
            rows: sensor.properties().rows(),
            timing: timing::TimingMode::default(),
            modes: daedalus::Modes::default(),
            span: context.span("camera"),
        };
        tracing::info!(
            parent: &camera.span,
            board = %board,
            sensor = %sensor,
            "camera assembled"
        );
        Ok(camera)
    }

    pub fn board(&self) -> boards::Type {
        self.board
    }

    pub fn sensor(&self) -> sensors::Type {
        self.sensor
    }

    pub fn registers(&self) -> &registers::Registers<transport::Transport<Link, Time>> {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut registers::Registers<transport::Transport<Link, Time>> {
        &mut self.registers
    }

    pub fn into_channel(self) -> Link {
        self.registers.into_bus().into_channel()
    }

    /// Confirms communication, then loads the board, sensor and oscillator
    /// defaults. Frame and row selection, timing and readout modes are reset.
    pub fn initialize(&mut self) -> Result<device::BoardInfo, Error> {
        let raw = match self.registers.get_register("FPGA_NUM") {
            Ok(raw) => raw,
            Err(error) => {
                tracing::warn!(parent: &self.span, %error, "no answer from the board, retrying");
                self.registers.get_register("FPGA_NUM").map_err(|error| {
                    tracing::error!(parent: &self.span, %error, "unable to communicate with the board");
                    error
                })?
            }
        };
        let info = device::BoardInfo::new(raw, self.registers.get_register("FPGA_REV")?);
        self.check_board_info(&info);

        acquisition::clear_status(&mut self.registers)?;
        self.registers.submit(&self.board.init_messages())?;
        let detect = self.sensor.detect_subregister();
        if self.registers.map().contains_subregister(detect) {
            match self.registers.get_subregister(detect) {
                Ok(0) => tracing::error!(parent: &self.span, sensor = %self.sensor, "sensor not detected"),
                Ok(_) => (),
                Err(error) => {
                    tracing::error!(parent: &self.span, %error, "unable to confirm the sensor status")
                }
            }
        }
        self.registers
            .submit(&self.sensor.init_messages(self.board.properties()))?;
        self.registers.submit(&device::oscillator_messages())?;

        self.frames = self.sensor.properties().frames;
        self.rows = self.sensor.properties().rows();
        self.timing = timing::TimingMode::default();
        self.modes = daedalus::Modes::default();
        tracing::info!(parent: &self.span, %info, "initialized");
        Ok(info)
    }

    /// Initializes again and replays the timing configuration in force.
    pub fn reinitialize(&mut self) -> Result<device::BoardInfo, Error> {
        tracing::info!(parent: &self.span, "reinitializing");
        let timing = self.timing.clone();
        let info = self.initialize()?;
        match timing {
            timing::TimingMode::HighSpeed { a, b } => {
                for (side, request) in [(types::Side::A, a), (types::Side::B, b)] {
                    match request {
                        Some(timing::Request::Paired(paired)) => {
                            self.set_timing(Some(side), paired)?;
                        }
                        Some(timing::Request::Arbitrary(intervals)) => {
                            self.set_arbitrary_timing(Some(side), &intervals)?;
                        }
                        None => (),
                    }
                }
            }
            timing::TimingMode::Manual(nanoseconds) => self.set_manual_timing(&nanoseconds)?,
        }
        Ok(info)
    }

    pub fn board_info(&mut self) -> Result<device::BoardInfo, Error> {
        let raw = self.registers.get_register("FPGA_NUM")?;
        let revision = self.registers.get_register("FPGA_REV")?;
        let info = device::BoardInfo::new(raw, revision);
        self.check_board_info(&info);
        Ok(info)
    }

    fn check_board_info(&self, info: &device::BoardInfo) {
        if !info.valid {
            tracing::warn!(parent: &self.span, %info, "FPGA self-identification is invalid");
        } else if info.raw != device::BoardInfo::LEGACY {
            if info.version != self.board.properties().version {
                tracing::warn!(parent: &self.span, %info, board = %self.board, "board version mismatch");
            }
            if info.sensor_id != self.sensor.properties().fpga_id {
                tracing::warn!(parent: &self.span, %info, sensor = %self.sensor, "firmware built for another sensor");
            }
        }
    }

    pub fn get_register(&mut self, name: &str) -> Result<u32, Error> {
        Ok(self.registers.get_register(name)?)
    }

    pub fn set_register(&mut self, name: &str, value: u32) -> Result<(), Error> {
        Ok(self.registers.set_register(name, value)?)
    }

    pub fn get_subregister(&mut self, name: &str) -> Result<u32, Error> {
        Ok(self.registers.get_subregister(name)?)
    }

    pub fn set_subregister(&mut self, name: &str, value: u32) -> Result<(), Error> {
        Ok(self.registers.set_subregister(name, value)?)
    }

    pub fn submit(&mut self, messages: &[registers::Message]) -> Result<(), Error> {
        Ok(self.registers.submit(messages)?)
    }

    /// Reads every register of the map, in name order.
    pub fn dump_registers(&mut self) -> Result<Vec<(String, u16, u32)>, Error> {
        let registers: Vec<(String, u16)> = self
            .registers
            .map()
            .registers()
            .map(|(name, address)| (name.to_owned(), address))
            .collect();
        let mut dump = Vec::with_capacity(registers.len());
        for (name, address) in registers {
            let value = self.registers.get_register(&name)?;
            dump.push((name, address, value));
        }
        Ok(dump)
    }

    pub fn get_pot(&mut self, name: &str) -> Result<f64, Error> {
        Ok(self.registers.get_pot(name)?)
    }

    pub fn set_pot(&mut self, name: &str, value: f64) -> Result<(), Error> {
        Ok(self
            .registers
            .set_pot(name, value, &self.board.properties().analog)?)
    }

    pub fn get_pot_voltage(&mut self, name: &str) -> Result<f64, Error> {
        Ok(self.registers.get_pot_voltage(name)?)
    }

    /// Sets a pot to `volts` (clamped to its range) and returns the normalized
    /// setting left on the board.
    ///
    /// With tuning enabled and a monitor available, the setting is corrected
    /// until the monitor reads `volts`. Otherwise the calibration is trusted.
    pub fn set_pot_voltage(&mut self, name: &str, volts: f64) -> Result<f64, Error> {
        let analog = &self.board.properties().analog;
        let monitor = self.registers.map().monitor_for(name);
        let monitor = match monitor {
            Some(monitor) if self.tuning.enabled => monitor,
            _ => return Ok(self.registers.set_pot_voltage(name, volts, analog)?),
        };
        let subregister = self.registers.map().subregister(name)?;
        let calibration = subregister
            .calibration
            .clone()
            .ok_or_else(|| registers::Error::Uncalibrated(name.to_owned()))?;
        let target = tuner::Target::new(
            subregister.name(),
            volts.clamp(calibration.min_volt, calibration.max_volt),
            subregister.max_value(),
            &self.tuning,
        );
        let result = {
            let registers = std::cell::RefCell::new(&mut self.registers);
            self.tuner.tune(
                |setting| registers.borrow_mut().set_pot(name, setting, analog),
                || registers.borrow_mut().monitor_voltage(&monitor, analog),
                &target,
            )
        };
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(error @ tuner::Error::Unresponsive { .. }) => {
                tracing::warn!(
                    parent: &self.span,
                    pot = name,
                    %error,
                    "tuning unavailable, using the calibration"
                );
                return Ok(self.registers.set_pot_voltage(name, volts, analog)?);
            }
            Err(error) => return Err(error.into()),
        };
        tracing::info!(
            parent: &self.span,
            pot = name,
            target = target.target,
            measured = outcome.measured,
            iterations = outcome.iterations,
            "pot tuned"
        );
        Ok(outcome.setting)
    }

    pub fn monitor_voltage(&mut self, name: &str) -> Result<f64, Error> {
        Ok(self
            .registers
            .monitor_voltage(name, &self.board.properties().analog)?)
    }

    pub fn frames(&self) -> types::Region {
        self.frames
    }

    pub fn rows(&self) -> types::Region {
        self.rows
    }

    /// Shape of the next download.
    pub fn geometry(&self) -> types::FrameGeometry {
        let properties = self.sensor.properties();
        types::FrameGeometry {
            frames: self.frames.len(),
            rows: self.rows.len(),
            columns: properties.width,
            bytes_per_pixel: properties.bytes_per_pixel,
        }
    }

    pub fn set_frames(&mut self, frames: types::Region) -> Result<(), Error> {
        if frames.is_empty() {
            return Err(Error::EmptyRegion(frames));
        }
        let allowed = self.sensor.properties().frames;
        if !allowed.contains(&frames) {
            return Err(Error::FrameRange {
                requested: frames,
                allowed,
            });
        }
        self.registers.submit(&[
            registers::Message::new("FPA_FRAME_INITIAL", frames.first),
            registers::Message::new("FPA_FRAME_FINAL", frames.last),
        ])?;
        self.frames = frames;
        tracing::info!(parent: &self.span, first = frames.first, last = frames.last, "frames selected");
        Ok(())
    }

    pub fn set_rows(&mut self, rows: types::Region) -> Result<(), Error> {
        if rows.is_empty() {
            return Err(Error::EmptyRegion(rows));
        }
        let allowed = self.sensor.properties().rows();
        if !allowed.contains(&rows) {
            return Err(Error::RowRange {
                requested: rows,
                allowed,
            });
        }
        self.registers.submit(&[
            registers::Message::new("FPA_ROW_INITIAL", rows.first),
            registers::Message::new("FPA_ROW_FINAL", rows.last),
        ])?;
        self.rows = rows;
        tracing::info!(parent: &self.span, first = rows.first, last = rows.last, "rows selected");
        Ok(())
    }

    pub fn compiler(&self) -> timing::Compiler {
        self.sensor.compiler(self.frames.len())
    }

    pub fn timing_mode(&self) -> &timing::TimingMode {
        &self.timing
    }

    fn apply_compiled(
        &mut self,
        side: Option<types::Side>,
        compiled: &timing::Compiled,
        request: timing::Request,
    ) -> Result<(), Error> {
        let sides = match side {
            Some(side) => vec![side],
            None => types::Side::BOTH.to_vec(),
        };
        let mut messages = Vec::with_capacity(6);
        for side in &sides {
            messages.extend(compiled.messages(*side));
        }
        messages.extend(device::timing_mode_messages(false));
        self.registers.submit(&messages)?;
        for side in sides {
            self.timing.record(side, request.clone());
        }
        tracing::info!(
            parent: &self.span,
            field = %compiled.field,
            repeats = compiled.repeats,
            "high-speed timing set"
        );
        Ok(())
    }

    /// Programs paired timing on `side` (both if `None`). An invalid request
    /// leaves the board and the recorded timing untouched.
    pub fn set_timing(
        &mut self,
        side: Option<types::Side>,
        request: timing::Paired,
    ) -> Result<timing::Compiled, Error> {
        let compiled = self.compiler().compile_paired(request)?;
        self.apply_compiled(side, &compiled, timing::Request::Paired(request))?;
        Ok(compiled)
    }

    /// Programs alternating closed and open intervals, delay first.
    pub fn set_arbitrary_timing(
        &mut self,
        side: Option<types::Side>,
        intervals: &[u32],
    ) -> Result<timing::Compiled, Error> {
        let compiled = self.compiler().compile_arbitrary(intervals);
        self.apply_compiled(side, &compiled, timing::Request::Arbitrary(intervals.to_vec()))?;
        Ok(compiled)
    }

    fn timing_field(&mut self, side: types::Side) -> Result<timing::BitField40, Error> {
        let (low, high) = match side {
            types::Side::A => ("HS_TIMING_DATA_ALO", "HS_TIMING_DATA_AHI"),
            types::Side::B => ("HS_TIMING_DATA_BLO", "HS_TIMING_DATA_BHI"),
        };
        let low = self.registers.get_register(low)?;
        let high = self.registers.get_register(high)?;
        Ok(timing::BitField40::from_registers(low, high))
    }

    /// Paired request that matches the timing registers of `side`.
    pub fn timing(&mut self, side: types::Side) -> Result<timing::Paired, Error> {
        let field = self.timing_field(side)?;
        Ok(self.compiler().decompile_settings(field))
    }

    /// Intervals the sensor will play on `side`, delay first.
    pub fn actual_timing(&mut self, side: types::Side) -> Result<Vec<u32>, Error> {
        let field = self.timing_field(side)?;
        Ok(self.compiler().decompile_actual(field))
    }

    /// Switches to manual shutters with the given intervals, in nanoseconds.
    pub fn set_manual_timing(&mut self, nanoseconds: &[u64]) -> Result<(), Error> {
        let mut messages = self.compiler().manual_messages(nanoseconds)?;
        messages.extend(device::timing_mode_messages(true));
        self.registers.submit(&messages)?;
        self.timing = timing::TimingMode::Manual(nanoseconds.to_vec());
        tracing::info!(parent: &self.span, timing = ?nanoseconds, "manual timing set");
        Ok(())
    }

    /// Manual shutter intervals held by the board, in nanoseconds.
    pub fn manual_timing(&mut self) -> Result<Vec<u64>, Error> {
        let mut counts = Vec::new();
        for name in self.sensor.properties().family.manual_registers() {
            counts.push(self.registers.get_register(name)?);
        }
        Ok(timing::Compiler::manual_nanoseconds(&counts))
    }

    pub fn state(&self) -> acquisition::State {
        self.controller.state()
    }

    pub fn set_polling(&mut self, polling: acquisition::Polling) {
        self.controller.set_polling(polling);
    }

    /// Raising the returned flag ends the current wait for data.
    pub fn abort_handle(&self) -> flag::Flag {
        self.controller.abort_handle()
    }

    pub fn arm(&mut self, mode: types::TriggerMode) -> Result<(), Error> {
        let latch = self.board.latch_messages();
        Ok(self
            .controller
            .arm(&mut self.registers, &latch, self.timing.is_manual(), mode)?)
    }

    pub fn wait_for_data(&mut self) -> Result<acquisition::Wait, Error> {
        Ok(self.controller.wait_for_data(&mut self.registers)?)
    }

    /// Downloads the frames selected by `set_frames` and `set_rows`.
    pub fn read_bulk(&mut self) -> Result<transport::Readout, Error> {
        let expected = self.geometry().payload_bytes();
        Ok(self
            .controller
            .read_bulk(&mut self.registers, expected, &self.retry)?)
    }

    /// Waits for data, then downloads it.
    pub fn readoff(&mut self) -> Result<(acquisition::Wait, transport::Readout), Error> {
        let wait = self.wait_for_data()?;
        let readout = self.read_bulk()?;
        Ok((wait, readout))
    }

    pub fn disarm(&mut self) -> Result<(), Error> {
        Ok(self.controller.disarm(&mut self.registers)?)
    }

    pub fn status(&mut self) -> Result<u32, Error> {
        Ok(self.registers.get_register("STAT_REG")?)
    }

    pub fn status2(&mut self) -> Result<u32, Error> {
        Ok(self.registers.get_register("STAT_REG2")?)
    }

    pub fn timer(&mut self) -> Result<u32, Error> {
        Ok(self.registers.get_register("TIMER_VALUE")?)
    }

    pub fn reset_timer(&mut self) -> Result<(), Error> {
        Ok(self.registers.submit(&[
            registers::Message::new("RESET_TIMER", 1),
            registers::Message::new("RESET_TIMER", 0),
        ])?)
    }

    /// Boards without user LEDs ignore the request.
    pub fn set_led(&mut self, led: u8, on: bool) -> Result<(), Error> {
        let messages = self.board.led_messages(led, on);
        if messages.is_empty() {
            tracing::debug!(parent: &self.span, led, board = %self.board, "no such LED");
        }
        Ok(self.registers.submit(&messages)?)
    }

    pub fn set_power_save(&mut self, enable: bool) -> Result<(), Error> {
        Ok(self
            .registers
            .set_subregister("POWERSAVE", u32::from(enable))?)
    }

    pub fn select_oscillator(&mut self, oscillator: device::Oscillator) -> Result<(), Error> {
        let code = self
            .sensor
            .oscillator_code(oscillator)
            .ok_or(Error::Unsupported {
                sensor: self.sensor.name(),
                feature: "this oscillator",
            })?;
        self.registers.set_subregister("OSC_SELECT", code)?;
        tracing::info!(parent: &self.span, %oscillator, "oscillator selected");
        Ok(())
    }

    pub fn readout_modes(&self) -> daedalus::Modes {
        self.modes
    }

    fn require_daedalus(&self, feature: &'static str) -> Result<(), Error> {
        if self.sensor.properties().family == timing::Family::Daedalus {
            Ok(())
        } else {
            Err(Error::Unsupported {
                sensor: self.sensor.name(),
                feature,
            })
        }
    }

    fn apply_modes(
        &mut self,
        (modes, messages): (daedalus::Modes, Vec<registers::Message>),
    ) -> Result<(), Error> {
        self.registers.submit(&messages)?;
        self.modes = modes;
        tracing::info!(parent: &self.span, modes = ?self.modes, "readout modes");
        Ok(())
    }

    pub fn set_interlacing(&mut self, factor: u32, side: Option<types::Side>) -> Result<(), Error> {
        self.require_daedalus("interlacing")?;
        let plan = self.modes.interlacing(factor, side)?;
        self.apply_modes(plan)
    }

    pub fn set_high_full_well(&mut self, enable: bool) -> Result<(), Error> {
        self.require_daedalus("high full well mode")?;
        let plan = self.modes.high_full_well(enable);
        self.apply_modes(plan)
    }

    pub fn set_zero_dead_time(
        &mut self,
        enable: bool,
        side: Option<types::Side>,
    ) -> Result<(), Error> {
        self.require_daedalus("zero dead time mode")?;
        let plan = self.modes.zero_dead_time(enable, side);
        self.apply_modes(plan)
    }

    /// Returns the delay applied, in nanoseconds.
    pub fn set_trigger_delay(&mut self, nanoseconds: f64) -> Result<f64, Error> {
        self.require_daedalus("trigger delay")?;
        let (messages, applied) = daedalus::trigger_delay_messages(nanoseconds)?;
        self.registers.submit(&messages)?;
        tracing::info!(parent: &self.span, applied, "trigger delay set");
        Ok(applied)
    }

    /// Returns the delay applied, in nanoseconds.
    pub fn set_phi_delay(
        &mut self,
        nanoseconds: f64,
        side: Option<types::Side>,
    ) -> Result<f64, Error> {
        self.require_daedalus("phi delay")?;
        let (messages, applied) = daedalus::phi_delay_messages(nanoseconds, side)?;
        self.registers.submit(&messages)?;
        tracing::info!(parent: &self.span, applied, "phi delay set");
        Ok(applied)
    }

    /// Drives the sensor from the external phi clock at `frequency` Hz.
    pub fn set_external_clock(&mut self, frequency: f64) -> Result<(), Error> {
        self.require_daedalus("external clock")?;
        let messages = daedalus::external_clock_messages(frequency)?;
        self.select_oscillator(device::Oscillator::External)?;
        Ok(self.registers.submit(&messages)?)
    }
}
