#![allow(dead_code)]

use nscamera_drivers::channel;
use nscamera_drivers::clock;
use nscamera_drivers::packet;

/// `SRAM_CTL` on both boards; writing bit 0 starts an image download.
pub const SRAM_CTL: u16 = 0x03b;

pub const STAT_REG: u16 = 0x024;

/// LLNL v4 board with an Icarus sensor, RS422 link.
pub const FPGA_NUM_V4_ICARUS: u32 = 0x8400_0101;

/// Board emulator: a register file behind the wire protocol.
///
/// Reads answer with the stored value, writes store it. A write that sets bit 0
/// of `SRAM_CTL` answers with the next scripted bulk response (nothing if the
/// script is empty).
#[derive(Debug, Default)]
pub struct Board {
    pub memory: std::collections::HashMap<u16, u32>,
    pub writes: Vec<(u16, u32)>,
    pub reads: Vec<u16>,
    pub bulk_responses: std::collections::VecDeque<Vec<u8>>,
    pub bulk_requests: usize,
    /// Number of upcoming requests left unanswered.
    pub silent_requests: usize,
    /// Data field of write acknowledgements (bit 0 CRC error, bit 1 not executed).
    pub write_status: u32,
    pub analog_loop: Option<AnalogLoop>,
    /// `Unchecked` behaves like the GigE bridge: no CRC on requests or responses.
    pub framing: packet::Framing,
    pending: Vec<u8>,
}

/// Feeds the 16-bit pot in the low half of `pot` back to the 12-bit monitor in
/// bits 23..12 of `monitor`, scaled by `gain` (1.0 reads full scale at full scale).
#[derive(Debug, Copy, Clone)]
pub struct AnalogLoop {
    pub pot: u16,
    pub monitor: u16,
    pub gain: f64,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_register(mut self, address: u16, value: u32) -> Self {
        self.memory.insert(address, value);
        self
    }

    pub fn value(&self, address: u16) -> u32 {
        self.memory.get(&address).copied().unwrap_or(0)
    }

    pub fn written(&self, address: u16) -> Vec<u32> {
        self.writes
            .iter()
            .filter(|(written_address, _)| *written_address == address)
            .map(|(_, value)| *value)
            .collect()
    }

    fn respond(&mut self, command: packet::Command, address: u16, data: u32) {
        let response = packet::Single::new(command, address, data);
        self.pending.extend(self.framing.encode_single(&response));
    }
}

impl channel::Channel for Board {
    fn write(&mut self, bytes: &[u8], _timeout: std::time::Duration) -> Result<(), channel::Error> {
        if bytes.len() != self.framing.single_length() {
            return Err(channel::Error::Closed);
        }
        let request = self
            .framing
            .decode_single(bytes)
            .map_err(|_| channel::Error::Closed)?;
        if self.silent_requests > 0 {
            self.silent_requests -= 1;
            return Ok(());
        }
        match request.command() {
            packet::Command::Read => {
                self.reads.push(request.address());
                let value = self.value(request.address());
                self.respond(packet::Command::ReadResponse, request.address(), value);
            }
            packet::Command::Write => {
                self.writes.push((request.address(), request.data()));
                if request.address() == SRAM_CTL && request.data() & 1 == 1 {
                    self.bulk_requests += 1;
                    if let Some(response) = self.bulk_responses.pop_front() {
                        self.pending.extend(response);
                    }
                } else {
                    if self.write_status == 0 {
                        self.memory.insert(request.address(), request.data());
                        if let Some(analog_loop) = self.analog_loop {
                            if analog_loop.pot == request.address() {
                                let pot = f64::from(request.data() & 0xffff) / 65535.0;
                                let code = (pot * analog_loop.gain * 4095.0).round() as u32;
                                self.memory.insert(analog_loop.monitor, (code & 0xfff) << 12);
                            }
                        }
                    }
                    let status = self.write_status;
                    self.respond(packet::Command::WriteResponse, request.address(), status);
                }
            }
            _ => return Err(channel::Error::Closed),
        }
        Ok(())
    }

    fn read(
        &mut self,
        length: usize,
        _timeout: std::time::Duration,
    ) -> Result<Vec<u8>, channel::Error> {
        let length = length.min(self.pending.len());
        Ok(self.pending.drain(..length).collect())
    }

    fn clear(&mut self) -> Result<(), channel::Error> {
        self.pending.clear();
        Ok(())
    }

    fn framing(&self) -> packet::Framing {
        self.framing
    }
}

/// Acknowledgement of the `SRAM_CTL` write followed by a bulk frame carrying `payload`.
pub fn bulk_response(payload: &[u8]) -> Vec<u8> {
    let mut raw =
        packet::encode_single(&packet::Single::new(packet::Command::WriteResponse, SRAM_CTL, 0))
            .to_vec();
    raw.extend(packet::encode(&packet::Packet::Bulk(packet::Bulk::new(
        packet::Command::ReadResponse,
        0,
        0,
        payload.to_vec(),
    ))));
    raw
}

/// `bulk_response` as the GigE bridge delivers it, without either CRC.
pub fn unchecked_bulk_response(payload: &[u8]) -> Vec<u8> {
    let checked = bulk_response(payload);
    let mut raw = checked[..packet::SINGLE_LENGTH - packet::CRC_LENGTH].to_vec();
    raw.extend_from_slice(&checked[packet::SINGLE_LENGTH..checked.len() - packet::CRC_LENGTH]);
    raw
}

/// Clock that advances only when slept on.
#[derive(Debug, Clone)]
pub struct FakeClock {
    start: std::time::Instant,
    elapsed: std::sync::Arc<std::sync::Mutex<std::time::Duration>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
            elapsed: std::sync::Arc::new(std::sync::Mutex::new(std::time::Duration::ZERO)),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        *self.elapsed.lock().unwrap()
    }
}

impl clock::Clock for FakeClock {
    fn now(&self) -> std::time::Instant {
        self.start + self.elapsed()
    }

    fn sleep(&self, duration: std::time::Duration) {
        *self.elapsed.lock().unwrap() += duration;
    }
}
