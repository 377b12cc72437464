use crate::channel;
use crate::clock;
use crate::log;
use crate::packet;

#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Timeouts {
    pub write: std::time::Duration,
    pub single: std::time::Duration,
    pub bulk: std::time::Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            write: std::time::Duration::from_secs(1),
            single: std::time::Duration::from_secs(1),
            bulk: std::time::Duration::from_secs(60),
        }
    }
}

/// Degradation levels of a bulk read, worst first.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum PayloadOutcome {
    /// Nothing arrived.
    Empty,
    /// Fewer bytes than expected arrived; the payload was zero-padded.
    Truncated,
    /// More bytes than expected arrived; the raw response should be dumped.
    WrongSize,
    /// The write acknowledgement preceding the payload failed its CRC.
    PrefaceCrcFailed,
    /// The acknowledgement is valid but the payload frame failed its CRC.
    PayloadCrcFailed,
    Ok,
}

#[derive(Debug, Clone)]
pub struct Attempt {
    pub number: usize,
    pub outcome: PayloadOutcome,
    pub raw: Vec<u8>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub settle: std::time::Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            settle: std::time::Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Ranks by outcome, then by the number of bytes received. Later attempts win ties.
    pub fn keep_best(best: Option<Attempt>, candidate: Attempt) -> Attempt {
        match best {
            Some(best)
                if (best.outcome, best.raw.len()) > (candidate.outcome, candidate.raw.len()) =>
            {
                best
            }
            _ => candidate,
        }
    }
}

/// Result of a bulk read. `payload` always holds exactly the expected number of
/// bytes; `byte_count` tells how many of them came from the wire.
#[derive(Debug, Clone)]
pub struct Readout {
    pub payload: Vec<u8>,
    pub byte_count: usize,
    pub outcome: PayloadOutcome,
    pub raw: Vec<u8>,
    pub attempts: usize,
}

impl Readout {
    fn new(attempt: Attempt, expected_payload_bytes: usize, framing: packet::Framing) -> Self {
        let start = framing.payload_offset();
        let end = attempt.raw.len().min(start + expected_payload_bytes);
        let mut payload = if end > start {
            attempt.raw[start..end].to_vec()
        } else {
            Vec::new()
        };
        let byte_count = payload.len();
        payload.resize(expected_payload_bytes, 0);
        let outcome = if byte_count < expected_payload_bytes
            && attempt.outcome != PayloadOutcome::Empty
        {
            PayloadOutcome::Truncated
        } else {
            attempt.outcome
        };
        Self {
            payload,
            byte_count,
            outcome,
            raw: attempt.raw,
            attempts: attempt.number,
        }
    }
}

/// Classifies a raw bulk response: write acknowledgement, then the bulk frame.
/// Unchecked responses are judged on their size alone.
pub fn classify(
    raw: &[u8],
    expected_payload_bytes: usize,
    framing: packet::Framing,
) -> PayloadOutcome {
    let total = framing.bulk_overhead() + expected_payload_bytes;
    let preface = framing.single_length();
    if raw.is_empty() {
        PayloadOutcome::Empty
    } else if raw.len() < total {
        PayloadOutcome::Truncated
    } else if raw.len() > total {
        PayloadOutcome::WrongSize
    } else if framing == packet::Framing::Unchecked {
        PayloadOutcome::Ok
    } else if !packet::verify_crc(&raw[..preface]) {
        PayloadOutcome::PrefaceCrcFailed
    } else if !packet::verify_crc(&raw[preface..]) {
        PayloadOutcome::PayloadCrcFailed
    } else {
        PayloadOutcome::Ok
    }
}

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error(transparent)]
    Channel(channel::Error),

    #[error("timed out waiting for a response")]
    Timeout,

    #[error("channel closed")]
    ChannelClosed,

    #[error(transparent)]
    Decode(#[from] packet::Error),

    #[error("unexpected response command (expected {expected:?}, received {received:?})")]
    UnexpectedCommand {
        expected: packet::Command,
        received: packet::Command,
    },

    #[error("response address mismatch (expected {expected:#05x}, received {received:#05x})")]
    AddressMismatch { expected: u16, received: u16 },

    #[error("write to {address:#05x} rejected ({status:?})")]
    Rejected {
        address: u16,
        status: packet::WriteStatus,
    },
}

impl From<channel::Error> for Error {
    fn from(error: channel::Error) -> Self {
        match error {
            channel::Error::Closed => Self::ChannelClosed,
            channel::Error::Timeout => Self::Timeout,
            error => Self::Channel(error),
        }
    }
}

pub struct Transport<Link, Time = clock::SystemClock>
where
    Link: channel::Channel,
    Time: clock::Clock,
{
    channel: Link,
    clock: Time,
    timeouts: Timeouts,
    span: tracing::Span,
}

impl<Link, Time> Transport<Link, Time>
where
    Link: channel::Channel,
    Time: clock::Clock,
{
    pub fn new(channel: Link, clock: Time, timeouts: Timeouts, context: &log::Context) -> Self {
        Self {
            channel,
            clock,
            timeouts,
            span: context.span("transport"),
        }
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    pub fn clock(&self) -> &Time {
        &self.clock
    }

    pub fn channel(&self) -> &Link {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut Link {
        &mut self.channel
    }

    pub fn into_channel(self) -> Link {
        self.channel
    }

    /// Sends one request and validates the echoed command, address and write status.
    /// A response with a bad CRC is still returned, with a warning.
    pub fn send_receive_single(
        &mut self,
        request: &packet::Single,
        timeout: std::time::Duration,
    ) -> Result<packet::Single, Error> {
        let _entered = self.span.enter();
        let framing = self.channel.framing();
        self.channel.clear()?;
        self.channel
            .write(&framing.encode_single(request), self.timeouts.write)?;
        let bytes = self.channel.read(framing.single_length(), timeout)?;
        if bytes.is_empty() {
            tracing::error!(request = %request, "no response");
            return Err(Error::Timeout);
        }
        let response = match framing.decode_single(&bytes) {
            Ok(response) => response,
            Err(packet::Error::CrcMismatch {
                packet: decoded,
                received,
                computed,
            }) => {
                tracing::warn!(
                    request = %request,
                    response = %packet::to_hex(&bytes),
                    received,
                    computed,
                    "response CRC mismatch"
                );
                match *decoded {
                    packet::Packet::Single(response) => response,
                    packet::Packet::Bulk(_) => {
                        unreachable!("a single-shape decode yields a single packet")
                    }
                }
            }
            Err(error) => {
                tracing::error!(request = %request, response = %packet::to_hex(&bytes), %error);
                return Err(error.into());
            }
        };
        tracing::debug!(request = %request, response = %response);
        if response.command() != request.command().response() {
            return Err(Error::UnexpectedCommand {
                expected: request.command().response(),
                received: response.command(),
            });
        }
        if response.address() != request.address() {
            return Err(Error::AddressMismatch {
                expected: request.address(),
                received: response.address(),
            });
        }
        if request.command() == packet::Command::Write && !response.status().is_ok() {
            return Err(Error::Rejected {
                address: request.address(),
                status: response.status(),
            });
        }
        Ok(response)
    }

    pub fn read_register(&mut self, address: u16) -> Result<u32, Error> {
        let timeout = self.timeouts.single;
        Ok(self
            .send_receive_single(&packet::Single::read(address), timeout)?
            .data())
    }

    pub fn write_register(&mut self, address: u16, value: u32) -> Result<(), Error> {
        let timeout = self.timeouts.single;
        self.send_receive_single(&packet::Single::write(address, value), timeout)?;
        Ok(())
    }

    /// Sends the request that starts an image download and collects the response,
    /// retrying per `policy` and keeping the best attempt.
    ///
    /// Degraded downloads are reported through `Readout::outcome`; only channel
    /// failures are errors.
    pub fn send_receive_bulk(
        &mut self,
        request: &packet::Single,
        expected_payload_bytes: usize,
        timeout: std::time::Duration,
        policy: &RetryPolicy,
    ) -> Result<Readout, Error> {
        let _entered = self.span.enter();
        let framing = self.channel.framing();
        let frame = framing.encode_single(request);
        let total = framing.bulk_overhead() + expected_payload_bytes;
        let attempts = policy.max_attempts.max(1);
        self.channel.clear()?;
        self.channel.write(&frame, self.timeouts.write)?;
        tracing::debug!(request = %request, expected = total, "bulk read requested");
        let mut best = None;
        for number in 1..=attempts {
            let raw = self.channel.read(total, timeout)?;
            let outcome = classify(&raw, expected_payload_bytes, framing);
            if outcome == PayloadOutcome::Ok {
                tracing::debug!(attempt = number, received = raw.len(), "bulk read complete");
                return Ok(Readout::new(
                    Attempt {
                        number,
                        outcome,
                        raw,
                    },
                    expected_payload_bytes,
                    framing,
                ));
            }
            tracing::warn!(
                attempt = number,
                attempts,
                outcome = ?outcome,
                received = raw.len(),
                expected = total,
                "bulk read degraded"
            );
            best = Some(RetryPolicy::keep_best(
                best,
                Attempt {
                    number,
                    outcome,
                    raw,
                },
            ));
            self.clock.sleep(policy.settle);
            if number < attempts {
                self.channel.clear()?;
                self.channel.write(&frame, self.timeouts.write)?;
            }
        }
        let best = best.unwrap_or(Attempt {
            number: attempts,
            outcome: PayloadOutcome::Empty,
            raw: Vec::new(),
        });
        let readout = Readout::new(best, expected_payload_bytes, framing);
        match readout.outcome {
            PayloadOutcome::Empty => {
                tracing::error!(attempts, "bulk read returned no data")
            }
            PayloadOutcome::Truncated => tracing::warn!(
                received = readout.byte_count,
                expected = expected_payload_bytes,
                "payload zero-padded to the expected size"
            ),
            outcome => tracing::warn!(
                outcome = ?outcome,
                attempt = readout.attempts,
                "keeping suspect payload"
            ),
        }
        Ok(readout)
    }
}
