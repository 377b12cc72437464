pub const PREAMBLE: u16 = 0xaaaa;

/// Preamble, command and address, data, CRC.
pub const SINGLE_LENGTH: usize = 10;

/// Preamble, 16-bit command field (command, sub-command, reserved byte),
/// sequence id, payload length.
pub const BULK_HEADER_LENGTH: usize = 8;

pub const CRC_LENGTH: usize = 2;

pub const BULK_OVERHEAD: usize = BULK_HEADER_LENGTH + CRC_LENGTH;

const CRC: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_XMODEM);

pub fn checksum(bytes: &[u8]) -> u16 {
    CRC.checksum(bytes)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Command {
    Write,
    Read,
    WriteResponse,
    ReadResponse,
    Other(u8),
}

impl Command {
    pub fn from_nibble(nibble: u8) -> Self {
        match nibble & 0xf {
            0x0 => Self::Write,
            0x1 => Self::Read,
            0x8 => Self::WriteResponse,
            0x9 => Self::ReadResponse,
            nibble => Self::Other(nibble),
        }
    }

    pub fn nibble(self) -> u8 {
        match self {
            Self::Write => 0x0,
            Self::Read => 0x1,
            Self::WriteResponse => 0x8,
            Self::ReadResponse => 0x9,
            Self::Other(nibble) => nibble & 0xf,
        }
    }

    /// The board answers a request with the request's command plus 8.
    pub fn response(self) -> Self {
        Self::from_nibble(self.nibble().wrapping_add(8))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Shape {
    Single,
    Bulk,
}

/// Frame layout on a link. RS422 carries a CRC on every frame; the GigE bridge
/// strips it in both directions and relies on TCP for integrity.
#[derive(
    Debug, Default, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum Framing {
    #[default]
    Checked,
    Unchecked,
}

impl Framing {
    pub fn crc_length(self) -> usize {
        match self {
            Self::Checked => CRC_LENGTH,
            Self::Unchecked => 0,
        }
    }

    /// Length of a request or a single-register response.
    pub fn single_length(self) -> usize {
        SINGLE_LENGTH - CRC_LENGTH + self.crc_length()
    }

    /// Offset of the payload in a bulk response (acknowledgement, then bulk header).
    pub fn payload_offset(self) -> usize {
        self.single_length() + BULK_HEADER_LENGTH
    }

    /// Bytes around the payload in a bulk response.
    pub fn bulk_overhead(self) -> usize {
        self.payload_offset() + self.crc_length()
    }

    pub fn encode_single(self, single: &Single) -> Vec<u8> {
        encode_single(single)[..self.single_length()].to_vec()
    }

    /// Decodes a single-register frame. Unchecked frames get their CRC
    /// recomputed, so they never report a mismatch.
    pub fn decode_single(self, frame: &[u8]) -> Result<Single, Error> {
        let length = self.single_length();
        if frame.len() < length {
            return Err(Error::Truncated {
                expected: length,
                read: frame.len(),
            });
        }
        let packet = match self {
            Self::Checked => decode(frame, Shape::Single),
            Self::Unchecked => {
                let mut checked = frame[..length].to_vec();
                checked.extend_from_slice(&checksum(&checked[2..]).to_be_bytes());
                decode(&checked, Shape::Single)
            }
        };
        packet.map(|packet| match packet {
            Packet::Single(single) => single,
            Packet::Bulk(_) => unreachable!("a single-shape decode yields a single packet"),
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WriteStatus {
    pub checksum_error: bool,
    pub not_executed: bool,
}

impl WriteStatus {
    pub fn is_ok(&self) -> bool {
        !self.checksum_error && !self.not_executed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Single {
    command: Command,
    address: u16,
    data: u32,
    crc: u16,
}

impl Single {
    pub fn new(command: Command, address: u16, data: u32) -> Self {
        let mut packet = Self {
            command,
            address: address & 0xfff,
            data,
            crc: 0,
        };
        packet.crc = checksum(&packet.fields());
        packet
    }

    pub fn read(address: u16) -> Self {
        Self::new(Command::Read, address, 0)
    }

    pub fn write(address: u16, data: u32) -> Self {
        Self::new(Command::Write, address, data)
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn data(&self) -> u32 {
        self.data
    }

    pub fn crc(&self) -> u16 {
        self.crc
    }

    /// Status bits carried by a write response.
    pub fn status(&self) -> WriteStatus {
        WriteStatus {
            checksum_error: self.data & 0b01 != 0,
            not_executed: self.data & 0b10 != 0,
        }
    }

    fn fields(&self) -> [u8; 6] {
        let data = self.data.to_be_bytes();
        [
            (self.command.nibble() << 4) | ((self.address >> 8) as u8 & 0xf),
            (self.address & 0xff) as u8,
            data[0],
            data[1],
            data[2],
            data[3],
        ]
    }
}

impl std::fmt::Display for Single {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", to_hex(&encode_single(self)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bulk {
    command: Command,
    sub_command: u8,
    reserved: u8,
    sequence_id: u16,
    payload_length: u16,
    payload: Vec<u8>,
    crc: u16,
}

impl Bulk {
    pub fn new(command: Command, sub_command: u8, sequence_id: u16, payload: Vec<u8>) -> Self {
        let mut packet = Self {
            command,
            sub_command: sub_command & 0xf,
            reserved: 0,
            sequence_id,
            payload_length: (payload.len() & 0xffff) as u16,
            payload,
            crc: 0,
        };
        packet.crc = checksum(&packet.fields());
        packet
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn sub_command(&self) -> u8 {
        self.sub_command
    }

    /// Low byte of the command field, zero in frames sent by current firmware.
    pub fn reserved(&self) -> u8 {
        self.reserved
    }

    pub fn sequence_id(&self) -> u16 {
        self.sequence_id
    }

    /// The length field as sent on the wire (16 bits, wraps for large payloads).
    pub fn payload_length(&self) -> u16 {
        self.payload_length
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    pub fn crc(&self) -> u16 {
        self.crc
    }

    fn fields(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(BULK_HEADER_LENGTH - 2 + self.payload.len());
        bytes.push((self.command.nibble() << 4) | self.sub_command);
        bytes.push(self.reserved);
        bytes.extend_from_slice(&self.sequence_id.to_be_bytes());
        bytes.extend_from_slice(&self.payload_length.to_be_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Single(Single),
    Bulk(Bulk),
}

impl Packet {
    pub fn crc(&self) -> u16 {
        match self {
            Self::Single(single) => single.crc(),
            Self::Bulk(bulk) => bulk.crc(),
        }
    }

    pub fn into_single(self) -> Option<Single> {
        match self {
            Self::Single(single) => Some(single),
            Self::Bulk(_) => None,
        }
    }

    pub fn into_bulk(self) -> Option<Bulk> {
        match self {
            Self::Single(_) => None,
            Self::Bulk(bulk) => Some(bulk),
        }
    }
}

impl From<Single> for Packet {
    fn from(single: Single) -> Self {
        Self::Single(single)
    }
}

impl From<Bulk> for Packet {
    fn from(bulk: Bulk) -> Self {
        Self::Bulk(bulk)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("truncated frame ({read} bytes read, at least {expected} expected)")]
    Truncated { expected: usize, read: usize },

    #[error("unexpected preamble {0:#06x}")]
    Preamble(u16),

    #[error("CRC mismatch (received {received:#06x}, computed {computed:#06x})")]
    CrcMismatch {
        packet: Box<Packet>,
        received: u16,
        computed: u16,
    },

    #[error("invalid hexadecimal frame \"{0}\"")]
    Hex(String),
}

pub fn encode(packet: &Packet) -> Vec<u8> {
    match packet {
        Packet::Single(single) => encode_single(single).to_vec(),
        Packet::Bulk(bulk) => {
            let fields = bulk.fields();
            let mut bytes = Vec::with_capacity(fields.len() + 4);
            bytes.extend_from_slice(&PREAMBLE.to_be_bytes());
            bytes.extend_from_slice(&fields);
            bytes.extend_from_slice(&bulk.crc.to_be_bytes());
            bytes
        }
    }
}

pub fn encode_single(single: &Single) -> [u8; SINGLE_LENGTH] {
    let fields = single.fields();
    let crc = single.crc.to_be_bytes();
    [
        (PREAMBLE >> 8) as u8,
        (PREAMBLE & 0xff) as u8,
        fields[0],
        fields[1],
        fields[2],
        fields[3],
        fields[4],
        fields[5],
        crc[0],
        crc[1],
    ]
}

/// Parses a frame of the given shape. Bytes past a single frame's fixed length
/// are ignored; a bulk frame's payload runs from the end of its header to the CRC.
pub fn decode(frame: &[u8], shape: Shape) -> Result<Packet, Error> {
    let minimum = match shape {
        Shape::Single => SINGLE_LENGTH,
        Shape::Bulk => BULK_OVERHEAD,
    };
    if frame.len() < minimum {
        return Err(Error::Truncated {
            expected: minimum,
            read: frame.len(),
        });
    }
    let preamble = u16::from_be_bytes([frame[0], frame[1]]);
    if preamble != PREAMBLE {
        return Err(Error::Preamble(preamble));
    }
    let frame = match shape {
        Shape::Single => &frame[..SINGLE_LENGTH],
        Shape::Bulk => frame,
    };
    let received = u16::from_be_bytes([frame[frame.len() - 2], frame[frame.len() - 1]]);
    let computed = checksum(&frame[2..frame.len() - 2]);
    let packet: Packet = match shape {
        Shape::Single => Single {
            command: Command::from_nibble(frame[2] >> 4),
            address: (u16::from(frame[2] & 0xf) << 8) | u16::from(frame[3]),
            data: u32::from_be_bytes([frame[4], frame[5], frame[6], frame[7]]),
            crc: received,
        }
        .into(),
        Shape::Bulk => Bulk {
            command: Command::from_nibble(frame[2] >> 4),
            sub_command: frame[2] & 0xf,
            reserved: frame[3],
            sequence_id: u16::from_be_bytes([frame[4], frame[5]]),
            payload_length: u16::from_be_bytes([frame[6], frame[7]]),
            payload: frame[BULK_HEADER_LENGTH..frame.len() - CRC_LENGTH].to_vec(),
            crc: received,
        }
        .into(),
    };
    if received == computed {
        Ok(packet)
    } else {
        Err(Error::CrcMismatch {
            packet: Box::new(packet),
            received,
            computed,
        })
    }
}

/// Checks the trailing CRC of a complete frame (the preamble is not covered).
pub fn verify_crc(frame: &[u8]) -> bool {
    if frame.len() < 2 + CRC_LENGTH {
        return false;
    }
    let end = frame.len() - CRC_LENGTH;
    checksum(&frame[2..end]) == u16::from_be_bytes([frame[end], frame[end + 1]])
}

pub fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(
        String::with_capacity(bytes.len() * 2),
        |mut result, byte| {
            // unwrap: writing to a String does not fail
            write!(result, "{byte:02x}").unwrap();
            result
        },
    )
}

pub fn from_hex(string: &str) -> Result<Vec<u8>, Error> {
    let digits = string.as_bytes();
    if digits.len() % 2 != 0 || !digits.iter().all(u8::is_ascii_hexdigit) {
        return Err(Error::Hex(string.to_owned()));
    }
    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| Error::Hex(string.to_owned()))
        })
        .collect()
}
