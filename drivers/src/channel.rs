use crate::packet;

/// Duplex byte stream to the board.
///
/// `read` returns at most `length` bytes; fewer (possibly none) when `timeout`
/// elapses first. A closed stream is an error.
pub trait Channel {
    fn write(&mut self, bytes: &[u8], timeout: std::time::Duration) -> Result<(), Error>;

    fn read(&mut self, length: usize, timeout: std::time::Duration) -> Result<Vec<u8>, Error>;

    /// Discards stale bytes before a new request.
    fn clear(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn framing(&self) -> packet::Framing {
        packet::Framing::Checked
    }
}

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("serial port error: {0}")]
    Serial(String),

    #[error(transparent)]
    Io(std::sync::Arc<std::io::Error>),

    #[error("write timed out")]
    Timeout,

    #[error("channel closed")]
    Closed,
}

impl From<serialport::Error> for Error {
    fn from(error: serialport::Error) -> Self {
        Self::Serial(error.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => Self::Timeout,
            std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::UnexpectedEof => Self::Closed,
            _ => Self::Io(std::sync::Arc::new(error)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Configuration {
    #[serde(rename = "rs422")]
    Rs422 { path: String, baud_rate: u32 },

    #[serde(rename = "gige")]
    GigE { address: std::net::SocketAddr },
}

impl Configuration {
    pub const DEFAULT_BAUD_RATE: u32 = 921600;

    pub fn rs422(path: &str) -> Self {
        Self::Rs422 {
            path: path.to_owned(),
            baud_rate: Self::DEFAULT_BAUD_RATE,
        }
    }

    pub fn deserialize_bincode(data: &[u8]) -> bincode::Result<Configuration> {
        bincode::deserialize(data)
    }

    pub fn open(&self, timeout: std::time::Duration) -> Result<Interface, Error> {
        Ok(match self {
            Self::Rs422 { path, baud_rate } => Interface::Rs422(Serial::open(path, *baud_rate)?),
            Self::GigE { address } => Interface::GigE(Tcp::connect(address, timeout)?),
        })
    }
}

pub enum Interface {
    Rs422(Serial),
    GigE(Tcp),
}

impl Interface {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rs422(_) => "rs422",
            Self::GigE(_) => "gige",
        }
    }
}

impl Channel for Interface {
    fn write(&mut self, bytes: &[u8], timeout: std::time::Duration) -> Result<(), Error> {
        match self {
            Self::Rs422(channel) => channel.write(bytes, timeout),
            Self::GigE(channel) => channel.write(bytes, timeout),
        }
    }

    fn read(&mut self, length: usize, timeout: std::time::Duration) -> Result<Vec<u8>, Error> {
        match self {
            Self::Rs422(channel) => channel.read(length, timeout),
            Self::GigE(channel) => channel.read(length, timeout),
        }
    }

    fn clear(&mut self) -> Result<(), Error> {
        match self {
            Self::Rs422(channel) => channel.clear(),
            Self::GigE(channel) => channel.clear(),
        }
    }

    fn framing(&self) -> packet::Framing {
        match self {
            Self::Rs422(channel) => channel.framing(),
            Self::GigE(channel) => channel.framing(),
        }
    }
}

/// RS422 link (8 data bits, odd parity, 1 stop bit).
pub struct Serial {
    port: Box<dyn serialport::SerialPort>,
}

impl Serial {
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, Error> {
        let port = serialport::new(path, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::Odd)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(std::time::Duration::from_millis(10))
            .open()?;
        Ok(Self { port })
    }
}

impl Channel for Serial {
    fn write(&mut self, bytes: &[u8], timeout: std::time::Duration) -> Result<(), Error> {
        self.port.set_timeout(timeout)?;
        std::io::Write::write_all(&mut self.port, bytes)?;
        std::io::Write::flush(&mut self.port)?;
        Ok(())
    }

    fn read(&mut self, length: usize, timeout: std::time::Duration) -> Result<Vec<u8>, Error> {
        read_until_deadline(&mut self.port, length, timeout, |port, timeout| {
            port.set_timeout(timeout).map_err(Error::from)
        })
    }

    fn clear(&mut self) -> Result<(), Error> {
        self.port.clear(serialport::ClearBuffer::All)?;
        Ok(())
    }
}

/// Gigabit Ethernet link, reached through an already-known socket address.
pub struct Tcp {
    stream: std::net::TcpStream,
}

impl Tcp {
    pub fn connect(
        address: &std::net::SocketAddr,
        timeout: std::time::Duration,
    ) -> Result<Self, Error> {
        let stream = std::net::TcpStream::connect_timeout(address, timeout)?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }
}

impl Channel for Tcp {
    fn write(&mut self, bytes: &[u8], timeout: std::time::Duration) -> Result<(), Error> {
        self.stream.set_write_timeout(Some(timeout))?;
        std::io::Write::write_all(&mut self.stream, bytes)?;
        Ok(())
    }

    fn read(&mut self, length: usize, timeout: std::time::Duration) -> Result<Vec<u8>, Error> {
        read_until_deadline(&mut self.stream, length, timeout, |stream, timeout| {
            stream.set_read_timeout(Some(timeout)).map_err(Error::from)
        })
    }

    fn clear(&mut self) -> Result<(), Error> {
        self.stream.set_nonblocking(true)?;
        let mut buffer = [0u8; 1024];
        let result = loop {
            match std::io::Read::read(&mut self.stream, &mut buffer) {
                Ok(0) => break Err(Error::Closed),
                Ok(_) => continue,
                Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => break Ok(()),
                Err(error) if error.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(error) => break Err(error.into()),
            }
        };
        self.stream.set_nonblocking(false)?;
        result
    }

    fn framing(&self) -> packet::Framing {
        packet::Framing::Unchecked
    }
}

fn read_until_deadline<Reader, SetTimeout>(
    reader: &mut Reader,
    length: usize,
    timeout: std::time::Duration,
    mut set_timeout: SetTimeout,
) -> Result<Vec<u8>, Error>
where
    Reader: std::io::Read,
    SetTimeout: FnMut(&mut Reader, std::time::Duration) -> Result<(), Error>,
{
    let deadline = std::time::Instant::now() + timeout;
    let mut buffer = vec![0u8; length];
    let mut read = 0;
    while read < length {
        let now = std::time::Instant::now();
        if now >= deadline {
            break;
        }
        set_timeout(reader, deadline - now)?;
        match reader.read(&mut buffer[read..]) {
            Ok(0) => {
                if read == 0 {
                    return Err(Error::Closed);
                }
                break;
            }
            Ok(count) => read += count,
            Err(error)
                if matches!(
                    error.kind(),
                    std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
                ) =>
            {
                break
            }
            Err(error) if error.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error.into()),
        }
    }
    buffer.truncate(read);
    Ok(buffer)
}
