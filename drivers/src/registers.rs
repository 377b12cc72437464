use crate::channel;
use crate::clock;
use crate::log;
use crate::transport;

/// Static subregister table entry. `start_bit` is the most significant bit of
/// the field (a field `[7..0]` has `start_bit` 7).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: &'static str,
    pub register: &'static str,
    pub start_bit: u8,
    pub width: u8,
    pub writable: bool,
}

macro_rules! subregisters {
    (@writable rw) => {
        true
    };
    (@writable ro) => {
        false
    };
    ($($name:literal => $register:literal [$start_bit:literal; $width:literal] $access:ident),* $(,)?) => {
        &[$(
            {
                const _: () = assert!(
                    $width >= 1 && $width <= 32 && $start_bit < 32 && $start_bit + 1 >= $width
                );
                $crate::registers::Entry {
                    name: $name,
                    register: $register,
                    start_bit: $start_bit,
                    width: $width,
                    writable: $crate::registers::subregisters!(@writable $access),
                }
            }
        ),*]
    };
}

pub(crate) use subregisters;

#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub min_volt: f64,
    pub max_volt: f64,
    pub resolution: f64,
}

impl Calibration {
    pub fn new(min_volt: f64, max_volt: f64, max_value: u32) -> Self {
        Self {
            min_volt,
            max_volt,
            resolution: (max_volt - min_volt) / f64::from(max_value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subregister {
    name: String,
    register: String,
    start_bit: u8,
    width: u8,
    writable: bool,
    pub calibration: Option<Calibration>,
}

impl Subregister {
    pub fn new(
        name: &str,
        register: &str,
        start_bit: u8,
        width: u8,
        writable: bool,
    ) -> Result<Self, Error> {
        if width == 0 || width > 32 || start_bit > 31 || start_bit + 1 < width {
            return Err(Error::InvalidSubregister {
                name: name.to_owned(),
                start_bit,
                width,
            });
        }
        Ok(Self {
            name: name.to_ascii_uppercase(),
            register: register.to_ascii_uppercase(),
            start_bit,
            width,
            writable,
            calibration: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn register(&self) -> &str {
        &self.register
    }

    pub fn start_bit(&self) -> u8 {
        self.start_bit
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn writable(&self) -> bool {
        self.writable
    }

    pub fn max_value(&self) -> u32 {
        ((1u64 << self.width) - 1) as u32
    }

    /// Position of the field's least significant bit.
    pub fn offset(&self) -> u8 {
        self.start_bit + 1 - self.width
    }

    pub fn mask(&self) -> u32 {
        self.max_value() << self.offset()
    }

    pub fn extract(&self, register_value: u32) -> u32 {
        (register_value >> self.offset()) & self.max_value()
    }

    pub fn splice(&self, register_value: u32, value: u32) -> Result<u32, Error> {
        if value > self.max_value() {
            return Err(Error::ValueTooWide {
                name: self.name.clone(),
                value,
                max: self.max_value(),
            });
        }
        Ok((register_value & !self.mask()) | (value << self.offset()))
    }
}

impl TryFrom<&Entry> for Subregister {
    type Error = Error;

    fn try_from(entry: &Entry) -> Result<Self, Self::Error> {
        Subregister::new(
            entry.name,
            entry.register,
            entry.start_bit,
            entry.width,
            entry.writable,
        )
    }
}

/// Name lookup for one board and sensor pair. Names are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct RegisterMap {
    registers: std::collections::BTreeMap<String, u16>,
    subregisters: std::collections::BTreeMap<String, Subregister>,
    aliases: std::collections::BTreeMap<String, String>,
    monitors: std::collections::BTreeMap<String, String>,
}

impl RegisterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later entries replace earlier ones with the same name.
    pub fn insert_registers(&mut self, registers: &[(&str, u16)]) {
        for (name, address) in registers {
            self.registers
                .insert(name.to_ascii_uppercase(), address & 0xfff);
        }
    }

    /// Every entry's backing register must already be known.
    pub fn insert_subregisters(&mut self, entries: &[Entry]) -> Result<(), Error> {
        for entry in entries {
            let subregister = Subregister::try_from(entry)?;
            if !self.registers.contains_key(subregister.register()) {
                return Err(Error::UnknownRegister(subregister.register().to_owned()));
            }
            self.subregisters
                .insert(subregister.name().to_owned(), subregister);
        }
        Ok(())
    }

    pub fn insert_aliases(&mut self, aliases: &[(&str, &str)]) {
        for (alias, target) in aliases {
            self.aliases
                .insert(alias.to_ascii_uppercase(), target.to_ascii_uppercase());
        }
    }

    /// Pairs of (monitor subregister, control subregister).
    pub fn insert_monitors(&mut self, monitors: &[(&str, &str)]) {
        for (monitor, control) in monitors {
            self.monitors
                .insert(monitor.to_ascii_uppercase(), control.to_ascii_uppercase());
        }
    }

    /// Uppercases `name` and follows its alias, if any.
    pub fn resolve(&self, name: &str) -> String {
        let name = name.to_ascii_uppercase();
        match self.aliases.get(&name) {
            Some(target) => target.clone(),
            None => name,
        }
    }

    pub fn address(&self, name: &str) -> Result<u16, Error> {
        self.registers
            .get(&name.to_ascii_uppercase())
            .copied()
            .ok_or_else(|| Error::UnknownRegister(name.to_owned()))
    }

    pub fn subregister(&self, name: &str) -> Result<&Subregister, Error> {
        self.subregisters
            .get(&self.resolve(name))
            .ok_or_else(|| Error::UnknownSubregister(name.to_owned()))
    }

    pub fn subregister_mut(&mut self, name: &str) -> Result<&mut Subregister, Error> {
        let resolved = self.resolve(name);
        self.subregisters
            .get_mut(&resolved)
            .ok_or_else(|| Error::UnknownSubregister(name.to_owned()))
    }

    pub fn contains_register(&self, name: &str) -> bool {
        self.registers.contains_key(&name.to_ascii_uppercase())
    }

    pub fn contains_subregister(&self, name: &str) -> bool {
        self.subregisters.contains_key(&self.resolve(name))
    }

    /// Monitor subregister that reads back `name`, which may be a control, an alias
    /// or a monitor.
    pub fn monitor_for(&self, name: &str) -> Option<String> {
        let resolved = self.resolve(name);
        if self.monitors.contains_key(&resolved) {
            return Some(resolved);
        }
        self.monitors
            .iter()
            .find(|(_, control)| **control == resolved)
            .map(|(monitor, _)| monitor.clone())
    }

    pub fn control_for(&self, monitor: &str) -> Option<&str> {
        self.monitors
            .get(&self.resolve(monitor))
            .map(String::as_str)
    }

    pub fn registers(&self) -> impl Iterator<Item = (&str, u16)> {
        self.registers
            .iter()
            .map(|(name, address)| (name.as_str(), *address))
    }

    pub fn subregisters(&self) -> impl Iterator<Item = &Subregister> {
        self.subregisters.values()
    }
}

/// Register-level access to the board.
pub trait Bus {
    fn read(&mut self, address: u16) -> Result<u32, transport::Error>;

    fn write(&mut self, address: u16, value: u32) -> Result<(), transport::Error>;
}

impl<Link, Time> Bus for transport::Transport<Link, Time>
where
    Link: channel::Channel,
    Time: clock::Clock,
{
    fn read(&mut self, address: u16) -> Result<u32, transport::Error> {
        self.read_register(address)
    }

    fn write(&mut self, address: u16, value: u32) -> Result<(), transport::Error> {
        self.write_register(address, value)
    }
}

/// One write in a batch. `name` may designate a register or a subregister.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub name: std::borrow::Cow<'static, str>,
    pub value: u32,
}

impl Message {
    pub fn new<Name>(name: Name, value: u32) -> Self
    where
        Name: Into<std::borrow::Cow<'static, str>>,
    {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("unknown register \"{0}\"")]
    UnknownRegister(String),

    #[error("unknown subregister \"{0}\"")]
    UnknownSubregister(String),

    #[error("subregister \"{0}\" is read-only")]
    NotWritable(String),

    #[error("{value} does not fit in subregister \"{name}\" (maximum {max})")]
    ValueTooWide { name: String, value: u32, max: u32 },

    #[error("subregister \"{name}\" does not fit in a 32-bit register (start bit {start_bit}, width {width})")]
    InvalidSubregister {
        name: String,
        start_bit: u8,
        width: u8,
    },

    #[error("\"{0}\" is not a pot")]
    NotAPot(String),

    #[error("\"{0}\" has no monitor")]
    NoMonitor(String),

    #[error("\"{0}\" has no voltage calibration")]
    Uncalibrated(String),

    #[error(transparent)]
    Transport(#[from] transport::Error),
}

/// Named register and subregister access.
///
/// Subregister writes read the whole register, splice the field and write the
/// register back. The two steps are not atomic: a session must be the only
/// writer of its board.
pub struct Registers<Device: Bus> {
    map: RegisterMap,
    bus: Device,
    span: tracing::Span,
}

impl<Device: Bus> Registers<Device> {
    pub fn new(map: RegisterMap, bus: Device, context: &log::Context) -> Self {
        Self {
            map,
            bus,
            span: context.span("registers"),
        }
    }

    pub fn map(&self) -> &RegisterMap {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut RegisterMap {
        &mut self.map
    }

    pub fn bus(&self) -> &Device {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Device {
        &mut self.bus
    }

    pub fn into_bus(self) -> Device {
        self.bus
    }

    pub fn get_register(&mut self, name: &str) -> Result<u32, Error> {
        let address = self.map.address(name)?;
        let value = self.bus.read(address)?;
        let _entered = self.span.enter();
        tracing::trace!(register = name, address, value, "read");
        Ok(value)
    }

    pub fn set_register(&mut self, name: &str, value: u32) -> Result<(), Error> {
        let address = self.map.address(name)?;
        self.bus.write(address, value)?;
        let _entered = self.span.enter();
        tracing::debug!(register = name, address, value, "write");
        Ok(())
    }

    /// Reading a status subregister may clear its whole register on the board.
    pub fn get_subregister(&mut self, name: &str) -> Result<u32, Error> {
        let subregister = self.map.subregister(name)?;
        let address = self.map.address(subregister.register())?;
        let value = subregister.extract(self.bus.read(address)?);
        Ok(value)
    }

    pub fn set_subregister(&mut self, name: &str, value: u32) -> Result<(), Error> {
        let (address, register_value) = self.splice_subregister(name, value)?;
        self.bus.write(address, register_value)?;
        let _entered = self.span.enter();
        tracing::debug!(subregister = name, address, value, register_value, "write");
        Ok(())
    }

    /// Reads the register backing `name` and returns its address and the value
    /// it would hold with the field set to `value`, without writing it.
    pub fn splice_subregister(&mut self, name: &str, value: u32) -> Result<(u16, u32), Error> {
        let subregister = self.map.subregister(name)?;
        if !subregister.writable() {
            return Err(Error::NotWritable(subregister.name().to_owned()));
        }
        if value > subregister.max_value() {
            return Err(Error::ValueTooWide {
                name: subregister.name().to_owned(),
                value,
                max: subregister.max_value(),
            });
        }
        let address = self.map.address(subregister.register())?;
        let current = self.bus.read(address)?;
        Ok((address, subregister.splice(current, value)?))
    }

    /// Writes each message in order and stops at the first failure.
    pub fn submit(&mut self, messages: &[Message]) -> Result<(), Error> {
        for message in messages {
            if self.map.contains_register(&message.name) {
                self.set_register(&message.name, message.value)?;
            } else if self.map.contains_subregister(&message.name) {
                self.set_subregister(&message.name, message.value)?;
            } else {
                return Err(Error::UnknownRegister(message.name.to_string()));
            }
        }
        Ok(())
    }
}
