use crate::registers;
use crate::types;

/// Number of ticks in a high-speed timing sequence. Bit 0 is the synchronization
/// bit and is always zero.
pub const FIELD_BITS: u32 = 40;

/// Duration of one manual shutter count.
pub const TICK_NANOSECONDS: u64 = 25;

pub const ICARUS_MANUAL_REGISTERS: [&str; 14] = [
    "W0_INTEGRATION",
    "W0_INTERFRAME",
    "W1_INTEGRATION",
    "W1_INTERFRAME",
    "W2_INTEGRATION",
    "W2_INTERFRAME",
    "W3_INTEGRATION",
    "W0_INTEGRATION_B",
    "W0_INTERFRAME_B",
    "W1_INTEGRATION_B",
    "W1_INTERFRAME_B",
    "W2_INTEGRATION_B",
    "W2_INTERFRAME_B",
    "W3_INTEGRATION_B",
];

pub const DAEDALUS_MANUAL_REGISTERS: [&str; 5] = [
    "EXT_PHI_CLK_SH0_ON",
    "EXT_PHI_CLK_SH0_OFF",
    "EXT_PHI_CLK_SH1_ON",
    "EXT_PHI_CLK_SH1_OFF",
    "EXT_PHI_CLK_SH2_ON",
];

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct BitField40(u64);

impl BitField40 {
    const MASK: u64 = (1 << FIELD_BITS) - 1;

    pub fn new(value: u64) -> Self {
        Self(value & Self::MASK)
    }

    /// Assembles a field from its two timing registers (`HI` holds the top 8 bits).
    pub fn from_registers(low: u32, high: u32) -> Self {
        Self::new((u64::from(high & 0xff) << 32) | u64::from(low))
    }

    pub fn value(self) -> u64 {
        self.0
    }

    pub fn low(self) -> u32 {
        (self.0 & 0xffff_ffff) as u32
    }

    pub fn high(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub fn bit(self, index: u32) -> bool {
        index < FIELD_BITS && (self.0 >> index) & 1 == 1
    }

    fn set(&mut self, index: u32) {
        if index < FIELD_BITS {
            self.0 |= 1 << index;
        }
    }

    /// Run lengths of the field read most significant bit first.
    fn runs(self, copies: usize) -> Vec<u32> {
        let mut runs = Vec::new();
        let mut previous = None;
        for _ in 0..copies {
            for index in (0..FIELD_BITS).rev() {
                let bit = self.bit(index);
                match runs.last_mut() {
                    Some(length) if previous == Some(bit) => *length += 1,
                    _ => runs.push(1),
                }
                previous = Some(bit);
            }
        }
        runs
    }
}

impl std::fmt::Display for BitField40 {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{:010x}", self.0)
    }
}

/// Register layout and manual shutter scheme shared by related sensors.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Family {
    Icarus,
    Daedalus,
}

impl Family {
    pub fn manual_registers(self) -> &'static [&'static str] {
        match self {
            Self::Icarus => &ICARUS_MANUAL_REGISTERS,
            Self::Daedalus => &DAEDALUS_MANUAL_REGISTERS,
        }
    }

    /// Accepted manual interval bounds, in nanoseconds.
    pub fn manual_range(self) -> (u64, u64) {
        match self {
            Self::Icarus => (75, TICK_NANOSECONDS << 30),
            Self::Daedalus => (TICK_NANOSECONDS, TICK_NANOSECONDS * u64::from(u32::MAX)),
        }
    }
}

/// High-speed timing behaviour of a sensor model.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Model {
    /// Icarus model 1: the field is filled with repeats and only the middle two
    /// frames are imaged.
    Icarus,
    /// Repeats are capped at the selected frame count.
    Icarus2,
    /// The field is filled with repeats.
    Daedalus,
}

impl Model {
    pub fn family(self) -> Family {
        match self {
            Self::Icarus | Self::Icarus2 => Family::Icarus,
            Self::Daedalus => Family::Daedalus,
        }
    }

    /// Repeats stop at the selected frame count instead of filling the field.
    pub fn capped(self) -> bool {
        self == Self::Icarus2
    }

    /// Number of intervals (delay included) the hardware plays back.
    pub fn played_intervals(self) -> usize {
        match self {
            Self::Icarus | Self::Icarus2 => 8,
            Self::Daedalus => 6,
        }
    }
}

/// Shutter open for `on` ticks, closed for `off` ticks, after `delay` closed ticks.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Paired {
    pub on: u32,
    pub off: u32,
    pub delay: u32,
}

impl Paired {
    pub fn new(on: u32, off: u32, delay: u32) -> Self {
        Self { on, off, delay }
    }
}

impl std::fmt::Display for Paired {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "({}, {}, {})", self.on, self.off, self.delay)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Compiled {
    pub field: BitField40,
    /// Number of shutter openings in the field.
    pub repeats: u32,
    /// The hardware will not play the request back as given.
    pub truncated: bool,
}

impl Compiled {
    /// Writes that load the field into one side's timing registers.
    pub fn messages(&self, side: types::Side) -> [registers::Message; 2] {
        let (low, high) = match side {
            types::Side::A => ("HS_TIMING_DATA_ALO", "HS_TIMING_DATA_AHI"),
            types::Side::B => ("HS_TIMING_DATA_BLO", "HS_TIMING_DATA_BHI"),
        };
        [
            registers::Message::new(low, self.field.low()),
            registers::Message::new(high, self.field.high()),
        ]
    }
}

/// A high-speed timing request, kept so that it can be replayed.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Request {
    Paired(Paired),
    Arbitrary(Vec<u32>),
}

/// Timing configuration in force on the sensor. High-speed and manual shutter
/// modes exclude each other.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TimingMode {
    HighSpeed {
        a: Option<Request>,
        b: Option<Request>,
    },
    /// Requested intervals, in nanoseconds.
    Manual(Vec<u64>),
}

impl Default for TimingMode {
    fn default() -> Self {
        Self::HighSpeed { a: None, b: None }
    }
}

impl TimingMode {
    pub fn is_manual(&self) -> bool {
        matches!(self, Self::Manual(_))
    }

    /// Records `request` for `side`, leaving manual mode if necessary.
    pub fn record(&mut self, side: types::Side, request: Request) {
        if let Self::Manual(_) = self {
            *self = Self::default();
        }
        if let Self::HighSpeed { a, b } = self {
            match side {
                types::Side::A => *a = Some(request),
                types::Side::B => *b = Some(request),
            }
        }
    }

    pub fn request(&self, side: types::Side) -> Option<&Request> {
        match (self, side) {
            (Self::HighSpeed { a, .. }, types::Side::A) => a.as_ref(),
            (Self::HighSpeed { b, .. }, types::Side::B) => b.as_ref(),
            (Self::Manual(_), _) => None,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("timing {request} does not fit in {FIELD_BITS} ticks")]
    TooLong { request: Paired },

    #[error("manual timing expects {expected} intervals (received {received})")]
    ManualCount {
        expected: &'static str,
        received: usize,
    },

    #[error("manual interval {value} ns is outside [{min}, {max}] ns")]
    ManualRange { value: u64, min: u64, max: u64 },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Compiler {
    model: Model,
    frames: u32,
}

impl Compiler {
    pub fn new(model: Model, frames: u32) -> Self {
        Self { model, frames }
    }

    pub fn model(&self) -> Model {
        self.model
    }

    pub fn family(&self) -> Family {
        self.model.family()
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    pub fn compile_paired(&self, request: Paired) -> Result<Compiled, Error> {
        let Paired { on, off, delay } = request;
        if u64::from(on) + u64::from(off) + u64::from(delay) > u64::from(FIELD_BITS) {
            return Err(Error::TooLong { request });
        }
        if on == 0 {
            tracing::warn!(%request, "shutter never opens");
            return Ok(Compiled {
                field: BitField40::default(),
                repeats: 0,
                truncated: false,
            });
        }
        let cycle_length = (on + off) as usize;
        // Hardware plays the highest bit first, so each cycle is stored closed ticks first.
        let reversed: Vec<bool> = std::iter::repeat(false)
            .take(off as usize)
            .chain(std::iter::repeat(true).take(on as usize))
            .collect();
        let available = (FIELD_BITS - delay) as usize;
        let (ticks, repeats) = if self.model.capped() {
            let repeats = (available / cycle_length).min(self.frames as usize);
            (reversed.repeat(repeats), repeats as u32)
        } else {
            // The first cycle loses its leading closed ticks.
            let first = &reversed[off as usize..];
            let full = (available - first.len()) / cycle_length;
            let mut ticks = Vec::with_capacity(first.len() + full * cycle_length);
            ticks.extend_from_slice(first);
            ticks.extend(reversed.repeat(full));
            (ticks, full as u32 + 1)
        };
        let truncated = repeats < self.frames;
        if truncated {
            tracing::warn!(
                %request,
                repeats,
                frames = self.frames,
                "timing sequence truncated, later frames are not exposed"
            );
        }
        Ok(Compiled {
            field: place(&ticks, delay),
            repeats,
            truncated,
        })
    }

    /// Packs alternating closed/open intervals, starting with the delay, without
    /// repetition. Ticks past the end of the field are dropped.
    pub fn compile_arbitrary(&self, intervals: &[u32]) -> Compiled {
        let mut field = BitField40::default();
        let mut tick = 0u32;
        let mut repeats = 0;
        'intervals: for (index, length) in intervals.iter().enumerate() {
            let open = index % 2 == 1;
            if open && *length > 0 {
                repeats += 1;
            }
            for _ in 0..*length {
                if tick + 1 >= FIELD_BITS {
                    break 'intervals;
                }
                if open {
                    field.set(tick + 1);
                }
                tick += 1;
            }
        }
        let actual = self.played(field);
        let truncated = intervals.len() > actual.len()
            || intervals
                .iter()
                .zip(actual.iter())
                .any(|(requested, played)| requested != played);
        if truncated {
            tracing::warn!(
                requested = ?intervals,
                actual = ?actual,
                "arbitrary timing does not match the played sequence"
            );
        }
        Compiled {
            field,
            repeats,
            truncated,
        }
    }

    /// Intervals the hardware plays from `field`, delay first, alternating closed
    /// and open. The field is looped so that steady-state gaps between repeats appear.
    fn played(&self, field: BitField40) -> Vec<u32> {
        let count = self.model.played_intervals();
        if field.value() == 0 {
            return vec![0; count];
        }
        let mut intervals: Vec<u32> = field.runs(4).into_iter().rev().take(count).collect();
        if let Some(delay) = intervals.first_mut() {
            *delay = delay.saturating_sub(1);
        }
        intervals
    }

    /// Intervals seen by the imaged frames, delay first.
    ///
    /// Icarus model 1 only images the middle two frames: the result is the delay
    /// followed by the second opening, the gap and the third opening.
    pub fn decompile_actual(&self, field: BitField40) -> Vec<u32> {
        let played = self.played(field);
        match self.model {
            Model::Icarus => std::iter::once(played[0])
                .chain(played[3..6].iter().copied())
                .collect(),
            Model::Icarus2 | Model::Daedalus => played,
        }
    }

    /// Recovers the paired request that would compile to `field`.
    pub fn decompile_settings(&self, field: BitField40) -> Paired {
        if field.value() == 0 {
            return Paired::default();
        }
        let runs = field.runs(1);
        let last = runs.len() - 1;
        if runs.len() < 2 {
            return Paired::new(runs[0], 0, 0);
        }
        let delay = runs[last].saturating_sub(1);
        let on = runs[last - 1];
        // A request that fits only once reads back as (on, 40 - on).
        let off = match self.model {
            Model::Icarus => match runs.len() {
                2 => 1,
                3 => FIELD_BITS - on,
                _ => runs[last - 2],
            },
            Model::Icarus2 => {
                if runs.len() < 4 {
                    FIELD_BITS - on
                } else {
                    runs[last - 2]
                }
            }
            Model::Daedalus => {
                if runs.len() < (self.frames as usize).max(3) {
                    FIELD_BITS - on
                } else {
                    runs[last - 2]
                }
            }
        };
        Paired::new(on, off, delay)
    }

    /// Validates manual intervals (in nanoseconds) and converts them to register writes.
    ///
    /// Icarus sensors take seven intervals per side; seven values program both
    /// sides identically. Daedalus sensors take five.
    pub fn manual_messages(&self, nanoseconds: &[u64]) -> Result<Vec<registers::Message>, Error> {
        let family = self.model.family();
        let intervals: Vec<u64> = match (family, nanoseconds.len()) {
            (Family::Icarus, 7) => nanoseconds.repeat(2),
            (Family::Icarus, 14) | (Family::Daedalus, 5) => nanoseconds.to_vec(),
            (family, received) => {
                return Err(Error::ManualCount {
                    expected: match family {
                        Family::Icarus => "7 or 14",
                        Family::Daedalus => "5",
                    },
                    received,
                })
            }
        };
        let (min, max) = family.manual_range();
        if let Some(value) = intervals
            .iter()
            .find(|value| **value < min || **value > max)
        {
            return Err(Error::ManualRange {
                value: *value,
                min,
                max,
            });
        }
        Ok(family
            .manual_registers()
            .iter()
            .zip(intervals)
            .map(|(name, value)| {
                registers::Message::new(*name, (value / TICK_NANOSECONDS) as u32)
            })
            .collect())
    }

    /// Converts manual register counts back to nanoseconds.
    pub fn manual_nanoseconds(counts: &[u32]) -> Vec<u64> {
        counts
            .iter()
            .map(|count| u64::from(*count) * TICK_NANOSECONDS)
            .collect()
    }
}

/// Places `ticks` so that the last one sits just above the delay and the sync bit.
fn place(ticks: &[bool], delay: u32) -> BitField40 {
    let mut field = BitField40::default();
    let top = ticks.len() as u32 + delay;
    for (index, tick) in ticks.iter().enumerate() {
        if *tick {
            field.set(top - index as u32);
        }
    }
    field
}
