#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Side {
    A = 0,
    B = 1,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::A, Side::B];
}

impl std::fmt::Display for Side {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(formatter, "A"),
            Self::B => write!(formatter, "B"),
        }
    }
}

#[repr(u8)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TriggerMode {
    #[default]
    Hardware = 0,
    Software = 1,
    Dual = 2,
}

impl std::fmt::Display for TriggerMode {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hardware => write!(formatter, "hardware"),
            Self::Software => write!(formatter, "software"),
            Self::Dual => write!(formatter, "dual"),
        }
    }
}

/// Inclusive index range, used for frame and row selection.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Region {
    pub first: u32,
    pub last: u32,
}

impl Region {
    pub fn new(first: u32, last: u32) -> Option<Self> {
        if first <= last {
            Some(Self { first, last })
        } else {
            None
        }
    }

    /// Zero when the region ends before it starts.
    pub fn len(&self) -> u32 {
        if self.is_empty() {
            0
        } else {
            (self.last - self.first).saturating_add(1)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.first > self.last
    }

    /// An empty region is never contained.
    pub fn contains(&self, other: &Region) -> bool {
        !other.is_empty() && other.first >= self.first && other.last <= self.last
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameGeometry {
    pub frames: u32,
    pub rows: u32,
    pub columns: u32,
    pub bytes_per_pixel: u32,
}

impl FrameGeometry {
    pub fn payload_bytes(&self) -> usize {
        self.frames as usize
            * self.rows as usize
            * self.columns as usize
            * self.bytes_per_pixel as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region() {
        let full = Region::new(0, 3).expect("ordered bounds");
        assert_eq!(full.len(), 4);
        assert!(!full.is_empty());
        assert!(full.contains(&Region { first: 1, last: 2 }));
        assert!(!full.contains(&Region { first: 2, last: 4 }));

        let reversed = Region { first: 3, last: 1 };
        assert!(Region::new(3, 1).is_none());
        assert!(reversed.is_empty());
        assert_eq!(reversed.len(), 0);
        assert!(!full.contains(&reversed));

        assert_eq!(Region { first: 0, last: u32::MAX }.len(), u32::MAX);
    }
}
