use crate::device;
use crate::device::Sensor;
use crate::properties;
use crate::registers;
use crate::timing;
use crate::types;

device::register! {
    "sensor",
    Sensor,
    properties::Sensor,
    [daedalus, icarus, icarus2],
    {
        fn detect_subregister() -> &'static str;
        fn extend_register_map(
            map: &mut registers::RegisterMap,
            board: &properties::Board
        ) -> Result<(), registers::Error>;
        fn init_messages(board: &properties::Board) -> Vec<registers::Message>;
        fn oscillator_code(oscillator: device::Oscillator) -> Option<u32>;
    }
}

impl Type {
    /// Compiler for the sensor's timing model, sized for `frames` selected frames.
    pub fn compiler(self, frames: u32) -> timing::Compiler {
        timing::Compiler::new(self.properties().timing, frames)
    }
}

/// Registers shared by the Icarus sensors.
const ICARUS_REGISTERS: &[(&str, u16)] = &[
    ("VRESET_WAIT_TIME", 0x03e),
    ("ICARUS_VER_SEL", 0x041),
    ("MISC_SENSOR_CTL", 0x04c),
    ("MANUAL_SHUTTERS_MODE", 0x050),
    ("W0_INTEGRATION", 0x051),
    ("W0_INTERFRAME", 0x052),
    ("W1_INTEGRATION", 0x053),
    ("W1_INTERFRAME", 0x054),
    ("W2_INTEGRATION", 0x055),
    ("W2_INTERFRAME", 0x056),
    ("W3_INTEGRATION", 0x057),
    ("W0_INTEGRATION_B", 0x058),
    ("W0_INTERFRAME_B", 0x059),
    ("W1_INTEGRATION_B", 0x05a),
    ("W1_INTERFRAME_B", 0x05b),
    ("W2_INTEGRATION_B", 0x05c),
    ("W2_INTERFRAME_B", 0x05d),
    ("W3_INTEGRATION_B", 0x05e),
    ("TIME_ROW_DCD", 0x05f),
];

const ICARUS_SUBREGISTERS: &[registers::Entry] = registers::subregisters! {
    "MANSHUT_MODE" => "MANUAL_SHUTTERS_MODE" [0; 1] rw,
    "REVREAD" => "CTRL_REG" [4; 1] rw,
    "PDBIAS_LOW" => "CTRL_REG" [6; 1] rw,
    "ROWDCD_CTL" => "CTRL_REG" [7; 1] rw,
    "ACCUMULATION_CTL" => "MISC_SENSOR_CTL" [0; 1] rw,
    "HST_TST_ANRST_EN" => "MISC_SENSOR_CTL" [1; 1] rw,
    "HST_TST_BNRST_EN" => "MISC_SENSOR_CTL" [2; 1] rw,
    "HST_TST_ANRST_IN" => "MISC_SENSOR_CTL" [3; 1] rw,
    "HST_TST_BNRST_IN" => "MISC_SENSOR_CTL" [4; 1] rw,
    "HST_PXL_RST_EN" => "MISC_SENSOR_CTL" [5; 1] rw,
    "HST_CONT_MODE" => "MISC_SENSOR_CTL" [6; 1] rw,
    "COL_DCD_EN" => "MISC_SENSOR_CTL" [7; 1] rw,
    "COL_READOUT_EN" => "MISC_SENSOR_CTL" [8; 1] rw,
    "STAT_HST_ALL_W_EN_DETECTED" => "STAT_REG" [12; 1] ro,
    "PDBIAS_UNREADY" => "STAT_REG2" [5; 1] ro,
};

fn icarus_oscillator_code(oscillator: device::Oscillator) -> Option<u32> {
    match oscillator {
        device::Oscillator::Relaxation => Some(0),
        device::Oscillator::Ring => Some(1),
        device::Oscillator::RingBypass => Some(2),
        device::Oscillator::External => Some(3),
        _ => None,
    }
}

/// Frame and row selection writes.
pub fn selection_messages(frames: types::Region, rows: types::Region) -> [registers::Message; 4] {
    [
        registers::Message::new("FPA_FRAME_INITIAL", frames.first),
        registers::Message::new("FPA_FRAME_FINAL", frames.last),
        registers::Message::new("FPA_ROW_INITIAL", rows.first),
        registers::Message::new("FPA_ROW_FINAL", rows.last),
    ]
}
