use crate::device;
use crate::device::Board;
use crate::properties;
use crate::registers;
use crate::timing;

device::register! {
    "board",
    Board,
    properties::Board,
    [llnl_v1, llnl_v4],
    {
        fn register_map(family: timing::Family) -> Result<registers::RegisterMap, registers::Error>;
        fn init_messages() -> Vec<registers::Message>;
        fn latch_messages() -> Vec<registers::Message>;
        fn led_messages(led: u8, on: bool) -> Vec<registers::Message>;
    }
}
