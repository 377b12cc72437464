pub mod acquisition;
pub mod boards;
pub mod camera;
pub mod channel;
pub mod clock;
pub mod configuration;
pub mod device;
pub mod flag;
pub mod log;
pub mod packet;
pub mod pots;
pub mod properties;
pub mod registers;
pub mod sensors;
pub mod timing;
pub mod transport;
pub mod tuner;

pub use crate::camera::Camera;
pub use crate::camera::Error;
pub use crate::channel::Channel;
pub use crate::clock::Clock;
pub use crate::configuration::Configuration;
pub use crate::device::BoardInfo;
pub use crate::registers::Message;

pub use bincode;
pub use nscamera_types as types;

/// Opens the configured link and initializes the board.
pub fn open(
    configuration: &Configuration,
) -> Result<(Camera<channel::Interface>, BoardInfo), Error> {
    let mut camera = Camera::open(configuration)?;
    let info = camera.initialize()?;
    Ok((camera, info))
}
