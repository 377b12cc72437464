use crate::acquisition;
use crate::boards;
use crate::channel;
use crate::log;
use crate::sensors;
use crate::transport;
use crate::tuner;

/// Everything needed to open and drive one camera.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Configuration {
    pub board: boards::Type,
    pub sensor: sensors::Type,
    pub interface: channel::Configuration,
    pub timeouts: transport::Timeouts,
    pub retry: transport::RetryPolicy,
    pub polling: acquisition::Polling,
    pub tuning: tuner::Tuning,
    pub log: log::Context,
}

impl Configuration {
    /// Default timing, retry and polling settings for `board` and `sensor`.
    /// RS422 links use the board's default baud rate.
    pub fn new(
        board: boards::Type,
        sensor: sensors::Type,
        interface: channel::Configuration,
    ) -> Self {
        let interface = match interface {
            channel::Configuration::Rs422 { path, baud_rate } => channel::Configuration::Rs422 {
                path,
                baud_rate: if baud_rate == 0 {
                    board.properties().default_baud_rate
                } else {
                    baud_rate
                },
            },
            interface => interface,
        };
        Self {
            board,
            sensor,
            interface,
            timeouts: transport::Timeouts::default(),
            retry: transport::RetryPolicy::default(),
            polling: acquisition::Polling::default(),
            tuning: tuner::Tuning::default(),
            log: log::Context::default(),
        }
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.log = log::Context::new(Some(tag.to_owned()));
        self
    }

    pub fn deserialize_bincode(data: &[u8]) -> bincode::Result<Configuration> {
        bincode::deserialize(data)
    }

    pub fn serialize_bincode(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(self)
    }
}
