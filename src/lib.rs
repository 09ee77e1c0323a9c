pub mod backend;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod gpio;
pub mod signal;
pub mod time;

pub use config::{AppConfig, Direction, EdgeDetect, LineBinding, LineId, Players};
pub use error::AppError;
pub use event_loop::{EdgeLoop, LoopStats, ObservedState};
pub use gpio::{
    EdgeReading, GpioBackend, LineHandle, LineManager, LineStatus, SetupFailure, SetupStage,
};
pub use signal::Shutdown;
pub use time::Timespec;

#[cfg(feature = "sysfs-gpio")]
pub use backend::SysfsBackend;
pub use backend::MockGpioBackend;
