pub mod mock;
#[cfg(feature = "sysfs-gpio")]
pub mod sysfs;

pub use mock::{MockCall, MockGpioBackend, MockOp, MockValue};
#[cfg(feature = "sysfs-gpio")]
pub use sysfs::SysfsBackend;
