//! Composition root for an emulated ARM system: binds a processor core to
//! its physical address space, translator, and guest event queue.

mod bus;
mod system;

pub use bus::SystemBus;
pub use system::{ArmSystem, SystemError};
