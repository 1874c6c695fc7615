//! Address space, event queue, and observation primitives shared by the ARM
//! emulator core.
//!
//! Nothing here executes an instruction. This crate owns the physical
//! address map, the logical-to-physical translation contract, the
//! cross-thread guest event queue, and the `Observable`/`Value` state
//! inspection surface that higher crates implement.

mod address_map;
mod event_queue;
mod observable;
mod region;
mod translate;

pub use address_map::{AddressMap, FoundRegion, Mapping};
pub use event_queue::{GuestEvent, GuestEventConsumer, GuestEventProducer, guest_event_queue};
pub use observable::{Observable, Value};
pub use region::{AddressRegion, GenericHostBlock, MemoryAccess, MmioDevice};
pub use translate::{AddressTranslator, IdentityTranslator, PageMapping};
