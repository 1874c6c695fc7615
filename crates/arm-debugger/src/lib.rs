//! Debugger session controller: owns the run/pause/step lifecycle of an
//! `ArmSystem`, its breakpoints, and the JSON session-file format used to
//! persist a debugging session's options, symbol names, and annotations.

mod breakpoint;
mod session;
mod session_file;

pub use breakpoint::{Breakpoint, BreakpointKey};
pub use session::{CreateOptions, DebuggerSession, SessionState};
pub use session_file::{Annotation, EmulatorOptions, MemoryViewOptions, OrdinalEntry, SessionFile};
