//! Runtime support: the tape, executable memory and the reference interpreter.

pub mod exec_mem;
pub mod interpreter;
pub mod tape;

pub use exec_mem::{EntryPoint, ExecutableRegion, RegionState};
pub use interpreter::{interpret, Interpreter, Program};
pub use tape::Tape;
