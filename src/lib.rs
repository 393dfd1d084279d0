//! bfjit - a just-in-time compiler for the eight-operation tape language.
//!
//! Source text is translated in a single pass into x86-64 machine code, loaded
//! into a mapping that is flipped from writable to executable, and called as a
//! native function that works directly on a 30000-cell byte tape.
//!
//! # Primary Usage
//!
//! ```ignore
//! use bfjit::{JitConfig, JitSession};
//!
//! let mut session = JitSession::new(JitConfig::default())?;
//! let program = session.compile("++>+++>+<<-")?;
//! session.execute(&program)?;
//! assert_eq!(&session.tape().cells()[..3], &[1, 3, 1]);
//! ```
//!
//! # Architecture
//!
//! - [`core`] - Code buffer, resolver, operations, configuration, errors
//! - [`x64`] - x86-64 templates and disassembly
//! - [`translator`] - Single-pass source to machine code translation
//! - [`runtime`] - Tape, executable memory, reference interpreter
//! - [`compilation_session`] - Compile/execute sessions owning a tape

pub mod compilation_session;
pub mod core;
pub mod object_file;
pub mod runtime;
pub mod translator;
pub mod x64;

pub use compilation_session::{host_can_execute, CompiledProgram, JitSession, RunReport, SessionStats};
pub use crate::core::{JitConfig, JitError, JitResult, Op, SyscallAbi, UnknownCharPolicy};
pub use runtime::{RegionState, Tape};
pub use translator::{translate, Translation, TranslationStats, Translator};
