// This module is the hub for the compiler's shared building blocks: the patchable code
// buffer, the resolver (relative branch arithmetic, labels and the loop bracket stack),
// the operation set and character classification, configuration, and the crate error
// type. None of it depends on the target instruction set; the x86-64 templates live in
// `x64` and build on these pieces.

//! Core bfjit infrastructure.
//!
//! # Key Components
//!
//! - [`code_buffer`]: append-only machine code with in-place patching
//! - [`resolver`]: rel32 displacement arithmetic, labels, bracket stack
//! - [`op`]: the eight operations and the unknown-character policy
//! - [`config`]: [`JitConfig`]
//! - [`error`]: [`JitError`] and [`JitResult`]

pub mod code_buffer;
pub mod config;
pub mod error;
pub mod op;
pub mod resolver;
pub mod test_utils;

pub use code_buffer::CodeBuffer;
pub use config::{JitConfig, SyscallAbi, UnknownCharPolicy, DEFAULT_TAPE_SIZE};
pub use error::{JitError, JitResult};
pub use op::{classify, Op, Scanned};
pub use resolver::{branch_target, relative_offset, BracketStack, Label, Labels, OpenLoop};
