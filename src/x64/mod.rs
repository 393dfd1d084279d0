//! x86-64 architecture-specific components.
//!
//! This module contains all x86-64 specific code:
//! - Machine code templates for the tape operations
//! - Disassembly of generated code using iced-x86

pub mod disasm;
pub mod encoder;

pub use disasm::{disassemble, format_listing, DisasmLine};
pub use encoder::{JumpCondition, X64Encoder};
