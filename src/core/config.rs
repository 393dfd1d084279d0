//! Compiler configuration.
//!
//! [`JitConfig`] collects the knobs that change translation or runtime behavior:
//! tape length, what to do with characters that are not one of the eight
//! operations, and which system-call numbers the I/O templates use.

use std::fmt;
use std::str::FromStr;

/// Number of cells on the tape unless configured otherwise.
pub const DEFAULT_TAPE_SIZE: usize = 30000;

/// Policy for source characters that are neither an operation nor whitespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownCharPolicy {
    /// Skip the character without emitting anything or reporting it.
    Skip,
    /// Skip the character and log a warning naming it and its position.
    #[default]
    Warn,
    /// Abort translation with [`JitError::UnrecognizedChar`](crate::JitError).
    FailFast,
}

impl FromStr for UnknownCharPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(Self::Skip),
            "warn" => Ok(Self::Warn),
            "fail" | "fail-fast" => Ok(Self::FailFast),
            other => Err(format!(
                "unknown policy '{other}' (expected skip, warn or fail)"
            )),
        }
    }
}

impl fmt::Display for UnknownCharPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::Warn => write!(f, "warn"),
            Self::FailFast => write!(f, "fail"),
        }
    }
}

/// System-call numbers used by the `,` and `.` templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallAbi {
    Linux,
    Darwin,
}

impl SyscallAbi {
    /// ABI of the host the crate was built for.
    pub const fn host() -> Self {
        if cfg!(target_os = "macos") {
            Self::Darwin
        } else {
            Self::Linux
        }
    }

    pub const fn read_nr(self) -> u32 {
        match self {
            Self::Linux => 0,
            Self::Darwin => 0x200_0003,
        }
    }

    pub const fn write_nr(self) -> u32 {
        match self {
            Self::Linux => 1,
            Self::Darwin => 0x200_0004,
        }
    }
}

impl Default for SyscallAbi {
    fn default() -> Self {
        Self::host()
    }
}

/// Translation and runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JitConfig {
    pub tape_size: usize,
    pub unknown_char_policy: UnknownCharPolicy,
    pub syscall_abi: SyscallAbi,
}

impl Default for JitConfig {
    fn default() -> Self {
        Self {
            tape_size: DEFAULT_TAPE_SIZE,
            unknown_char_policy: UnknownCharPolicy::default(),
            syscall_abi: SyscallAbi::host(),
        }
    }
}

impl JitConfig {
    pub fn with_tape_size(mut self, tape_size: usize) -> Self {
        self.tape_size = tape_size;
        self
    }

    pub fn with_unknown_char_policy(mut self, policy: UnknownCharPolicy) -> Self {
        self.unknown_char_policy = policy;
        self
    }

    pub fn with_syscall_abi(mut self, abi: SyscallAbi) -> Self {
        self.syscall_abi = abi;
        self
    }
}
