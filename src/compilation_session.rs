// This module provides JitSession, the explicit runtime context for compiling and running
// tape programs. A session owns its Tape and its JitConfig; every program it compiles has
// that tape's base address baked into the prologue, so programs are only executable by the
// session that compiled them (checked, not assumed). Executing a program maps a fresh
// executable region, calls into it and unmaps it before returning, so no executable page
// outlives the call whether execution succeeded or not. Sessions share nothing, so several
// can run side by side (for example in parallel tests). SessionStats tracks compiled and
// executed programs for the verbose report.

//! Compile/execute sessions.

use std::fmt;

use crate::core::config::JitConfig;
use crate::core::error::{JitError, JitResult};
use crate::runtime::exec_mem::{ExecutableRegion, RegionState};
use crate::runtime::tape::Tape;
use crate::translator::{self, Translation, TranslationStats};

/// Machine code ready to be loaded, bound to the tape it was compiled for.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    code: Box<[u8]>,
    tape_base: u64,
    forward_patches: Vec<usize>,
    stats: TranslationStats,
}

impl CompiledProgram {
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn tape_base(&self) -> u64 {
        self.tape_base
    }

    /// Offsets of the loop-open displacement fields patched during translation.
    pub fn forward_patches(&self) -> &[usize] {
        &self.forward_patches
    }

    pub fn stats(&self) -> &TranslationStats {
        &self.stats
    }
}

/// Outcome of one native execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub code_size: usize,
    pub mapping_len: usize,
    /// State of the executable region when `execute` returned.
    pub region_state: RegionState,
}

/// Counters across the lifetime of a session.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionStats {
    pub programs_compiled: usize,
    pub programs_executed: usize,
    pub total_code_size: usize,
    pub largest_program_size: usize,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Session Statistics:")?;
        writeln!(f, "  Programs compiled: {}", self.programs_compiled)?;
        writeln!(f, "  Programs executed: {}", self.programs_executed)?;
        writeln!(f, "  Total code size: {} bytes", self.total_code_size)?;
        writeln!(f, "  Largest program: {} bytes", self.largest_program_size)
    }
}

/// Runtime context: one tape, one configuration.
pub struct JitSession {
    config: JitConfig,
    tape: Tape,
    stats: SessionStats,
}

impl JitSession {
    /// Create a session with a fresh tape of `config.tape_size` cells.
    ///
    /// Fails with [`JitError::EmptyTape`] for a zero-length tape: generated code always
    /// touches cell 0.
    pub fn new(config: JitConfig) -> JitResult<Self> {
        if config.tape_size == 0 {
            return Err(JitError::EmptyTape);
        }
        let tape = Tape::new(config.tape_size);
        log::debug!("session tape: {tape:?}");
        Ok(Self {
            config,
            tape,
            stats: SessionStats::default(),
        })
    }

    pub fn config(&self) -> &JitConfig {
        &self.config
    }

    /// Read-only view of the tape for post-execution inspection.
    pub fn tape(&self) -> &Tape {
        &self.tape
    }

    /// Zero the tape between runs.
    pub fn reset_tape(&mut self) {
        self.tape.reset();
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Translate `source` against this session's tape.
    pub fn compile(&mut self, source: &str) -> JitResult<CompiledProgram> {
        let Translation {
            code,
            forward_patches,
            stats,
        } = translator::translate(source, &self.config, self.tape.base_addr())?;

        let code = code.into_snapshot();
        self.stats.programs_compiled += 1;
        self.stats.total_code_size += code.len();
        self.stats.largest_program_size = self.stats.largest_program_size.max(code.len());

        Ok(CompiledProgram {
            code,
            tape_base: self.tape.base_addr(),
            forward_patches,
            stats,
        })
    }

    /// Load `program` into executable memory, run it to completion and unmap it.
    pub fn execute(&mut self, program: &CompiledProgram) -> JitResult<RunReport> {
        if !host_can_execute() {
            return Err(JitError::UnsupportedHost);
        }
        let tape_ptr = self.tape.as_mut_ptr();
        if program.tape_base != tape_ptr as u64 {
            return Err(JitError::TapeMismatch);
        }

        let mut region = ExecutableRegion::load(&program.code)?;
        let mapping_len = region.mapping_len();
        {
            let entry = region.entry_point()?;
            log::debug!("calling generated code at {:p}", entry.addr());
            // SAFETY: the code came from the translator, which emits a complete function
            // that saves/restores r13 and returns. Its only memory accesses go through the
            // cursor, seeded with this session's tape, which `&mut self` keeps alive and
            // unaliased for the call. Cursor moves off the tape are the program's own
            // undefined behavior and cannot be checked here.
            unsafe { entry.invoke() };
        }
        region.release()?;
        self.stats.programs_executed += 1;

        Ok(RunReport {
            code_size: program.code.len(),
            mapping_len,
            region_state: region.state(),
        })
    }

    /// Compile and execute `source`.
    pub fn run(&mut self, source: &str) -> JitResult<RunReport> {
        let program = self.compile(source)?;
        self.execute(&program)
    }
}

/// Generated code is x86-64; it can only be called on an x86-64 unix host.
pub const fn host_can_execute() -> bool {
    cfg!(all(unix, target_arch = "x86_64"))
}
