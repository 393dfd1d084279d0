// This module drives translation: a single linear scan over the source text in which every
// recognized character selects one X64Encoder template. Loop-open emits a compare and a
// forward jz to a fresh exit label, binds a body label right after it and pushes both onto
// the bracket stack together with the source position. Loop-close pops the stack (an empty
// stack is an unmatched-bracket error raised before anything is emitted for that
// character), emits the compare and a backward jnz to the body label, then binds the exit
// label, which patches the loop-open placeholder. After the scan the bracket stack must be
// empty, the epilogue is appended and the finished buffer is returned together with
// per-operation statistics.

//! Single-pass translation of tape programs into x86-64 machine code.

use std::collections::HashMap;
use std::fmt;

use crate::core::code_buffer::CodeBuffer;
use crate::core::config::JitConfig;
use crate::core::error::JitResult;
use crate::core::op::{classify, Op, Scanned};
use crate::core::resolver::{BracketStack, OpenLoop};
use crate::x64::encoder::{JumpCondition, X64Encoder};

/// Statistics gathered while translating one program.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TranslationStats {
    /// Count of each operation translated.
    pub op_counts: HashMap<Op, usize>,
    /// Loops whose forward placeholder was patched.
    pub loops_closed: usize,
    /// Unrecognized characters skipped under a non-failing policy.
    pub chars_skipped: usize,
    /// Final code size in bytes.
    pub code_size: usize,
}

impl TranslationStats {
    pub fn ops_translated(&self) -> usize {
        self.op_counts.values().sum()
    }

    pub fn count(&self, op: Op) -> usize {
        self.op_counts.get(&op).copied().unwrap_or(0)
    }
}

impl fmt::Display for TranslationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Translation Statistics:")?;
        writeln!(f, "  Operations translated: {}", self.ops_translated())?;
        writeln!(f, "  Loops closed: {}", self.loops_closed)?;
        writeln!(f, "  Characters skipped: {}", self.chars_skipped)?;
        writeln!(f, "  Code size: {} bytes", self.code_size)?;

        if !self.op_counts.is_empty() {
            writeln!(f, "  Operation breakdown:")?;
            for op in Op::ALL {
                if let Some(count) = self.op_counts.get(&op) {
                    writeln!(f, "    '{}': {}", op.as_char(), count)?;
                }
            }
        }
        Ok(())
    }
}

/// Output of a successful translation.
#[derive(Debug, Clone)]
pub struct Translation {
    pub code: CodeBuffer,
    /// Offsets of every loop-open rel32 field, patched once its loop closed.
    pub forward_patches: Vec<usize>,
    pub stats: TranslationStats,
}

/// Translates tape programs for one tape address.
pub struct Translator<'c> {
    config: &'c JitConfig,
    encoder: X64Encoder,
    brackets: BracketStack,
    forward_patches: Vec<usize>,
    stats: TranslationStats,
}

impl<'c> Translator<'c> {
    /// Start a function whose cursor register is seeded with `tape_base`.
    pub fn new(config: &'c JitConfig, tape_base: u64) -> Self {
        let mut encoder = X64Encoder::new();
        encoder.prologue(tape_base);
        log::trace!("prologue: tape base {tape_base:#x}");

        Self {
            config,
            encoder,
            brackets: BracketStack::new(),
            forward_patches: Vec::new(),
            stats: TranslationStats::default(),
        }
    }

    /// Translate `source`; may be called repeatedly to append more text.
    ///
    /// Positions in errors are byte offsets into `source`.
    pub fn translate(&mut self, source: &str) -> JitResult<()> {
        for (position, ch) in source.char_indices() {
            match classify(ch, position, self.config.unknown_char_policy)? {
                Scanned::Op(op) => self.translate_op(op, position)?,
                Scanned::Whitespace => {}
                Scanned::Skipped => self.stats.chars_skipped += 1,
            }
        }
        Ok(())
    }

    fn translate_op(&mut self, op: Op, position: usize) -> JitResult<()> {
        let start = self.encoder.len();
        let abi = self.config.syscall_abi;
        match op {
            Op::Right => self.encoder.inc_cursor(),
            Op::Left => self.encoder.dec_cursor(),
            Op::Inc => self.encoder.inc_cell(),
            Op::Dec => self.encoder.dec_cell(),
            Op::Output => self.encoder.write_cell(abi),
            Op::Input => self.encoder.read_cell(abi),
            Op::LoopOpen => {
                let body = self.encoder.create_label();
                let exit = self.encoder.create_label();
                self.encoder.cmp_cell_zero();
                self.encoder.jcc(JumpCondition::Zero, exit)?;
                self.encoder.bind(body)?;
                self.brackets.push(OpenLoop {
                    body,
                    exit,
                    position,
                });
            }
            Op::LoopClose => {
                let open = self.brackets.pop(position)?;
                self.encoder.cmp_cell_zero();
                self.encoder.jcc(JumpCondition::NotZero, open.body)?;
                let patched = self.encoder.bind(open.exit)?;
                self.forward_patches.extend(patched);
                self.stats.loops_closed += 1;
            }
        }
        *self.stats.op_counts.entry(op).or_insert(0) += 1;
        log::trace!(
            "'{}' @ {position}: {} bytes at {start:#x}",
            op.as_char(),
            self.encoder.len() - start
        );
        Ok(())
    }

    /// Bytes emitted so far, prologue included.
    pub fn code_len(&self) -> usize {
        self.encoder.len()
    }

    /// Loops currently open.
    pub fn open_loops(&self) -> usize {
        self.brackets.depth()
    }

    /// Check the bracket structure, append the epilogue and return the code.
    pub fn finish(mut self) -> JitResult<Translation> {
        self.brackets.finish()?;
        self.encoder.epilogue();

        let code = self.encoder.finish()?;
        self.stats.code_size = code.len();
        log::debug!(
            "translated {} ops into {} bytes ({} loops)",
            self.stats.ops_translated(),
            code.len(),
            self.stats.loops_closed
        );

        Ok(Translation {
            code,
            forward_patches: self.forward_patches,
            stats: self.stats,
        })
    }
}

/// Translate a whole program in one call.
pub fn translate(source: &str, config: &JitConfig, tape_base: u64) -> JitResult<Translation> {
    let mut translator = Translator::new(config, tape_base);
    translator.translate(source)?;
    translator.finish()
}
