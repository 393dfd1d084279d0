// This module is the control-flow resolver: the arithmetic that turns a pair of code
// offsets into the signed 32-bit displacement a near branch carries, and the label table
// that lets the encoder express loops as "branch to label" / "bind label here" instead of
// raw placeholder bookkeeping. Displacements are always measured from the first byte after
// the 4-byte field to the destination byte. A branch to an unbound label records a fixup
// site; binding the label patches every recorded site. BracketStack pairs each open loop
// with its labels and the source position that opened it, so unbalanced brackets can be
// reported precisely.

//! Relative branch offsets, labels and the loop bracket stack.

use super::code_buffer::CodeBuffer;
use super::error::{JitError, JitResult};

/// Compute the 32-bit relative displacement for a branch whose offset field ends at
/// `jump_from` and whose destination is `jump_to`.
///
/// Backward displacements are returned as their two's-complement bit pattern.
pub fn relative_offset(jump_from: usize, jump_to: usize) -> JitResult<u32> {
    if jump_to >= jump_from {
        let diff = jump_to - jump_from;
        if diff >= 1 << 31 {
            return Err(JitError::OffsetOutOfRange {
                from: jump_from,
                to: jump_to,
            });
        }
        Ok(diff as u32)
    } else {
        let diff = jump_from - jump_to;
        if diff - 1 >= 1 << 31 {
            return Err(JitError::OffsetOutOfRange {
                from: jump_from,
                to: jump_to,
            });
        }
        Ok((diff as u32).wrapping_neg())
    }
}

/// Inverse of [`relative_offset`]: the destination a displacement lands on.
pub fn branch_target(jump_from: usize, displacement: u32) -> usize {
    (jump_from as i64 + displacement as i32 as i64) as usize
}

/// Opaque handle for a branch destination inside one [`Labels`] table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(usize);

#[derive(Debug, Clone)]
enum LabelState {
    /// Offsets of 4-byte displacement fields waiting for this label.
    Unbound { fixups: Vec<usize> },
    Bound(usize),
}

/// Label table for one code buffer.
#[derive(Debug, Default, Clone)]
pub struct Labels {
    states: Vec<LabelState>,
}

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh, unbound label.
    pub fn create(&mut self) -> Label {
        self.states.push(LabelState::Unbound { fixups: Vec::new() });
        Label(self.states.len() - 1)
    }

    /// Offset a label is bound to, if any.
    pub fn offset(&self, label: Label) -> Option<usize> {
        match self.states.get(label.0)? {
            LabelState::Bound(offset) => Some(*offset),
            LabelState::Unbound { .. } => None,
        }
    }

    /// Emit a 4-byte displacement field referring to `label`.
    ///
    /// Must be the last part of the branch instruction: the field end is the point the
    /// displacement is measured from. Forward references get a zero placeholder.
    pub fn emit_rel32(&mut self, code: &mut CodeBuffer, label: Label) -> JitResult<()> {
        let field = code.len();
        match &mut self.states[label.0] {
            LabelState::Bound(target) => {
                let rel = relative_offset(field + 4, *target)?;
                code.emit_u32(rel);
                log::trace!("rel32 at {field:#x} -> {target:#x} = {rel:#010x}");
            }
            LabelState::Unbound { fixups } => {
                fixups.push(field);
                code.emit_u32(0);
                log::trace!("rel32 placeholder at {field:#x}");
            }
        }
        Ok(())
    }

    /// Bind `label` to the current end of `code`, patching pending references.
    ///
    /// Returns the offsets of the displacement fields that were patched.
    pub fn bind(&mut self, code: &mut CodeBuffer, label: Label) -> JitResult<Vec<usize>> {
        let target = code.len();
        let previous = std::mem::replace(&mut self.states[label.0], LabelState::Bound(target));
        let fixups = match previous {
            LabelState::Unbound { fixups } => fixups,
            LabelState::Bound(offset) => panic!("{label:?} bound twice (first at {offset:#x})"),
        };

        for &field in &fixups {
            let rel = relative_offset(field + 4, target)?;
            code.patch_u32(field, rel);
            log::trace!("patched rel32 at {field:#x} -> {target:#x} = {rel:#010x}");
        }
        Ok(fixups)
    }

    /// Number of labels that still have references waiting to be patched.
    pub fn unresolved(&self) -> usize {
        self.states
            .iter()
            .filter(|s| matches!(s, LabelState::Unbound { fixups } if !fixups.is_empty()))
            .count()
    }

    /// Fail if any referenced label was never bound.
    pub fn finish(&self) -> JitResult<()> {
        match self.unresolved() {
            0 => Ok(()),
            count => Err(JitError::UnresolvedLabels { count }),
        }
    }
}

/// One open loop: where its body starts, where it exits, and the source position of `[`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenLoop {
    pub body: Label,
    pub exit: Label,
    pub position: usize,
}

/// Last-in-first-out stack of unresolved loop openings.
#[derive(Debug, Default, Clone)]
pub struct BracketStack {
    open: Vec<OpenLoop>,
}

impl BracketStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, open: OpenLoop) {
        self.open.push(open);
    }

    /// Pop the innermost open loop; `position` is the closing bracket's source index.
    pub fn pop(&mut self, position: usize) -> JitResult<OpenLoop> {
        self.open
            .pop()
            .ok_or(JitError::UnmatchedClose { position })
    }

    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Fail if any loop is still open at the end of the scan.
    pub fn finish(&self) -> JitResult<()> {
        match self.open.last() {
            None => Ok(()),
            Some(innermost) => Err(JitError::UnmatchedOpen {
                position: innermost.position,
                open_count: self.open.len(),
            }),
        }
    }
}
