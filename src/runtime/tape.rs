// This module provides Tape, the zero-initialized byte array that generated code reads and
// writes through the cursor register. The storage is a boxed slice so its address never
// changes for the lifetime of the tape; that address is embedded as a 64-bit immediate in
// the prologue of every function compiled against it. Generated code performs no bounds
// checks. After execution the owner can inspect the cells, including a grouped dump of the
// nonzero ones.

//! Fixed-size byte tape shared with generated code.

use std::fmt::Write;

use crate::core::config::DEFAULT_TAPE_SIZE;

/// Zero-initialized cells plus a stable base address.
pub struct Tape {
    cells: Box<[u8]>,
}

impl Tape {
    pub fn new(size: usize) -> Self {
        Self {
            cells: vec![0u8; size].into_boxed_slice(),
        }
    }

    /// Address of cell 0, as embedded in generated code.
    pub fn base_addr(&self) -> u64 {
        self.cells.as_ptr() as u64
    }

    /// Pointer generated code writes through.
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.cells.as_mut_ptr()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [u8] {
        &mut self.cells
    }

    /// Zero every cell; the base address is unchanged.
    pub fn reset(&mut self) {
        self.cells.fill(0);
    }

    /// `(index, value)` for every nonzero cell.
    pub fn nonzero(&self) -> impl Iterator<Item = (usize, u8)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v != 0)
            .map(|(i, &v)| (i, v))
    }

    /// Nonzero cells as `[idx] = value`, four per line.
    pub fn format_nonzero(&self) -> String {
        let mut out = String::new();
        let mut count = 0;
        for (index, value) in self.nonzero() {
            let _ = write!(out, "[{index:>3}] = {value:<3}      ");
            count += 1;
            if count % 4 == 0 {
                out.push('\n');
            }
        }
        if count % 4 != 0 {
            out.push('\n');
        }
        out
    }
}

impl Default for Tape {
    fn default() -> Self {
        Self::new(DEFAULT_TAPE_SIZE)
    }
}

impl std::fmt::Debug for Tape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tape")
            .field("base", &format_args!("{:#x}", self.base_addr()))
            .field("len", &self.cells.len())
            .field("nonzero", &self.nonzero().count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tape_starts_zeroed() {
        let tape = Tape::default();
        assert_eq!(tape.len(), 30000);
        assert!(tape.cells().iter().all(|&c| c == 0));
        assert_eq!(tape.nonzero().count(), 0);
    }

    #[test]
    fn test_base_address_is_stable() {
        let mut tape = Tape::new(16);
        let base = tape.base_addr();
        tape.cells_mut()[3] = 7;
        tape.reset();
        let moved = tape;
        assert_eq!(moved.base_addr(), base);
        assert_eq!(moved.cells()[3], 0);
    }

    #[test]
    fn test_nonzero_dump_groups_by_four() {
        let mut tape = Tape::new(64);
        for (i, v) in [(0, 72), (1, 101), (2, 108), (10, 1), (40, 255)] {
            tape.cells_mut()[i] = v;
        }

        let dump = tape.format_nonzero();
        let lines: Vec<_> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("[  0] = 72 "));
        assert!(lines[0].contains("[ 10] = 1 "));
        assert!(lines[1].contains("[ 40] = 255"));
    }
}
