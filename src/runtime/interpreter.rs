//! Reference interpreter.
//!
//! Runs the same programs as the JIT directly on a [`Tape`], using the same character
//! classification and bracket rules. Cell arithmetic wraps. Unlike generated code it
//! checks the cursor, so a move off either end of the tape is reported instead of
//! corrupting memory. Useful as an oracle for the compiled path.

use std::io::{ErrorKind, Read, Write};

use super::tape::Tape;
use crate::core::config::UnknownCharPolicy;
use crate::core::error::{JitError, JitResult};
use crate::core::op::{classify, Op, Scanned};

/// A decoded program with precomputed loop partners.
#[derive(Debug, Clone)]
pub struct Program {
    ops: Vec<(Op, usize)>,
    /// For each op index, the index of the matching bracket (unused for other ops).
    partner: Vec<usize>,
}

impl Program {
    pub fn parse(source: &str, policy: UnknownCharPolicy) -> JitResult<Self> {
        let mut ops = Vec::new();
        for (position, ch) in source.char_indices() {
            if let Scanned::Op(op) = classify(ch, position, policy)? {
                ops.push((op, position));
            }
        }

        let mut partner = vec![0; ops.len()];
        let mut open: Vec<usize> = Vec::new();
        for (i, &(op, position)) in ops.iter().enumerate() {
            match op {
                Op::LoopOpen => open.push(i),
                Op::LoopClose => {
                    let j = open.pop().ok_or(JitError::UnmatchedClose { position })?;
                    partner[i] = j;
                    partner[j] = i;
                }
                _ => {}
            }
        }
        if let Some(&innermost) = open.last() {
            return Err(JitError::UnmatchedOpen {
                position: ops[innermost].1,
                open_count: open.len(),
            });
        }

        Ok(Self { ops, partner })
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Interpreter state: a tape and a cursor.
pub struct Interpreter<'t> {
    tape: &'t mut Tape,
    cursor: usize,
}

impl<'t> Interpreter<'t> {
    /// Start with the cursor on cell 0; an empty tape has no cell 0.
    pub fn new(tape: &'t mut Tape) -> JitResult<Self> {
        if tape.is_empty() {
            return Err(JitError::EmptyTape);
        }
        Ok(Self { tape, cursor: 0 })
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Execute `program`; `,` at end of input leaves the cell unchanged.
    pub fn run<R: Read, W: Write>(
        &mut self,
        program: &Program,
        input: &mut R,
        output: &mut W,
    ) -> JitResult<()> {
        let mut pc = 0;
        let mut steps: u64 = 0;
        while pc < program.ops.len() {
            let (op, position) = program.ops[pc];
            match op {
                Op::Right => {
                    if self.cursor + 1 >= self.tape.len() {
                        return Err(JitError::CursorOutOfBounds { position });
                    }
                    self.cursor += 1;
                }
                Op::Left => {
                    self.cursor = self
                        .cursor
                        .checked_sub(1)
                        .ok_or(JitError::CursorOutOfBounds { position })?;
                }
                Op::Inc => {
                    let cell = &mut self.tape.cells_mut()[self.cursor];
                    *cell = cell.wrapping_add(1);
                }
                Op::Dec => {
                    let cell = &mut self.tape.cells_mut()[self.cursor];
                    *cell = cell.wrapping_sub(1);
                }
                Op::Output => {
                    output.write_all(&[self.tape.cells()[self.cursor]])?;
                }
                Op::Input => {
                    let mut byte = [0u8; 1];
                    loop {
                        match input.read(&mut byte) {
                            Ok(0) => break,
                            Ok(_) => {
                                self.tape.cells_mut()[self.cursor] = byte[0];
                                break;
                            }
                            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                            Err(e) => return Err(e.into()),
                        }
                    }
                }
                Op::LoopOpen => {
                    if self.tape.cells()[self.cursor] == 0 {
                        pc = program.partner[pc];
                    }
                }
                Op::LoopClose => {
                    if self.tape.cells()[self.cursor] != 0 {
                        pc = program.partner[pc];
                    }
                }
            }
            pc += 1;
            steps += 1;
        }
        output.flush()?;
        log::debug!("interpreted {steps} steps, cursor at {}", self.cursor);
        Ok(())
    }
}

/// Parse and run `source` on `tape`.
pub fn interpret<R: Read, W: Write>(
    source: &str,
    policy: UnknownCharPolicy,
    tape: &mut Tape,
    input: &mut R,
    output: &mut W,
) -> JitResult<()> {
    let program = Program::parse(source, policy)?;
    Interpreter::new(tape)?.run(&program, input, output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str, input: &[u8]) -> (Tape, Vec<u8>) {
        let mut tape = Tape::new(64);
        let mut out = Vec::new();
        interpret(
            source,
            UnknownCharPolicy::Skip,
            &mut tape,
            &mut &input[..],
            &mut out,
        )
        .unwrap();
        (tape, out)
    }

    #[test]
    fn test_cells_and_cursor() {
        let (tape, _) = run("++>+++>+<<-", b"");
        assert_eq!(&tape.cells()[..4], &[1, 3, 1, 0]);
    }

    #[test]
    fn test_loop_and_wrap() {
        let (tape, _) = run("+++++[-]>-", b"");
        assert_eq!(&tape.cells()[..2], &[0, 255]);
    }

    #[test]
    fn test_echo_and_eof() {
        let (_, out) = run(",.,.", b"Z");
        assert_eq!(out, b"ZZ");
    }

    #[test]
    fn test_hello_world() {
        let source = "++++++++[>++++[>++>+++>+++>+<<<<-]>+>+>->>+[<]<-]>>.>---.+++++++..+++.>>.<-.<.+++.------.--------.>>+.>++.";
        let (_, out) = run(source, b"");
        assert_eq!(out, b"Hello World!\n");
    }

    #[test]
    fn test_cursor_bounds_checked() {
        let mut tape = Tape::new(2);
        let err = interpret(
            "><<",
            UnknownCharPolicy::Skip,
            &mut tape,
            &mut std::io::empty(),
            &mut std::io::sink(),
        )
        .unwrap_err();
        assert!(matches!(err, JitError::CursorOutOfBounds { position: 2 }));

        let err = interpret(
            ">>",
            UnknownCharPolicy::Skip,
            &mut tape,
            &mut std::io::empty(),
            &mut std::io::sink(),
        )
        .unwrap_err();
        assert!(matches!(err, JitError::CursorOutOfBounds { position: 1 }));

        let program = Program::parse(">>><", UnknownCharPolicy::Skip).unwrap();
        let mut tape = Tape::new(3);
        let mut interpreter = Interpreter::new(&mut tape).unwrap();
        let err = interpreter
            .run(&program, &mut std::io::empty(), &mut std::io::sink())
            .unwrap_err();
        assert!(matches!(err, JitError::CursorOutOfBounds { position: 2 }));
        assert_eq!(interpreter.cursor(), 2);
    }

    #[test]
    fn test_empty_tape_rejected() {
        let mut tape = Tape::new(0);
        assert!(matches!(
            Interpreter::new(&mut tape),
            Err(JitError::EmptyTape)
        ));
        let err = interpret(
            "+",
            UnknownCharPolicy::Skip,
            &mut tape,
            &mut std::io::empty(),
            &mut std::io::sink(),
        )
        .unwrap_err();
        assert!(matches!(err, JitError::EmptyTape));
    }

    #[test]
    fn test_structural_errors() {
        assert!(matches!(
            Program::parse("+]", UnknownCharPolicy::Skip),
            Err(JitError::UnmatchedClose { position: 1 })
        ));
        assert!(matches!(
            Program::parse("[[]", UnknownCharPolicy::Skip),
            Err(JitError::UnmatchedOpen {
                position: 0,
                open_count: 1
            })
        ));
    }
}
