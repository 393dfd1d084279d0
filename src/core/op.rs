//! Source operations and classification of source characters.

use super::config::UnknownCharPolicy;
use super::error::{JitError, JitResult};

/// The eight tape operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// `>`
    Right,
    /// `<`
    Left,
    /// `+`
    Inc,
    /// `-`
    Dec,
    /// `.`
    Output,
    /// `,`
    Input,
    /// `[`
    LoopOpen,
    /// `]`
    LoopClose,
}

impl Op {
    pub const ALL: [Op; 8] = [
        Op::Right,
        Op::Left,
        Op::Inc,
        Op::Dec,
        Op::Output,
        Op::Input,
        Op::LoopOpen,
        Op::LoopClose,
    ];

    pub fn from_char(ch: char) -> Option<Op> {
        Some(match ch {
            '>' => Op::Right,
            '<' => Op::Left,
            '+' => Op::Inc,
            '-' => Op::Dec,
            '.' => Op::Output,
            ',' => Op::Input,
            '[' => Op::LoopOpen,
            ']' => Op::LoopClose,
            _ => return None,
        })
    }

    pub fn as_char(self) -> char {
        match self {
            Op::Right => '>',
            Op::Left => '<',
            Op::Inc => '+',
            Op::Dec => '-',
            Op::Output => '.',
            Op::Input => ',',
            Op::LoopOpen => '[',
            Op::LoopClose => ']',
        }
    }
}

/// Outcome of classifying one source character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scanned {
    Op(Op),
    Whitespace,
    /// Unrecognized and skipped under the configured policy.
    Skipped,
}

/// Classify the character at byte offset `position`.
///
/// Whitespace is always ignored; other unrecognized characters follow `policy`.
pub fn classify(ch: char, position: usize, policy: UnknownCharPolicy) -> JitResult<Scanned> {
    if let Some(op) = Op::from_char(ch) {
        return Ok(Scanned::Op(op));
    }
    if ch.is_whitespace() {
        return Ok(Scanned::Whitespace);
    }
    match policy {
        UnknownCharPolicy::Skip => Ok(Scanned::Skipped),
        UnknownCharPolicy::Warn => {
            log::warn!("bad char {ch:?} @ position {position}, skipping");
            Ok(Scanned::Skipped)
        }
        UnknownCharPolicy::FailFast => Err(JitError::UnrecognizedChar { ch, position }),
    }
}
