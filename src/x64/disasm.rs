//! Disassembly listing of generated code, for diagnostics.

use iced_x86::{Decoder, DecoderOptions, Formatter, Instruction, NasmFormatter};
use std::fmt::Write;

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisasmLine {
    pub offset: u64,
    pub bytes: Vec<u8>,
    pub text: String,
}

/// Decode `code` as if it were loaded at `ip`.
pub fn disassemble(code: &[u8], ip: u64) -> Vec<DisasmLine> {
    let mut decoder = Decoder::with_ip(64, code, ip, DecoderOptions::NONE);
    let mut formatter = NasmFormatter::new();
    formatter.options_mut().set_first_operand_char_index(8);

    let mut lines = Vec::new();
    let mut instr = Instruction::default();
    while decoder.can_decode() {
        decoder.decode_out(&mut instr);
        let start = (instr.ip() - ip) as usize;
        let bytes = code
            .get(start..start + instr.len())
            .or_else(|| code.get(start..))
            .unwrap_or_default()
            .to_vec();
        let mut text = String::new();
        formatter.format(&instr, &mut text);
        lines.push(DisasmLine {
            offset: instr.ip(),
            bytes,
            text,
        });
    }
    lines
}

/// Render a listing with one instruction per line: offset, raw bytes, NASM text.
pub fn format_listing(code: &[u8], ip: u64) -> String {
    let mut out = String::new();
    for line in disassemble(code, ip) {
        let hex: String = line.bytes.iter().map(|b| format!("{b:02X}")).collect();
        let _ = writeln!(out, "{:016X} {:<24} {}", line.offset, hex, line.text);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::x64::encoder::{X64Encoder, ADD_CELL_1};

    #[test]
    fn test_listing_covers_every_byte() {
        let mut encoder = X64Encoder::new();
        encoder.prologue(0x1000);
        encoder.inc_cell();
        encoder.write_cell(crate::SyscallAbi::Linux);
        encoder.epilogue();
        let code = encoder.finish().unwrap();

        let lines = disassemble(code.as_slice(), 0);
        let total: usize = lines.iter().map(|l| l.bytes.len()).sum();
        assert_eq!(total, code.len());
        assert_eq!(lines[2].bytes, ADD_CELL_1);
        assert!(lines.iter().any(|l| l.text.trim() == "syscall"));
        assert_eq!(lines.last().map(|l| l.text.trim()), Some("ret"));

        let listing = format_listing(code.as_slice(), 0);
        assert_eq!(listing.lines().count(), lines.len());
    }

    #[test]
    fn test_truncated_code_does_not_panic() {
        // movabs r13, imm64 cut off after three immediate bytes.
        let code = [0x41, 0x55, 0x49, 0xBD, 0x00, 0x10, 0x00];
        let lines = disassemble(&code, 0x400);
        let total: usize = lines.iter().map(|l| l.bytes.len()).sum();
        assert!(total <= code.len());
        assert_eq!(lines[0].offset, 0x400);
        assert_eq!(lines[0].bytes, [0x41, 0x55]);
        assert!(!format_listing(&code, 0x400).is_empty());
        assert!(disassemble(&[], 0).is_empty());
    }
}
