//! ELF object emission for offline inspection of generated code.
//!
//! Wraps a code snapshot in an x86-64 relocatable object with the bytes in
//! `.text` and one global function symbol covering them, so `objdump -d` can
//! disassemble exactly what the JIT would run. The tape address is an absolute
//! immediate in the code, so the object is for reading, not linking.

use object::write::{Object, StandardSection, Symbol, SymbolSection};
use object::{Architecture, BinaryFormat, Endianness, SymbolFlags, SymbolKind, SymbolScope};

use crate::core::error::JitResult;

/// Symbol name used for the generated function.
pub const ENTRY_SYMBOL: &str = "bf_main";

/// Build an ELF object containing `code` as function `symbol`.
pub fn build_object(code: &[u8], symbol: &str) -> JitResult<Vec<u8>> {
    let mut obj = Object::new(BinaryFormat::Elf, Architecture::X86_64, Endianness::Little);
    let text = obj.section_id(StandardSection::Text);
    let offset = obj.append_section_data(text, code, 16);

    obj.add_symbol(Symbol {
        name: symbol.as_bytes().to_vec(),
        value: offset,
        size: code.len() as u64,
        kind: SymbolKind::Text,
        scope: SymbolScope::Linkage,
        weak: false,
        section: SymbolSection::Section(text),
        flags: SymbolFlags::None,
    });

    let bytes = obj.write()?;
    log::debug!("built {} byte object for {} bytes of code", bytes.len(), code.len());
    Ok(bytes)
}

/// Write [`build_object`] output to `path`.
pub fn write_object(path: &std::path::Path, code: &[u8]) -> JitResult<()> {
    let bytes = build_object(code, ENTRY_SYMBOL)?;
    std::fs::write(path, bytes)?;
    Ok(())
}
