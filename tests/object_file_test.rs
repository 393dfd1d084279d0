use bfjit::object_file::{build_object, ENTRY_SYMBOL};
use bfjit::{translate, JitConfig};
use object::{Architecture, File, Object, ObjectSection, ObjectSymbol};

#[test]
fn test_code_object() {
    let translation = translate("+[-]>.", &JitConfig::default(), 0x1000).unwrap();
    let code = translation.code.as_slice();

    let obj = build_object(code, ENTRY_SYMBOL).unwrap();
    let file = File::parse(&*obj).unwrap();
    assert_eq!(file.architecture(), Architecture::X86_64);

    let text = file.section_by_name(".text").unwrap();
    assert_eq!(text.data().unwrap(), code);

    let sym = file.symbol_by_name(ENTRY_SYMBOL).unwrap();
    assert_eq!(sym.size(), code.len() as u64);
    assert!(sym.is_global());
    assert_eq!(sym.section_index(), Some(text.index()));
}
