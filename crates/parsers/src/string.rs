use haevn_core::{Instruction, Label, StringLabel};
use haevn_storage::{Error, Store};
use regex::bytes::Regex;

/// Scan every non-executable section for printable-ASCII, NUL-terminated
/// runs, collapse each match into a single data instruction, and record a
/// `String` label for it.
///
/// Idempotent per disassembly: if any `String` label already exists, the
/// parser does nothing.
pub fn run(store: &dyn Store, min_length: usize) -> Result<(), Error> {
    if !store.get_strings()?.is_empty() {
        tracing::debug!("string parser: strings already present, skipping");
        return Ok(());
    }

    let pattern = format!(r"[\x20-\x7e]{{{},}}\x00", min_length.saturating_sub(1));
    let regex = Regex::new(&pattern).expect("pattern built from a usize length is always valid");

    for section in store.get_sections(Some(false))? {
        for matched in regex.find_iter(&section.bytes) {
            let addr = matched.start() as u64;
            let contents = matched.as_bytes().to_vec();
            let name_bytes = &contents[..contents.len() - 1];
            let name = String::from_utf8_lossy(name_bytes).into_owned();

            store.batch_delete_insts_in_addr_ranges(&section.name, &[addr..addr + contents.len() as u64])?;
            store.add_instruction(
                &section.name,
                Instruction::data_string(addr, section.base_addr + addr, contents.clone()),
                true,
            )?;
            store.add_label(Label::String(StringLabel {
                name,
                r_addr: addr,
                sec_name: section.name.clone(),
                contents: contents.clone(),
            }))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use haevn_core::{Arch, Attribute, Disassembly, Format, InstructionBody, Mode, Section};
    use haevn_storage::MemoryStore;

    use super::*;

    fn disassembly() -> Disassembly {
        Disassembly {
            name: "main".to_string(),
            binary_name: "a.out".to_string(),
            format: Format::Elf,
            arch: Arch::X86,
            mode: Mode::Bits64Little,
            md5: [0; 16],
            size: 0,
            entry_point: 0x1000,
        }
    }

    fn seeded_store(bytes: Vec<u8>) -> MemoryStore {
        let store = MemoryStore::new();
        store.load_project("proj").unwrap();
        store.add_disassembly(disassembly()).unwrap();
        store.add_section(Section::new(".rodata", bytes, Attribute::Read.into(), 0x2000)).unwrap();
        store
    }

    #[test]
    fn test_matches_a_nul_terminated_string_of_minimum_length() {
        let mut bytes = b"\x00\x00hello\x00".to_vec();
        bytes.extend_from_slice(&[0u8; 4]);
        let store = seeded_store(bytes);

        run(&store, 5).unwrap();

        let strings = store.get_strings().unwrap();
        assert_eq!(strings.len(), 1);
        assert_eq!(strings[0].name, "hello");
        assert_eq!(strings[0].r_addr, 2);

        let instructions = store.get_instructions(".rodata").unwrap();
        let data_inst = instructions.iter().find(|inst| inst.r_addr == strings[0].r_addr).unwrap();
        assert_eq!(data_inst.bytes, strings[0].contents);
        match &data_inst.body {
            InstructionBody::Data { disp } => assert_eq!(disp, "str"),
            InstructionBody::Text { .. } => panic!("expected a data instruction"),
        }
    }

    #[test]
    fn test_shorter_than_minimum_length_is_not_matched() {
        let store = seeded_store(b"\x00hi\x00\x00\x00\x00\x00".to_vec());

        run(&store, 5).unwrap();

        assert!(store.get_strings().unwrap().is_empty());
    }

    #[test]
    fn test_is_idempotent_when_strings_already_exist() {
        let store = seeded_store(b"hello\x00".to_vec());

        run(&store, 5).unwrap();
        let first_pass = store.get_strings().unwrap().len();

        store.add_section(Section::new(".rodata2", b"world\x00".to_vec(), Attribute::Read.into(), 0x3000)).unwrap();
        run(&store, 5).unwrap();

        assert_eq!(store.get_strings().unwrap().len(), first_pass);
    }
}
