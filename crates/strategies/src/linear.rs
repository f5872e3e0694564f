use std::thread;

use haevn_core::{Arch, Instruction, Mode, Section};
use haevn_heuristics::{build_capstone, for_arch, ArchHeuristics, RawInsn};
use haevn_storage::Store;

use crate::{common::build_text_instruction, Error};

/// Instructions buffered before a flush to the store.
const BATCH_SIZE: usize = 200;

/// Decode an executable section forward, byte by byte, skipping
/// undecodable bytes as one-byte data instructions.
pub(crate) fn decode_executable_section(
    store: &dyn Store,
    cs: &capstone::Capstone,
    heuristics: &dyn ArchHeuristics,
    section: &Section,
) -> Result<(), Error> {
    let mut buffer = Vec::with_capacity(BATCH_SIZE);
    let mut offset = 0usize;

    while offset < section.bytes.len() {
        let abs_addr = section.base_addr + offset as u64;
        let remaining = &section.bytes[offset..];

        let decoded = cs.disasm_count(remaining, abs_addr, 1).ok().and_then(|insns| {
            let insn = insns.iter().next()?;
            let detail = cs.insn_detail(&insn).ok()?;
            let raw = RawInsn { cs, insn: &insn, detail: &detail };
            let len = insn.bytes().len();

            (len <= remaining.len())
                .then(|| (build_text_instruction(offset as u64, abs_addr, &raw, heuristics), len))
        });

        match decoded {
            Some((instruction, len)) => {
                buffer.push(instruction);
                offset += len;
            }
            None => {
                tracing::debug!(abs_addr, "linear strategy: decode stall, emitting one byte of data");
                buffer.push(Instruction::data_byte(offset as u64, abs_addr, section.bytes[offset]));
                offset += 1;
            }
        }

        if buffer.len() >= BATCH_SIZE {
            store.batch_add_instructions(&section.name, std::mem::take(&mut buffer))?;
        }
    }

    if !buffer.is_empty() {
        store.batch_add_instructions(&section.name, buffer)?;
    }

    Ok(())
}

/// Decode a non-executable section one data instruction per byte.
pub(crate) fn decode_data_section(store: &dyn Store, section: &Section) -> Result<(), Error> {
    let mut buffer = Vec::with_capacity(BATCH_SIZE);

    for (offset, byte) in section.bytes.iter().enumerate() {
        buffer.push(Instruction::data_byte(offset as u64, section.base_addr + offset as u64, *byte));

        if buffer.len() >= BATCH_SIZE {
            store.batch_add_instructions(&section.name, std::mem::take(&mut buffer))?;
        }
    }

    if !buffer.is_empty() {
        store.batch_add_instructions(&section.name, buffer)?;
    }

    Ok(())
}

/// Run the linear sweep over every section of the current disassembly. One
/// worker per section, unless `single_threaded` forces the whole sweep onto
/// the calling thread (`Debugging.disable_multiprocessing`).
pub fn run(store: &dyn Store, arch: Arch, mode: Mode, single_threaded: bool) -> Result<(), Error> {
    let executable = store.get_sections(Some(true))?;
    let non_executable = store.get_sections(Some(false))?;

    if single_threaded {
        let cs = build_capstone(arch, mode)?;
        let heuristics = for_arch(arch);

        for section in &executable {
            decode_executable_section(store, &cs, heuristics.as_ref(), section)?;
        }

        for section in &non_executable {
            decode_data_section(store, section)?;
        }

        return Ok(());
    }

    thread::scope(|scope| -> Result<(), Error> {
        let mut handles = Vec::with_capacity(executable.len() + non_executable.len());

        for section in &executable {
            handles.push(scope.spawn(move || -> Result<(), Error> {
                let cs = build_capstone(arch, mode)?;
                let heuristics = for_arch(arch);

                decode_executable_section(store, &cs, heuristics.as_ref(), section)
            }));
        }

        for section in &non_executable {
            handles.push(scope.spawn(move || decode_data_section(store, section)));
        }

        for handle in handles {
            handle.join().expect("linear strategy worker thread panicked")?;
        }

        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use haevn_core::{Attribute, Disassembly, Format, Section};
    use haevn_storage::MemoryStore;

    use super::*;

    fn disassembly() -> Disassembly {
        Disassembly {
            name: "main".to_string(),
            binary_name: "a.out".to_string(),
            format: Format::Elf,
            arch: Arch::X86,
            mode: Mode::Bits32Little,
            md5: [0; 16],
            size: 0,
            entry_point: 0x1000,
        }
    }

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.load_project("proj").unwrap();
        store.add_disassembly(disassembly()).unwrap();
        store
    }

    #[test]
    fn test_e1_sixteen_nops_decode_as_sixteen_one_byte_instructions() {
        let store = seeded_store();
        store
            .add_section(Section::new(".text", vec![0x90; 16], Attribute::Execute | Attribute::Read, 0x1000))
            .unwrap();

        run(&store, Arch::X86, Mode::Bits32Little, true).unwrap();

        let instructions = store.get_instructions(".text").unwrap();
        assert_eq!(instructions.len(), 16);

        for (index, instruction) in instructions.iter().enumerate() {
            assert_eq!(instruction.abs_addr, 0x1000 + index as u64);
            assert_eq!(instruction.bytes.len(), 1);
            assert!(instruction.is_text);
            assert_eq!(instruction.mnemonic, "nop");
        }
    }

    #[test]
    fn test_truncated_instruction_at_section_end_falls_back_to_data() {
        let store = seeded_store();
        // `nop`, then a lone `0xff` (group opcode) with its required ModRM
        // byte missing: the decoder cannot consume it, so it is recovered
        // as one byte of data instead.
        store
            .add_section(Section::new(".text", vec![0x90, 0xff], Attribute::Execute | Attribute::Read, 0x2000))
            .unwrap();

        run(&store, Arch::X86, Mode::Bits32Little, true).unwrap();

        let instructions = store.get_instructions(".text").unwrap();
        let covered: u64 = instructions.iter().map(|i| i.bytes.len() as u64).sum();
        assert_eq!(covered, 2);
        assert!(!instructions.last().unwrap().is_text);
    }

    #[test]
    fn test_non_executable_section_is_one_instruction_per_byte() {
        let store = seeded_store();
        store
            .add_section(Section::new(".rodata", b"hi".to_vec(), Attribute::Read.into(), 0x3000))
            .unwrap();

        run(&store, Arch::X86, Mode::Bits32Little, true).unwrap();

        let instructions = store.get_instructions(".rodata").unwrap();
        assert_eq!(instructions.len(), 2);
        assert!(!instructions[0].is_text);
        assert_eq!(instructions[0].mnemonic, "db");
    }
}
