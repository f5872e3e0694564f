use haevn_core::{InstructionBody, Label, Location};
use haevn_storage::{Error, Store};

/// Minimum absolute value a candidate operand address must reach before it
/// is treated as a pointer rather than a small integer constant.
const MIN_POINTER_VALUE: i64 = 0x10000;

/// Resolve every executable instruction's operand candidate addresses
/// against the section map, recording a [`Location`] label and an `Xref`
/// for each hit, and writing the resolved operand back onto the
/// instruction.
pub fn run(store: &dyn Store) -> Result<(), Error> {
    for section in store.get_sections(Some(true))? {
        for mut instruction in store.get_instructions(&section.name)? {
            let mut changed = false;

            let InstructionBody::Text { ref mut operands } = instruction.body else {
                continue;
            };

            for operand in operands.iter_mut() {
                let Some(candidate) = operand.xref_candidate() else { continue };

                if candidate < MIN_POINTER_VALUE {
                    continue;
                }

                let addr = candidate as u64;
                let Some(target_section) = store.get_section_containing_addr(addr)? else {
                    continue;
                };

                let location = Location {
                    name: Location::conventional_name(addr),
                    r_addr: addr - target_section.base_addr,
                    sec_name: target_section.name.clone(),
                };

                let id = store.upsert_label(Label::Location(location.clone()))?;
                store.add_xref(haevn_core::Xref::new(
                    instruction.r_addr,
                    section.name.clone(),
                    location.r_addr,
                    location.sec_name.clone(),
                ))?;

                operand.xref = Some(id);
                changed = true;
            }

            if changed {
                store.add_instruction(&section.name, instruction, true)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use haevn_core::{
        Arch, Attribute, DisplayValue, Disassembly, Format, Instruction, Mode, NumberDisplay, Operand,
        OperandValue, Section,
    };
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

    #[test]
    fn test_resolves_an_immediate_pointing_into_another_section() {
        let store = MemoryStore::new();
        store.load_project("proj").unwrap();
        store.add_disassembly(disassembly()).unwrap();
        store.add_section(Section::new(".text", vec![0x90; 16], Attribute::Execute.into(), 0x1000)).unwrap();
        store.add_section(Section::new(".rodata", vec![0u8; 16], Attribute::Read.into(), 0x2000)).unwrap();

        let operand = Operand::new(
            OperandValue::Imm(DisplayValue { val: 0x2004, disp: NumberDisplay::Hex }),
            "0x2004",
            true,
        );
        store
            .add_instruction(
                ".text",
                Instruction::text(0, 0x1000, vec![0x90], "lea", vec![operand]),
                true,
            )
            .unwrap();

        run(&store).unwrap();

        let locations = store.get_locations().unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].name, "loc_00002004");

        let rewritten = store.get_instructions(".text").unwrap();
        let operands = rewritten[0].operands().unwrap();
        assert!(operands[0].xref.is_some());
    }

    #[test]
    fn test_small_immediate_is_not_treated_as_a_pointer() {
        let store = MemoryStore::new();
        store.load_project("proj").unwrap();
        store.add_disassembly(disassembly()).unwrap();
        store.add_section(Section::new(".text", vec![0x90; 16], Attribute::Execute.into(), 0x1000)).unwrap();

        let operand =
            Operand::new(OperandValue::Imm(DisplayValue { val: 4, disp: NumberDisplay::Dec }), "4", true);
        store
            .add_instruction(".text", Instruction::text(0, 0x1000, vec![0x90], "add", vec![operand]), true)
            .unwrap();

        run(&store).unwrap();

        assert!(store.get_locations().unwrap().is_empty());
    }
}
