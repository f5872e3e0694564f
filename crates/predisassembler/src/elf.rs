use haevn_core::{AbsoluteAddress, Arch, Operand, OperandValue};
use haevn_frontend::BinaryFrontend;
use haevn_heuristics::{build_capstone, for_arch, RawInsn};

/// Bound on how many instructions are decoded from `_start` before giving up.
const MAX_SCAN_INSTRUCTIONS: usize = 200;

/// Find the immediate loaded into the `main`-argument register just before
/// the first `call`, mirroring the `_start` → `__libc_start_main` /
/// `__libc_start_init` convention on X86_64 and, analogously, AArch64:
/// decoding proceeds linearly from `_start`, and when the first `call` is
/// hit, the previously decoded instruction is inspected; if it has exactly
/// two operands and the second is a literal immediate, that immediate is
/// the extra entry point.
pub(crate) fn run(frontend: &dyn BinaryFrontend) -> Vec<AbsoluteAddress> {
    let (Some(arch), Some(mode)) = (frontend.arch(), frontend.mode()) else {
        tracing::debug!("predisassembler: arch/mode unknown, yielding no extra entry points");
        return Vec::new();
    };

    let Some(entry_point) = frontend.entry_point() else {
        tracing::debug!("predisassembler: binary has no entry point");
        return Vec::new();
    };

    let Some(section) =
        frontend.executable_sections().into_iter().find(|section| section.contains_addr(entry_point))
    else {
        tracing::debug!(entry_point, "predisassembler: entry point falls outside every executable section");
        return Vec::new();
    };

    let cs = match build_capstone(arch, mode) {
        Ok(cs) => cs,
        Err(error) => {
            tracing::warn!(%error, "predisassembler: could not build a decoder for this binary's arch/mode");
            return Vec::new();
        }
    };

    let heuristics = for_arch(arch);
    // Only X86_64 and AArch64 carry the "load argument, then call" prelude
    // this heuristic looks for; 32-bit x86 passes arguments on the stack,
    // so the pattern does not apply there.
    let supports_call_arg_convention = matches!(arch, Arch::X86 if mode.is_64_bits()) || arch == Arch::Arm64;

    let mut offset = (entry_point - section.base_addr) as usize;
    let mut previous_operands: Option<Vec<Operand>> = None;
    let mut scanned = 0;

    while scanned < MAX_SCAN_INSTRUCTIONS && offset < section.bytes.len() {
        let remaining = &section.bytes[offset..];
        let addr = section.base_addr + offset as u64;

        let instructions = match cs.disasm_count(remaining, addr, 1) {
            Ok(instructions) => instructions,
            Err(error) => {
                tracing::debug!(%error, addr, "predisassembler: decoder error, giving up");
                return Vec::new();
            }
        };

        let Some(insn) = instructions.iter().next() else {
            // Decoder stall: resynchronize one byte forward, same recovery
            // rule as the linear strategy.
            offset += 1;
            continue;
        };

        let Ok(detail) = cs.insn_detail(&insn) else {
            offset += insn.bytes().len().max(1);
            continue;
        };

        let raw = RawInsn { cs: &cs, insn: &insn, detail: &detail };

        if heuristics.is_call(&raw) {
            if supports_call_arg_convention {
                if let Some(operands) = previous_operands {
                    if operands.len() == 2 {
                        if let OperandValue::Imm(value) = &operands[1].value {
                            return vec![value.val as u64];
                        }
                    }
                }
            }

            return Vec::new();
        }

        previous_operands = Some(heuristics.process_operands(&raw));
        offset += insn.bytes().len();
        scanned += 1;
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use haevn_core::{Arch, Attribute, Format, Mode, Section};

    use super::*;

    struct FakeFrontend {
        arch: Option<Arch>,
        mode: Option<Mode>,
        entry_point: Option<AbsoluteAddress>,
        sections: Vec<Section>,
    }

    impl BinaryFrontend for FakeFrontend {
        fn format(&self) -> Format {
            Format::Elf
        }

        fn arch(&self) -> Option<Arch> {
            self.arch
        }

        fn mode(&self) -> Option<Mode> {
            self.mode
        }

        fn md5(&self) -> [u8; 16] {
            [0; 16]
        }

        fn size(&self) -> u64 {
            self.sections.iter().map(Section::size).sum()
        }

        fn entry_point(&self) -> Option<AbsoluteAddress> {
            self.entry_point
        }

        fn sections(&self) -> &[Section] {
            &self.sections
        }
    }

    #[test]
    fn test_no_call_within_scan_bound_yields_nothing() {
        // 200 NOPs: the scan bound is hit before any `call` appears.
        let frontend = FakeFrontend {
            arch: Some(Arch::X86),
            mode: Some(Mode::Bits64Little),
            entry_point: Some(0x1000),
            sections: vec![Section::new(
                ".text",
                vec![0x90; 256],
                Attribute::Execute | Attribute::Read,
                0x1000,
            )],
        };

        assert!(run(&frontend).is_empty());
    }

    #[test]
    fn test_call_with_preceding_mov_imm_and_reg_yields_the_immediate() {
        // `mov edi, 0x2000` ; `call rel32` (call $+5, but what matters is
        // that the previous instruction has a reg and an imm operand).
        let mut bytes = vec![0xbf, 0x00, 0x20, 0x00, 0x00];
        bytes.extend_from_slice(&[0xe8, 0x00, 0x00, 0x00, 0x00]);

        let frontend = FakeFrontend {
            arch: Some(Arch::X86),
            mode: Some(Mode::Bits64Little),
            entry_point: Some(0x1000),
            sections: vec![Section::new(".text", bytes, Attribute::Execute | Attribute::Read, 0x1000)],
        };

        assert_eq!(run(&frontend), vec![0x2000]);
    }

    #[test]
    fn test_32_bit_x86_never_yields_an_extra_entry_point() {
        let mut bytes = vec![0xbf, 0x00, 0x20, 0x00, 0x00];
        bytes.extend_from_slice(&[0xe8, 0x00, 0x00, 0x00, 0x00]);

        let frontend = FakeFrontend {
            arch: Some(Arch::X86),
            mode: Some(Mode::Bits32Little),
            entry_point: Some(0x1000),
            sections: vec![Section::new(".text", bytes, Attribute::Execute | Attribute::Read, 0x1000)],
        };

        assert!(run(&frontend).is_empty());
    }

    #[test]
    fn test_entry_point_outside_any_section_yields_nothing() {
        let frontend = FakeFrontend {
            arch: Some(Arch::X86),
            mode: Some(Mode::Bits64Little),
            entry_point: Some(0x9000),
            sections: vec![Section::new(".text", vec![0x90; 16], Attribute::Execute | Attribute::Read, 0x1000)],
        };

        assert!(run(&frontend).is_empty());
    }
}
