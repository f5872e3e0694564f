//! `haevn-heuristics` is the per-architecture instruction classification
//! layer: it turns a decoded `capstone` instruction into the operand-record
//! form of `haevn-core`, and answers the control-flow questions (`is_call`,
//! `is_jump`, …) the disassembly strategies need without themselves knowing
//! anything about a particular instruction set.

#![deny(unused)]
#![deny(warnings)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::missing_crate_level_docs)]
#![deny(rustdoc::invalid_codeblock_attributes)]
#![deny(rustdoc::invalid_rust_codeblocks)]

mod arm;
mod arm64;
mod mips;
mod ppc;
mod x86;

use capstone::{prelude::*, Capstone, CsResult, Endian, Insn, InsnDetail};
use haevn_core::{Arch, Mode, Operand};

/// A decoded instruction bundled with the `Capstone` context needed to
/// resolve register names, so heuristics never need to thread a separate
/// decoder handle around.
pub struct RawInsn<'a> {
    /// The decoder handle that produced [`Self::insn`], needed for
    /// `reg_name` lookups while building operand records.
    pub cs: &'a Capstone,
    /// The decoded instruction itself.
    pub insn: &'a Insn<'a>,
    /// Instruction detail (groups, architecture-specific operands). Always
    /// present: every strategy enables `detail(true)` on its decoder.
    pub detail: &'a InsnDetail<'a>,
}

/// Per-ISA instruction classification.
///
/// Implementors are architecture-specific but expose an identical surface
/// so the predisassembler and the disassembly strategies stay
/// architecture-agnostic.
pub trait ArchHeuristics: Send + Sync {
    /// Convert the decoder's operand objects into the shared operand-record
    /// form, tagging each with `last` and `op_str`.
    fn process_operands(&self, raw: &RawInsn) -> Vec<Operand>;

    /// Whether `raw` is a call instruction.
    fn is_call(&self, raw: &RawInsn) -> bool;

    /// Whether `raw` is an unconditional jump.
    fn is_jump(&self, raw: &RawInsn) -> bool;

    /// Whether `raw` is a conditional jump.
    fn is_conditional_jump(&self, raw: &RawInsn) -> bool;

    /// Whether `raw` is a return (or interrupt-return) instruction.
    fn is_ret(&self, raw: &RawInsn) -> bool;

    /// Target of a call instruction, if it is a literal immediate.
    fn op_call_get_addr(&self, raw: &RawInsn) -> Option<i64>;

    /// Target of an unconditional jump, if it is a literal immediate.
    fn op_jump_get_addr(&self, raw: &RawInsn) -> Option<i64>;

    /// Target of the taken branch of a conditional jump, if it is a
    /// literal immediate.
    fn op_conditional_jump_option(&self, raw: &RawInsn) -> Option<i64>;

    /// Whether `raw` is any kind of control-flow transfer (`is_call` or
    /// `is_jump`).
    fn is_branch(&self, raw: &RawInsn) -> bool {
        self.is_call(raw) || self.is_jump(raw)
    }
}

/// Build the `capstone` decoder matching `(arch, mode)`. Shared by the
/// predisassembler and the disassembly strategies so the mapping from the
/// front-end's opaque tags to a concrete decoder lives in exactly one
/// place.
pub fn build_capstone(arch: Arch, mode: Mode) -> CsResult<Capstone> {
    let endian = if mode.is_little_endian() { Endian::Little } else { Endian::Big };

    match arch {
        Arch::X86 => Capstone::new()
            .x86()
            .mode(if mode.is_64_bits() {
                capstone::arch::x86::ArchMode::Mode64
            } else {
                capstone::arch::x86::ArchMode::Mode32
            })
            .detail(true)
            .build(),
        Arch::Arm => Capstone::new()
            .arm()
            .mode(capstone::arch::arm::ArchMode::Arm)
            .endian(endian)
            .detail(true)
            .build(),
        Arch::Arm64 => {
            Capstone::new().arm64().mode(capstone::arch::arm64::ArchMode::Arm).detail(true).build()
        }
        Arch::Mips => Capstone::new()
            .mips()
            .mode(if mode.is_64_bits() {
                capstone::arch::mips::ArchMode::Mips64
            } else {
                capstone::arch::mips::ArchMode::Mips32
            })
            .endian(endian)
            .detail(true)
            .build(),
        Arch::Ppc => Capstone::new()
            .ppc()
            .mode(if mode.is_64_bits() {
                capstone::arch::ppc::ArchMode::Mode64
            } else {
                capstone::arch::ppc::ArchMode::Mode32
            })
            .endian(endian)
            .detail(true)
            .build(),
    }
}

/// Whether `raw`'s decoder-reported groups contain `group`. Shared across
/// every architecture module since `call`/`ret` classification is
/// group-based everywhere capstone assigns groups at all.
pub(crate) fn group_contains(raw: &RawInsn, group: capstone::InsnGroupType) -> bool {
    raw.detail.groups().iter().any(|candidate| candidate.0 == group as u8)
}

/// Build the heuristics object appropriate for `arch`.
pub fn for_arch(arch: Arch) -> Box<dyn ArchHeuristics> {
    match arch {
        Arch::X86 => Box::new(x86::X86Heuristics),
        Arch::Arm => Box::new(arm::ArmHeuristics),
        Arch::Arm64 => Box::new(arm64::Arm64Heuristics),
        Arch::Mips => Box::new(mips::MipsHeuristics),
        Arch::Ppc => Box::new(ppc::PpcHeuristics),
    }
}

#[cfg(test)]
mod tests {
    use capstone::prelude::*;

    use super::*;

    fn x86_64_decoder() -> Capstone {
        Capstone::new()
            .x86()
            .mode(arch::x86::ArchMode::Mode64)
            .detail(true)
            .build()
            .expect("capstone builds for x86-64")
    }

    #[test]
    fn test_ret_is_ret_and_not_call_or_jump() {
        let cs = x86_64_decoder();
        let insns = cs.disasm_count(&[0xc3], 0x1000, 1).unwrap();
        let insn = insns.iter().next().unwrap();
        let detail = cs.insn_detail(&insn).unwrap();
        let raw = RawInsn { cs: &cs, insn: &insn, detail: &detail };
        let heuristics = for_arch(Arch::X86);

        assert!(heuristics.is_ret(&raw));
        assert!(!heuristics.is_call(&raw));
        assert!(!heuristics.is_jump(&raw));
    }

    #[test]
    fn test_call_rel32_target_is_resolvable() {
        let cs = x86_64_decoder();
        // `call $+5` (relative call to the instruction right after itself).
        let insns = cs.disasm_count(&[0xe8, 0x00, 0x00, 0x00, 0x00], 0x1000, 1).unwrap();
        let insn = insns.iter().next().unwrap();
        let detail = cs.insn_detail(&insn).unwrap();
        let raw = RawInsn { cs: &cs, insn: &insn, detail: &detail };
        let heuristics = for_arch(Arch::X86);

        assert!(heuristics.is_call(&raw));
        assert_eq!(heuristics.op_call_get_addr(&raw), Some(0x1005));
    }

    #[test]
    fn test_nop_is_neither_branch_nor_ret() {
        let cs = x86_64_decoder();
        let insns = cs.disasm_count(&[0x90], 0x1000, 1).unwrap();
        let insn = insns.iter().next().unwrap();
        let detail = cs.insn_detail(&insn).unwrap();
        let raw = RawInsn { cs: &cs, insn: &insn, detail: &detail };
        let heuristics = for_arch(Arch::X86);

        assert!(!heuristics.is_branch(&raw));
        assert!(!heuristics.is_ret(&raw));
        assert!(heuristics.process_operands(&raw).is_empty());
    }
}
