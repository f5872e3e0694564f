use haevn_core::{AbsoluteAddress, Instruction, RelativeAddress};
use haevn_heuristics::{ArchHeuristics, RawInsn};

/// Build a decoded, textual [`Instruction`] out of a classified
/// [`RawInsn`], shared by the linear and recursive strategies so the
/// mnemonic/operand extraction rule lives in exactly one place.
pub(crate) fn build_text_instruction(
    r_addr: RelativeAddress,
    abs_addr: AbsoluteAddress,
    raw: &RawInsn,
    heuristics: &dyn ArchHeuristics,
) -> Instruction {
    let bytes = raw.insn.bytes().to_vec();
    let mnemonic = raw.insn.mnemonic().unwrap_or_default().to_string();
    let operands = heuristics.process_operands(raw);

    Instruction::text(r_addr, abs_addr, bytes, mnemonic, operands)
}
