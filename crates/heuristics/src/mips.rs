use capstone::arch::mips::{MipsInsn, MipsOperandType};
use capstone::arch::ArchOperand;
use haevn_core::{DisplayValue, MemOperand, NumberDisplay, Operand, OperandValue};

use crate::RawInsn;

/// MIPS instruction classification: call ≈ `JAL` group, ret ≈ `JR RA` id
/// set. MIPS has no x86-style dense conditional-jump mnemonic space: every
/// conditional branch is its own distinct mnemonic, so `is_conditional_jump`
/// is a literal id list rather than a group/flag check.
pub(crate) struct MipsHeuristics;

const CONDITIONAL_BRANCHES: &[MipsInsn] = &[
    MipsInsn::MIPS_INS_BEQ,
    MipsInsn::MIPS_INS_BNE,
    MipsInsn::MIPS_INS_BLEZ,
    MipsInsn::MIPS_INS_BGEZ,
    MipsInsn::MIPS_INS_BGTZ,
    MipsInsn::MIPS_INS_BLTZ,
    MipsInsn::MIPS_INS_BEQL,
    MipsInsn::MIPS_INS_BNEL,
    MipsInsn::MIPS_INS_BLEZL,
    MipsInsn::MIPS_INS_BGEZL,
    MipsInsn::MIPS_INS_BGTZL,
    MipsInsn::MIPS_INS_BLTZL,
];

fn mips_operands(raw: &RawInsn) -> Vec<capstone::arch::mips::MipsOperand> {
    raw.detail
        .arch_detail()
        .operands()
        .into_iter()
        .filter_map(|operand| match operand {
            ArchOperand::MipsOperand(operand) => Some(operand),
            _ => None,
        })
        .collect()
}

fn last_operand_imm(raw: &RawInsn) -> Option<i64> {
    let operands = mips_operands(raw);
    let last = operands.last()?;

    match last.op_type {
        MipsOperandType::Imm(value) => Some(value as i64),
        _ => None,
    }
}

fn is_jr_ra(raw: &RawInsn) -> bool {
    if raw.insn.id().0 != MipsInsn::MIPS_INS_JR as u32 {
        return false;
    }

    let operands = mips_operands(raw);
    let Some(first) = operands.first() else { return false };

    matches!(first.op_type, MipsOperandType::Reg(reg) if raw.cs.reg_name(reg).as_deref() == Some("$ra"))
}

impl crate::ArchHeuristics for MipsHeuristics {
    fn process_operands(&self, raw: &RawInsn) -> Vec<Operand> {
        let operands = mips_operands(raw);
        let op_str = raw.insn.op_str().unwrap_or_default().to_string();
        let last_index = operands.len().saturating_sub(1);

        operands
            .iter()
            .enumerate()
            .map(|(index, operand)| {
                let value = match operand.op_type {
                    MipsOperandType::Imm(value) => {
                        OperandValue::Imm(DisplayValue { val: value as i64, disp: NumberDisplay::Hex })
                    }
                    MipsOperandType::Reg(reg) => {
                        OperandValue::Reg(raw.cs.reg_name(reg).unwrap_or_default())
                    }
                    MipsOperandType::Mem(mem) => OperandValue::Mem(MemOperand {
                        base_reg: if mem.base().0 == 0 { None } else { raw.cs.reg_name(mem.base()) },
                        index_reg: None,
                        rel: DisplayValue { val: mem.disp() as i64, disp: NumberDisplay::Hex },
                        scale: DisplayValue { val: 1, disp: NumberDisplay::Dec },
                    }),
                    _ => OperandValue::Invalid,
                };

                Operand::new(value, op_str.clone(), index == last_index)
            })
            .collect()
    }

    fn is_call(&self, raw: &RawInsn) -> bool {
        let id = raw.insn.id().0;

        id == MipsInsn::MIPS_INS_JAL as u32 || id == MipsInsn::MIPS_INS_JALR as u32
    }

    fn is_ret(&self, raw: &RawInsn) -> bool {
        is_jr_ra(raw)
    }

    fn is_jump(&self, raw: &RawInsn) -> bool {
        raw.insn.id().0 == MipsInsn::MIPS_INS_J as u32
    }

    fn is_conditional_jump(&self, raw: &RawInsn) -> bool {
        let id = raw.insn.id().0;

        CONDITIONAL_BRANCHES.iter().any(|candidate| *candidate as u32 == id)
    }

    fn op_call_get_addr(&self, raw: &RawInsn) -> Option<i64> {
        last_operand_imm(raw)
    }

    fn op_jump_get_addr(&self, raw: &RawInsn) -> Option<i64> {
        last_operand_imm(raw)
    }

    fn op_conditional_jump_option(&self, raw: &RawInsn) -> Option<i64> {
        last_operand_imm(raw)
    }
}
