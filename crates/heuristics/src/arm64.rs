use capstone::arch::arm64::{Arm64CC, Arm64Insn, Arm64OperandType};
use capstone::arch::ArchOperand;
use capstone::InsnGroupType;
use haevn_core::{DisplayValue, MemOperand, NumberDisplay, Operand, OperandValue};

use crate::RawInsn;

/// AArch64 instruction classification: call ≈ `BL`/`BLX` group, ret ≈ `BLR`
/// id set.
pub(crate) struct Arm64Heuristics;

fn arm64_operands(raw: &RawInsn) -> Vec<capstone::arch::arm64::Arm64Operand> {
    raw.detail
        .arch_detail()
        .operands()
        .into_iter()
        .filter_map(|operand| match operand {
            ArchOperand::Arm64Operand(operand) => Some(operand),
            _ => None,
        })
        .collect()
}

fn condition_code(raw: &RawInsn) -> Arm64CC {
    raw.detail.arch_detail().arm64().map_or(Arm64CC::ARM64_CC_AL, |detail| detail.cc())
}

fn first_operand_imm(raw: &RawInsn) -> Option<i64> {
    let operands = arm64_operands(raw);
    let first = operands.first()?;

    match first.op_type {
        Arm64OperandType::Imm(value) => Some(value),
        _ => None,
    }
}

impl crate::ArchHeuristics for Arm64Heuristics {
    fn process_operands(&self, raw: &RawInsn) -> Vec<Operand> {
        let operands = arm64_operands(raw);
        let op_str = raw.insn.op_str().unwrap_or_default().to_string();
        let last_index = operands.len().saturating_sub(1);

        operands
            .iter()
            .enumerate()
            .map(|(index, operand)| {
                let value = match operand.op_type {
                    Arm64OperandType::Imm(value) => {
                        OperandValue::Imm(DisplayValue { val: value, disp: NumberDisplay::Hex })
                    }
                    Arm64OperandType::Reg(reg) => {
                        OperandValue::Reg(raw.cs.reg_name(reg).unwrap_or_default())
                    }
                    Arm64OperandType::Mem(mem) => OperandValue::Mem(MemOperand {
                        base_reg: if mem.base().0 == 0 { None } else { raw.cs.reg_name(mem.base()) },
                        index_reg: if mem.index().0 == 0 { None } else { raw.cs.reg_name(mem.index()) },
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
        crate::group_contains(raw, InsnGroupType::CS_GRP_CALL)
    }

    fn is_ret(&self, raw: &RawInsn) -> bool {
        crate::group_contains(raw, InsnGroupType::CS_GRP_RET)
    }

    fn is_jump(&self, raw: &RawInsn) -> bool {
        raw.insn.id().0 == Arm64Insn::ARM64_INS_B as u32 && condition_code(raw) == Arm64CC::ARM64_CC_AL
    }

    fn is_conditional_jump(&self, raw: &RawInsn) -> bool {
        let id = raw.insn.id().0;

        (id == Arm64Insn::ARM64_INS_B as u32 && condition_code(raw) != Arm64CC::ARM64_CC_AL)
            || id == Arm64Insn::ARM64_INS_CBZ as u32
            || id == Arm64Insn::ARM64_INS_CBNZ as u32
            || id == Arm64Insn::ARM64_INS_TBZ as u32
            || id == Arm64Insn::ARM64_INS_TBNZ as u32
    }

    fn op_call_get_addr(&self, raw: &RawInsn) -> Option<i64> {
        first_operand_imm(raw)
    }

    fn op_jump_get_addr(&self, raw: &RawInsn) -> Option<i64> {
        first_operand_imm(raw)
    }

    fn op_conditional_jump_option(&self, raw: &RawInsn) -> Option<i64> {
        first_operand_imm(raw)
    }
}
