use capstone::arch::arm::{ArmCC, ArmInsn, ArmOperandType};
use capstone::arch::ArchOperand;
use capstone::InsnGroupType;
use haevn_core::{DisplayValue, MemOperand, NumberDisplay, Operand, OperandValue};

use crate::RawInsn;

/// 32-bit ARM instruction classification: call ≈ `BL`/`BLX` group, ret ≈
/// `BX LR` id set, conditional jump ≈ the architecture's condition-coded
/// branch mnemonics.
pub(crate) struct ArmHeuristics;

fn arm_operands(raw: &RawInsn) -> Vec<capstone::arch::arm::ArmOperand> {
    raw.detail
        .arch_detail()
        .operands()
        .into_iter()
        .filter_map(|operand| match operand {
            ArchOperand::ArmOperand(operand) => Some(operand),
            _ => None,
        })
        .collect()
}

fn condition_code(raw: &RawInsn) -> ArmCC {
    raw.detail.arch_detail().arm().map_or(ArmCC::ARM_CC_AL, |detail| detail.cc())
}

fn first_operand_imm(raw: &RawInsn) -> Option<i64> {
    let operands = arm_operands(raw);
    let first = operands.first()?;

    match first.op_type {
        ArmOperandType::Imm(value) => Some(value as i64),
        _ => None,
    }
}

impl crate::ArchHeuristics for ArmHeuristics {
    fn process_operands(&self, raw: &RawInsn) -> Vec<Operand> {
        let operands = arm_operands(raw);
        let op_str = raw.insn.op_str().unwrap_or_default().to_string();
        let last_index = operands.len().saturating_sub(1);

        operands
            .iter()
            .enumerate()
            .map(|(index, operand)| {
                let value = match operand.op_type {
                    ArmOperandType::Imm(value) => {
                        OperandValue::Imm(DisplayValue { val: value as i64, disp: NumberDisplay::Hex })
                    }
                    ArmOperandType::Reg(reg) => {
                        OperandValue::Reg(raw.cs.reg_name(reg).unwrap_or_default())
                    }
                    ArmOperandType::Mem(mem) => OperandValue::Mem(MemOperand {
                        base_reg: if mem.base().0 == 0 { None } else { raw.cs.reg_name(mem.base()) },
                        index_reg: if mem.index().0 == 0 { None } else { raw.cs.reg_name(mem.index()) },
                        rel: DisplayValue { val: mem.disp() as i64, disp: NumberDisplay::Hex },
                        scale: DisplayValue { val: mem.scale() as i64, disp: NumberDisplay::Dec },
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
        raw.insn.id().0 == ArmInsn::ARM_INS_B as u32 && condition_code(raw) == ArmCC::ARM_CC_AL
    }

    fn is_conditional_jump(&self, raw: &RawInsn) -> bool {
        raw.insn.id().0 == ArmInsn::ARM_INS_B as u32 && condition_code(raw) != ArmCC::ARM_CC_AL
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
