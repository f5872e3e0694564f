use capstone::arch::ppc::{PpcInsn, PpcOperandType};
use capstone::arch::ArchOperand;
use capstone::InsnGroupType;
use haevn_core::{DisplayValue, MemOperand, NumberDisplay, Operand, OperandValue};

use crate::RawInsn;

/// PowerPC instruction classification: call ≈ `BL` group, ret ≈ `BLR` id
/// set.
pub(crate) struct PpcHeuristics;

const CONDITIONAL_BRANCHES: &[PpcInsn] = &[
    PpcInsn::PPC_INS_BC,
    PpcInsn::PPC_INS_BCA,
    PpcInsn::PPC_INS_BCL,
    PpcInsn::PPC_INS_BCLA,
    PpcInsn::PPC_INS_BDNZ,
    PpcInsn::PPC_INS_BDZ,
];

fn ppc_operands(raw: &RawInsn) -> Vec<capstone::arch::ppc::PpcOperand> {
    raw.detail
        .arch_detail()
        .operands()
        .into_iter()
        .filter_map(|operand| match operand {
            ArchOperand::PpcOperand(operand) => Some(operand),
            _ => None,
        })
        .collect()
}

fn first_operand_imm(raw: &RawInsn) -> Option<i64> {
    let operands = ppc_operands(raw);
    let first = operands.first()?;

    match first.op_type {
        PpcOperandType::Imm(value) => Some(value),
        _ => None,
    }
}

impl crate::ArchHeuristics for PpcHeuristics {
    fn process_operands(&self, raw: &RawInsn) -> Vec<Operand> {
        let operands = ppc_operands(raw);
        let op_str = raw.insn.op_str().unwrap_or_default().to_string();
        let last_index = operands.len().saturating_sub(1);

        operands
            .iter()
            .enumerate()
            .map(|(index, operand)| {
                let value = match operand.op_type {
                    PpcOperandType::Imm(value) => {
                        OperandValue::Imm(DisplayValue { val: value, disp: NumberDisplay::Hex })
                    }
                    PpcOperandType::Reg(reg) => {
                        OperandValue::Reg(raw.cs.reg_name(reg).unwrap_or_default())
                    }
                    PpcOperandType::Mem(mem) => OperandValue::Mem(MemOperand {
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
        crate::group_contains(raw, InsnGroupType::CS_GRP_CALL)
    }

    fn is_ret(&self, raw: &RawInsn) -> bool {
        crate::group_contains(raw, InsnGroupType::CS_GRP_RET)
    }

    fn is_jump(&self, raw: &RawInsn) -> bool {
        let id = raw.insn.id().0;

        id == PpcInsn::PPC_INS_B as u32 || id == PpcInsn::PPC_INS_BA as u32
    }

    fn is_conditional_jump(&self, raw: &RawInsn) -> bool {
        let id = raw.insn.id().0;

        CONDITIONAL_BRANCHES.iter().any(|candidate| *candidate as u32 == id)
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
