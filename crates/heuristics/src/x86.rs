use capstone::arch::x86::{X86Insn, X86OperandType};
use capstone::arch::ArchOperand;
use capstone::InsnGroupType;
use haevn_core::{DisplayValue, FpOperand, MemOperand, NumberDisplay, Operand, OperandValue};

use crate::RawInsn;

/// x86/x86-64 instruction classification.
pub(crate) struct X86Heuristics;

fn reg_name(raw: &RawInsn, reg: capstone::RegId) -> Option<String> {
    if reg.0 == 0 {
        None
    } else {
        raw.cs.reg_name(reg)
    }
}

fn x86_operands<'a>(raw: &'a RawInsn) -> Vec<capstone::arch::x86::X86Operand> {
    raw.detail
        .arch_detail()
        .operands()
        .into_iter()
        .filter_map(|operand| match operand {
            ArchOperand::X86Operand(operand) => Some(operand),
            _ => None,
        })
        .collect()
}

/// Target-extraction rule shared by `call`, unconditional jump, and the
/// taken branch of a conditional jump: only a literal `imm` operand yields
/// a target, and only the first decoded operand is inspected.
fn first_operand_imm(raw: &RawInsn) -> Option<i64> {
    let operands = x86_operands(raw);
    let first = operands.first()?;

    match first.op_type {
        X86OperandType::Imm(value) => Some(value),
        _ => None,
    }
}

impl crate::ArchHeuristics for X86Heuristics {
    fn process_operands(&self, raw: &RawInsn) -> Vec<Operand> {
        let operands = x86_operands(raw);
        let op_str = raw.insn.op_str().unwrap_or_default().to_string();
        let last_index = operands.len().saturating_sub(1);

        operands
            .iter()
            .enumerate()
            .map(|(index, operand)| {
                let value = match operand.op_type {
                    X86OperandType::Fp(value) => {
                        OperandValue::Fp(FpOperand { val: value, disp: NumberDisplay::Dec })
                    }
                    X86OperandType::Imm(value) => {
                        OperandValue::Imm(DisplayValue { val: value, disp: NumberDisplay::Hex })
                    }
                    X86OperandType::Mem(mem) => OperandValue::Mem(MemOperand {
                        base_reg: reg_name(raw, mem.base()),
                        index_reg: reg_name(raw, mem.index()),
                        rel: DisplayValue { val: mem.disp(), disp: NumberDisplay::Hex },
                        scale: DisplayValue { val: mem.scale() as i64, disp: NumberDisplay::Dec },
                    }),
                    X86OperandType::Reg(reg) => {
                        OperandValue::Reg(raw.cs.reg_name(reg).unwrap_or_default())
                    }
                    X86OperandType::Invalid => OperandValue::Invalid,
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
            || crate::group_contains(raw, InsnGroupType::CS_GRP_IRET)
    }

    // Preserved as observed: this uses the decoder's instruction-id rather
    // than the `CS_GRP_JUMP` group flag `is_call`/`is_ret` use, which is
    // inconsistent but not a bug we're asked to fix.
    fn is_jump(&self, raw: &RawInsn) -> bool {
        let id = raw.insn.id().0;

        id == X86Insn::X86_INS_JMP as u32 || id == X86Insn::X86_INS_LJMP as u32
    }

    fn is_conditional_jump(&self, raw: &RawInsn) -> bool {
        const CONDITIONAL_JUMPS: &[X86Insn] = &[
            X86Insn::X86_INS_JA,
            X86Insn::X86_INS_JAE,
            X86Insn::X86_INS_JB,
            X86Insn::X86_INS_JBE,
            X86Insn::X86_INS_JCXZ,
            X86Insn::X86_INS_JE,
            X86Insn::X86_INS_JECXZ,
            X86Insn::X86_INS_JG,
            X86Insn::X86_INS_JGE,
            X86Insn::X86_INS_JL,
            X86Insn::X86_INS_JLE,
            X86Insn::X86_INS_JMP,
            X86Insn::X86_INS_JNE,
            X86Insn::X86_INS_JNO,
            X86Insn::X86_INS_JNP,
            X86Insn::X86_INS_JNS,
            X86Insn::X86_INS_JO,
            X86Insn::X86_INS_JP,
            X86Insn::X86_INS_JRCXZ,
            X86Insn::X86_INS_JS,
        ];

        let id = raw.insn.id().0;

        CONDITIONAL_JUMPS.iter().any(|candidate| *candidate as u32 == id)
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
