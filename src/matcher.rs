//! Instruction pattern matching
//!
//! Pure structural predicates over single instructions. Operators combine
//! these to decide whether an instruction is an eligible mutation point.

use crate::bytecode::{
    is_constructor, ArithOp, CmpOp, Instruction, InvokeKind, MethodDescriptor, Opcode, ValueKind,
};

/// Arithmetic and bitwise operators eligible for replacement
pub const ARITHMETIC_OPS: [ArithOp; 11] = [
    ArithOp::Add,
    ArithOp::Sub,
    ArithOp::Mul,
    ArithOp::Div,
    ArithOp::Rem,
    ArithOp::And,
    ArithOp::Or,
    ArithOp::Xor,
    ArithOp::Shl,
    ArithOp::Shr,
    ArithOp::Ushr,
];

/// Orderings whose boundary can be shifted by one
pub const ORDERING_COMPARISONS: [CmpOp; 4] = [CmpOp::Lt, CmpOp::Le, CmpOp::Gt, CmpOp::Ge];

/// Call to an instance constructor, whatever class owns it
pub fn is_constructor_call(insn: &Instruction) -> bool {
    insn.opcode == Opcode::Invoke(InvokeKind::Special)
        && insn.method_ref().is_some_and(|m| is_constructor(&m.name))
}

pub fn is_arithmetic(insn: &Instruction) -> bool {
    matches!(insn.opcode, Opcode::Arith(op, _) if ARITHMETIC_OPS.contains(&op))
}

/// Integer conditional jump, either against zero or against another int
pub fn comparison(insn: &Instruction) -> Option<CmpOp> {
    match insn.opcode {
        Opcode::If(cmp) | Opcode::IfCmp(cmp) => Some(cmp),
        _ => None,
    }
}

pub fn is_ordering_comparison(insn: &Instruction) -> bool {
    comparison(insn).is_some_and(|cmp| ORDERING_COMPARISONS.contains(&cmp))
}

pub fn is_conditional(insn: &Instruction) -> bool {
    matches!(
        insn.opcode,
        Opcode::If(_) | Opcode::IfCmp(_) | Opcode::IfNull | Opcode::IfNonNull
    )
}

/// Return of a value (void returns excluded)
pub fn returned_value(insn: &Instruction) -> Option<ValueKind> {
    match insn.opcode {
        Opcode::Return(kind) => kind,
        _ => None,
    }
}

/// Load of an object reference from a local variable slot
pub fn is_object_load(insn: &Instruction) -> bool {
    insn.opcode == Opcode::Load(ValueKind::Ref)
}

/// Instruction that dereferences the reference on top of the stack and
/// nothing below it: a field read or a zero-argument instance call
pub fn is_field_deref(insn: &Instruction) -> bool {
    match insn.opcode {
        Opcode::GetField => true,
        Opcode::Invoke(InvokeKind::Virtual | InvokeKind::Interface) => insn
            .method_ref()
            .and_then(|m| MethodDescriptor::parse(&m.descriptor).ok())
            .is_some_and(|d| d.params.is_empty()),
        _ => false,
    }
}
