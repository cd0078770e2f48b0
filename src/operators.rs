//! Mutation operators and their registry
//!
//! Every operator is a stateless unit struct; whatever it has to remember
//! while walking a method lives in the visitor it creates for that method.

use std::sync::Arc;

use log::debug;

use crate::bytecode::{
    ArithOp, CmpOp, Instruction, MethodDescriptor, MethodInfo, NumType, Opcode, Operand, ValueKind,
};
use crate::error::{MutationError, Result};
use crate::matcher;
use crate::mutator::{InsnVisitor, MethodMutator, Substitution};

/// Name of the group holding the default operators
pub const DEFAULTS_GROUP: &str = "DEFAULTS";

/// Name of the group holding every operator
pub const ALL_GROUP: &str = "ALL";

/// Every known operator, in registry order
pub fn all() -> Vec<Arc<dyn MethodMutator>> {
    vec![
        Arc::new(ConditionalsBoundaryMutator),
        Arc::new(MathMutator),
        Arc::new(NegateConditionalsMutator),
        Arc::new(ReturnValsMutator),
        Arc::new(ConstructorCallMutator),
        Arc::new(CheckNullObjectMutator),
    ]
}

pub fn defaults() -> Vec<Arc<dyn MethodMutator>> {
    vec![
        Arc::new(ConditionalsBoundaryMutator),
        Arc::new(MathMutator),
        Arc::new(NegateConditionalsMutator),
        Arc::new(ReturnValsMutator),
    ]
}

/// Resolve operator and group names, keeping configuration order and
/// dropping repeats
pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Vec<Arc<dyn MethodMutator>>> {
    let mut selected: Vec<Arc<dyn MethodMutator>> = Vec::new();

    for name in names {
        let name = name.as_ref();
        let found = match name {
            DEFAULTS_GROUP => defaults(),
            ALL_GROUP => all(),
            _ => {
                let operator = all()
                    .into_iter()
                    .find(|m| m.name() == name)
                    .ok_or_else(|| MutationError::ConfigError {
                        message: format!(
                            "Unknown mutator '{}'. Available: {}",
                            name,
                            available_names().join(", ")
                        ),
                    })?;
                vec![operator]
            }
        };

        for operator in found {
            if !selected
                .iter()
                .any(|m| m.globally_unique_id() == operator.globally_unique_id())
            {
                selected.push(operator);
            }
        }
    }

    Ok(selected)
}

pub fn available_names() -> Vec<&'static str> {
    let mut names = vec![DEFAULTS_GROUP, ALL_GROUP];
    names.extend(all().iter().map(|m| m.name()));
    names
}

/// Replaces calls to constructors with `null`
///
/// Only calls paired with a preceding `New` are mutated; a constructor
/// delegating to `super(..)` or `this(..)` has no such pairing.
#[derive(Debug)]
pub struct ConstructorCallMutator;

impl MethodMutator for ConstructorCallMutator {
    fn name(&self) -> &'static str {
        "CONSTRUCTOR_CALLS"
    }

    fn globally_unique_id(&self) -> &'static str {
        concat!(module_path!(), "::ConstructorCallMutator")
    }

    fn create_visitor(&self, _method: &MethodInfo) -> Box<dyn InsnVisitor> {
        Box::new(ConstructorCallVisitor { pending_new: 0 })
    }
}

struct ConstructorCallVisitor {
    /// `New` instructions not yet paired with their `<init>` call
    pending_new: usize,
}

impl InsnVisitor for ConstructorCallVisitor {
    fn visit(&mut self, insns: &[Instruction], at: usize) -> Option<Substitution> {
        let insn = &insns[at];
        if insn.opcode == Opcode::New {
            self.pending_new += 1;
            return None;
        }
        if !matcher::is_constructor_call(insn) {
            return None;
        }
        if self.pending_new == 0 {
            return None;
        }
        self.pending_new -= 1;

        let target = insn.method_ref()?;
        let descriptor = match MethodDescriptor::parse(&target.descriptor) {
            Ok(d) => d,
            Err(e) => {
                debug!("Not mutating constructor call: {}", e);
                return None;
            }
        };

        // Arguments, the receiver, then the reference left by `New`
        let mut replacement: Vec<Instruction> = (0..descriptor.params.len() + 2)
            .map(|_| Instruction::new(Opcode::Pop))
            .collect();
        replacement.push(Instruction::new(Opcode::AConstNull));

        Some(Substitution::single(
            replacement,
            format!("removed call to {}::{}", target.owner, target.name),
        ))
    }
}

/// Swaps arithmetic and bitwise operators
#[derive(Debug)]
pub struct MathMutator;

impl MathMutator {
    fn replacement(op: ArithOp, ty: NumType) -> Option<ArithOp> {
        let replaced = match op {
            ArithOp::Add => ArithOp::Sub,
            ArithOp::Sub => ArithOp::Add,
            ArithOp::Mul => ArithOp::Div,
            ArithOp::Div => ArithOp::Mul,
            ArithOp::Rem => ArithOp::Mul,
            ArithOp::And => ArithOp::Or,
            ArithOp::Or => ArithOp::And,
            ArithOp::Xor => ArithOp::And,
            ArithOp::Shl => ArithOp::Shr,
            ArithOp::Shr => ArithOp::Shl,
            ArithOp::Ushr => ArithOp::Shl,
        };
        (ty.is_integral() || !replaced.is_bitwise()).then_some(replaced)
    }
}

impl MethodMutator for MathMutator {
    fn name(&self) -> &'static str {
        "MATH"
    }

    fn globally_unique_id(&self) -> &'static str {
        concat!(module_path!(), "::MathMutator")
    }

    fn create_visitor(&self, _method: &MethodInfo) -> Box<dyn InsnVisitor> {
        Box::new(MathVisitor)
    }
}

struct MathVisitor;

impl InsnVisitor for MathVisitor {
    fn visit(&mut self, insns: &[Instruction], at: usize) -> Option<Substitution> {
        let insn = &insns[at];
        if !matcher::is_arithmetic(insn) {
            return None;
        }
        let Opcode::Arith(op, ty) = insn.opcode else {
            return None;
        };
        let replaced = MathMutator::replacement(op, ty)?;
        Some(Substitution::single(
            vec![Instruction::new(Opcode::Arith(replaced, ty))],
            format!(
                "Replaced {} {} with {}",
                ty.describe(),
                op.describe(),
                replaced.describe()
            ),
        ))
    }
}

/// Rebuild a conditional jump with a different comparison, same target
fn with_comparison(insn: &Instruction, cmp: CmpOp) -> Instruction {
    let opcode = match insn.opcode {
        Opcode::IfCmp(_) => Opcode::IfCmp(cmp),
        _ => Opcode::If(cmp),
    };
    Instruction::with_operand(opcode, insn.operand.clone())
}

/// Moves the boundary of ordering comparisons: `<` becomes `<=` and so on
#[derive(Debug)]
pub struct ConditionalsBoundaryMutator;

impl MethodMutator for ConditionalsBoundaryMutator {
    fn name(&self) -> &'static str {
        "CONDITIONALS_BOUNDARY"
    }

    fn globally_unique_id(&self) -> &'static str {
        concat!(module_path!(), "::ConditionalsBoundaryMutator")
    }

    fn create_visitor(&self, _method: &MethodInfo) -> Box<dyn InsnVisitor> {
        Box::new(ConditionalsBoundaryVisitor)
    }
}

struct ConditionalsBoundaryVisitor;

impl InsnVisitor for ConditionalsBoundaryVisitor {
    fn visit(&mut self, insns: &[Instruction], at: usize) -> Option<Substitution> {
        let insn = &insns[at];
        if !matcher::is_ordering_comparison(insn) {
            return None;
        }
        let replaced = match matcher::comparison(insn)? {
            CmpOp::Lt => CmpOp::Le,
            CmpOp::Le => CmpOp::Lt,
            CmpOp::Gt => CmpOp::Ge,
            CmpOp::Ge => CmpOp::Gt,
            CmpOp::Eq | CmpOp::Ne => return None,
        };
        Some(Substitution::single(
            vec![with_comparison(insn, replaced)],
            "changed conditional boundary",
        ))
    }
}

/// Inverts conditional jumps
#[derive(Debug)]
pub struct NegateConditionalsMutator;

impl MethodMutator for NegateConditionalsMutator {
    fn name(&self) -> &'static str {
        "NEGATE_CONDITIONALS"
    }

    fn globally_unique_id(&self) -> &'static str {
        concat!(module_path!(), "::NegateConditionalsMutator")
    }

    fn create_visitor(&self, _method: &MethodInfo) -> Box<dyn InsnVisitor> {
        Box::new(NegateConditionalsVisitor)
    }
}

struct NegateConditionalsVisitor;

impl InsnVisitor for NegateConditionalsVisitor {
    fn visit(&mut self, insns: &[Instruction], at: usize) -> Option<Substitution> {
        let insn = &insns[at];
        if !matcher::is_conditional(insn) {
            return None;
        }
        let negated = match insn.opcode {
            Opcode::IfNull => Instruction::with_operand(Opcode::IfNonNull, insn.operand.clone()),
            Opcode::IfNonNull => Instruction::with_operand(Opcode::IfNull, insn.operand.clone()),
            _ => {
                let cmp = match matcher::comparison(insn)? {
                    CmpOp::Eq => CmpOp::Ne,
                    CmpOp::Ne => CmpOp::Eq,
                    CmpOp::Lt => CmpOp::Ge,
                    CmpOp::Ge => CmpOp::Lt,
                    CmpOp::Gt => CmpOp::Le,
                    CmpOp::Le => CmpOp::Gt,
                };
                with_comparison(insn, cmp)
            }
        };
        Some(Substitution::single(vec![negated], "negated conditional"))
    }
}

/// Changes the value returned by a method
#[derive(Debug)]
pub struct ReturnValsMutator;

impl MethodMutator for ReturnValsMutator {
    fn name(&self) -> &'static str {
        "RETURN_VALS"
    }

    fn globally_unique_id(&self) -> &'static str {
        concat!(module_path!(), "::ReturnValsMutator")
    }

    fn create_visitor(&self, method: &MethodInfo) -> Box<dyn InsnVisitor> {
        Box::new(ReturnValsVisitor {
            zero_label: method.next_label,
        })
    }
}

struct ReturnValsVisitor {
    zero_label: u32,
}

impl InsnVisitor for ReturnValsVisitor {
    fn visit(&mut self, insns: &[Instruction], at: usize) -> Option<Substitution> {
        let insn = &insns[at];
        let kind = matcher::returned_value(insn)?;
        let ret = Instruction::new(insn.opcode);

        let (replacement, description) = match kind {
            ValueKind::Int => (
                // x == 0 ? 1 : 0
                vec![
                    Instruction::with_operand(Opcode::If(CmpOp::Eq), Operand::Label(self.zero_label)),
                    Instruction::with_operand(Opcode::Const, Operand::Int(0)),
                    ret.clone(),
                    Instruction::with_operand(Opcode::Label, Operand::Label(self.zero_label)),
                    Instruction::with_operand(Opcode::Const, Operand::Int(1)),
                    ret,
                ],
                "replaced return of integer sized value with (x == 0 ? 1 : 0)",
            ),
            ValueKind::Long => (
                vec![
                    Instruction::with_operand(Opcode::Const, Operand::Int(1)),
                    Instruction::new(Opcode::Arith(ArithOp::Add, NumType::Long)),
                    ret,
                ],
                "replaced return of long value with value + 1",
            ),
            ValueKind::Float => (
                vec![Instruction::new(Opcode::Neg(NumType::Float)), ret],
                "replaced return of float value with -(x)",
            ),
            ValueKind::Double => (
                vec![Instruction::new(Opcode::Neg(NumType::Double)), ret],
                "replaced return of double value with -(x)",
            ),
            ValueKind::Ref => (
                vec![Instruction::new(Opcode::Pop), Instruction::new(Opcode::AConstNull), ret],
                "mutated return of Object value to null",
            ),
        };

        Some(Substitution::single(replacement, description))
    }
}

/// Guards an object dereference with a null check that returns early
///
/// A reference loaded from a local and immediately dereferenced gets
/// checked; when it is null the method returns its default value instead of
/// failing on the dereference.
#[derive(Debug)]
pub struct CheckNullObjectMutator;

impl MethodMutator for CheckNullObjectMutator {
    fn name(&self) -> &'static str {
        "CHECK_NULL_OBJECT"
    }

    fn globally_unique_id(&self) -> &'static str {
        concat!(module_path!(), "::CheckNullObjectMutator")
    }

    fn create_visitor(&self, method: &MethodInfo) -> Box<dyn InsnVisitor> {
        Box::new(CheckNullObjectVisitor {
            is_static: method.is_static,
            returns: method.return_kind(),
            non_null_label: method.next_label,
        })
    }
}

struct CheckNullObjectVisitor {
    is_static: bool,
    returns: Option<ValueKind>,
    non_null_label: u32,
}

impl CheckNullObjectVisitor {
    fn default_return(&self) -> Vec<Instruction> {
        match self.returns {
            None => vec![Instruction::new(Opcode::Return(None))],
            Some(ValueKind::Ref) => vec![
                Instruction::new(Opcode::AConstNull),
                Instruction::new(Opcode::Return(Some(ValueKind::Ref))),
            ],
            Some(kind) => vec![
                Instruction::with_operand(Opcode::Const, Operand::Int(0)),
                Instruction::new(Opcode::Return(Some(kind))),
            ],
        }
    }
}

impl InsnVisitor for CheckNullObjectVisitor {
    fn visit(&mut self, insns: &[Instruction], at: usize) -> Option<Substitution> {
        let insn = &insns[at];
        if !matcher::is_object_load(insn) {
            return None;
        }
        // `this` is never null
        if !self.is_static && insn.var() == Some(0) {
            return None;
        }
        if !insns.get(at + 1).is_some_and(matcher::is_field_deref) {
            return None;
        }

        let mut replacement = vec![
            Instruction::with_operand(insn.opcode, insn.operand.clone()),
            Instruction::new(Opcode::Dup),
            Instruction::with_operand(Opcode::IfNonNull, Operand::Label(self.non_null_label)),
            Instruction::new(Opcode::Pop),
        ];
        replacement.extend(self.default_return());
        replacement.push(Instruction::with_operand(
            Opcode::Label,
            Operand::Label(self.non_null_label),
        ));

        Some(Substitution::single(
            replacement,
            format!(
                "added null check returning default value before dereference of local {}",
                insn.var().unwrap_or_default()
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{exit_stack_delta, ClassName, FieldRef, InvokeKind, Method, MethodRef};
    use crate::context::ClassContext;
    use crate::details::MutationDetails;
    use crate::mutator::rewrite_method;

    fn new_insn(class: &str) -> Instruction {
        Instruction::with_operand(Opcode::New, Operand::Type(ClassName::new(class)))
    }

    fn init(owner: &str, descriptor: &str) -> Instruction {
        Instruction::with_operand(
            Opcode::Invoke(InvokeKind::Special),
            Operand::Method(MethodRef {
                owner: ClassName::new(owner),
                name: "<init>".to_string(),
                descriptor: descriptor.to_string(),
            }),
        )
    }

    fn iload(slot: u16) -> Instruction {
        Instruction::with_operand(Opcode::Load(ValueKind::Int), Operand::Var(slot))
    }

    fn scan(method: &Method, mutator: &dyn MethodMutator) -> Vec<MutationDetails> {
        let mut context = ClassContext::scanning(ClassName::new("com/example/Bar"));
        rewrite_method(method, mutator, &mut context);
        context.into_details()
    }

    fn apply(method: &Method, mutator: &dyn MethodMutator, details: &MutationDetails) -> Vec<Instruction> {
        let mut context = ClassContext::targeting(details.id.clone());
        let output = rewrite_method(method, mutator, &mut context);
        assert!(context.is_applied());
        output
    }

    /// Two `new Foo(..)` expressions followed by an addition
    fn two_constructions() -> Method {
        Method {
            name: "build".to_string(),
            descriptor: "(II)I".to_string(),
            is_static: true,
            instructions: vec![
                new_insn("com/example/Foo").at_line(10),
                Instruction::new(Opcode::Dup).at_line(10),
                iload(0).at_line(10),
                init("com/example/Foo", "(I)V").at_line(10),
                Instruction::with_operand(Opcode::Store(ValueKind::Ref), Operand::Var(2)).at_line(10),
                new_insn("com/example/Foo").at_line(11),
                Instruction::new(Opcode::Dup).at_line(11),
                init("com/example/Foo", "()V").at_line(11),
                Instruction::with_operand(Opcode::Store(ValueKind::Ref), Operand::Var(3)).at_line(11),
                iload(0).at_line(12),
                iload(1).at_line(12),
                Instruction::new(Opcode::Arith(ArithOp::Add, NumType::Int)).at_line(12),
                Instruction::new(Opcode::Return(Some(ValueKind::Int))).at_line(12),
            ],
        }
    }

    #[test]
    fn test_constructor_calls_found_with_sequential_indexes() {
        let details = scan(&two_constructions(), &ConstructorCallMutator);

        assert_eq!(details.len(), 2);
        assert_eq!(details[0].id.index, 0);
        assert_eq!(details[1].id.index, 1);
        assert_eq!(details[0].line, 10);
        assert_eq!(details[1].line, 11);
        assert_eq!(details[0].description, "removed call to com/example/Foo::<init>");
    }

    #[test]
    fn test_constructor_call_replaced_with_null() {
        let method = two_constructions();
        let details = scan(&method, &ConstructorCallMutator);
        let output = apply(&method, &ConstructorCallMutator, &details[0]);

        let expected: Vec<Opcode> = vec![
            Opcode::New,
            Opcode::Dup,
            Opcode::Load(ValueKind::Int),
            Opcode::Pop,
            Opcode::Pop,
            Opcode::Pop,
            Opcode::AConstNull,
            Opcode::Store(ValueKind::Ref),
        ];
        let actual: Vec<Opcode> = output.iter().take(8).map(|i| i.opcode).collect();
        assert_eq!(actual, expected);
        // Second construction untouched
        assert_eq!(output[10], method.instructions[7]);
        assert_eq!(exit_stack_delta(&output[..8]).unwrap(), Some(0));
    }

    #[test]
    fn test_super_constructor_call_skipped() {
        let method = Method {
            name: "<init>".to_string(),
            descriptor: "()V".to_string(),
            is_static: false,
            instructions: vec![
                Instruction::with_operand(Opcode::Load(ValueKind::Ref), Operand::Var(0)),
                init("java/lang/Object", "()V"),
                Instruction::new(Opcode::Return(None)),
            ],
        };
        assert!(scan(&method, &ConstructorCallMutator).is_empty());
    }

    #[test]
    fn test_math_replacements() {
        let details = scan(&two_constructions(), &MathMutator);
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].description, "Replaced integer addition with subtraction");
        assert_eq!(details[0].line, 12);

        assert_eq!(MathMutator::replacement(ArithOp::Rem, NumType::Int), Some(ArithOp::Mul));
        assert_eq!(MathMutator::replacement(ArithOp::Ushr, NumType::Long), Some(ArithOp::Shl));
        assert_eq!(MathMutator::replacement(ArithOp::Div, NumType::Double), Some(ArithOp::Mul));
    }

    fn compare_method(cmp: CmpOp) -> Method {
        Method {
            name: "check".to_string(),
            descriptor: "(II)I".to_string(),
            is_static: true,
            instructions: vec![
                iload(0).at_line(5),
                iload(1).at_line(5),
                Instruction::with_operand(Opcode::IfCmp(cmp), Operand::Label(0)).at_line(5),
                Instruction::with_operand(Opcode::Const, Operand::Int(1)).at_line(6),
                Instruction::new(Opcode::Return(Some(ValueKind::Int))).at_line(6),
                Instruction::with_operand(Opcode::Label, Operand::Label(0)),
                Instruction::with_operand(Opcode::Const, Operand::Int(0)).at_line(7),
                Instruction::new(Opcode::Return(Some(ValueKind::Int))).at_line(7),
            ],
        }
    }

    #[test]
    fn test_conditionals_boundary() {
        let method = compare_method(CmpOp::Lt);
        let details = scan(&method, &ConditionalsBoundaryMutator);
        assert_eq!(details.len(), 1);
        let output = apply(&method, &ConditionalsBoundaryMutator, &details[0]);
        assert_eq!(output[2].opcode, Opcode::IfCmp(CmpOp::Le));
        assert_eq!(output[2].operand, Operand::Label(0));

        assert!(scan(&compare_method(CmpOp::Eq), &ConditionalsBoundaryMutator).is_empty());
    }

    #[test]
    fn test_negate_conditionals() {
        let method = compare_method(CmpOp::Ge);
        let details = scan(&method, &NegateConditionalsMutator);
        let output = apply(&method, &NegateConditionalsMutator, &details[0]);
        assert_eq!(output[2].opcode, Opcode::IfCmp(CmpOp::Lt));
    }

    #[test]
    fn test_return_vals_int_uses_fresh_label() {
        let method = compare_method(CmpOp::Lt);
        let details = scan(&method, &ReturnValsMutator);
        assert_eq!(details.len(), 2);
        assert_eq!(details[1].line, 7);

        let output = apply(&method, &ReturnValsMutator, &details[0]);
        assert_eq!(output.len(), method.instructions.len() + 5);
        assert_eq!(output[4], Instruction::with_operand(Opcode::If(CmpOp::Eq), Operand::Label(1)).at_line(6));
    }

    #[test]
    fn test_return_vals_object_returns_null() {
        let method = Method {
            name: "name".to_string(),
            descriptor: "()Ljava/lang/String;".to_string(),
            is_static: false,
            instructions: vec![
                Instruction::with_operand(Opcode::Const, Operand::Text("x".to_string())),
                Instruction::new(Opcode::Return(Some(ValueKind::Ref))),
            ],
        };
        let details = scan(&method, &ReturnValsMutator);
        let output = apply(&method, &ReturnValsMutator, &details[0]);
        let opcodes: Vec<Opcode> = output.iter().map(|i| i.opcode).collect();
        assert_eq!(
            opcodes,
            vec![
                Opcode::Const,
                Opcode::Pop,
                Opcode::AConstNull,
                Opcode::Return(Some(ValueKind::Ref))
            ]
        );
    }

    #[test]
    fn test_check_null_object() {
        let size = Instruction::with_operand(
            Opcode::GetField,
            Operand::Field(FieldRef {
                owner: ClassName::new("com/example/Box"),
                name: "size".to_string(),
                descriptor: "I".to_string(),
            }),
        );
        let method = Method {
            name: "sizeOf".to_string(),
            descriptor: "(Lcom/example/Box;)I".to_string(),
            is_static: false,
            instructions: vec![
                // `this` followed by a dereference is not a candidate
                Instruction::with_operand(Opcode::Load(ValueKind::Ref), Operand::Var(0)),
                size.clone(),
                Instruction::new(Opcode::Pop),
                Instruction::with_operand(Opcode::Load(ValueKind::Ref), Operand::Var(1)).at_line(20),
                size,
                Instruction::new(Opcode::Return(Some(ValueKind::Int))),
            ],
        };

        let details = scan(&method, &CheckNullObjectMutator);
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].line, 20);

        let output = apply(&method, &CheckNullObjectMutator, &details[0]);
        let opcodes: Vec<Opcode> = output[3..11].iter().map(|i| i.opcode).collect();
        assert_eq!(
            opcodes,
            vec![
                Opcode::Load(ValueKind::Ref),
                Opcode::Dup,
                Opcode::IfNonNull,
                Opcode::Pop,
                Opcode::Const,
                Opcode::Return(Some(ValueKind::Int)),
                Opcode::Label,
                Opcode::GetField,
            ]
        );
    }

    #[test]
    fn test_from_names() {
        let selected = from_names(&["MATH", "DEFAULTS"]).unwrap();
        let names: Vec<&str> = selected.iter().map(|m| m.name()).collect();
        assert_eq!(
            names,
            vec!["MATH", "CONDITIONALS_BOUNDARY", "NEGATE_CONDITIONALS", "RETURN_VALS"]
        );

        assert_eq!(from_names(&["ALL"]).unwrap().len(), 6);
        assert!(matches!(
            from_names(&["NOPE"]),
            Err(MutationError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_unique_ids() {
        let operators = all();
        for (i, a) in operators.iter().enumerate() {
            for b in &operators[i + 1..] {
                assert_ne!(a.globally_unique_id(), b.globally_unique_id());
            }
        }
        assert!(ConstructorCallMutator
            .globally_unique_id()
            .ends_with("operators::ConstructorCallMutator"));
    }
}
