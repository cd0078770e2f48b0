//! Instruction stream model
//!
//! Classes are modelled as ordered lists of methods, and method bodies as
//! ordered streams of typed stack-machine instructions. Nothing in this module
//! edits a stream in place: mutation always builds a new stream so the
//! original stays available for diagnostics.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::{MutationError, Result};

/// Name of instance constructors
pub const CONSTRUCTOR_NAME: &str = "<init>";

/// Fully qualified class name, e.g. `com/example/Foo`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassName(String);

impl ClassName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClassName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Kind of value held in a local variable slot or returned from a method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Int,
    Long,
    Float,
    Double,
    Ref,
}

/// Numeric operand type of arithmetic instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumType {
    Int,
    Long,
    Float,
    Double,
}

impl NumType {
    pub fn is_integral(self) -> bool {
        matches!(self, NumType::Int | NumType::Long)
    }

    pub fn describe(self) -> &'static str {
        match self {
            NumType::Int => "integer",
            NumType::Long => "long",
            NumType::Float => "float",
            NumType::Double => "double",
        }
    }
}

/// Binary arithmetic and bitwise operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Ushr,
}

impl ArithOp {
    /// Bitwise and shift operators are only defined on integral types
    pub fn is_bitwise(self) -> bool {
        !matches!(
            self,
            ArithOp::Add | ArithOp::Sub | ArithOp::Mul | ArithOp::Div | ArithOp::Rem
        )
    }

    pub fn describe(self) -> &'static str {
        match self {
            ArithOp::Add => "addition",
            ArithOp::Sub => "subtraction",
            ArithOp::Mul => "multiplication",
            ArithOp::Div => "division",
            ArithOp::Rem => "modulus",
            ArithOp::And => "bitwise AND",
            ArithOp::Or => "bitwise OR",
            ArithOp::Xor => "XOR",
            ArithOp::Shl => "shift left",
            ArithOp::Shr => "shift right",
            ArithOp::Ushr => "unsigned shift right",
        }
    }
}

/// Comparison used by conditional jumps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Ge => ">=",
            CmpOp::Gt => ">",
            CmpOp::Le => "<=",
        }
    }
}

/// Dispatch kind of a method invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvokeKind {
    Virtual,
    Special,
    Static,
    Interface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    Nop,
    /// Pseudo-instruction marking a branch target
    Label,
    AConstNull,
    Const,
    Load(ValueKind),
    Store(ValueKind),
    Pop,
    Dup,
    Arith(ArithOp, NumType),
    Neg(NumType),
    /// Compares the int on top of the stack with zero
    If(CmpOp),
    /// Compares the two ints on top of the stack
    IfCmp(CmpOp),
    IfNull,
    IfNonNull,
    Goto,
    New,
    GetField,
    PutField,
    GetStatic,
    PutStatic,
    Invoke(InvokeKind),
    /// `None` returns void
    Return(Option<ValueKind>),
    Throw,
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Reference to a field: owner class, name and type descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    pub owner: ClassName,
    pub name: String,
    pub descriptor: String,
}

/// Reference to a method: owner class, name and method descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRef {
    pub owner: ClassName,
    pub name: String,
    pub descriptor: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Operand {
    #[default]
    None,
    Int(i64),
    Text(String),
    Var(u16),
    Label(u32),
    Type(ClassName),
    Field(FieldRef),
    Method(MethodRef),
}

/// One instruction with its operand and source line (0 when unknown)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    #[serde(default)]
    pub operand: Operand,
    #[serde(default)]
    pub line: u32,
}

impl Instruction {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            operand: Operand::None,
            line: 0,
        }
    }

    pub fn with_operand(opcode: Opcode, operand: Operand) -> Self {
        Self {
            opcode,
            operand,
            line: 0,
        }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }

    pub fn method_ref(&self) -> Option<&MethodRef> {
        match &self.operand {
            Operand::Method(m) => Some(m),
            _ => None,
        }
    }

    pub fn label(&self) -> Option<u32> {
        match self.operand {
            Operand::Label(id) => Some(id),
            _ => None,
        }
    }

    pub fn var(&self) -> Option<u16> {
        match self.operand {
            Operand::Var(slot) => Some(slot),
            _ => None,
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(
            self.opcode,
            Opcode::If(_) | Opcode::IfCmp(_) | Opcode::IfNull | Opcode::IfNonNull | Opcode::Goto
        )
    }

    /// Whether control never continues to the next instruction
    pub fn ends_fall_through(&self) -> bool {
        matches!(self.opcode, Opcode::Return(_) | Opcode::Throw | Opcode::Goto)
    }

    /// Number of values popped and pushed, checking the operand shape
    pub fn stack_effect(&self) -> Result<StackEffect> {
        let invalid = |reason: &str| MutationError::InvalidInstruction {
            opcode: self.opcode.to_string(),
            reason: reason.to_string(),
        };

        let effect = match (self.opcode, &self.operand) {
            (Opcode::Nop, _) => StackEffect::new(0, 0),
            (Opcode::Label, Operand::Label(_)) => StackEffect::new(0, 0),
            (Opcode::AConstNull, _) => StackEffect::new(0, 1),
            (Opcode::Const, Operand::Int(_) | Operand::Text(_)) => StackEffect::new(0, 1),
            (Opcode::Load(_), Operand::Var(_)) => StackEffect::new(0, 1),
            (Opcode::Store(_), Operand::Var(_)) => StackEffect::new(1, 0),
            (Opcode::Pop, _) => StackEffect::new(1, 0),
            (Opcode::Dup, _) => StackEffect::new(1, 2),
            (Opcode::Arith(op, ty), _) => {
                if op.is_bitwise() && !ty.is_integral() {
                    return Err(invalid("bitwise operator on a floating point type"));
                }
                StackEffect::new(2, 1)
            }
            (Opcode::Neg(_), _) => StackEffect::new(1, 1),
            (Opcode::If(_) | Opcode::IfNull | Opcode::IfNonNull, Operand::Label(_)) => {
                StackEffect::new(1, 0)
            }
            (Opcode::IfCmp(_), Operand::Label(_)) => StackEffect::new(2, 0),
            (Opcode::Goto, Operand::Label(_)) => StackEffect::new(0, 0),
            (Opcode::New, Operand::Type(_)) => StackEffect::new(0, 1),
            (Opcode::GetField, Operand::Field(_)) => StackEffect::new(1, 1),
            (Opcode::PutField, Operand::Field(_)) => StackEffect::new(2, 0),
            (Opcode::GetStatic, Operand::Field(_)) => StackEffect::new(0, 1),
            (Opcode::PutStatic, Operand::Field(_)) => StackEffect::new(1, 0),
            (Opcode::Invoke(kind), Operand::Method(m)) => {
                let descriptor = MethodDescriptor::parse(&m.descriptor)?;
                let receiver = usize::from(kind != InvokeKind::Static);
                let pushes = usize::from(descriptor.returns.is_some());
                StackEffect::new(descriptor.params.len() + receiver, pushes)
            }
            (Opcode::Return(Some(_)), _) => StackEffect::new(1, 0),
            (Opcode::Return(None), _) => StackEffect::new(0, 0),
            (Opcode::Throw, _) => StackEffect::new(1, 0),
            (_, operand) => {
                return Err(invalid(&format!("unexpected operand {:?}", operand)));
            }
        };
        Ok(effect)
    }
}

/// Values popped from and pushed onto the operand stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackEffect {
    pub pops: usize,
    pub pushes: usize,
}

impl StackEffect {
    pub fn new(pops: usize, pushes: usize) -> Self {
        Self { pops, pushes }
    }

    pub fn delta(self) -> isize {
        self.pushes as isize - self.pops as isize
    }
}

/// Stack depth change on the fall-through exit of a sequence
///
/// Branches record the depth expected at their target label; returns, throws
/// and gotos end the fall-through path until a label with a known depth is
/// reached. `None` means control never falls out of the end of the sequence.
pub fn exit_stack_delta(insns: &[Instruction]) -> Result<Option<isize>> {
    let mut depth = Some(0isize);
    let mut label_depths: HashMap<u32, isize> = HashMap::new();

    for insn in insns {
        let effect = insn.stack_effect()?;

        if insn.opcode == Opcode::Label {
            if let Some(id) = insn.label() {
                match (depth, label_depths.get(&id).copied()) {
                    (Some(current), Some(expected)) if current != expected => {
                        return Err(MutationError::InvalidInstruction {
                            opcode: insn.opcode.to_string(),
                            reason: format!(
                                "label {} reached with stack depths {} and {}",
                                id, current, expected
                            ),
                        });
                    }
                    (None, Some(expected)) => depth = Some(expected),
                    (Some(current), None) => {
                        label_depths.insert(id, current);
                    }
                    _ => {}
                }
            }
            continue;
        }

        // Unreachable code keeps its operand checks but has no depth
        let Some(current) = depth else { continue };
        let after = current + effect.delta();

        if insn.is_branch() {
            if let Some(target) = insn.label() {
                label_depths.entry(target).or_insert(after);
            }
        }

        depth = if insn.ends_fall_through() {
            None
        } else {
            Some(after)
        };
    }

    Ok(depth)
}

/// Parsed method descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub params: Vec<ValueKind>,
    /// `None` for void
    pub returns: Option<ValueKind>,
}

impl MethodDescriptor {
    /// Parse a descriptor such as `(IJLjava/lang/String;[I)V`
    pub fn parse(descriptor: &str) -> Result<Self> {
        let invalid = |reason: &str| MutationError::InvalidDescriptor {
            descriptor: descriptor.to_string(),
            reason: reason.to_string(),
        };

        let rest = descriptor
            .strip_prefix('(')
            .ok_or_else(|| invalid("missing '('"))?;
        let (params_str, return_str) = rest
            .split_once(')')
            .ok_or_else(|| invalid("missing ')'"))?;

        let mut params = Vec::new();
        let mut chars = params_str.chars().peekable();
        while chars.peek().is_some() {
            params.push(parse_field_type(&mut chars).ok_or_else(|| invalid("bad parameter type"))?);
        }

        let returns = if return_str == "V" {
            None
        } else {
            let mut chars = return_str.chars().peekable();
            let kind = parse_field_type(&mut chars).ok_or_else(|| invalid("bad return type"))?;
            if chars.next().is_some() {
                return Err(invalid("trailing characters after return type"));
            }
            Some(kind)
        };

        Ok(Self { params, returns })
    }
}

fn parse_field_type(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<ValueKind> {
    match chars.next()? {
        'B' | 'C' | 'I' | 'S' | 'Z' => Some(ValueKind::Int),
        'J' => Some(ValueKind::Long),
        'F' => Some(ValueKind::Float),
        'D' => Some(ValueKind::Double),
        'L' => {
            // Consume up to and including ';'
            chars.find(|&c| c == ';')?;
            Some(ValueKind::Ref)
        }
        '[' => {
            parse_field_type(chars)?;
            Some(ValueKind::Ref)
        }
        _ => None,
    }
}

/// A method body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    pub descriptor: String,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
}

impl Method {
    pub fn info(&self, class: &ClassName) -> MethodInfo {
        let next_label = self
            .instructions
            .iter()
            .filter_map(Instruction::label)
            .max()
            .map_or(0, |max| max + 1);
        MethodInfo {
            class: class.clone(),
            name: self.name.clone(),
            descriptor: self.descriptor.clone(),
            is_static: self.is_static,
            next_label,
        }
    }

    /// Label ids declared by `Label` pseudo-instructions
    pub fn declared_labels(&self) -> HashSet<u32> {
        declared_labels(&self.instructions)
    }
}

pub(crate) fn declared_labels(insns: &[Instruction]) -> HashSet<u32> {
    insns
        .iter()
        .filter(|insn| insn.opcode == Opcode::Label)
        .filter_map(Instruction::label)
        .collect()
}

/// Lightweight context handed to operators while they visit a method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    pub class: ClassName,
    pub name: String,
    pub descriptor: String,
    pub is_static: bool,
    /// First label id not used by the original method body
    pub next_label: u32,
}

impl MethodInfo {
    pub fn is_constructor(&self) -> bool {
        is_constructor(&self.name)
    }

    /// Return kind from the descriptor, `None` for void or unparsable descriptors
    pub fn return_kind(&self) -> Option<ValueKind> {
        MethodDescriptor::parse(&self.descriptor)
            .ok()
            .and_then(|d| d.returns)
    }

    /// Human-readable `name` + `descriptor`, used in diagnostics
    pub fn signature(&self) -> String {
        format!("{}::{}{}", self.class, self.name, self.descriptor)
    }
}

pub fn is_constructor(method_name: &str) -> bool {
    method_name == CONSTRUCTOR_NAME
}

/// A class with its methods in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: ClassName,
    #[serde(default)]
    pub methods: Vec<Method>,
}
