//! Instruction stream rewriting
//!
//! Operators never touch a method body directly. For each method an operator
//! creates an `InsnVisitor`, and the rewrite pass below walks the original
//! stream, offering every instruction to the visitor in order. When the
//! visitor reports a match, the pass validates the substitution, registers it
//! with the `ClassContext`, and emits either the replacement (for the one
//! targeted mutation) or the original instructions unchanged.

use std::fmt;

use log::warn;

use crate::bytecode::{declared_labels, exit_stack_delta, Instruction, Method, MethodInfo};
use crate::context::ClassContext;
use crate::error::{MutationError, Result};

/// Replacement proposed by an operator for a matched region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    /// Number of original instructions replaced, starting at the match
    pub consumed: usize,
    pub replacement: Vec<Instruction>,
    pub description: String,
}

impl Substitution {
    /// Replace the single instruction at the match position
    pub fn single(replacement: Vec<Instruction>, description: impl Into<String>) -> Self {
        Self {
            consumed: 1,
            replacement,
            description: description.into(),
        }
    }
}

/// Per-method matching state of one operator
///
/// `visit` is called for every instruction of the method in order, except
/// those already consumed by a previous match.
pub trait InsnVisitor {
    fn visit(&mut self, insns: &[Instruction], at: usize) -> Option<Substitution>;
}

/// A named mutation strategy
pub trait MethodMutator: Send + Sync + fmt::Debug {
    /// Name used in configuration and reports
    fn name(&self) -> &'static str;

    /// Identifier unique across all operators, stored in mutation identifiers
    fn globally_unique_id(&self) -> &'static str;

    /// Fresh visitor for one method body
    fn create_visitor(&self, method: &MethodInfo) -> Box<dyn InsnVisitor>;
}

/// Run one operator over one method, returning the rewritten stream
pub fn rewrite_method(
    method: &Method,
    mutator: &dyn MethodMutator,
    context: &mut ClassContext,
) -> Vec<Instruction> {
    let info = method.info(context.class_name());
    let insns = &method.instructions;
    let mut visitor = mutator.create_visitor(&info);
    let mut output = Vec::with_capacity(insns.len());

    let mut at = 0;
    while at < insns.len() {
        let Some(mut substitution) = visitor.visit(insns, at) else {
            output.push(insns[at].clone());
            at += 1;
            continue;
        };

        substitution.consumed = substitution.consumed.clamp(1, insns.len() - at);
        let original = &insns[at..at + substitution.consumed];

        match validate_substitution(mutator.name(), method, original, &substitution.replacement) {
            Ok(()) => {
                let line = original[0].line;
                let id = context.register(
                    &info,
                    mutator.globally_unique_id(),
                    at,
                    line,
                    substitution.description,
                );
                if context.should_mutate(&id) {
                    output.extend(
                        substitution
                            .replacement
                            .into_iter()
                            .map(|insn| insn.at_line(line)),
                    );
                } else {
                    output.extend_from_slice(original);
                }
            }
            Err(e) => {
                warn!(
                    "Skipping mutation by {} at instruction {} of {}: {}",
                    mutator.name(),
                    at,
                    info.signature(),
                    e
                );
                output.extend_from_slice(original);
            }
        }

        at += substitution.consumed;
    }

    output
}

/// Check a replacement is well formed and leaves the stack as the original does
pub fn validate_substitution(
    operator: &str,
    method: &Method,
    original: &[Instruction],
    replacement: &[Instruction],
) -> Result<()> {
    let invalid = |reason: String| MutationError::InvalidSubstitution {
        operator: operator.to_string(),
        method: format!("{}{}", method.name, method.descriptor),
        reason,
    };

    let before = exit_stack_delta(original).map_err(|e| invalid(e.to_string()))?;
    let after = exit_stack_delta(replacement).map_err(|e| invalid(e.to_string()))?;
    if before != after {
        return Err(invalid(format!(
            "stack effect {:?} does not match original {:?}",
            after, before
        )));
    }

    let mut labels = method.declared_labels();
    labels.extend(declared_labels(replacement));
    if let Some(target) = replacement
        .iter()
        .filter(|insn| insn.is_branch())
        .filter_map(Instruction::label)
        .find(|label| !labels.contains(label))
    {
        return Err(invalid(format!("branch to undeclared label {}", target)));
    }

    Ok(())
}
