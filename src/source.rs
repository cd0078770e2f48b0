//! Mutation source
//!
//! The `Mutater` runs the configured operators over a class, either to list
//! every mutation point or to build the one mutant a `MutationIdentifier`
//! names. `ClassMutationSource` combines it with the class and coverage
//! collaborators to produce complete `MutationDetails` for the builder.

use std::sync::Arc;

use log::{debug, warn};

use crate::bytecode::{ClassDef, ClassName};
use crate::context::ClassContext;
use crate::details::{MutationDetails, MutationIdentifier, TestInfo};
use crate::error::{MutationError, Result};
use crate::mutator::{rewrite_method, MethodMutator};

/// Provides class definitions by name
pub trait ClassSource {
    fn fetch(&self, class: &ClassName) -> Option<ClassDef>;
}

/// Maps source lines to the tests that cover them
pub trait CoverageSource {
    /// Covering tests, cheapest first with ties broken by name
    fn tests_for(&self, class: &ClassName, line: u32) -> Vec<TestInfo>;
}

/// Produces the mutation points of a class
pub trait MutationSource {
    /// Empty when the class has nothing to mutate
    fn create_mutations(&self, class: &ClassName) -> Vec<MutationDetails>;
}

/// A class with exactly one mutation applied
#[derive(Debug, Clone)]
pub struct Mutant {
    pub details: MutationDetails,
    pub class: ClassDef,
}

/// Applies a fixed, ordered set of operators to classes
#[derive(Debug, Clone)]
pub struct Mutater {
    operators: Vec<Arc<dyn MethodMutator>>,
}

impl Mutater {
    pub fn new(operators: Vec<Arc<dyn MethodMutator>>) -> Self {
        Self { operators }
    }

    /// Every mutation point of the class, in method declaration order and
    /// instruction order within each method
    pub fn find_mutations(&self, class: &ClassDef) -> Vec<MutationDetails> {
        let mut context = ClassContext::scanning(class.name.clone());
        for method in &class.methods {
            for operator in &self.operators {
                rewrite_method(method, operator.as_ref(), &mut context);
            }
            context.finish_method();
        }
        context.into_details()
    }

    /// Build the mutant named by `id`, leaving `class` untouched
    ///
    /// Methods are addressed by name and descriptor, so these must be unique
    /// within the class.
    pub fn get_mutation(&self, class: &ClassDef, id: &MutationIdentifier) -> Result<Mutant> {
        let not_found = || MutationError::MutationNotFound { id: id.to_string() };

        if class.name != id.class {
            return Err(not_found());
        }
        let operator = self
            .operators
            .iter()
            .find(|m| m.globally_unique_id() == id.operator)
            .ok_or_else(not_found)?;
        let position = class
            .methods
            .iter()
            .position(|m| m.name == id.method && m.descriptor == id.descriptor)
            .ok_or_else(not_found)?;

        let mut context = ClassContext::targeting(id.clone());
        let rewritten = rewrite_method(&class.methods[position], operator.as_ref(), &mut context);
        if !context.is_applied() {
            return Err(not_found());
        }
        let details = context
            .into_details()
            .into_iter()
            .find(|d| &d.id == id)
            .ok_or_else(not_found)?;

        let mut mutated = class.clone();
        mutated.methods[position].instructions = rewritten;
        Ok(Mutant {
            details,
            class: mutated,
        })
    }
}

/// Mutation source backed by class and coverage collaborators
pub struct ClassMutationSource<'a> {
    mutater: Mutater,
    classes: &'a dyn ClassSource,
    coverage: &'a dyn CoverageSource,
}

impl<'a> ClassMutationSource<'a> {
    pub fn new(
        mutater: Mutater,
        classes: &'a dyn ClassSource,
        coverage: &'a dyn CoverageSource,
    ) -> Self {
        Self {
            mutater,
            classes,
            coverage,
        }
    }

    /// Build the mutant named by `id` from the class it belongs to
    pub fn get_mutation(&self, id: &MutationIdentifier) -> Result<Mutant> {
        let class = self
            .classes
            .fetch(&id.class)
            .ok_or_else(|| MutationError::ClassNotFound {
                class: id.class.to_string(),
            })?;
        let mut mutant = self.mutater.get_mutation(&class, id)?;
        mutant.details.tests_in_order = self.coverage.tests_for(&id.class, mutant.details.line);
        Ok(mutant)
    }
}

impl MutationSource for ClassMutationSource<'_> {
    fn create_mutations(&self, class: &ClassName) -> Vec<MutationDetails> {
        let Some(class_def) = self.classes.fetch(class) else {
            warn!("No class definition found for {}", class);
            return Vec::new();
        };

        let mutations: Vec<MutationDetails> = self
            .mutater
            .find_mutations(&class_def)
            .into_iter()
            .map(|details| {
                let tests = self.coverage.tests_for(class, details.line);
                details.with_tests(tests)
            })
            .collect();

        debug!("Found {} mutation(s) in {}", mutations.len(), class);
        mutations
    }
}
