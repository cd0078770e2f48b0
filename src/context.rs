//! Mutation context
//!
//! A `ClassContext` lives for one pass over one class. It hands out
//! identifiers as operators report matches, records the resulting
//! `MutationDetails`, and tells the rewrite pass whether a match is the one
//! mutation that should actually be applied.

use std::collections::HashMap;

use crate::bytecode::{ClassName, MethodInfo};
use crate::details::{MutationDetails, MutationIdentifier};

pub struct ClassContext {
    class: ClassName,
    target: Option<MutationIdentifier>,
    /// Next occurrence index per (method, descriptor, operator)
    counters: HashMap<(String, String, String), usize>,
    /// Matches found in the method being visited, with their instruction position
    pending: Vec<(usize, MutationDetails)>,
    found: Vec<MutationDetails>,
    applied: bool,
}

impl ClassContext {
    /// Context for a scan that collects every mutation point
    pub fn scanning(class: ClassName) -> Self {
        Self::new(class, None)
    }

    /// Context for a pass that applies exactly the targeted mutation
    pub fn targeting(target: MutationIdentifier) -> Self {
        Self::new(target.class.clone(), Some(target))
    }

    fn new(class: ClassName, target: Option<MutationIdentifier>) -> Self {
        Self {
            class,
            target,
            counters: HashMap::new(),
            pending: Vec::new(),
            found: Vec::new(),
            applied: false,
        }
    }

    pub fn class_name(&self) -> &ClassName {
        &self.class
    }

    /// Register a match and return its identifier
    pub fn register(
        &mut self,
        method: &MethodInfo,
        operator: &str,
        position: usize,
        line: u32,
        description: String,
    ) -> MutationIdentifier {
        let counter = self
            .counters
            .entry((
                method.name.clone(),
                method.descriptor.clone(),
                operator.to_string(),
            ))
            .or_insert(0);
        let id = MutationIdentifier {
            class: self.class.clone(),
            method: method.name.clone(),
            descriptor: method.descriptor.clone(),
            operator: operator.to_string(),
            index: *counter,
        };
        *counter += 1;

        self.pending
            .push((position, MutationDetails::new(id.clone(), line, description)));
        id
    }

    /// Whether the substitution for `id` should be emitted; marks it applied
    pub fn should_mutate(&mut self, id: &MutationIdentifier) -> bool {
        if self.target.as_ref() == Some(id) {
            self.applied = true;
            true
        } else {
            false
        }
    }

    /// Close the current method: its matches are appended in instruction order
    pub fn finish_method(&mut self) {
        // Stable sort keeps operator order for matches at the same position
        self.pending.sort_by_key(|(position, _)| *position);
        self.found
            .extend(self.pending.drain(..).map(|(_, details)| details));
    }

    pub fn is_applied(&self) -> bool {
        self.applied
    }

    pub fn into_details(mut self) -> Vec<MutationDetails> {
        self.finish_method();
        self.found
    }
}
