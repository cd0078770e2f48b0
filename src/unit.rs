//! Schedulable units of mutation testing work
//!
//! Units share no mutable state and can be handed to any number of workers.

use std::fmt;

use crate::bytecode::ClassName;
use crate::details::MutationIdentifier;
use crate::results::{MutationMetaData, MutationResult};
use crate::runner::{EnvironmentFactory, MutationTestUnit};

/// Identifies a unit in notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Description {
    pub name: String,
    pub class: Option<ClassName>,
}

impl Description {
    pub fn new(name: impl Into<String>, class: Option<ClassName>) -> Self {
        Self {
            name: name.into(),
            class,
        }
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.class {
            Some(class) => write!(f, "{} ({})", self.name, class),
            None => f.write_str(&self.name),
        }
    }
}

/// Receives unit lifecycle notifications
pub trait ResultCollector {
    fn notify_start(&mut self, description: &Description);
    fn notify_end(&mut self, description: &Description, metadata: MutationMetaData);
}

/// Collector that keeps everything it is told
#[derive(Debug, Default)]
pub struct CollectingResults {
    pub started: Vec<Description>,
    pub finished: Vec<(Description, MutationMetaData)>,
}

impl CollectingResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every result reported so far, in notification order
    pub fn results(&self) -> Vec<MutationResult> {
        self.finished
            .iter()
            .flat_map(|(_, metadata)| metadata.results.iter().cloned())
            .collect()
    }
}

impl ResultCollector for CollectingResults {
    fn notify_start(&mut self, description: &Description) {
        self.started.push(description.clone());
    }

    fn notify_end(&mut self, description: &Description, metadata: MutationMetaData) {
        self.finished.push((description.clone(), metadata));
    }
}

/// Replays results that are already known without running anything
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownStatusMutationTestUnit {
    description: Description,
    mutators: Vec<String>,
    results: Vec<MutationResult>,
}

impl KnownStatusMutationTestUnit {
    pub fn new(mutators: Vec<String>, results: Vec<MutationResult>) -> Self {
        let class = results.first().map(|r| r.details.class_name().clone());
        Self {
            description: Description::new("known status mutation test", class),
            mutators,
            results,
        }
    }

    pub fn description(&self) -> &Description {
        &self.description
    }

    pub fn results(&self) -> &[MutationResult] {
        &self.results
    }

    pub fn execute(&self, rc: &mut dyn ResultCollector) {
        rc.notify_start(&self.description);
        rc.notify_end(
            &self.description,
            MutationMetaData::new(self.mutators.clone(), self.results.clone()),
        );
    }
}

/// A work item produced by the builder
#[derive(Debug)]
pub enum TestUnit {
    KnownStatus(KnownStatusMutationTestUnit),
    Mutation(MutationTestUnit),
    /// Sub-units scheduled together; the outcome is the union of theirs
    Multiple(Vec<TestUnit>),
}

impl TestUnit {
    pub fn execute(&self, environments: &dyn EnvironmentFactory, rc: &mut dyn ResultCollector) {
        match self {
            TestUnit::KnownStatus(unit) => unit.execute(rc),
            TestUnit::Mutation(unit) => unit.execute(environments, rc),
            TestUnit::Multiple(units) => {
                for unit in units {
                    unit.execute(environments, rc);
                }
            }
        }
    }

    /// Number of mutations this unit is responsible for
    pub fn mutation_count(&self) -> usize {
        match self {
            TestUnit::KnownStatus(unit) => unit.results().len(),
            TestUnit::Mutation(unit) => unit.mutations().len(),
            TestUnit::Multiple(units) => units.iter().map(TestUnit::mutation_count).sum(),
        }
    }

    /// Identifiers of every mutation in the unit, in order
    pub fn mutation_ids(&self) -> Vec<&MutationIdentifier> {
        match self {
            TestUnit::KnownStatus(unit) => unit.results().iter().map(|r| &r.details.id).collect(),
            TestUnit::Mutation(unit) => unit.mutations().iter().map(|d| &d.id).collect(),
            TestUnit::Multiple(units) => units.iter().flat_map(TestUnit::mutation_ids).collect(),
        }
    }
}
