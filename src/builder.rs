//! Mutation test builder
//!
//! Turns a batch of classes into schedulable `TestUnit`s. For each class the
//! mutation set is split into groups of at most `mutation_unit_size`
//! mutations, each group is passed through the analyser, and the group
//! becomes a known-status unit, a fresh execution unit, or both bundled in a
//! `TestUnit::Multiple`. Nothing is executed here.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use log::{debug, warn};

use crate::analyser::{MutationAnalyser, NullAnalyser};
use crate::bytecode::ClassName;
use crate::config::Settings;
use crate::details::MutationDetails;
use crate::error::Result;
use crate::operators;
use crate::results::{DetectionStatus, MutationResult};
use crate::runner::MutationTestUnit;
use crate::source::MutationSource;
use crate::timeout::TimeoutStrategy;
use crate::unit::{KnownStatusMutationTestUnit, TestUnit};

pub struct MutationTestBuilder<'a> {
    settings: Settings,
    source: &'a dyn MutationSource,
    analyser: &'a dyn MutationAnalyser,
}

impl<'a> MutationTestBuilder<'a> {
    /// Builder that runs every mutation afresh
    pub fn new(settings: Settings, source: &'a dyn MutationSource) -> Self {
        Self::with_analyser(settings, &NullAnalyser, source)
    }

    pub fn with_analyser(
        settings: Settings,
        analyser: &'a dyn MutationAnalyser,
        source: &'a dyn MutationSource,
    ) -> Self {
        Self {
            settings,
            source,
            analyser,
        }
    }

    /// Build the units for a batch of classes
    ///
    /// Only invalid settings make this fail, and then before any unit exists.
    pub fn build(&self, classes: &[ClassName]) -> Result<Vec<TestUnit>> {
        self.settings.validate()?;
        let mutators: Vec<String> = operators::from_names(&self.settings.mutators)?
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        let timeout_strategy: Arc<dyn TimeoutStrategy> = Arc::new(self.settings.timeout_strategy());

        let mut units = Vec::new();
        for class in classes {
            let mutations = self.source.create_mutations(class);
            if mutations.is_empty() {
                debug!("No mutations found for {}", class);
                continue;
            }

            let groups: Vec<&[MutationDetails]> = match self.settings.mutation_unit_size {
                0 => vec![&mutations[..]],
                size => mutations.chunks(size).collect(),
            };
            debug!(
                "{} mutation(s) in {} split into {} group(s)",
                mutations.len(),
                class,
                groups.len()
            );

            for group in groups {
                units.push(self.create_unit(group, &mutators, &timeout_strategy));
            }
        }

        Ok(units)
    }

    fn create_unit(
        &self,
        group: &[MutationDetails],
        mutators: &[String],
        timeout_strategy: &Arc<dyn TimeoutStrategy>,
    ) -> TestUnit {
        let analysed = self.analyse(group);

        let (needs_analysis, known): (Vec<MutationResult>, Vec<MutationResult>) = analysed
            .into_iter()
            .partition(|r| r.status() == DetectionStatus::NotStarted);
        let needs_analysis: Vec<MutationDetails> =
            needs_analysis.into_iter().map(|r| r.details).collect();

        if needs_analysis.is_empty() {
            return TestUnit::KnownStatus(KnownStatusMutationTestUnit::new(mutators.to_vec(), known));
        }

        let scope = test_classes(&needs_analysis);
        let fresh = TestUnit::Mutation(MutationTestUnit::new(
            needs_analysis,
            scope,
            mutators.to_vec(),
            Arc::clone(timeout_strategy),
            self.settings.verbose,
        ));
        if known.is_empty() {
            fresh
        } else {
            TestUnit::Multiple(vec![
                TestUnit::KnownStatus(KnownStatusMutationTestUnit::new(mutators.to_vec(), known)),
                fresh,
            ])
        }
    }

    /// Analyser output, or everything NOT_STARTED if the analyser fails
    fn analyse(&self, group: &[MutationDetails]) -> Vec<MutationResult> {
        match self.analyser.analyse(group) {
            Ok(results) if covers_exactly(group, &results) => in_group_order(group, results),
            Ok(results) => {
                warn!(
                    "Analyser returned {} result(s) that do not match the {} mutation(s) given; running them all",
                    results.len(),
                    group.len()
                );
                all_not_started(group)
            }
            Err(e) => {
                warn!("Analysis failed, running all {} mutation(s): {}", group.len(), e);
                all_not_started(group)
            }
        }
    }
}

/// One result per mutation, no duplicates, no strangers
fn covers_exactly(group: &[MutationDetails], results: &[MutationResult]) -> bool {
    let expected: HashSet<&MutationDetails> = group.iter().collect();
    let returned: HashSet<&MutationDetails> = results.iter().map(|r| &r.details).collect();
    results.len() == group.len() && returned.len() == results.len() && expected == returned
}

/// Results rearranged to follow the order of the group
fn in_group_order(group: &[MutationDetails], results: Vec<MutationResult>) -> Vec<MutationResult> {
    let mut by_details: HashMap<MutationDetails, MutationResult> = results
        .into_iter()
        .map(|r| (r.details.clone(), r))
        .collect();
    group.iter().filter_map(|d| by_details.remove(d)).collect()
}

fn all_not_started(group: &[MutationDetails]) -> Vec<MutationResult> {
    group
        .iter()
        .cloned()
        .map(MutationResult::not_started)
        .collect()
}

/// Classes defining the tests that cover any of the mutations
fn test_classes(mutations: &[MutationDetails]) -> BTreeSet<ClassName> {
    mutations
        .iter()
        .flat_map(|d| d.tests_in_order.iter().map(|t| t.defining_class.clone()))
        .collect()
}
