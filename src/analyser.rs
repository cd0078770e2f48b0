//! Analysers map previously known outcomes onto a new mutation set

use crate::details::MutationDetails;
use crate::error::Result;
use crate::results::MutationResult;

/// Returns exactly one result per input mutation, in input order
///
/// Results still at `NotStarted` need fresh execution.
pub trait MutationAnalyser {
    fn analyse(&self, mutations: &[MutationDetails]) -> Result<Vec<MutationResult>>;
}

/// Knows nothing: every mutation needs fresh execution
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAnalyser;

impl MutationAnalyser for NullAnalyser {
    fn analyse(&self, mutations: &[MutationDetails]) -> Result<Vec<MutationResult>> {
        Ok(mutations
            .iter()
            .cloned()
            .map(MutationResult::not_started)
            .collect())
    }
}
