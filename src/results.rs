//! Mutation outcomes

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::details::MutationDetails;

/// Terminal classification of a mutant, or `NotStarted` before analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectionStatus {
    NotStarted,
    NoCoverage,
    Survived,
    Killed,
    TimedOut,
    NonViable,
    MemoryError,
    RunError,
}

impl DetectionStatus {
    /// Whether the test suite is credited with detecting the mutant
    pub fn is_detected(self) -> bool {
        matches!(
            self,
            DetectionStatus::Killed
                | DetectionStatus::TimedOut
                | DetectionStatus::NonViable
                | DetectionStatus::MemoryError
                | DetectionStatus::RunError
        )
    }

    /// Whether the isolated environment that produced this outcome may be reused
    pub fn keeps_environment(self) -> bool {
        matches!(self, DetectionStatus::Killed | DetectionStatus::Survived)
    }
}

impl fmt::Display for DetectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DetectionStatus::NotStarted => "NOT_STARTED",
            DetectionStatus::NoCoverage => "NO_COVERAGE",
            DetectionStatus::Survived => "SURVIVED",
            DetectionStatus::Killed => "KILLED",
            DetectionStatus::TimedOut => "TIMED_OUT",
            DetectionStatus::NonViable => "NON_VIABLE",
            DetectionStatus::MemoryError => "MEMORY_ERROR",
            DetectionStatus::RunError => "RUN_ERROR",
        };
        f.write_str(name)
    }
}

/// Status plus how it was reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationStatusTestPair {
    pub tests_run: u32,
    pub status: DetectionStatus,
    /// Killing test, or failure description for error statuses
    #[serde(default)]
    pub killing_test: Option<String>,
}

impl MutationStatusTestPair {
    pub fn new(tests_run: u32, status: DetectionStatus) -> Self {
        Self {
            tests_run,
            status,
            killing_test: None,
        }
    }

    pub fn killed_by(tests_run: u32, test: impl Into<String>) -> Self {
        Self {
            tests_run,
            status: DetectionStatus::Killed,
            killing_test: Some(test.into()),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.killing_test = Some(description.into());
        self
    }

    pub fn not_started() -> Self {
        Self::new(0, DetectionStatus::NotStarted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationResult {
    pub details: MutationDetails,
    pub status_test_pair: MutationStatusTestPair,
}

impl MutationResult {
    pub fn new(details: MutationDetails, status_test_pair: MutationStatusTestPair) -> Self {
        Self {
            details,
            status_test_pair,
        }
    }

    pub fn not_started(details: MutationDetails) -> Self {
        Self::new(details, MutationStatusTestPair::not_started())
    }

    pub fn status(&self) -> DetectionStatus {
        self.status_test_pair.status
    }

    pub fn killing_test(&self) -> Option<&str> {
        self.status_test_pair.killing_test.as_deref()
    }
}

/// Payload of one unit's end notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationMetaData {
    pub mutators: Vec<String>,
    pub results: Vec<MutationResult>,
}

impl MutationMetaData {
    pub fn new(mutators: Vec<String>, results: Vec<MutationResult>) -> Self {
        Self { mutators, results }
    }
}
