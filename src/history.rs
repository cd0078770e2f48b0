//! Result history
//!
//! Results of earlier runs are stored as JSON and replayed by
//! `HistoryAnalyser`, so unchanged mutations do not need to be executed again.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::analyser::MutationAnalyser;
use crate::details::MutationDetails;
use crate::error::{MutationError, Result};
use crate::results::{DetectionStatus, MutationResult, MutationStatusTestPair};

pub const HISTORY_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct HistoryFile {
    version: u32,
    results: Vec<MutationResult>,
}

/// Store results, replacing any existing file
pub fn write_history(path: &Path, results: &[MutationResult]) -> Result<()> {
    let file = HistoryFile {
        version: HISTORY_VERSION,
        results: results.to_vec(),
    };
    let json = serde_json::to_string_pretty(&file).map_err(|e| MutationError::History {
        file: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    fs::write(path, json).map_err(|e| MutationError::WriteError {
        file: path.to_path_buf(),
        error: e.to_string(),
    })
}

pub fn read_history(path: &Path) -> Result<Vec<MutationResult>> {
    let content = fs::read_to_string(path).map_err(|e| MutationError::FileReadError {
        file: path.to_path_buf(),
        error: e.to_string(),
    })?;
    let file: HistoryFile = serde_json::from_str(&content).map_err(|e| MutationError::History {
        file: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if file.version != HISTORY_VERSION {
        return Err(MutationError::History {
            file: path.to_path_buf(),
            reason: format!(
                "unsupported history version {} (expected {})",
                file.version, HISTORY_VERSION
            ),
        });
    }
    Ok(file.results)
}

/// Replays stored outcomes for mutations whose identifier and line are unchanged
#[derive(Debug, Default)]
pub struct HistoryAnalyser {
    known: HashMap<MutationDetails, MutationStatusTestPair>,
}

impl HistoryAnalyser {
    pub fn new(results: Vec<MutationResult>) -> Self {
        let known = results
            .into_iter()
            .filter(|r| r.status() != DetectionStatus::NotStarted)
            .map(|r| (r.details, r.status_test_pair))
            .collect();
        Self { known }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let results = read_history(path)?;
        debug!("Loaded {} stored result(s) from {}", results.len(), path.display());
        Ok(Self::new(results))
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    fn replay(&self, details: &MutationDetails) -> Option<&MutationStatusTestPair> {
        let pair = self.known.get(details)?;
        // Coverage may have been added since the mutation was last seen
        if pair.status == DetectionStatus::NoCoverage && details.is_covered() {
            return None;
        }
        Some(pair)
    }
}

impl MutationAnalyser for HistoryAnalyser {
    fn analyse(&self, mutations: &[MutationDetails]) -> Result<Vec<MutationResult>> {
        Ok(mutations
            .iter()
            .map(|details| match self.replay(details) {
                Some(pair) => MutationResult::new(details.clone(), pair.clone()),
                None => MutationResult::not_started(details.clone()),
            })
            .collect())
    }
}
