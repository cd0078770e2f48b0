//! Mutation identity and metadata

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::bytecode::ClassName;

/// A test known to cover a line, with its baseline execution time
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestInfo {
    pub name: String,
    pub defining_class: ClassName,
    #[serde(default)]
    pub time_ms: u64,
}

impl TestInfo {
    pub fn new(name: impl Into<String>, defining_class: impl Into<ClassName>, time_ms: u64) -> Self {
        Self {
            name: name.into(),
            defining_class: defining_class.into(),
            time_ms,
        }
    }
}

/// Stable key of one mutation point
///
/// `index` counts occurrences found by one operator within one method, so
/// the identifier survives repeated runs over unchanged code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MutationIdentifier {
    pub class: ClassName,
    pub method: String,
    pub descriptor: String,
    pub operator: String,
    pub index: usize,
}

impl fmt::Display for MutationIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}::{}{} [{} #{}]",
            self.class, self.method, self.descriptor, self.operator, self.index
        )
    }
}

/// One candidate mutation
///
/// Equality and hashing use the identifier and line only; the description
/// and covering tests are payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationDetails {
    pub id: MutationIdentifier,
    pub line: u32,
    pub description: String,
    /// Covering tests, cheapest first
    #[serde(default)]
    pub tests_in_order: Vec<TestInfo>,
}

impl MutationDetails {
    pub fn new(id: MutationIdentifier, line: u32, description: impl Into<String>) -> Self {
        Self {
            id,
            line,
            description: description.into(),
            tests_in_order: Vec::new(),
        }
    }

    pub fn with_tests(mut self, tests: Vec<TestInfo>) -> Self {
        self.tests_in_order = tests;
        self
    }

    pub fn class_name(&self) -> &ClassName {
        &self.id.class
    }

    pub fn is_covered(&self) -> bool {
        !self.tests_in_order.is_empty()
    }

    /// Sum of the baseline times of every covering test, saturating
    pub fn baseline_ms(&self) -> u64 {
        self.tests_in_order
            .iter()
            .map(|t| t.time_ms)
            .fold(0, u64::saturating_add)
    }
}

impl PartialEq for MutationDetails {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.line == other.line
    }
}

impl Eq for MutationDetails {}

impl Hash for MutationDetails {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.line.hash(state);
    }
}

impl fmt::Display for MutationDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (line {}): {}", self.id, self.line, self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn id(index: usize) -> MutationIdentifier {
        MutationIdentifier {
            class: ClassName::new("com/example/Foo"),
            method: "bar".to_string(),
            descriptor: "()V".to_string(),
            operator: "MATH".to_string(),
            index,
        }
    }

    #[test]
    fn test_equality_ignores_payload() {
        let a = MutationDetails::new(id(0), 10, "first");
        let b = MutationDetails::new(id(0), 10, "second")
            .with_tests(vec![TestInfo::new("t", "FooTest", 3)]);
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_distinct_index_or_line() {
        assert_ne!(MutationDetails::new(id(0), 10, ""), MutationDetails::new(id(1), 10, ""));
        assert_ne!(MutationDetails::new(id(0), 10, ""), MutationDetails::new(id(0), 11, ""));
    }

    #[test]
    fn test_baseline() {
        let details = MutationDetails::new(id(0), 1, "").with_tests(vec![
            TestInfo::new("a", "FooTest", 5),
            TestInfo::new("b", "FooTest", 7),
        ]);
        assert!(details.is_covered());
        assert_eq!(details.baseline_ms(), 12);
    }

    #[test]
    fn test_baseline_saturates() {
        let details = MutationDetails::new(id(0), 1, "").with_tests(vec![
            TestInfo::new("a", "FooTest", u64::MAX),
            TestInfo::new("b", "FooTest", 7),
        ]);
        assert_eq!(details.baseline_ms(), u64::MAX);
    }
}
