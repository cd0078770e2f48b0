//! Fresh execution of mutants against isolated environments
//!
//! A `MutationTestUnit` checks its mutants one after another, each inside an
//! isolated environment that has exactly one mutated class loaded:
//! - mutants without covering tests are reported as NO_COVERAGE and never dispatched
//! - covering tests run cheapest first and stop at the first failure
//! - every dispatch is bounded by the timeout strategy
//! - an environment that timed out, crashed or ran out of memory is torn down
//!   and the next mutant gets a fresh one

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, SendError};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::bytecode::ClassName;
use crate::details::{MutationDetails, MutationIdentifier, TestInfo};
use crate::error::Result;
use crate::results::{DetectionStatus, MutationMetaData, MutationResult, MutationStatusTestPair};
use crate::timeout::TimeoutStrategy;
use crate::unit::{Description, ResultCollector};

/// Outcome of running one test against a loaded mutant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    Passed,
    /// The test failed, with the failure description
    Failed(String),
    MemoryError,
    /// The environment crashed while running the test
    Crashed(String),
}

/// Forcibly terminates an environment from outside its worker thread
pub type KillSwitch = Box<dyn FnOnce() + Send>;

/// One isolated environment able to host a single mutated class at a time
pub trait IsolatedEnvironment: Send {
    /// Reload the owning class with the identified mutation applied
    fn load_mutant(&mut self, id: &MutationIdentifier) -> Result<()>;

    fn run_test(&mut self, test: &TestInfo) -> TestOutcome;

    /// Handle used to stop the environment when a check times out
    fn kill_switch(&self) -> Option<KillSwitch> {
        None
    }

    fn shutdown(self: Box<Self>) {}
}

/// Launches isolated environments restricted to a set of test classes
pub trait EnvironmentFactory: Sync {
    fn launch(&self, test_classes: &BTreeSet<ClassName>) -> Result<Box<dyn IsolatedEnvironment>>;
}

/// What is sent to an environment for one mutant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutantRequest {
    pub id: MutationIdentifier,
    /// Tests to run, in order
    pub tests: Vec<TestInfo>,
}

impl MutantRequest {
    pub fn new(details: &MutationDetails) -> Self {
        Self {
            id: details.id.clone(),
            tests: details.tests_in_order.clone(),
        }
    }
}

/// Mutants that still need to be run
pub struct MutationTestUnit {
    description: Description,
    mutations: Vec<MutationDetails>,
    test_classes: BTreeSet<ClassName>,
    mutators: Vec<String>,
    timeout_strategy: Arc<dyn TimeoutStrategy>,
    verbose: bool,
}

impl fmt::Debug for MutationTestUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationTestUnit")
            .field("description", &self.description)
            .field("mutations", &self.mutations)
            .field("test_classes", &self.test_classes)
            .field("mutators", &self.mutators)
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

impl MutationTestUnit {
    pub fn new(
        mutations: Vec<MutationDetails>,
        test_classes: BTreeSet<ClassName>,
        mutators: Vec<String>,
        timeout_strategy: Arc<dyn TimeoutStrategy>,
        verbose: bool,
    ) -> Self {
        let class = mutations.first().map(|d| d.class_name().clone());
        Self {
            description: Description::new("mutation test", class),
            mutations,
            test_classes,
            mutators,
            timeout_strategy,
            verbose,
        }
    }

    pub fn description(&self) -> &Description {
        &self.description
    }

    pub fn mutations(&self) -> &[MutationDetails] {
        &self.mutations
    }

    /// Test classes the environment needs to load for this unit
    pub fn test_classes(&self) -> &BTreeSet<ClassName> {
        &self.test_classes
    }

    pub fn execute(&self, environments: &dyn EnvironmentFactory, rc: &mut dyn ResultCollector) {
        rc.notify_start(&self.description);

        let mut environment: Option<Box<dyn IsolatedEnvironment>> = None;
        let mut results = Vec::with_capacity(self.mutations.len());

        for details in &self.mutations {
            let pair = if details.is_covered() {
                let (pair, reusable) = self.run_mutant(environments, environment.take(), details);
                environment = reusable;
                pair
            } else {
                MutationStatusTestPair::new(0, DetectionStatus::NoCoverage)
            };

            if self.verbose {
                info!("{} {}", pair.status, details);
            } else {
                debug!("{} {}", pair.status, details);
            }
            results.push(MutationResult::new(details.clone(), pair));
        }

        if let Some(environment) = environment {
            environment.shutdown();
        }

        rc.notify_end(
            &self.description,
            MutationMetaData::new(self.mutators.clone(), results),
        );
    }

    /// Check one mutant, returning its outcome and the environment if it can be reused
    fn run_mutant(
        &self,
        environments: &dyn EnvironmentFactory,
        environment: Option<Box<dyn IsolatedEnvironment>>,
        details: &MutationDetails,
    ) -> (MutationStatusTestPair, Option<Box<dyn IsolatedEnvironment>>) {
        let mut environment = match environment {
            Some(environment) => environment,
            None => match environments.launch(&self.test_classes) {
                Ok(environment) => environment,
                Err(e) => {
                    warn!("Could not launch environment for {}: {}", details.id, e);
                    return (
                        MutationStatusTestPair::new(0, DetectionStatus::RunError)
                            .with_description(e.to_string()),
                        None,
                    );
                }
            },
        };

        let budget = self.timeout_strategy.compute_timeout(details.baseline_ms());
        let request = MutantRequest::new(details);
        let kill_switch = environment.kill_switch();
        let (sender, receiver) = crossbeam_channel::bounded(1);

        debug!("Running {} with a budget of {}ms", details.id, budget);
        let spawned = thread::Builder::new()
            .name(format!("mutant-{}", details.id.index))
            .spawn(move || {
                let pair = check_mutant(environment.as_mut(), &request);
                // The receiver is gone once the check has timed out
                if let Err(SendError((environment, _))) = sender.send((environment, pair)) {
                    environment.shutdown();
                }
            });
        if let Err(e) = spawned {
            return (
                MutationStatusTestPair::new(0, DetectionStatus::RunError)
                    .with_description(e.to_string()),
                None,
            );
        }

        match receiver.recv_timeout(Duration::from_millis(budget)) {
            Ok((environment, pair)) => {
                if pair.status.keeps_environment() {
                    (pair, Some(environment))
                } else {
                    environment.shutdown();
                    (pair, None)
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("{} timed out after {}ms", details.id, budget);
                if let Some(kill) = kill_switch {
                    kill();
                }
                (MutationStatusTestPair::new(0, DetectionStatus::TimedOut), None)
            }
            Err(RecvTimeoutError::Disconnected) => (
                MutationStatusTestPair::new(0, DetectionStatus::RunError)
                    .with_description("environment worker terminated unexpectedly"),
                None,
            ),
        }
    }
}

/// Load the mutant and run its tests until the first one kills it
fn check_mutant(
    environment: &mut dyn IsolatedEnvironment,
    request: &MutantRequest,
) -> MutationStatusTestPair {
    if let Err(e) = environment.load_mutant(&request.id) {
        return MutationStatusTestPair::new(0, DetectionStatus::NonViable)
            .with_description(e.to_string());
    }

    let mut tests_run = 0;
    for test in &request.tests {
        tests_run += 1;
        match environment.run_test(test) {
            TestOutcome::Passed => {}
            TestOutcome::Failed(failure) => {
                debug!("{} killed by {}: {}", request.id, test.name, failure);
                return MutationStatusTestPair::killed_by(tests_run, &test.name);
            }
            TestOutcome::MemoryError => {
                return MutationStatusTestPair::new(tests_run, DetectionStatus::MemoryError);
            }
            TestOutcome::Crashed(reason) => {
                return MutationStatusTestPair::new(tests_run, DetectionStatus::RunError)
                    .with_description(reason);
            }
        }
    }

    MutationStatusTestPair::new(tests_run, DetectionStatus::Survived)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MutationError;
    use crate::timeout::PercentAndConstantTimeoutStrategy;
    use crate::unit::CollectingResults;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy)]
    enum Behaviour {
        Pass,
        FailAt(usize),
        MemoryErrorAt(usize),
        Unloadable,
        Hang,
    }

    #[derive(Debug, Default)]
    struct Log {
        launches: usize,
        scopes: Vec<BTreeSet<ClassName>>,
        loaded: Vec<usize>,
        tests_run: Vec<String>,
        kills: usize,
        shutdowns: usize,
    }

    struct ScriptedFactory {
        behaviours: HashMap<usize, Behaviour>,
        log: Arc<Mutex<Log>>,
        fail_launch: bool,
    }

    impl ScriptedFactory {
        fn new(behaviours: &[(usize, Behaviour)]) -> Self {
            Self {
                behaviours: behaviours.iter().copied().collect(),
                log: Arc::new(Mutex::new(Log::default())),
                fail_launch: false,
            }
        }
    }

    impl EnvironmentFactory for ScriptedFactory {
        fn launch(&self, test_classes: &BTreeSet<ClassName>) -> Result<Box<dyn IsolatedEnvironment>> {
            if self.fail_launch {
                return Err(MutationError::Environment {
                    reason: "no slots".to_string(),
                });
            }
            let mut log = self.log.lock().unwrap();
            log.launches += 1;
            log.scopes.push(test_classes.clone());
            Ok(Box::new(ScriptedEnvironment {
                behaviours: self.behaviours.clone(),
                log: Arc::clone(&self.log),
                current: Behaviour::Pass,
                position: 0,
            }))
        }
    }

    struct ScriptedEnvironment {
        behaviours: HashMap<usize, Behaviour>,
        log: Arc<Mutex<Log>>,
        current: Behaviour,
        position: usize,
    }

    impl IsolatedEnvironment for ScriptedEnvironment {
        fn load_mutant(&mut self, id: &MutationIdentifier) -> Result<()> {
            self.log.lock().unwrap().loaded.push(id.index);
            self.current = self
                .behaviours
                .get(&id.index)
                .copied()
                .unwrap_or(Behaviour::Pass);
            self.position = 0;
            match self.current {
                Behaviour::Unloadable => Err(MutationError::Environment {
                    reason: "verify error".to_string(),
                }),
                _ => Ok(()),
            }
        }

        fn run_test(&mut self, test: &TestInfo) -> TestOutcome {
            self.log.lock().unwrap().tests_run.push(test.name.clone());
            self.position += 1;
            match self.current {
                Behaviour::FailAt(n) if n == self.position => TestOutcome::Failed("expected 3".to_string()),
                Behaviour::MemoryErrorAt(n) if n == self.position => TestOutcome::MemoryError,
                Behaviour::Hang => {
                    thread::sleep(Duration::from_millis(300));
                    TestOutcome::Passed
                }
                _ => TestOutcome::Passed,
            }
        }

        fn kill_switch(&self) -> Option<KillSwitch> {
            let log = Arc::clone(&self.log);
            Some(Box::new(move || log.lock().unwrap().kills += 1))
        }

        fn shutdown(self: Box<Self>) {
            self.log.lock().unwrap().shutdowns += 1;
        }
    }

    fn mutation(index: usize, tests: &[&str]) -> MutationDetails {
        MutationDetails::new(
            MutationIdentifier {
                class: ClassName::new("com/example/Foo"),
                method: "bar".to_string(),
                descriptor: "(I)I".to_string(),
                operator: "MATH".to_string(),
                index,
            },
            10 + index as u32,
            "Replaced integer addition with subtraction",
        )
        .with_tests(
            tests
                .iter()
                .map(|name| TestInfo::new(*name, "com/example/FooTest", 1))
                .collect(),
        )
    }

    fn unit(mutations: Vec<MutationDetails>, budget_ms: u64) -> MutationTestUnit {
        MutationTestUnit::new(
            mutations,
            BTreeSet::from([ClassName::new("com/example/FooTest")]),
            vec!["MATH".to_string()],
            Arc::new(PercentAndConstantTimeoutStrategy::new(0.0, budget_ms)),
            false,
        )
    }

    fn statuses(rc: &CollectingResults) -> Vec<DetectionStatus> {
        rc.results().iter().map(MutationResult::status).collect()
    }

    #[test]
    fn test_uncovered_mutant_never_dispatched() {
        let factory = ScriptedFactory::new(&[]);
        let unit = unit(vec![mutation(0, &[]), mutation(1, &["a"])], 2000);
        let mut rc = CollectingResults::new();
        unit.execute(&factory, &mut rc);

        assert_eq!(
            statuses(&rc),
            vec![DetectionStatus::NoCoverage, DetectionStatus::Survived]
        );
        assert_eq!(factory.log.lock().unwrap().loaded, vec![1]);
    }

    #[test]
    fn test_stops_at_first_kill() {
        let factory = ScriptedFactory::new(&[(0, Behaviour::FailAt(2))]);
        let unit = unit(vec![mutation(0, &["a", "b", "c"])], 2000);
        let mut rc = CollectingResults::new();
        unit.execute(&factory, &mut rc);

        let results = rc.results();
        assert_eq!(results[0].status(), DetectionStatus::Killed);
        assert_eq!(results[0].killing_test(), Some("b"));
        assert_eq!(results[0].status_test_pair.tests_run, 2);
        assert_eq!(factory.log.lock().unwrap().tests_run, vec!["a", "b"]);
    }

    #[test]
    fn test_environment_reused_after_normal_outcomes() {
        let factory = ScriptedFactory::new(&[(0, Behaviour::FailAt(1))]);
        let unit = unit(vec![mutation(0, &["a"]), mutation(1, &["a", "b"])], 2000);
        let mut rc = CollectingResults::new();
        unit.execute(&factory, &mut rc);

        assert_eq!(
            statuses(&rc),
            vec![DetectionStatus::Killed, DetectionStatus::Survived]
        );
        let log = factory.log.lock().unwrap();
        assert_eq!(log.launches, 1);
        assert_eq!(log.scopes[0], BTreeSet::from([ClassName::new("com/example/FooTest")]));
    }

    #[test]
    fn test_abnormal_outcomes_replace_environment() {
        let factory = ScriptedFactory::new(&[
            (0, Behaviour::MemoryErrorAt(1)),
            (1, Behaviour::Unloadable),
        ]);
        let unit = unit(
            vec![mutation(0, &["a"]), mutation(1, &["a"]), mutation(2, &["a"])],
            2000,
        );
        let mut rc = CollectingResults::new();
        unit.execute(&factory, &mut rc);

        assert_eq!(
            statuses(&rc),
            vec![
                DetectionStatus::MemoryError,
                DetectionStatus::NonViable,
                DetectionStatus::Survived
            ]
        );
        assert_eq!(factory.log.lock().unwrap().launches, 3);
    }

    #[test]
    fn test_hanging_mutant_times_out() {
        let factory = ScriptedFactory::new(&[(0, Behaviour::Hang)]);
        let unit = unit(vec![mutation(0, &["a"]), mutation(1, &["a"])], 50);
        let mut rc = CollectingResults::new();
        unit.execute(&factory, &mut rc);

        assert_eq!(
            statuses(&rc),
            vec![DetectionStatus::TimedOut, DetectionStatus::Survived]
        );
        let log = factory.log.lock().unwrap();
        assert_eq!(log.kills, 1);
        assert_eq!(log.launches, 2);
    }

    #[test]
    fn test_timed_out_environment_shut_down_when_worker_finishes() {
        let factory = ScriptedFactory::new(&[(0, Behaviour::Hang)]);
        let unit = unit(vec![mutation(0, &["a"]), mutation(1, &["a"])], 30);
        let mut rc = CollectingResults::new();
        unit.execute(&factory, &mut rc);

        // Let the abandoned worker finish its hanging test
        thread::sleep(Duration::from_millis(600));

        let log = factory.log.lock().unwrap();
        assert_eq!(log.launches, 2);
        assert_eq!(log.shutdowns, 2);
    }

    #[test]
    fn test_reused_environment_shut_down_once() {
        let factory = ScriptedFactory::new(&[]);
        let unit = unit(vec![mutation(0, &["a"]), mutation(1, &["a"])], 2000);
        let mut rc = CollectingResults::new();
        unit.execute(&factory, &mut rc);

        let log = factory.log.lock().unwrap();
        assert_eq!(log.launches, 1);
        assert_eq!(log.shutdowns, 1);
    }

    #[test]
    fn test_launch_failure_is_run_error() {
        let mut factory = ScriptedFactory::new(&[]);
        factory.fail_launch = true;
        let unit = unit(vec![mutation(0, &["a"]), mutation(1, &[])], 2000);
        let mut rc = CollectingResults::new();
        unit.execute(&factory, &mut rc);

        assert_eq!(
            statuses(&rc),
            vec![DetectionStatus::RunError, DetectionStatus::NoCoverage]
        );
        assert_eq!(rc.started.len(), 1);
        assert_eq!(rc.finished.len(), 1);
    }
}
