//! Bytecode Mutation Testing Framework
//!
//! This library finds mutation points in stack-machine bytecode, builds
//! single-mutation variants of classes, and groups mutations into units that
//! are either replayed from known results or executed against isolated test
//! environments.
//!
//! # Example Configuration
//!
//! ```yaml
//! version: "1.0"
//! settings:
//!   mutation_unit_size: 10
//!   mutators: [DEFAULTS, CONSTRUCTOR_CALLS]
//! classes:
//!   - com/example/Calculator
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use bytecode_mutation_testing::{
//!     operators, ClassMutationSource, Config, Mutater, MutationTestBuilder, Program,
//! };
//! use std::path::Path;
//!
//! let config = Config::load(Path::new("mutation.yaml")).unwrap();
//! let program = Program::load(Path::new("program.yaml")).unwrap();
//! let mutater = Mutater::new(operators::from_names(&config.settings.mutators).unwrap());
//! let source = ClassMutationSource::new(mutater, &program, &program);
//! let units = MutationTestBuilder::new(config.settings.clone(), &source)
//!     .build(&program.class_names())
//!     .unwrap();
//! println!("{} unit(s)", units.len());
//! ```

pub mod analyser;
pub mod builder;
pub mod bytecode;
pub mod config;
pub mod context;
pub mod details;
pub mod error;
pub mod history;
pub mod matcher;
pub mod mutator;
pub mod operators;
pub mod program;
pub mod report;
pub mod results;
pub mod runner;
pub mod source;
pub mod timeout;
pub mod unit;

// Re-export main types at crate root
pub use analyser::{MutationAnalyser, NullAnalyser};
pub use builder::MutationTestBuilder;
pub use bytecode::{ClassDef, ClassName, Instruction, Method, Opcode, Operand};
pub use config::{Config, Settings};
pub use details::{MutationDetails, MutationIdentifier, TestInfo};
pub use error::{MutationError, Result};
pub use history::{read_history, write_history, HistoryAnalyser};
pub use program::{Program, EXAMPLE_PROGRAM};
pub use report::MutationReport;
pub use results::{DetectionStatus, MutationResult, MutationStatusTestPair};
pub use runner::{EnvironmentFactory, IsolatedEnvironment, MutationTestUnit, TestOutcome};
pub use source::{ClassMutationSource, Mutant, Mutater, MutationSource};
pub use timeout::{PercentAndConstantTimeoutStrategy, TimeoutStrategy};
pub use unit::{CollectingResults, KnownStatusMutationTestUnit, ResultCollector, TestUnit};
