//! In-memory program description
//!
//! A program file lists class definitions and per-line test coverage. It
//! stands in for the class path and the coverage database when mutation
//! points are computed from the command line.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::bytecode::{ClassDef, ClassName};
use crate::details::TestInfo;
use crate::error::MutationError;
use crate::source::{ClassSource, CoverageSource};

/// Tests covering one source line of a class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineCoverage {
    pub class: ClassName,
    pub line: u32,
    #[serde(default)]
    pub tests: Vec<TestInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub classes: Vec<ClassDef>,
    #[serde(default)]
    pub coverage: Vec<LineCoverage>,
}

impl Program {
    /// Load a program from a YAML file
    pub fn load(path: &Path) -> Result<Self, MutationError> {
        let content = std::fs::read_to_string(path).map_err(|e| MutationError::FileReadError {
            file: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let program: Program =
            serde_yaml::from_str(&content).map_err(|e| MutationError::ConfigError {
                message: format!("Failed to parse program file '{}': {}", path.display(), e),
            })?;
        program.validate()?;
        Ok(program)
    }

    /// Class names and method signatures must be unique, since mutations are
    /// addressed by them
    pub fn validate(&self) -> Result<(), MutationError> {
        let mut classes = HashSet::new();
        for class in &self.classes {
            if !classes.insert(&class.name) {
                return Err(MutationError::ConfigError {
                    message: format!("Class {} is defined more than once", class.name),
                });
            }

            let mut methods = HashSet::new();
            for method in &class.methods {
                if !methods.insert((method.name.as_str(), method.descriptor.as_str())) {
                    return Err(MutationError::ConfigError {
                        message: format!(
                            "Method {}{} is defined more than once in {}",
                            method.name, method.descriptor, class.name
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Names of every class, in declaration order
    pub fn class_names(&self) -> Vec<ClassName> {
        self.classes.iter().map(|c| c.name.clone()).collect()
    }
}

impl ClassSource for Program {
    fn fetch(&self, class: &ClassName) -> Option<ClassDef> {
        self.classes.iter().find(|c| &c.name == class).cloned()
    }
}

impl CoverageSource for Program {
    fn tests_for(&self, class: &ClassName, line: u32) -> Vec<TestInfo> {
        let mut tests: Vec<TestInfo> = Vec::new();
        for entry in self
            .coverage
            .iter()
            .filter(|c| &c.class == class && c.line == line)
        {
            for test in &entry.tests {
                if !tests.contains(test) {
                    tests.push(test.clone());
                }
            }
        }
        tests.sort_by(|a, b| a.time_ms.cmp(&b.time_ms).then_with(|| a.name.cmp(&b.name)));
        tests
    }
}

/// Example program printed by the `example` command
pub const EXAMPLE_PROGRAM: &str = r#"# Classes to mutate and the tests covering each line
classes:
  - name: com/example/Calculator
    methods:
      - name: add
        descriptor: (II)I
        instructions:
          - opcode: !Load Int
            operand: !Var 1
            line: 3
          - opcode: !Load Int
            operand: !Var 2
            line: 3
          - opcode: !Arith [Add, Int]
            line: 3
          - opcode: !Return Int
            line: 3
      - name: isPositive
        descriptor: (I)Z
        instructions:
          - opcode: !Load Int
            operand: !Var 1
            line: 6
          - opcode: !If Le
            operand: !Label 0
            line: 6
          - opcode: Const
            operand: !Int 1
            line: 7
          - opcode: !Return Int
            line: 7
          - opcode: Label
            operand: !Label 0
          - opcode: Const
            operand: !Int 0
            line: 8
          - opcode: !Return Int
            line: 8
  - name: com/example/Greeter
    methods:
      - name: greet
        descriptor: (Lcom/example/Person;)Ljava/lang/String;
        instructions:
          - opcode: !Load Ref
            operand: !Var 1
            line: 12
          - opcode: GetField
            operand: !Field
              owner: com/example/Person
              name: name
              descriptor: Ljava/lang/String;
            line: 12
          - opcode: !Return Ref
            line: 12

coverage:
  - class: com/example/Calculator
    line: 3
    tests:
      - name: testAdd
        defining_class: com/example/CalculatorTest
        time_ms: 5
  - class: com/example/Calculator
    line: 6
    tests:
      - name: testIsPositive
        defining_class: com/example/CalculatorTest
        time_ms: 2
      - name: testSign
        defining_class: com/example/SignTest
        time_ms: 2
  - class: com/example/Calculator
    line: 7
    tests:
      - name: testIsPositive
        defining_class: com/example/CalculatorTest
        time_ms: 2
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{ArithOp, NumType, Opcode, Operand, ValueKind};
    use crate::operators;
    use crate::source::{ClassMutationSource, Mutater, MutationSource};
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn example() -> Program {
        serde_yaml::from_str(EXAMPLE_PROGRAM).unwrap()
    }

    #[test]
    fn test_example_parses() {
        let program = example();
        assert_eq!(
            program.class_names(),
            vec![
                ClassName::new("com/example/Calculator"),
                ClassName::new("com/example/Greeter")
            ]
        );

        let add = &program.classes[0].methods[0];
        assert_eq!(add.instructions[2].opcode, Opcode::Arith(ArithOp::Add, NumType::Int));
        assert_eq!(add.instructions[3].opcode, Opcode::Return(Some(ValueKind::Int)));
        assert_eq!(program.classes[0].methods[1].instructions[4].operand, Operand::Label(0));
        assert_eq!(program.classes[0].methods[1].instructions[4].line, 0);
    }

    #[test]
    fn test_tests_sorted_cheapest_first_then_by_name() {
        let class = ClassName::new("com/example/Calculator");
        let mut program = example();
        program.coverage.push(LineCoverage {
            class: class.clone(),
            line: 6,
            tests: vec![
                TestInfo::new("testIsPositive", "com/example/CalculatorTest", 2),
                TestInfo::new("testQuick", "com/example/CalculatorTest", 1),
            ],
        });

        let names: Vec<String> = program
            .tests_for(&class, 6)
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["testQuick", "testIsPositive", "testSign"]);
        assert!(program.tests_for(&class, 99).is_empty());
    }

    #[test]
    fn test_fetch() {
        let program = example();
        assert!(program.fetch(&ClassName::new("com/example/Greeter")).is_some());
        assert!(program.fetch(&ClassName::new("com/example/Missing")).is_none());
    }

    #[test]
    fn test_mutations_carry_coverage() {
        let program = example();
        let mutater = Mutater::new(operators::from_names(&["MATH"]).unwrap());
        let source = ClassMutationSource::new(mutater, &program, &program);

        let mutations = source.create_mutations(&ClassName::new("com/example/Calculator"));
        assert_eq!(mutations.len(), 1);
        assert_eq!(mutations[0].line, 3);
        assert_eq!(mutations[0].tests_in_order[0].name, "testAdd");
        assert_eq!(mutations[0].baseline_ms(), 5);

        assert!(source
            .create_mutations(&ClassName::new("com/example/Greeter"))
            .is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(EXAMPLE_PROGRAM.as_bytes()).unwrap();

        let program = Program::load(file.path()).unwrap();
        assert_eq!(program, example());
    }

    #[test]
    fn test_duplicate_method_rejected() {
        let mut program = example();
        assert!(program.validate().is_ok());

        let add = program.classes[0].methods[0].clone();
        program.classes[0].methods.push(add);
        assert!(matches!(
            program.validate(),
            Err(MutationError::ConfigError { .. })
        ));

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(serde_yaml::to_string(&program).unwrap().as_bytes())
            .unwrap();
        assert!(matches!(
            Program::load(file.path()),
            Err(MutationError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_duplicate_class_rejected() {
        let mut program = example();
        let greeter = program.classes[1].clone();
        program.classes.push(greeter);
        assert!(program.validate().is_err());
    }

    #[test]
    fn test_load_rejects_garbage() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"classes: [[[").unwrap();

        assert!(matches!(
            Program::load(file.path()),
            Err(MutationError::ConfigError { .. })
        ));
    }
}
