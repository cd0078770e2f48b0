//! CLI for bytecode mutation testing

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use env_logger::Env;

use bytecode_mutation_testing::{
    operators, write_history, ClassMutationSource, ClassName, CollectingResults, Config,
    HistoryAnalyser, MutationAnalyser, MutationReport, MutationSource, MutationTestBuilder,
    MutationTestUnit, Mutater, NullAnalyser, Program, TestUnit, EXAMPLE_PROGRAM,
};

#[derive(Parser)]
#[command(name = "bytecode-mutation-testing")]
#[command(author, version, about = "Bytecode mutation test planning", long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the mutation points of a program
    Mutants {
        /// Path to the program file
        #[arg(short, long, default_value = "program.yaml")]
        program: PathBuf,

        /// Path to the config file
        #[arg(short, long, default_value = "mutation.yaml")]
        config: PathBuf,
    },

    /// Build execution units and replay results already known
    Plan {
        /// Path to the program file
        #[arg(short, long, default_value = "program.yaml")]
        program: PathBuf,

        /// Path to the config file
        #[arg(short, long, default_value = "mutation.yaml")]
        config: PathBuf,

        /// Results of an earlier run to reuse
        #[arg(long)]
        history: Option<PathBuf>,

        /// Store the replayed results here
        #[arg(long)]
        write_history: Option<PathBuf>,
    },

    /// Validate the configuration without building anything
    Validate {
        /// Path to the config file
        #[arg(short, long, default_value = "mutation.yaml")]
        config: PathBuf,
    },

    /// Show an example program file
    Example,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    let outcome = match cli.command {
        Commands::Mutants { program, config } => list_mutants(&program, &config),
        Commands::Plan {
            program,
            config,
            history,
            write_history,
        } => plan(&program, &config, history.as_deref(), write_history.as_deref()),
        Commands::Validate { config } => validate_config(&config),
        Commands::Example => {
            println!("{}", EXAMPLE_PROGRAM);
            Ok(ExitCode::SUCCESS)
        }
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn load_inputs(program_path: &Path, config_path: &Path) -> Result<(Program, Config)> {
    println!("{}", "Loading configuration...".dimmed());
    let config = Config::load(config_path)?;
    config.validate()?;

    println!("{}", "Loading program...".dimmed());
    let program = Program::load(program_path)?;
    println!("Found {} class(es) in program", program.classes.len());

    Ok((program, config))
}

fn target_classes(program: &Program, config: &Config) -> Vec<ClassName> {
    if config.classes.is_empty() {
        program.class_names()
    } else {
        config.classes.clone()
    }
}

fn list_mutants(program_path: &Path, config_path: &Path) -> Result<ExitCode> {
    let (program, config) = load_inputs(program_path, config_path)?;
    let mutater = Mutater::new(operators::from_names(&config.settings.mutators)?);
    let source = ClassMutationSource::new(mutater, &program, &program);

    let mut total = 0;
    for class in target_classes(&program, &config) {
        let mutations = source.create_mutations(&class);
        if mutations.is_empty() {
            continue;
        }
        println!();
        println!("{}", class.as_str().bold());
        for details in &mutations {
            let coverage = if details.is_covered() {
                format!("{} test(s)", details.tests_in_order.len()).green()
            } else {
                "no coverage".red()
            };
            println!(
                "  {}{} line {} - {} [{}]",
                details.id.method,
                details.id.descriptor.dimmed(),
                details.line,
                details.description,
                coverage
            );
        }
        total += mutations.len();
    }

    println!();
    println!("Found {} mutation(s)", total);
    Ok(ExitCode::SUCCESS)
}

fn plan(
    program_path: &Path,
    config_path: &Path,
    history: Option<&Path>,
    history_out: Option<&Path>,
) -> Result<ExitCode> {
    let (program, config) = load_inputs(program_path, config_path)?;
    let mutater = Mutater::new(operators::from_names(&config.settings.mutators)?);
    let source = ClassMutationSource::new(mutater, &program, &program);

    let history_analyser = match history {
        Some(path) => {
            let analyser = HistoryAnalyser::load(path)
                .with_context(|| format!("loading history from {}", path.display()))?;
            println!("Loaded {} stored result(s)", analyser.len());
            Some(analyser)
        }
        None => None,
    };
    let analyser: &dyn MutationAnalyser = match &history_analyser {
        Some(analyser) => analyser,
        None => &NullAnalyser,
    };

    let builder = MutationTestBuilder::with_analyser(config.settings.clone(), analyser, &source);
    let units = builder.build(&target_classes(&program, &config))?;

    let mut collector = CollectingResults::new();
    let mut pending = Vec::new();
    for unit in &units {
        collect_known(unit, &mut collector, &mut pending);
    }

    if !pending.is_empty() {
        println!();
        println!("{}", "Pending Execution Units".bold());
        println!("{}", "-".repeat(40));
        for unit in &pending {
            let scope: Vec<&str> = unit.test_classes().iter().map(|c| c.as_str()).collect();
            println!(
                "  {} - {} mutation(s), tests from [{}]",
                unit.description(),
                unit.mutations().len(),
                scope.join(", ")
            );
        }
    }

    let results = collector.results();
    if let Some(path) = history_out {
        write_history(path, &results)?;
        println!("Wrote {} result(s) to {}", results.len(), path.display());
    }

    let report = MutationReport::new(results);
    report.print();

    let pending_mutations: usize = pending.iter().map(|u| u.mutations().len()).sum();
    println!();
    println!(
        "{} unit(s) built, {} mutation(s) awaiting execution",
        units.len(),
        pending_mutations
    );

    if report.survived() > 0 {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Replay known-status units, setting aside the ones that need execution
fn collect_known<'u>(
    unit: &'u TestUnit,
    collector: &mut CollectingResults,
    pending: &mut Vec<&'u MutationTestUnit>,
) {
    match unit {
        TestUnit::KnownStatus(known) => known.execute(collector),
        TestUnit::Mutation(fresh) => pending.push(fresh),
        TestUnit::Multiple(units) => {
            for unit in units {
                collect_known(unit, collector, pending);
            }
        }
    }
}

fn validate_config(config_path: &Path) -> Result<ExitCode> {
    println!("{}", "Loading configuration...".dimmed());
    let config = Config::load(config_path)?;

    match config.validate() {
        Ok(()) => {
            let operators = operators::from_names(&config.settings.mutators)?;
            println!("{} Configuration is valid", "✓".green().bold());
            for operator in operators {
                println!("  {} {}", "•".dimmed(), operator.name());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("{} {}", "✗".red().bold(), e);
            Ok(ExitCode::FAILURE)
        }
    }
}
