//! Report generation for mutation testing results
//!
//! This module formats and displays mutation outcomes.

use colored::{ColoredString, Colorize};

use crate::results::{DetectionStatus, MutationResult};

/// Summary report of mutation testing
#[derive(Debug)]
pub struct MutationReport {
    pub results: Vec<MutationResult>,
}

impl MutationReport {
    pub fn new(results: Vec<MutationResult>) -> Self {
        Self { results }
    }

    /// Count of mutations with the given status
    pub fn count(&self, status: DetectionStatus) -> usize {
        self.results.iter().filter(|r| r.status() == status).count()
    }

    pub fn killed(&self) -> usize {
        self.count(DetectionStatus::Killed)
    }

    pub fn survived(&self) -> usize {
        self.count(DetectionStatus::Survived)
    }

    pub fn no_coverage(&self) -> usize {
        self.count(DetectionStatus::NoCoverage)
    }

    /// Mutations the test suite is credited with
    pub fn detected(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status().is_detected())
            .count()
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Percentage of detected mutations
    pub fn score(&self) -> f64 {
        if self.total() == 0 {
            return 100.0;
        }
        (self.detected() as f64 / self.total() as f64) * 100.0
    }

    /// Mutations no test noticed, covered or not
    pub fn undetected(&self) -> Vec<&MutationResult> {
        self.results
            .iter()
            .filter(|r| {
                matches!(
                    r.status(),
                    DetectionStatus::Survived | DetectionStatus::NoCoverage
                )
            })
            .collect()
    }

    /// Print the report to stdout
    pub fn print(&self) {
        println!();
        println!("{}", "Mutation Testing Report".bold());
        println!("{}", "=".repeat(60));
        println!();

        for result in &self.results {
            println!(
                "{} {} - {}",
                status_tag(result.status()),
                result.details.id.to_string().dimmed(),
                result.details.description
            );
            match result.killing_test() {
                Some(test) => println!(
                    "        line {} {}",
                    result.details.line,
                    format!("({})", test).dimmed()
                ),
                None => println!("        line {}", result.details.line),
            }
        }

        println!();
        println!("{}", "Summary".bold());
        println!("{}", "-".repeat(40));
        println!("Total mutations:   {}", self.total());
        println!(
            "Killed:            {} {}",
            self.killed(),
            "(good - tests caught the mutation)".dimmed()
        );
        println!(
            "Survived:          {} {}",
            self.survived(),
            "(bad - tests missed the mutation)".dimmed()
        );

        for (label, status) in [
            ("No coverage:       ", DetectionStatus::NoCoverage),
            ("Timed out:         ", DetectionStatus::TimedOut),
            ("Non viable:        ", DetectionStatus::NonViable),
            ("Memory errors:     ", DetectionStatus::MemoryError),
            ("Run errors:        ", DetectionStatus::RunError),
            ("Not started:       ", DetectionStatus::NotStarted),
        ] {
            let count = self.count(status);
            if count > 0 {
                println!("{}{}", label, count);
            }
        }

        println!();
        let score = self.score();
        let score_str = format!("{:.1}%", score);
        let score_colored = if score >= 90.0 {
            score_str.green().bold()
        } else if score >= 70.0 {
            score_str.yellow().bold()
        } else {
            score_str.red().bold()
        };
        println!("Mutation Score:    {}", score_colored);

        let undetected = self.undetected();
        if !undetected.is_empty() {
            println!();
            println!(
                "{}",
                "Undetected Mutations (improve your tests!)".red().bold()
            );
            println!("{}", "-".repeat(40));
            for result in undetected {
                println!("  • {}", result.details.description.yellow());
                println!(
                    "    in {}::{} at line {}",
                    result.details.id.class, result.details.id.method, result.details.line
                );
            }
        }

        println!();
        println!("{}", "Score Interpretation".dimmed());
        println!("{}", "-".repeat(40).dimmed());
        println!("{}", "90-100%: Excellent test coverage".dimmed());
        println!("{}", "70-89%:  Good coverage, some gaps".dimmed());
        println!("{}", "50-69%:  Moderate, needs improvement".dimmed());
        println!("{}", "<50%:    Poor, significant gaps".dimmed());
    }
}

fn status_tag(status: DetectionStatus) -> ColoredString {
    let tag = format!("[{}]", status);
    match status {
        DetectionStatus::Killed => tag.green().bold(),
        DetectionStatus::Survived | DetectionStatus::NoCoverage => tag.red().bold(),
        DetectionStatus::NotStarted => tag.dimmed(),
        _ => tag.yellow().bold(),
    }
}
