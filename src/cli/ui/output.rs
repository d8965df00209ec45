use console::style;

use crate::evaluation::EvaluationReport;
use crate::orchestrator::ProjectRun;

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    /// Run summary followed by every failure
    pub fn run(&self, run: &ProjectRun) {
        self.section("Run Summary");
        println!("{}", run.summary);
        self.section("Model Usage");
        println!("{}", run.summary.metrics.display());

        if run.failures.is_empty() {
            self.success(&format!("{} units documented", run.summary.units_succeeded));
            return;
        }

        self.section("Failures");
        for failure in run.failures.iter() {
            self.error(&failure.to_string());
        }
        if run.summary.cancelled {
            self.warning("Run was cancelled before all units finished");
        }
    }

    pub fn report(&self, report: &EvaluationReport, weakest: usize) {
        self.section("Evaluation");
        println!("{}", report);

        let units = report.weakest(weakest);
        if units.is_empty() {
            return;
        }
        self.section("Weakest Units");
        for unit in units {
            let missing = if unit.facets.missing.is_empty() {
                String::new()
            } else {
                format!(" missing: {}", unit.facets.missing.join(", "))
            };
            println!(
                "  {:.2}  {} ({}){}",
                unit.score.aggregate,
                style(unit.unit_id.as_str()).cyan(),
                unit.style,
                style(missing).dim()
            );
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
