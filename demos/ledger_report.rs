//! Ledger Report Example
//!
//! Reloads a checkpoint ledger (optionally merging a second one) and renders
//! every group as a plain-text accuracy table.
//!
//! Run with: cargo run --example ledger_report -- <checkpoint.json> [other.json] [strategy]
//!
//! Without arguments the checkpoint written by the `benchmark_run` example is
//! used.

use std::io::{self, Write};

use trueno_fit::aggregate::{Renderer, Report};
use trueno_fit::config::BenchmarkOptions;
use trueno_fit::ledger::{self, LedgerDocument, MergeStrategy};

/// Writes one table per cost function: rows are problems, columns are
/// `software:minimizer:jacobian:hessian`, cells are normalized accuracy.
struct TextTable<W: Write> {
    out: W,
}

impl<W: Write> Renderer for TextTable<W> {
    fn render(&mut self, report: &Report) -> anyhow::Result<()> {
        writeln!(self.out, "## {}", report.label)?;
        for category in report.grid.categories() {
            let columns = report.grid.columns(category);
            writeln!(self.out, "\n### {category}")?;
            write!(self.out, "{:<28}", "problem")?;
            for column in columns {
                write!(self.out, " | {column:>24}")?;
            }
            writeln!(self.out)?;

            for row in report.grid.rows() {
                write!(self.out, "{:<28}", row.label())?;
                for cell in report.grid.cells(row, category) {
                    let text = match cell {
                        None => "-".to_string(),
                        Some(r) => {
                            let norm = r.norm_accuracy().unwrap_or(f64::INFINITY);
                            let mark = if r.is_best() { "*" } else { "" };
                            format!("{norm:.4} [{}]{mark}", r.error_code().code())
                        }
                    };
                    write!(self.out, " | {text:>24}")?;
                }
                writeln!(self.out)?;
            }
        }
        if !report.failed_problems.is_empty() {
            writeln!(self.out, "\nFailed: {}", report.failed_problems.join(", "))?;
        }
        writeln!(self.out)?;
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    trueno_fit::logging::init("warn");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut document = match args.first() {
        Some(path) => LedgerDocument::from_path(path)?,
        None => {
            let options = BenchmarkOptions {
                results_dir: std::env::temp_dir().join("trueno-fit-demo"),
                ..BenchmarkOptions::default()
            };
            ledger::load(&options)?
        }
    };
    if let Some(other) = args.get(1) {
        let strategy: MergeStrategy = args.get(2).map_or(Ok(MergeStrategy::First), |s| s.parse())?;
        document = ledger::merge(document, LedgerDocument::from_path(other)?, strategy);
    }

    let mut table = TextTable {
        out: io::stdout().lock(),
    };
    for group in document.into_groups() {
        table.render(&Report::from_group(group))?;
    }
    Ok(())
}
