//! The `qtiscore score` command.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};

use qtiscore_core::config::load_config_from;
use qtiscore_core::logging::{LogLevel, MemoryLogger, TracingLogger};
use qtiscore_core::parser;
use qtiscore_core::prepare::SCORE_TOTAL;
use qtiscore_core::report::ScoringReport;
use qtiscore_core::results::AssessmentResult;
use qtiscore_core::{ScoringContext, ScoringEngine};
use qtiscore_report::html::write_html_report;
use qtiscore_report::xml::write_xml_result;

const FORMATS: [&str; 3] = ["json", "xml", "html"];

pub struct ScoreArgs {
    pub items: PathBuf,
    pub test: Option<PathBuf>,
    pub results: PathBuf,
    pub output: Option<PathBuf>,
    pub format: String,
    pub parallel: bool,
    pub add_totals: bool,
    pub config: Option<PathBuf>,
}

pub async fn execute(args: ScoreArgs) -> Result<()> {
    let formats = parse_formats(&args.format)?;
    let config = load_config_from(args.config.as_deref())?;

    let items = parser::load_items(&args.items)?;
    anyhow::ensure!(
        !items.is_empty(),
        "no item definitions found in {}",
        args.items.display()
    );
    let item_count = items.len();

    let mut test = args.test.as_deref().map(parser::load_test).transpose()?;
    if let Some(test) = &mut test {
        if args.add_totals || config.add_total_scores {
            let added = test.add_total_and_category_scores();
            if !added.is_empty() {
                eprintln!("Added test outcomes: {}", added.join(", "));
            }
        }
    }
    let test_id = test.as_ref().map(|t| t.identifier.clone());

    let loaded = parser::load_results(&args.results)?;
    anyhow::ensure!(
        !loaded.is_empty(),
        "no result documents found in {}",
        args.results.display()
    );
    let (paths, results): (Vec<PathBuf>, Vec<AssessmentResult>) = loaded.into_iter().unzip();

    eprintln!(
        "qtiscore v{}: scoring {} results against {} items{}",
        env!("CARGO_PKG_VERSION"),
        results.len(),
        item_count,
        test_id
            .as_deref()
            .map(|t| format!(" and test {t}"))
            .unwrap_or_default()
    );

    let memory = Arc::new(MemoryLogger::new());
    let mut ctx = ScoringContext::new(results)
        .with_items(items)
        .with_logger(Arc::new((TracingLogger, Arc::clone(&memory))))
        .parallel(args.parallel || config.process_parallel);
    for operator in config.custom_operators() {
        ctx = ctx.with_custom_operator(operator);
    }

    let start = Instant::now();
    let engine = ScoringEngine::new(config.engine_config());
    match test {
        Some(test) => {
            ctx = ctx.with_test(test);
            engine.process_responses_and_outcomes(&mut ctx).await?;
        }
        None => engine.process_responses(&mut ctx).await?,
    }
    let duration_ms = start.elapsed().as_millis() as u64;

    let report = ScoringReport::from_results(
        test_id.as_deref(),
        item_count,
        &ctx.assessment_results,
        memory.drain(),
        duration_ms,
    );
    print_summary(&report);

    let output = args.output.unwrap_or(config.output_dir);
    std::fs::create_dir_all(&output)
        .with_context(|| format!("failed to create output directory: {}", output.display()))?;

    for fmt in &formats {
        match *fmt {
            "json" => {
                for (path, result) in paths.iter().zip(&ctx.assessment_results) {
                    write_json_result(result, &output.join("results").join(file_name(path, "json")))?;
                }
                eprintln!("Scored results saved to: {}", output.join("results").display());
            }
            "xml" => {
                for (path, result) in paths.iter().zip(&ctx.assessment_results) {
                    write_xml_result(result, &output.join("results").join(file_name(path, "xml")))?;
                }
                eprintln!("QTI result XML saved to: {}", output.join("results").display());
            }
            "html" => {
                let path = output.join("report.html");
                write_html_report(&report, &path)?;
                eprintln!("HTML score sheet: {}", path.display());
            }
            _ => {}
        }
    }

    let summary = output.join("summary.json");
    report.save_json(&summary)?;
    eprintln!("Summary saved to: {}", summary.display());

    Ok(())
}

fn parse_formats(format: &str) -> Result<Vec<&'static str>> {
    if format == "all" {
        return Ok(FORMATS.to_vec());
    }
    format
        .split(',')
        .map(|f| {
            let f = f.trim();
            FORMATS
                .iter()
                .copied()
                .find(|known| *known == f)
                .ok_or_else(|| anyhow::anyhow!("unknown format: '{f}' (expected json, xml, html or all)"))
        })
        .collect()
}

/// `<input stem>.<extension>`, so scored files line up with their inputs.
fn file_name(input: &Path, extension: &str) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "result".to_string());
    format!("{stem}.{extension}")
}

fn write_json_result(result: &AssessmentResult, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(result).context("failed to serialize result")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)
        .with_context(|| format!("failed to write result to {}", path.display()))?;
    Ok(())
}

fn print_summary(report: &ScoringReport) {
    use comfy_table::{Cell, Table};

    // Test outcomes when outcome processing ran, item scores otherwise.
    let columns: Vec<String> = match report.candidates.first() {
        Some(first) if report.test.is_some() => {
            let mut columns: Vec<String> = first.test_outcomes.keys().cloned().collect();
            if let Some(pos) = columns.iter().position(|c| c == SCORE_TOTAL) {
                let total = columns.remove(pos);
                columns.insert(0, total);
            }
            columns
        }
        Some(first) => first.item_scores.keys().cloned().collect(),
        None => Vec::new(),
    };

    let mut table = Table::new();
    let mut header = vec!["Candidate".to_string()];
    header.extend(columns.iter().cloned());
    table.set_header(header);

    for candidate in &report.candidates {
        let values = if report.test.is_some() {
            &candidate.test_outcomes
        } else {
            &candidate.item_scores
        };
        let mut row = vec![Cell::new(&candidate.candidate)];
        row.extend(
            columns
                .iter()
                .map(|c| Cell::new(values.get(c).map(String::as_str).unwrap_or("-"))),
        );
        table.add_row(row);
    }

    println!("{table}");
    println!(
        "\n{} results scored in {}ms: {} error(s), {} warning(s)",
        report.candidates.len(),
        report.duration_ms,
        report.diagnostic_count(LogLevel::Error),
        report.diagnostic_count(LogLevel::Warn)
    );
}
