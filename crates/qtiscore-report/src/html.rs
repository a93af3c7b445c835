//! HTML score sheet generator.
//!
//! Produces a self-contained HTML file with all CSS/JS inlined.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;

use qtiscore_core::logging::LogLevel;
use qtiscore_core::model::parse_number;
use qtiscore_core::prepare::SCORE_TOTAL;
use qtiscore_core::report::{CandidateSummary, ScoringReport};

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Generate an HTML score sheet from a scoring report.
pub fn generate_html(report: &ScoringReport) -> String {
    let title = report.test.as_deref().unwrap_or("items");
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>qtiscore score sheet: {}</title>\n",
        html_escape(title)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    // Header
    html.push_str("<header>\n");
    html.push_str("<h1>qtiscore score sheet</h1>\n");
    html.push_str(&format!(
        "<p class=\"meta\">Test: <strong>{}</strong> | {} items | {} candidates | {}</p>\n",
        html_escape(title),
        report.item_count,
        report.candidates.len(),
        report.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    let items: BTreeSet<&str> = report
        .candidates
        .iter()
        .flat_map(|c| c.item_scores.keys().map(String::as_str))
        .collect();
    let outcomes: BTreeSet<&str> = report
        .candidates
        .iter()
        .flat_map(|c| c.test_outcomes.keys().map(String::as_str))
        .collect();

    // Scores
    html.push_str("<section class=\"scores\">\n");
    html.push_str("<h2>Scores</h2>\n");
    html.push_str("<table class=\"scores-table\" id=\"scores\">\n<thead><tr>");
    let headers = std::iter::once("Candidate")
        .chain(outcomes.iter().copied())
        .chain(items.iter().copied());
    for (col, header) in headers.enumerate() {
        html.push_str(&format!(
            "<th onclick=\"sortTable({col})\">{}</th>",
            html_escape(header)
        ));
    }
    html.push_str("</tr></thead>\n<tbody>\n");

    for candidate in &report.candidates {
        html.push_str(&format!("<tr><td>{}</td>", html_escape(&candidate.candidate)));
        for outcome in &outcomes {
            push_cell(&mut html, candidate.test_outcomes.get(*outcome));
        }
        for item in &items {
            push_cell(&mut html, candidate.item_scores.get(*item));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody></table>\n");

    if outcomes.contains(SCORE_TOTAL) {
        html.push_str(&generate_bar_chart(&report.candidates));
    }
    html.push_str("</section>\n");

    // Diagnostics
    if !report.diagnostics.is_empty() {
        html.push_str("<section class=\"diagnostics\">\n");
        html.push_str(&format!(
            "<h2>Diagnostics</h2>\n<p class=\"meta\">{} errors | {} warnings</p>\n",
            report.diagnostic_count(LogLevel::Error),
            report.diagnostic_count(LogLevel::Warn)
        ));
        html.push_str("<table>\n<thead><tr><th>Level</th><th>Candidate</th><th>Item</th><th>Message</th></tr></thead>\n<tbody>\n");
        for record in &report.diagnostics {
            html.push_str(&format!(
                "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                record.level,
                record.level,
                html_escape(record.candidate.as_deref().unwrap_or("-")),
                html_escape(record.item.as_deref().or(record.test.as_deref()).unwrap_or("-")),
                html_escape(&record.message)
            ));
        }
        html.push_str("</tbody></table>\n</section>\n");
    }

    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(&html_escape(
        &serde_json::to_string_pretty(report).unwrap_or_default(),
    ));
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");

    html.push_str("</body>\n</html>");
    html
}

fn push_cell(html: &mut String, value: Option<&String>) {
    match value {
        Some(value) => html.push_str(&format!("<td>{}</td>", html_escape(value))),
        None => html.push_str("<td class=\"missing\">-</td>"),
    }
}

/// Write an HTML score sheet to a file.
pub fn write_html_report(report: &ScoringReport, path: &Path) -> Result<()> {
    let html = generate_html(report);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)?;
    Ok(())
}

/// Horizontal bars of `SCORE_TOTAL`, scaled to the best candidate.
fn generate_bar_chart(candidates: &[CandidateSummary]) -> String {
    let bar_height = 24;
    let max_width = 400;
    let padding = 8;
    let label_width = 200;

    let totals: Vec<(&str, f64)> = candidates
        .iter()
        .map(|c| {
            let total = c
                .test_outcomes
                .get(SCORE_TOTAL)
                .and_then(|v| parse_number(v))
                .unwrap_or(0.0);
            (c.candidate.as_str(), total)
        })
        .collect();
    let best = totals.iter().map(|(_, t)| *t).fold(0.0_f64, f64::max);

    let total_height = totals.len() * (bar_height + padding) + padding;
    let mut svg = format!(
        "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        label_width + max_width + 60,
        total_height
    );

    for (i, (candidate, total)) in totals.iter().enumerate() {
        let y = i * (bar_height + padding) + padding;
        let share = if best > 0.0 { total / best } else { 0.0 };
        let width = (share.max(0.0) * max_width as f64) as usize;

        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"14\" fill=\"currentColor\" text-anchor=\"end\" dominant-baseline=\"middle\">{}</text>\n",
            label_width - 10,
            y + bar_height / 2,
            html_escape(candidate)
        ));
        svg.push_str(&format!(
            "  <rect x=\"{label_width}\" y=\"{y}\" width=\"{width}\" height=\"{bar_height}\" fill=\"#3b82f6\" rx=\"4\"/>\n"
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"12\" fill=\"currentColor\" dominant-baseline=\"middle\">{total}</text>\n",
            label_width + width + 8,
            y + bar_height / 2,
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --warn: #fef3c7; --error: #fde2e2; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --warn: #78350f; --error: #7f1d1d; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; }
th { background: var(--border); cursor: pointer; }
td.missing { color: #9ca3af; }
.warn { background: var(--warn); }
.error { background: var(--error); }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;

const JS: &str = r#"
function sortTable(col) {
  const table = document.getElementById('scores');
  const tbody = table.querySelector('tbody');
  const rows = Array.from(tbody.querySelectorAll('tr'));
  const asc = table.dataset.sortCol == col && table.dataset.sortDir == 'asc' ? false : true;
  rows.sort((a, b) => {
    const va = a.cells[col].textContent;
    const vb = b.cells[col].textContent;
    const na = parseFloat(va), nb = parseFloat(vb);
    const cmp = !isNaN(na) && !isNaN(nb) ? na - nb : va.localeCompare(vb);
    return asc ? cmp : -cmp;
  });
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? 'asc' : 'desc';
  rows.forEach(r => tbody.appendChild(r));
}
"#;
