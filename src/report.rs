//! Markdown rendering of an analysis report.

use crate::analysis::AnalysisReport;
use crate::scoring::Priority;
use chrono::{DateTime, Utc};
use std::fmt::Write;

/// Number of improvement suggestions listed in the report.
const TOP_IMPROVEMENTS: usize = 3;

const TOP_CONTRIBUTORS: usize = 5;

/// Renders a human-readable summary of `report`, stamped with `generated_at`.
pub fn render_markdown(report: &AnalysisReport, generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut out, report, generated_at);
    out
}

fn write_report(
    out: &mut String,
    report: &AnalysisReport,
    generated_at: DateTime<Utc>,
) -> std::fmt::Result {
    let repo = &report.repository;
    let overall = &report.overall;
    let metrics = &report.metrics;
    let stats = &report.stats;

    writeln!(out, "# {} Analysis Report", repo.full_name)?;
    writeln!(out)?;
    writeln!(out, "## Overview")?;
    writeln!(out, "- **Quality score:** {}/100", overall.overall_score)?;
    writeln!(out, "- **Grade:** {} ({})", overall.grade, overall.grade_description)?;
    writeln!(out, "- **Language:** {}", repo.language)?;
    writeln!(out, "- **Stars:** {}", repo.stars)?;
    writeln!(out, "- **Forks:** {}", repo.forks)?;
    writeln!(out)?;

    writeln!(out, "## Statistics")?;
    writeln!(out, "- **Commits:** {}", stats.total_commits)?;
    writeln!(out, "- **Issues:** {}", stats.total_issues)?;
    writeln!(out, "- **Pull requests:** {}", stats.total_prs)?;
    writeln!(out, "- **Files:** {}", stats.total_files)?;
    writeln!(out)?;

    if !report.contributors.is_empty() {
        writeln!(out, "## Top Contributors")?;
        for contributor in report.contributors.iter().take(TOP_CONTRIBUTORS) {
            writeln!(
                out,
                "- [@{}]({}) ({} contributions)",
                contributor.login, contributor.url, contributor.contributions
            )?;
        }
        writeln!(out)?;
    }

    writeln!(out, "## Metrics")?;
    writeln!(out)?;
    writeln!(out, "| Metric | Score | Detail |")?;
    writeln!(out, "|--------|-------|--------|")?;
    writeln!(
        out,
        "| Commit frequency | {:.0}/100 | {:.2} commits/day |",
        metrics.commit_frequency.score, metrics.commit_frequency.raw
    )?;
    writeln!(
        out,
        "| Issue resolution | {:.0}/100 | avg. {:.1} days |",
        metrics.issue_resolution.score, metrics.issue_resolution.raw
    )?;
    writeln!(
        out,
        "| Pull request quality | {:.0}/100 | {:.1}% rejected |",
        metrics.pr_rejection.score,
        metrics.pr_rejection.raw * 100.0
    )?;
    writeln!(
        out,
        "| Test coverage | {:.0}/100 | {:.1}% test files |",
        metrics.test_ratio.score,
        metrics.test_ratio.raw * 100.0
    )?;
    writeln!(out)?;

    writeln!(out, "## Trends")?;
    writeln!(out, "- **Commits:** {}", report.trends.commit_trend.summary)?;
    writeln!(out, "- **Issues:** {}", report.trends.issue_trend.summary)?;
    writeln!(
        out,
        "- **Health:** {} ({}/100)",
        report.health.status, report.health.score
    )?;
    writeln!(out)?;

    let suggestions: Vec<_> = report
        .improvements
        .iter()
        .filter(|improvement| improvement.priority != Priority::Low)
        .take(TOP_IMPROVEMENTS)
        .collect();
    if !suggestions.is_empty() {
        writeln!(out, "## Improvements")?;
        for improvement in suggestions {
            writeln!(
                out,
                "- **{}** (+{} points, {} priority): {}",
                improvement.metric,
                improvement.potential_gain,
                improvement.priority,
                improvement.recommendation
            )?;
        }
        writeln!(out)?;
    }

    if !report.warnings.is_empty() {
        writeln!(out, "## Warnings")?;
        for warning in &report.warnings {
            writeln!(out, "- {warning}")?;
        }
        writeln!(out)?;
    }

    writeln!(out, "---")?;
    writeln!(
        out,
        "*Report generated: {}*",
        generated_at.format("%Y-%m-%d %H:%M")
    )?;

    Ok(())
}
