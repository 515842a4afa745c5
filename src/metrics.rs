//! Repository quality metrics.
//!
//! Each computer turns a collection of canonical records into a raw measure
//! and a 0-100 score. Empty or unusable input never fails: it produces a
//! well-formed result with conservative defaults.

use crate::normalize::{round_to, ScoreRange};
use crate::records::{CommitRecord, IssueRecord, PullRequestRecord};
use crate::scoring::{self, Grade, MetricKind, Weights};
use crate::timestamp::{self, parse_timestamp};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Commits per day; 5 or more per day scores 100.
pub const COMMIT_FREQUENCY_RANGE: ScoreRange = ScoreRange::new(0.0, 5.0);
/// Average days to close an issue; 0 scores 100, 30 or more scores 0.
pub const ISSUE_RESOLUTION_RANGE: ScoreRange = ScoreRange::new(0.0, 30.0).inverted();
/// Share of closed pull requests that were not merged; 50% or more scores 0.
pub const PR_REJECTION_RANGE: ScoreRange = ScoreRange::new(0.0, 0.5).inverted();
/// Share of code files that are tests; 30% or more scores 100.
pub const TEST_RATIO_RANGE: ScoreRange = ScoreRange::new(0.0, 0.3);

const MILLIS_PER_DAY: f64 = 86_400_000.0;

const CODE_EXTENSIONS: &[&str] = &[
    ".py", ".js", ".ts", ".jsx", ".tsx", ".java", ".kt", ".go", ".rb", ".rs", ".c", ".cpp", ".h",
    ".hpp", ".cs", ".php", ".swift", ".scala", ".clj", ".ex", ".exs", ".vue", ".svelte",
];

static TEST_FILE: Lazy<Regex> = Lazy::new(|| {
    let patterns = [
        r"(^|/)test_[^/]*\.py$",
        r"_test\.py$",
        r"_spec\.py$",
        r"\.test\.[jt]sx?$",
        r"\.spec\.[jt]sx?$",
        r"(^|/)tests?/",
        r"(^|/)__tests__/",
        r"Test\.(java|kt)$",
        r"_test\.go$",
        r"_test\.rb$",
        r"_spec\.rb$",
    ];
    Regex::new(&format!("(?i){}", patterns.join("|"))).expect("valid test file pattern")
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitFrequency {
    /// Commits per day, 4 decimals.
    pub raw: f64,
    pub score: f64,
    pub total_commits: usize,
    pub time_span_days: i64,
    pub skipped_timestamps: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueResolution {
    /// Average days from opening to closing, 2 decimals.
    pub raw: f64,
    pub score: f64,
    pub resolved_count: usize,
    pub total_issues: usize,
    pub skipped_timestamps: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrRejection {
    /// Rejected share of closed pull requests, 4 decimals.
    pub raw: f64,
    pub score: f64,
    pub rejected: usize,
    pub merged: usize,
    pub open: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRatio {
    /// Test files over code files, 4 decimals.
    pub raw: f64,
    pub score: f64,
    pub test_files: usize,
    pub total_files: usize,
}

/// The four metric results for one repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub commit_frequency: CommitFrequency,
    pub issue_resolution: IssueResolution,
    pub pr_rejection: PrRejection,
    pub test_ratio: TestRatio,
}

impl QualityMetrics {
    /// Runs all four metric computers over one repository's records.
    pub fn compute(
        commits: &[CommitRecord],
        issues: &[IssueRecord],
        pull_requests: &[PullRequestRecord],
        files: &[String],
    ) -> Self {
        Self {
            commit_frequency: compute_commit_frequency(commits),
            issue_resolution: compute_issue_resolution(issues),
            pr_rejection: compute_pr_rejection(pull_requests),
            test_ratio: compute_test_ratio(files),
        }
    }

    /// Per-metric scores, keyed for weighting.
    pub fn scores(&self) -> BTreeMap<MetricKind, f64> {
        BTreeMap::from([
            (MetricKind::CommitFrequency, self.commit_frequency.score),
            (MetricKind::IssueResolution, self.issue_resolution.score),
            (MetricKind::PrRejection, self.pr_rejection.score),
            (MetricKind::TestRatio, self.test_ratio.score),
        ])
    }
}

/// Average number of commits per day over the span of the commit history.
pub fn compute_commit_frequency(commits: &[CommitRecord]) -> CommitFrequency {
    if commits.is_empty() {
        return CommitFrequency {
            raw: 0.0,
            score: 0.0,
            total_commits: 0,
            time_span_days: 0,
            skipped_timestamps: 0,
        };
    }

    let parsed = timestamp::parse_all(commits.iter().map(|c| c.authored_at.as_deref()));
    let (first, last) = match (parsed.instants.first(), parsed.instants.last()) {
        (Some(first), Some(last)) if parsed.instants.len() >= 2 => (*first, *last),
        // Too little history to measure a rate, but the repository is not idle.
        _ => {
            return CommitFrequency {
                raw: 1.0,
                score: 25.0,
                total_commits: commits.len(),
                time_span_days: 0,
                skipped_timestamps: parsed.skipped,
            }
        }
    };

    let time_span_days = (last - first).num_days().max(1);
    let frequency = parsed.instants.len() as f64 / time_span_days as f64;

    CommitFrequency {
        raw: round_to(frequency, 4),
        score: COMMIT_FREQUENCY_RANGE.score(frequency),
        total_commits: commits.len(),
        time_span_days,
        skipped_timestamps: parsed.skipped,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ResolvedIssue {
    pub closed_at: DateTime<Utc>,
    pub days: f64,
}

enum Resolution {
    Resolved(ResolvedIssue),
    Unreadable,
}

/// Resolution time of a closed issue. A closed issue with a missing or
/// unparsable timestamp is unreadable. Negative durations (clock skew in the
/// source) clamp to zero.
fn resolution(issue: &IssueRecord) -> Option<Resolution> {
    if !issue.is_closed() {
        return None;
    }
    let created_at = issue.created_at.as_deref().and_then(parse_timestamp);
    let closed_at = issue.closed_at.as_deref().and_then(parse_timestamp);

    let resolution = match (created_at, closed_at) {
        (Some(created), Some(closed)) => Resolution::Resolved(ResolvedIssue {
            closed_at: closed,
            days: ((closed - created).num_milliseconds() as f64 / MILLIS_PER_DAY).max(0.0),
        }),
        _ => Resolution::Unreadable,
    };
    Some(resolution)
}

/// Resolved issues, plus the number of closed issues whose timestamps are
/// missing or could not be read.
pub(crate) fn resolved_issues(issues: &[IssueRecord]) -> (Vec<ResolvedIssue>, usize) {
    let mut resolved = Vec::new();
    let mut skipped = 0;
    for outcome in issues.iter().filter_map(resolution) {
        match outcome {
            Resolution::Resolved(issue) => resolved.push(issue),
            Resolution::Unreadable => skipped += 1,
        }
    }
    (resolved, skipped)
}

/// Average time to close an issue. No resolved issues means no signal,
/// which scores a neutral 50.
pub fn compute_issue_resolution(issues: &[IssueRecord]) -> IssueResolution {
    let (resolved, skipped) = resolved_issues(issues);

    if resolved.is_empty() {
        return IssueResolution {
            raw: 0.0,
            score: 50.0,
            resolved_count: 0,
            total_issues: issues.len(),
            skipped_timestamps: skipped,
        };
    }

    let mut days: Vec<f64> = resolved.iter().map(|issue| issue.days).collect();
    days.sort_by(f64::total_cmp);
    let average = days.iter().sum::<f64>() / days.len() as f64;

    IssueResolution {
        raw: round_to(average, 2),
        score: ISSUE_RESOLUTION_RANGE.score(average),
        resolved_count: resolved.len(),
        total_issues: issues.len(),
        skipped_timestamps: skipped,
    }
}

/// Share of closed pull requests that were closed without merging.
pub fn compute_pr_rejection(pull_requests: &[PullRequestRecord]) -> PrRejection {
    let mut merged = 0;
    let mut rejected = 0;
    let mut open = 0;

    for pr in pull_requests {
        let state = pr.state.to_ascii_lowercase();
        if state == "open" {
            open += 1;
        } else if pr.is_merged() {
            merged += 1;
        } else if state == "closed" {
            rejected += 1;
        }
    }

    let total_closed = merged + rejected;
    if total_closed == 0 {
        return PrRejection {
            raw: 0.0,
            score: 50.0,
            rejected: 0,
            merged: 0,
            open,
            total: pull_requests.len(),
        };
    }

    let rate = rejected as f64 / total_closed as f64;

    PrRejection {
        raw: round_to(rate, 4),
        score: PR_REJECTION_RANGE.score(rate),
        rejected,
        merged,
        open,
        total: pull_requests.len(),
    }
}

/// Whether the path has a source code extension (case-insensitive).
pub fn is_code_file(path: &str) -> bool {
    let lower = path.to_lowercase();
    CODE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

pub fn is_test_file(path: &str) -> bool {
    TEST_FILE.is_match(path)
}

/// Share of source files that are tests. Non-code files are ignored; a
/// repository without code files scores 0.
pub fn compute_test_ratio<S: AsRef<str>>(files: &[S]) -> TestRatio {
    let (test_files, total_files) = files
        .iter()
        .map(AsRef::as_ref)
        .filter(|path| !path.is_empty() && is_code_file(path))
        .fold((0, 0), |(tests, total), path| {
            (tests + usize::from(is_test_file(path)), total + 1)
        });

    if total_files == 0 {
        return TestRatio {
            raw: 0.0,
            score: 0.0,
            test_files: 0,
            total_files: 0,
        };
    }

    let ratio = test_files as f64 / total_files as f64;

    TestRatio {
        raw: round_to(ratio, 4),
        score: TEST_RATIO_RANGE.score(ratio),
        test_files,
        total_files,
    }
}

/// Overall quality score with its grade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallScore {
    pub overall_score: f64,
    pub breakdown: BTreeMap<MetricKind, f64>,
    pub grade: Grade,
    pub grade_description: String,
    pub metrics_count: usize,
}

pub fn compute_overall_score(metrics: &QualityMetrics, weights: &Weights) -> OverallScore {
    let breakdown = metrics.scores();
    let overall = scoring::weighted_score(&breakdown, weights);
    let grade = scoring::get_grade(overall);

    OverallScore {
        overall_score: round_to(overall, 2),
        metrics_count: breakdown.len(),
        breakdown,
        grade,
        grade_description: scoring::get_grade_description(grade).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(date: &str) -> CommitRecord {
        CommitRecord::new(date)
    }

    fn issue(state: &str, created_at: Option<&str>, closed_at: Option<&str>) -> IssueRecord {
        IssueRecord {
            state: state.to_string(),
            created_at: created_at.map(str::to_string),
            closed_at: closed_at.map(str::to_string),
        }
    }

    fn pr(state: &str, merged: bool, merged_at: Option<&str>) -> PullRequestRecord {
        PullRequestRecord {
            state: state.to_string(),
            merged,
            merged_at: merged_at.map(str::to_string),
        }
    }

    #[test]
    fn commit_frequency_empty() {
        let result = compute_commit_frequency(&[]);
        assert_eq!(result.raw, 0.0);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.total_commits, 0);
    }

    #[test]
    fn commit_frequency_single_commit_falls_back() {
        let result = compute_commit_frequency(&[commit("2024-01-01T10:00:00Z")]);
        assert_eq!(result.raw, 1.0);
        assert_eq!(result.score, 25.0);
        assert_eq!(result.total_commits, 1);
    }

    #[test]
    fn commit_frequency_over_ten_days() {
        let mut commits = vec![commit("2024-01-01T00:00:00Z"), commit("2024-01-11T00:00:00Z")];
        commits.extend((0..23).map(|i| commit(&format!("2024-01-05T{:02}:00:00Z", i))));

        let result = compute_commit_frequency(&commits);
        assert_eq!(result.time_span_days, 10);
        assert_eq!(result.raw, 2.5);
        assert_eq!(result.score, 50.0);
        assert_eq!(result.total_commits, 25);
    }

    #[test]
    fn commit_frequency_same_day_counts_as_one_day() {
        let commits = vec![commit("2024-01-01T09:00:00Z"), commit("2024-01-01T17:00:00Z")];
        let result = compute_commit_frequency(&commits);
        assert_eq!(result.time_span_days, 1);
        assert_eq!(result.raw, 2.0);
        assert_eq!(result.score, 40.0);
    }

    #[test]
    fn commit_frequency_skips_unreadable_dates() {
        let commits = vec![
            commit("2024-01-01"),
            commit("garbage"),
            CommitRecord::default(),
            commit("2024-01-03"),
        ];
        let result = compute_commit_frequency(&commits);
        assert_eq!(result.total_commits, 4);
        assert_eq!(result.skipped_timestamps, 2);
        assert_eq!(result.time_span_days, 2);
        assert_eq!(result.raw, 1.0);
    }

    #[test]
    fn issue_resolution_two_days() {
        let issues = vec![issue(
            "closed",
            Some("2024-01-01T00:00:00Z"),
            Some("2024-01-03T00:00:00Z"),
        )];
        let result = compute_issue_resolution(&issues);
        assert!((result.raw - 2.0).abs() < 1e-9);
        assert_eq!(result.score, 93.33);
        assert_eq!(result.resolved_count, 1);
        assert_eq!(result.total_issues, 1);
    }

    #[test]
    fn issue_resolution_without_resolved_issues_is_neutral() {
        assert_eq!(compute_issue_resolution(&[]).score, 50.0);

        let open_only = vec![
            issue("open", Some("2024-01-01T00:00:00Z"), None),
            issue("closed", Some("2024-01-01T00:00:00Z"), None),
        ];
        let result = compute_issue_resolution(&open_only);
        assert_eq!(result.score, 50.0);
        assert_eq!(result.raw, 0.0);
        assert_eq!(result.resolved_count, 0);
        assert_eq!(result.total_issues, 2);
        assert_eq!(result.skipped_timestamps, 1);
    }

    #[test]
    fn issue_resolution_counts_missing_and_unparsable_timestamps() {
        let issues = vec![
            issue("closed", Some("2024-01-01T00:00:00Z"), None),
            issue("closed", Some("2024-01-01T00:00:00Z"), Some("garbage")),
            issue("closed", None, Some("2024-01-02T00:00:00Z")),
            issue("open", None, None),
        ];
        let result = compute_issue_resolution(&issues);
        assert_eq!(result.skipped_timestamps, 3);
        assert_eq!(result.resolved_count, 0);
        assert_eq!(result.score, 50.0);

        let trend = crate::trends::compute_issue_trend(&issues, 7);
        assert_eq!(trend.skipped_timestamps, 3);
        assert!(trend.resolution_series.is_empty());
    }

    #[test]
    fn issue_resolution_clamps_negative_durations() {
        let issues = vec![issue(
            "CLOSED",
            Some("2024-01-05T00:00:00Z"),
            Some("2024-01-03T00:00:00Z"),
        )];
        let result = compute_issue_resolution(&issues);
        assert_eq!(result.raw, 0.0);
        assert_eq!(result.score, 100.0);
    }

    #[test]
    fn issue_resolution_counts_unreadable_timestamps() {
        let issues = vec![
            issue("closed", Some("2024-01-01"), Some("someday")),
            issue("closed", Some("2024-01-01"), Some("2024-01-31")),
        ];
        let result = compute_issue_resolution(&issues);
        assert_eq!(result.resolved_count, 1);
        assert_eq!(result.skipped_timestamps, 1);
        assert_eq!(result.raw, 30.0);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn pr_rejection_half_rejected() {
        let prs = vec![pr("closed", true, None), pr("closed", false, None)];
        let result = compute_pr_rejection(&prs);
        assert_eq!(result.raw, 0.5);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.merged, 1);
        assert_eq!(result.rejected, 1);
    }

    #[test]
    fn pr_rejection_classifies_states() {
        let prs = vec![
            pr("closed", false, Some("2024-01-02T10:00:00Z")),
            pr("closed", false, None),
            pr("closed", false, Some("2024-01-05T10:00:00Z")),
            pr("open", false, None),
            pr("closed", false, Some("2024-01-06T10:00:00Z")),
        ];
        let result = compute_pr_rejection(&prs);
        assert_eq!(result.merged, 3);
        assert_eq!(result.rejected, 1);
        assert_eq!(result.open, 1);
        assert_eq!(result.total, 5);
        assert_eq!(result.raw, 0.25);
        assert_eq!(result.score, 50.0);
    }

    #[test]
    fn pr_rejection_without_closed_prs_is_neutral() {
        let result = compute_pr_rejection(&[pr("open", false, None)]);
        assert_eq!(result.score, 50.0);
        assert_eq!(result.open, 1);
        assert_eq!(result.total, 1);

        assert_eq!(compute_pr_rejection(&[]).score, 50.0);
    }

    #[test]
    fn test_ratio_counts_code_files_only() {
        let result = compute_test_ratio(&["src/a.py", "tests/test_a.py", "logo.png", "README.md"]);
        assert_eq!(result.total_files, 2);
        assert_eq!(result.test_files, 1);
        assert_eq!(result.raw, 0.5);
        assert_eq!(result.score, 100.0);
    }

    #[test]
    fn test_ratio_without_code_is_zero() {
        let result = compute_test_ratio(&["docs/index.md", "assets/logo.png"]);
        assert_eq!(result.raw, 0.0);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.total_files, 0);

        let empty: [&str; 0] = [];
        assert_eq!(compute_test_ratio(&empty).score, 0.0);
    }

    #[test]
    fn recognises_test_file_conventions() {
        for path in [
            "test_main.py",
            "pkg/test_utils.py",
            "pkg/utils_test.py",
            "pkg/utils_spec.py",
            "web/App.test.tsx",
            "web/app.spec.js",
            "test/helpers.c",
            "crate/tests/integration.rs",
            "src/__tests__/button.jsx",
            "src/main/UserServiceTest.java",
            "app/ViewModelTest.kt",
            "server/handler_test.go",
            "lib/parser_test.rb",
            "spec/models/user_spec.rb",
            "TESTS/Upper.py",
        ] {
            assert!(is_test_file(path), "{path} should be a test file");
        }

        for path in [
            "src/main.py",
            "src/contest_entry.py",
            "latest/build.rs",
            "src/testing.rs",
            "web/attest.ts",
        ] {
            assert!(!is_test_file(path), "{path} should not be a test file");
        }
    }

    #[test]
    fn overall_score_uses_weights_and_grade() {
        let metrics = QualityMetrics {
            commit_frequency: compute_commit_frequency(&[]),
            issue_resolution: compute_issue_resolution(&[]),
            pr_rejection: compute_pr_rejection(&[]),
            test_ratio: compute_test_ratio(&["tests/test_a.py"]),
        };

        let overall = compute_overall_score(&metrics, &Weights::DEFAULT);
        // 0, 50, 50 and 100 with equal weights.
        assert_eq!(overall.overall_score, 50.0);
        assert_eq!(overall.grade, Grade::DPlus);
        assert_eq!(overall.metrics_count, 4);
        assert_eq!(overall.breakdown[&MetricKind::TestRatio], 100.0);
    }
}
