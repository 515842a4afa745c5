//! Runs the full analysis over data fetched for one repository.

use crate::metrics::{self, OverallScore, QualityMetrics};
use crate::records::{
    file_path_from_json, CommitRecord, ContributorRecord, IssueRecord, PullRequestRecord,
    RepositoryInfo,
};
use crate::scoring::{self, Improvement, Weights};
use crate::trends::{self, CommitTrend, HealthIndicator, IssueTrend, WeeklyCommits};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("analysis was not successful: {0}")]
    Unsuccessful(String),
    #[error("repository metadata is missing")]
    MissingRepository,
}

/// Everything fetched for a repository, already in canonical form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepositoryData {
    pub repository: Option<RepositoryInfo>,
    pub commits: Vec<CommitRecord>,
    pub issues: Vec<IssueRecord>,
    pub pull_requests: Vec<PullRequestRecord>,
    pub files: Vec<String>,
    pub languages: BTreeMap<String, u64>,
    pub contributors: Vec<ContributorRecord>,
    /// Set when the fetch failed as a whole.
    pub error: Option<String>,
    /// Collections that could not be fetched; the analysis still runs.
    pub warnings: Vec<String>,
}

impl RepositoryData {
    pub fn is_valid(&self) -> bool {
        self.error.is_none() && self.repository.is_some()
    }
}

/// A raw snapshot as produced by the GitHub REST API, before adaptation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawRepositoryPayload {
    pub repository: Option<Value>,
    pub commits: Vec<Value>,
    pub issues: Vec<Value>,
    pub pull_requests: Vec<Value>,
    pub files: Vec<Value>,
    pub languages: BTreeMap<String, u64>,
    pub contributors: Vec<Value>,
    pub error: Option<String>,
}

impl RawRepositoryPayload {
    /// Adapts every record to its canonical shape. `fallback_name` names the
    /// repository when the metadata lacks one.
    pub fn into_repository_data(self, fallback_name: &str) -> RepositoryData {
        RepositoryData {
            repository: self
                .repository
                .as_ref()
                .map(|info| RepositoryInfo::from_json(info, fallback_name)),
            commits: self.commits.iter().map(CommitRecord::from_json).collect(),
            issues: self
                .issues
                .iter()
                .filter(|issue| issue.get("pull_request").is_none())
                .map(IssueRecord::from_json)
                .collect(),
            pull_requests: self
                .pull_requests
                .iter()
                .map(PullRequestRecord::from_json)
                .collect(),
            files: self.files.iter().filter_map(file_path_from_json).collect(),
            languages: self.languages,
            contributors: self
                .contributors
                .iter()
                .map(ContributorRecord::from_json)
                .collect(),
            error: self.error,
            warnings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisOptions {
    pub weights: Weights,
    pub moving_average_window: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            weights: Weights::DEFAULT,
            moving_average_window: trends::DEFAULT_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub total_commits: usize,
    pub total_issues: usize,
    pub total_prs: usize,
    pub total_files: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trends {
    pub commit_trend: CommitTrend,
    pub issue_trend: IssueTrend,
}

/// The result handed to report and dashboard consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub repository: RepositoryInfo,
    pub languages: BTreeMap<String, u64>,
    /// Contributors, most contributions first.
    pub contributors: Vec<ContributorRecord>,
    pub stats: CollectionStats,
    pub metrics: QualityMetrics,
    pub trends: Trends,
    pub weekly_commits: Vec<WeeklyCommits>,
    pub health: HealthIndicator,
    pub overall: OverallScore,
    pub improvements: Vec<Improvement>,
    pub warnings: Vec<String>,
}

/// Computes metrics, trends and the overall score.
///
/// Fails if the fetch reported an error or no repository metadata is present.
pub fn analyze(
    data: &RepositoryData,
    options: &AnalysisOptions,
) -> Result<AnalysisReport, AnalysisError> {
    if let Some(error) = &data.error {
        return Err(AnalysisError::Unsuccessful(error.clone()));
    }
    let repository = data
        .repository
        .clone()
        .ok_or(AnalysisError::MissingRepository)?;

    let metrics = QualityMetrics::compute(
        &data.commits,
        &data.issues,
        &data.pull_requests,
        &data.files,
    );
    let summary = trends::compute_weekly_summary(
        &data.commits,
        &data.issues,
        options.moving_average_window,
    );
    let overall = metrics::compute_overall_score(&metrics, &options.weights);
    let improvements =
        scoring::calculate_improvement_potential(&metrics.scores(), &options.weights);

    let skipped = metrics.commit_frequency.skipped_timestamps
        + metrics.issue_resolution.skipped_timestamps;
    if skipped > 0 {
        tracing::warn!(
            repository = %repository.full_name,
            skipped,
            "Excluded records with missing or unreadable timestamps"
        );
    }

    let mut contributors = data.contributors.clone();
    contributors.sort_by(|a, b| {
        b.contributions
            .cmp(&a.contributions)
            .then_with(|| a.login.cmp(&b.login))
    });

    tracing::debug!(
        repository = %repository.full_name,
        overall_score = overall.overall_score,
        grade = %overall.grade,
        health = ?summary.overall_health.status,
        "Computed repository analysis"
    );

    Ok(AnalysisReport {
        repository,
        languages: data.languages.clone(),
        contributors,
        stats: CollectionStats {
            total_commits: data.commits.len(),
            total_issues: data.issues.len(),
            total_prs: data.pull_requests.len(),
            total_files: data.files.len(),
        },
        metrics,
        trends: Trends {
            commit_trend: summary.commit_trend,
            issue_trend: summary.issue_trend,
        },
        weekly_commits: summary.weekly_commits,
        health: summary.overall_health,
        overall,
        improvements,
        warnings: data.warnings.clone(),
    })
}
