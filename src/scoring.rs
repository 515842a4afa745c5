//! Weighted overall score, letter grades and improvement potential.

use crate::normalize::round_to;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The quality metrics that feed the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    CommitFrequency,
    IssueResolution,
    PrRejection,
    TestRatio,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::CommitFrequency,
        MetricKind::IssueResolution,
        MetricKind::PrRejection,
        MetricKind::TestRatio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::CommitFrequency => "commit_frequency",
            MetricKind::IssueResolution => "issue_resolution",
            MetricKind::PrRejection => "pr_rejection",
            MetricKind::TestRatio => "test_ratio",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| format!("unknown metric '{}'", s.trim()))
    }
}

/// Per-metric weights. Every metric always carries a weight, possibly zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub commit_frequency: f64,
    pub issue_resolution: f64,
    pub pr_rejection: f64,
    pub test_ratio: f64,
}

impl Weights {
    pub const DEFAULT: Weights = Weights {
        commit_frequency: 0.25,
        issue_resolution: 0.25,
        pr_rejection: 0.25,
        test_ratio: 0.25,
    };

    pub fn get(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::CommitFrequency => self.commit_frequency,
            MetricKind::IssueResolution => self.issue_resolution,
            MetricKind::PrRejection => self.pr_rejection,
            MetricKind::TestRatio => self.test_ratio,
        }
    }

    fn with(mut self, kind: MetricKind, weight: f64) -> Self {
        match kind {
            MetricKind::CommitFrequency => self.commit_frequency = weight,
            MetricKind::IssueResolution => self.issue_resolution = weight,
            MetricKind::PrRejection => self.pr_rejection = weight,
            MetricKind::TestRatio => self.test_ratio = weight,
        }
        self
    }

}

impl Default for Weights {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Renormalises custom weights so they sum to 1.0.
///
/// Metrics missing from `custom` weigh zero. An empty mapping, or one whose
/// weights sum to zero, yields [`Weights::DEFAULT`].
pub fn adjust_weights(custom: &BTreeMap<MetricKind, f64>) -> Weights {
    let total: f64 = custom.values().sum();
    if custom.is_empty() || total == 0.0 {
        return Weights::DEFAULT;
    }

    let zero = Weights {
        commit_frequency: 0.0,
        issue_resolution: 0.0,
        pr_rejection: 0.0,
        test_ratio: 0.0,
    };
    custom
        .iter()
        .fold(zero, |weights, (kind, weight)| weights.with(*kind, weight / total))
}

/// Combines per-metric scores into one 0-100 score.
///
/// Only metrics present in `scores` contribute. The weighted mean is scaled by
/// the total weight when that total is below 1, and never amplified above it.
pub fn weighted_score(scores: &BTreeMap<MetricKind, f64>, weights: &Weights) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }

    let (weighted_sum, total_weight) =
        scores
            .iter()
            .fold((0.0, 0.0), |(sum, total), (kind, score)| {
                let weight = weights.get(*kind);
                (sum + score * weight, total + weight)
            });

    if total_weight == 0.0 {
        return 0.0;
    }

    weighted_sum / total_weight * total_weight.min(1.0)
}

/// Letter grades, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C-")]
    CMinus,
    #[serde(rename = "D+")]
    DPlus,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "D-")]
    DMinus,
    #[serde(rename = "F")]
    F,
}

/// Minimum score for each grade, scanned top-down.
pub const GRADE_THRESHOLDS: [(f64, Grade); 13] = [
    (95.0, Grade::APlus),
    (90.0, Grade::A),
    (85.0, Grade::AMinus),
    (80.0, Grade::BPlus),
    (75.0, Grade::B),
    (70.0, Grade::BMinus),
    (65.0, Grade::CPlus),
    (60.0, Grade::C),
    (55.0, Grade::CMinus),
    (50.0, Grade::DPlus),
    (45.0, Grade::D),
    (40.0, Grade::DMinus),
    (0.0, Grade::F),
];

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::AMinus => "A-",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::BMinus => "B-",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::CMinus => "C-",
            Grade::DPlus => "D+",
            Grade::D => "D",
            Grade::DMinus => "D-",
            Grade::F => "F",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Grade::APlus => "Excellent - an exemplary project",
            Grade::A => "Very good - meets high quality standards",
            Grade::AMinus => "Good - above typical quality standards",
            Grade::BPlus => "Above average - a solid project",
            Grade::B => "Average - acceptable quality",
            Grade::BMinus => "Below average - some areas need improvement",
            Grade::CPlus => "Weak - significant improvements needed",
            Grade::C => "Poor - serious quality problems",
            Grade::CMinus => "Bad - needs urgent attention",
            Grade::DPlus => "Very bad - critical problems present",
            Grade::D => "Dangerous - the project is at risk",
            Grade::DMinus => "Critical - immediate action required",
            Grade::F => "Failing - does not meet basic quality criteria",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Letter grade for a 0-100 score: the first threshold, scanned from the top,
/// that the score meets. Anything below every threshold is an F.
pub fn get_grade(score: f64) -> Grade {
    GRADE_THRESHOLDS
        .iter()
        .find(|(threshold, _)| score >= *threshold)
        .map(|(_, grade)| *grade)
        .unwrap_or(Grade::F)
}

/// One-line explanation of a grade, shown next to it in reports.
pub fn get_grade_description(grade: Grade) -> &'static str {
    grade.description()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        })
    }
}

/// How much the overall score could gain by maximising one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Improvement {
    pub metric: MetricKind,
    pub current_score: f64,
    pub potential_gain: f64,
    pub priority: Priority,
    pub recommendation: String,
}

/// Ranks metrics by potential gain `(100 - score) * weight`, largest first.
pub fn calculate_improvement_potential(
    scores: &BTreeMap<MetricKind, f64>,
    weights: &Weights,
) -> Vec<Improvement> {
    let mut improvements: Vec<Improvement> = scores
        .iter()
        .map(|(kind, score)| {
            let impact = (100.0 - score) * weights.get(*kind);
            Improvement {
                metric: *kind,
                current_score: *score,
                potential_gain: round_to(impact, 2),
                priority: priority_for(impact),
                recommendation: recommendation(*kind, *score).to_string(),
            }
        })
        .collect();

    improvements.sort_by(|a, b| b.potential_gain.total_cmp(&a.potential_gain));
    improvements
}

fn priority_for(impact: f64) -> Priority {
    if impact > 15.0 {
        Priority::High
    } else if impact > 8.0 {
        Priority::Medium
    } else {
        Priority::Low
    }
}

fn recommendation(kind: MetricKind, score: f64) -> &'static str {
    let [low, medium, high] = match kind {
        MetricKind::CommitFrequency => [
            "Commit more often. Prefer small, atomic commits.",
            "Commit frequency is acceptable. Keep development steady.",
            "Excellent commit frequency! Keep up the pace.",
        ],
        MetricKind::IssueResolution => [
            "Resolve issues faster. Triage and prioritise the backlog.",
            "Issue resolution time is acceptable. Consider defining an SLA.",
            "Great issue management! Issues get fast responses.",
        ],
        MetricKind::PrRejection => [
            "Raise pull request quality. Strengthen the code review process.",
            "Pull request quality is acceptable. Document contribution standards.",
            "High pull request quality! Code review practices are working well.",
        ],
        MetricKind::TestRatio => [
            "Increase test coverage. Add unit tests.",
            "Test ratio is acceptable. Focus tests on critical areas.",
            "Excellent test coverage! Keep practising test-driven development.",
        ],
    };

    if score < 40.0 {
        low
    } else if score < 70.0 {
        medium
    } else {
        high
    }
}
