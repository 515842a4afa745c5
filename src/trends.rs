//! Trend detection over commit activity and issue resolution times.
//!
//! Commits are bucketed into a gap-free daily series; resolved issues form a
//! series ordered by closing date. Both are smoothed with a moving average and
//! fitted with an ordinary least squares line whose slope and R² classify the
//! trend.

use crate::metrics::resolved_issues;
use crate::normalize::round_to;
use crate::records::{CommitRecord, IssueRecord};
use crate::timestamp;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Default moving-average window, in data points.
pub const DEFAULT_WINDOW: usize = 7;

/// Slopes within ±0.01 per step count as flat.
pub const SLOPE_THRESHOLD: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovingAveragePoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Least squares fit of `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Rising,
    Falling,
    Flat,
}

impl TrendDirection {
    pub fn from_slope(slope: f64) -> Self {
        if slope > SLOPE_THRESHOLD {
            TrendDirection::Rising
        } else if slope < -SLOPE_THRESHOLD {
            TrendDirection::Falling
        } else {
            TrendDirection::Flat
        }
    }
}

/// Direction of resolution times, where a falling value is good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueTrendDirection {
    Improving,
    Worsening,
    Flat,
}

impl IssueTrendDirection {
    pub fn from_slope(slope: f64) -> Self {
        if slope < -SLOPE_THRESHOLD {
            IssueTrendDirection::Improving
        } else if slope > SLOPE_THRESHOLD {
            IssueTrendDirection::Worsening
        } else {
            IssueTrendDirection::Flat
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendStrength {
    Strong,
    Moderate,
    Weak,
    Inconclusive,
}

impl TrendStrength {
    pub fn from_r_squared(r_squared: f64) -> Self {
        if r_squared >= 0.7 {
            TrendStrength::Strong
        } else if r_squared >= 0.4 {
            TrendStrength::Moderate
        } else if r_squared >= 0.2 {
            TrendStrength::Weak
        } else {
            TrendStrength::Inconclusive
        }
    }
}

impl fmt::Display for TrendStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrendStrength::Strong => "strong",
            TrendStrength::Moderate => "moderate",
            TrendStrength::Weak => "weak",
            TrendStrength::Inconclusive => "inconclusive",
        })
    }
}

/// Moving average with a growing prefix.
///
/// The first `window - 1` points average everything seen so far; after that
/// each point is the mean of the last `window` values. Series shorter than
/// the window use the cumulative average throughout.
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if values.is_empty() || window == 0 {
        return Vec::new();
    }

    let mut averages = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, value) in values.iter().enumerate() {
        sum += value;
        if i >= window {
            sum -= values[i - window];
        }
        let span = (i + 1).min(window);
        averages.push(sum / span as f64);
    }
    averages
}

/// Ordinary least squares over paired samples.
///
/// Fewer than two points yields a zero fit. A constant `x` gives a flat line
/// through the mean; a constant `y` is a perfect fit. Slope is rounded to 6
/// decimals, intercept and R² to 4.
pub fn linear_regression(xs: &[f64], ys: &[f64]) -> Regression {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return Regression::default();
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);

    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let (ss_xx, ss_yy, ss_xy) = xs.iter().zip(ys).fold(
        (0.0, 0.0, 0.0),
        |(ss_xx, ss_yy, ss_xy), (x, y)| {
            let (dx, dy) = (x - mean_x, y - mean_y);
            (ss_xx + dx * dx, ss_yy + dy * dy, ss_xy + dx * dy)
        },
    );

    let (slope, intercept) = if ss_xx == 0.0 {
        (0.0, mean_y)
    } else {
        let slope = ss_xy / ss_xx;
        (slope, mean_y - slope * mean_x)
    };

    let r_squared = if ss_yy == 0.0 {
        if ss_xy == 0.0 {
            1.0
        } else {
            0.0
        }
    } else if ss_xx > 0.0 {
        (ss_xy * ss_xy / (ss_xx * ss_yy)).clamp(0.0, 1.0)
    } else {
        0.0
    };

    Regression {
        slope: round_to(slope, 6),
        intercept: round_to(intercept, 4),
        r_squared: round_to(r_squared, 4),
    }
}

/// Regression of values against their position in the series.
pub fn regress_over_index(values: &[f64]) -> Regression {
    let xs: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    linear_regression(&xs, values)
}

/// Buckets instants into per-day counts covering every day from the first
/// to the last instant, silent days included as zero.
pub fn daily_counts(instants: &[DateTime<Utc>]) -> Vec<TimeSeriesPoint> {
    let mut counts: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for instant in instants {
        *counts.entry(instant.date_naive()).or_insert(0) += 1;
    }

    let (first, last) = match (counts.keys().next(), counts.keys().next_back()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Vec::new(),
    };

    first
        .iter_days()
        .take_while(|date| *date <= last)
        .map(|date| TimeSeriesPoint {
            date,
            count: counts.get(&date).copied().unwrap_or(0),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitTrend {
    pub time_series: Vec<TimeSeriesPoint>,
    pub moving_average: Vec<MovingAveragePoint>,
    pub regression: Regression,
    pub direction: TrendDirection,
    pub strength: TrendStrength,
    pub average_daily_commits: f64,
    pub total_days: usize,
    pub skipped_timestamps: usize,
    pub summary: String,
}

impl CommitTrend {
    fn inconclusive(
        time_series: Vec<TimeSeriesPoint>,
        moving_average: Vec<MovingAveragePoint>,
        skipped_timestamps: usize,
        summary: &str,
    ) -> Self {
        let average_daily_commits = if time_series.is_empty() { 0.0 } else { 1.0 };
        Self {
            total_days: time_series.len(),
            time_series,
            moving_average,
            regression: Regression::default(),
            direction: TrendDirection::Flat,
            strength: TrendStrength::Inconclusive,
            average_daily_commits,
            skipped_timestamps,
            summary: summary.to_string(),
        }
    }
}

/// Daily commit activity, its moving average and the fitted trend.
pub fn compute_commit_trend(commits: &[CommitRecord], window: usize) -> CommitTrend {
    if commits.is_empty() {
        return CommitTrend::inconclusive(Vec::new(), Vec::new(), 0, "Not enough commit data.");
    }

    let parsed = timestamp::parse_all(commits.iter().map(|c| c.authored_at.as_deref()));
    if parsed.instants.len() < 2 {
        let time_series = daily_counts(&parsed.instants);
        let moving_average = time_series
            .iter()
            .map(|point| MovingAveragePoint {
                date: point.date,
                value: 1.0,
            })
            .collect();
        return CommitTrend::inconclusive(
            time_series,
            moving_average,
            parsed.skipped,
            "Not enough data for trend analysis.",
        );
    }

    let time_series = daily_counts(&parsed.instants);
    let values: Vec<f64> = time_series.iter().map(|p| f64::from(p.count)).collect();

    let averages = moving_average(&values, window);
    let regression = regress_over_index(&values);
    let direction = TrendDirection::from_slope(regression.slope);
    let strength = TrendStrength::from_r_squared(regression.r_squared);
    let average = values.iter().sum::<f64>() / values.len() as f64;

    let movement = match direction {
        TrendDirection::Rising => "rising",
        TrendDirection::Falling => "falling",
        TrendDirection::Flat => "holding steady",
    };
    let summary = format!(
        "Average of {average:.1} commits per day. Activity is {movement} ({strength} trend). \
         (slope: {:.4}, R²: {:.2})",
        regression.slope, regression.r_squared
    );

    CommitTrend {
        moving_average: time_series
            .iter()
            .zip(&averages)
            .map(|(point, value)| MovingAveragePoint {
                date: point.date,
                value: round_to(*value, 2),
            })
            .collect(),
        total_days: time_series.len(),
        time_series,
        regression,
        direction,
        strength,
        average_daily_commits: round_to(average, 2),
        skipped_timestamps: parsed.skipped,
        summary,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolutionPoint {
    /// Day the issue was closed.
    pub date: NaiveDate,
    pub resolution_days: f64,
    pub resolution_hours: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResolutionStatistics {
    pub average_days: f64,
    pub min_days: f64,
    pub max_days: f64,
    pub total_resolved: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueTrend {
    pub resolution_series: Vec<ResolutionPoint>,
    pub moving_average: Vec<MovingAveragePoint>,
    pub regression: Regression,
    pub direction: IssueTrendDirection,
    pub strength: TrendStrength,
    pub statistics: ResolutionStatistics,
    pub skipped_timestamps: usize,
    pub summary: String,
}

/// How issue resolution times develop, ordered by closing date.
pub fn compute_issue_trend(issues: &[IssueRecord], window: usize) -> IssueTrend {
    let (mut resolved, skipped) = resolved_issues(issues);
    resolved.sort_by(|a, b| {
        a.closed_at
            .cmp(&b.closed_at)
            .then(a.days.total_cmp(&b.days))
    });

    let resolution_series: Vec<ResolutionPoint> = resolved
        .iter()
        .map(|issue| ResolutionPoint {
            date: issue.closed_at.date_naive(),
            resolution_days: round_to(issue.days, 2),
            resolution_hours: round_to(issue.days * 24.0, 1),
        })
        .collect();
    let values: Vec<f64> = resolved.iter().map(|issue| issue.days).collect();
    let statistics = resolution_statistics(&values);

    if resolved.len() < 2 {
        let summary = if issues.is_empty() {
            "Not enough issue data."
        } else {
            "Not enough resolved issues for trend analysis."
        };
        return IssueTrend {
            resolution_series,
            moving_average: Vec::new(),
            regression: Regression::default(),
            direction: IssueTrendDirection::Flat,
            strength: TrendStrength::Inconclusive,
            statistics,
            skipped_timestamps: skipped,
            summary: summary.to_string(),
        };
    }

    let averages = moving_average(&values, window.min(values.len()));
    let regression = regress_over_index(&values);
    let direction = IssueTrendDirection::from_slope(regression.slope);
    let strength = TrendStrength::from_r_squared(regression.r_squared);

    let movement = match direction {
        IssueTrendDirection::Improving => "shrinking (improving)",
        IssueTrendDirection::Worsening => "growing (worsening)",
        IssueTrendDirection::Flat => "holding steady",
    };
    let summary = format!(
        "Average resolution time: {:.1} days. Resolution times are {movement} ({strength} trend). \
         (min: {:.1}, max: {:.1} days)",
        statistics.average_days, statistics.min_days, statistics.max_days
    );

    IssueTrend {
        moving_average: resolution_series
            .iter()
            .zip(&averages)
            .map(|(point, value)| MovingAveragePoint {
                date: point.date,
                value: round_to(*value, 2),
            })
            .collect(),
        resolution_series,
        regression,
        direction,
        strength,
        statistics,
        skipped_timestamps: skipped,
        summary,
    }
}

fn resolution_statistics(days: &[f64]) -> ResolutionStatistics {
    if days.is_empty() {
        return ResolutionStatistics::default();
    }

    let min = days.iter().copied().fold(f64::INFINITY, f64::min);
    let max = days.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let average = days.iter().sum::<f64>() / days.len() as f64;

    ResolutionStatistics {
        average_days: round_to(average, 2),
        min_days: round_to(min, 2),
        max_days: round_to(max, 2),
        total_resolved: days.len(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyCommits {
    /// ISO week, e.g. `2024-W03`.
    pub week: String,
    pub commits: u32,
}

/// Sums a daily series into ISO weeks, oldest first.
pub fn weekly_commits(series: &[TimeSeriesPoint]) -> Vec<WeeklyCommits> {
    let mut weeks: BTreeMap<(i32, u32), u32> = BTreeMap::new();
    for point in series {
        let week = point.date.iso_week();
        *weeks.entry((week.year(), week.week())).or_insert(0) += point.count;
    }

    weeks
        .into_iter()
        .map(|((year, week), commits)| WeeklyCommits {
            week: format!("{year}-W{week:02}"),
            commits,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Stable,
    Caution,
    Critical,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Stable => "stable",
            HealthStatus::Caution => "caution",
            HealthStatus::Critical => "critical",
        })
    }
}

impl HealthStatus {
    pub fn from_score(score: i32) -> Self {
        match score {
            s if s >= 70 => HealthStatus::Healthy,
            s if s >= 50 => HealthStatus::Stable,
            s if s >= 30 => HealthStatus::Caution,
            _ => HealthStatus::Critical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthFactors {
    pub commit_trend: TrendDirection,
    pub issue_trend: IssueTrendDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthIndicator {
    pub score: i32,
    pub status: HealthStatus,
    pub factors: HealthFactors,
}

/// Project health from the combined commit and issue trends.
pub fn health_indicator(commit_trend: &CommitTrend, issue_trend: &IssueTrend) -> HealthIndicator {
    let mut score = 50;

    score += match commit_trend.direction {
        TrendDirection::Rising => 15,
        TrendDirection::Falling => -10,
        TrendDirection::Flat => 0,
    };
    score += match issue_trend.direction {
        IssueTrendDirection::Improving => 15,
        IssueTrendDirection::Worsening => -15,
        IssueTrendDirection::Flat => 0,
    };

    if commit_trend.direction == TrendDirection::Rising
        && commit_trend.strength == TrendStrength::Strong
    {
        score += 10;
    }
    if issue_trend.direction == IssueTrendDirection::Improving
        && issue_trend.strength == TrendStrength::Strong
    {
        score += 10;
    }

    let score = score.clamp(0, 100);
    HealthIndicator {
        score,
        status: HealthStatus::from_score(score),
        factors: HealthFactors {
            commit_trend: commit_trend.direction,
            issue_trend: issue_trend.direction,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub commit_trend: CommitTrend,
    pub issue_trend: IssueTrend,
    pub weekly_commits: Vec<WeeklyCommits>,
    pub overall_health: HealthIndicator,
}

pub fn compute_weekly_summary(
    commits: &[CommitRecord],
    issues: &[IssueRecord],
    window: usize,
) -> WeeklySummary {
    let commit_trend = compute_commit_trend(commits, window);
    let issue_trend = compute_issue_trend(issues, window);

    WeeklySummary {
        weekly_commits: weekly_commits(&commit_trend.time_series),
        overall_health: health_indicator(&commit_trend, &issue_trend),
        commit_trend,
        issue_trend,
    }
}
