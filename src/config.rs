//! Application configuration and environment variable parsing.
//!
//! This module handles loading configuration settings from the environment (e.g., .env file).
//! It defines the `AppConfig` struct which governs how much data is fetched from GitHub,
//! how trends are smoothed, how metrics are weighted, and which repositories stay warm
//! in the cache.

use crate::analysis::AnalysisOptions;
use crate::scoring::{adjust_weights, MetricKind, Weights};
use crate::types::RepoId;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration as StdDuration;

/// Application configuration loaded from environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// Number of past days of commit history to fetch.
    pub commit_fetch_days: i64,

    /// Hard limit on the number of paginated requests per collection and repository.
    pub max_github_api_pages: u32,

    /// Maximum number of records kept per collection (commits, issues, pull requests).
    #[serde(default = "default_max_items")]
    pub max_items_per_collection: usize,

    /// Window (in data points) of the moving averages in trend analysis. Must be at least 1.
    #[serde(default = "default_window", deserialize_with = "deserialize_window")]
    pub moving_average_window: usize,

    /// Time to live for cached repository analyses in seconds.
    pub cache_ttl_seconds: u64,

    /// Maximum number of entries to keep in the analysis cache.
    pub cache_max_capacity: u64,

    /// List of popular repositories to preload.
    /// Expected format: comma-separated string of "owner/repo" pairs.
    /// Example: "facebook/react,rust-lang/rust"
    #[serde(deserialize_with = "deserialize_popular_repos")]
    pub popular_repos: Vec<RepoId>,

    /// Maximum number of concurrent requests for refreshing popular repositories.
    /// Defaults to 10 if not specified.
    #[serde(default = "default_concurrency_limit")]
    pub popular_repos_concurrency_limit: usize,

    /// Metric weights for the overall score, renormalised to sum to 1.
    /// Expected format: "commit_frequency=2,test_ratio=1". Unlisted metrics weigh 0.
    /// Defaults to equal weights.
    #[serde(default, deserialize_with = "deserialize_score_weights")]
    pub score_weights: Weights,

    /// Optional GitHub Personal Access Token for higher rate limits.
    pub github_token: Option<String>,
}

fn default_max_items() -> usize {
    200
}

fn default_window() -> usize {
    crate::trends::DEFAULT_WINDOW
}

fn default_concurrency_limit() -> usize {
    10
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn cache_ttl(&self) -> StdDuration {
        StdDuration::from_secs(self.cache_ttl_seconds)
    }

    pub fn analysis_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            weights: self.score_weights,
            moving_average_window: self.moving_average_window,
        }
    }
}

fn deserialize_popular_repos<'de, D>(deserializer: D) -> Result<Vec<RepoId>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Ok(parse_popular_repos(&s))
}

fn parse_popular_repos(s: &str) -> Vec<RepoId> {
    s.split(',')
        .filter_map(|part| {
            let parts: Vec<&str> = part.trim().split('/').collect();
            if parts.len() == 2 && !parts[0].trim().is_empty() && !parts[1].trim().is_empty() {
                Some(RepoId::new(parts[0].trim(), parts[1].trim()))
            } else {
                None
            }
        })
        .collect()
}

fn deserialize_window<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    parse_window(&s).map_err(serde::de::Error::custom)
}

fn parse_window(s: &str) -> Result<usize, String> {
    match s.trim().parse::<usize>() {
        Ok(0) => Err("moving average window must be at least 1".to_string()),
        Ok(window) => Ok(window),
        Err(_) => Err(format!("invalid moving average window: '{}'", s.trim())),
    }
}

fn deserialize_score_weights<'de, D>(deserializer: D) -> Result<Weights, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    parse_score_weights(&s).map_err(serde::de::Error::custom)
}

fn parse_score_weights(s: &str) -> Result<Weights, String> {
    let mut custom = BTreeMap::new();
    for part in s.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let (name, weight) = part
            .split_once('=')
            .ok_or_else(|| format!("expected metric=weight, got '{part}'"))?;
        let kind: MetricKind = name.parse()?;
        let weight: f64 = weight
            .trim()
            .parse()
            .map_err(|_| format!("invalid weight for {kind}: '{}'", weight.trim()))?;
        if !weight.is_finite() || weight < 0.0 {
            return Err(format!("weight for {kind} must be a non-negative number"));
        }
        custom.insert(kind, weight);
    }
    Ok(adjust_weights(&custom))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: [&str; 10] = [
        "COMMIT_FETCH_DAYS",
        "MAX_GITHUB_API_PAGES",
        "MAX_ITEMS_PER_COLLECTION",
        "MOVING_AVERAGE_WINDOW",
        "CACHE_TTL_SECONDS",
        "CACHE_MAX_CAPACITY",
        "POPULAR_REPOS",
        "POPULAR_REPOS_CONCURRENCY_LIMIT",
        "SCORE_WEIGHTS",
        "GITHUB_TOKEN",
    ];

    fn clear_vars() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    fn set_required_vars() {
        env::set_var("COMMIT_FETCH_DAYS", "90");
        env::set_var("MAX_GITHUB_API_PAGES", "5");
        env::set_var("CACHE_TTL_SECONDS", "3600");
        env::set_var("CACHE_MAX_CAPACITY", "500");
        env::set_var("POPULAR_REPOS", "owner1/repo1,owner2/repo2");
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        clear_vars();
        set_required_vars();
        env::set_var("MAX_ITEMS_PER_COLLECTION", "300");
        env::set_var("MOVING_AVERAGE_WINDOW", "14");
        env::set_var("POPULAR_REPOS_CONCURRENCY_LIMIT", "5");
        env::set_var("SCORE_WEIGHTS", "commit_frequency=3, test_ratio=1");

        let config = AppConfig::from_env().expect("Failed to load config");

        assert_eq!(config.commit_fetch_days, 90);
        assert_eq!(config.max_github_api_pages, 5);
        assert_eq!(config.max_items_per_collection, 300);
        assert_eq!(config.moving_average_window, 14);
        assert_eq!(config.cache_ttl_seconds, 3600);
        assert_eq!(config.cache_max_capacity, 500);
        assert_eq!(config.popular_repos.len(), 2);
        assert_eq!(config.popular_repos[0].owner, "owner1");
        assert_eq!(config.popular_repos[0].repo, "repo1");
        assert_eq!(config.popular_repos_concurrency_limit, 5);
        assert_eq!(config.score_weights.commit_frequency, 0.75);
        assert_eq!(config.score_weights.test_ratio, 0.25);
        assert_eq!(config.score_weights.pr_rejection, 0.0);
        assert_eq!(config.analysis_options().moving_average_window, 14);

        clear_vars();
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        clear_vars();
        set_required_vars();

        let config = AppConfig::from_env().expect("Failed to load config");

        assert_eq!(config.max_items_per_collection, 200);
        assert_eq!(config.moving_average_window, 7);
        assert_eq!(config.popular_repos_concurrency_limit, 10);
        assert_eq!(config.score_weights, Weights::DEFAULT);
        assert_eq!(config.github_token, None);

        clear_vars();
    }

    #[test]
    #[serial]
    fn test_config_missing_vars() {
        clear_vars();
        let result = AppConfig::from_env();
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_config_rejects_unknown_metric_weight() {
        clear_vars();
        set_required_vars();
        env::set_var("SCORE_WEIGHTS", "coverage=1");

        assert!(AppConfig::from_env().is_err());

        clear_vars();
    }

    #[test]
    #[serial]
    fn test_config_rejects_zero_window() {
        clear_vars();
        set_required_vars();
        env::set_var("MOVING_AVERAGE_WINDOW", "0");

        assert!(AppConfig::from_env().is_err());

        clear_vars();
    }

    #[test]
    fn parses_moving_average_window() {
        assert_eq!(parse_window(" 14 "), Ok(14));
        assert!(parse_window("0").is_err());
        assert!(parse_window("-3").is_err());
        assert!(parse_window("week").is_err());
    }

    #[test]
    fn parses_popular_repos_leniently() {
        let repos = parse_popular_repos(" a/b , broken, /x, c/d ");
        assert_eq!(repos, vec![RepoId::new("a", "b"), RepoId::new("c", "d")]);
    }

    #[test]
    fn parses_score_weights() {
        assert_eq!(parse_score_weights(""), Ok(Weights::DEFAULT));
        assert_eq!(
            parse_score_weights("issue_resolution=1,pr_rejection=1"),
            Ok(Weights {
                commit_frequency: 0.0,
                issue_resolution: 0.5,
                pr_rejection: 0.5,
                test_ratio: 0.0,
            })
        );
        assert!(parse_score_weights("test_ratio").is_err());
        assert!(parse_score_weights("test_ratio=abc").is_err());
        assert!(parse_score_weights("test_ratio=-1").is_err());
    }
}
