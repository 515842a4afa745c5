//! Service layer for querying and caching repository analyses.
//!
//! This module implements `AnalysisQuerier`, which acts as the main entry point for retrieving
//! repository analyses. It handles:
//! 1. Checking the in-memory cache for an existing report.
//! 2. Fetching raw data from GitHub if the cache is empty.
//! 3. Running the metric, trend and scoring pipeline on the fetched data.
//! 4. Proactively refreshing popular repositories in the background.

use crate::analysis::{self, AnalysisOptions, AnalysisReport};
use crate::config::AppConfig;
use crate::github::GitHubClient;
use crate::types::RepoId;
use futures::stream::{self, StreamExt};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration as StdDuration;

#[derive(Clone)]
pub struct AnalysisQuerier {
    cache: Cache<RepoId, Arc<AnalysisReport>>,
    client: GitHubClient,
    options: AnalysisOptions,
    config: AppConfig,
}

impl AnalysisQuerier {
    /// Initializes a new AnalysisQuerier.
    ///
    /// This sets up the GitHub client, the in-memory cache, and starts the background
    /// refresh task for popular repositories.
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let client = GitHubClient::new(config)?;

        let cache = Cache::builder()
            .max_capacity(config.cache_max_capacity)
            .time_to_live(config.cache_ttl())
            .build();

        let querier = Self {
            cache,
            client,
            options: config.analysis_options(),
            config: config.clone(),
        };

        querier.start_background_refresh();

        Ok(querier)
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Retrieves the analysis for a repository, computing it if not cached (read-through).
    pub async fn get(&self, repo_id: RepoId) -> anyhow::Result<Arc<AnalysisReport>> {
        if let Some(report) = self.cache.get(&repo_id).await {
            return Ok(report);
        }

        let report = Arc::new(self.fetch_and_analyze(&repo_id).await?);

        self.cache.insert(repo_id, report.clone()).await;

        Ok(report)
    }

    /// Starts a background task that periodically refreshes analyses for popular repositories.
    fn start_background_refresh(&self) {
        if self.config.popular_repos.is_empty() {
            return;
        }

        let querier = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            tracing::info!("Starting background refresh task for popular repositories");
            // Refresh popular repos at half their TTL to ensure they are always fresh/warm.
            let period = StdDuration::from_secs((config.cache_ttl_seconds / 2).max(1));
            let mut interval = tokio::time::interval(period);

            loop {
                interval.tick().await;
                tracing::info!("Refreshing popular repositories...");

                stream::iter(&config.popular_repos)
                    .for_each_concurrent(Some(config.popular_repos_concurrency_limit), |repo_id| {
                        querier.refresh_repo(repo_id)
                    })
                    .await;

                tracing::info!("Finished refreshing popular repositories");
            }
        });
    }

    /// Recomputes the analysis for a single repository and updates the cache.
    async fn refresh_repo(&self, repo_id: &RepoId) {
        match self.fetch_and_analyze(repo_id).await {
            Ok(report) => {
                self.cache.insert(repo_id.clone(), Arc::new(report)).await;
                tracing::info!("Refreshed analysis for {}", repo_id);
            }
            Err(e) => {
                tracing::error!("Failed to refresh popular repo {}: {}", repo_id, e);
            }
        }
    }

    async fn fetch_and_analyze(&self, repo_id: &RepoId) -> anyhow::Result<AnalysisReport> {
        let data = self.client.fetch_repository(repo_id).await?;
        let report = analysis::analyze(&data, &self.options)?;
        Ok(report)
    }
}
