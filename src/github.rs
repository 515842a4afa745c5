//! GitHub data client.
//!
//! Fetches the raw collections an analysis needs through octocrab and adapts
//! them into a [`RepositoryData`]. Only the repository metadata is required;
//! a failure on any other collection is logged and recorded as a warning.

use crate::analysis::{RawRepositoryPayload, RepositoryData};
use crate::config::AppConfig;
use crate::records::ContributorRecord;
use crate::types::RepoId;
use anyhow::Result;
use chrono::{Duration, Utc};
use futures::stream::{self, StreamExt};
use octocrab::Octocrab;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

const PER_PAGE: u8 = 100;

/// Page requests kept in flight per collection.
const PAGE_CONCURRENCY: usize = 4;

const MAX_CONTRIBUTORS: usize = 50;

/// Leading contributors whose user profiles are looked up.
const PROFILE_LOOKUPS: usize = 15;

#[derive(Clone, Debug, Default, Serialize)]
struct PageQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    since: Option<String>,
    per_page: u8,
    page: u32,
}

#[derive(Serialize)]
struct TreeQuery {
    recursive: u8,
}

#[derive(Clone)]
pub struct GitHubClient {
    octocrab: Octocrab,
    commit_fetch_days: i64,
    max_pages: u32,
    max_items: usize,
}

impl GitHubClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let mut builder = Octocrab::builder();
        if let Some(token) = &config.github_token {
            builder = builder.personal_token(token.clone());
        }

        Ok(Self {
            octocrab: builder.build()?,
            commit_fetch_days: config.commit_fetch_days,
            max_pages: config.max_github_api_pages.max(1),
            max_items: config.max_items_per_collection,
        })
    }

    /// Fetches metadata, commits, issues, pull requests, the file tree,
    /// language statistics and contributors for a repository.
    pub async fn fetch_repository(&self, repo_id: &RepoId) -> Result<RepositoryData> {
        // Sanitize inputs to prevent path traversal or unintended endpoint access
        let owner = repo_id.owner.trim().replace("..", "");
        let repo = repo_id.repo.trim().replace("..", "");
        let base = format!("/repos/{owner}/{repo}");

        let info: Value = self.octocrab.get(&base, None::<&()>).await?;
        let default_branch = info
            .get("default_branch")
            .and_then(Value::as_str)
            .unwrap_or("main")
            .to_string();

        let since = Utc::now() - Duration::days(self.commit_fetch_days);
        let (commits, issues, pull_requests, files, languages, contributors) = futures::join!(
            self.fetch_collection(
                format!("{base}/commits"),
                PageQuery {
                    since: Some(since.to_rfc3339()),
                    ..Default::default()
                },
                self.max_items,
            ),
            self.fetch_collection(
                format!("{base}/issues"),
                PageQuery {
                    state: Some("all"),
                    ..Default::default()
                },
                self.max_items,
            ),
            self.fetch_collection(
                format!("{base}/pulls"),
                PageQuery {
                    state: Some("all"),
                    ..Default::default()
                },
                self.max_items,
            ),
            self.fetch_files(&base, &default_branch),
            self.fetch_languages(&base),
            self.fetch_contributors(&base),
        );

        let mut warnings = Vec::new();
        let payload = RawRepositoryPayload {
            repository: Some(info),
            commits: keep_or_warn(commits, "commits", repo_id, &mut warnings),
            issues: keep_or_warn(issues, "issues", repo_id, &mut warnings),
            pull_requests: keep_or_warn(pull_requests, "pull requests", repo_id, &mut warnings),
            files: keep_or_warn(files, "files", repo_id, &mut warnings),
            languages: keep_or_warn(languages, "languages", repo_id, &mut warnings),
            contributors: keep_or_warn(contributors, "contributors", repo_id, &mut warnings),
            error: None,
        };

        let mut data = payload.into_repository_data(&repo_id.to_string());
        data.warnings = warnings;

        tracing::info!(
            repo_id = %repo_id,
            commits = data.commits.len(),
            issues = data.issues.len(),
            pull_requests = data.pull_requests.len(),
            files = data.files.len(),
            contributors = data.contributors.len(),
            "Fetched repository data"
        );

        Ok(data)
    }

    /// Collects up to `limit` records from a paginated listing.
    async fn fetch_collection(
        &self,
        route: String,
        query: PageQuery,
        limit: usize,
    ) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut hit_page_limit = true;

        let mut page_stream = stream::iter(1..=self.max_pages)
            .map(|page| {
                let octocrab = self.octocrab.clone();
                let route = route.clone();
                let query = PageQuery {
                    per_page: PER_PAGE,
                    page,
                    ..query.clone()
                };
                async move { octocrab.get::<Vec<Value>, _, _>(route, Some(&query)).await }
            })
            .buffered(PAGE_CONCURRENCY);

        while let Some(result) = page_stream.next().await {
            let page = result?;
            let last_page = page.len() < usize::from(PER_PAGE);
            items.extend(page);

            if last_page || items.len() >= limit {
                hit_page_limit = false;
                break;
            }
        }

        if hit_page_limit {
            tracing::warn!(
                "Hit max_github_api_pages ({}) for {} before the listing ended. Data may be incomplete.",
                self.max_pages,
                route
            );
        }

        items.truncate(limit);
        Ok(items)
    }

    /// Lists contributors and copies profile fields onto the leading ones.
    /// A failed profile lookup leaves that contributor as listed.
    async fn fetch_contributors(&self, base: &str) -> Result<Vec<Value>> {
        let mut contributors = self
            .fetch_collection(
                format!("{base}/contributors"),
                PageQuery::default(),
                MAX_CONTRIBUTORS,
            )
            .await?;

        let logins: Vec<Option<String>> = contributors
            .iter()
            .take(PROFILE_LOOKUPS)
            .map(|c| c.get("login").and_then(Value::as_str).map(str::to_owned))
            .collect();

        let profiles: Vec<Option<Value>> = stream::iter(logins)
            .map(|login| async move {
                let login = login?;
                match self
                    .octocrab
                    .get::<Value, _, _>(format!("/users/{login}"), None::<&()>)
                    .await
                {
                    Ok(profile) => Some(profile),
                    Err(e) => {
                        tracing::debug!("Failed to fetch profile of {}: {}", login, e);
                        None
                    }
                }
            })
            .buffered(PAGE_CONCURRENCY)
            .collect()
            .await;

        for (contributor, profile) in contributors.iter_mut().zip(profiles) {
            if let Some(profile) = profile {
                merge_profile(contributor, &profile);
            }
        }

        Ok(contributors)
    }

    /// Lists blob entries of the default branch's tree.
    async fn fetch_files(&self, base: &str, branch: &str) -> Result<Vec<Value>> {
        let tree: Value = self
            .octocrab
            .get(
                format!("{base}/git/trees/{branch}"),
                Some(&TreeQuery { recursive: 1 }),
            )
            .await?;

        if tree.get("truncated").and_then(Value::as_bool) == Some(true) {
            tracing::warn!("File tree for {} was truncated by GitHub", base);
        }

        let files = tree
            .get("tree")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| entry.get("type").and_then(Value::as_str) == Some("blob"))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(files)
    }

    async fn fetch_languages(&self, base: &str) -> Result<BTreeMap<String, u64>> {
        let languages: BTreeMap<String, u64> = self
            .octocrab
            .get(format!("{base}/languages"), None::<&()>)
            .await?;
        Ok(languages)
    }
}

fn merge_profile(contributor: &mut Value, profile: &Value) {
    let Some(entry) = contributor.as_object_mut() else {
        return;
    };
    for field in ContributorRecord::PROFILE_FIELDS {
        match profile.get(field) {
            Some(value) if !value.is_null() => {
                entry.insert(field.to_owned(), value.clone());
            }
            _ => {}
        }
    }
}

fn keep_or_warn<T: Default>(
    result: Result<T>,
    collection: &str,
    repo_id: &RepoId,
    warnings: &mut Vec<String>,
) -> T {
    result.unwrap_or_else(|e| {
        tracing::warn!(repo_id = %repo_id, "Failed to fetch {}: {}", collection, e);
        warnings.push(format!("{collection}: {e}"));
        T::default()
    })
}
