use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static GITHUB_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"github\.com[/:]([^/\s]+)/([^/\s?#]+?)(?:\.git)?/?(?:[?#].*)?$")
        .expect("valid GitHub URL pattern")
});

static GITHUB_URL_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"github\.com[/:]([^/\s]+)/([^/\s?#]+)").expect("valid GitHub URL pattern")
});

/// A unique identifier for a GitHub repository.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    /// The owner of the repository (e.g., "facebook").
    pub owner: String,
    /// The name of the repository (e.g., "react").
    pub repo: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Extracts owner and repository from a GitHub URL.
    ///
    /// Accepts `https://github.com/owner/repo`, with or without a trailing
    /// slash or `.git` suffix, as well as deeper links such as
    /// `https://github.com/owner/repo/tree/main`.
    pub fn from_github_url(url: &str) -> Option<Self> {
        let url = url.trim();
        let captures = GITHUB_URL
            .captures(url)
            .or_else(|| GITHUB_URL_PREFIX.captures(url))?;

        let owner = captures.get(1)?.as_str();
        let repo = captures.get(2)?.as_str().trim_end_matches(".git");
        if owner.is_empty() || repo.is_empty() {
            return None;
        }

        Some(Self::new(owner, repo))
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}
