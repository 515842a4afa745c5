//! Canonical input records consumed by the metric and trend computations.
//!
//! GitHub payloads (and hand-built snapshots) carry the same information under
//! different keys. The adapters in this module resolve those variations once,
//! so the computations only ever see one shape per record type.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A commit reduced to the only field the analysis needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Raw author timestamp, as reported by the source.
    pub authored_at: Option<String>,
}

impl CommitRecord {
    pub fn new(authored_at: impl Into<String>) -> Self {
        Self {
            authored_at: Some(authored_at.into()),
        }
    }

    /// Builds a record from a commit payload.
    ///
    /// The timestamp is looked up under `commit.author.date` (REST commit
    /// listing), then `date`, then `created_at`.
    pub fn from_json(value: &Value) -> Self {
        let authored_at = match value.get("commit") {
            Some(commit) if commit.is_object() => commit
                .get("author")
                .and_then(|author| author.get("date"))
                .and_then(Value::as_str),
            _ => value
                .get("date")
                .and_then(Value::as_str)
                .or_else(|| value.get("created_at").and_then(Value::as_str)),
        };

        Self {
            authored_at: authored_at.map(str::to_owned),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRecord {
    /// "open" or "closed", compared case-insensitively.
    pub state: String,
    pub created_at: Option<String>,
    pub closed_at: Option<String>,
}

impl IssueRecord {
    pub fn from_json(value: &Value) -> Self {
        Self {
            state: string_field(value, "state").unwrap_or_default(),
            created_at: string_field(value, "created_at"),
            closed_at: string_field(value, "closed_at"),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.eq_ignore_ascii_case("closed")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRecord {
    pub state: String,
    /// Explicit merge flag; only some endpoints report it.
    #[serde(default)]
    pub merged: bool,
    pub merged_at: Option<String>,
}

impl PullRequestRecord {
    pub fn from_json(value: &Value) -> Self {
        Self {
            state: string_field(value, "state").unwrap_or_default(),
            merged: value.get("merged").and_then(Value::as_bool).unwrap_or(false),
            merged_at: string_field(value, "merged_at"),
        }
    }

    pub fn is_merged(&self) -> bool {
        self.merged || self.merged_at.is_some()
    }
}

/// Extracts a file path from either a bare string or an object with a
/// `path` (preferred) or `name` field.
pub fn file_path_from_json(value: &Value) -> Option<String> {
    let path = match value {
        Value::String(path) => Some(path.as_str()),
        Value::Object(_) => value
            .get("path")
            .and_then(Value::as_str)
            .or_else(|| value.get("name").and_then(Value::as_str)),
        _ => None,
    }?;

    (!path.is_empty()).then(|| path.to_owned())
}

/// A contributor as listed by `GET /repos/{owner}/{repo}/contributors`,
/// optionally enriched with fields from the user's profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorRecord {
    pub login: String,
    /// Display name; the login when the profile has none.
    pub name: String,
    pub avatar_url: String,
    pub url: String,
    pub contributions: u64,
    pub bio: Option<String>,
    pub followers: Option<u64>,
    pub public_repos: Option<u64>,
    pub location: Option<String>,
    pub company: Option<String>,
}

impl ContributorRecord {
    /// Profile fields copied onto a contributor entry when enriching it.
    pub const PROFILE_FIELDS: [&'static str; 6] =
        ["name", "bio", "followers", "public_repos", "location", "company"];

    pub fn from_json(value: &Value) -> Self {
        let login = string_field(value, "login").unwrap_or_else(|| "unknown".to_owned());

        Self {
            name: string_field(value, "name").unwrap_or_else(|| login.clone()),
            avatar_url: string_field(value, "avatar_url")
                .unwrap_or_else(|| "https://github.com/ghost.png".to_owned()),
            url: string_field(value, "html_url")
                .unwrap_or_else(|| format!("https://github.com/{login}")),
            contributions: count_field(value, "contributions"),
            bio: string_field(value, "bio").filter(|bio| !bio.is_empty()),
            followers: value.get("followers").and_then(Value::as_u64),
            public_repos: value.get("public_repos").and_then(Value::as_u64),
            location: string_field(value, "location").filter(|location| !location.is_empty()),
            company: string_field(value, "company").filter(|company| !company.is_empty()),
            login,
        }
    }
}

/// Repository metadata shown alongside the computed metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub name: String,
    pub full_name: String,
    pub description: String,
    pub url: String,
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
    pub open_issues: u64,
    pub language: String,
    pub created_at: String,
    pub updated_at: String,
    pub default_branch: String,
}

impl RepositoryInfo {
    /// Builds repository metadata from the `GET /repos/{owner}/{repo}` payload.
    ///
    /// `fallback_name` is used for `name`/`full_name` when the payload omits them.
    pub fn from_json(value: &Value, fallback_name: &str) -> Self {
        let full_name = string_field(value, "full_name").unwrap_or_else(|| fallback_name.to_owned());
        let name = string_field(value, "name").unwrap_or_else(|| {
            full_name
                .rsplit('/')
                .next()
                .unwrap_or(full_name.as_str())
                .to_owned()
        });

        Self {
            name,
            url: string_field(value, "html_url")
                .unwrap_or_else(|| format!("https://github.com/{full_name}")),
            full_name,
            description: string_field(value, "description").unwrap_or_default(),
            stars: count_field(value, "stargazers_count"),
            forks: count_field(value, "forks_count"),
            watchers: count_field(value, "watchers_count"),
            open_issues: count_field(value, "open_issues_count"),
            language: string_field(value, "language").unwrap_or_else(|| "Unknown".to_owned()),
            created_at: string_field(value, "created_at").unwrap_or_default(),
            updated_at: string_field(value, "updated_at").unwrap_or_default(),
            default_branch: string_field(value, "default_branch")
                .unwrap_or_else(|| "main".to_owned()),
        }
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn count_field(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn commit_date_from_nested_author() {
        let record = CommitRecord::from_json(&json!({
            "sha": "abc",
            "commit": { "author": { "date": "2024-01-01T10:00:00Z" } }
        }));
        assert_eq!(record.authored_at.as_deref(), Some("2024-01-01T10:00:00Z"));
    }

    #[test]
    fn commit_date_from_flat_keys() {
        let flat = CommitRecord::from_json(&json!({ "date": "2024-01-02" }));
        assert_eq!(flat.authored_at.as_deref(), Some("2024-01-02"));

        let created = CommitRecord::from_json(&json!({ "created_at": "2024-01-03T00:00:00Z" }));
        assert_eq!(created.authored_at.as_deref(), Some("2024-01-03T00:00:00Z"));
    }

    #[test]
    fn nested_commit_without_author_has_no_date() {
        // A nested commit object wins over flat keys, even when it lacks a date.
        let record = CommitRecord::from_json(&json!({
            "commit": { "message": "fix" },
            "date": "2024-01-02"
        }));
        assert_eq!(record.authored_at, None);
    }

    #[test]
    fn pull_request_merge_detection() {
        let flagged = PullRequestRecord::from_json(&json!({ "state": "closed", "merged": true }));
        assert!(flagged.is_merged());

        let timestamped = PullRequestRecord::from_json(&json!({
            "state": "closed",
            "merged_at": "2024-01-02T10:00:00Z"
        }));
        assert!(timestamped.is_merged());

        let rejected = PullRequestRecord::from_json(&json!({ "state": "closed", "merged_at": null }));
        assert!(!rejected.is_merged());
    }

    #[test]
    fn file_paths_from_strings_and_objects() {
        assert_eq!(file_path_from_json(&json!("src/lib.rs")).as_deref(), Some("src/lib.rs"));
        assert_eq!(
            file_path_from_json(&json!({ "path": "tests/a.py", "name": "a.py" })).as_deref(),
            Some("tests/a.py")
        );
        assert_eq!(file_path_from_json(&json!({ "name": "a.py" })).as_deref(), Some("a.py"));
        assert_eq!(file_path_from_json(&json!({ "path": "" })), None);
        assert_eq!(file_path_from_json(&json!(42)), None);
    }

    #[test]
    fn contributor_from_listing_and_profile() {
        let listed = ContributorRecord::from_json(&json!({
            "login": "octocat",
            "avatar_url": "https://avatars.githubusercontent.com/u/583231",
            "contributions": 42
        }));
        assert_eq!(listed.login, "octocat");
        assert_eq!(listed.name, "octocat");
        assert_eq!(listed.url, "https://github.com/octocat");
        assert_eq!(listed.contributions, 42);
        assert_eq!(listed.followers, None);

        let enriched = ContributorRecord::from_json(&json!({
            "login": "octocat",
            "contributions": 42,
            "name": "The Octocat",
            "bio": "",
            "followers": 9000,
            "public_repos": 8,
            "company": "@github",
            "location": null
        }));
        assert_eq!(enriched.name, "The Octocat");
        assert_eq!(enriched.avatar_url, "https://github.com/ghost.png");
        assert_eq!(enriched.bio, None);
        assert_eq!(enriched.followers, Some(9000));
        assert_eq!(enriched.public_repos, Some(8));
        assert_eq!(enriched.company.as_deref(), Some("@github"));
        assert_eq!(enriched.location, None);
    }

    #[test]
    fn repository_info_falls_back_to_requested_name() {
        let info = RepositoryInfo::from_json(&json!({ "stargazers_count": 12 }), "octo/widgets");
        assert_eq!(info.full_name, "octo/widgets");
        assert_eq!(info.name, "widgets");
        assert_eq!(info.url, "https://github.com/octo/widgets");
        assert_eq!(info.stars, 12);
        assert_eq!(info.language, "Unknown");
        assert_eq!(info.default_branch, "main");
    }
}
