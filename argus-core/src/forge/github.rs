//! GitHub REST implementation of [`SourceHost`].

use super::{RemoteCommit, RemoteCommitDetail, RemoteFile, RemoteRepo, SourceHost};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Hard timeout on every forge request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Commit listings are paged at the API maximum.
const COMMITS_PER_PAGE: usize = 100;

/// Upper bound on listing pages fetched per sync; the incremental
/// short-circuit on the last processed commit keeps the window small in
/// steady state.
const MAX_COMMIT_PAGES: usize = 5;

#[derive(Debug, Deserialize)]
struct RepoResponse {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct CommitListEntry {
    sha: String,
    commit: CommitBody,
}

#[derive(Debug, Deserialize)]
struct CommitBody {
    message: String,
    committer: Option<CommitSignature>,
    author: Option<CommitSignature>,
}

#[derive(Debug, Deserialize)]
struct CommitSignature {
    date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct CommitDetailResponse {
    stats: Option<CommitStats>,
    #[serde(default)]
    files: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CommitStats {
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    entry_type: String,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(default)]
    content: String,
}

/// Token-authenticated GitHub REST client.
pub struct GithubForge {
    http: reqwest::Client,
    base_url: String,
}

impl std::fmt::Debug for GithubForge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubForge")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GithubForge {
    pub fn new(base_url: impl Into<String>, token: &str) -> Result<Self> {
        use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("argus-engine"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| EngineError::Internal("source token is not a valid header".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| EngineError::Internal(format!("http client build failed: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| map_transport_error(url, e))?;
        match response.status() {
            status if status.is_success() => response
                .json::<T>()
                .await
                .map_err(|e| EngineError::RemoteUnavailable(format!("bad response body: {e}"))),
            StatusCode::NOT_FOUND => Err(EngineError::NotFound(format!("remote: {url}"))),
            status => Err(EngineError::RemoteUnavailable(format!(
                "{url} returned {status}"
            ))),
        }
    }
}

fn map_transport_error(url: &str, err: reqwest::Error) -> EngineError {
    if err.is_timeout() {
        EngineError::RemoteTimeout(format!("{url}: {err}"))
    } else {
        EngineError::RemoteUnavailable(format!("{url}: {err}"))
    }
}

#[async_trait]
impl SourceHost for GithubForge {
    async fn repo_info(&self, owner: &str, repo: &str) -> Result<RemoteRepo> {
        let url = format!("{}/repos/{owner}/{repo}", self.base_url);
        let response: RepoResponse = self.get_json(&url).await?;
        Ok(RemoteRepo {
            default_branch: response.default_branch,
        })
    }

    async fn list_commits(
        &self,
        owner: &str,
        repo: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RemoteCommit>> {
        let mut commits = Vec::new();
        for page in 1..=MAX_COMMIT_PAGES {
            let mut url = format!(
                "{}/repos/{owner}/{repo}/commits?per_page={COMMITS_PER_PAGE}&page={page}",
                self.base_url
            );
            if let Some(since) = since {
                url.push_str(&format!("&since={}", since.to_rfc3339()));
            }
            let entries: Vec<CommitListEntry> = self.get_json(&url).await?;
            let page_len = entries.len();
            for entry in entries {
                let timestamp = entry
                    .commit
                    .committer
                    .or(entry.commit.author)
                    .map(|sig| sig.date)
                    .unwrap_or_else(Utc::now);
                commits.push(RemoteCommit {
                    id: entry.sha,
                    message: entry.commit.message,
                    timestamp,
                });
            }
            if page_len < COMMITS_PER_PAGE {
                return Ok(commits);
            }
        }
        debug!(
            owner,
            repo,
            fetched = commits.len(),
            "commit listing capped at {MAX_COMMIT_PAGES} pages"
        );
        Ok(commits)
    }

    async fn commit_detail(
        &self,
        owner: &str,
        repo: &str,
        commit_id: &str,
    ) -> Result<RemoteCommitDetail> {
        let url = format!("{}/repos/{owner}/{repo}/commits/{commit_id}", self.base_url);
        let response: CommitDetailResponse = self.get_json(&url).await?;
        let stats = response.stats.unwrap_or(CommitStats {
            additions: 0,
            deletions: 0,
        });
        Ok(RemoteCommitDetail {
            additions: stats.additions,
            deletions: stats.deletions,
            files_changed: response.files.len() as u64,
        })
    }

    async fn list_files(&self, owner: &str, repo: &str, branch: &str) -> Result<Vec<RemoteFile>> {
        let url = format!(
            "{}/repos/{owner}/{repo}/git/trees/{branch}?recursive=1",
            self.base_url
        );
        let response: TreeResponse = self.get_json(&url).await?;
        if response.truncated {
            debug!(owner, repo, "tree listing truncated by remote");
        }
        Ok(response
            .tree
            .into_iter()
            .filter(|entry| entry.entry_type == "blob")
            .map(|entry| RemoteFile {
                path: entry.path,
                size: entry.size,
            })
            .collect())
    }

    async fn file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> Result<String> {
        let url = format!(
            "{}/repos/{owner}/{repo}/contents/{path}?ref={branch}",
            self.base_url
        );
        let response: ContentResponse = self.get_json(&url).await?;
        let packed: String = response
            .content
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let bytes = BASE64
            .decode(packed)
            .map_err(|e| EngineError::RemoteUnavailable(format!("bad content encoding: {e}")))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
