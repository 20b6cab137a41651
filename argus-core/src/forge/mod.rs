//! Remote source-host access.
//!
//! The sync scheduler only sees the [`SourceHost`] trait; the GitHub REST
//! implementation lives in [`github`], and tests script their own hosts.

pub mod github;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use github::GithubForge;

/// Repository metadata needed at registration time.
#[derive(Debug, Clone)]
pub struct RemoteRepo {
    pub default_branch: String,
}

/// A commit listing entry, newest first as returned by the host.
#[derive(Debug, Clone)]
pub struct RemoteCommit {
    pub id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Per-commit change statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteCommitDetail {
    pub additions: u64,
    pub deletions: u64,
    pub files_changed: u64,
}

/// A blob entry from the repository tree.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub path: String,
    pub size: u64,
}

/// Read-only client contract against a remote source host.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceHost: Send + Sync {
    /// Verify the repository is reachable and fetch its default branch.
    async fn repo_info(&self, owner: &str, repo: &str) -> Result<RemoteRepo>;

    /// List commits, newest first, optionally restricted to those after
    /// `since`.
    async fn list_commits(
        &self,
        owner: &str,
        repo: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RemoteCommit>>;

    /// Change statistics for one commit.
    async fn commit_detail(
        &self,
        owner: &str,
        repo: &str,
        commit_id: &str,
    ) -> Result<RemoteCommitDetail>;

    /// Every blob reachable from the branch tip.
    async fn list_files(&self, owner: &str, repo: &str, branch: &str) -> Result<Vec<RemoteFile>>;

    /// Decoded file content at the branch tip.
    async fn file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> Result<String>;
}
