//! The GitHub collaborator contract (§1: an external collaborator, not
//! owned by this workspace).
//!
//! `relay-server` only needs enough of GitHub's API to list repositories and
//! manage the personal access token clients authenticate with; the actual
//! HTTP client lives outside this crate's concern (REST wiring is out of
//! scope per §6) so this is kept to a narrow trait a daemon binary can wire
//! up however it likes, with [`NullGithubClient`] as the no-token default.

use async_trait::async_trait;

use crate::error::{ServerError, ServerResult};
use crate::wire::RepoSummary;

/// What `relay-server` needs from GitHub. Object-safe so the daemon can
/// hold `Arc<dyn GithubClient>` regardless of which implementation it
/// wires up.
#[async_trait]
pub trait GithubClient: Send + Sync {
    /// List repositories visible to the configured token.
    async fn list_repos(&self) -> ServerResult<Vec<RepoSummary>>;

    /// The last four characters of the configured token, for display, or
    /// `None` if no token is configured.
    async fn token_hint(&self) -> ServerResult<Option<String>>;

    /// Store a new personal access token, replacing any existing one.
    async fn set_token(&self, token: &str) -> ServerResult<()>;

    /// Remove the configured token.
    async fn delete_token(&self) -> ServerResult<()>;
}

/// Stands in until a token is configured: every call fails with
/// [`ServerError::Github`] rather than panicking or silently no-op'ing.
#[derive(Debug, Default)]
pub struct NullGithubClient;

#[async_trait]
impl GithubClient for NullGithubClient {
    async fn list_repos(&self) -> ServerResult<Vec<RepoSummary>> {
        Err(ServerError::Github("no GitHub token configured".into()))
    }

    async fn token_hint(&self) -> ServerResult<Option<String>> {
        Ok(None)
    }

    async fn set_token(&self, _token: &str) -> ServerResult<()> {
        Err(ServerError::Github("token storage not wired up".into()))
    }

    async fn delete_token(&self) -> ServerResult<()> {
        Ok(())
    }
}
