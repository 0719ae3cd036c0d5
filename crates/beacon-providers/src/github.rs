use async_trait::async_trait;
use beacon_core::{
    HttpTransport, Provider, ProviderConnection, ProviderError, Release, ResourceId, Version,
};
use log::debug;
use serde::Deserialize;

const NAME: &str = "GitHub";
const LATEST_RELEASE_URL: &str = "https://api.github.com/repos/{0}/releases/latest";
const CONTRIBUTORS_URL: &str = "https://api.github.com/repos/{0}/contributors";

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub digest: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRelease {
    pub tag_name: String,
    pub html_url: String,
    #[serde(default)]
    pub assets: Vec<GitHubAsset>,
}

#[derive(Debug, Deserialize)]
struct GitHubContributor {
    login: String,
}

/// Latest release of a GitHub repository, identified as `owner/repo`.
///
/// The first release asset is the download. API throttling (HTTP 403)
/// surfaces as an unreachable provider so the next pass retries.
#[derive(Debug, Clone)]
pub struct GitHubProvider {
    repository: ResourceId,
}

impl GitHubProvider {
    #[must_use]
    pub fn new(repository: impl Into<ResourceId>) -> Self {
        Self {
            repository: repository.into(),
        }
    }
}

fn release_from_github(release: GitHubRelease) -> Release {
    let tag = release
        .tag_name
        .strip_prefix('v')
        .unwrap_or(&release.tag_name);

    let mut converted = Release::new(Version::parse(tag)).with_changelog_link(release.html_url);
    if let Some(asset) = release.assets.into_iter().next() {
        let digest = asset.digest.as_deref().and_then(parse_sha256_digest);
        converted = converted
            .with_download_link(asset.browser_download_url)
            .with_download_sha256(digest);
    }
    converted
}

fn parse_sha256_digest(digest: &str) -> Option<String> {
    let (algorithm, hash) = digest.split_once(':')?;
    if !algorithm.eq_ignore_ascii_case("sha256") {
        return None;
    }
    if hash.len() != 64 || !hash.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    Some(hash.to_ascii_lowercase())
}

async fn fetch_contributors(transport: &dyn HttpTransport, repository: &str) -> Vec<String> {
    let contributors: Result<Vec<GitHubContributor>, ProviderError> =
        match ProviderConnection::open(transport, NAME, CONTRIBUTORS_URL, &[repository]).await {
            Ok(connection) => connection.json().await,
            Err(error) => Err(error),
        };

    match contributors {
        Ok(contributors) => contributors.into_iter().map(|c| c.login).collect(),
        Err(error) => {
            debug!("{NAME}: skipping contributors for {repository}: {error}");
            Vec::new()
        }
    }
}

#[async_trait]
impl Provider for GitHubProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch(&self, transport: &dyn HttpTransport) -> Result<Release, ProviderError> {
        let repository = self.repository.as_str();
        let release: GitHubRelease =
            ProviderConnection::open(transport, NAME, LATEST_RELEASE_URL, &[repository])
                .await?
                .json()
                .await?;

        let contributors = fetch_contributors(transport, repository).await;
        Ok(release_from_github(release).with_contributors(contributors))
    }
}
