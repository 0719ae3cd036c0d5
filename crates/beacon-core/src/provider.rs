use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::ProviderError;
use crate::http::HttpTransport;
use crate::version::Version;

/// Marketplace identifier of a resource: numeric on most marketplaces, a slug
/// or `owner/repo` pair on others.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        Self(value.trim().to_string())
    }
}

impl From<u32> for ResourceId {
    fn from(value: u32) -> Self {
        Self(value.to_string())
    }
}

impl From<u64> for ResourceId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commercial {
    pub price: Option<String>,
    pub premium: bool,
}

/// Release metadata reported by one provider fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub version: Version,
    pub download_link: Option<String>,
    pub changelog_link: Option<String>,
    pub donation_link: Option<String>,
    pub contributors: BTreeSet<String>,
    pub commercial: Option<Commercial>,
    pub download_sha256: Option<String>,
}

impl Release {
    #[must_use]
    pub fn new(version: Version) -> Self {
        Self {
            version,
            download_link: None,
            changelog_link: None,
            donation_link: None,
            contributors: BTreeSet::new(),
            commercial: None,
            download_sha256: None,
        }
    }

    #[must_use]
    pub fn with_download_link(mut self, link: impl Into<String>) -> Self {
        self.download_link = non_empty(link.into());
        self
    }

    #[must_use]
    pub fn with_changelog_link(mut self, link: impl Into<String>) -> Self {
        self.changelog_link = non_empty(link.into());
        self
    }

    #[must_use]
    pub fn with_donation_link(mut self, link: impl Into<String>) -> Self {
        self.donation_link = non_empty(link.into());
        self
    }

    #[must_use]
    pub fn with_contributors<I, S>(mut self, contributors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.contributors.extend(
            contributors
                .into_iter()
                .filter_map(|name| non_empty(name.into())),
        );
        self
    }

    #[must_use]
    pub fn with_commercial(mut self, price: Option<String>, premium: bool) -> Self {
        self.commercial = Some(Commercial {
            price: price.and_then(non_empty),
            premium,
        });
        self
    }

    #[must_use]
    pub fn with_download_sha256(mut self, digest: Option<String>) -> Self {
        self.download_sha256 = digest;
        self
    }

    #[must_use]
    pub fn price(&self) -> Option<&str> {
        self.commercial.as_ref()?.price.as_deref()
    }

    #[must_use]
    pub fn is_premium(&self) -> bool {
        self.commercial
            .as_ref()
            .is_some_and(|commercial| commercial.premium)
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}

/// A marketplace adapter.
///
/// `fetch` performs the whole network exchange for one check and either
/// returns a fully populated [`Release`] or an error; it never leaves partial
/// state behind.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, transport: &dyn HttpTransport) -> Result<Release, ProviderError>;
}

/// A configured provider together with the release its last successful fetch
/// committed.
pub struct TrackedProvider {
    inner: Box<dyn Provider>,
    release: Option<Release>,
}

impl TrackedProvider {
    #[must_use]
    pub fn new(provider: impl Provider + 'static) -> Self {
        Self::from_boxed(Box::new(provider))
    }

    #[must_use]
    pub fn from_boxed(provider: Box<dyn Provider>) -> Self {
        Self {
            inner: provider,
            release: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Fetch and commit the latest release.
    ///
    /// The previously committed release is discarded first, so after a
    /// failure every getter reports nothing.
    ///
    /// # Errors
    /// Propagates the provider's [`ProviderError`].
    pub async fn fetch(&mut self, transport: &dyn HttpTransport) -> Result<&Release, ProviderError> {
        self.release = None;
        let release = self.inner.fetch(transport).await?;
        Ok(self.release.insert(release))
    }

    #[must_use]
    pub fn release(&self) -> Option<&Release> {
        self.release.as_ref()
    }

    #[must_use]
    pub fn version(&self) -> Option<&Version> {
        self.release.as_ref().map(|release| &release.version)
    }

    #[must_use]
    pub fn download_link(&self) -> Option<&str> {
        self.release.as_ref()?.download_link.as_deref()
    }

    #[must_use]
    pub fn changelog_link(&self) -> Option<&str> {
        self.release.as_ref()?.changelog_link.as_deref()
    }

    #[must_use]
    pub fn donation_link(&self) -> Option<&str> {
        self.release.as_ref()?.donation_link.as_deref()
    }

    pub fn contributors(&self) -> impl Iterator<Item = &str> {
        self.release
            .iter()
            .flat_map(|release| release.contributors.iter().map(String::as_str))
    }

    #[must_use]
    pub fn price(&self) -> Option<&str> {
        self.release.as_ref()?.price()
    }

    #[must_use]
    pub fn is_premium(&self) -> bool {
        self.release.as_ref().is_some_and(Release::is_premium)
    }
}

impl fmt::Debug for TrackedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedProvider")
            .field("name", &self.name())
            .field("release", &self.release)
            .finish()
    }
}
