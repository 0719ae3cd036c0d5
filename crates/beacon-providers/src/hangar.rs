use async_trait::async_trait;
use beacon_core::{
    HttpTransport, Provider, ProviderConnection, ProviderError, Release, ResourceId, Version,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

const NAME: &str = "Hangar";
const VERSIONS_URL: &str =
    "https://hangar.papermc.io/api/v1/projects/{0}/versions?limit=1&offset=0&platform={1}";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HangarPlatform {
    #[default]
    Paper,
    Waterfall,
    Velocity,
}

impl HangarPlatform {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Paper => "PAPER",
            Self::Waterfall => "WATERFALL",
            Self::Velocity => "VELOCITY",
        }
    }
}

impl fmt::Display for HangarPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct HangarVersions {
    #[serde(default)]
    result: Vec<HangarVersion>,
}

#[derive(Debug, Deserialize)]
struct HangarVersion {
    name: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    downloads: HashMap<String, HangarDownload>,
}

#[derive(Debug, Deserialize)]
struct HangarDownload {
    #[serde(default, rename = "externalUrl")]
    external_url: Option<String>,
    #[serde(default, rename = "downloadUrl")]
    download_url: Option<String>,
}

/// PaperMC's Hangar project versions API.
#[derive(Debug, Clone)]
pub struct HangarProvider {
    project: ResourceId,
    platform: HangarPlatform,
}

impl HangarProvider {
    #[must_use]
    pub fn new(project: impl Into<ResourceId>) -> Self {
        Self {
            project: project.into(),
            platform: HangarPlatform::default(),
        }
    }

    #[must_use]
    pub fn with_platform(mut self, platform: HangarPlatform) -> Self {
        self.platform = platform;
        self
    }
}

pub(crate) fn release_from_versions(
    project: &str,
    platform: HangarPlatform,
    versions: HangarVersions,
) -> Result<Release, ProviderError> {
    let Some(latest) = versions.result.into_iter().next() else {
        return Err(ProviderError::not_found(
            NAME,
            format!("project {project} has no {platform} versions"),
        ));
    };

    let download = latest
        .downloads
        .get(platform.as_str())
        .and_then(|download| {
            download
                .download_url
                .clone()
                .or_else(|| download.external_url.clone())
        });

    let mut release = Release::new(Version::parse(&latest.name))
        .with_changelog_link(format!(
            "https://hangar.papermc.io/{project}/versions/{}",
            latest.name
        ))
        .with_contributors(latest.author);
    if let Some(download) = download {
        release = release.with_download_link(download);
    }
    Ok(release)
}

#[async_trait]
impl Provider for HangarProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch(&self, transport: &dyn HttpTransport) -> Result<Release, ProviderError> {
        let project = self.project.as_str();
        let versions: HangarVersions = ProviderConnection::open(
            transport,
            NAME,
            VERSIONS_URL,
            &[project, self.platform.as_str()],
        )
        .await?
        .json()
        .await?;
        release_from_versions(project, self.platform, versions)
    }
}
