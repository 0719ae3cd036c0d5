use async_trait::async_trait;
use beacon_core::{
    HttpTransport, Provider, ProviderConnection, ProviderError, Release, ResourceId, Version,
};
use log::debug;
use serde::Deserialize;

const NAME: &str = "Bukkit";
const FILES_URL: &str = "https://api.curseforge.com/servermods/files?projectIds={0}";
const PROJECT_URL: &str = "https://dev.bukkit.org/projects/{0}";
const CHANGELOG_URL: &str = "https://www.curseforge.com/minecraft/bukkit-plugins/{0}/files/{1}";

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ServerModsFile {
    name: String,
    #[serde(default, rename = "downloadUrl")]
    download_url: Option<String>,
    #[serde(default, rename = "fileUrl")]
    file_url: Option<String>,
}

/// BukkitDev projects through the CurseForge servermods API.
///
/// The files listing is ordered oldest first, so the last entry is the
/// newest upload.
#[derive(Debug, Clone)]
pub struct BukkitProvider {
    project: ResourceId,
}

impl BukkitProvider {
    #[must_use]
    pub fn new(project: impl Into<ResourceId>) -> Self {
        Self {
            project: project.into(),
        }
    }
}

fn last_path_segment(url: &str) -> Option<&str> {
    url.split(['?', '#'])
        .next()?
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
}

pub(crate) fn release_from_files(
    project: &str,
    mut files: Vec<ServerModsFile>,
    slug: Option<&str>,
) -> Result<Release, ProviderError> {
    let Some(latest) = files.pop() else {
        return Err(ProviderError::not_found(
            NAME,
            format!("project {project} has no uploaded files"),
        ));
    };

    let file_id = latest.file_url.as_deref().and_then(last_path_segment);
    let changelog = match (slug, file_id) {
        (Some(slug), Some(file_id)) => Some(beacon_core::expand_template(
            CHANGELOG_URL,
            &[slug, file_id],
        )),
        _ => latest.file_url.clone(),
    };

    let mut release = Release::new(Version::parse(&latest.name));
    if let Some(download) = latest.download_url {
        release = release.with_download_link(download);
    }
    if let Some(changelog) = changelog {
        release = release.with_changelog_link(changelog);
    }
    Ok(release)
}

async fn resolve_slug(transport: &dyn HttpTransport, project: &str) -> Option<String> {
    match ProviderConnection::open(transport, NAME, PROJECT_URL, &[project]).await {
        Ok(connection) => last_path_segment(connection.url()).map(str::to_string),
        Err(error) => {
            debug!("{NAME}: could not resolve project slug for {project}: {error}");
            None
        }
    }
}

#[async_trait]
impl Provider for BukkitProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch(&self, transport: &dyn HttpTransport) -> Result<Release, ProviderError> {
        let project = self.project.as_str();
        let files: Vec<ServerModsFile> =
            ProviderConnection::open(transport, NAME, FILES_URL, &[project])
                .await?
                .json()
                .await?;
        if files.is_empty() {
            return release_from_files(project, files, None);
        }

        let slug = resolve_slug(transport, project).await;
        release_from_files(project, files, slug.as_deref())
    }
}
