use async_trait::async_trait;
use beacon_core::{
    HttpTransport, Provider, ProviderConnection, ProviderError, Release, ResourceId, Version,
};

const NAME: &str = "Spigot";
const VERSION_URL: &str = "https://api.spigotmc.org/legacy/update.php?resource={0}";
const RESOURCE_URL: &str = "https://www.spigotmc.org/resources/{0}";

/// SpigotMC's legacy plain-text update endpoint.
#[derive(Debug, Clone)]
pub struct SpigotProvider {
    resource: ResourceId,
}

impl SpigotProvider {
    #[must_use]
    pub fn new(resource: impl Into<ResourceId>) -> Self {
        Self {
            resource: resource.into(),
        }
    }
}

fn release_from_body(body: &str, resource: &str) -> Result<Release, ProviderError> {
    let version = body.lines().next().map(str::trim).unwrap_or_default();
    if version.is_empty() || version.to_ascii_lowercase().starts_with("invalid resource") {
        return Err(ProviderError::not_found(
            NAME,
            format!("resource {resource} has no published version"),
        ));
    }

    let download = beacon_core::expand_template(RESOURCE_URL, &[resource]);
    Ok(Release::new(Version::parse(version))
        .with_changelog_link(format!("{download}/updates"))
        .with_download_link(download))
}

#[async_trait]
impl Provider for SpigotProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch(&self, transport: &dyn HttpTransport) -> Result<Release, ProviderError> {
        let resource = self.resource.as_str();
        let body = ProviderConnection::open(transport, NAME, VERSION_URL, &[resource])
            .await?
            .text()
            .await?;
        release_from_body(&body, resource)
    }
}
