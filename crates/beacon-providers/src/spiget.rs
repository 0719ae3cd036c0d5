use async_trait::async_trait;
use beacon_core::{
    HttpTransport, Provider, ProviderConnection, ProviderError, Release, ResourceId, Version,
};
use serde::Deserialize;

const NAME: &str = "Spiget";
const RESOURCE_URL: &str = "https://api.spiget.org/v2/resources/{0}";
const LATEST_VERSION_URL: &str = "https://api.spiget.org/v2/resources/{0}/versions/latest";
const SPIGOT_BASE: &str = "https://www.spigotmc.org";

#[derive(Debug, Deserialize)]
pub(crate) struct SpigetResource {
    #[serde(default)]
    file: Option<SpigetFile>,
    #[serde(default)]
    updates: Vec<SpigetUpdate>,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    premium: bool,
    #[serde(default, rename = "donationLink")]
    donation_link: Option<String>,
    #[serde(default)]
    contributors: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpigetFile {
    #[serde(default)]
    url: Option<String>,
    #[serde(default, rename = "externalUrl")]
    external_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpigetUpdate {
    id: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SpigetVersion {
    name: String,
}

/// Spiget's JSON mirror of SpigotMC resources.
#[derive(Debug, Clone)]
pub struct SpigetProvider {
    resource: ResourceId,
}

impl SpigetProvider {
    #[must_use]
    pub fn new(resource: impl Into<ResourceId>) -> Self {
        Self {
            resource: resource.into(),
        }
    }
}

pub(crate) fn release_from_payloads(
    resource_id: &str,
    resource: SpigetResource,
    latest: SpigetVersion,
) -> Release {
    let download = resource.file.and_then(|file| {
        file.url
            .filter(|url| !url.is_empty())
            .map(|url| format!("{SPIGOT_BASE}/{}", url.trim_start_matches('/')))
            .or(file.external_url)
    });
    let changelog = resource.updates.first().map(|update| {
        format!(
            "{SPIGOT_BASE}/resources/{resource_id}/update?update={}",
            update.id
        )
    });
    let price = resource.price.filter(|price| *price > 0.0).map(|price| {
        match resource.currency.as_deref().map(str::trim) {
            Some(currency) if !currency.is_empty() => format!("{price:.2} {currency}"),
            _ => format!("{price:.2}"),
        }
    });
    let contributors = resource
        .contributors
        .as_deref()
        .map(|list| list.split(',').map(str::to_string).collect::<Vec<_>>())
        .unwrap_or_default();

    let mut release = Release::new(Version::parse(&latest.name))
        .with_contributors(contributors)
        .with_commercial(price, resource.premium);
    if let Some(download) = download {
        release = release.with_download_link(download);
    }
    if let Some(changelog) = changelog {
        release = release.with_changelog_link(changelog);
    }
    if let Some(donation) = resource.donation_link {
        release = release.with_donation_link(donation);
    }
    release
}

#[async_trait]
impl Provider for SpigetProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch(&self, transport: &dyn HttpTransport) -> Result<Release, ProviderError> {
        let id = self.resource.as_str();
        let resource: SpigetResource = ProviderConnection::open(transport, NAME, RESOURCE_URL, &[id])
            .await?
            .json()
            .await?;
        let latest: SpigetVersion =
            ProviderConnection::open(transport, NAME, LATEST_VERSION_URL, &[id])
                .await?
                .json()
                .await?;

        if latest.name.trim().is_empty() {
            return Err(ProviderError::not_found(
                NAME,
                format!("resource {id} has no published version"),
            ));
        }

        Ok(release_from_payloads(id, resource, latest))
    }
}

#[cfg(test)]
mod tests {
    use beacon_core::testing::CannedTransport;
    use beacon_core::{Provider, ProviderError, Version};
    use serde_json::json;

    use super::{SpigetProvider, SpigetResource, SpigetVersion, release_from_payloads};

    fn resource(value: &serde_json::Value) -> SpigetResource {
        serde_json::from_value(value.clone()).expect("fixture should deserialize")
    }

    #[test]
    fn free_resource_maps_links_and_contributors() {
        let payload = resource(&json!({
            "file": { "url": "resources/example.1234/download?version=555" },
            "updates": [{ "id": 9001 }, { "id": 8000 }],
            "price": 0.0,
            "premium": false,
            "donationLink": "https://paypal.me/example",
            "contributors": "alice, bob"
        }));
        let release = release_from_payloads(
            "1234",
            payload,
            SpigetVersion {
                name: "3.2.1".to_string(),
            },
        );

        assert_eq!(release.version, Version::parse("3.2.1"));
        assert_eq!(
            release.download_link.as_deref(),
            Some("https://www.spigotmc.org/resources/example.1234/download?version=555")
        );
        assert_eq!(
            release.changelog_link.as_deref(),
            Some("https://www.spigotmc.org/resources/1234/update?update=9001")
        );
        assert_eq!(release.donation_link.as_deref(), Some("https://paypal.me/example"));
        assert!(release.contributors.contains("alice"));
        assert!(release.contributors.contains("bob"));
        assert!(!release.is_premium());
        assert!(release.price().is_none());
    }

    #[test]
    fn premium_resource_reports_price_with_currency() {
        let payload = resource(&json!({
            "file": { "url": "" , "externalUrl": "https://builds.example.com/latest.jar" },
            "price": 7.5,
            "currency": "EUR",
            "premium": true
        }));
        let release = release_from_payloads(
            "77",
            payload,
            SpigetVersion {
                name: "1.0".to_string(),
            },
        );

        assert!(release.is_premium());
        assert_eq!(release.price(), Some("7.50 EUR"));
        assert_eq!(
            release.download_link.as_deref(),
            Some("https://builds.example.com/latest.jar")
        );
        assert!(release.changelog_link.is_none());
    }

    #[tokio::test]
    async fn fetch_combines_resource_and_latest_version() {
        let transport = CannedTransport::new()
            .with_json(
                "https://api.spiget.org/v2/resources/42",
                200,
                &json!({ "file": { "url": "resources/a.42/download" }, "updates": [{ "id": 1 }] }),
            )
            .with_json(
                "https://api.spiget.org/v2/resources/42/versions/latest",
                200,
                &json!({ "name": "5.0.0", "id": 3 }),
            );

        let release = SpigetProvider::new(42_u32)
            .fetch(&transport)
            .await
            .expect("fetch should succeed");
        assert_eq!(release.version, Version::parse("5"));
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn missing_resource_is_not_found() {
        let transport =
            CannedTransport::new().with_text("https://api.spiget.org/v2/resources/0", 404, "");
        let error = SpigetProvider::new(0_u32)
            .fetch(&transport)
            .await
            .expect_err("missing resource should fail");
        assert!(matches!(error, ProviderError::NotFound { .. }));
    }
}
