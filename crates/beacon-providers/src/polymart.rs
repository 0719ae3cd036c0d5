use async_trait::async_trait;
use beacon_core::{
    HttpTransport, Provider, ProviderConnection, ProviderError, Release, ResourceId, Version,
};
use serde::Deserialize;
use serde_json::Value;

const NAME: &str = "Polymart";
const RESOURCE_INFO_URL: &str = "https://api.polymart.org/v1/getResourceInfo/resource_id={0}";

#[derive(Debug, Deserialize)]
pub(crate) struct PolymartEnvelope {
    #[serde(default)]
    response: Option<PolymartResponse>,
}

#[derive(Debug, Deserialize)]
struct PolymartResponse {
    #[serde(default)]
    resource: Option<PolymartResource>,
}

#[derive(Debug, Deserialize)]
struct PolymartResource {
    #[serde(default)]
    owner: Option<PolymartOwner>,
    #[serde(default)]
    price: Value,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    url: Option<String>,
    updates: PolymartUpdates,
}

#[derive(Debug, Deserialize)]
struct PolymartOwner {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PolymartUpdates {
    latest: PolymartLatest,
}

#[derive(Debug, Deserialize)]
struct PolymartLatest {
    version: String,
}

#[derive(Debug, Clone)]
pub struct PolymartProvider {
    resource: ResourceId,
}

impl PolymartProvider {
    #[must_use]
    pub fn new(resource: impl Into<ResourceId>) -> Self {
        Self {
            resource: resource.into(),
        }
    }
}

fn price_text(price: &Value) -> Option<String> {
    match price {
        Value::String(text) => Some(text.trim().to_string()).filter(|text| !text.is_empty()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn is_free(price: &str) -> bool {
    price.parse::<f64>().is_ok_and(|amount| amount <= 0.0)
}

pub(crate) fn release_from_envelope(
    resource_id: &str,
    envelope: PolymartEnvelope,
) -> Result<Release, ProviderError> {
    let Some(resource) = envelope.response.and_then(|response| response.resource) else {
        return Err(ProviderError::not_found(
            NAME,
            format!("resource {resource_id} does not exist"),
        ));
    };

    let price = price_text(&resource.price);
    let premium = price.as_deref().is_some_and(|price| !is_free(price));
    let display_price = price.filter(|_| premium).map(|price| {
        match resource.currency.as_deref().map(str::trim) {
            Some(currency) if !currency.is_empty() => format!("{price} {currency}"),
            _ => price,
        }
    });

    let mut release = Release::new(Version::parse(&resource.updates.latest.version))
        .with_commercial(display_price, premium)
        .with_contributors(resource.owner.map(|owner| owner.name));

    if let Some(url) = resource.url {
        let download = url.split(['?', '#']).next().unwrap_or(&url).to_string();
        release = release
            .with_changelog_link(format!("{download}/updates"))
            .with_download_link(download);
    }
    Ok(release)
}

#[async_trait]
impl Provider for PolymartProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch(&self, transport: &dyn HttpTransport) -> Result<Release, ProviderError> {
        let id = self.resource.as_str();
        let envelope: PolymartEnvelope =
            ProviderConnection::open(transport, NAME, RESOURCE_INFO_URL, &[id])
                .await?
                .json()
                .await?;
        release_from_envelope(id, envelope)
    }
}

#[cfg(test)]
mod tests {
    use beacon_core::{ProviderError, Version};
    use serde_json::json;

    use super::{PolymartEnvelope, release_from_envelope};

    fn envelope(value: &serde_json::Value) -> PolymartEnvelope {
        serde_json::from_value(value.clone()).expect("fixture should deserialize")
    }

    #[test]
    fn paid_resource_is_premium_with_currency() {
        let payload = envelope(&json!({
            "response": {
                "success": true,
                "resource": {
                    "owner": { "name": "Steve" },
                    "price": "9.99",
                    "currency": "USD",
                    "url": "https://polymart.org/resource/example.321?utm=feed",
                    "updates": { "latest": { "version": "1.5.2" } }
                }
            }
        }));

        let release = release_from_envelope("321", payload).expect("resource should parse");
        assert_eq!(release.version, Version::parse("1.5.2"));
        assert!(release.is_premium());
        assert_eq!(release.price(), Some("9.99 USD"));
        assert_eq!(
            release.download_link.as_deref(),
            Some("https://polymart.org/resource/example.321")
        );
        assert_eq!(
            release.changelog_link.as_deref(),
            Some("https://polymart.org/resource/example.321/updates")
        );
        assert!(release.contributors.contains("Steve"));
    }

    #[test]
    fn zero_price_is_not_premium() {
        for price in [json!("0.00"), json!(0), json!(null)] {
            let payload = envelope(&json!({
                "response": { "resource": {
                    "price": price.clone(),
                    "updates": { "latest": { "version": "1.0" } }
                } }
            }));
            let release = release_from_envelope("1", payload).expect("resource should parse");
            assert!(!release.is_premium(), "price {price} should be free");
            assert!(release.price().is_none());
        }
    }

    #[test]
    fn price_ending_in_zero_cents_is_still_premium() {
        let payload = envelope(&json!({
            "response": { "resource": {
                "price": "10.00",
                "updates": { "latest": { "version": "1.0" } }
            } }
        }));
        let release = release_from_envelope("1", payload).expect("resource should parse");
        assert!(release.is_premium());
        assert_eq!(release.price(), Some("10.00"));
    }

    #[test]
    fn missing_resource_is_not_found() {
        let payload = envelope(&json!({ "response": { "success": false } }));
        assert!(matches!(
            release_from_envelope("404", payload),
            Err(ProviderError::NotFound { .. })
        ));
    }
}
