use beacon_core::testing::CannedTransport;
use beacon_core::{ProviderError, TrackedProvider, TransportError, Version};
use beacon_providers::{PolymartProvider, SpigetProvider, SpigotProvider};
use serde_json::json;

const SPIGET_RESOURCE: &str = "https://api.spiget.org/v2/resources/9089";
const SPIGET_LATEST: &str = "https://api.spiget.org/v2/resources/9089/versions/latest";
const POLYMART_INFO: &str = "https://api.polymart.org/v1/getResourceInfo/resource_id=323";
const SPIGOT_LEGACY: &str = "https://api.spigotmc.org/legacy/update.php?resource=9089";

fn spiget_transport() -> CannedTransport {
    CannedTransport::new()
        .with_json(
            SPIGET_RESOURCE,
            200,
            &json!({
                "file": { "url": "resources/example.9089/download?version=501" },
                "updates": [{ "id": 7788 }],
                "price": 4.5,
                "currency": "USD",
                "premium": true,
                "donationLink": "https://paypal.me/example",
                "contributors": "alex, sam"
            }),
        )
        .with_json(SPIGET_LATEST, 200, &json!({ "name": "3.2.1" }))
}

#[tokio::test]
async fn tracked_spiget_release_exposes_every_link() {
    let transport = spiget_transport();
    let mut provider = TrackedProvider::new(SpigetProvider::new(9089_u32));

    provider
        .fetch(&transport)
        .await
        .expect("spiget payloads should parse");

    assert_eq!(provider.version(), Some(&Version::parse("3.2.1")));
    assert_eq!(
        provider.download_link(),
        Some("https://www.spigotmc.org/resources/example.9089/download?version=501")
    );
    assert_eq!(
        provider.changelog_link(),
        Some("https://www.spigotmc.org/resources/9089/update?update=7788")
    );
    assert_eq!(provider.donation_link(), Some("https://paypal.me/example"));
    assert_eq!(provider.contributors().collect::<Vec<_>>(), vec!["alex", "sam"]);
    assert_eq!(provider.price(), Some("4.50 USD"));
    assert!(provider.is_premium());
    assert_eq!(transport.request_count(SPIGET_RESOURCE), 1);
    assert_eq!(transport.request_count(SPIGET_LATEST), 1);
}

#[tokio::test]
async fn failed_refetch_clears_the_previous_release() {
    let mut provider = TrackedProvider::new(SpigotProvider::new("9089"));

    let online = CannedTransport::new().with_text(SPIGOT_LEGACY, 200, "1.4.2");
    provider
        .fetch(&online)
        .await
        .expect("legacy endpoint should answer");
    assert_eq!(provider.version(), Some(&Version::parse("1.4.2")));

    let offline = CannedTransport::new().with_failure(
        SPIGOT_LEGACY,
        TransportError::Timeout {
            url: SPIGOT_LEGACY.to_string(),
        },
    );
    let error = provider
        .fetch(&offline)
        .await
        .expect_err("timeout should fail the fetch");
    assert!(error.is_retryable());
    assert_eq!(error.provider(), "Spigot");
    assert!(provider.release().is_none());
}

#[tokio::test]
async fn polymart_free_resource_is_not_premium() {
    let transport = CannedTransport::new().with_json(
        POLYMART_INFO,
        200,
        &json!({
            "response": {
                "resource": {
                    "owner": { "name": "Builder" },
                    "price": "0.00",
                    "currency": "USD",
                    "url": "https://polymart.org/resource/example.323?ref=feed",
                    "updates": { "latest": { "version": "5.0" } }
                }
            }
        }),
    );
    let mut provider = TrackedProvider::new(PolymartProvider::new(323_u32));

    provider
        .fetch(&transport)
        .await
        .expect("polymart envelope should parse");

    assert!(!provider.is_premium());
    assert_eq!(provider.price(), None);
    assert_eq!(
        provider.download_link(),
        Some("https://polymart.org/resource/example.323")
    );
    assert_eq!(
        provider.changelog_link(),
        Some("https://polymart.org/resource/example.323/updates")
    );
    assert_eq!(provider.contributors().collect::<Vec<_>>(), vec!["Builder"]);
}

#[tokio::test]
async fn missing_polymart_resource_is_not_found() {
    let transport = CannedTransport::new().with_json(
        POLYMART_INFO,
        200,
        &json!({ "response": { "success": false } }),
    );
    let mut provider = TrackedProvider::new(PolymartProvider::new("323"));

    let error = provider
        .fetch(&transport)
        .await
        .expect_err("missing resource should fail");
    assert!(matches!(error, ProviderError::NotFound { .. }));
    assert!(!error.is_retryable());
}
