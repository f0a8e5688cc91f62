use crate::Result;
use crate::models::License;
use crate::net::CallContext;
use async_trait::async_trait;
use core::fmt::Debug;
use futures_util::{StreamExt, stream};

const LOG_TARGET: &str = "  licenses";

/// Number of license texts fetched in parallel during a bulk refresh.
const TEXT_FETCH_CONCURRENCY: usize = 8;

/// Source of license metadata.
#[async_trait]
pub trait LicenseProvider: Debug + Send + Sync {
    /// All known licenses with base metadata only (no license texts).
    async fn get_all_licenses(&self, ctx: &CallContext) -> Result<Vec<License>>;

    /// A single license, including its text when the provider has one.
    async fn get_license(&self, ctx: &CallContext, id: &str) -> Result<License>;
}

/// Fetch the whole catalog and then each license's text.
///
/// A license whose text cannot be fetched is logged and left out of the result;
/// the refresh only fails if the catalog itself cannot be fetched or the context
/// is cancelled.
pub async fn fetch_licenses_with_text(provider: &dyn LicenseProvider, ctx: &CallContext) -> Result<Vec<License>> {
    let base = provider.get_all_licenses(ctx).await?;
    let total = base.len();
    log::info!(target: LOG_TARGET, "fetching texts for {total} licenses");

    let fetched: Vec<_> = stream::iter(base)
        .map(|license| async move {
            if license.details_url.is_none() {
                return Some(license);
            }

            match provider.get_license(ctx, &license.xid).await {
                Ok(full) => Some(full),
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "skipping license {}: unable to fetch its text: {e:#}", license.xid);
                    None
                }
            }
        })
        .buffered(TEXT_FETCH_CONCURRENCY)
        .collect()
        .await;

    ctx.check()?;

    let licenses: Vec<_> = fetched.into_iter().flatten().collect();
    log::info!(target: LOG_TARGET, "fetched {} of {total} licenses", licenses.len());
    Ok(licenses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LicenseType;
    use ohno::bail;

    #[derive(Debug)]
    struct FlakyProvider;

    fn license(id: &str, details: bool) -> License {
        License {
            details_url: details.then(|| format!("https://example.org/{id}.json")),
            ..License::new(id, id)
        }
    }

    #[async_trait]
    impl LicenseProvider for FlakyProvider {
        async fn get_all_licenses(&self, _ctx: &CallContext) -> Result<Vec<License>> {
            Ok(vec![license("MIT", true), license("BROKEN", true), license("NO-DETAILS", false)])
        }

        async fn get_license(&self, _ctx: &CallContext, id: &str) -> Result<License> {
            if id == "BROKEN" {
                bail!("server exploded");
            }
            Ok(License {
                text: Some(format!("text of {id}")),
                license_type: LicenseType::Permissive,
                ..license(id, true)
            })
        }
    }

    #[tokio::test]
    async fn failed_text_fetch_skips_only_that_license() {
        let licenses = fetch_licenses_with_text(&FlakyProvider, &CallContext::new()).await.unwrap();

        let ids: Vec<_> = licenses.iter().map(|l| l.xid.as_str()).collect();
        assert_eq!(ids, ["MIT", "NO-DETAILS"]);
        assert_eq!(licenses[0].text.as_deref(), Some("text of MIT"));
        assert_eq!(licenses[1].text, None);
    }

    #[tokio::test]
    async fn cancelled_refresh_fails() {
        let ctx = CallContext::new();
        ctx.cancel();
        assert!(fetch_licenses_with_text(&FlakyProvider, &ctx).await.is_err());
    }
}
