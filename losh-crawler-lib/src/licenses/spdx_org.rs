//! License provider backed by the SPDX license list.
//!
//! The list itself (`licenses.json`) carries the base metadata of every license.
//! Each entry points at a details document holding the license text. Two flags
//! the list does not carry (whether a license is blocked for open hardware and
//! its copyleft strength) come from an embedded table.

use super::LicenseProvider;
use crate::Result;
use crate::models::{License, LicenseType};
use crate::net::{CallContext, Downloader};
use async_trait::async_trait;
use ohno::{IntoAppError, bail};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use url::Url;

const LOG_TARGET: &str = "      spdx";

pub const SPDX_LICENSE_LIST_URL: &str = "https://raw.githubusercontent.com/spdx/license-list-data/master/json/licenses.json";

const MAX_LICENSE_LIST_SIZE: u64 = 16 * 1024 * 1024;
/// Default size limit of a single license details document.
pub const MAX_LICENSE_DETAILS_SIZE: u64 = 4 * 1024 * 1024;

const LICENSE_EXTRAS_JSON: &str = include_str!("license_extras.json");

#[derive(Debug, Deserialize)]
struct SpdxLicenseList {
    licenses: Vec<SpdxLicense>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpdxLicense {
    license_id: String,
    name: String,
    #[serde(default)]
    reference: String,
    #[serde(default)]
    details_url: String,
    #[serde(default)]
    is_deprecated_license_id: bool,
    #[serde(default)]
    is_osi_approved: bool,
    #[serde(default)]
    is_fsf_libre: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpdxLicenseDetails {
    #[serde(default)]
    license_text: Option<String>,
    #[serde(default)]
    license_text_html: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LicenseExtras {
    licenses: Vec<LicenseExtra>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LicenseExtraFlags {
    #[serde(default)]
    is_blocked: bool,
    #[serde(rename = "type", default)]
    license_type: LicenseType,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LicenseExtra {
    license_id: String,
    #[serde(flatten)]
    flags: LicenseExtraFlags,
}

/// Downloads licenses from the SPDX license list.
///
/// The most recently downloaded list is kept so fetching the texts of many
/// licenses downloads the list only once.
#[derive(Debug)]
pub struct SpdxProvider {
    downloader: Downloader,
    list_url: Url,
    max_details_size: u64,
    extras: HashMap<String, LicenseExtraFlags>,
    last_list: RwLock<Option<Arc<Vec<License>>>>,
}

impl SpdxProvider {
    pub fn new(downloader: Downloader) -> Result<Self> {
        Self::with_list_url(downloader, SPDX_LICENSE_LIST_URL)
    }

    /// Use a license list at a different location.
    pub fn with_list_url(downloader: Downloader, list_url: &str) -> Result<Self> {
        let list_url = Url::parse(list_url).into_app_err_with(|| format!("invalid license list URL '{list_url}'"))?;
        let extras: LicenseExtras = serde_json::from_str(LICENSE_EXTRAS_JSON).into_app_err("parsing embedded license metadata")?;

        Ok(Self {
            downloader,
            list_url,
            max_details_size: MAX_LICENSE_DETAILS_SIZE,
            extras: extras.licenses.into_iter().map(|e| (e.license_id, e.flags)).collect(),
            last_list: RwLock::new(None),
        })
    }

    /// Limit the size of each license details document.
    #[must_use]
    pub fn with_max_details_size(mut self, max_details_size: u64) -> Self {
        self.max_details_size = max_details_size;
        self
    }

    fn to_license(&self, spdx: SpdxLicense) -> License {
        let flags = self.extras.get(&spdx.license_id).copied().unwrap_or_default();
        let details_url = non_empty(spdx.details_url).and_then(|u| match self.list_url.join(&u) {
            Ok(resolved) => Some(resolved.to_string()),
            Err(e) => {
                log::debug!(target: LOG_TARGET, "ignoring invalid details URL '{u}' of {}: {e}", spdx.license_id);
                None
            }
        });

        License {
            reference_url: non_empty(spdx.reference),
            details_url,
            is_spdx: true,
            is_deprecated: spdx.is_deprecated_license_id,
            is_osi_approved: spdx.is_osi_approved,
            is_fsf_libre: spdx.is_fsf_libre,
            is_blocked: flags.is_blocked,
            license_type: flags.license_type,
            ..License::new(spdx.license_id, spdx.name)
        }
    }

    async fn base_licenses(&self, ctx: &CallContext) -> Result<Arc<Vec<License>>> {
        log::debug!(target: LOG_TARGET, "downloading license list from {}", self.list_url);

        let content = self
            .downloader
            .download_content(ctx, self.list_url.as_str(), Some(MAX_LICENSE_LIST_SIZE))
            .await
            .into_app_err("downloading the SPDX license list")?;

        let list: SpdxLicenseList = serde_json::from_slice(&content).into_app_err("parsing the SPDX license list")?;
        let licenses: Arc<Vec<License>> = Arc::new(list.licenses.into_iter().map(|l| self.to_license(l)).collect());
        *self.last_list.write().expect("lock not poisoned") = Some(Arc::clone(&licenses));
        Ok(licenses)
    }

    async fn cached_licenses(&self, ctx: &CallContext) -> Result<Arc<Vec<License>>> {
        let cached = self.last_list.read().expect("lock not poisoned").clone();
        match cached {
            Some(licenses) => Ok(licenses),
            None => self.base_licenses(ctx).await,
        }
    }

    async fn license_details(&self, ctx: &CallContext, url: &str) -> Result<SpdxLicenseDetails> {
        let content = self
            .downloader
            .download_content(ctx, url, Some(self.max_details_size))
            .await
            .into_app_err_with(|| format!("downloading license details from {url}"))?;

        serde_json::from_slice(&content).into_app_err_with(|| format!("parsing license details from {url}"))
    }
}

#[async_trait]
impl LicenseProvider for SpdxProvider {
    async fn get_all_licenses(&self, ctx: &CallContext) -> Result<Vec<License>> {
        Ok(self.base_licenses(ctx).await?.as_ref().clone())
    }

    async fn get_license(&self, ctx: &CallContext, id: &str) -> Result<License> {
        let Some(mut license) = self
            .cached_licenses(ctx)
            .await?
            .iter()
            .find(|l| l.xid.eq_ignore_ascii_case(id))
            .cloned()
        else {
            bail!("license '{id}' is not in the SPDX license list");
        };

        if let Some(url) = &license.details_url {
            log::debug!(target: LOG_TARGET, "downloading license text of {}", license.xid);
            let details = self.license_details(ctx, url).await?;
            license.text = details.license_text;
            license.text_html = details.license_text_html;
        }

        Ok(license)
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() { None } else { Some(s) }
}
