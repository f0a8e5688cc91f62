//! Structural checks on crawled data.
//!
//! [`Validator::validate_mandatory`] runs on the handful of fields a platform
//! listing provides cheaply, before the full project is fetched.
//! [`Validator::validate_product`] checks the normalized product graph before it
//! is persisted. Both report every violation they find, not just the first one.

use crate::licenses::LicenseCache;
use crate::models::Product;
use core::fmt::{Display, Formatter};
use language_tags::LanguageTag;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

/// Open Know-How specification versions a manifest may declare.
const KNOWN_OKH_VERSIONS: [&str; 2] = ["OKHv1.0", "OKH-LOSHv1.0"];

/// The minimal set of fields a product must have to be worth crawling in full.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MandatoryFields {
    pub okhv: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub repository: String,
    pub license: String,
    pub licensor: String,
    pub documentation_language: String,
}

/// All violations found while validating one product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    messages: Vec<String>,
}

impl ValidationError {
    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    fn add(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    fn into_result(self) -> Result<(), Self> {
        if self.messages.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.messages.join("; "))
    }
}

impl core::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub struct Validator {
    licenses: Arc<LicenseCache>,
}

impl Validator {
    #[must_use]
    pub const fn new(licenses: Arc<LicenseCache>) -> Self {
        Self { licenses }
    }

    pub fn validate_mandatory(&self, fields: &MandatoryFields) -> Result<(), ValidationError> {
        let mut error = ValidationError::default();

        if !KNOWN_OKH_VERSIONS.contains(&fields.okhv.trim()) {
            error.add("invalid OKH version");
        }
        if fields.name.trim().is_empty() {
            error.add("invalid name");
        }
        if fields.description.trim().is_empty() {
            error.add("invalid description");
        }
        if fields.version.trim().is_empty() {
            error.add("invalid version");
        }
        if !is_full_url(&fields.repository) {
            error.add("invalid repository");
        }
        // no license at all is acceptable, an unknown one is not
        if !fields.license.trim().is_empty() && self.licenses.resolve(&fields.license).is_none() {
            error.add("invalid license");
        }
        if fields.licensor.trim().is_empty() {
            error.add("invalid licensor");
        }
        if !is_language_tag(&fields.documentation_language) {
            error.add("invalid documentation language");
        }

        error.into_result()
    }

    pub fn validate_product(&self, product: &Product) -> Result<(), ValidationError> {
        let mut error = ValidationError::default();

        if product.xid.trim().is_empty() {
            error.add("invalid xid");
        }
        if product.name.trim().is_empty() {
            error.add("invalid name");
        }

        let latest: Vec<_> = product.releases.iter().enumerate().filter(|(_, r)| r.is_latest).map(|(i, _)| i).collect();
        if product.releases.is_empty() {
            error.add("missing releases");
        } else if latest != [0] {
            error.add("invalid latest release");
        }

        for release in &product.releases {
            let files = [
                &release.readme,
                &release.contribution_guide,
                &release.bom,
                &release.manufacturing_instructions,
                &release.user_manual,
            ];
            if files
                .into_iter()
                .flatten()
                .any(|file| !Arc::ptr_eq(file.meta.data_source(), &release.repository))
            {
                error.add(format!("invalid data source of files in release {}", release.xid));
            }
        }

        error.into_result()
    }
}

fn is_full_url(s: &str) -> bool {
    Url::parse(s.trim()).is_ok_and(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty()))
}

fn is_language_tag(s: &str) -> bool {
    let s = s.trim();
    !s.is_empty() && LanguageTag::parse(s).is_ok()
}
