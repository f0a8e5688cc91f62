use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Copyleft strength of a license.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum LicenseType {
    Strong,
    Weak,
    Permissive,
    #[default]
    Unknown,
}

/// A software or hardware license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct License {
    /// The license's short identifier, an SPDX id for SPDX licenses.
    pub xid: String,
    pub name: String,
    pub reference_url: Option<String>,

    /// Where the full license text can be fetched from.
    pub details_url: Option<String>,
    pub is_spdx: bool,
    pub is_deprecated: bool,
    pub is_osi_approved: bool,
    pub is_fsf_libre: bool,

    /// Licenses that do not qualify as open source hardware licenses.
    pub is_blocked: bool,

    #[serde(rename = "type")]
    pub license_type: LicenseType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_html: Option<String>,
}

impl License {
    /// A license with the given id and name and every other field empty.
    #[must_use]
    pub fn new(xid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            xid: xid.into(),
            name: name.into(),
            reference_url: None,
            details_url: None,
            is_spdx: false,
            is_deprecated: false,
            is_osi_approved: false,
            is_fsf_libre: false,
            is_blocked: false,
            license_type: LicenseType::Unknown,
            text: None,
            text_html: None,
        }
    }
}
