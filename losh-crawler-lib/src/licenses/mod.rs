//! License catalog and lookup.
//!
//! [`LicenseCache`] holds an in-memory index over the license catalog delivered
//! by a [`LicenseProvider`]. The catalog used in production comes from the SPDX
//! license list ([`SpdxProvider`]).

mod cache;
mod normalize;
mod provider;
mod spdx_org;

pub use cache::LicenseCache;
pub use normalize::normalize_name;
pub use provider::{LicenseProvider, fetch_licenses_with_text};
pub use spdx_org::{MAX_LICENSE_DETAILS_SIZE, SPDX_LICENSE_LIST_URL, SpdxProvider};
