use super::{CrawlerMeta, File, License, Owner, Repository};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use strum::Display;

static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9_.+-]+$").expect("invalid regex"));

const MAX_TAG_LEN: usize = 128;

/// A part of a product, or one release of a whole product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub xid: String,
    pub name: String,
    pub description: Option<String>,
    pub owner: Owner,
    pub version: String,
    pub created_at: Option<DateTime<Utc>>,
    pub is_latest: bool,
    pub license: Option<Arc<License>>,
    pub licensor: Owner,
    pub documentation_language: String,
    pub repository: Arc<Repository>,
    pub image: Option<File>,
    pub readme: Option<File>,
    pub contribution_guide: Option<File>,
    pub bom: Option<File>,
    pub manufacturing_instructions: Option<File>,
    pub user_manual: Option<File>,

    /// The editable design file of the part.
    pub source: Option<File>,

    /// Files derived from the source, like STL or STEP exports.
    pub export: Vec<File>,
    pub subcomponents: Vec<Component>,
    pub meta: CrawlerMeta,
}

/// Whether a product is still being worked on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum ProductState {
    Active,
    Inactive,
    #[default]
    Undetermined,
}

/// A free-form keyword attached to a product.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
}

impl Tag {
    /// Normalize a raw keyword, returning `None` if it does not make a usable tag.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let name = raw.trim().to_lowercase();
        if name.is_empty() || name.len() > MAX_TAG_LEN || !TAG_REGEX.is_match(&name) {
            return None;
        }
        Some(Self { name })
    }
}

/// A hardware product with all of its releases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub xid: String,
    pub name: String,
    pub owner: Owner,
    pub description: Option<String>,
    pub documentation_language: String,
    pub version: String,
    pub license: Option<Arc<License>>,
    pub licensor: Owner,
    pub website: Option<String>,
    pub state: ProductState,
    pub last_updated_at: Option<DateTime<Utc>>,

    /// Newest first; the first entry is the latest release.
    pub releases: Vec<Component>,
    pub forks: Vec<Product>,
    pub fork_count: u64,
    pub star_count: u64,
    pub tags: Vec<Tag>,
    pub meta: CrawlerMeta,
}

impl Product {
    #[must_use]
    pub fn latest_release(&self) -> Option<&Component> {
        self.releases.first()
    }
}
