use super::{CrawlerMeta, Owner};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A hosting platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Host {
    pub domain: String,
    pub name: String,
}

impl Host {
    #[must_use]
    pub fn new(domain: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            name: name.into(),
        }
    }
}

/// Where crawled data was read from: a repository at a given reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub xid: String,
    pub url: String,
    pub perma_url: Option<String>,
    pub host: Host,

    /// The owner as known before any avatar was attached to it.
    pub owner: Owner,
    pub name: String,
    pub reference: Option<String>,
    pub path: Option<String>,
}

/// A file of a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    pub xid: String,
    pub path: String,
    pub name: String,
    pub mime_type: Option<String>,
    pub url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub meta: CrawlerMeta,
}

impl File {
    /// The file name without its last extension.
    #[must_use]
    pub fn stem(&self) -> &str {
        split_extension(&self.name).0
    }

    /// The last extension of the file name, without the dot.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        split_extension(&self.name).1
    }
}

fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(0) | None => (name, None),
        Some(pos) => (&name[..pos], Some(&name[pos + 1..])),
    }
}
