use super::ProductUrl;
use crate::Result;
use core::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};

/// Addresses a product on its hosting platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId {
    platform: String,
    owner: String,
    repo: String,
    path: String,
}

impl ProductId {
    #[must_use]
    pub fn new(platform: impl Into<String>, owner: impl Into<String>, repo: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            owner: owner.into(),
            repo: repo.into(),
            path: path.into(),
        }
    }

    /// Derive the id from any URL pointing into the product's repository.
    pub fn from_url(url: &str) -> Result<Self> {
        let url = ProductUrl::parse(url)?;
        Ok(Self::new(url.domain, url.owner, url.repo, url.path))
    }

    #[must_use]
    pub fn platform(&self) -> &str {
        &self.platform
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn repo(&self) -> &str {
        &self.repo
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Display for ProductId {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.platform)?;
        for part in [&self.owner, &self.repo, &self.path] {
            if !part.is_empty() {
                write!(f, "/{part}")?;
            }
        }
        Ok(())
    }
}
