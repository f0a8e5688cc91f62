use super::{File, Host};
use serde::{Deserialize, Serialize};

/// An individual account on a hosting platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub xid: String,
    pub host: Host,
    pub name: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub locale: Option<String>,
    pub description: Option<String>,
    pub avatar: Option<File>,
    pub url: Option<String>,
}

/// An organization or initiative on a hosting platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub xid: String,
    pub host: Host,
    pub name: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub description: Option<String>,
    pub members: Vec<Owner>,
    pub avatar: Option<File>,
    pub url: Option<String>,
}

/// The owner of a repository, product or release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Owner {
    User(User),
    Group(Group),
}

impl Owner {
    #[must_use]
    pub fn xid(&self) -> &str {
        match self {
            Self::User(u) => &u.xid,
            Self::Group(g) => &g.xid,
        }
    }

    #[must_use]
    pub const fn host(&self) -> &Host {
        match self {
            Self::User(u) => &u.host,
            Self::Group(g) => &g.host,
        }
    }

    /// The account name (login or slug).
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::User(u) => &u.name,
            Self::Group(g) => &g.name,
        }
    }

    #[must_use]
    pub const fn avatar(&self) -> Option<&File> {
        match self {
            Self::User(u) => u.avatar.as_ref(),
            Self::Group(g) => g.avatar.as_ref(),
        }
    }

    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::User(u) => u.url.as_deref(),
            Self::Group(g) => g.url.as_deref(),
        }
    }

    #[must_use]
    pub const fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }
}
