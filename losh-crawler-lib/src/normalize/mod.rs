//! Platform independent building blocks for normalizing crawled data.

mod components;
mod documents;
mod file_formats;
mod text;
mod xid;

pub use components::{PartFiles, bucket_parts};
pub use documents::{DocumentKind, document_key, find_root_document, is_housekeeping_file, is_root_file};
pub use file_formats::FileKind;
pub use text::{detect_language, strip_html};
pub use xid::as_xid;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::models::{CrawlerMeta, File, Host, Owner, Repository, User};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    pub fn repository() -> Arc<Repository> {
        let host = Host::new("wikifactory.com", "Wikifactory");
        Arc::new(Repository {
            xid: "wikifactory.com/jdoe/spinner/v1/-".into(),
            url: "https://wikifactory.com/jdoe/spinner".into(),
            perma_url: None,
            host: host.clone(),
            owner: Owner::User(User {
                xid: "wikifactory.com/jdoe".into(),
                host,
                name: "jdoe".into(),
                full_name: None,
                email: None,
                locale: None,
                description: None,
                avatar: None,
                url: None,
            }),
            name: "spinner".into(),
            reference: Some("v1".into()),
            path: None,
        })
    }

    /// A file at `path` with placeholder metadata.
    pub fn file(path: &str) -> File {
        let timestamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        File {
            xid: path.into(),
            path: path.into(),
            name: path.rsplit('/').next().unwrap_or(path).into(),
            mime_type: None,
            url: None,
            created_at: None,
            meta: CrawlerMeta::new(timestamp, repository()),
        }
    }
}
