//! The open hardware data model produced by the crawler.

mod crawler_meta;
mod license;
mod owner;
mod product;
mod product_id;
mod product_url;
mod repository;

pub use crawler_meta::CrawlerMeta;
pub use license::{License, LicenseType};
pub use owner::{Group, Owner, User};
pub use product::{Component, Product, ProductState, Tag};
pub use product_id::ProductId;
pub use product_url::ProductUrl;
pub use repository::{File, Host, Repository};
