//! Wikifactory support.
//!
//! [`WikifactoryClient`] fetches projects over the GraphQL API and
//! [`Normalizer`] maps them into the product data model.

mod client;
mod licenses;
mod normalizer;

pub use client::{
    Connection, Contribution, Creator, Edge, FileEntry, FullProject, GroupInfo, MinimalProject, PageInfo, ParentContent, Profile,
    ProjectPage, WIKIFACTORY_GRAPHQL_ENDPOINT, WfFile, WfLicense, WfTag, WikifactoryClient,
};
pub use licenses::translate_license;
pub use normalizer::{Normalizer, OwnerDraft, WIKIFACTORY_DOMAIN};
