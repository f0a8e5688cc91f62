//! Wikifactory GraphQL API client
//!
//! Only the fields the crawler consumes are queried. Wikifactory leaves most
//! fields nullable, so nearly everything is optional here and the normalizer
//! decides what is required.

use crate::net::{CallContext, GraphQlRequester, RequestError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const LOG_TARGET: &str = "    wf-api";

pub const WIKIFACTORY_GRAPHQL_ENDPOINT: &str = "https://wikifactory.com/api/graphql";

macro_rules! file_fields {
    () => {
        "fragment FileFields on File { filename mimeType url dateCreated }\n"
    };
}

macro_rules! mandatory_fields {
    () => {
        "fragment ProjectMandatory on Project {
  parentSlug
  slug
  name
  description
  license { abreviation }
  creator { profile { username } }
  contribution { version files { dirname file { filename } } }
}\n"
    };
}

const GET_PROJECT_MANDATORY: &str = concat!(
    "query GetProjectMandatoryBySlug($space: String!, $slug: String!) {
  project(space: $space, slug: $slug) { result { ...ProjectMandatory } }
}\n",
    mandatory_fields!()
);

const GET_PROJECT_FULL: &str = concat!(
    "query GetProjectFullBySlug($space: String!, $slug: String!) {
  project(space: $space, slug: $slug) { result { ...ProjectFull } }
}
fragment ProjectFull on Project {
  parentSlug
  slug
  name
  description
  parentContent { type slug }
  creator { profile { username fullName email description locale avatar { ...FileFields } } }
  license { abreviation }
  image { ...FileFields }
  tags { name }
  forkCount
  starCount
  lastUpdated
  contributions {
    edges { node { version dateCreated files { dirname file { ...FileFields } } } }
  }
}\n",
    file_fields!()
);

const GET_GROUP: &str = concat!(
    "query GetGroup($slug: String!) {
  initiative(slug: $slug) { result { slug title description avatar { ...FileFields } } }
}\n",
    file_fields!()
);

const QUERY_PROJECTS: &str = concat!(
    "query QueryProjects($first: Int!, $after: String) {
  projects(first: $first, after: $after) {
    result {
      edges { node { ...ProjectMandatory } }
      pageInfo { hasNextPage endCursor }
    }
  }
}\n",
    mandatory_fields!()
);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WfFile {
    pub filename: String,
    pub mime_type: Option<String>,
    pub url: Option<String>,
    pub date_created: Option<DateTime<Utc>>,
}

/// An entry of a contribution's file tree; directories have no `file`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileEntry {
    pub dirname: Option<String>,
    pub file: Option<WfFile>,
}

impl FileEntry {
    /// Path of the file relative to the project root, `None` for directories.
    #[must_use]
    pub fn path(&self) -> Option<String> {
        let file = self.file.as_ref()?;
        match self.dirname.as_deref().map(|d| d.trim_matches('/')) {
            Some(dir) if !dir.is_empty() => Some(format!("{dir}/{}", file.filename)),
            _ => Some(file.filename.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    pub version: Option<String>,
    pub date_created: Option<DateTime<Utc>>,
    pub files: Option<Vec<FileEntry>>,
}

impl Contribution {
    pub fn files(&self) -> impl Iterator<Item = &FileEntry> {
        self.files.iter().flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub description: Option<String>,
    pub locale: Option<String>,
    pub avatar: Option<WfFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Creator {
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ParentContent {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub slug: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WfLicense {
    pub abreviation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WfTag {
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Edge<T> {
    pub node: Option<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Connection<T> {
    pub edges: Option<Vec<Edge<T>>>,
}

impl<T> Connection<T> {
    pub fn nodes(&self) -> impl Iterator<Item = &T> {
        self.edges.iter().flatten().filter_map(|edge| edge.node.as_ref())
    }
}

/// The cheap subset of a project used to decide whether it is worth a full crawl.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinimalProject {
    pub parent_slug: Option<String>,
    pub slug: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub license: Option<WfLicense>,
    pub creator: Option<Creator>,
    pub contribution: Option<Contribution>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullProject {
    pub parent_slug: Option<String>,
    pub slug: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub parent_content: Option<ParentContent>,
    pub creator: Option<Creator>,
    pub license: Option<WfLicense>,
    pub image: Option<WfFile>,
    pub tags: Option<Vec<WfTag>>,
    pub fork_count: Option<u64>,
    pub star_count: Option<u64>,
    pub last_updated: Option<DateTime<Utc>>,
    pub contributions: Option<Connection<Contribution>>,
}

impl FullProject {
    /// Whether the project belongs to an initiative (a group) rather than a user.
    #[must_use]
    pub fn is_owned_by_group(&self) -> bool {
        self.parent_content
            .as_ref()
            .and_then(|p| p.kind.as_deref())
            .is_some_and(|kind| kind.eq_ignore_ascii_case("initiative"))
    }
}

/// Details of an initiative owning projects.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroupInfo {
    pub slug: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub avatar: Option<WfFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

/// One page of the project listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPage {
    pub projects: Vec<MinimalProject>,
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResult<T> {
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ProjectData<T> {
    project: Option<QueryResult<T>>,
}

#[derive(Debug, Deserialize)]
struct InitiativeData {
    initiative: Option<QueryResult<GroupInfo>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectListing {
    edges: Option<Vec<Edge<MinimalProject>>>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
struct ProjectsData {
    projects: Option<QueryResult<ProjectListing>>,
}

#[derive(Debug, Serialize)]
struct SlugVars<'a> {
    space: &'a str,
    slug: &'a str,
}

#[derive(Debug, Serialize)]
struct GroupVars<'a> {
    slug: &'a str,
}

#[derive(Debug, Serialize)]
struct PageVars<'a> {
    first: u32,
    after: Option<&'a str>,
}

/// Typed access to the Wikifactory GraphQL API.
#[derive(Debug, Clone)]
pub struct WikifactoryClient {
    graphql: GraphQlRequester,
}

impl WikifactoryClient {
    #[must_use]
    pub const fn new(graphql: GraphQlRequester) -> Self {
        Self { graphql }
    }

    /// Fetch the fields needed for the mandatory field check, `None` if the project does not exist.
    pub async fn get_minimal_project(&self, ctx: &CallContext, owner: &str, repo: &str) -> Result<Option<MinimalProject>, RequestError> {
        log::debug!(target: LOG_TARGET, "fetching minimal project {owner}/{repo}");
        let data: ProjectData<MinimalProject> = self
            .graphql
            .query(ctx, "GetProjectMandatoryBySlug", GET_PROJECT_MANDATORY, &SlugVars { space: owner, slug: repo })
            .await?;
        Ok(data.project.and_then(|p| p.result))
    }

    /// Fetch the complete project tree, `None` if the project does not exist.
    pub async fn get_full_project(&self, ctx: &CallContext, owner: &str, repo: &str) -> Result<Option<FullProject>, RequestError> {
        log::debug!(target: LOG_TARGET, "fetching full project {owner}/{repo}");
        let data: ProjectData<FullProject> = self
            .graphql
            .query(ctx, "GetProjectFullBySlug", GET_PROJECT_FULL, &SlugVars { space: owner, slug: repo })
            .await?;
        Ok(data.project.and_then(|p| p.result))
    }

    /// Fetch the details of an initiative, `None` if it does not exist.
    pub async fn get_group(&self, ctx: &CallContext, slug: &str) -> Result<Option<GroupInfo>, RequestError> {
        log::debug!(target: LOG_TARGET, "fetching group {slug}");
        let data: InitiativeData = self.graphql.query(ctx, "GetGroup", GET_GROUP, &GroupVars { slug }).await?;
        Ok(data.initiative.and_then(|i| i.result))
    }

    /// Fetch one page of the project listing, starting after `cursor` (from the beginning if empty).
    pub async fn query_projects(&self, ctx: &CallContext, batch_size: u32, cursor: &str) -> Result<ProjectPage, RequestError> {
        log::debug!(target: LOG_TARGET, "listing {batch_size} projects after cursor '{cursor}'");
        let vars = PageVars {
            first: batch_size,
            after: (!cursor.is_empty()).then_some(cursor),
        };
        let data: ProjectsData = self.graphql.query(ctx, "QueryProjects", QUERY_PROJECTS, &vars).await?;

        let Some(listing) = data.projects.and_then(|p| p.result) else {
            return Ok(ProjectPage {
                projects: Vec::new(),
                has_next_page: false,
                end_cursor: None,
            });
        };

        Ok(ProjectPage {
            projects: listing.edges.into_iter().flatten().filter_map(|edge| edge.node).collect(),
            has_next_page: listing.page_info.has_next_page,
            end_cursor: listing.page_info.end_cursor,
        })
    }
}
