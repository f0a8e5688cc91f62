//! Wikifactory project to open hardware product.

use super::client::{Contribution, FullProject, GroupInfo, MinimalProject, Profile, WfFile};
use super::licenses::translate_license;
use crate::Result;
use crate::licenses::LicenseCache;
use crate::models::{
    Component, CrawlerMeta, File, Group, Host, License, Owner, Product, ProductState, ProductUrl, Repository, Tag, User,
};
use crate::normalize::{DocumentKind, PartFiles, as_xid, bucket_parts, detect_language, find_root_document, strip_html};
use crate::validator::MandatoryFields;
use chrono::{DateTime, TimeDelta, Utc};
use ohno::{app_err, bail};
use std::sync::Arc;

const LOG_TARGET: &str = "normalizer";

pub const WIKIFACTORY_DOMAIN: &str = "wikifactory.com";
const WIKIFACTORY_NAME: &str = "Wikifactory";

/// Manifest version assumed for Wikifactory projects, which do not declare one.
const WIKIFACTORY_OKHV: &str = "OKH-LOSHv1.0";

/// Projects updated less than this long ago are considered active.
const ACTIVE_THRESHOLD: TimeDelta = TimeDelta::days(2 * 365);

fn host() -> Host {
    Host::new(WIKIFACTORY_DOMAIN, WIKIFACTORY_NAME)
}

/// An owner whose avatar is not attached yet.
///
/// An avatar file records the repository it was read from, and that repository
/// only exists once the first release has been built, which in turn needs the
/// owner. The draft breaks the cycle: repositories carry the bare owner from
/// [`Self::base`], and [`Self::finalize`] produces the owner with its avatar.
#[derive(Debug, Clone)]
pub struct OwnerDraft {
    base: Owner,
    avatar: Option<WfFile>,
}

impl OwnerDraft {
    fn user(profile: &Profile) -> Result<Self> {
        let username = non_blank(profile.username.as_deref()).ok_or_else(|| app_err!("project creator has no username"))?;
        let xid = as_xid([WIKIFACTORY_DOMAIN, username]);

        Ok(Self {
            base: Owner::User(User {
                url: Some(format!("https://{xid}")),
                xid,
                host: host(),
                name: username.to_owned(),
                full_name: non_blank(profile.full_name.as_deref()).map(str::to_owned),
                email: non_blank(profile.email.as_deref()).map(str::to_owned),
                locale: non_blank(profile.locale.as_deref()).map(str::to_owned),
                description: non_blank(profile.description.as_deref()).map(str::to_owned),
                avatar: None,
            }),
            avatar: profile.avatar.clone(),
        })
    }

    fn group(info: &GroupInfo) -> Result<Self> {
        let slug = non_blank(Some(&info.slug)).ok_or_else(|| app_err!("group has no slug"))?;
        let xid = as_xid([WIKIFACTORY_DOMAIN, slug]);

        Ok(Self {
            base: Owner::Group(Group {
                url: Some(format!("https://{xid}")),
                xid,
                host: host(),
                name: slug.to_owned(),
                full_name: non_blank(info.title.as_deref()).map(str::to_owned),
                email: None,
                description: non_blank(info.description.as_deref()).map(str::to_owned),
                members: Vec::new(),
                avatar: None,
            }),
            avatar: info.avatar.clone(),
        })
    }

    /// The owner without avatar.
    #[must_use]
    pub const fn base(&self) -> &Owner {
        &self.base
    }

    /// Produce the final owner, with its avatar sourced from `repository`.
    #[must_use]
    pub fn finalize(self, repository: &Arc<Repository>, timestamp: DateTime<Utc>) -> Owner {
        let Some(raw) = self.avatar else {
            return self.base;
        };

        let meta = CrawlerMeta::new(timestamp, Arc::clone(repository));
        let mut avatar = file_from_raw(&raw, raw.filename.clone(), meta);
        avatar.xid = as_xid([WIKIFACTORY_DOMAIN, self.base.name(), "", "", &avatar.path]);

        match self.base {
            Owner::User(user) => Owner::User(User {
                avatar: Some(avatar),
                ..user
            }),
            Owner::Group(group) => Owner::Group(Group {
                avatar: Some(avatar),
                ..group
            }),
        }
    }
}

/// Maps Wikifactory projects into the product data model.
///
/// Performs no I/O; licenses are resolved against the cache handed in.
#[derive(Debug, Clone)]
pub struct Normalizer {
    licenses: Arc<LicenseCache>,
}

impl Normalizer {
    #[must_use]
    pub const fn new(licenses: Arc<LicenseCache>) -> Self {
        Self { licenses }
    }

    /// Extract the fields checked before a project is crawled in full.
    #[must_use]
    pub fn mandatory_fields(&self, project: &MinimalProject) -> MandatoryFields {
        let description = strip_html(project.description.as_deref().unwrap_or_default());
        let licensor = project
            .creator
            .as_ref()
            .and_then(|c| c.profile.as_ref())
            .and_then(|p| p.username.clone())
            .unwrap_or_default();

        MandatoryFields {
            okhv: WIKIFACTORY_OKHV.to_owned(),
            name: project.name.clone().unwrap_or_default(),
            documentation_language: detect_language(&description),
            description,
            version: project.contribution.as_ref().and_then(|c| c.version.clone()).unwrap_or_default(),
            // Wikifactory itself is the repository
            repository: format!("https://{WIKIFACTORY_DOMAIN}"),
            license: project
                .license
                .as_ref()
                .and_then(|l| l.abreviation.as_deref())
                .map(translate_license)
                .unwrap_or_default(),
            licensor,
        }
    }

    /// Build the product from a full project.
    ///
    /// `group` must hold the owning initiative's details when the project
    /// belongs to one. Contributions are taken to be ordered newest first, so
    /// the first one becomes the latest release.
    pub fn normalize(&self, project: &FullProject, group: Option<&GroupInfo>, timestamp: DateTime<Utc>) -> Result<Product> {
        let owner_slug = non_blank(project.parent_slug.as_deref()).ok_or_else(|| app_err!("project has no owner slug"))?;
        let slug = non_blank(project.slug.as_deref()).ok_or_else(|| app_err!("project has no slug"))?;

        let contributions: Vec<&Contribution> = project.contributions.iter().flat_map(|c| c.nodes()).collect();
        if contributions.is_empty() {
            bail!("project {owner_slug}/{slug} has no contributions");
        }

        let draft = if project.is_owned_by_group() {
            let group = group.ok_or_else(|| app_err!("missing details of group '{owner_slug}'"))?;
            OwnerDraft::group(group)?
        } else {
            let profile = project
                .creator
                .as_ref()
                .and_then(|c| c.profile.as_ref())
                .ok_or_else(|| app_err!("project {owner_slug}/{slug} has no creator"))?;
            OwnerDraft::user(profile)?
        };

        let repositories: Vec<Arc<Repository>> = contributions
            .iter()
            .map(|c| Arc::new(repository(draft.base(), owner_slug, slug, c.version.as_deref().unwrap_or_default())))
            .collect();

        let owner = draft.finalize(&repositories[0], timestamp);
        let description = non_blank(Some(&strip_html(project.description.as_deref().unwrap_or_default()))).map(str::to_owned);
        let documentation_language = detect_language(description.as_deref().unwrap_or_default());
        let license = self.license(project);

        // the project image does not change between releases
        let image = project.image.as_ref().map(|raw| {
            let meta = CrawlerMeta::new(timestamp, Arc::clone(&repositories[0]));
            let mut image = file_from_raw(raw, raw.filename.clone(), meta);
            image.xid = as_xid([WIKIFACTORY_DOMAIN, owner.name(), "", "", &image.path]);
            image
        });

        let shared = ReleaseShared {
            name: project.name.as_deref().map(str::trim).unwrap_or_default(),
            description: description.as_deref(),
            documentation_language: &documentation_language,
            license: license.as_ref(),
            owner: &owner,
            image: image.as_ref(),
            timestamp,
        };

        let releases: Vec<Component> = contributions
            .iter()
            .zip(repositories)
            .enumerate()
            .map(|(index, (contribution, repository))| shared.release(contribution, repository, index == 0))
            .collect();

        let latest = &releases[0];
        let product = Product {
            xid: as_xid([WIKIFACTORY_DOMAIN, owner_slug, slug, ""]),
            name: latest.name.clone(),
            owner: owner.clone(),
            description: latest.description.clone(),
            documentation_language: latest.documentation_language.clone(),
            version: latest.version.clone(),
            license: latest.license.clone(),
            licensor: owner,
            website: Some(latest.repository.url.clone()),
            state: product_state(project.last_updated, timestamp),
            last_updated_at: project.last_updated,
            meta: latest.meta.clone(),
            releases,
            forks: Vec::new(),
            fork_count: project.fork_count.unwrap_or_default(),
            star_count: project.star_count.unwrap_or_default(),
            tags: project
                .tags
                .iter()
                .flatten()
                .filter_map(|t| t.name.as_deref().and_then(Tag::parse))
                .collect(),
        };

        log::debug!(target: LOG_TARGET, "normalized {} with {} releases", product.xid, product.releases.len());
        Ok(product)
    }

    fn license(&self, project: &FullProject) -> Option<Arc<License>> {
        let raw = project.license.as_ref()?.abreviation.as_deref()?;
        let id = translate_license(raw);
        if id.is_empty() {
            return None;
        }

        let license = self.licenses.resolve(&id);
        if license.is_none() {
            log::debug!(target: LOG_TARGET, "unable to resolve license '{raw}'");
        }
        license
    }
}

/// Values every release of a project has in common.
struct ReleaseShared<'a> {
    name: &'a str,
    description: Option<&'a str>,
    documentation_language: &'a str,
    license: Option<&'a Arc<License>>,
    owner: &'a Owner,
    image: Option<&'a File>,
    timestamp: DateTime<Utc>,
}

impl ReleaseShared<'_> {
    fn release(&self, contribution: &Contribution, repository: Arc<Repository>, is_latest: bool) -> Component {
        let meta = CrawlerMeta::new(self.timestamp, Arc::clone(&repository));
        let reference = repository.reference.as_deref().unwrap_or_default();

        let files: Vec<File> = contribution
            .files()
            .filter_map(|entry| {
                let raw = entry.file.as_ref()?;
                let path = entry.path()?;
                let mut file = file_from_raw(raw, path, meta.clone());
                file.xid = as_xid([WIKIFACTORY_DOMAIN, self.owner.name(), &repository.name, reference, &file.path]);
                Some(file)
            })
            .collect();

        let subcomponents = bucket_parts(&files)
            .into_iter()
            .map(|part| self.subcomponent(part, contribution, &repository, &meta))
            .collect();

        Component {
            xid: as_xid([WIKIFACTORY_DOMAIN, self.owner.name(), &repository.name, reference, "", self.name]),
            name: self.name.to_owned(),
            description: self.description.map(str::to_owned),
            owner: self.owner.clone(),
            version: reference.to_owned(),
            created_at: contribution.date_created,
            is_latest,
            license: self.license.cloned(),
            licensor: self.owner.clone(),
            documentation_language: self.documentation_language.to_owned(),
            image: self.image.cloned(),
            readme: find_root_document(DocumentKind::Readme, &files).cloned(),
            contribution_guide: find_root_document(DocumentKind::ContributionGuide, &files).cloned(),
            bom: find_root_document(DocumentKind::Bom, &files).cloned(),
            manufacturing_instructions: find_root_document(DocumentKind::ManufacturingInstructions, &files).cloned(),
            user_manual: find_root_document(DocumentKind::UserManual, &files).cloned(),
            source: None,
            export: Vec::new(),
            subcomponents,
            repository,
            meta,
        }
    }

    fn subcomponent(&self, part: PartFiles, contribution: &Contribution, repository: &Arc<Repository>, meta: &CrawlerMeta) -> Component {
        let reference = repository.reference.as_deref().unwrap_or_default();

        Component {
            xid: as_xid([WIKIFACTORY_DOMAIN, self.owner.name(), &repository.name, reference, &part.key]),
            name: part.name,
            description: None,
            owner: self.owner.clone(),
            version: reference.to_owned(),
            created_at: part.source.created_at.or(contribution.date_created),
            is_latest: false,
            license: self.license.cloned(),
            licensor: self.owner.clone(),
            documentation_language: self.documentation_language.to_owned(),
            repository: Arc::clone(repository),
            image: part.image,
            readme: None,
            contribution_guide: None,
            bom: None,
            manufacturing_instructions: None,
            user_manual: None,
            source: Some(part.source),
            export: part.export,
            subcomponents: Vec::new(),
            meta: meta.clone(),
        }
    }
}

fn repository(owner: &Owner, owner_slug: &str, slug: &str, reference: &str) -> Repository {
    let url = ProductUrl::new(WIKIFACTORY_DOMAIN, owner_slug, slug, reference, "");

    Repository {
        xid: as_xid([WIKIFACTORY_DOMAIN, owner_slug, slug, reference, ""]),
        url: url.repository_url(),
        perma_url: url.perma_url(),
        host: host(),
        owner: owner.clone(),
        name: slug.to_owned(),
        reference: (!reference.is_empty()).then(|| reference.to_owned()),
        path: None,
    }
}

/// Build a file with a placeholder xid; callers set the xid for their context.
fn file_from_raw(raw: &WfFile, path: String, meta: CrawlerMeta) -> File {
    File {
        xid: String::new(),
        name: path.rsplit('/').next().unwrap_or(&path).to_owned(),
        path,
        mime_type: non_blank(raw.mime_type.as_deref()).map(str::to_owned),
        url: non_blank(raw.url.as_deref()).map(str::to_owned),
        created_at: raw.date_created,
        meta,
    }
}

fn product_state(last_updated: Option<DateTime<Utc>>, now: DateTime<Utc>) -> ProductState {
    match last_updated {
        Some(updated) if now - updated < ACTIVE_THRESHOLD => ProductState::Active,
        Some(_) => ProductState::Inactive,
        None => ProductState::Undetermined,
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::licenses::LicenseProvider;
    use crate::platforms::wikifactory::client::{ParentContent, WfLicense};
    use crate::net::CallContext;
    use async_trait::async_trait;
    use chrono::TimeZone;

    #[derive(Debug)]
    struct NoProvider;

    #[async_trait]
    impl LicenseProvider for NoProvider {
        async fn get_all_licenses(&self, _ctx: &CallContext) -> Result<Vec<License>> {
            Ok(Vec::new())
        }

        async fn get_license(&self, _ctx: &CallContext, id: &str) -> Result<License> {
            bail!("no license {id}")
        }
    }

    fn normalizer() -> Normalizer {
        let cache = LicenseCache::new(Arc::new(NoProvider));
        let _ = cache.populate([
            License::new("CERN-OHL-1.2", "CERN Open Hardware Licence v1.2"),
            License::new("MIT", "MIT License"),
        ]);
        Normalizer::new(Arc::new(cache))
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn project() -> FullProject {
        serde_json::from_value(serde_json::json!({
            "parentSlug": "jdoe",
            "slug": "spinner",
            "name": " Spinner ",
            "description": "<p>A fidget spinner that is printed in one piece and needs no bearings at all.</p>",
            "parentContent": { "type": "profile", "slug": "jdoe" },
            "creator": { "profile": {
                "username": "jdoe",
                "fullName": "Jane Doe",
                "email": "",
                "description": null,
                "locale": "en",
                "avatar": { "filename": "me.png", "mimeType": "image/png", "url": "https://files/me.png", "dateCreated": null }
            } },
            "license": { "abreviation": "cern ohl" },
            "image": { "filename": "cover.jpg", "mimeType": "image/jpeg", "url": "https://files/cover.jpg", "dateCreated": null },
            "tags": [{ "name": " Toy " }, { "name": "3d printing" }, { "name": null }],
            "forkCount": 3,
            "starCount": 7,
            "lastUpdated": "2024-01-01T00:00:00Z",
            "contributions": { "edges": [
                { "node": { "version": "v2", "dateCreated": "2024-01-01T00:00:00Z", "files": [
                    { "dirname": "", "file": { "filename": "README.md", "mimeType": "text/markdown", "url": "https://files/readme", "dateCreated": null } },
                    { "dirname": "docs", "file": { "filename": "CONTRIBUTING.md", "mimeType": null, "url": null, "dateCreated": null } },
                    { "dirname": "cad", "file": null },
                    { "dirname": "cad", "file": { "filename": "part.FCStd", "mimeType": null, "url": null, "dateCreated": null } },
                    { "dirname": "cad", "file": { "filename": "part.stl", "mimeType": null, "url": null, "dateCreated": null } },
                    { "dirname": "cad", "file": { "filename": "part.png", "mimeType": null, "url": null, "dateCreated": null } }
                ] } },
                { "node": { "version": "v1", "dateCreated": "2023-01-01T00:00:00Z", "files": [] } }
            ] }
        }))
        .unwrap()
    }

    #[test]
    fn normalizes_user_project() {
        let product = normalizer().normalize(&project(), None, now()).unwrap();

        assert_eq!(product.xid, "wikifactory.com/jdoe/spinner/-");
        assert_eq!(product.name, "Spinner");
        assert_eq!(product.version, "v2");
        assert_eq!(product.state, ProductState::Active);
        assert_eq!(product.fork_count, 3);
        assert_eq!(product.star_count, 7);
        assert_eq!(product.website.as_deref(), Some("https://wikifactory.com/jdoe/spinner"));
        assert_eq!(product.documentation_language, "en");
        assert_eq!(
            product.description.as_deref(),
            Some("A fidget spinner that is printed in one piece and needs no bearings at all.")
        );
        assert_eq!(product.license.as_ref().unwrap().xid, "CERN-OHL-1.2");
        assert_eq!(product.tags, [Tag { name: "toy".into() }]);

        assert_eq!(product.owner.xid(), "wikifactory.com/jdoe");
        assert_eq!(product.owner.url(), Some("https://wikifactory.com/jdoe"));
        let Owner::User(user) = &product.owner else {
            panic!("expected a user");
        };
        assert_eq!(user.full_name.as_deref(), Some("Jane Doe"));
        assert_eq!(user.email, None);
    }

    #[test]
    fn releases_are_newest_first() {
        let product = normalizer().normalize(&project(), None, now()).unwrap();

        assert_eq!(product.releases.len(), 2);
        let latest: Vec<_> = product.releases.iter().map(|r| r.is_latest).collect();
        assert_eq!(latest, [true, false]);
        assert_eq!(product.latest_release().unwrap().version, "v2");
        assert_eq!(product.releases[0].xid, "wikifactory.com/jdoe/spinner/v2/-/Spinner");
        assert_eq!(product.releases[1].repository.xid, "wikifactory.com/jdoe/spinner/v1/-");
        assert_eq!(
            product.releases[0].repository.perma_url.as_deref(),
            Some("https://wikifactory.com/jdoe/spinner/contributions/v2")
        );
        assert!(Arc::ptr_eq(product.meta.data_source(), &product.releases[0].repository));
    }

    #[test]
    fn files_point_at_their_release() {
        let product = normalizer().normalize(&project(), None, now()).unwrap();
        let release = &product.releases[0];

        let readme = release.readme.as_ref().unwrap();
        assert_eq!(readme.path, "README.md");
        assert_eq!(readme.xid, "wikifactory.com/jdoe/spinner/v2/README.md");
        assert!(Arc::ptr_eq(readme.meta.data_source(), &release.repository));

        // not at the root
        assert_eq!(release.contribution_guide, None);

        assert_eq!(release.subcomponents.len(), 1);
        let part = &release.subcomponents[0];
        assert_eq!(part.name, "part");
        assert_eq!(part.source.as_ref().unwrap().path, "cad/part.FCStd");
        assert_eq!(part.export.len(), 1);
        assert_eq!(part.image.as_ref().unwrap().name, "part.png");
        assert!(Arc::ptr_eq(part.source.as_ref().unwrap().meta.data_source(), &release.repository));
    }

    #[test]
    fn avatar_is_sourced_from_first_release() {
        let product = normalizer().normalize(&project(), None, now()).unwrap();

        let avatar = product.owner.avatar().unwrap();
        assert_eq!(avatar.xid, "wikifactory.com/jdoe/-/-/me.png");
        assert!(Arc::ptr_eq(avatar.meta.data_source(), &product.releases[0].repository));

        // repositories keep the owner without avatar
        assert!(product.releases[0].repository.owner.avatar().is_none());
        assert_eq!(product.releases[0].repository.owner.xid(), product.owner.xid());

        let image = product.releases[1].image.as_ref().unwrap();
        assert_eq!(image.xid, "wikifactory.com/jdoe/-/-/cover.jpg");
    }

    #[test]
    fn group_owner() {
        let mut project = project();
        project.parent_slug = Some("fablab".into());
        project.parent_content = Some(ParentContent {
            kind: Some("initiative".into()),
            slug: Some("fablab".into()),
        });

        let _ = normalizer().normalize(&project, None, now()).unwrap_err();

        let group = GroupInfo {
            slug: "fablab".into(),
            title: Some("Fab Lab".into()),
            description: Some("  ".into()),
            avatar: None,
        };
        let product = normalizer().normalize(&project, Some(&group), now()).unwrap();
        assert!(product.owner.is_group());
        assert_eq!(product.owner.xid(), "wikifactory.com/fablab");
        assert_eq!(product.xid, "wikifactory.com/fablab/spinner/-");
        assert!(product.owner.avatar().is_none());
        let Owner::Group(group) = &product.owner else {
            panic!("expected a group");
        };
        assert_eq!(group.full_name.as_deref(), Some("Fab Lab"));
        assert_eq!(group.description, None);
    }

    #[test]
    fn unresolved_license_is_empty() {
        let mut project = project();
        project.license = Some(WfLicense {
            abreviation: Some("Some Custom License".into()),
        });

        let product = normalizer().normalize(&project, None, now()).unwrap();
        assert_eq!(product.license, None);
        assert!(product.releases.iter().all(|r| r.license.is_none()));
    }

    #[test]
    fn project_without_contributions_fails() {
        let mut project = project();
        project.contributions = None;
        let _ = normalizer().normalize(&project, None, now()).unwrap_err();
    }

    #[test]
    fn state_from_last_update() {
        let now = now();
        assert_eq!(product_state(Some(now - TimeDelta::days(10)), now), ProductState::Active);
        assert_eq!(product_state(Some(now - TimeDelta::days(800)), now), ProductState::Inactive);
        assert_eq!(product_state(None, now), ProductState::Undetermined);
    }

    #[test]
    fn mandatory_fields_from_listing() {
        let project: MinimalProject = serde_json::from_value(serde_json::json!({
            "parentSlug": "jdoe",
            "slug": "spinner",
            "name": "Spinner",
            "description": "<p></p>",
            "license": { "abreviation": "GPL-3.0" },
            "creator": { "profile": { "username": "jdoe" } },
            "contribution": { "version": "v2", "files": [] }
        }))
        .unwrap();

        let fields = normalizer().mandatory_fields(&project);
        assert_eq!(fields.okhv, "OKH-LOSHv1.0");
        assert_eq!(fields.description, "");
        assert_eq!(fields.documentation_language, "en");
        assert_eq!(fields.license, "GPL-3.0-only");
        assert_eq!(fields.licensor, "jdoe");
        assert_eq!(fields.version, "v2");
        assert_eq!(fields.repository, "https://wikifactory.com");
    }
}
