use crate::Result;
use core::fmt::{Display, Formatter};
use ohno::{IntoAppError, bail};
use url::Url;

/// A URL pointing into a repository on one of the supported hosting platforms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProductUrl {
    pub domain: String,
    pub owner: String,
    pub repo: String,
    pub reference: String,
    pub path: String,
}

impl ProductUrl {
    #[must_use]
    pub fn new(
        domain: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        reference: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            owner: owner.into(),
            repo: repo.into(),
            reference: reference.into(),
            path: path.into(),
        }
    }

    /// Split a platform URL into its parts.
    ///
    /// Recognized forms:
    ///
    /// - `github.com/<owner>/<repo>[/(blob|tree|commit)/<ref>/<path>]`
    /// - `raw.githubusercontent.com/<owner>/<repo>/<ref>/<path>`
    /// - `gitlab.com/<owner>/<repo>[/-/(tree|blob|raw)/<ref>/<path>]`
    /// - `wikifactory.com/<owner>/<repo>[/file[s]/<path>]`, `wikifactory.com/<owner>/<repo>/v/<ref>[/file[s]/<path>]`
    /// - `[certification.]oshwa.org/<id>`
    pub fn parse(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).into_app_err_with(|| format!("invalid URL '{url}'"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("invalid URL '{url}': unsupported scheme '{}'", parsed.scheme());
        }

        let domain = parsed.host_str().unwrap_or_default().to_lowercase();
        let parts: Vec<&str> = parsed
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let mut result = Self::default();
        match domain.as_str() {
            "github.com" => {
                result.domain = "github.com".into();
                owner_and_repo(&mut result, &parts, url)?;
                if parts.len() > 2 {
                    if parts.len() < 4 || !matches!(parts[2], "blob" | "tree" | "commit") {
                        bail!("invalid URL '{url}': unexpected GitHub path");
                    }
                    result.reference = parts[3].into();
                    result.path = parts[4..].join("/");
                }
            }

            "raw.githubusercontent.com" => {
                result.domain = "github.com".into();
                owner_and_repo(&mut result, &parts, url)?;
                if parts.len() < 3 {
                    bail!("invalid URL '{url}': missing reference");
                }
                result.reference = parts[2].into();
                result.path = parts[3..].join("/");
            }

            "gitlab.com" => {
                result.domain = "gitlab.com".into();
                owner_and_repo(&mut result, &parts, url)?;
                if parts.len() > 2 {
                    if parts.len() < 5 || parts[2] != "-" || !matches!(parts[3], "tree" | "blob" | "raw") {
                        bail!("invalid URL '{url}': unexpected GitLab path");
                    }
                    result.reference = parts[4].into();
                    result.path = parts[5..].join("/");
                }
            }

            "wikifactory.com" | "www.wikifactory.com" => {
                result.domain = "wikifactory.com".into();
                owner_and_repo(&mut result, &parts, url)?;
                if parts.len() >= 4 && matches!(parts[2], "file" | "files") {
                    result.path = parts[3..].join("/");
                } else if parts.len() >= 4 && parts[2] == "v" {
                    result.reference = parts[3].into();
                    if parts.len() >= 6 && matches!(parts[4], "file" | "files") {
                        result.path = parts[5..].join("/");
                    }
                }
            }

            "oshwa.org" | "certification.oshwa.org" => {
                result.domain = "oshwa.org".into();
                if parts.len() != 1 {
                    bail!("invalid URL '{url}': expected a single certification id");
                }
                result.path = parts[0].into();
            }

            _ => bail!("unsupported platform '{domain}'"),
        }

        Ok(result)
    }

    /// The URL of the repository's landing page.
    #[must_use]
    pub fn repository_url(&self) -> String {
        match self.domain.as_str() {
            "oshwa.org" => format!("https://certification.oshwa.org/{}", self.path),
            domain => format!("https://{domain}/{}/{}", self.owner, self.repo),
        }
    }

    /// A URL that keeps pointing at the same content for the reference and path.
    #[must_use]
    pub fn perma_url(&self) -> Option<String> {
        match self.domain.as_str() {
            "github.com" => Some(format!(
                "https://raw.githubusercontent.com/{}/{}/{}/{}",
                self.owner, self.repo, self.reference, self.path
            )),
            "gitlab.com" => Some(format!(
                "https://gitlab.com/{}/{}/-/raw/{}/{}",
                self.owner, self.repo, self.reference, self.path
            )),
            "wikifactory.com" if self.path.is_empty() => Some(format!(
                "https://wikifactory.com/{}/{}/contributions/{}",
                self.owner, self.repo, self.reference
            )),
            "wikifactory.com" => Some(format!(
                "https://wikifactory.com/{}/{}/contributions/{}/file/{}",
                self.owner, self.repo, self.reference, self.path
            )),
            _ => None,
        }
    }
}

impl Display for ProductUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.repository_url())
    }
}

fn owner_and_repo(result: &mut ProductUrl, parts: &[&str], url: &str) -> Result<()> {
    if parts.len() < 2 {
        bail!("invalid URL '{url}': expected an owner and a repository");
    }
    result.owner = parts[0].into();
    result.repo = parts[1].trim_end_matches(".git").into();
    Ok(())
}
