use crate::models::File;
use strum::{Display, EnumIter};

/// Well-known documents found at the root of a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum DocumentKind {
    Readme,
    ContributionGuide,
    Bom,
    ManufacturingInstructions,
    UserManual,
}

impl DocumentKind {
    /// File stems that identify the document, as produced by [`document_key`].
    #[must_use]
    pub const fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Readme => &["README"],
            Self::ContributionGuide => &["CONTRIBUTING"],
            Self::Bom => &["BOM", "BILLOFMATERIALS"],
            Self::ManufacturingInstructions => &["MANUFACTURINGINSTRUCTIONS", "MANUFACTURING"],
            Self::UserManual => &["USERGUIDE", "USERMANUAL"],
        }
    }
}

/// Repository housekeeping files that never describe a part.
const HOUSEKEEPING_FILES: &[&str] = &[
    "ACKNOWLEDGMENTS",
    "AUTHORS",
    "CHANGELOG",
    "CODEOFCONDUCT",
    "CODEOWNERS",
    "CONTRIBUTING",
    "CONTRIBUTORS",
    "FUNDING",
    "ISSUETEMPLATE",
    "LICENSE",
    "PULLREQUESTTEMPLATE",
    "README",
    "SECURITY",
    "SUPPORT",
    "USERGUIDE",
    "USERMANUAL",
];

/// Reduce a file name to the key used for document matching: the last
/// extension is stripped, whitespace, hyphens and underscores removed, and the
/// rest upper-cased. `"Bill of Materials.md"` becomes `"BILLOFMATERIALS"`.
#[must_use]
pub fn document_key(file_name: &str) -> String {
    let stem = match file_name.rfind('.') {
        Some(pos) if pos > 0 => &file_name[..pos],
        _ => file_name,
    };

    stem.chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .flat_map(char::to_uppercase)
        .collect()
}

/// Whether the file sits directly at the repository root.
#[must_use]
pub fn is_root_file(file: &File) -> bool {
    !file.path.trim_start_matches('/').contains('/')
}

/// Whether the file is repository housekeeping, like a license or changelog.
#[must_use]
pub fn is_housekeeping_file(file: &File) -> bool {
    HOUSEKEEPING_FILES.contains(&document_key(&file.name).as_str())
}

/// Find the first root file matching one of the document's aliases.
#[must_use]
pub fn find_root_document(kind: DocumentKind, files: &[File]) -> Option<&File> {
    files
        .iter()
        .filter(|file| is_root_file(file))
        .find(|file| kind.aliases().contains(&document_key(&file.name).as_str()))
}
