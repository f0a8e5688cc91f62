use crate::net::RequestError;
use crate::validator::ValidationError;
use core::fmt::{Display, Formatter};
use strum::Display as StrumDisplay;

/// Steps of the per-product pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay)]
#[strum(serialize_all = "kebab-case")]
pub enum CrawlStage {
    Idle,
    FetchMinimal,
    ValidateMandatory,
    FetchFull,
    Normalize,
    ValidateProduct,
    Persist,
    Done,
}

/// Why crawling a single product failed.
#[derive(Debug)]
pub enum CrawlError {
    /// The product lives on a platform without an adapter.
    UnsupportedPlatform(String),

    /// The platform does not know the product, or an entity it refers to.
    NotFound { stage: CrawlStage, what: String },

    /// Talking to the platform failed.
    Request { stage: CrawlStage, source: RequestError },

    /// The product's data does not meet the requirements.
    Validation { stage: CrawlStage, source: ValidationError },

    /// The platform data could not be mapped into a product.
    Normalize(ohno::AppError),

    /// The product could not be handed to the store.
    Persist(ohno::AppError),
}

impl CrawlError {
    /// The pipeline stage the failure happened in.
    #[must_use]
    pub const fn stage(&self) -> CrawlStage {
        match self {
            Self::UnsupportedPlatform(_) => CrawlStage::Idle,
            Self::NotFound { stage, .. } | Self::Request { stage, .. } | Self::Validation { stage, .. } => *stage,
            Self::Normalize(_) => CrawlStage::Normalize,
            Self::Persist(_) => CrawlStage::Persist,
        }
    }

    /// Whether the crawl was stopped by its caller.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Request { source, .. } if source.is_cancellation())
    }
}

impl Display for CrawlError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnsupportedPlatform(platform) => write!(f, "unsupported platform '{platform}'"),
            Self::NotFound { stage, what } => write!(f, "{stage}: {what} not found"),
            Self::Request { stage, source } => write!(f, "{stage}: {source}"),
            Self::Validation { stage, source } => write!(f, "{stage}: {source}"),
            Self::Normalize(e) => write!(f, "normalize: {e:#}"),
            Self::Persist(e) => write!(f, "persist: {e:#}"),
        }
    }
}

impl core::error::Error for CrawlError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Request { source, .. } => Some(source),
            Self::Validation { source, .. } => Some(source),
            _ => None,
        }
    }
}
