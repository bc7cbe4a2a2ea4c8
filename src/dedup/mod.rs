//! Two-stage deduplication: canonical URLs before download, perceptual
//! hashes after.

pub mod perceptual;
pub mod url_dedup;

pub use perceptual::{
    ActionFailure, DuplicateAction, DuplicateFile, HashAlgorithm, PerceptualDeduplicator, PerceptualReport,
    hamming_distance, image_hash,
};
pub use url_dedup::UrlDeduplicator;
