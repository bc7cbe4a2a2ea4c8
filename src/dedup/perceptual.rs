//! Stage 2: near-duplicate detection over downloaded image files
//!
//! Each file gets a 64-bit perceptual hash; a file whose hash is within
//! `max_distance` bits of an earlier file's is a duplicate of it. Decoding
//! runs on the blocking pool.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::ScrapeConfig;
use crate::errors::{ExtractError, ExtractResult};
use crate::utils::DEFAULT_HASH_DISTANCE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// Pixels above the mean of an 8x8 grayscale thumbnail
    Average,
    /// Horizontal gradient signs of a 9x8 grayscale thumbnail
    #[default]
    Difference,
}

/// What happens to a duplicate file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateAction {
    /// Only report duplicates
    Report,
    Delete,
    /// Move into this directory, keeping the file name
    MoveTo(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateFile {
    pub path: PathBuf,
    /// Earlier file this one duplicates
    pub original: PathBuf,
    pub distance: u32,
}

/// A duplicate the configured action could not be applied to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PerceptualReport {
    pub kept: Vec<PathBuf>,
    /// Every duplicate found, whether or not its action succeeded
    pub duplicates: Vec<DuplicateFile>,
    /// Files that could not be decoded; left untouched
    pub unreadable: Vec<PathBuf>,
    /// Duplicates still in place because deleting or moving them failed
    pub failed: Vec<ActionFailure>,
}

/// 64-bit perceptual hash of `image`
#[must_use]
pub fn image_hash(image: &DynamicImage, algorithm: HashAlgorithm) -> u64 {
    match algorithm {
        HashAlgorithm::Average => {
            let small = image.resize_exact(8, 8, FilterType::Triangle).to_luma8();
            let pixels: Vec<u64> = small.pixels().map(|p| u64::from(p.0[0])).collect();
            let mean = pixels.iter().sum::<u64>() / pixels.len().max(1) as u64;
            pixels
                .iter()
                .enumerate()
                .fold(0u64, |hash, (i, &v)| if v > mean { hash | (1 << i) } else { hash })
        }
        HashAlgorithm::Difference => {
            let small = image.resize_exact(9, 8, FilterType::Triangle).to_luma8();
            let mut hash = 0u64;
            let mut bit = 0;
            for y in 0..8 {
                for x in 0..8 {
                    if small.get_pixel(x, y).0[0] > small.get_pixel(x + 1, y).0[0] {
                        hash |= 1 << bit;
                    }
                    bit += 1;
                }
            }
            hash
        }
    }
}

#[must_use]
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Groups visually identical images across a download directory
#[derive(Debug, Clone)]
pub struct PerceptualDeduplicator {
    algorithm: HashAlgorithm,
    max_distance: u32,
    action: DuplicateAction,
}

impl Default for PerceptualDeduplicator {
    fn default() -> Self {
        Self::new(HashAlgorithm::default(), DEFAULT_HASH_DISTANCE, DuplicateAction::Report)
    }
}

impl PerceptualDeduplicator {
    #[must_use]
    pub fn new(algorithm: HashAlgorithm, max_distance: u32, action: DuplicateAction) -> Self {
        Self {
            algorithm,
            max_distance,
            action,
        }
    }

    /// Deduplicator with the distance, algorithm and action of `config`
    #[must_use]
    pub fn from_config(config: &ScrapeConfig) -> Self {
        Self::new(
            config.hash_algorithm(),
            config.hash_distance(),
            config.duplicate_action().clone(),
        )
    }

    #[must_use]
    pub fn action(&self) -> &DuplicateAction {
        &self.action
    }

    /// Hash one file on the blocking pool
    pub async fn hash_file(&self, path: &Path) -> ExtractResult<u64> {
        let path = path.to_path_buf();
        let algorithm = self.algorithm;
        tokio::task::spawn_blocking(move || {
            let image = image::open(&path).map_err(|e| {
                ExtractError::Other(format!("failed to decode {}: {e}", path.display()))
            })?;
            if image.dimensions() == (0, 0) {
                return Err(ExtractError::Other(format!("empty image {}", path.display())));
            }
            Ok(image_hash(&image, algorithm))
        })
        .await
        .map_err(|e| ExtractError::Other(format!("hash task failed: {e}")))?
    }

    /// Deduplicate `paths` in order; the first of each group is kept.
    ///
    /// The configured action is applied to every duplicate. Undecodable
    /// files are reported and never touched. A failed delete or move is
    /// recorded in the report and the remaining duplicates are still handled.
    pub async fn dedup_files(&self, paths: &[PathBuf]) -> ExtractResult<PerceptualReport> {
        let mut report = PerceptualReport::default();
        let mut hashed: Vec<(PathBuf, u64)> = Vec::new();

        for path in paths {
            let hash = match self.hash_file(path).await {
                Ok(hash) => hash,
                Err(e) => {
                    log::warn!(target: "mediascrape::dedup", "{e}");
                    report.unreadable.push(path.clone());
                    continue;
                }
            };

            let closest = hashed
                .iter()
                .map(|(original, h)| (original, hamming_distance(hash, *h)))
                .filter(|(_, d)| *d <= self.max_distance)
                .min_by_key(|(_, d)| *d);

            match closest {
                Some((original, distance)) => report.duplicates.push(DuplicateFile {
                    path: path.clone(),
                    original: original.clone(),
                    distance,
                }),
                None => {
                    hashed.push((path.clone(), hash));
                    report.kept.push(path.clone());
                }
            }
        }

        for duplicate in &report.duplicates {
            if let Err(e) = self.apply(&duplicate.path).await {
                log::warn!(
                    target: "mediascrape::dedup",
                    "could not handle duplicate {}: {e}",
                    duplicate.path.display()
                );
                report.failed.push(ActionFailure {
                    path: duplicate.path.clone(),
                    error: e.to_string(),
                });
            }
        }
        log::info!(
            target: "mediascrape::dedup",
            "{} kept, {} duplicates, {} unreadable, {} actions failed",
            report.kept.len(),
            report.duplicates.len(),
            report.unreadable.len(),
            report.failed.len()
        );
        Ok(report)
    }

    async fn apply(&self, path: &Path) -> ExtractResult<()> {
        match &self.action {
            DuplicateAction::Report => Ok(()),
            DuplicateAction::Delete => {
                tokio::fs::remove_file(path).await?;
                Ok(())
            }
            DuplicateAction::MoveTo(dir) => {
                tokio::fs::create_dir_all(dir).await?;
                let name = path
                    .file_name()
                    .map_or_else(|| "duplicate".into(), |n| n.to_os_string());
                let mut target = dir.join(&name);
                let mut n = 1;
                while tokio::fs::try_exists(&target).await? {
                    target = dir.join(format!("{n}_{}", name.to_string_lossy()));
                    n += 1;
                }
                tokio::fs::rename(path, &target).await?;
                Ok(())
            }
        }
    }
}
