//! Media item model
//!
//! `MediaItem` is the unit every strategy produces and every later stage
//! refines. Its serde form is the stable output schema of a run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::utils::is_valid_url;

/// Kind of media an item points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Image,
    Video,
    Audio,
}

impl MediaType {
    /// Best guess from a file extension in the URL path
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
        let ext = path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
        match ext {
            "mp4" | "webm" | "mov" | "m4v" | "mkv" | "m3u8" | "mpd" => Self::Video,
            "mp3" | "m4a" | "ogg" | "oga" | "wav" | "flac" | "aac" | "opus" => Self::Audio,
            _ => Self::Image,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// A single downloadable media reference plus its metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MediaItem {
    /// Absolute http(s) URL of the media resource
    pub url: String,
    #[serde(rename = "type", default)]
    pub media_type: MediaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    /// Page the item was discovered on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits: Option<String>,
    /// Pixel width, 0 when unknown
    #[serde(default)]
    pub width: u32,
    /// Pixel height, 0 when unknown
    #[serde(default)]
    pub height: u32,
    /// Hosted on a CDN or domain the handler vouches for
    #[serde(default)]
    pub trusted_cdn: bool,
    /// Headers a downloader must replay to fetch the resource
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub request_headers: BTreeMap<String, String>,
}

impl MediaItem {
    #[must_use]
    pub fn new(url: impl Into<String>, media_type: MediaType) -> Self {
        Self {
            url: url.into(),
            media_type,
            ..Self::default()
        }
    }

    /// Image item with its type inferred from the URL
    #[must_use]
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let media_type = MediaType::from_url(&url);
        Self::new(url, media_type)
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_alt(mut self, alt: impl Into<String>) -> Self {
        self.alt = Some(alt.into());
        self
    }

    #[must_use]
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    #[must_use]
    pub fn with_source(mut self, source_url: impl Into<String>) -> Self {
        self.source_url = Some(source_url.into());
        self
    }

    #[must_use]
    pub fn with_credits(mut self, credits: impl Into<String>) -> Self {
        self.credits = Some(credits.into());
        self
    }

    /// Whether the URL is an absolute http(s) URL
    #[must_use]
    pub fn is_valid(&self) -> bool {
        is_valid_url(&self.url)
    }
}
