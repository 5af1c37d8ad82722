//! Request classification.
//!
//! Every intercepted GET request is routed by URL shape: core application
//! files take cache-first, map tiles take stale-while-revalidate, everything
//! else takes network-first. The lists and patterns come from configuration
//! at construction so independently configured classifiers can coexist.

use offshore_core::{AppConfig, Error};
use regex::Regex;

/// What a request URL is, and therefore which strategy handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Essential, rarely-changing application asset.
    CoreFile,
    /// Map image segment, recognized by URL shape.
    Tile,
    /// Anything else.
    Other,
}

/// Pure URL-to-class mapping. Total and deterministic over all inputs.
#[derive(Debug)]
pub struct Classifier {
    manifest: Vec<String>,
    markers: Vec<String>,
    tile_patterns: Vec<Regex>,
}

impl Classifier {
    /// Compile a classifier from manifest entries, core-marker substrings,
    /// and tile URL patterns.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPattern` if a tile pattern is not valid regex.
    pub fn new(manifest: &[String], markers: &[String], patterns: &[String]) -> Result<Self, Error> {
        let tile_patterns = patterns
            .iter()
            .map(|p| Regex::new(p).map_err(|e| Error::InvalidPattern(format!("{p}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { manifest: manifest.to_vec(), markers: markers.to_vec(), tile_patterns })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        Self::new(&config.manifest, &config.core_markers, &config.tile_patterns)
    }

    /// Map a URL to its request class. Core files win over tiles, so a tile
    /// explicitly listed in the manifest stays cache-first.
    pub fn classify(&self, url: &str) -> RequestClass {
        if self.is_core_file(url) {
            RequestClass::CoreFile
        } else if self.is_tile(url) {
            RequestClass::Tile
        } else {
            RequestClass::Other
        }
    }

    /// Manifest entries match exactly, or as substrings for entries longer
    /// than one character. The bare "/" entry must not substring-match, or
    /// every URL would classify as a core file.
    fn is_core_file(&self, url: &str) -> bool {
        let listed = self
            .manifest
            .iter()
            .any(|entry| url == entry || (entry.len() > 1 && url.contains(entry.as_str())));

        listed || self.markers.iter().any(|marker| url.contains(marker.as_str()))
    }

    fn is_tile(&self, url: &str) -> bool {
        self.tile_patterns.iter().any(|pattern| pattern.is_match(url))
    }
}
