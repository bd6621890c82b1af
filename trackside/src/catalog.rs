//! Per-track sound definitions.

use crate::config::{SoundDefinition, SoundsConfig};
use std::collections::HashMap;
use std::fmt;

/// Short code identifying a circuit layout, e.g. `BL1R`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Family code shared by every layout of a venue: the first two characters.
    pub fn family(&self) -> &str {
        match self.0.char_indices().nth(2) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// Immutable index of sound definitions by exact track code and by family code.
#[derive(Debug, Clone, Default)]
pub struct SoundCatalog {
    exact: HashMap<TrackId, Vec<SoundDefinition>>,
    family: HashMap<String, Vec<SoundDefinition>>,
}

impl SoundCatalog {
    pub fn builder() -> SoundCatalogBuilder {
        SoundCatalogBuilder::default()
    }

    pub fn from_config(sounds: &SoundsConfig) -> Self {
        let mut builder = Self::builder();
        for (code, defs) in &sounds.track {
            builder = builder.track(code.as_str(), defs.iter().cloned());
        }
        for (code, defs) in &sounds.family {
            builder = builder.family(code.as_str(), defs.iter().cloned());
        }
        builder.build()
    }

    /// Definitions for `track`: the exact entry followed by its family's entry.
    /// Unknown tracks yield an empty list.
    pub fn lookup(&self, track: &TrackId) -> Vec<SoundDefinition> {
        let exact = self.exact.get(track).map(Vec::as_slice).unwrap_or_default();
        let family = self
            .family
            .get(track.family())
            .map(Vec::as_slice)
            .unwrap_or_default();
        exact.iter().chain(family).cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.family.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct SoundCatalogBuilder {
    catalog: SoundCatalog,
}

impl SoundCatalogBuilder {
    pub fn track(
        mut self,
        code: impl Into<TrackId>,
        defs: impl IntoIterator<Item = SoundDefinition>,
    ) -> Self {
        self.catalog
            .exact
            .entry(code.into())
            .or_default()
            .extend(defs);
        self
    }

    pub fn family(
        mut self,
        code: impl Into<String>,
        defs: impl IntoIterator<Item = SoundDefinition>,
    ) -> Self {
        self.catalog
            .family
            .entry(code.into())
            .or_default()
            .extend(defs);
        self
    }

    pub fn build(self) -> SoundCatalog {
        self.catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;

    fn catalog() -> SoundCatalog {
        SoundCatalog::builder()
            .track("BL", [SoundDefinition::ambient("exact.mp3", 1.0)])
            .track(
                "BL1",
                [SoundDefinition::positional("grandstand.mp3", Vec3::new(1.0, 2.0, 3.0), 1.0)],
            )
            .family(
                "BL",
                [
                    SoundDefinition::ambient("birds.mp3", 0.5),
                    SoundDefinition::ambient("wind.mp3", 0.3),
                ],
            )
            .build()
    }

    fn files(defs: &[SoundDefinition]) -> Vec<String> {
        defs.iter().map(|d| d.file.display().to_string()).collect()
    }

    #[test]
    fn test_family_code() {
        assert_eq!(TrackId::new("BL1R").family(), "BL");
        assert_eq!(TrackId::new("BL").family(), "BL");
        assert_eq!(TrackId::new("B").family(), "B");
    }

    #[test]
    fn test_exact_then_family() {
        let defs = catalog().lookup(&TrackId::new("BL"));
        assert_eq!(files(&defs), vec!["exact.mp3", "birds.mp3", "wind.mp3"]);
    }

    #[test]
    fn test_layout_falls_back_to_family() {
        let defs = catalog().lookup(&TrackId::new("BL1"));
        assert_eq!(files(&defs), vec!["grandstand.mp3", "birds.mp3", "wind.mp3"]);

        let defs = catalog().lookup(&TrackId::new("BL2R"));
        assert_eq!(files(&defs), vec!["birds.mp3", "wind.mp3"]);
    }

    #[test]
    fn test_unknown_track_is_empty() {
        assert!(catalog().lookup(&TrackId::new("SO1")).is_empty());
        assert!(SoundCatalog::default().lookup(&TrackId::new("BL")).is_empty());
    }
}
