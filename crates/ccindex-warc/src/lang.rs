//! Language confidence scoring

use std::fmt;

use lingua::{LanguageDetector, LanguageDetectorBuilder};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Confidences below this are dropped from the index
pub const MIN_CONFIDENCE: f64 = 0.001;

/// Text → (language, confidence) pairs, most confident first
pub trait LanguageScorer: Send + Sync {
    fn confidences(&self, text: &str) -> Vec<(String, f64)>;
}

/// Scorer over every language `lingua` knows, names upper-cased (`ENGLISH`)
pub struct LinguaScorer {
    detector: LanguageDetector,
}

impl fmt::Debug for LinguaScorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinguaScorer").finish_non_exhaustive()
    }
}

impl LinguaScorer {
    /// Build the detector. Preloading trades a slow start for steady throughput.
    pub fn new(preload_models: bool) -> Self {
        let mut builder = LanguageDetectorBuilder::from_all_languages();
        if preload_models {
            builder.with_preloaded_language_models();
        }
        log::debug!("language detector ready (preloaded models: {preload_models})");
        Self {
            detector: builder.build(),
        }
    }
}

impl LanguageScorer for LinguaScorer {
    fn confidences(&self, text: &str) -> Vec<(String, f64)> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.detector
            .compute_language_confidence_values(text)
            .into_iter()
            .map(|(language, confidence)| (format!("{language:?}").to_uppercase(), confidence))
            .collect()
    }
}

/// Language → confidence, in scorer order.
///
/// Serializes as a JSON object whose key order is preserved both ways.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LanguageMix(Vec<(String, f64)>);

impl LanguageMix {
    /// Keep entries at or above [`MIN_CONFIDENCE`]
    pub fn from_confidences(confidences: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self(
            confidences
                .into_iter()
                .filter(|(_, c)| *c >= MIN_CONFIDENCE)
                .collect(),
        )
    }

    pub fn entries(&self) -> &[(String, f64)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, language: &str) -> Option<f64> {
        self.0
            .iter()
            .find(|(name, _)| name == language)
            .map(|(_, c)| *c)
    }

    /// A single detected language counts as certain
    pub fn collapsed(mut self) -> Self {
        if let [(_, confidence)] = self.0.as_mut_slice() {
            *confidence = 1.0;
        }
        self
    }
}

impl Serialize for LanguageMix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (language, confidence) in &self.0 {
            map.serialize_entry(language, confidence)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for LanguageMix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MixVisitor;

        impl<'de> Visitor<'de> for MixVisitor {
            type Value = LanguageMix;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of language names to confidences")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<String, f64>()? {
                    entries.push(entry);
                }
                Ok(LanguageMix(entries))
            }
        }

        deserializer.deserialize_map(MixVisitor)
    }
}
