// ============================================================
// Layer 3 — Example Records
// ============================================================
// An ExampleRecord maps a feature name ("audio" plus every
// conditioning key) to a fixed-length sequence of floats.
//
// A FeatureSchema lists the expected (name, length) pairs in
// order. Records are checked against the schema when they are
// decoded; anything that does not match is a data error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One aligned (audio, conditioning) example.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExampleRecord {
    pub features: BTreeMap<String, Vec<f32>>,
}

impl ExampleRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, values: Vec<f32>) -> Self {
        self.features.insert(name.into(), values);
        self
    }

    pub fn get(&self, name: &str) -> Option<&[f32]> {
        self.features.get(name).map(Vec::as_slice)
    }

    pub fn audio(&self) -> Option<&[f32]> {
        self.get("audio")
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }
}

/// Ordered list of (feature name, fixed length).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSchema {
    fields: Vec<(String, usize)>,
}

impl FeatureSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, length: usize) {
        self.fields.push((name.into(), length));
    }

    pub fn fields(&self) -> &[(String, usize)] {
        &self.fields
    }

    pub fn length_of(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, len)| *len)
    }
}
