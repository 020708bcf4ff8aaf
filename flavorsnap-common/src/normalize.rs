//! Prediction payload normalization
//!
//! Classification backends answer in several shapes:
//! - `{"predictions": [{"label": "...", "confidence": 0.7}, ...]}`
//! - `{"prediction": "...", "confidence": 0.9}` or `{"food": "...", "confidence": 0.9}`
//! - `{"label": "..."}` or a bare JSON string, with no confidence
//!
//! [`normalize`] maps any of them onto a [`PredictionResult`]. It is pure and
//! total: unknown shapes produce an empty result, never an error.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Single-label keys, in lookup order
const LABEL_KEYS: [&str; 3] = ["prediction", "food", "label"];

/// One label with its confidence in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionItem {
    pub label: String,
    pub confidence: f64,
}

impl PredictionItem {
    /// Confidence is clamped into [0, 1]
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence: coerce_confidence(confidence),
        }
    }
}

impl fmt::Display for PredictionItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:.1}%", self.label, self.confidence * 100.0)
    }
}

/// Predictions ordered by descending confidence
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PredictionResult(Vec<PredictionItem>);

impl PredictionResult {
    /// Rank items by descending confidence; equal confidences keep their order
    pub fn ranked(mut items: Vec<PredictionItem>) -> Self {
        items.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Self(items)
    }

    /// Highest-confidence prediction
    pub fn top(&self) -> Option<&PredictionItem> {
        self.0.first()
    }

    /// Predictions after the top one, at most `limit`
    pub fn runners_up(&self, limit: usize) -> &[PredictionItem] {
        let end = self.0.len().min(limit.saturating_add(1));
        self.0.get(1..end).unwrap_or(&[])
    }

    pub fn items(&self) -> &[PredictionItem] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<PredictionItem> {
        self.0
    }
}

impl<'a> IntoIterator for &'a PredictionResult {
    type Item = &'a PredictionItem;
    type IntoIter = std::slice::Iter<'a, PredictionItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Map a classification payload onto a ranked prediction list
pub fn normalize(payload: &Value) -> PredictionResult {
    if let Some(predictions) = payload.get("predictions").and_then(Value::as_array) {
        if !predictions.is_empty() {
            let items = predictions
                .iter()
                .filter_map(|item| {
                    let label = item.get("label")?.as_str()?;
                    let confidence = item.get("confidence")?.as_f64()?;
                    Some(PredictionItem::new(label, confidence))
                })
                .collect();
            return PredictionResult::ranked(items);
        }
    }

    if let Some(label) = single_label(payload) {
        let confidence = payload
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        return PredictionResult(vec![PredictionItem::new(label, confidence)]);
    }

    PredictionResult::default()
}

fn single_label(payload: &Value) -> Option<&str> {
    if let Value::String(label) = payload {
        return Some(label.as_str()).filter(|l| !l.trim().is_empty());
    }

    // The first string-valued key decides; an empty one does not fall through
    LABEL_KEYS
        .iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_str))
        .filter(|label| !label.trim().is_empty())
}

fn coerce_confidence(value: f64) -> f64 {
    // -0.0 would rank behind 0.0 under total_cmp
    if value.is_nan() || value <= 0.0 {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
