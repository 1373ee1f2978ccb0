//! Chart payload normalization.
//!
//! Upstream chart endpoints answer in one of several shapes. [`normalize`]
//! classifies a payload into a [`ChartPayload`] and converts it to the
//! canonical [`ChartSeries`], falling back to a caller-supplied default when
//! the shape is not recognized. Normalization never fails.

use concierge_core::ChartSeries;
use serde_json::{json, Map, Value};

/// A raw chart payload, classified by shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChartPayload<'a> {
    /// `{"data": {"labels": [...], "data": [...]}}`, other wrapper keys ignored.
    Nested {
        /// Raw label entries.
        labels: &'a [Value],
        /// Raw value entries.
        data: &'a [Value],
    },
    /// `{"labels": [...], "data": [...]}`.
    Flat {
        /// Raw label entries.
        labels: &'a [Value],
        /// Raw value entries.
        data: &'a [Value],
    },
    /// `{"<name>": {"labels": [...], "data": [...]}, ...}`, one entry selected.
    Keyed {
        /// Name of the selected series.
        name: &'a str,
        /// Raw label entries.
        labels: &'a [Value],
        /// Raw value entries.
        data: &'a [Value],
    },
    /// `{"<label>": <scalar>, ...}` in upstream key order.
    Points(&'a Map<String, Value>),
    /// Anything else, including a recognized shape with no labels.
    Unrecognized,
}

impl<'a> ChartPayload<'a> {
    /// Classify a raw payload.
    ///
    /// A set of named series is recognized only when it has a single entry;
    /// use [`classify_keyed`](Self::classify_keyed) to pick one of several.
    #[must_use]
    pub fn classify(raw: Option<&'a Value>) -> Self {
        Self::classify_with(raw, None)
    }

    /// Classify a raw payload, selecting series `key` from a set of named
    /// series.
    #[must_use]
    pub fn classify_keyed(raw: Option<&'a Value>, key: &str) -> Self {
        Self::classify_with(raw, Some(key))
    }

    fn classify_with(raw: Option<&'a Value>, key: Option<&str>) -> Self {
        let Some(Value::Object(outer)) = raw else {
            return Self::Unrecognized;
        };

        // A `data` wrapper is unwrapped first; the inner object may hold any
        // of the keyed shapes.
        let payload = if let Some(Value::Object(inner)) = outer.get("data") {
            match series_parts(inner) {
                Some((labels, data)) => Self::Nested { labels, data },
                None => Self::keyed(inner, key),
            }
        } else if let Some((labels, data)) = series_parts(outer) {
            Self::Flat { labels, data }
        } else {
            Self::keyed(outer, key)
        };

        if payload.is_empty() {
            Self::Unrecognized
        } else {
            payload
        }
    }

    fn keyed(map: &'a Map<String, Value>, key: Option<&str>) -> Self {
        if is_named_series(map) {
            let entry = match key {
                Some(key) => map.iter().find(|(name, _)| name.as_str() == key),
                None if map.len() == 1 => map.iter().next(),
                None => None,
            };
            let parts = entry.and_then(|(name, value)| {
                let (labels, data) = value.as_object().and_then(series_parts)?;
                Some(Self::Keyed {
                    name: name.as_str(),
                    labels,
                    data,
                })
            });
            parts.unwrap_or(Self::Unrecognized)
        } else if is_points(map) {
            Self::Points(map)
        } else {
            Self::Unrecognized
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Self::Nested { labels, .. } | Self::Flat { labels, .. } | Self::Keyed { labels, .. } => {
                labels.is_empty()
            }
            Self::Points(map) => map.is_empty(),
            Self::Unrecognized => true,
        }
    }

    /// Convert to a canonical series, or `None` for [`Self::Unrecognized`].
    #[must_use]
    pub fn to_series(&self) -> Option<ChartSeries> {
        match self {
            Self::Nested { labels, data }
            | Self::Flat { labels, data }
            | Self::Keyed { labels, data, .. } => Some(ChartSeries::new(
                labels.iter().map(label).collect(),
                data.iter().map(coerce).collect(),
            )),
            Self::Points(map) => Some(ChartSeries::new(
                map.keys().cloned().collect(),
                map.values().map(coerce).collect(),
            )),
            Self::Unrecognized => None,
        }
    }
}

fn series_parts(map: &Map<String, Value>) -> Option<(&[Value], &[Value])> {
    let labels = map.get("labels")?.as_array()?;
    let data = map
        .get("data")
        .and_then(Value::as_array)
        .map_or(&[][..], Vec::as_slice);
    Some((labels.as_slice(), data))
}

fn is_named_series(map: &Map<String, Value>) -> bool {
    !map.is_empty()
        && map
            .values()
            .all(|v| v.as_object().and_then(series_parts).is_some())
}

fn is_points(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.values().all(|v| v.is_number() || v.is_string())
}

/// Normalize a raw chart payload, using `fallback` when it is unrecognized.
#[must_use]
pub fn normalize(raw: Option<&Value>, fallback: &ChartSeries) -> ChartSeries {
    to_series_or(ChartPayload::classify(raw), raw.is_some(), fallback)
}

/// Normalize a raw chart payload, selecting series `key` when the payload is
/// a set of named series.
#[must_use]
pub fn normalize_keyed(raw: Option<&Value>, key: &str, fallback: &ChartSeries) -> ChartSeries {
    to_series_or(ChartPayload::classify_keyed(raw, key), raw.is_some(), fallback)
}

fn to_series_or(payload: ChartPayload<'_>, present: bool, fallback: &ChartSeries) -> ChartSeries {
    payload.to_series().unwrap_or_else(|| {
        tracing::debug!(present, "Unrecognized chart payload, using default");
        fallback.clone()
    })
}

/// Coerce a raw entry to a finite number; anything unusable becomes `0`.
#[must_use]
pub fn coerce(value: &Value) -> f64 {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite()).unwrap_or(0.0)
}

fn label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// Encode a series as `{"labels": [...], "data": [...]}`.
#[must_use]
pub fn to_flat(series: &ChartSeries) -> Value {
    json!({ "labels": series.labels(), "data": series.values() })
}

/// Encode a series as `{"success": true, "data": {"labels": [...], "data": [...]}}`.
#[must_use]
pub fn to_nested(series: &ChartSeries) -> Value {
    json!({ "success": true, "data": to_flat(series) })
}

/// Encode a series as `{"<name>": {"labels": [...], "data": [...]}}`.
#[must_use]
pub fn to_keyed(series: &ChartSeries, name: &str) -> Value {
    let mut map = Map::new();
    map.insert(name.to_string(), to_flat(series));
    Value::Object(map)
}

/// Encode a series as `{"<label>": <value>, ...}`.
///
/// Duplicate labels collapse to the last value.
#[must_use]
pub fn to_points(series: &ChartSeries) -> Value {
    let map: Map<String, Value> = series
        .points()
        .map(|(label, value)| (label.to_string(), json!(value)))
        .collect();
    Value::Object(map)
}
