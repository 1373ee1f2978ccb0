//! The canonical chart series shape.

use serde::Serialize;

/// A normalized time-series or breakdown: parallel labels and values.
///
/// `labels.len() == values.len()` always holds; the constructor pads missing
/// values with `0` and drops surplus ones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    labels: Vec<String>,
    values: Vec<f64>,
}

impl ChartSeries {
    /// Build a series, aligning `values` to the number of labels.
    #[must_use]
    pub fn new(labels: Vec<String>, mut values: Vec<f64>) -> Self {
        values.resize(labels.len(), 0.0);
        Self { labels, values }
    }

    /// A series with the given labels and every value `0`.
    pub fn zeroed<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        let values = vec![0.0; labels.len()];
        Self { labels, values }
    }

    /// The ordered labels.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// The ordered values.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns `true` if the series has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Iterate over `(label, value)` pairs.
    pub fn points(&self) -> impl Iterator<Item = (&str, f64)> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    /// Sum of all values.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }
}
