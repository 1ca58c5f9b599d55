use serde::{Deserialize, Serialize};

/// Per-component bounds of a field over one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub minimums: Vec<f64>,
    pub maximums: Vec<f64>,
}

impl ValueRange {
    /// Range covering a set of sample values, e.g. the nodal values of a linear element.
    /// Returns `None` when there are no samples.
    pub fn from_samples<'a>(samples: impl IntoIterator<Item = &'a [f64]>) -> Option<Self> {
        let mut range: Option<ValueRange> = None;
        for sample in samples {
            match range.as_mut() {
                None => {
                    range = Some(ValueRange {
                        minimums: sample.to_vec(),
                        maximums: sample.to_vec(),
                    })
                }
                Some(range) => range.include(sample),
            }
        }
        range
    }

    pub fn number_of_components(&self) -> usize {
        self.minimums.len()
    }

    fn include(&mut self, sample: &[f64]) {
        for (i, value) in sample.iter().enumerate() {
            if *value < self.minimums[i] {
                self.minimums[i] = *value;
            }
            if *value > self.maximums[i] {
                self.maximums[i] = *value;
            }
        }
    }

    /// Returns true if `target` lies within the range, each component padded by
    /// `padding * max(1, max - min)`.
    pub fn contains(&self, target: &[f64], padding: f64) -> bool {
        if target.len() != self.number_of_components() {
            return true;
        }
        target.iter().enumerate().all(|(i, value)| {
            let span = self.maximums[i] - self.minimums[i];
            let pad = padding * span.max(1.0);
            *value >= self.minimums[i] - pad && *value <= self.maximums[i] + pad
        })
    }
}
