use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One slice of a pie chart: a label and the amount accumulated under it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryAmount {
    pub name: String,
    pub value: f64,
}

impl CategoryAmount {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Returns the (max, min) items by `key`, scanning in order with strict
/// comparisons so the first occurrence wins ties. `None` for an empty slice.
pub(crate) fn extremes<T>(items: &[T], key: impl Fn(&T) -> f64) -> Option<(&T, &T)> {
    let first = items.first()?;
    let mut best = first;
    let mut worst = first;

    for item in &items[1..] {
        if key(item) > key(best) {
            best = item;
        }
        if key(item) < key(worst) {
            worst = item;
        }
    }

    Some((best, worst))
}
