use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;

/// Name to value mapping that keeps first-insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreMap {
    entries: Vec<(String, f64)>,
}

impl ScoreMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a value. A replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: f64) -> Option<f64> {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().fold(0.0, |acc, (_, v)| acc + v)
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for ScoreMap {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut map = ScoreMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl Serialize for ScoreMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Component maxima declared at the top of a marking log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreSchema {
    /// Ordinary maxima, every student block must report these.
    pub required: ScoreMap,
    /// Extra maxima, bonus components a block may report.
    pub optional: ScoreMap,
}

impl ScoreSchema {
    pub fn required_names(&self) -> Vec<String> {
        self.required.keys().map(str::to_string).collect()
    }

    pub fn optional_names(&self) -> Vec<String> {
        self.optional.keys().map(str::to_string).collect()
    }
}

/// Per-block totals summed from the log plus any validation messages.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct CheckedTotals {
    pub totals: ScoreMap,
    pub diagnostics: Vec<String>,
}

/// One row of the minimal student table.
#[derive(Debug, Clone, PartialEq, Deserialize, serde::Serialize)]
pub struct Student {
    #[serde(rename = "Student")]
    pub name: String,
    #[serde(rename = "SIS User ID")]
    pub sis_user_id: i64,
    #[serde(rename = "SIS Login ID")]
    pub login: String,
    #[serde(rename = "Section")]
    pub section: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearSummary {
    pub year: i32,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation, `None` with fewer than two marks.
    pub stdev: Option<f64>,
    pub failed: Vec<String>,
}

/// Formats a mark the way the marking log writes numbers: integral values
/// keep one decimal place (`13.0`), others use the shortest exact form.
/// Very large or very small magnitudes switch to exponent form (`1e+16`,
/// `1.5e-05`).
pub fn display_mark(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        return exponent_form(value);
    }
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

fn exponent_form(value: f64) -> String {
    let raw = format!("{value:e}");
    let Some((mantissa, exponent)) = raw.split_once('e') else {
        return raw;
    };
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exponent),
    };
    format!("{mantissa}e{sign}{digits:0>2}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaced_keys_keep_position() {
        let mut map = ScoreMap::new();
        map.insert("a", 1.0);
        map.insert("b", 2.0);
        assert_eq!(map.insert("a", 5.0), Some(1.0));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(map.get("a"), Some(5.0));
        assert_eq!(map.total(), 7.0);
    }

    #[test]
    fn marks_display_with_decimal_point() {
        assert_eq!(display_mark(13.0), "13.0");
        assert_eq!(display_mark(2.5), "2.5");
        assert_eq!(display_mark(0.0), "0.0");
        assert_eq!(display_mark(-4.0), "-4.0");
        assert_eq!(display_mark(0.1 + 0.2), "0.30000000000000004");
    }

    #[test]
    fn extreme_marks_use_exponent_form() {
        assert_eq!(display_mark(1e16), "1e+16");
        assert_eq!(display_mark(1.5e16), "1.5e+16");
        assert_eq!(display_mark(-2e20), "-2e+20");
        assert_eq!(display_mark(1e-5), "1e-05");
        assert_eq!(display_mark(1.5e-7), "1.5e-07");
        assert_eq!(display_mark(9999999999999998.0), "9999999999999998.0");
        assert_eq!(display_mark(0.0001), "0.0001");
    }

    #[test]
    fn empty_map_totals_to_positive_zero() {
        let total = ScoreMap::new().total();
        assert!(total.is_sign_positive());
        assert_eq!(display_mark(total), "0.0");
    }

    #[test]
    fn score_map_serializes_as_object() {
        let map: ScoreMap = [("someone", 13.0), ("other", 2.5)].into_iter().collect();
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"someone":13.0,"other":2.5}"#);
    }
}
