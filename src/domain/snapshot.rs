//! Per-instrument, per-day analytics snapshots.
//!
//! Snapshots are produced upstream and are read-only here. Derived metrics
//! that could not be computed (not enough history, halted trading) are `None`,
//! never a sentinel number.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Categorical tags attached to a snapshot by the upstream analytics job.
///
/// Names this build does not know resolve to [`Tag::Other`], which no
/// snapshot is ever considered to carry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Tag {
    ShortTermStrong,
    VolumeSurge,
    NearHigh,
    NearLow,
    HighVolatility,
    LowVolatility,
    Other(String),
}

impl Tag {
    pub const KNOWN: [Tag; 6] = [
        Tag::ShortTermStrong,
        Tag::VolumeSurge,
        Tag::NearHigh,
        Tag::NearLow,
        Tag::HighVolatility,
        Tag::LowVolatility,
    ];

    /// Case-insensitive lookup.
    pub fn from_name(name: &str) -> Self {
        let wanted = name.trim();
        Tag::KNOWN
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(wanted))
            .unwrap_or_else(|| Tag::Other(wanted.to_string()))
    }

    pub fn name(&self) -> &str {
        match self {
            Tag::ShortTermStrong => "short_term_strong",
            Tag::VolumeSurge => "volume_surge",
            Tag::NearHigh => "near_high",
            Tag::NearLow => "near_low",
            Tag::HighVolatility => "high_volatility",
            Tag::LowVolatility => "low_volatility",
            Tag::Other(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Tag::Other(_))
    }
}

impl From<String> for Tag {
    fn from(name: String) -> Self {
        Tag::from_name(&name)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.name().to_string()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A numeric snapshot field addressable by name from conditions and sort options.
///
/// Names this build does not know resolve to [`NumericField::Other`], which
/// never has a value, so older or newer rule definitions keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NumericField {
    Close,
    Change,
    ChangeRate,
    Return5,
    Return20,
    Return60,
    Ma5,
    Ma10,
    Ma20,
    Ma60,
    Deviation20,
    High20,
    Low20,
    RangePos20,
    VolumeMultiple,
    Amplitude,
    AvgAmplitude20,
    Score,
    Other(String),
}

impl NumericField {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "close" => NumericField::Close,
            "change" => NumericField::Change,
            "change_rate" => NumericField::ChangeRate,
            "return5" => NumericField::Return5,
            "return20" => NumericField::Return20,
            "return60" => NumericField::Return60,
            "ma5" => NumericField::Ma5,
            "ma10" => NumericField::Ma10,
            "ma20" => NumericField::Ma20,
            "ma60" => NumericField::Ma60,
            "deviation20" => NumericField::Deviation20,
            "high20" => NumericField::High20,
            "low20" => NumericField::Low20,
            "range_pos20" => NumericField::RangePos20,
            "volume_multiple" => NumericField::VolumeMultiple,
            "amplitude" => NumericField::Amplitude,
            "avg_amplitude20" => NumericField::AvgAmplitude20,
            "score" => NumericField::Score,
            _ => NumericField::Other(name.trim().to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            NumericField::Close => "close",
            NumericField::Change => "change",
            NumericField::ChangeRate => "change_rate",
            NumericField::Return5 => "return5",
            NumericField::Return20 => "return20",
            NumericField::Return60 => "return60",
            NumericField::Ma5 => "ma5",
            NumericField::Ma10 => "ma10",
            NumericField::Ma20 => "ma20",
            NumericField::Ma60 => "ma60",
            NumericField::Deviation20 => "deviation20",
            NumericField::High20 => "high20",
            NumericField::Low20 => "low20",
            NumericField::RangePos20 => "range_pos20",
            NumericField::VolumeMultiple => "volume_multiple",
            NumericField::Amplitude => "amplitude",
            NumericField::AvgAmplitude20 => "avg_amplitude20",
            NumericField::Score => "score",
            NumericField::Other(name) => name,
        }
    }
}

impl From<String> for NumericField {
    fn from(name: String) -> Self {
        NumericField::from_name(&name)
    }
}

impl From<NumericField> for String {
    fn from(field: NumericField) -> Self {
        field.name().to_string()
    }
}

impl fmt::Display for NumericField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    pub symbol: String,
    pub market: String,
    pub industry: String,
    pub trade_date: NaiveDate,

    pub close: f64,
    pub change: f64,
    pub change_rate: f64,

    pub return5: Option<f64>,
    pub return20: Option<f64>,
    pub return60: Option<f64>,
    pub ma5: Option<f64>,
    pub ma10: Option<f64>,
    pub ma20: Option<f64>,
    pub ma60: Option<f64>,
    pub deviation20: Option<f64>,
    pub high20: Option<f64>,
    pub low20: Option<f64>,
    pub range_pos20: Option<f64>,
    pub volume_multiple: Option<f64>,
    pub amplitude: Option<f64>,
    pub avg_amplitude20: Option<f64>,

    pub score: f64,
    pub tags: Vec<Tag>,
    pub success: bool,
    pub error_reason: Option<String>,
}

impl AnalyticsSnapshot {
    /// A successful snapshot with only identity and close set.
    pub fn new(symbol: &str, trade_date: NaiveDate, close: f64) -> Self {
        AnalyticsSnapshot {
            symbol: symbol.to_string(),
            market: String::new(),
            industry: String::new(),
            trade_date,
            close,
            change: 0.0,
            change_rate: 0.0,
            return5: None,
            return20: None,
            return60: None,
            ma5: None,
            ma10: None,
            ma20: None,
            ma60: None,
            deviation20: None,
            high20: None,
            low20: None,
            range_pos20: None,
            volume_multiple: None,
            amplitude: None,
            avg_amplitude20: None,
            score: 0.0,
            tags: Vec::new(),
            success: true,
            error_reason: None,
        }
    }

    pub fn value(&self, field: &NumericField) -> Option<f64> {
        match field {
            NumericField::Close => Some(self.close),
            NumericField::Change => Some(self.change),
            NumericField::ChangeRate => Some(self.change_rate),
            NumericField::Return5 => self.return5,
            NumericField::Return20 => self.return20,
            NumericField::Return60 => self.return60,
            NumericField::Ma5 => self.ma5,
            NumericField::Ma10 => self.ma10,
            NumericField::Ma20 => self.ma20,
            NumericField::Ma60 => self.ma60,
            NumericField::Deviation20 => self.deviation20,
            NumericField::High20 => self.high20,
            NumericField::Low20 => self.low20,
            NumericField::RangePos20 => self.range_pos20,
            NumericField::VolumeMultiple => self.volume_multiple,
            NumericField::Amplitude => self.amplitude,
            NumericField::AvgAmplitude20 => self.avg_amplitude20,
            NumericField::Score => Some(self.score),
            NumericField::Other(_) => None,
        }
    }

    /// Unknown tags are never present, even if one slipped into `tags`.
    pub fn has_tag(&self, tag: &Tag) -> bool {
        tag.is_known() && self.tags.contains(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AnalyticsSnapshot {
        let mut snap =
            AnalyticsSnapshot::new("AAPL", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), 180.0);
        snap.return5 = Some(0.04);
        snap.score = 72.0;
        snap.tags = vec![Tag::NearHigh];
        snap
    }

    #[test]
    fn value_resolves_present_and_absent_fields() {
        let snap = sample();
        assert_eq!(snap.value(&NumericField::Close), Some(180.0));
        assert_eq!(snap.value(&NumericField::Return5), Some(0.04));
        assert_eq!(snap.value(&NumericField::Return20), None);
        assert_eq!(snap.value(&NumericField::Score), Some(72.0));
    }

    #[test]
    fn unknown_field_name_has_no_value() {
        let field = NumericField::from_name("turnover_rate");
        assert_eq!(field, NumericField::Other("turnover_rate".into()));
        assert_eq!(sample().value(&field), None);
    }

    #[test]
    fn field_names_round_trip() {
        for name in ["range_pos20", "volume_multiple", "avg_amplitude20", "ma60"] {
            assert_eq!(NumericField::from_name(name).name(), name);
        }
        assert_eq!(NumericField::from_name("  Return5 "), NumericField::Return5);
    }

    #[test]
    fn tag_parses_case_insensitively() {
        assert_eq!(Tag::from_name("Volume_Surge"), Tag::VolumeSurge);
        assert_eq!(Tag::from_name(" moonshot "), Tag::Other("moonshot".into()));
        assert!(!Tag::from_name("moonshot").is_known());
        assert_eq!(Tag::LowVolatility.to_string(), "low_volatility");
    }

    #[test]
    fn has_tag() {
        let snap = sample();
        assert!(snap.has_tag(&Tag::NearHigh));
        assert!(!snap.has_tag(&Tag::NearLow));
    }

    #[test]
    fn unknown_tag_is_never_present() {
        let mut snap = sample();
        snap.tags.push(Tag::Other("moonshot".into()));
        assert!(!snap.has_tag(&Tag::Other("moonshot".into())));
    }

    #[test]
    fn serializes_tags_in_snake_case() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains("\"near_high\""));
        let back: AnalyticsSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample());
    }
}
