//! Condition evaluation against analytics snapshots.
//!
//! Pure functions over borrowed data; safe to call from any number of threads.

use chrono::NaiveDate;

use crate::domain::condition::{CategoryField, Condition, ConditionSet, EmptyPolicy, Logic};
use crate::domain::snapshot::AnalyticsSnapshot;

/// Evaluate a single condition. Absent fields and unknown field names never match.
pub fn matches(snapshot: &AnalyticsSnapshot, condition: &Condition) -> bool {
    match condition {
        Condition::Numeric { field, cmp } => match snapshot.value(field) {
            Some(value) => cmp.holds(value),
            None => false,
        },
        Condition::Category { field, values } => {
            let actual = match field {
                CategoryField::Market => &snapshot.market,
                CategoryField::Industry => &snapshot.industry,
                CategoryField::Other(_) => return false,
            };
            values
                .iter()
                .any(|v| v.trim().eq_ignore_ascii_case(actual.trim()))
        }
        Condition::Tags {
            include_any,
            include_all,
            exclude_any,
        } => {
            if !include_all.iter().all(|t| snapshot.has_tag(t)) {
                return false;
            }
            if !include_any.is_empty() && !include_any.iter().any(|t| snapshot.has_tag(t)) {
                return false;
            }
            !exclude_any.iter().any(|t| snapshot.has_tag(t))
        }
        Condition::Symbols { include, exclude } => {
            let symbol = snapshot.symbol.as_str();
            let allowed = include.is_empty() || include.iter().any(|s| s == symbol);
            allowed && !exclude.iter().any(|s| s == symbol)
        }
    }
}

/// Evaluate a condition set, short-circuiting on the first decisive condition.
pub fn evaluate(snapshot: &AnalyticsSnapshot, set: &ConditionSet, on_empty: EmptyPolicy) -> bool {
    if set.conditions.is_empty() {
        return on_empty == EmptyPolicy::MatchAll;
    }
    match set.logic {
        Logic::And => {
            for condition in &set.conditions {
                if !matches(snapshot, condition) {
                    return false;
                }
            }
            true
        }
        Logic::Or => {
            for condition in &set.conditions {
                if matches(snapshot, condition) {
                    return true;
                }
            }
            false
        }
    }
}

/// True when the `days` most recent snapshots, ending exactly on `date`, all match.
///
/// `history` may be in any order; unsuccessful snapshots are ignored.
pub fn matches_consecutive(
    history: &[AnalyticsSnapshot],
    date: NaiveDate,
    set: &ConditionSet,
    days: usize,
) -> bool {
    if days == 0 {
        return false;
    }
    let mut window: Vec<&AnalyticsSnapshot> = history
        .iter()
        .filter(|s| s.success && s.trade_date <= date)
        .collect();
    window.sort_by_key(|s| s.trade_date);

    if window.len() < days {
        return false;
    }
    if window.last().map(|s| s.trade_date) != Some(date) {
        return false;
    }
    window[window.len() - days..]
        .iter()
        .all(|s| evaluate(s, set, EmptyPolicy::MatchNone))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::condition::Comparison;
    use crate::domain::snapshot::{NumericField, Tag};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn snap(symbol: &str, score: f64) -> AnalyticsSnapshot {
        let mut s = AnalyticsSnapshot::new(symbol, date(10), 50.0);
        s.market = "US".into();
        s.industry = "Semiconductors".into();
        s.score = score;
        s
    }

    fn gte_score(v: f64) -> Condition {
        Condition::numeric(NumericField::Score, Comparison::Gte(v))
    }

    #[test]
    fn numeric_absent_field_is_false() {
        let s = snap("NVDA", 80.0);
        let cond = Condition::numeric(NumericField::Return20, Comparison::Gt(-1.0));
        assert!(!matches(&s, &cond));
        let cond = Condition::numeric(NumericField::Return20, Comparison::Lt(1.0));
        assert!(!matches(&s, &cond));
    }

    #[test]
    fn numeric_present_field_compares() {
        let mut s = snap("NVDA", 80.0);
        s.volume_multiple = Some(2.5);
        let cond = Condition::numeric(
            NumericField::VolumeMultiple,
            Comparison::Between { min: 2.0, max: 3.0 },
        );
        assert!(matches(&s, &cond));
    }

    #[test]
    fn unknown_numeric_field_is_false() {
        let s = snap("NVDA", 80.0);
        let cond = Condition::numeric(NumericField::from_name("pe_ratio"), Comparison::Gt(0.0));
        assert!(!matches(&s, &cond));
    }

    #[test]
    fn category_is_case_insensitive() {
        let s = snap("NVDA", 80.0);
        assert!(matches(&s, &Condition::market(&["us"])));
        assert!(matches(&s, &Condition::industry(&["HK", "semiconductors"])));
        assert!(!matches(&s, &Condition::market(&["HK"])));
    }

    #[test]
    fn unknown_category_field_is_false() {
        let s = snap("NVDA", 80.0);
        let cond = Condition::Category {
            field: CategoryField::Other("sector".into()),
            values: vec!["US".into()],
        };
        assert!(!matches(&s, &cond));
    }

    #[test]
    fn tags_all_any_none() {
        let mut s = snap("NVDA", 80.0);
        s.tags = vec![Tag::ShortTermStrong, Tag::VolumeSurge];

        let cond = Condition::Tags {
            include_any: vec![Tag::NearHigh, Tag::VolumeSurge],
            include_all: vec![Tag::ShortTermStrong],
            exclude_any: vec![Tag::HighVolatility],
        };
        assert!(matches(&s, &cond));

        let missing_all = Condition::Tags {
            include_any: vec![],
            include_all: vec![Tag::ShortTermStrong, Tag::NearHigh],
            exclude_any: vec![],
        };
        assert!(!matches(&s, &missing_all));

        let no_any = Condition::Tags {
            include_any: vec![Tag::NearLow],
            include_all: vec![],
            exclude_any: vec![],
        };
        assert!(!matches(&s, &no_any));

        let excluded = Condition::Tags {
            include_any: vec![],
            include_all: vec![],
            exclude_any: vec![Tag::VolumeSurge],
        };
        assert!(!matches(&s, &excluded));
    }

    #[test]
    fn unknown_tags_never_match_and_never_exclude() {
        let mut s = snap("NVDA", 80.0);
        s.tags = vec![Tag::VolumeSurge];
        let unknown = Tag::from_name("momentum_breakout");

        let any = Condition::Tags {
            include_any: vec![unknown.clone()],
            include_all: vec![],
            exclude_any: vec![],
        };
        assert!(!matches(&s, &any));

        let any_with_known = Condition::Tags {
            include_any: vec![unknown.clone(), Tag::VolumeSurge],
            include_all: vec![],
            exclude_any: vec![],
        };
        assert!(matches(&s, &any_with_known));

        let all = Condition::Tags {
            include_any: vec![],
            include_all: vec![Tag::VolumeSurge, unknown.clone()],
            exclude_any: vec![],
        };
        assert!(!matches(&s, &all));

        let none = Condition::Tags {
            include_any: vec![],
            include_all: vec![],
            exclude_any: vec![unknown],
        };
        assert!(matches(&s, &none));
    }

    #[test]
    fn symbols_include_and_exclude() {
        let s = snap("NVDA", 80.0);
        let include = Condition::Symbols {
            include: vec!["AMD".into(), "NVDA".into()],
            exclude: vec![],
        };
        assert!(matches(&s, &include));

        let exclude_only = Condition::Symbols {
            include: vec![],
            exclude: vec!["TSLA".into()],
        };
        assert!(matches(&s, &exclude_only));

        let both = Condition::Symbols {
            include: vec!["NVDA".into()],
            exclude: vec!["NVDA".into()],
        };
        assert!(!matches(&s, &both));
    }

    #[test]
    fn and_requires_all() {
        let s = snap("NVDA", 80.0);
        let set = ConditionSet::all(vec![gte_score(60.0), Condition::market(&["US"])]);
        assert!(evaluate(&s, &set, EmptyPolicy::MatchNone));
        let set = ConditionSet::all(vec![gte_score(90.0), Condition::market(&["US"])]);
        assert!(!evaluate(&s, &set, EmptyPolicy::MatchNone));
    }

    #[test]
    fn or_requires_any() {
        let s = snap("NVDA", 80.0);
        let set = ConditionSet::any(vec![gte_score(90.0), Condition::market(&["US"])]);
        assert!(evaluate(&s, &set, EmptyPolicy::MatchNone));
        let set = ConditionSet::any(vec![gte_score(90.0), Condition::market(&["HK"])]);
        assert!(!evaluate(&s, &set, EmptyPolicy::MatchNone));
    }

    #[test]
    fn empty_set_follows_policy() {
        let s = snap("NVDA", 80.0);
        let empty = ConditionSet::default();
        assert!(evaluate(&s, &empty, EmptyPolicy::MatchAll));
        assert!(!evaluate(&s, &empty, EmptyPolicy::MatchNone));
        let empty_or = ConditionSet::any(vec![]);
        assert!(evaluate(&s, &empty_or, EmptyPolicy::MatchAll));
    }

    fn history(scores: &[f64]) -> Vec<AnalyticsSnapshot> {
        scores
            .iter()
            .enumerate()
            .map(|(i, &score)| {
                let mut s = snap("NVDA", score);
                s.trade_date = date(1 + i as u32);
                s
            })
            .collect()
    }

    #[test]
    fn consecutive_requires_streak_ending_on_date() {
        let set = ConditionSet::all(vec![gte_score(60.0)]);
        let mut hist = history(&[40.0, 70.0, 75.0, 80.0]);
        hist.reverse();
        assert!(matches_consecutive(&hist, date(4), &set, 3));
        assert!(!matches_consecutive(&hist, date(4), &set, 4));
        assert!(!matches_consecutive(&hist, date(5), &set, 1));
    }

    #[test]
    fn consecutive_ignores_failed_snapshots() {
        let set = ConditionSet::all(vec![gte_score(60.0)]);
        let mut hist = history(&[70.0, 75.0, 80.0]);
        hist[2].success = false;
        assert!(!matches_consecutive(&hist, date(3), &set, 2));
        assert!(matches_consecutive(&hist, date(2), &set, 2));
    }

    #[test]
    fn consecutive_zero_days_never_matches() {
        let set = ConditionSet::all(vec![gte_score(0.0)]);
        assert!(!matches_consecutive(&history(&[50.0]), date(1), &set, 0));
    }
}
