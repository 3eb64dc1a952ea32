//! Configuration validation.
//!
//! Checks raw config values before any domain object is built, so errors
//! name the offending section and key.

use std::str::FromStr;

use crate::domain::error::SigtraderError;
use crate::domain::risk::{OrderSizeMode, PriceMode};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Non-empty trimmed value of `section.key`.
pub fn non_empty(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn require(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, SigtraderError> {
    non_empty(config, section, key).ok_or_else(|| SigtraderError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    })
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> SigtraderError {
    SigtraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Parse `section.key` when present. A present but unparseable value is an
/// error rather than a silent default.
pub fn parse_optional<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, SigtraderError> {
    match non_empty(config, section, key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| invalid(section, key, format!("cannot parse '{}'", raw))),
    }
}

pub fn parse_date(config: &dyn ConfigPort, section: &str, key: &str) -> Result<NaiveDate, SigtraderError> {
    let raw = require(config, section, key)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map_err(|_| invalid(section, key, format!("invalid {} format, expected YYYY-MM-DD", key)))
}

pub fn parse_optional_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDate>, SigtraderError> {
    match non_empty(config, section, key) {
        None => Ok(None),
        Some(_) => parse_date(config, section, key).map(Some),
    }
}

/// Comma-separated positive integers, e.g. `3,5,10`.
pub fn parse_horizons(raw: &str) -> Result<Vec<usize>, SigtraderError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<usize>() {
            Ok(h) if h > 0 => Ok(h),
            _ => Err(invalid(
                "backtest",
                "horizons",
                format!("'{}' is not a positive whole number of days", s),
            )),
        })
        .collect()
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    require(config, "data", "path")?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    let start = parse_date(config, "backtest", "start_date")?;
    let end = parse_date(config, "backtest", "end_date")?;
    if start > end {
        return Err(invalid(
            "backtest",
            "start_date",
            "start_date must not be after end_date",
        ));
    }
    if let Some(equity) = parse_optional::<f64>(config, "backtest", "initial_equity")? {
        if !(equity > 0.0) || !equity.is_finite() {
            return Err(invalid(
                "backtest",
                "initial_equity",
                "initial_equity must be positive",
            ));
        }
    }
    if let Some(raw) = non_empty(config, "backtest", "horizons") {
        parse_horizons(&raw)?;
    }
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    require(config, "strategy", "name")?;
    require(config, "strategy", "symbol")?;

    let mode = non_empty(config, "strategy", "mode").unwrap_or_else(|| "conditions".to_string());
    match mode.to_ascii_lowercase().as_str() {
        "conditions" => {
            require(config, "strategy", "buy")?;
            require(config, "strategy", "sell")?;
        }
        "scoring" => {
            require(config, "strategy", "entry_rules")?;
            let threshold = require(config, "strategy", "entry_threshold")?;
            if threshold.parse::<f64>().map(|t| !t.is_finite()).unwrap_or(true) {
                return Err(invalid(
                    "strategy",
                    "entry_threshold",
                    "entry_threshold must be a number",
                ));
            }
            if let Some(t) = parse_optional::<f64>(config, "strategy", "exit_threshold")? {
                if !t.is_finite() {
                    return Err(invalid(
                        "strategy",
                        "exit_threshold",
                        "exit_threshold must be a number",
                    ));
                }
            }
        }
        other => {
            return Err(invalid(
                "strategy",
                "mode",
                format!("unknown mode '{}' (expected conditions or scoring)", other),
            ));
        }
    }

    validate_risk_config(config)
}

pub fn validate_risk_config(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    if let Some(raw) = non_empty(config, "risk", "order_size_mode") {
        OrderSizeMode::from_str(&raw).map_err(|e| invalid("risk", "order_size_mode", e.to_string()))?;
    }
    if let Some(raw) = non_empty(config, "risk", "price_mode") {
        PriceMode::from_str(&raw).map_err(|e| invalid("risk", "price_mode", e.to_string()))?;
    }
    if let Some(v) = parse_optional::<f64>(config, "risk", "order_size_value")? {
        if !(v > 0.0) || !v.is_finite() {
            return Err(invalid(
                "risk",
                "order_size_value",
                "order_size_value must be positive",
            ));
        }
    }
    for key in ["fees_pct", "slippage_pct"] {
        if let Some(v) = parse_optional::<f64>(config, "risk", key)? {
            if v < 0.0 || !v.is_finite() {
                return Err(invalid("risk", key, format!("{} must be non-negative", key)));
            }
        }
    }
    for key in ["stop_loss_pct", "take_profit_pct", "max_daily_loss_pct"] {
        if let Some(v) = parse_optional::<f64>(config, "risk", key)? {
            if !(v > 0.0) || !v.is_finite() {
                return Err(invalid("risk", key, format!("{} must be positive", key)));
            }
        }
    }
    for key in ["cooldown_days", "min_hold_days"] {
        parse_optional::<u32>(config, "risk", key)?;
    }
    if let Some(v) = parse_optional::<u32>(config, "risk", "max_positions")? {
        if v < 1 {
            return Err(invalid(
                "risk",
                "max_positions",
                "max_positions must be at least 1",
            ));
        }
    }
    Ok(())
}

pub fn validate_screener_config(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    parse_optional_date(config, "screener", "date")?;
    parse_optional::<usize>(config, "screener", "offset")?;
    parse_optional::<usize>(config, "screener", "limit")?;
    parse_optional::<usize>(config, "screener", "streak_days")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MockConfig {
        values: HashMap<(String, String), String>,
    }

    impl MockConfig {
        fn new(entries: &[(&str, &str, &str)]) -> Self {
            let values = entries
                .iter()
                .map(|(s, k, v)| ((s.to_string(), k.to_string()), v.to_string()))
                .collect();
            Self { values }
        }
    }

    impl ConfigPort for MockConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.values
                .get(&(section.to_string(), key.to_string()))
                .cloned()
        }

        fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
    }

    fn valid_backtest() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("backtest", "start_date", "2024-01-01"),
            ("backtest", "end_date", "2024-06-30"),
            ("backtest", "initial_equity", "10000"),
        ]
    }

    fn valid_strategy() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("strategy", "name", "Momentum"),
            ("strategy", "symbol", "BHP"),
            ("strategy", "buy", "GTE(score, 60)"),
            ("strategy", "sell", "LT(score, 40)"),
        ]
    }

    fn with(
        mut base: Vec<(&'static str, &'static str, &'static str)>,
        extra: &[(&'static str, &'static str, &'static str)],
    ) -> MockConfig {
        for entry in extra {
            base.retain(|(s, k, _)| !(*s == entry.0 && *k == entry.1));
            base.push(*entry);
        }
        MockConfig::new(&base)
    }

    fn assert_invalid(result: Result<(), SigtraderError>, expected_key: &str) {
        match result {
            Err(SigtraderError::ConfigInvalid { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("expected ConfigInvalid for {}, got {:?}", expected_key, other),
        }
    }

    fn assert_missing(result: Result<(), SigtraderError>, expected_key: &str) {
        match result {
            Err(SigtraderError::ConfigMissing { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("expected ConfigMissing for {}, got {:?}", expected_key, other),
        }
    }

    #[test]
    fn valid_backtest_config_passes() {
        assert!(validate_backtest_config(&MockConfig::new(&valid_backtest())).is_ok());
    }

    #[test]
    fn single_day_range_is_allowed() {
        let config = with(valid_backtest(), &[("backtest", "end_date", "2024-01-01")]);
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn inverted_dates_rejected() {
        let config = with(valid_backtest(), &[("backtest", "start_date", "2024-07-01")]);
        assert_invalid(validate_backtest_config(&config), "start_date");
    }

    #[test]
    fn missing_end_date() {
        let mut entries = valid_backtest();
        entries.retain(|(_, k, _)| *k != "end_date");
        assert_missing(
            validate_backtest_config(&MockConfig::new(&entries)),
            "end_date",
        );
    }

    #[test]
    fn bad_date_format() {
        let config = with(valid_backtest(), &[("backtest", "start_date", "01/01/2024")]);
        assert_invalid(validate_backtest_config(&config), "start_date");
    }

    #[test]
    fn non_positive_equity() {
        let config = with(valid_backtest(), &[("backtest", "initial_equity", "0")]);
        assert_invalid(validate_backtest_config(&config), "initial_equity");
        let config = with(valid_backtest(), &[("backtest", "initial_equity", "lots")]);
        assert_invalid(validate_backtest_config(&config), "initial_equity");
    }

    #[test]
    fn horizons_parse() {
        assert_eq!(parse_horizons("3, 5,10").unwrap(), vec![3, 5, 10]);
        assert!(parse_horizons("3,0").is_err());
        let config = with(valid_backtest(), &[("backtest", "horizons", "3,x")]);
        assert_invalid(validate_backtest_config(&config), "horizons");
    }

    #[test]
    fn valid_strategy_config_passes() {
        assert!(validate_strategy_config(&MockConfig::new(&valid_strategy())).is_ok());
    }

    #[test]
    fn conditions_mode_needs_sell() {
        let mut entries = valid_strategy();
        entries.retain(|(_, k, _)| *k != "sell");
        assert_missing(validate_strategy_config(&MockConfig::new(&entries)), "sell");
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let config = with(valid_strategy(), &[("strategy", "symbol", "   ")]);
        assert_missing(validate_strategy_config(&config), "symbol");
    }

    #[test]
    fn scoring_mode_keys() {
        let config = with(
            valid_strategy(),
            &[
                ("strategy", "mode", "scoring"),
                ("strategy", "entry_rules", "BASE_SCORE(1)"),
            ],
        );
        assert_missing(validate_strategy_config(&config), "entry_threshold");

        let config = with(
            valid_strategy(),
            &[
                ("strategy", "mode", "scoring"),
                ("strategy", "entry_rules", "BASE_SCORE(1)"),
                ("strategy", "entry_threshold", "high"),
            ],
        );
        assert_invalid(validate_strategy_config(&config), "entry_threshold");

        let config = with(
            valid_strategy(),
            &[
                ("strategy", "mode", "scoring"),
                ("strategy", "entry_rules", "BASE_SCORE(1)"),
                ("strategy", "entry_threshold", "70"),
            ],
        );
        assert!(validate_strategy_config(&config).is_ok());
    }

    #[test]
    fn unknown_mode() {
        let config = with(valid_strategy(), &[("strategy", "mode", "magic")]);
        assert_invalid(validate_strategy_config(&config), "mode");
    }

    #[test]
    fn risk_values() {
        let config = with(valid_strategy(), &[("risk", "price_mode", "next_week")]);
        assert_invalid(validate_strategy_config(&config), "price_mode");

        let config = with(valid_strategy(), &[("risk", "order_size_mode", "all_in")]);
        assert_invalid(validate_strategy_config(&config), "order_size_mode");

        let config = with(valid_strategy(), &[("risk", "fees_pct", "-0.1")]);
        assert_invalid(validate_strategy_config(&config), "fees_pct");

        let config = with(valid_strategy(), &[("risk", "stop_loss_pct", "0")]);
        assert_invalid(validate_strategy_config(&config), "stop_loss_pct");

        let config = with(valid_strategy(), &[("risk", "cooldown_days", "-2")]);
        assert_invalid(validate_strategy_config(&config), "cooldown_days");

        let config = with(valid_strategy(), &[("risk", "max_positions", "0")]);
        assert_invalid(validate_strategy_config(&config), "max_positions");

        let config = with(valid_strategy(), &[("risk", "fees_pct", "0")]);
        assert!(validate_strategy_config(&config).is_ok());
    }

    #[test]
    fn screener_values() {
        assert!(validate_screener_config(&MockConfig::new(&[])).is_ok());
        let config = MockConfig::new(&[("screener", "date", "yesterday")]);
        assert_invalid(validate_screener_config(&config), "date");
        let config = MockConfig::new(&[("screener", "limit", "-5")]);
        assert_invalid(validate_screener_config(&config), "limit");
    }

    #[test]
    fn data_path_required() {
        assert_missing(validate_data_config(&MockConfig::new(&[])), "path");
        assert!(validate_data_config(&MockConfig::new(&[("data", "path", "./data")])).is_ok());
    }
}
