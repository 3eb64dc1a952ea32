//! INI file configuration adapter.

use crate::domain::error::SigtraderError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SigtraderError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| SigtraderError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, SigtraderError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| SigtraderError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[data]
path = ./data

[strategy]
name = Test Strategy
buy = ALL(GTE(score, 60), MARKET(ASX))
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(adapter.get_string("data", "path"), Some("./data".to_string()));
        assert_eq!(
            adapter.get_string("strategy", "name"),
            Some("Test Strategy".to_string())
        );
        assert_eq!(
            adapter.get_string("strategy", "buy"),
            Some("ALL(GTE(score, 60), MARKET(ASX))".to_string())
        );
    }

    #[test]
    fn rule_lists_with_json_params_survive() {
        let content = "[strategy]\nentry_rules = BASE_SCORE(60), PRICE_RETURN(40, {\"days\": 5, \"min\": 0.01})\n";
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("strategy", "entry_rules"),
            Some("BASE_SCORE(60), PRICE_RETURN(40, {\"days\": 5, \"min\": 0.01})".to_string())
        );
    }

    #[test]
    fn keys_are_case_insensitive() {
        let adapter = FileConfigAdapter::from_string("[Risk]\nFees_Pct = 0.002\n").unwrap();
        assert_eq!(adapter.get_double("risk", "fees_pct", 0.0), 0.002);
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\ninitial_equity = 100\n").unwrap();
        assert_eq!(adapter.get_string("backtest", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_returns_value() {
        let adapter = FileConfigAdapter::from_string("[risk]\ncooldown_days = 5\n").unwrap();
        assert_eq!(adapter.get_int("risk", "cooldown_days", 0), 5);
    }

    #[test]
    fn get_int_returns_default_for_missing() {
        let adapter = FileConfigAdapter::from_string("[risk]\n").unwrap();
        assert_eq!(adapter.get_int("risk", "missing", 42), 42);
    }

    #[test]
    fn get_int_returns_default_for_non_numeric() {
        let adapter = FileConfigAdapter::from_string("[risk]\nmin_hold_days = abc\n").unwrap();
        assert_eq!(adapter.get_int("risk", "min_hold_days", 42), 42);
    }

    #[test]
    fn get_double_returns_value() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\ninitial_equity = 100000.5\n").unwrap();
        assert_eq!(
            adapter.get_double("backtest", "initial_equity", 0.0),
            100000.5
        );
    }

    #[test]
    fn get_double_returns_default_for_non_numeric() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\ninitial_equity = not_a_number\n").unwrap();
        assert_eq!(adapter.get_double("backtest", "initial_equity", 99.9), 99.9);
    }

    #[test]
    fn get_bool_values() {
        let adapter = FileConfigAdapter::from_string(
            "[screener]\na = true\nb = yes\nc = 1\nd = false\ne = no\nf = 0\n",
        )
        .unwrap();
        assert!(adapter.get_bool("screener", "a", false));
        assert!(adapter.get_bool("screener", "b", false));
        assert!(adapter.get_bool("screener", "c", false));
        assert!(!adapter.get_bool("screener", "d", true));
        assert!(!adapter.get_bool("screener", "e", true));
        assert!(!adapter.get_bool("screener", "f", true));
        assert!(adapter.get_bool("screener", "missing", true));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[screener]\nsort = volume_multiple\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("screener", "sort"),
            Some("volume_multiple".to_string())
        );
    }

    #[test]
    fn from_file_missing_is_config_parse_error() {
        let err = FileConfigAdapter::from_file("/nonexistent/path/config.ini")
            .err()
            .unwrap();
        match err {
            SigtraderError::ConfigParse { file, .. } => {
                assert_eq!(file, "/nonexistent/path/config.ini")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
