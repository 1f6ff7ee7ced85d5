//! INI file configuration adapter.
//!
//! Keys are case-sensitive so that `[inputs]` entries match program input
//! names exactly.

use std::path::Path;

use configparser::ini::Ini;

use crate::domain::error::MqlError;
use crate::ports::config_port::ConfigPort;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, MqlError> {
        let path = path.as_ref();
        let mut config = Ini::new_cs();
        config.load(path).map_err(|reason| MqlError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, MqlError> {
        let mut config = Ini::new_cs();
        config
            .read(content.to_string())
            .map_err(|reason| MqlError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
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

    fn section(&self, section: &str) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .config
            .get_map_ref()
            .get(section)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone().unwrap_or_default()))
                    .collect()
            })
            .unwrap_or_default();
        pairs.sort();
        pairs
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

    const SAMPLE: &str = r#"
[backtest]
initial_balance = 5000.5
currency = EUR
symbol = EURUSD
timeframe = 15
visual = yes

[inputs]
FastPeriod = 5
Label = cross
"#;

    #[test]
    fn reads_backtest_section() {
        let adapter = FileConfigAdapter::from_string(SAMPLE).unwrap();
        assert_eq!(adapter.get_double("backtest", "initial_balance", 0.0), 5000.5);
        assert_eq!(adapter.get_string("backtest", "currency"), Some("EUR".to_string()));
        assert_eq!(adapter.get_int("backtest", "timeframe", 0), 15);
        assert!(adapter.get_bool("backtest", "visual", false));
    }

    #[test]
    fn missing_or_malformed_values_use_defaults() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\ntimeframe = abc\n").unwrap();
        assert_eq!(adapter.get_int("backtest", "timeframe", 60), 60);
        assert_eq!(adapter.get_double("backtest", "missing", 99.9), 99.9);
        assert!(adapter.get_bool("backtest", "missing", true));
        assert_eq!(adapter.get_string("nope", "key"), None);
    }

    #[test]
    fn section_keeps_key_case() {
        let adapter = FileConfigAdapter::from_string(SAMPLE).unwrap();
        assert_eq!(
            adapter.section("inputs"),
            vec![
                ("FastPeriod".to_string(), "5".to_string()),
                ("Label".to_string(), "cross".to_string()),
            ]
        );
        assert!(adapter.section("absent").is_empty());
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[backtest]\nsymbol = GBPUSD\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(adapter.get_string("backtest", "symbol"), Some("GBPUSD".to_string()));
    }

    #[test]
    fn from_file_reports_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(matches!(result, Err(MqlError::ConfigParse { .. })));
    }
}
