//! INI file configuration adapter.

use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
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

    fn section_keys(&self, section: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .config
            .get_map_ref()
            .get(section)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
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
[simulation]
start = 2025-07-21
frequency = intraday

[analytics]
period = weekly
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("simulation", "start"),
            Some("2025-07-21".to_string())
        );
        assert_eq!(
            adapter.get_string("simulation", "frequency"),
            Some("intraday".to_string())
        );
        assert_eq!(
            adapter.get_string("analytics", "period"),
            Some("weekly".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[simulation]\nstart = 2025-07-21\n").unwrap();
        assert_eq!(adapter.get_string("simulation", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_returns_value() {
        let adapter = FileConfigAdapter::from_string("[simulation]\nduration_days = 30\n").unwrap();
        assert_eq!(adapter.get_int("simulation", "duration_days", 0), 30);
    }

    #[test]
    fn get_int_returns_default_for_missing() {
        let adapter = FileConfigAdapter::from_string("[simulation]\n").unwrap();
        assert_eq!(adapter.get_int("simulation", "duration_days", 30), 30);
    }

    #[test]
    fn get_int_returns_default_for_non_numeric() {
        let adapter =
            FileConfigAdapter::from_string("[simulation]\nduration_days = soon\n").unwrap();
        assert_eq!(adapter.get_int("simulation", "duration_days", 30), 30);
    }

    #[test]
    fn get_double_returns_value() {
        let adapter =
            FileConfigAdapter::from_string("[simulation]\ninitial_cash = 100000.5\n").unwrap();
        assert_eq!(
            adapter.get_double("simulation", "initial_cash", 0.0),
            100000.5
        );
    }

    #[test]
    fn get_double_returns_default_for_missing() {
        let adapter = FileConfigAdapter::from_string("[analytics]\n").unwrap();
        assert_eq!(adapter.get_double("analytics", "risk_free_rate", 0.05), 0.05);
    }

    #[test]
    fn get_double_returns_default_for_non_numeric() {
        let adapter =
            FileConfigAdapter::from_string("[simulation]\ninitial_cash = lots\n").unwrap();
        assert_eq!(
            adapter.get_double("simulation", "initial_cash", 99.9),
            99.9
        );
    }

    #[test]
    fn get_bool_returns_true_values() {
        let adapter =
            FileConfigAdapter::from_string("[simulation]\na = true\nb = yes\nc = 1\n").unwrap();
        assert!(adapter.get_bool("simulation", "a", false));
        assert!(adapter.get_bool("simulation", "b", false));
        assert!(adapter.get_bool("simulation", "c", false));
    }

    #[test]
    fn get_bool_returns_false_values() {
        let adapter =
            FileConfigAdapter::from_string("[simulation]\na = false\nb = no\nc = 0\n").unwrap();
        assert!(!adapter.get_bool("simulation", "a", true));
        assert!(!adapter.get_bool("simulation", "b", true));
        assert!(!adapter.get_bool("simulation", "c", true));
    }

    #[test]
    fn section_keys_sorted() {
        let adapter =
            FileConfigAdapter::from_string("[holdings]\nNVDA = 100\nAMZN = 120\nGOOG = 50\n")
                .unwrap();
        // configparser lowercases keys on load
        assert_eq!(
            adapter.section_keys("holdings"),
            vec!["amzn".to_string(), "goog".to_string(), "nvda".to_string()]
        );
    }

    #[test]
    fn section_keys_empty_for_missing_section() {
        let adapter = FileConfigAdapter::from_string("[simulation]\n").unwrap();
        assert!(adapter.section_keys("holdings").is_empty());
    }

    #[test]
    fn from_file_reads_config() {
        let content = "[simulation]\nstart = 2025-07-21\n";
        let file = create_temp_config(content);
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("simulation", "start"),
            Some("2025-07-21".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/sim.ini");
        assert!(result.is_err());
    }
}
