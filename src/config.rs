use std::path::PathBuf;

use crate::saving::SETTINGS_FILE;

/// Runtime settings for the web server
///
/// Read from `WELDLOG_*` environment variables; positional command-line
/// arguments override the master file and header row.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    /// Address to listen on
    pub addr: String,
    /// Column mapping settings file
    pub settings_path: PathBuf,
    /// Master workbook loaded at startup, instead of waiting for an upload
    pub master_path: Option<PathBuf>,
    /// 1-based header row for the startup master file and for uploads
    pub header_row: usize,
    /// Directory served under `/static`
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            addr: "127.0.0.1:3000".to_string(),
            settings_path: PathBuf::from(SETTINGS_FILE),
            master_path: None,
            header_row: 1,
            static_dir: PathBuf::from("static"),
        }
    }
}

impl ServerConfig {
    /// Build from the process environment
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup, falling back to defaults for unset keys
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut config = ServerConfig::default();

        if let Some(addr) = lookup("WELDLOG_ADDR") {
            config.addr = addr;
        }
        if let Some(path) = lookup("WELDLOG_SETTINGS") {
            config.settings_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("WELDLOG_MASTER").filter(|p| !p.is_empty()) {
            config.master_path = Some(PathBuf::from(path));
        }
        if let Some(row) = lookup("WELDLOG_HEADER_ROW") {
            config.header_row = parse_header_row(&row)?;
        }
        if let Some(dir) = lookup("WELDLOG_STATIC_DIR") {
            config.static_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// Apply `[master_path] [header_row]` positional arguments
    pub fn apply_args(&mut self, args: &[String]) -> Result<(), String> {
        if let Some(path) = args.first() {
            self.master_path = Some(PathBuf::from(path));
        }
        if let Some(row) = args.get(1) {
            self.header_row = parse_header_row(row)?;
        }
        Ok(())
    }
}

fn parse_header_row(raw: &str) -> Result<usize, String> {
    match raw.trim().parse::<usize>() {
        Ok(row) if row >= 1 => Ok(row),
        _ => Err(format!("invalid header row '{}': expected a number >= 1", raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_unset() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.settings_path, PathBuf::from("settings.json"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("WELDLOG_ADDR", "0.0.0.0:8080"),
            ("WELDLOG_MASTER", "/data/master.xlsx"),
            ("WELDLOG_HEADER_ROW", "3"),
        ]
        .into_iter()
        .collect();
        let config = ServerConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.addr, "0.0.0.0:8080");
        assert_eq!(config.master_path, Some(PathBuf::from("/data/master.xlsx")));
        assert_eq!(config.header_row, 3);
    }

    #[test]
    fn test_bad_header_row() {
        let err = ServerConfig::from_lookup(|k| (k == "WELDLOG_HEADER_ROW").then(|| "0".to_string()));
        assert!(err.is_err());
    }

    #[test]
    fn test_args_override_env() {
        let mut config = ServerConfig::default();
        config
            .apply_args(&["welds.csv".to_string(), "2".to_string()])
            .unwrap();
        assert_eq!(config.master_path, Some(PathBuf::from("welds.csv")));
        assert_eq!(config.header_row, 2);
    }
}
