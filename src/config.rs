use std::env;
use std::path::PathBuf;

use crate::forecast::DEFAULT_BLOCK_WIDTH;
use crate::importers::DEFAULT_SHEET_NAME;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub workbook_path: PathBuf,
    pub sheet_name: String,
    pub block_width: usize,
    pub reject_empty_authorities: bool,
    pub server_host: String,
    pub server_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Build a config from any variable lookup (the environment, or a map in tests)
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let block_width = match var("FORECAST_BLOCK_WIDTH") {
            Some(value) => match value.trim().parse::<usize>() {
                Ok(width) if width > 0 => width,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "FORECAST_BLOCK_WIDTH",
                        value,
                        reason: "expected a positive integer",
                    })
                }
            },
            None => DEFAULT_BLOCK_WIDTH,
        };

        let reject_empty_authorities = match var("FORECAST_STRICT_AUTHORITIES") {
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "FORECAST_STRICT_AUTHORITIES",
                        value,
                        reason: "expected true or false",
                    })
                }
            },
            None => false,
        };

        Ok(Config {
            workbook_path: var("FORECAST_WORKBOOK_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("Prognoser.xlsx")),
            sheet_name: var("FORECAST_SHEET_NAME").unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string()),
            block_width,
            reject_empty_authorities,
            server_host: var("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            server_port: var("SERVER_PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse()
                .unwrap_or(8080),
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
