use rust_decimal::Decimal;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct DetailingConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub store: StoreBackend,
    pub invoicing: InvoicingConfig,
    pub concurrency: ConcurrencyConfig,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoicingConfig {
    /// GST percentage applied to jobs that require it.
    pub gst_rate: Decimal,
    /// Invoice number prefix per business tag.
    pub prefixes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConcurrencyConfig {
    /// Retries after a version conflict before the request is rejected.
    pub max_retries: u32,
}

impl Default for InvoicingConfig {
    fn default() -> Self {
        Self {
            gst_rate: Decimal::from(18),
            prefixes: parse_prefixes(DEFAULT_PREFIXES),
        }
    }
}

const DEFAULT_PREFIXES: &str = "Auto Gamma=AG";

impl DetailingConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let store = match get_env("STORE_BACKEND", Some("mongo"), false)?.as_str() {
            "mongo" => StoreBackend::Mongo,
            "memory" => StoreBackend::Memory,
            other => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "STORE_BACKEND must be 'mongo' or 'memory', got '{}'",
                    other
                )))
            }
        };

        let gst_rate = Decimal::from_str(&get_env("GST_RATE", Some("18"), false)?).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("GST_RATE is not a number: {}", e))
        })?;

        Ok(DetailingConfig {
            common: common_config,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", Some("mongodb://localhost:27017"), is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("detailing_db"), is_prod)?,
            },
            store,
            invoicing: InvoicingConfig {
                gst_rate,
                prefixes: parse_prefixes(&get_env(
                    "BUSINESS_PREFIXES",
                    Some(DEFAULT_PREFIXES),
                    false,
                )?),
            },
            concurrency: ConcurrencyConfig {
                max_retries: get_env("CAS_MAX_RETRIES", Some("5"), false)?
                    .parse()
                    .unwrap_or(5),
            },
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.is_empty()),
        })
    }

    /// In-memory configuration on an ephemeral port.
    pub fn in_memory() -> Self {
        DetailingConfig {
            common: core_config::Config {
                port: 0,
                ..Default::default()
            },
            mongodb: MongoConfig {
                uri: String::new(),
                database: String::new(),
            },
            store: StoreBackend::Memory,
            invoicing: InvoicingConfig::default(),
            concurrency: ConcurrencyConfig { max_retries: 5 },
            otlp_endpoint: None,
        }
    }
}

/// Parse `Name=CODE;Other Name=OTH` into a prefix table.
pub fn parse_prefixes(raw: &str) -> BTreeMap<String, String> {
    raw.split(';')
        .filter_map(|pair| {
            let (name, code) = pair.split_once('=')?;
            let (name, code) = (name.trim(), code.trim());
            if name.is_empty() || code.is_empty() {
                None
            } else {
                Some((name.to_string(), code.to_string()))
            }
        })
        .collect()
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_parse_and_skip_malformed_pairs() {
        let prefixes = parse_prefixes("Auto Gamma=AG; Gamma Coats = GC;broken;=X;Y=");

        assert_eq!(prefixes.len(), 2);
        assert_eq!(prefixes["Auto Gamma"], "AG");
        assert_eq!(prefixes["Gamma Coats"], "GC");
    }
}
