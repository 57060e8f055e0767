//! Engine configuration
//!
//! Every key is optional:
//!
//! ```toml
//! namespace = "app.Proxies"
//! check-result-types = false
//! ```

use serde::{Deserialize, Serialize};

/// Settings shared by every proxy type a factory synthesizes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ProxyConfig {
    /// Prefix of generated proxy type names (default: "aspect.Proxy")
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Verify interceptor-provided results against the declared return type
    #[serde(default = "default_check_result_types")]
    pub check_result_types: bool,
}

fn default_namespace() -> String {
    "aspect.Proxy".to_string()
}

fn default_check_result_types() -> bool {
    true
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            check_result_types: default_check_result_types(),
        }
    }
}

impl ProxyConfig {
    /// Parse from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize to TOML text
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ProxyConfig::from_toml_str("").unwrap();
        assert_eq!(config, ProxyConfig::default());
        assert_eq!(config.namespace, "aspect.Proxy");
        assert!(config.check_result_types);
    }

    #[test]
    fn test_kebab_case_keys() {
        let config = ProxyConfig::from_toml_str(
            r#"
namespace = "app.Proxies"
check-result-types = false
"#,
        )
        .unwrap();
        assert_eq!(config.namespace, "app.Proxies");
        assert!(!config.check_result_types);
    }

    #[test]
    fn test_round_trip() {
        let config = ProxyConfig {
            namespace: "x".to_string(),
            check_result_types: false,
        };
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("check-result-types = false"));
        assert_eq!(ProxyConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        assert!(ProxyConfig::from_toml_str("check-result-types = \"yes\"").is_err());
    }
}
