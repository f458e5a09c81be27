#![cfg_attr(test, allow(unused_crate_dependencies))]
//! Settings for the HTTP request metrics middleware, as they appear in a configuration file.
//!
//! ```toml
//! record_in_flight = true
//! grouped_status = false
//! metric_prefix = "myservice"
//! skip_paths = ["/health"]
//!
//! [additional_attributes]
//! "deployment.environment" = "production"
//! ```

use std::collections::BTreeMap;

/// HTTP metrics configuration
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpMetricsConfig {
    /// Track the number of requests currently in flight. Defaults to true.
    pub record_in_flight: bool,
    /// Measure the request duration. Defaults to true.
    pub record_duration: bool,
    /// Measure the request and response sizes. Defaults to true.
    pub record_size: bool,
    /// Collapse status codes to their class (201 becomes 200). Defaults to true.
    pub grouped_status: bool,
    /// Prefix prepended to every metric name, separated with a dot.
    pub metric_prefix: Option<String>,
    /// Value of the `http.server_name` attribute for incoming requests.
    pub server_name: Option<String>,
    /// Replaces the derived attributes with this fixed set.
    pub static_attributes: Option<BTreeMap<String, String>>,
    /// Appended to the derived attributes of every request.
    pub additional_attributes: BTreeMap<String, String>,
    /// Requests with one of these exact paths are not measured.
    pub skip_paths: Vec<String>,
}

impl Default for HttpMetricsConfig {
    fn default() -> Self {
        Self {
            record_in_flight: true,
            record_duration: true,
            record_size: true,
            grouped_status: true,
            metric_prefix: None,
            server_name: None,
            static_attributes: None,
            additional_attributes: BTreeMap::new(),
            skip_paths: Vec::new(),
        }
    }
}

impl HttpMetricsConfig {
    /// True if requests to this path should be measured.
    pub fn records_path(&self, path: &str) -> bool {
        !self.skip_paths.iter().any(|skipped| skipped == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn defaults() {
        let config = toml::from_str::<HttpMetricsConfig>("").unwrap();

        insta::assert_debug_snapshot!(&config, @r###"
        HttpMetricsConfig {
            record_in_flight: true,
            record_duration: true,
            record_size: true,
            grouped_status: true,
            metric_prefix: None,
            server_name: None,
            static_attributes: None,
            additional_attributes: {},
            skip_paths: [],
        }
        "###);
    }

    #[test]
    fn full_config() {
        let config = indoc! {r#"
            record_in_flight = false
            record_duration = false
            record_size = false
            grouped_status = false
            metric_prefix = "billing"
            server_name = "billing-api"
            skip_paths = ["/health", "/ready"]

            [static_attributes]
            team = "payments"

            [additional_attributes]
            "deployment.environment" = "staging"
        "#};

        let config = toml::from_str::<HttpMetricsConfig>(config).unwrap();

        insta::assert_debug_snapshot!(&config, @r###"
        HttpMetricsConfig {
            record_in_flight: false,
            record_duration: false,
            record_size: false,
            grouped_status: false,
            metric_prefix: Some(
                "billing",
            ),
            server_name: Some(
                "billing-api",
            ),
            static_attributes: Some(
                {
                    "team": "payments",
                },
            ),
            additional_attributes: {
                "deployment.environment": "staging",
            },
            skip_paths: [
                "/health",
                "/ready",
            ],
        }
        "###);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = toml::from_str::<HttpMetricsConfig>("record_everything = true");

        assert!(result.is_err());
    }

    #[test]
    fn skip_paths_match_exactly() {
        let config = toml::from_str::<HttpMetricsConfig>(r#"skip_paths = ["/health"]"#).unwrap();

        assert!(!config.records_path("/health"));
        assert!(config.records_path("/health/live"));
        assert!(config.records_path("/users"));
    }
}
