//! Secret payload schemas.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::mapper::ConfigSchema;
use crate::validator::{compile, Pattern, SchemaValidator};

static URL_PATTERN: Pattern = Pattern::new(|| compile(r"^https?://[^\s/]+(/\S*)?$"));

/// Credentials bundle for the observability stack (Grafana, Prometheus).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ObservabilityCredentials {
    pub grafana_url: String,
    pub grafana_api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prometheus_endpoint: Option<String>,
}

// Keeps the API key out of logs.
impl fmt::Debug for ObservabilityCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservabilityCredentials")
            .field("grafana_url", &self.grafana_url)
            .field("grafana_api_key", &"***")
            .field("prometheus_endpoint", &self.prometheus_endpoint)
            .finish()
    }
}

impl ConfigSchema for ObservabilityCredentials {
    const NAME: &'static str = "ObservabilityCredentials";

    fn validate(&self, validator: &mut SchemaValidator) {
        validator.pattern("grafanaUrl", &self.grafana_url, &URL_PATTERN, "an http(s) URL");
        validator.required("grafanaApiKey", &self.grafana_api_key);
        if let Some(endpoint) = &self.prometheus_endpoint {
            validator.pattern("prometheusEndpoint", endpoint, &URL_PATTERN, "an http(s) URL");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::ConfigMapper;
    use infra_templates::DocumentFormat;

    #[test]
    fn test_parse_and_redact() {
        let credentials: ObservabilityCredentials = ConfigMapper::parse_str(
            "grafana",
            DocumentFormat::Json,
            r#"{"grafanaUrl": "https://grafana.example.com", "grafanaApiKey": "glsa_secret"}"#,
        )
        .unwrap();
        assert_eq!(credentials.grafana_url, "https://grafana.example.com");
        assert!(!format!("{:?}", credentials).contains("glsa_secret"));
    }

    #[test]
    fn test_rejects_bad_url() {
        let err = ConfigMapper::parse_str::<ObservabilityCredentials>(
            "grafana",
            DocumentFormat::Json,
            r#"{"grafanaUrl": "grafana", "grafanaApiKey": ""}"#,
        )
        .unwrap_err();
        assert_eq!(err.violations().len(), 2);
    }
}
