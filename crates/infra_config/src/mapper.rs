//! Mapping of resolved documents onto typed, validated schemas.

use infra_templates::{DocumentFormat, ResolvedDocument};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::validator::{SchemaValidator, Violation};

/// A typed configuration shape with its own validation rules.
pub trait ConfigSchema: DeserializeOwned {
    /// Schema name used in error messages.
    const NAME: &'static str;

    /// Check the rules the type system cannot express.
    fn validate(&self, validator: &mut SchemaValidator);
}

/// Parses resolved documents into config schemas.
///
/// A document either maps to a fully valid value or fails with every
/// violation found; no partially accepted value is ever returned.
pub struct ConfigMapper;

impl ConfigMapper {
    /// Parse a resolved document into `T`.
    pub fn parse<T: ConfigSchema>(document: &ResolvedDocument) -> ConfigResult<T> {
        Self::parse_str(document.source(), document.format(), document.text())
    }

    /// Parse raw text in a declared format into `T`.
    pub fn parse_str<T: ConfigSchema>(
        source: &str,
        format: DocumentFormat,
        text: &str,
    ) -> ConfigResult<T> {
        let parsed: Result<T, (String, String)> = match format {
            DocumentFormat::Json => {
                let raw: serde_json::Value =
                    serde_json::from_str(text).map_err(|e| invalid(source, format, e))?;
                serde_path_to_error::deserialize(raw)
                    .map_err(|e| (e.path().to_string(), e.into_inner().to_string()))
            }
            DocumentFormat::Yaml => {
                let raw: serde_yaml::Value =
                    serde_yaml::from_str(text).map_err(|e| invalid(source, format, e))?;
                serde_path_to_error::deserialize(raw)
                    .map_err(|e| (e.path().to_string(), e.into_inner().to_string()))
            }
        };

        let value = parsed.map_err(|(path, message)| {
            let violation = Violation::from_serde(&path, &message);
            warn!(
                "{} rejected by {} at {} [{}]",
                source,
                T::NAME,
                violation.path,
                violation.rule
            );
            ConfigError::SchemaValidationFailure {
                schema: T::NAME,
                document: source.to_string(),
                violations: vec![violation],
            }
        })?;

        let mut validator = SchemaValidator::new();
        value.validate(&mut validator);
        if !validator.is_valid() {
            let violations = validator.into_violations();
            warn!(
                "{} rejected by {}: {} violation(s)",
                source,
                T::NAME,
                violations.len()
            );
            return Err(ConfigError::SchemaValidationFailure {
                schema: T::NAME,
                document: source.to_string(),
                violations,
            });
        }

        debug!("Mapped {} onto {}", source, T::NAME);
        Ok(value)
    }
}

fn invalid(source: &str, format: DocumentFormat, error: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidDocument {
        document: source.to_string(),
        format,
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::ViolationRule;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Deserialize)]
    #[serde(rename_all = "camelCase", deny_unknown_fields)]
    struct Probe {
        name: String,
        #[serde(default)]
        limit: u32,
    }

    impl ConfigSchema for Probe {
        const NAME: &'static str = "Probe";

        fn validate(&self, validator: &mut SchemaValidator) {
            validator.required("name", &self.name);
            validator.range("limit", self.limit, 0, 10);
        }
    }

    #[test]
    fn test_parse_json_and_yaml() {
        let json: Probe = ConfigMapper::parse_str("p.json", DocumentFormat::Json, r#"{"name": "a", "limit": 3}"#).unwrap();
        let yaml: Probe = ConfigMapper::parse_str("p.yaml", DocumentFormat::Yaml, "name: a\nlimit: 3\n").unwrap();
        assert_eq!(json, yaml);
    }

    #[test]
    fn test_syntax_error_is_invalid_document() {
        let err = ConfigMapper::parse_str::<Probe>("p.json", DocumentFormat::Json, "{\"name\": ").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDocument { format: DocumentFormat::Json, .. }));
    }

    #[test]
    fn test_rule_violations_are_collected() {
        let err = ConfigMapper::parse_str::<Probe>("p.yaml", DocumentFormat::Yaml, "name: ''\nlimit: 11\n").unwrap_err();
        let rules: Vec<_> = err.violations().iter().map(|v| v.rule).collect();
        assert_eq!(rules, vec![ViolationRule::Required, ViolationRule::Range]);
        assert!(err.to_string().contains("Probe"));
        assert!(err.to_string().contains("p.yaml"));
    }

    #[test]
    fn test_serde_failure_carries_path() {
        let err = ConfigMapper::parse_str::<Probe>("p.yaml", DocumentFormat::Yaml, "limit: 1\n").unwrap_err();
        assert_eq!(err.violations()[0].path, "name");
        assert_eq!(err.violations()[0].rule, ViolationRule::Required);

        let err = ConfigMapper::parse_str::<Probe>("p.yaml", DocumentFormat::Yaml, "name: a\nextra: 1\n").unwrap_err();
        assert_eq!(err.violations()[0].rule, ViolationRule::UnknownField);
    }
}
