//! Rule checks shared by every config schema.
//!
//! A [`SchemaValidator`] collects every violation it sees instead of stopping
//! at the first one, so a broken document is reported in a single pass.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// A schema pattern, compiled once on first use.
pub type Pattern = LazyLock<Regex>;

/// Compile a built-in schema pattern. Panics on an invalid pattern, which
/// is a programming error rather than bad input.
pub fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid schema pattern {}: {}", pattern, e))
}

/// The kind of rule a field violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationRule {
    /// A mandatory field is missing or empty
    Required,
    /// Exactly one of several fields must be set
    MutualExclusion,
    /// Value is outside a closed set
    AllowedValues,
    /// Number is outside its bounds
    Range,
    /// String does not match its expected shape
    Pattern,
    /// Field presence depends on another field
    Dependent,
    /// Field is not part of the schema
    UnknownField,
    /// Value has the wrong type
    Type,
}

impl ViolationRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationRule::Required => "required",
            ViolationRule::MutualExclusion => "mutual_exclusion",
            ViolationRule::AllowedValues => "allowed_values",
            ViolationRule::Range => "range",
            ViolationRule::Pattern => "pattern",
            ViolationRule::Dependent => "dependent",
            ViolationRule::UnknownField => "unknown_field",
            ViolationRule::Type => "type",
        }
    }
}

impl fmt::Display for ViolationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed rule, located by field path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Dotted field path, `.` for the document root
    pub path: String,
    pub rule: ViolationRule,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, rule: ViolationRule, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            rule,
            message: message.into(),
        }
    }

    /// Build a violation from a deserializer message and the path it failed at.
    pub fn from_serde(path: &str, message: &str) -> Self {
        let field = backticked(message);
        let (rule, path) = if message.starts_with("missing field") {
            (ViolationRule::Required, join(path, field.unwrap_or_default()))
        } else if message.starts_with("unknown field") {
            let field = field.unwrap_or_default();
            let path = if path == field || path.ends_with(&format!(".{}", field)) {
                path.to_string()
            } else {
                join(path, field)
            };
            (ViolationRule::UnknownField, path)
        } else if message.starts_with("unknown variant") {
            (ViolationRule::AllowedValues, path.to_string())
        } else {
            (ViolationRule::Type, path.to_string())
        };
        Self::new(path, rule, message)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} [{}]", self.path, self.message, self.rule)
    }
}

fn backticked(message: &str) -> Option<&str> {
    let start = message.find('`')? + 1;
    let len = message[start..].find('`')?;
    Some(&message[start..start + len])
}

fn join(parent: &str, field: &str) -> String {
    if parent.is_empty() || parent == "." {
        field.to_string()
    } else {
        format!("{}.{}", parent, field)
    }
}

/// Collects rule violations while a schema walks its fields.
#[derive(Debug, Default)]
pub struct SchemaValidator {
    scope: Vec<String>,
    violations: Vec<Violation>,
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full path of `field` under the current scope.
    pub fn path(&self, field: &str) -> String {
        let mut segments: Vec<&str> = self.scope.iter().map(String::as_str).collect();
        if !field.is_empty() {
            segments.push(field);
        }
        if segments.is_empty() {
            ".".to_string()
        } else {
            segments.join(".")
        }
    }

    /// Run `f` with every path prefixed by `field`.
    pub fn nested(&mut self, field: impl Into<String>, f: impl FnOnce(&mut Self)) {
        self.scope.push(field.into());
        f(self);
        self.scope.pop();
    }

    /// Run `f` for an element of a list field.
    pub fn element(&mut self, field: &str, index: usize, f: impl FnOnce(&mut Self)) {
        self.nested(format!("{}[{}]", field, index), f);
    }

    pub fn add(&mut self, field: &str, rule: ViolationRule, message: impl Into<String>) {
        let violation = Violation::new(self.path(field), rule, message);
        self.violations.push(violation);
    }

    /// The string must not be empty or blank.
    pub fn required(&mut self, field: &str, value: &str) -> bool {
        if value.trim().is_empty() {
            self.add(field, ViolationRule::Required, "must not be empty");
            return false;
        }
        true
    }

    /// The list must contain at least one entry.
    pub fn non_empty<T>(&mut self, field: &str, values: &[T]) -> bool {
        if values.is_empty() {
            self.add(field, ViolationRule::Required, "must contain at least one entry");
            return false;
        }
        true
    }

    /// Exactly one of `fields` must be set. The violation names every field.
    pub fn exactly_one(&mut self, fields: &[(&str, bool)]) -> bool {
        let set = fields.iter().filter(|(_, present)| *present).count();
        if set == 1 {
            return true;
        }

        let names: Vec<String> = fields.iter().map(|(name, _)| self.path(name)).collect();
        let message = if set == 0 {
            format!("exactly one of {} must be set, none is", names.join(", "))
        } else {
            let chosen: Vec<&str> = fields
                .iter()
                .filter(|(_, present)| *present)
                .map(|(name, _)| *name)
                .collect();
            format!(
                "exactly one of {} must be set, found {}",
                names.join(", "),
                chosen.join(" and ")
            )
        };
        self.violations.push(Violation::new(
            names.join(", "),
            ViolationRule::MutualExclusion,
            message,
        ));
        false
    }

    /// `min <= value <= max`.
    pub fn range<T>(&mut self, field: &str, value: T, min: T, max: T) -> bool
    where
        T: PartialOrd + fmt::Display,
    {
        if value < min || value > max {
            self.add(
                field,
                ViolationRule::Range,
                format!("{} is outside {}..={}", value, min, max),
            );
            return false;
        }
        true
    }

    /// `value >= min`.
    pub fn at_least<T>(&mut self, field: &str, value: T, min: T) -> bool
    where
        T: PartialOrd + fmt::Display,
    {
        if value < min {
            self.add(field, ViolationRule::Range, format!("{} must be at least {}", value, min));
            return false;
        }
        true
    }

    /// The string must match `pattern`; `expected` describes the shape.
    pub fn pattern(&mut self, field: &str, value: &str, pattern: &Regex, expected: &str) -> bool {
        let matched = pattern.is_match(value);
        if !matched {
            self.add(
                field,
                ViolationRule::Pattern,
                format!("'{}' is not {}", value, expected),
            );
        }
        matched
    }

    /// The string must be one of `allowed`.
    pub fn allowed(&mut self, field: &str, value: &str, allowed: &[&str]) -> bool {
        if !allowed.contains(&value) {
            self.add(
                field,
                ViolationRule::AllowedValues,
                format!("'{}' is not one of {}", value, allowed.join(", ")),
            );
            return false;
        }
        true
    }

    /// `field` must be set exactly when `condition` holds.
    pub fn dependent(&mut self, field: &str, present: bool, required: bool, condition: &str) -> bool {
        match (present, required) {
            (false, true) => {
                self.add(field, ViolationRule::Dependent, format!("is required when {}", condition));
                false
            }
            (true, false) => {
                self.add(
                    field,
                    ViolationRule::Dependent,
                    format!("is only allowed when {}", condition),
                );
                false
            }
            _ => true,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_paths() {
        let mut validator = SchemaValidator::new();
        validator.nested("partitionKey", |v| {
            v.required("name", "");
        });
        validator.element("globalSecondaryIndexes", 1, |v| {
            v.required("indexName", " ");
        });

        let paths: Vec<_> = validator.violations().iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["partitionKey.name", "globalSecondaryIndexes[1].indexName"]);
    }

    #[test]
    fn test_exactly_one_names_every_field() {
        let mut validator = SchemaValidator::new();
        assert!(validator.exactly_one(&[("onDemand", true), ("provisioned", false)]));
        assert!(!validator.exactly_one(&[("onDemand", true), ("provisioned", true)]));
        assert!(!validator.exactly_one(&[("onDemand", false), ("provisioned", false)]));

        let violations = validator.into_violations();
        assert_eq!(violations.len(), 2);
        for violation in &violations {
            assert_eq!(violation.rule, ViolationRule::MutualExclusion);
            assert!(violation.path.contains("onDemand"));
            assert!(violation.path.contains("provisioned"));
        }
        assert!(violations[0].message.contains("found onDemand and provisioned"));
        assert!(violations[1].message.contains("none is"));
    }

    #[test]
    fn test_range_pattern_dependent() {
        let mut validator = SchemaValidator::new();
        assert!(validator.range("delay", 900u32, 0, 900));
        assert!(!validator.range("delay", 901u32, 0, 900));
        let lowercase = compile(r"^[a-z]+$");
        assert!(validator.pattern("name", "orders", &lowercase, "lowercase"));
        assert!(!validator.pattern("name", "Orders!", &lowercase, "lowercase"));
        assert!(!validator.dependent("kmsKeyArn", false, true, "encryption is customerManaged"));
        assert!(!validator.dependent("kmsKeyArn", true, false, "encryption is customerManaged"));
        assert!(validator.dependent("kmsKeyArn", false, false, "encryption is customerManaged"));

        let rules: Vec<_> = validator.violations().iter().map(|v| v.rule).collect();
        assert_eq!(
            rules,
            vec![ViolationRule::Range, ViolationRule::Pattern, ViolationRule::Dependent, ViolationRule::Dependent]
        );
    }

    #[test]
    fn test_from_serde_classification() {
        let missing = Violation::from_serde("vpcCni", "missing field `version`");
        assert_eq!(missing.rule, ViolationRule::Required);
        assert_eq!(missing.path, "vpcCni.version");

        let root = Violation::from_serde(".", "missing field `coreDns`");
        assert_eq!(root.path, "coreDns");

        let variant = Violation::from_serde(
            "removalPolicy",
            "unknown variant `keep`, expected one of `destroy`, `retain`, `snapshot`",
        );
        assert_eq!(variant.rule, ViolationRule::AllowedValues);
        assert_eq!(variant.path, "removalPolicy");

        let unknown = Violation::from_serde(".", "unknown field `color`, expected `tableName`");
        assert_eq!(unknown.rule, ViolationRule::UnknownField);
        assert_eq!(unknown.path, "color");

        let wrong = Violation::from_serde("delaySeconds", "invalid type: string \"x\", expected u32");
        assert_eq!(wrong.rule, ViolationRule::Type);
    }

    #[test]
    #[should_panic(expected = "invalid schema pattern")]
    fn test_bad_pattern_is_a_programming_error() {
        compile(r"^[a-z");
    }
}
