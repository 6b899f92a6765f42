//! Construct identity: deterministic identifiers derived from kind and name.
//!
//! An identifier is `kind`, the delimiter, then `name`. Kinds may never
//! contain the delimiter, so splitting at the first delimiter recovers both
//! parts and two distinct `(kind, name)` pairs can never map to the same
//! identifier. Identifiers over the platform length limit are rejected,
//! never truncated.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Separator between scope segments in a construct path.
pub const SCOPE_SEPARATOR: char = '/';

/// Default delimiter between kind and name.
pub const DEFAULT_DELIMITER: char = '-';

/// Default identifier length limit (CloudFormation logical id ceiling).
pub const DEFAULT_MAX_LENGTH: usize = 255;

/// Derives stable identifiers from `(kind, name)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifierGenerator {
    delimiter: char,
    max_length: usize,
}

impl Default for IdentifierGenerator {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            max_length: DEFAULT_MAX_LENGTH,
        }
    }
}

impl IdentifierGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Derive the identifier for `(kind, name)`.
    pub fn identify(&self, kind: &str, name: &str) -> CoreResult<String> {
        if kind.is_empty() {
            return Err(CoreError::EmptyIdentifierPart { part: "kind" });
        }
        if name.is_empty() {
            return Err(CoreError::EmptyIdentifierPart { part: "name" });
        }
        if kind.contains(self.delimiter) {
            return Err(CoreError::DelimiterInKind {
                kind: kind.to_string(),
                delimiter: self.delimiter,
            });
        }
        for (part, value) in [("kind", kind), ("name", name)] {
            if value.contains(SCOPE_SEPARATOR) {
                return Err(CoreError::ScopeSeparatorInIdentifier {
                    part,
                    value: value.to_string(),
                });
            }
        }

        let identifier = format!("{}{}{}", kind, self.delimiter, name);
        let length = identifier.chars().count();
        if length > self.max_length {
            return Err(CoreError::IdentifierTooLong {
                identifier,
                length,
                limit: self.max_length,
            });
        }
        Ok(identifier)
    }

    /// Recover `(kind, name)` from an identifier produced by [`identify`].
    ///
    /// [`identify`]: IdentifierGenerator::identify
    pub fn split<'a>(&self, identifier: &'a str) -> Option<(&'a str, &'a str)> {
        identifier
            .split_once(self.delimiter)
            .filter(|(kind, name)| !kind.is_empty() && !name.is_empty())
    }

    /// Derive a full construct identity under `scope`.
    pub fn construct(&self, scope: &ScopePath, kind: &str, name: &str) -> CoreResult<ConstructIdentity> {
        let id = self.identify(kind, name)?;
        Ok(ConstructIdentity {
            scope: scope.clone(),
            kind: kind.to_string(),
            name: name.to_string(),
            id,
        })
    }
}

/// Path of parent construct ids, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopePath(Vec<String>);

impl ScopePath {
    /// The root scope.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a `/`-separated path, ignoring empty segments.
    pub fn parse(path: &str) -> Self {
        Self(
            path.split(SCOPE_SEPARATOR)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// A child scope one level below this one. The segment must not contain
    /// the scope separator.
    pub fn child(&self, segment: impl Into<String>) -> CoreResult<Self> {
        let segment = segment.into();
        if segment.contains(SCOPE_SEPARATOR) {
            return Err(CoreError::ScopeSeparatorInIdentifier {
                part: "scope segment",
                value: segment,
            });
        }
        let mut segments = self.0.clone();
        segments.push(segment);
        Ok(Self(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ScopePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// A `(scope, kind, name)` triple and the identifier derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstructIdentity {
    pub scope: ScopePath,
    pub kind: String,
    pub name: String,
    pub id: String,
}

impl ConstructIdentity {
    /// Full construct path, `scope/id`.
    pub fn path(&self) -> String {
        if self.scope.is_root() {
            self.id.clone()
        } else {
            format!("{}{}{}", self.scope, SCOPE_SEPARATOR, self.id)
        }
    }
}

impl fmt::Display for ConstructIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

/// Tracks which construct paths have been declared in one pass.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    paths: HashSet<String>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim an identity's path, failing if it is already taken.
    pub fn claim(&mut self, identity: &ConstructIdentity) -> CoreResult<()> {
        let path = identity.path();
        if !self.paths.insert(path.clone()) {
            return Err(CoreError::IdentifierCollision { path });
        }
        Ok(())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
