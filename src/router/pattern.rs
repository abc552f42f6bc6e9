//! Route template compilation.
//!
//! A template such as `/users/:id` is split on `/` into an ordered list of
//! [`Segment`]s. Each segment is either matched literally or, when written as
//! `:<name>`, captured under `name`. Capture names are ASCII letters only and
//! must be unique within a template; anything else is rejected with a
//! [`PatternError`] at compile time.
//!
//! A compiled [`RoutePattern`] matches a raw request target:
//!
//! | Template     | Target               | Result                                  |
//! |--------------|----------------------|-----------------------------------------|
//! | `/users`     | `/users`             | no params, no query                     |
//! | `/users`     | `/users?search=john` | no params, query `search=john`          |
//! | `/users`     | `/users/`            | no match                                |
//! | `/users/:id` | `/users/123-abc`     | `id → "123-abc"`                        |
//! | `/users/:id` | `/users/ABC`         | no match (captures are lowercase only)  |

use std::fmt;

use thiserror::Error;

use crate::context::PathParams;

/// Errors produced while compiling a route template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("route template {template:?} must start with '/'")]
    MissingLeadingSlash { template: String },

    #[error("route template {template:?} has an invalid capture name {name:?}; names must be ASCII letters")]
    InvalidName { template: String, name: String },

    #[error("route template {template:?} has ':' inside segment {segment:?}; captures must span a whole segment")]
    EmbeddedCapture { template: String, segment: String },

    #[error("route template {template:?} declares capture {name:?} more than once")]
    DuplicateName { template: String, name: String },
}

// One `/`-delimited piece of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Capture(String),
}

/// Outcome of a successful [`RoutePattern::matches`] call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PatternMatch {
    /// Named captures, keyed by capture name.
    pub params: PathParams,
    /// Everything after the first `?`, without the `?` itself.
    pub query: Option<String>,
}

/// A compiled route template.
///
/// # Examples
///
/// ```
/// use users_api::router::RoutePattern;
///
/// let pattern = RoutePattern::compile("/users/:id").unwrap();
/// let m = pattern.matches("/users/42?verbose=1").unwrap();
/// assert_eq!(m.params.get("id"), Some("42"));
/// assert_eq!(m.query.as_deref(), Some("verbose=1"));
///
/// assert!(pattern.matches("/users/").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    template: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Compile `template` into a matcher.
    ///
    /// # Errors
    ///
    /// - [`PatternError::MissingLeadingSlash`] if the template does not begin with `/`.
    /// - [`PatternError::InvalidName`] if a capture name is empty or not made of ASCII letters.
    /// - [`PatternError::EmbeddedCapture`] if `:` appears anywhere but the start of a segment.
    /// - [`PatternError::DuplicateName`] if two captures share a name.
    pub fn compile(template: &str) -> Result<Self, PatternError> {
        let Some(rest) = template.strip_prefix('/') else {
            return Err(PatternError::MissingLeadingSlash {
                template: template.to_owned(),
            });
        };

        let mut segments = Vec::new();
        for raw in rest.split('/') {
            let segment = match raw.strip_prefix(':') {
                Some(name) => {
                    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphabetic()) {
                        return Err(PatternError::InvalidName {
                            template: template.to_owned(),
                            name: name.to_owned(),
                        });
                    }
                    let duplicate = segments
                        .iter()
                        .any(|s| matches!(s, Segment::Capture(existing) if existing == name));
                    if duplicate {
                        return Err(PatternError::DuplicateName {
                            template: template.to_owned(),
                            name: name.to_owned(),
                        });
                    }
                    Segment::Capture(name.to_owned())
                }
                None if raw.contains(':') => {
                    return Err(PatternError::EmbeddedCapture {
                        template: template.to_owned(),
                        segment: raw.to_owned(),
                    });
                }
                None => Segment::Literal(raw.to_owned()),
            };
            segments.push(segment);
        }

        Ok(Self {
            template: template.to_owned(),
            segments,
        })
    }

    /// The template this pattern was compiled from.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Capture names in declaration order.
    pub fn capture_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Capture(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Test `target` (path plus optional `?query`) against this pattern.
    ///
    /// Returns `None` unless every segment matches and the segment counts are
    /// equal. There is no trailing-slash normalization and literals compare
    /// case-sensitively.
    pub fn matches(&self, target: &str) -> Option<PatternMatch> {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };

        let rest = path.strip_prefix('/')?;
        let mut parts = rest.split('/');
        let mut params = PathParams::new();

        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                }
                Segment::Capture(name) => {
                    if !is_capture_value(part) {
                        return None;
                    }
                    params.insert(name.clone(), part.to_owned());
                }
            }
        }

        if parts.next().is_some() {
            return None;
        }

        Some(PatternMatch {
            params,
            query: query.map(str::to_owned),
        })
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

impl std::str::FromStr for RoutePattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

// A capture value is one or more of `[a-z0-9_-]`.
fn is_capture_value(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
}
