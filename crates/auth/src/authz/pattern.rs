// Ant-style path and method patterns for authorization rules
// Decision: Hand-rolled segment matcher; `**` needs first-match semantics across a whole rule list,
//           which a router keyed on unique routes cannot give us
// Decision: Matching is case-sensitive and ignores empty segments (trailing or doubled slashes)

use http::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// `**`: zero or more whole segments
    AnyDepth,
    /// `{name}`: exactly one segment
    Variable,
    /// Segment containing `*` or `?`
    Glob(String),
    Literal(String),
}

impl Segment {
    fn matches(&self, segment: &str) -> bool {
        match self {
            Segment::AnyDepth | Segment::Variable => true,
            Segment::Glob(glob) => glob_match(glob.as_bytes(), segment.as_bytes()),
            Segment::Literal(literal) => literal == segment,
        }
    }
}

/// `*` matches any run of characters, `?` exactly one
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == b'?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == b'*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = star {
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}

/// Compiled Ant-style path pattern, e.g. `/auth/**`, `/portfolio/{id}`, `/favicon.*`
#[derive(Clone, PartialEq, Eq)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidPathPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        if !pattern.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }

        let mut segments = Vec::new();
        for raw in pattern.split('/').filter(|s| !s.is_empty()) {
            let segment = if raw == "**" {
                if segments.last() == Some(&Segment::AnyDepth) {
                    continue;
                }
                Segment::AnyDepth
            } else if raw.contains("**") {
                return Err(invalid("'**' must be a whole segment"));
            } else if raw.starts_with('{') && raw.ends_with('}') {
                let name = &raw[1..raw.len() - 1];
                if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    return Err(invalid("variable names must be alphanumeric"));
                }
                Segment::Variable
            } else if raw.contains('{') || raw.contains('}') {
                return Err(invalid("'{name}' must be a whole segment"));
            } else if raw.contains('*') || raw.contains('?') {
                Segment::Glob(raw.to_string())
            } else {
                Segment::Literal(raw.to_string())
            };
            segments.push(segment);
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match a request path (no query string)
    pub fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match_segments(&self.segments, &parts)
    }
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::AnyDepth, rest)) => {
            (0..=path.len()).any(|skip| match_segments(rest, &path[skip..]))
        }
        Some((segment, rest)) => match path.split_first() {
            Some((head, tail)) => segment.matches(head) && match_segments(rest, tail),
            None => false,
        },
    }
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathPattern({})", self.source)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for PathPattern {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// True if the path has exactly one reading: no dot segments, no backslashes, no `;`
/// path parameters, and no percent-escapes that decode to something a rule could
/// have matched literally (unreserved characters, separators, `%`, controls).
/// Rules are matched against this raw path and the same raw path is forwarded.
pub fn is_normalized_path(path: &str) -> bool {
    if path.contains('\\') || path.contains(';') {
        return false;
    }

    let bytes = path.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let decoded = match (bytes.get(i + 1), bytes.get(i + 2)) {
                (Some(&hi), Some(&lo)) => {
                    hex_value(hi).zip(hex_value(lo)).map(|(h, l)| (h << 4) | l)
                }
                _ => None,
            };
            match decoded {
                Some(byte) if !is_ambiguous_escape(byte) => i += 3,
                _ => return false,
            }
        } else {
            i += 1;
        }
    }

    path.split('/').all(|segment| segment != "." && segment != "..")
}

fn hex_value(c: u8) -> Option<u8> {
    (c as char).to_digit(16).map(|d| d as u8)
}

/// Escapes that an upstream would decode into a character rules treat as plain text
fn is_ambiguous_escape(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(byte, b'-' | b'.' | b'_' | b'~' | b'/' | b'\\' | b';' | b'%')
        || byte < 0x20
        || byte == 0x7f
}

/// HTTP method pattern: one method or any
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MethodPattern {
    Any,
    Exact(Method),
}

impl MethodPattern {
    pub fn matches(&self, method: &Method) -> bool {
        match self {
            MethodPattern::Any => true,
            MethodPattern::Exact(expected) => expected == method,
        }
    }
}

impl FromStr for MethodPattern {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "*" || s == "ANY" {
            return Ok(MethodPattern::Any);
        }
        if s.is_empty() || s != s.to_ascii_uppercase() {
            return Err(ConfigError::InvalidMethod(s.to_string()));
        }
        Method::from_bytes(s.as_bytes())
            .map(MethodPattern::Exact)
            .map_err(|_| ConfigError::InvalidMethod(s.to_string()))
    }
}

impl TryFrom<String> for MethodPattern {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MethodPattern> for String {
    fn from(pattern: MethodPattern) -> Self {
        pattern.to_string()
    }
}

impl fmt::Display for MethodPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodPattern::Any => f.write_str("*"),
            MethodPattern::Exact(method) => f.write_str(method.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(pattern: &str) -> PathPattern {
        PathPattern::parse(pattern).unwrap()
    }

    #[test]
    fn test_literal_pattern() {
        let pattern = p("/swagger-ui.html");
        assert!(pattern.matches("/swagger-ui.html"));
        assert!(pattern.matches("/swagger-ui.html/"));
        assert!(!pattern.matches("/swagger-ui.htm"));
        assert!(!pattern.matches("/Swagger-ui.html"));
        assert!(!pattern.matches("/swagger-ui.html/x"));
    }

    #[test]
    fn test_double_star_matches_any_depth_including_none() {
        let pattern = p("/auth/**");
        assert!(pattern.matches("/auth"));
        assert!(pattern.matches("/auth/"));
        assert!(pattern.matches("/auth/login"));
        assert!(pattern.matches("/auth/users/42/roles"));
        assert!(!pattern.matches("/authx"));
        assert!(!pattern.matches("/portfolio/auth"));
    }

    #[test]
    fn test_double_star_in_the_middle() {
        let pattern = p("/api/**/docs");
        assert!(pattern.matches("/api/docs"));
        assert!(pattern.matches("/api/v1/stock/docs"));
        assert!(!pattern.matches("/api/v1/stock"));
    }

    #[test]
    fn test_root_catch_all() {
        let pattern = p("/**");
        assert!(pattern.matches("/"));
        assert!(pattern.matches("/anything/at/all"));
    }

    #[test]
    fn test_single_star_and_question_mark() {
        assert!(p("/favicon.*").matches("/favicon.ico"));
        assert!(!p("/favicon.*").matches("/favicon"));
        assert!(p("/*/icon-*").matches("/static/icon-32.png"));
        assert!(!p("/*/icon-*").matches("/icon-32.png"));
        assert!(p("/v?/stock").matches("/v1/stock"));
        assert!(!p("/v?/stock").matches("/v10/stock"));
        assert!(p("/a*b*c").matches("/abc"));
        assert!(p("/a*b*c").matches("/a-x-b-y-c"));
        assert!(!p("/a*b*c").matches("/a-x-b-y-d"));
    }

    #[test]
    fn test_variable_segment() {
        let pattern = p("/auth/{id}");
        assert!(pattern.matches("/auth/42"));
        assert!(!pattern.matches("/auth"));
        assert!(!pattern.matches("/auth/42/roles"));
    }

    #[test]
    fn test_invalid_patterns() {
        for bad in ["auth/**", "", "/a**", "/{}", "/{a-b}", "/x{id}", "/{id"] {
            assert!(
                matches!(
                    PathPattern::parse(bad),
                    Err(ConfigError::InvalidPathPattern { .. })
                ),
                "pattern {:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_repeated_double_star_collapses() {
        let pattern = p("/a/**/**/b");
        assert_eq!(pattern.segments.len(), 3);
        assert!(pattern.matches("/a/b"));
        assert!(pattern.matches("/a/x/y/b"));
    }

    #[test]
    fn test_is_normalized_path() {
        assert!(is_normalized_path("/portfolio/42"));
        assert!(is_normalized_path("/"));
        assert!(is_normalized_path("/files/v1.2/report..txt"));
        assert!(!is_normalized_path("/swagger-ui/../portfolio/42"));
        assert!(!is_normalized_path("/auth/./login"));
        assert!(!is_normalized_path("/auth%2F..%2Fportfolio"));
        assert!(!is_normalized_path("/auth/%2e%2e/portfolio"));
        assert!(!is_normalized_path("/auth\\..\\portfolio"));
    }

    #[test]
    fn test_path_parameters_and_disguised_characters_are_not_normalized() {
        assert!(!is_normalized_path("/%61uth/42"));
        assert!(!is_normalized_path("/auth/%34%32"));
        assert!(!is_normalized_path("/auth;x=1/42"));
        assert!(!is_normalized_path("/auth/42;jsessionid=abc"));
        assert!(!is_normalized_path("/auth/%3B/42"));
        assert!(!is_normalized_path("/auth/%252e%252e/42"));
        assert!(!is_normalized_path("/auth/%00"));
        assert!(!is_normalized_path("/auth/%zz"));
        assert!(!is_normalized_path("/auth/%4"));

        // Escapes of characters that never appear literally in a rule stay allowed
        assert!(is_normalized_path("/stocks/BRK%20B"));
        assert!(is_normalized_path("/search/caf%C3%A9"));
    }

    #[test]
    fn test_method_pattern() {
        assert_eq!("*".parse::<MethodPattern>().unwrap(), MethodPattern::Any);
        assert_eq!("ANY".parse::<MethodPattern>().unwrap(), MethodPattern::Any);

        let delete: MethodPattern = "DELETE".parse().unwrap();
        assert!(delete.matches(&Method::DELETE));
        assert!(!delete.matches(&Method::GET));
        assert!(MethodPattern::Any.matches(&Method::PATCH));

        assert!("get".parse::<MethodPattern>().is_err());
        assert!("".parse::<MethodPattern>().is_err());
        assert!("GE T".parse::<MethodPattern>().is_err());
    }
}
