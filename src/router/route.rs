use std::fmt;
use std::rc::Rc;

use regex::Regex;

use crate::error::{Result, ViewError};

/// Compiled route such as `contacts/:id` or `files/*path`.
///
/// `:name` captures one path segment, `*` or `*name` captures the rest lazily,
/// every other character matches literally. Patterns are anchored at both ends.
#[derive(Clone)]
pub struct RoutePattern(Rc<PatternInner>);

struct PatternInner {
    source: String,
    regex: Regex,
    names: Vec<String>,
}

impl RoutePattern {
    pub fn compile(source: &str) -> Result<Self> {
        let mut expr = String::from("^");
        let mut names = Vec::new();
        let mut chars = source.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                ':' | '*' => {
                    let mut name = String::new();
                    while let Some(next) = chars.peek().copied() {
                        if next.is_alphanumeric() || next == '_' {
                            name.push(next);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    if ch == ':' && name.is_empty() {
                        expr.push_str(&regex::escape(":"));
                        continue;
                    }
                    expr.push_str(if ch == ':' { "([^/]+)" } else { "(.*?)" });
                    names.push(name);
                }
                other => {
                    let mut buf = [0u8; 4];
                    expr.push_str(&regex::escape(other.encode_utf8(&mut buf)));
                }
            }
        }
        expr.push('$');
        let regex = Regex::new(&expr).map_err(|source_err| ViewError::InvalidRoute {
            route: source.to_string(),
            source: source_err,
        })?;
        Ok(Self(Rc::new(PatternInner {
            source: source.to_string(),
            regex,
            names,
        })))
    }

    pub fn source(&self) -> &str {
        &self.0.source
    }

    /// Parameter names in capture order; unnamed splats are empty strings.
    pub fn param_names(&self) -> &[String] {
        &self.0.names
    }

    pub fn is_match(&self, fragment: &str) -> bool {
        self.0.regex.is_match(fragment)
    }

    /// Captured parameters, or `None` when the fragment does not match.
    pub fn extract(&self, fragment: &str) -> Option<Vec<String>> {
        let captures = self.0.regex.captures(fragment)?;
        Some(
            captures
                .iter()
                .skip(1)
                .map(|group| group.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect(),
        )
    }
}

impl fmt::Debug for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RoutePattern").field(&self.0.source).finish()
    }
}

impl PartialEq for RoutePattern {
    fn eq(&self, other: &Self) -> bool {
        self.0.source == other.0.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_params_capture_one_segment() {
        let pattern = RoutePattern::compile(":x/b/:y").unwrap();
        assert!(pattern.is_match("a/b/c"));
        assert!(!pattern.is_match("a/c/e"));
        assert!(!pattern.is_match("a/b/c/d"));
        assert_eq!(pattern.extract("a/b/c"), Some(vec!["a".into(), "c".into()]));
        assert_eq!(pattern.param_names(), ["x", "y"]);
    }

    #[test]
    fn splats_take_the_rest() {
        let bare = RoutePattern::compile("a/*").unwrap();
        assert!(bare.is_match("a/c/e"));
        assert!(bare.is_match("a/"));
        assert!(!bare.is_match("b/c"));

        let named = RoutePattern::compile("files/*path").unwrap();
        assert_eq!(
            named.extract("files/docs/readme.md"),
            Some(vec!["docs/readme.md".to_string()])
        );
    }

    #[test]
    fn literal_characters_are_escaped() {
        let pattern = RoutePattern::compile("search.json").unwrap();
        assert!(pattern.is_match("search.json"));
        assert!(!pattern.is_match("searchXjson"));

        let empty = RoutePattern::compile("").unwrap();
        assert!(empty.is_match(""));
        assert!(!empty.is_match("a"));
    }
}
