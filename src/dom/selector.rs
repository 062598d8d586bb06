use std::fmt;

use crate::error::{Result, ViewError};

use super::Element;

/// Parsed CSS-like selector: compound selectors joined by descendant combinators.
///
/// Supported compounds: `tag`, `*`, `.class`, `#id`, `[attr]`, `[attr=value]`
/// (value optionally quoted). Matching walks real ancestors, so a selector is
/// evaluated against the whole tree an element lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    parts: Vec<Compound>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrTest {
    name: String,
    value: Option<String>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(ViewError::invalid_selector(source, "empty selector"));
        }
        let parts = split_compounds(trimmed)
            .map_err(|reason| ViewError::invalid_selector(source, reason))?
            .into_iter()
            .map(|token| {
                parse_compound(token).map_err(|reason| ViewError::invalid_selector(source, reason))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            source: trimmed.to_string(),
            parts,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, element: &Element) -> bool {
        let Some((last, rest)) = self.parts.split_last() else {
            return false;
        };
        if !last.matches(element) {
            return false;
        }
        let mut cursor = element.parent();
        for compound in rest.iter().rev() {
            loop {
                let Some(node) = cursor else {
                    return false;
                };
                cursor = node.parent();
                if compound.matches(&node) {
                    break;
                }
            }
        }
        true
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Compound {
    fn matches(&self, element: &Element) -> bool {
        let Some(tag) = element.tag() else {
            return false;
        };
        if let Some(expected) = self.tag.as_deref() {
            if !expected.eq_ignore_ascii_case(&tag) {
                return false;
            }
        }
        if let Some(id) = self.id.as_deref() {
            if element.attr("id").as_deref() != Some(id) {
                return false;
            }
        }
        if !self.classes.iter().all(|class| element.has_class(class)) {
            return false;
        }
        self.attrs.iter().all(|test| match element.attr(&test.name) {
            None => false,
            Some(actual) => test.value.as_ref().is_none_or(|value| *value == actual),
        })
    }
}

fn split_compounds(source: &str) -> std::result::Result<Vec<&str>, String> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    let mut bracket = false;
    let mut quote: Option<char> = None;

    for (idx, ch) in source.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') if bracket => quote = Some(ch),
            (None, '[') => {
                bracket = true;
                start.get_or_insert(idx);
            }
            (None, ']') => bracket = false,
            (None, c) if c.is_whitespace() && !bracket => {
                if let Some(begin) = start.take() {
                    tokens.push(&source[begin..idx]);
                }
            }
            (None, ',' | '>' | '+' | '~') if !bracket => {
                return Err(format!("unsupported combinator `{ch}`"));
            }
            _ => {
                start.get_or_insert(idx);
            }
        }
    }
    if bracket || quote.is_some() {
        return Err("unterminated attribute test".to_string());
    }
    if let Some(begin) = start {
        tokens.push(&source[begin..]);
    }
    Ok(tokens)
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '-' || ch == '_'
}

fn take_ident(chars: &[char], pos: &mut usize) -> std::result::Result<String, String> {
    let begin = *pos;
    while *pos < chars.len() && is_ident_char(chars[*pos]) {
        *pos += 1;
    }
    if *pos == begin {
        return Err("expected identifier".to_string());
    }
    Ok(chars[begin..*pos].iter().collect())
}

fn parse_compound(token: &str) -> std::result::Result<Compound, String> {
    let chars: Vec<char> = token.chars().collect();
    let mut pos = 0;
    let mut compound = Compound::default();

    if chars.first() == Some(&'*') {
        pos = 1;
    } else if chars.first().is_some_and(|c| is_ident_char(*c)) {
        compound.tag = Some(take_ident(&chars, &mut pos)?);
    }

    while pos < chars.len() {
        let marker = chars[pos];
        pos += 1;
        match marker {
            '.' => compound.classes.push(take_ident(&chars, &mut pos)?),
            '#' => compound.id = Some(take_ident(&chars, &mut pos)?),
            '[' => compound.attrs.push(parse_attr(&chars, &mut pos)?),
            other => return Err(format!("unexpected character `{other}`")),
        }
    }
    Ok(compound)
}

fn parse_attr(chars: &[char], pos: &mut usize) -> std::result::Result<AttrTest, String> {
    let name = take_ident(chars, pos)?;
    match chars.get(*pos) {
        Some(']') => {
            *pos += 1;
            Ok(AttrTest { name, value: None })
        }
        Some('=') => {
            *pos += 1;
            let value = match chars.get(*pos) {
                Some(&q) if q == '"' || q == '\'' => {
                    *pos += 1;
                    let begin = *pos;
                    while *pos < chars.len() && chars[*pos] != q {
                        *pos += 1;
                    }
                    let value: String = chars[begin..*pos].iter().collect();
                    *pos += 1;
                    value
                }
                _ => {
                    let begin = *pos;
                    while *pos < chars.len() && chars[*pos] != ']' {
                        *pos += 1;
                    }
                    chars[begin..*pos].iter().collect()
                }
            };
            if chars.get(*pos) != Some(&']') {
                return Err("unterminated attribute test".to_string());
            }
            *pos += 1;
            Ok(AttrTest {
                name,
                value: Some(value),
            })
        }
        _ => Err("malformed attribute test".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> (Element, Element, Element) {
        let link = Element::new("a").with_class("destroy");
        let item = Element::new("li")
            .with_class("contact")
            .with_attr("data-cid", "view7")
            .with_child(link.clone());
        let list = Element::new("ul").with_attr("id", "contacts").with_child(item.clone());
        (list, item, link)
    }

    #[test]
    fn compound_selectors_match() {
        let (list, item, link) = tree();
        assert!(Selector::parse("ul#contacts").unwrap().matches(&list));
        assert!(Selector::parse("li.contact[data-cid]").unwrap().matches(&item));
        assert!(Selector::parse("[data-cid='view7']").unwrap().matches(&item));
        assert!(!Selector::parse("[data-cid=view8]").unwrap().matches(&item));
        assert!(Selector::parse("*").unwrap().matches(&link));
    }

    #[test]
    fn descendant_chain_walks_ancestors() {
        let (_list, item, link) = tree();
        assert!(Selector::parse(".contact .destroy").unwrap().matches(&link));
        assert!(Selector::parse("ul  a").unwrap().matches(&link));
        assert!(!Selector::parse("li .contact").unwrap().matches(&item));
    }

    #[test]
    fn malformed_selectors_are_rejected() {
        for source in ["", "   ", "a > b", "[data-cid", ".", "div, p", "a!"] {
            let err = Selector::parse(source).unwrap_err();
            assert!(matches!(err, ViewError::InvalidSelector { .. }), "{source}");
        }
    }

    #[test]
    fn attribute_values_may_contain_spaces_when_quoted() {
        let el = Element::new("div").with_attr("title", "hello world");
        assert!(Selector::parse("div[title=\"hello world\"]").unwrap().matches(&el));
    }
}
