use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Attribute carrying a view's identity token on its rendered element.
pub const CID_ATTR: &str = "data-cid";

static NEXT_CID: AtomicU64 = AtomicU64::new(1);
static NEXT_ROUTER: AtomicU64 = AtomicU64::new(1);

/// Opaque identity token for views and models.
///
/// Unique per instance for the life of the process; it doubles as the value of
/// the [`CID_ATTR`] attribute so rendered elements can be mapped back to views.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cid(String);

impl Cid {
    pub fn unique(prefix: &str) -> Self {
        let next = NEXT_CID.fetch_add(1, Ordering::Relaxed);
        Self(format!("{prefix}{next}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Cid {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Cid {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identity of a router instance inside a multiplexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouterId(u64);

impl RouterId {
    pub fn next() -> Self {
        Self(NEXT_ROUTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RouterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "router{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_tokens_do_not_repeat() {
        let a = Cid::unique("view");
        let b = Cid::unique("view");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("view"));
        assert_eq!(Cid::from(a.as_str()), a);
    }
}
