use std::rc::Rc;

use indexmap::IndexMap;

use crate::dom::DomEvent;

use super::Component;

pub type HandlerFn = Rc<dyn Fn(&dyn Component, &mut DomEvent)>;

/// What an event binding invokes on its receiving view.
#[derive(Clone)]
pub enum Handler {
    /// Resolved through [`Component::handle`] at dispatch time.
    Method(String),
    Callback(HandlerFn),
}

impl Handler {
    pub fn method(name: impl Into<String>) -> Self {
        Self::Method(name.into())
    }

    pub fn callback(callback: impl Fn(&dyn Component, &mut DomEvent) + 'static) -> Self {
        Self::Callback(Rc::new(callback))
    }

    /// Runs the handler against `receiver`. Returns `false` when a method name
    /// does not resolve on the receiver.
    pub fn invoke(&self, receiver: &dyn Component, event: &mut DomEvent) -> bool {
        match self {
            Self::Method(name) => receiver.handle(name, event),
            Self::Callback(callback) => {
                callback(receiver, event);
                true
            }
        }
    }
}

impl From<&str> for Handler {
    fn from(name: &str) -> Self {
        Self::Method(name.to_string())
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Method(name) => f.debug_tuple("Method").field(name).finish(),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// `"event selector"` keys to handlers, in declaration order.
pub type EventMap = IndexMap<String, Handler>;

/// Event bindings declared by a view, either fixed or computed per delegation pass.
#[derive(Clone)]
pub enum EventSpec {
    Static(EventMap),
    Computed(Rc<dyn Fn() -> EventMap>),
}

impl EventSpec {
    pub fn none() -> Self {
        Self::Static(EventMap::new())
    }

    pub fn from_pairs<K, H>(pairs: impl IntoIterator<Item = (K, H)>) -> Self
    where
        K: Into<String>,
        H: Into<Handler>,
    {
        Self::Static(
            pairs
                .into_iter()
                .map(|(key, handler)| (key.into(), handler.into()))
                .collect(),
        )
    }

    pub fn computed(build: impl Fn() -> EventMap + 'static) -> Self {
        Self::Computed(Rc::new(build))
    }

    pub fn resolve(&self) -> EventMap {
        match self {
            Self::Static(map) => map.clone(),
            Self::Computed(build) => build(),
        }
    }
}

impl Default for EventSpec {
    fn default() -> Self {
        Self::none()
    }
}

/// Splits `"click .destroy"` into `("click", ".destroy")`.
pub fn split_event_key(key: &str) -> (&str, &str) {
    let key = key.trim_start();
    match key.find(char::is_whitespace) {
        Some(idx) => (&key[..idx], key[idx..].trim()),
        None => (key, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn event_keys_split_on_first_whitespace() {
        assert_eq!(split_event_key("click"), ("click", ""));
        assert_eq!(split_event_key("click a"), ("click", "a"));
        assert_eq!(split_event_key("click  .contact .destroy "), ("click", ".contact .destroy"));
    }

    #[test]
    fn computed_specs_are_rebuilt_on_each_resolve() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let spec = EventSpec::computed(move || {
            counter.set(counter.get() + 1);
            let mut map = EventMap::new();
            map.insert(format!("click .item{}", counter.get()), Handler::method("select"));
            map
        });
        assert!(spec.resolve().contains_key("click .item1"));
        assert!(spec.resolve().contains_key("click .item2"));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn static_specs_keep_declaration_order() {
        let spec = EventSpec::from_pairs([("submit", "save"), ("click .cancel", "cancel")]);
        let keys: Vec<String> = spec.resolve().keys().cloned().collect();
        assert_eq!(keys, vec!["submit", "click .cancel"]);
    }
}
