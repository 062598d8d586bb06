use std::rc::Rc;

use super::Element;
use super::selector::Selector;

pub type DomHandler = Rc<dyn Fn(&mut DomEvent)>;

/// Event travelling through the element tree.
#[derive(Debug, Clone)]
pub struct DomEvent {
    name: String,
    target: Element,
    pub(crate) current_target: Element,
    pub(crate) delegate_target: Option<Element>,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl DomEvent {
    pub(crate) fn new(name: &str, target: Element) -> Self {
        Self {
            name: name.to_string(),
            current_target: target.clone(),
            target,
            delegate_target: None,
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element the event was triggered on.
    pub fn target(&self) -> &Element {
        &self.target
    }

    /// Element whose listener is running: the matched descendant for delegated
    /// listeners, the bound element otherwise.
    pub fn current_target(&self) -> &Element {
        &self.current_target
    }

    /// Element a delegated listener is bound to, while it runs.
    pub fn delegate_target(&self) -> Option<&Element> {
        self.delegate_target.as_ref()
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

#[derive(Clone)]
pub(crate) struct Listener {
    pub(crate) event: String,
    pub(crate) namespaces: Vec<String>,
    pub(crate) selector: Option<Selector>,
    pub(crate) handler: DomHandler,
}

impl Listener {
    pub(crate) fn matches_key(&self, event: Option<&str>, namespaces: &[String]) -> bool {
        if event.is_some_and(|name| name != self.event) {
            return false;
        }
        namespaces.iter().all(|ns| self.namespaces.contains(ns))
    }
}

/// Splits `click.ns1.ns2` into the event name and its namespaces; `.ns` alone has no name.
pub(crate) fn parse_event_key(key: &str) -> (Option<String>, Vec<String>) {
    let mut pieces = key.split('.');
    let event = pieces
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string);
    let namespaces = pieces
        .filter(|ns| !ns.is_empty())
        .map(str::to_string)
        .collect();
    (event, namespaces)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_keys_split_into_name_and_namespaces() {
        assert_eq!(
            parse_event_key("click.delegateEventsview1.child"),
            (
                Some("click".to_string()),
                vec!["delegateEventsview1".to_string(), "child".to_string()]
            )
        );
        assert_eq!(
            parse_event_key(".delegateEventsview1"),
            (None, vec!["delegateEventsview1".to_string()])
        );
    }

    #[test]
    fn namespace_subset_matches() {
        let listener = Listener {
            event: "click".to_string(),
            namespaces: vec!["delegateEventsview1".to_string(), "child".to_string()],
            selector: None,
            handler: Rc::new(|_| {}),
        };
        assert!(listener.matches_key(None, &["delegateEventsview1".to_string()]));
        assert!(listener.matches_key(Some("click"), &["child".to_string()]));
        assert!(!listener.matches_key(Some("submit"), &[]));
        assert!(!listener.matches_key(None, &["other".to_string()]));
    }
}
