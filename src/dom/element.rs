use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::error::Result;

use super::event::{DomEvent, Listener, parse_event_key};
use super::selector::Selector;

const HIDDEN_STYLE: &str = "display: none;";

#[derive(Debug, Clone)]
enum NodeKind {
    Element(String),
    Text(String),
}

struct Node {
    kind: NodeKind,
    attrs: IndexMap<String, String>,
    children: Vec<Element>,
    parent: Weak<RefCell<Node>>,
    listeners: Vec<Listener>,
}

/// Shared handle to a node of the in-memory document.
///
/// Cloning the handle does not copy the node; use [`Element::deep_clone`] for that.
#[derive(Clone)]
pub struct Element(Rc<RefCell<Node>>);

impl Element {
    pub fn new(tag: &str) -> Self {
        Self::from_kind(NodeKind::Element(tag.to_ascii_lowercase()))
    }

    /// Creates a text node.
    pub fn text(content: impl Into<String>) -> Self {
        Self::from_kind(NodeKind::Text(content.into()))
    }

    fn from_kind(kind: NodeKind) -> Self {
        Self(Rc::new(RefCell::new(Node {
            kind,
            attrs: IndexMap::new(),
            children: Vec::new(),
            parent: Weak::new(),
            listeners: Vec::new(),
        })))
    }

    pub fn with_attr(self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_class(self, class: &str) -> Self {
        self.add_class(class);
        self
    }

    pub fn with_child(self, child: Element) -> Self {
        self.append(&child);
        self
    }

    pub fn with_text(self, content: impl Into<String>) -> Self {
        self.set_text(content);
        self
    }

    pub fn ptr_eq(&self, other: &Element) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Tag name, or `None` for text nodes.
    pub fn tag(&self) -> Option<String> {
        match &self.0.borrow().kind {
            NodeKind::Element(tag) => Some(tag.clone()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.0.borrow().kind, NodeKind::Text(_))
    }

    pub fn attr(&self, name: &str) -> Option<String> {
        self.0.borrow().attrs.get(name).cloned()
    }

    pub fn set_attr(&self, name: &str, value: impl Into<String>) {
        self.0
            .borrow_mut()
            .attrs
            .insert(name.to_string(), value.into());
    }

    pub fn remove_attr(&self, name: &str) -> Option<String> {
        self.0.borrow_mut().attrs.shift_remove(name)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    pub fn add_class(&self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let next = match self.attr("class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {class}", existing.trim()),
            _ => class.to_string(),
        };
        self.set_attr("class", next);
    }

    pub fn remove_class(&self, class: &str) {
        if let Some(existing) = self.attr("class") {
            let rest: Vec<&str> = existing.split_whitespace().filter(|c| *c != class).collect();
            if rest.is_empty() {
                self.remove_attr("class");
            } else {
                self.set_attr("class", rest.join(" "));
            }
        }
    }

    pub fn parent(&self) -> Option<Element> {
        self.0.borrow().parent.upgrade().map(Element)
    }

    /// Element children, skipping text nodes.
    pub fn children(&self) -> Vec<Element> {
        self.0
            .borrow()
            .children
            .iter()
            .filter(|child| !child.is_text())
            .cloned()
            .collect()
    }

    pub fn child_nodes(&self) -> Vec<Element> {
        self.0.borrow().children.clone()
    }

    pub fn append(&self, child: &Element) {
        child.detach();
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        self.0.borrow_mut().children.push(child.clone());
    }

    pub fn prepend(&self, child: &Element) {
        child.detach();
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        self.0.borrow_mut().children.insert(0, child.clone());
    }

    /// Inserts `node` as the sibling immediately before `self`.
    ///
    /// Returns `false` when `self` has no parent.
    pub fn insert_before(&self, node: &Element) -> bool {
        if node.ptr_eq(self) {
            return false;
        }
        node.detach();
        let Some(parent) = self.parent() else {
            return false;
        };
        let Some(index) = parent.position_of(self) else {
            return false;
        };
        node.0.borrow_mut().parent = Rc::downgrade(&parent.0);
        parent.0.borrow_mut().children.insert(index, node.clone());
        true
    }

    /// Swaps `self` out of its parent for `node`, keeping the position.
    pub fn replace_with(&self, node: &Element) -> bool {
        if node.ptr_eq(self) {
            return true;
        }
        node.detach();
        let Some(parent) = self.parent() else {
            return false;
        };
        let Some(index) = parent.position_of(self) else {
            return false;
        };
        node.0.borrow_mut().parent = Rc::downgrade(&parent.0);
        parent.0.borrow_mut().children[index] = node.clone();
        self.0.borrow_mut().parent = Weak::new();
        true
    }

    /// Removes the node from its parent; listeners stay bound.
    pub fn detach(&self) {
        let Some(parent) = self.parent() else {
            return;
        };
        parent
            .0
            .borrow_mut()
            .children
            .retain(|child| !child.ptr_eq(self));
        self.0.borrow_mut().parent = Weak::new();
    }

    /// Drops every child node.
    pub fn empty(&self) {
        let children = std::mem::take(&mut self.0.borrow_mut().children);
        for child in children {
            child.0.borrow_mut().parent = Weak::new();
        }
    }

    pub fn set_text(&self, content: impl Into<String>) {
        self.empty();
        let content = content.into();
        if !content.is_empty() {
            self.append(&Element::text(content));
        }
    }

    /// Replaces the children with `nodes`.
    pub fn set_content(&self, nodes: impl IntoIterator<Item = Element>) {
        self.empty();
        for node in nodes {
            self.append(&node);
        }
    }

    pub fn text_content(&self) -> String {
        let node = self.0.borrow();
        match &node.kind {
            NodeKind::Text(text) => text.clone(),
            NodeKind::Element(_) => node.children.iter().map(Element::text_content).collect(),
        }
    }

    /// Copies the subtree without listeners or parent link.
    pub fn deep_clone(&self) -> Element {
        let node = self.0.borrow();
        let copy = Element::from_kind(node.kind.clone());
        copy.0.borrow_mut().attrs = node.attrs.clone();
        for child in &node.children {
            copy.append(&child.deep_clone());
        }
        copy
    }

    pub fn position_of(&self, child: &Element) -> Option<usize> {
        self.0
            .borrow()
            .children
            .iter()
            .position(|candidate| candidate.ptr_eq(child))
    }

    pub fn matches(&self, selector: &Selector) -> bool {
        selector.matches(self)
    }

    /// Descendants matching `selector`, in document order.
    pub fn query_all(&self, selector: &str) -> Result<Vec<Element>> {
        let selector = Selector::parse(selector)?;
        Ok(self.select_all(&selector))
    }

    pub fn query(&self, selector: &str) -> Result<Option<Element>> {
        Ok(self.query_all(selector)?.into_iter().next())
    }

    pub fn select_all(&self, selector: &Selector) -> Vec<Element> {
        let mut found = Vec::new();
        self.collect_matches(selector, &mut found);
        found
    }

    fn collect_matches(&self, selector: &Selector, found: &mut Vec<Element>) {
        for child in self.child_nodes() {
            if child.is_text() {
                continue;
            }
            if selector.matches(&child) {
                found.push(child.clone());
            }
            child.collect_matches(selector, found);
        }
    }

    /// First of `self` and its ancestors matching `selector`.
    pub fn closest(&self, selector: &Selector) -> Option<Element> {
        let mut cursor = Some(self.clone());
        while let Some(node) = cursor {
            if selector.matches(&node) {
                return Some(node);
            }
            cursor = node.parent();
        }
        None
    }

    pub fn hide(&self) {
        self.set_attr("style", HIDDEN_STYLE);
    }

    pub fn show(&self) {
        if self.attr("style").as_deref() == Some(HIDDEN_STYLE) {
            self.remove_attr("style");
        }
    }

    /// Visible when neither the node nor any ancestor is hidden.
    pub fn is_visible(&self) -> bool {
        let mut cursor = Some(self.clone());
        while let Some(node) = cursor {
            if node.attr("style").as_deref() == Some(HIDDEN_STYLE) {
                return false;
            }
            cursor = node.parent();
        }
        true
    }

    /// Binds a listener. `key` is `event(.namespace)*`; a selector makes the
    /// listener delegated to matching descendants.
    pub fn on(
        &self,
        key: &str,
        selector: Option<&str>,
        handler: impl Fn(&mut DomEvent) + 'static,
    ) -> Result<()> {
        let selector = selector
            .filter(|s| !s.trim().is_empty())
            .map(Selector::parse)
            .transpose()?;
        self.on_selector(key, selector, handler);
        Ok(())
    }

    pub fn on_selector(
        &self,
        key: &str,
        selector: Option<Selector>,
        handler: impl Fn(&mut DomEvent) + 'static,
    ) {
        let (event, namespaces) = parse_event_key(key);
        self.0.borrow_mut().listeners.push(Listener {
            event: event.unwrap_or_default(),
            namespaces,
            selector,
            handler: Rc::new(handler),
        });
    }

    /// Unbinds listeners matching the event name (if any) and every namespace in `key`.
    pub fn off(&self, key: &str) -> usize {
        let (event, namespaces) = parse_event_key(key);
        let mut node = self.0.borrow_mut();
        let before = node.listeners.len();
        node.listeners
            .retain(|listener| !listener.matches_key(event.as_deref(), &namespaces));
        before - node.listeners.len()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.0
            .borrow()
            .listeners
            .iter()
            .filter(|listener| listener.event == event)
            .count()
    }

    pub fn delegate_count(&self, event: &str) -> usize {
        self.0
            .borrow()
            .listeners
            .iter()
            .filter(|listener| listener.event == event && listener.selector.is_some())
            .count()
    }

    fn listeners_for(&self, event: &str) -> Vec<Listener> {
        self.0
            .borrow()
            .listeners
            .iter()
            .filter(|listener| listener.event == event)
            .cloned()
            .collect()
    }

    /// Dispatches `event` at this node and bubbles it up to the root.
    ///
    /// At every node, delegated listeners run first for each element between the
    /// target and that node matching their selector (deepest first), then the
    /// node's direct listeners.
    pub fn trigger(&self, event: &str) -> DomEvent {
        let mut dom_event = DomEvent::new(event, self.clone());
        let mut path = Vec::new();
        let mut cursor = Some(self.clone());
        while let Some(node) = cursor {
            cursor = node.parent();
            path.push(node);
        }

        for (depth, node) in path.iter().enumerate() {
            let listeners = node.listeners_for(event);
            if listeners.is_empty() {
                continue;
            }
            dom_event.delegate_target = Some(node.clone());
            'candidates: for candidate in &path[..depth] {
                for listener in listeners.iter().filter(|l| l.selector.is_some()) {
                    if listener
                        .selector
                        .as_ref()
                        .is_some_and(|selector| selector.matches(candidate))
                    {
                        dom_event.current_target = candidate.clone();
                        (listener.handler)(&mut dom_event);
                    }
                }
                if dom_event.is_propagation_stopped() {
                    break 'candidates;
                }
            }
            if !dom_event.is_propagation_stopped() {
                dom_event.current_target = node.clone();
                for listener in listeners.iter().filter(|l| l.selector.is_none()) {
                    (listener.handler)(&mut dom_event);
                }
            }
            if dom_event.is_propagation_stopped() {
                break;
            }
        }
        dom_event.delegate_target = None;
        dom_event
    }

    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        for child in self.child_nodes() {
            child.write_html(&mut out);
        }
        out
    }

    fn write_html(&self, out: &mut String) {
        let node = self.0.borrow();
        match &node.kind {
            NodeKind::Text(text) => out.push_str(&escape(text)),
            NodeKind::Element(tag) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in &node.attrs {
                    out.push_str(&format!(" {name}=\"{}\"", escape(value)));
                }
                out.push('>');
                for child in &node.children {
                    child.write_html(out);
                }
                out.push_str(&format!("</{tag}>"));
            }
        }
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Element {}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.outer_html())
    }
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
