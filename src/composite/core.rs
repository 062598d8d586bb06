use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use crate::config::{PLACEHOLDER_TAG, ViewConfig};
use crate::dom::{DomEvent, Element, Selector};
use crate::error::Result;
use crate::identity::{CID_ATTR, Cid};
use crate::logging::{COMPOSITE_TARGET, LogLevel, json_kv, json_str};
use crate::view::{Component, Handler, ViewBase, ViewOptions, split_event_key};

use super::registry::{ChildRegistry, Placement};

/// Options for [`CompositeView::register_child`].
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    /// Routes the child's events through the parent under this selector.
    pub selector: Option<String>,
    /// Position in the child list; defaults to the end, clamped to it.
    pub at: Option<usize>,
}

impl RegisterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn at(mut self, at: usize) -> Self {
        self.at = Some(at);
        self
    }
}

/// Options for [`CompositeView::place_children`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceOptions {
    /// Render each child before it replaces its marker.
    pub render: bool,
}

/// A component that owns an ordered list of child components.
///
/// Children registered with a selector no longer listen on their own element;
/// the composite binds their events on its element and re-dispatches each one
/// to the child whose element contains the event target.
pub struct CompositeView {
    base: ViewBase,
    registry: Rc<RefCell<ChildRegistry>>,
    delegated: RefCell<HashSet<String>>,
}

impl CompositeView {
    pub fn new(options: ViewOptions) -> Self {
        Self {
            base: ViewBase::new(options),
            registry: Rc::new(RefCell::new(ChildRegistry::new())),
            delegated: RefCell::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &ViewConfig {
        self.base.config()
    }

    /// Tracks `child`, optionally taking over its events.
    ///
    /// Registering a cid that is already tracked never duplicates it: the slot
    /// stays where it is, the reference and selector are updated.
    pub fn register_child<C: Component>(&self, child: Rc<C>, options: RegisterOptions) -> Rc<C> {
        let handle: Rc<dyn Component> = child.clone();
        self.register(handle, options);
        child
    }

    pub(crate) fn register(&self, child: Rc<dyn Component>, options: RegisterOptions) -> usize {
        let cid = child.cid().clone();
        // a blank selector means the child keeps its own bindings
        let selector = options
            .selector
            .map(|selector| selector.trim().to_string())
            .filter(|selector| !selector.is_empty());
        if selector.is_some() {
            child.view().undelegate_events();
        }
        let placement = {
            let mut registry = self.registry.borrow_mut();
            let placement = registry.insert(child, options.at);
            if let Some(selector) = selector {
                registry.set_selector(&cid, selector);
            }
            placement
        };
        if let Placement::Inserted(_) = placement {
            self.config().record(|metrics| metrics.record_registration());
        }
        self.config().log(
            LogLevel::Debug,
            COMPOSITE_TARGET,
            "registered child",
            [
                json_str("parent", self.base.cid().as_str()),
                json_str("child", cid.as_str()),
                json_kv("index", placement.index()),
                json_str("placement", placement_label(placement)),
            ],
        );
        placement.index()
    }

    /// Stops tracking `child`. Returns `None` when it was not registered.
    pub fn deregister_child(&self, child: &dyn Component) -> Option<Rc<dyn Component>> {
        let removed = self.registry.borrow_mut().remove(child.cid());
        removed.map(|(index, child)| self.note_removed(index, child))
    }

    pub fn deregister_child_at(&self, at: usize) -> Option<Rc<dyn Component>> {
        let removed = self.registry.borrow_mut().remove_at(at);
        removed.map(|child| self.note_removed(at, child))
    }

    pub fn unregister_child(&self, child: &dyn Component) -> Option<Rc<dyn Component>> {
        self.deregister_child(child)
    }

    fn note_removed(&self, index: usize, child: Rc<dyn Component>) -> Rc<dyn Component> {
        self.config().record(|metrics| metrics.record_deregistration());
        self.config().log(
            LogLevel::Debug,
            COMPOSITE_TARGET,
            "deregistered child",
            [
                json_str("parent", self.base.cid().as_str()),
                json_str("child", child.cid().as_str()),
                json_kv("index", index),
            ],
        );
        child
    }

    pub fn children(&self) -> Vec<Rc<dyn Component>> {
        self.registry.borrow().children()
    }

    pub fn child(&self, cid: &Cid) -> Option<Rc<dyn Component>> {
        self.registry.borrow().get(cid)
    }

    pub fn child_at(&self, index: usize) -> Option<Rc<dyn Component>> {
        self.registry.borrow().children().get(index).cloned()
    }

    pub fn index_of(&self, cid: &Cid) -> Option<usize> {
        self.registry.borrow().position(cid)
    }

    pub fn child_count(&self) -> usize {
        self.registry.borrow().len()
    }

    pub fn selector_of(&self, cid: &Cid) -> Option<String> {
        self.registry.borrow().selector(cid).map(str::to_string)
    }

    /// Marker to embed in rendered markup where `child` should be mounted.
    ///
    /// Uses the configured placeholder selector as the tag when it is a bare tag
    /// name. Any other selector falls back to `<view>`, which `place_children`
    /// will not find; build matching markers by hand in that case.
    pub fn placeholder_for(&self, child: &dyn Component) -> Element {
        let tag = self.config().placeholder_tag().unwrap_or(PLACEHOLDER_TAG);
        Element::new(tag).with_attr(CID_ATTR, child.cid().as_str())
    }

    /// Swaps placeholder markers in the rendered subtree for the elements of the
    /// registered children they name. Returns how many markers were replaced.
    pub fn place_children(&self, options: PlaceOptions) -> Result<usize> {
        let selector = format!("{}[{CID_ATTR}]", self.config().placeholder_selector());
        let mut placed = 0;
        for marker in self.base.query(&selector)? {
            let Some(cid) = marker.attr(CID_ATTR) else {
                continue;
            };
            let Some(child) = self.child(&Cid::from(cid)) else {
                continue;
            };
            if options.render {
                child.render()?;
            }
            if marker.replace_with(&child.el()) {
                placed += 1;
            }
        }
        Ok(placed)
    }

    /// Rebuilds the delegated bindings for every child registered with a selector.
    ///
    /// A selector belongs to the first child (in order) that claims it; later
    /// children sharing that selector contribute nothing.
    pub fn delegate_child_events(&self) -> Result<()> {
        self.undelegate_child_events();
        let el = self.base.el();
        let namespace = self.child_namespace();
        let mut owned = HashSet::new();
        let mut bound = 0usize;
        let delegated = self.registry.borrow().delegated();
        for (child, prefix) in delegated {
            if !owned.insert(prefix.clone()) {
                continue;
            }
            let owner = Selector::parse(&format!("{prefix}[{CID_ATTR}]"))?;
            for (key, handler) in child.events().resolve() {
                let (event, inner) = split_event_key(&key);
                let full = if inner.is_empty() {
                    Selector::parse(&prefix)?
                } else {
                    Selector::parse(&format!("{prefix} {inner}"))?
                };
                let registry = Rc::downgrade(&self.registry);
                let owner = owner.clone();
                let config = self.config().clone();
                el.on_selector(&format!("{event}.{namespace}"), Some(full), move |dom_event| {
                    let hit = dispatch_to_child(&registry, &owner, &handler, dom_event);
                    config.record(|metrics| metrics.record_dispatch(hit));
                });
                bound += 1;
            }
        }
        self.config().log(
            LogLevel::Debug,
            COMPOSITE_TARGET,
            "delegated child events",
            [
                json_str("parent", self.base.cid().as_str()),
                json_kv("selectors", owned.len()),
                json_kv("bindings", bound),
            ],
        );
        *self.delegated.borrow_mut() = owned;
        Ok(())
    }

    /// Removes only the child delegations, keeping the composite's own bindings.
    pub fn undelegate_child_events(&self) -> usize {
        self.delegated.borrow_mut().clear();
        self.base.el().off(&format!(".{}", self.child_namespace()))
    }

    /// Whether the current delegation table has an owner for `selector`.
    pub fn is_delegated(&self, selector: &str) -> bool {
        self.delegated.borrow().contains(selector)
    }

    /// Releases every child and empties the registry.
    pub fn release_children(&self) {
        let children = self.children();
        for child in &children {
            child.release();
        }
        self.registry.borrow_mut().reset();
        self.undelegate_child_events();
    }

    /// Forgets every child without releasing it.
    pub(crate) fn reset_registry(&self) -> Vec<Rc<dyn Component>> {
        let children = self.registry.borrow_mut().reset();
        self.undelegate_child_events();
        children
    }

    /// Clears every child and detaches its element; children stay registered and
    /// keep their subscriptions.
    pub fn clear_children(&self) {
        for child in self.children() {
            child.clear();
            child.el().detach();
        }
    }

    fn child_namespace(&self) -> String {
        format!("{}.child", self.base.events_namespace())
    }
}

impl Component for CompositeView {
    fn view(&self) -> &ViewBase {
        &self.base
    }

    fn composite(&self) -> Option<&CompositeView> {
        Some(self)
    }
}

fn placement_label(placement: Placement) -> &'static str {
    match placement {
        Placement::Inserted(_) => "inserted",
        Placement::Existing(_) => "existing",
        Placement::Replaced(_) => "replaced",
    }
}

/// Finds the child owning the matched element and runs `handler` on it.
/// Stale or missing cids are a silent miss.
fn dispatch_to_child(
    registry: &Weak<RefCell<ChildRegistry>>,
    owner: &Selector,
    handler: &Handler,
    event: &mut DomEvent,
) -> bool {
    let Some(registry) = registry.upgrade() else {
        return false;
    };
    let Some(cid) = event
        .current_target()
        .closest(owner)
        .and_then(|el| el.attr(CID_ATTR))
    else {
        return false;
    };
    let child = registry.borrow().get(&Cid::from(cid));
    match child {
        Some(child) => handler.invoke(child.as_ref(), event),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{Logger, MemorySink};
    use crate::metrics::ViewMetrics;
    use crate::model::Model;
    use crate::view::{EventMap, EventSpec, delegate_events, install};
    use serde_json::json;
    use std::cell::Cell;

    struct Item {
        base: ViewBase,
        spec: EventSpec,
        hits: Rc<RefCell<Vec<String>>>,
        cid_override: Option<Cid>,
    }

    impl Item {
        fn build(tag: &str, spec: EventSpec, hits: &Rc<RefCell<Vec<String>>>) -> Self {
            Self {
                base: ViewBase::new(ViewOptions::new().tag_name(tag)),
                spec,
                hits: hits.clone(),
                cid_override: None,
            }
        }

        fn new(tag: &str, spec: EventSpec, hits: &Rc<RefCell<Vec<String>>>) -> Rc<Self> {
            Rc::new(Self::build(tag, spec, hits))
        }
    }

    impl Component for Item {
        fn view(&self) -> &ViewBase {
            &self.base
        }

        fn cid(&self) -> &Cid {
            self.cid_override.as_ref().unwrap_or(self.base.cid())
        }

        fn events(&self) -> EventSpec {
            self.spec.clone()
        }

        fn render(&self) -> Result<()> {
            self.base.el().set_text(format!("item {}", self.base.cid()));
            Ok(())
        }

        fn handle(&self, method: &str, _event: &mut DomEvent) -> bool {
            self.hits
                .borrow_mut()
                .push(format!("{}:{method}", self.base.cid()));
            true
        }
    }

    fn log() -> Rc<RefCell<Vec<String>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn register_and_deregister_keep_tables_aligned() {
        let composite = CompositeView::new(ViewOptions::new());
        let hits = log();
        let a = Item::new("li", EventSpec::none(), &hits);
        let b = Item::new("li", EventSpec::none(), &hits);
        let c = Item::new("li", EventSpec::none(), &hits);

        composite.register_child(a.clone(), RegisterOptions::new());
        composite.register_child(c.clone(), RegisterOptions::new());
        composite.register_child(b.clone(), RegisterOptions::new().at(1));
        composite.register_child(a.clone(), RegisterOptions::new().at(2).selector("li"));

        let order: Vec<Cid> = composite.children().iter().map(|c| c.cid().clone()).collect();
        assert_eq!(order, vec![a.cid().clone(), b.cid().clone(), c.cid().clone()]);
        assert_eq!(composite.selector_of(a.cid()).as_deref(), Some("li"));
        assert!(composite.registry.borrow().is_consistent());

        assert!(composite.deregister_child(b.as_ref()).is_some());
        assert!(composite.deregister_child(b.as_ref()).is_none());
        assert!(composite.deregister_child_at(7).is_none());
        let removed = composite.deregister_child_at(0).unwrap();
        assert_eq!(removed.cid(), a.cid());
        assert!(composite.selector_of(a.cid()).is_none());
        assert_eq!(composite.child_count(), 1);
        assert!(composite.registry.borrow().is_consistent());
    }

    #[test]
    fn colliding_cid_replaces_tracked_reference() {
        let composite = CompositeView::new(ViewOptions::new());
        let hits = log();
        let original = Item::new("li", EventSpec::none(), &hits);
        composite.register_child(original.clone(), RegisterOptions::new());
        composite.register_child(Item::new("li", EventSpec::none(), &hits), RegisterOptions::new());

        let impostor = Rc::new(Item {
            base: ViewBase::new(ViewOptions::new()),
            spec: EventSpec::none(),
            hits: hits.clone(),
            cid_override: Some(original.cid().clone()),
        });
        composite.register_child(impostor.clone(), RegisterOptions::new().at(1));

        assert_eq!(composite.child_count(), 2);
        let tracked = composite.child(original.cid()).unwrap();
        assert!(std::ptr::addr_eq(Rc::as_ptr(&tracked), Rc::as_ptr(&impostor)));
        let first = composite.child_at(0).unwrap();
        assert!(std::ptr::addr_eq(Rc::as_ptr(&first), Rc::as_ptr(&impostor)));
    }

    #[test]
    fn registering_with_selector_silences_own_bindings() {
        let composite = install(CompositeView::new(ViewOptions::new().tag_name("ul"))).unwrap();
        let hits = log();
        let item = install(Item::build(
            "li",
            EventSpec::from_pairs([("click", "select")]),
            &hits,
        ))
        .unwrap();
        item.el().trigger("click");
        assert_eq!(hits.borrow().len(), 1);

        composite.register_child(item.clone(), RegisterOptions::new().selector("li"));
        composite.view().el().append(&item.el());
        item.el().trigger("click");
        assert_eq!(hits.borrow().len(), 1);

        composite.delegate_child_events().unwrap();
        item.el().trigger("click");
        assert_eq!(hits.borrow().len(), 2);
        assert!(composite.is_delegated("li"));
    }

    #[test]
    fn first_child_owns_a_shared_selector() {
        let composite = install(CompositeView::new(ViewOptions::new().tag_name("ul"))).unwrap();
        let hits = log();
        let first = Item::new(
            "li",
            EventSpec::from_pairs([("click", "first"), ("hover .name", "hover")]),
            &hits,
        );
        let second = Item::new("li", EventSpec::from_pairs([("dblclick", "second")]), &hits);
        for item in [&first, &second] {
            composite.register_child(item.clone(), RegisterOptions::new().selector("li"));
            composite.view().el().append(&item.el());
        }
        composite.delegate_child_events().unwrap();

        let el = composite.view().el();
        assert_eq!(el.delegate_count("click"), 1);
        assert_eq!(el.delegate_count("hover"), 1);
        assert_eq!(el.delegate_count("dblclick"), 0);

        second.el().trigger("click");
        second.el().trigger("dblclick");
        assert_eq!(*hits.borrow(), vec![format!("{}:first", second.base.cid())]);
    }

    #[test]
    fn blank_selector_leaves_child_on_its_own_bindings() {
        let composite = install(CompositeView::new(ViewOptions::new().tag_name("ul"))).unwrap();
        let hits = log();
        let blank = install(Item::build(
            "span",
            EventSpec::from_pairs([("click", "select")]),
            &hits,
        ))
        .unwrap();
        let good = Item::new("li", EventSpec::from_pairs([("click", "select")]), &hits);
        composite.register_child(blank.clone(), RegisterOptions::new().selector("  "));
        composite.register_child(good.clone(), RegisterOptions::new().selector("li"));
        for item in [blank.el(), good.el()] {
            composite.view().el().append(&item);
        }

        assert!(composite.selector_of(blank.cid()).is_none());
        composite.delegate_child_events().unwrap();
        good.el().trigger("click");
        blank.el().trigger("click");
        assert_eq!(
            *hits.borrow(),
            vec![
                format!("{}:select", good.base.cid()),
                format!("{}:select", blank.base.cid()),
            ]
        );
    }

    #[test]
    fn computed_events_are_resolved_on_every_rebuild() {
        let composite = CompositeView::new(ViewOptions::new().tag_name("ul"));
        let hits = log();
        let builds = Rc::new(Cell::new(0usize));
        let counter = builds.clone();
        let spec = EventSpec::computed(move || {
            counter.set(counter.get() + 1);
            let mut map = EventMap::new();
            map.insert(
                "click".to_string(),
                Handler::method(format!("computed{}", counter.get())),
            );
            map
        });
        let item = Item::new("li", spec, &hits);
        composite.register_child(item.clone(), RegisterOptions::new().selector("li"));
        composite.view().el().append(&item.el());

        composite.delegate_child_events().unwrap();
        assert_eq!(builds.get(), 1);
        item.el().trigger("click");

        composite.delegate_child_events().unwrap();
        assert_eq!(builds.get(), 2);
        assert_eq!(composite.view().el().delegate_count("click"), 1);
        item.el().trigger("click");

        let cid = item.base.cid();
        assert_eq!(
            *hits.borrow(),
            vec![format!("{cid}:computed1"), format!("{cid}:computed2")]
        );
    }

    #[test]
    fn stale_targets_are_ignored() {
        let composite = install(CompositeView::new(ViewOptions::new().tag_name("ul"))).unwrap();
        let hits = log();
        let item = Item::new("li", EventSpec::from_pairs([("click", "select")]), &hits);
        composite.register_child(item.clone(), RegisterOptions::new().selector("li"));
        composite.view().el().append(&item.el());
        composite.delegate_child_events().unwrap();

        composite.deregister_child(item.as_ref());
        item.el().trigger("click");

        let foreign = Element::new("li");
        composite.view().el().append(&foreign);
        foreign.trigger("click");
        assert!(hits.borrow().is_empty());
    }

    #[test]
    fn own_bindings_survive_child_undelegation() {
        struct Shell {
            composite: CompositeView,
            clicks: Cell<usize>,
        }

        impl Component for Shell {
            fn view(&self) -> &ViewBase {
                self.composite.view()
            }

            fn composite(&self) -> Option<&CompositeView> {
                Some(&self.composite)
            }

            fn events(&self) -> EventSpec {
                EventSpec::from_pairs([("click", "tap")])
            }

            fn handle(&self, method: &str, _event: &mut DomEvent) -> bool {
                if method == "tap" {
                    self.clicks.set(self.clicks.get() + 1);
                }
                method == "tap"
            }
        }

        let hits = log();
        let shell = Rc::new(Shell {
            composite: CompositeView::new(ViewOptions::new()),
            clicks: Cell::new(0),
        });
        let item = Item::new("li", EventSpec::from_pairs([("click", "select")]), &hits);
        shell
            .composite
            .register_child(item.clone(), RegisterOptions::new().selector("li"));
        shell.view().el().append(&item.el());
        let handle: Rc<dyn Component> = shell.clone();
        delegate_events(&handle).unwrap();

        item.el().trigger("click");
        assert_eq!(hits.borrow().len(), 1);
        assert_eq!(shell.clicks.get(), 1);

        assert_eq!(shell.composite.undelegate_child_events(), 1);
        item.el().trigger("click");
        assert_eq!(hits.borrow().len(), 1);
        assert_eq!(shell.clicks.get(), 2);
    }

    #[test]
    fn placeholders_are_swapped_for_registered_children() {
        let composite = CompositeView::new(ViewOptions::new());
        let hits = log();
        let item = Item::new("section", EventSpec::none(), &hits);
        composite.register_child(item.clone(), RegisterOptions::new());

        let orphan = Element::new(PLACEHOLDER_TAG).with_attr(CID_ATTR, "view-missing");
        let el = composite.view().el();
        el.set_content([
            Element::new("h1").with_text("title"),
            composite.placeholder_for(item.as_ref()),
            orphan.clone(),
        ]);

        let placed = composite.place_children(PlaceOptions { render: true }).unwrap();
        assert_eq!(placed, 1);
        assert!(item.el().parent().is_some_and(|parent| parent.ptr_eq(&el)));
        assert_eq!(el.position_of(&item.el()), Some(1));
        assert!(orphan.parent().is_some());
        assert!(item.el().text_content().starts_with("item "));
    }

    #[test]
    fn placeholder_override_changes_which_markers_are_placed() {
        let config = ViewConfig::new().with_placeholder_selector("x-slot");
        let composite = CompositeView::new(ViewOptions::new().config(config));
        let hits = log();
        let slotted = Item::new("section", EventSpec::none(), &hits);
        let defaulted = Item::new("aside", EventSpec::none(), &hits);
        composite.register_child(slotted.clone(), RegisterOptions::new());
        composite.register_child(defaulted.clone(), RegisterOptions::new());

        let marker = composite.placeholder_for(slotted.as_ref());
        assert_eq!(marker.tag().as_deref(), Some("x-slot"));
        let stock = Element::new(PLACEHOLDER_TAG).with_attr(CID_ATTR, defaulted.cid().as_str());
        let el = composite.view().el();
        el.set_content([marker, stock.clone()]);

        let placed = composite.place_children(PlaceOptions::default()).unwrap();
        assert_eq!(placed, 1);
        assert!(slotted.el().parent().is_some_and(|parent| parent.ptr_eq(&el)));
        assert!(defaulted.el().parent().is_none());
        assert!(stock.parent().is_some());
    }

    #[test]
    fn clear_detaches_without_releasing() {
        let composite = CompositeView::new(ViewOptions::new());
        let model = Model::with_attributes(json!({"n": 1})).unwrap();
        let child = Rc::new(CompositeView::new(ViewOptions::new().model(model.clone())));
        child.view().listen_to_model("change", |_| {});
        child.view().el().set_text("content");
        composite.register_child(child.clone(), RegisterOptions::new());
        composite.view().el().append(&child.view().el());

        composite.clear();
        assert_eq!(child.view().el().text_content(), "");
        assert!(child.view().el().parent().is_none());
        assert_eq!(model.listener_count(), 1);
        assert_eq!(composite.child_count(), 1);

        composite.release();
        composite.release();
        assert_eq!(model.listener_count(), 0);
        assert_eq!(composite.child_count(), 0);
    }

    #[test]
    fn registrations_are_logged_and_counted() {
        let sink = MemorySink::new();
        let metrics = ViewMetrics::shared();
        let config = ViewConfig::new()
            .with_logger(Logger::new(sink.clone()).with_min_level(LogLevel::Debug))
            .with_metrics(metrics.clone());
        let composite = CompositeView::new(ViewOptions::new().config(config));
        let hits = log();
        let item = Item::new("li", EventSpec::none(), &hits);
        composite.register_child(item.clone(), RegisterOptions::new());
        composite.register_child(item.clone(), RegisterOptions::new());
        composite.deregister_child(item.as_ref());

        let snapshot = metrics.lock().unwrap().snapshot();
        assert_eq!(snapshot.registrations, 1);
        assert_eq!(snapshot.deregistrations, 1);
        let messages = sink.messages();
        assert_eq!(
            messages,
            vec!["registered child", "registered child", "deregistered child"]
        );
        assert_eq!(
            sink.events()[1].field("placement"),
            Some(&json!("existing"))
        );
    }
}
