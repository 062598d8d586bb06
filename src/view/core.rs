use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::composite::CompositeView;
use crate::config::{PLACEHOLDER_TAG, ViewConfig};
use crate::dom::{DomEvent, Element};
use crate::error::Result;
use crate::events::ListenerId;
use crate::identity::{CID_ATTR, Cid};
use crate::model::{Collection, CollectionEvent, Model, ModelEvent};

use super::events::{EventSpec, split_event_key};

/// A DOM-bound UI unit.
///
/// Implementors own a [`ViewBase`] and override the hooks they need. Composites
/// return their [`CompositeView`] from [`Component::composite`] so that the default
/// `release` and `clear` reach their children.
pub trait Component: 'static {
    fn view(&self) -> &ViewBase;

    fn render(&self) -> Result<()> {
        Ok(())
    }

    /// Event bindings, keyed `"event selector"`.
    fn events(&self) -> EventSpec {
        EventSpec::none()
    }

    /// Resolves a method name from an event binding. Returns `false` when the
    /// name is unknown, which makes the dispatch a no-op.
    fn handle(&self, _method: &str, _event: &mut DomEvent) -> bool {
        false
    }

    fn composite(&self) -> Option<&CompositeView> {
        None
    }

    fn release(&self) {
        if let Some(composite) = self.composite() {
            composite.release_children();
        }
        self.view().release();
    }

    fn clear(&self) {
        if let Some(composite) = self.composite() {
            composite.clear_children();
        }
        self.view().clear();
    }

    fn cid(&self) -> &Cid {
        self.view().cid()
    }

    fn el(&self) -> Element {
        self.view().el()
    }

    fn model(&self) -> Option<Model> {
        self.view().model()
    }
}

/// Construction options for [`ViewBase`].
#[derive(Clone, Default)]
pub struct ViewOptions {
    pub tag_name: Option<String>,
    pub class_name: Option<String>,
    pub id: Option<String>,
    pub attributes: Vec<(String, String)>,
    pub el: Option<Element>,
    pub model: Option<Model>,
    pub collection: Option<Collection>,
    pub config: ViewConfig,
}

impl ViewOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag_name(mut self, tag: impl Into<String>) -> Self {
        self.tag_name = Some(tag.into());
        self
    }

    pub fn class_name(mut self, class: impl Into<String>) -> Self {
        self.class_name = Some(class.into());
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn el(mut self, el: Element) -> Self {
        self.el = Some(el);
        self
    }

    pub fn model(mut self, model: Model) -> Self {
        self.model = Some(model);
        self
    }

    pub fn collection(mut self, collection: Collection) -> Self {
        self.collection = Some(collection);
        self
    }

    pub fn config(mut self, config: ViewConfig) -> Self {
        self.config = config;
        self
    }

    fn build_element(&self) -> Element {
        if let Some(el) = &self.el {
            return el.clone();
        }
        let el = Element::new(self.tag_name.as_deref().unwrap_or("div"));
        if let Some(class) = &self.class_name {
            el.set_attr("class", class.clone());
        }
        if let Some(id) = &self.id {
            el.set_attr("id", id.clone());
        }
        for (name, value) in &self.attributes {
            el.set_attr(name, value.clone());
        }
        el
    }
}

/// State shared by every component: identity, bound element, model and collection.
pub struct ViewBase {
    cid: Cid,
    el: RefCell<Element>,
    model: RefCell<Option<Model>>,
    collection: RefCell<Option<Collection>>,
    config: ViewConfig,
}

impl ViewBase {
    pub fn new(options: ViewOptions) -> Self {
        let el = options.build_element();
        let base = Self {
            cid: Cid::unique("view"),
            el: RefCell::new(el.clone()),
            model: RefCell::new(options.model),
            collection: RefCell::new(options.collection),
            config: options.config,
        };
        el.set_attr(CID_ATTR, base.cid.as_str());
        base
    }

    pub fn cid(&self) -> &Cid {
        &self.cid
    }

    pub fn el(&self) -> Element {
        self.el.borrow().clone()
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn model(&self) -> Option<Model> {
        self.model.borrow().clone()
    }

    pub fn collection(&self) -> Option<Collection> {
        self.collection.borrow().clone()
    }

    /// Rebinds to another model; subscriptions this view held on the old one are dropped.
    pub fn set_model(&self, model: Option<Model>) {
        let previous = std::mem::replace(&mut *self.model.borrow_mut(), model);
        if let Some(previous) = previous {
            previous.off_owner(&self.cid);
        }
    }

    /// Rebinds the view to `el`, tagging it with this view's cid. Bindings on the
    /// previous element are dropped; call [`delegate_events`] to rebuild them.
    pub fn set_element(&self, el: Element) {
        self.undelegate_events();
        el.set_attr(CID_ATTR, self.cid.as_str());
        *self.el.borrow_mut() = el;
    }

    pub fn query(&self, selector: &str) -> Result<Vec<Element>> {
        self.el().query_all(selector)
    }

    /// Namespace carried by every binding this view installs on its element.
    pub fn events_namespace(&self) -> String {
        format!("delegateEvents{}", self.cid)
    }

    /// Removes every binding this view installed, including child delegations.
    pub fn undelegate_events(&self) -> usize {
        self.el().off(&format!(".{}", self.events_namespace()))
    }

    /// Subscribes to the bound model, owned by this view so `release` drops it.
    pub fn listen_to_model(
        &self,
        event: &str,
        callback: impl Fn(&ModelEvent) + 'static,
    ) -> Option<ListenerId> {
        let model = self.model()?;
        Some(model.on(event, Some(&self.cid), callback))
    }

    pub fn listen_to_collection(
        &self,
        event: &str,
        callback: impl Fn(&CollectionEvent) + 'static,
    ) -> Option<ListenerId> {
        let collection = self.collection()?;
        Some(collection.on(event, Some(&self.cid), callback))
    }

    /// Drops every model/collection subscription owned by this view, then the
    /// references themselves. Safe to call repeatedly.
    pub fn release(&self) {
        let model = self.model.borrow_mut().take();
        if let Some(model) = model {
            model.off_owner(&self.cid);
        }
        let collection = self.collection.borrow_mut().take();
        if let Some(collection) = collection {
            collection.off_owner(&self.cid);
        }
    }

    pub fn clear(&self) {
        self.el().empty();
    }

    pub fn show(&self) {
        self.el().show();
    }

    pub fn hide(&self) {
        self.el().hide();
    }

    pub fn is_visible(&self) -> bool {
        self.el().is_visible()
    }

    /// Detaches the element from the document.
    pub fn remove(&self) {
        self.el().detach();
    }

    /// Marker element standing in for this view until a composite places it.
    pub fn placeholder(&self) -> Element {
        Element::new(PLACEHOLDER_TAG).with_attr(CID_ATTR, self.cid.as_str())
    }
}

impl fmt::Debug for ViewBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewBase")
            .field("cid", &self.cid)
            .field("el", &self.el.borrow().tag())
            .finish()
    }
}

/// Wraps a component and binds its events.
pub fn install<C: Component>(component: C) -> Result<Rc<C>> {
    let component = Rc::new(component);
    let handle: Rc<dyn Component> = component.clone();
    delegate_events(&handle)?;
    Ok(component)
}

/// Rebuilds the component's own bindings, then its child delegations.
///
/// Listeners hold the component weakly; once it is dropped they do nothing.
pub fn delegate_events(component: &Rc<dyn Component>) -> Result<()> {
    let base = component.view();
    base.undelegate_events();
    let namespace = base.events_namespace();
    let el = base.el();
    for (key, handler) in component.events().resolve() {
        let (event, selector) = split_event_key(&key);
        let receiver = Rc::downgrade(component);
        let selector = (!selector.is_empty()).then_some(selector);
        el.on(&format!("{event}.{namespace}"), selector, move |dom_event| {
            if let Some(receiver) = receiver.upgrade() {
                handler.invoke(receiver.as_ref(), dom_event);
            }
        })?;
    }
    if let Some(composite) = component.composite() {
        composite.delegate_child_events()?;
    }
    Ok(())
}
