use std::rc::Rc;

use crate::composite::{CompositeView, RegisterOptions};
use crate::config::ViewConfig;
use crate::dom::Element;
use crate::error::{Result, ViewError};
use crate::logging::{COLLECTION_TARGET, LogLevel, json_kv, json_str};
use crate::model::{Collection, CollectionEvent, Model};
use crate::view::{Component, ViewBase, ViewOptions, delegate_events, install};

/// Builds the child view for one model.
pub type ChildFactory = Rc<dyn Fn(Model) -> Result<Rc<dyn Component>>>;

/// What a [`CollectionView`] shows while its collection is empty.
#[derive(Clone)]
pub enum EmptyContent {
    Text(String),
    /// Cloned into the view on every empty render.
    Template(Element),
    Computed(Rc<dyn Fn() -> Vec<Element>>),
}

impl EmptyContent {
    fn nodes(&self) -> Vec<Element> {
        match self {
            Self::Text(text) => vec![Element::text(text.clone())],
            Self::Template(template) => vec![template.deep_clone()],
            Self::Computed(build) => build(),
        }
    }
}

/// Collects configuration for a [`CollectionView`].
#[derive(Default)]
pub struct CollectionViewBuilder {
    options: ViewOptions,
    collection: Option<Collection>,
    factory: Option<ChildFactory>,
    selector: Option<String>,
    empty: Option<EmptyContent>,
}

impl CollectionViewBuilder {
    pub fn options(mut self, options: ViewOptions) -> Self {
        self.options = options;
        self
    }

    pub fn collection(mut self, collection: Collection) -> Self {
        self.collection = Some(collection);
        self
    }

    /// Child view constructor; each child is installed so its own events are bound.
    pub fn child_view<C, F>(mut self, build: F) -> Self
    where
        C: Component,
        F: Fn(Model) -> C + 'static,
    {
        self.factory = Some(Rc::new(move |model| {
            let child: Rc<dyn Component> = install(build(model))?;
            Ok(child)
        }));
        self
    }

    pub fn delegation_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn empty(mut self, empty: EmptyContent) -> Self {
        self.empty = Some(empty);
        self
    }

    pub fn empty_text(self, text: impl Into<String>) -> Self {
        self.empty(EmptyContent::Text(text.into()))
    }

    pub fn empty_with(self, build: impl Fn() -> Vec<Element> + 'static) -> Self {
        self.empty(EmptyContent::Computed(Rc::new(build)))
    }

    /// Creates the view, registers a child per model and starts following the
    /// collection. Fails when the child view or the collection is missing.
    pub fn build(self) -> Result<Rc<CollectionView>> {
        let factory = self.factory.ok_or(ViewError::MissingOption("child_view"))?;
        let collection = self
            .collection
            .or_else(|| self.options.collection.clone())
            .ok_or(ViewError::MissingOption("collection"))?;
        let options = self.options.collection(collection.clone());
        let view = Rc::new(CollectionView {
            composite: CompositeView::new(options),
            collection,
            factory,
            selector: self.selector,
            empty: self.empty,
        });
        view.sync_views()?;
        view.subscribe();
        let handle: Rc<dyn Component> = view.clone();
        delegate_events(&handle)?;
        Ok(view)
    }
}

/// Composite whose children mirror a collection one-to-one, in order.
///
/// After every add, remove and reset the child at position `i` is bound to
/// the model at position `i`.
pub struct CollectionView {
    composite: CompositeView,
    collection: Collection,
    factory: ChildFactory,
    selector: Option<String>,
    empty: Option<EmptyContent>,
}

impl CollectionView {
    pub fn builder() -> CollectionViewBuilder {
        CollectionViewBuilder::default()
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn delegation_selector(&self) -> Option<&str> {
        self.selector.as_deref()
    }

    pub fn children(&self) -> Vec<Rc<dyn Component>> {
        self.composite.children()
    }

    /// Whether every child is bound to the model at the same position.
    pub fn is_aligned(&self) -> bool {
        let children = self.children();
        children.len() == self.collection.len()
            && children.iter().enumerate().all(|(index, child)| {
                match (child.model(), self.collection.at(index)) {
                    (Some(bound), Some(expected)) => bound.ptr_eq(&expected),
                    _ => false,
                }
            })
    }

    /// Drops the registry and registers a fresh child for every model.
    pub fn sync_views(&self) -> Result<()> {
        self.composite.reset_registry();
        for model in self.collection.models() {
            let child = (self.factory)(model)?;
            self.composite.register(child, self.register_options(None));
        }
        self.ensure_delegated()?;
        self.config().log(
            LogLevel::Debug,
            COLLECTION_TARGET,
            "synced child views",
            [
                json_str("view", self.cid().as_str()),
                json_kv("children", self.composite.child_count()),
            ],
        );
        Ok(())
    }

    /// Shows the empty content, or renders every child in order.
    pub fn render_list(&self) -> Result<()> {
        if self.collection.is_empty() {
            return self.render_empty();
        }
        self.clear();
        let el = self.el();
        for child in self.children() {
            child.render()?;
            el.append(&child.el());
        }
        Ok(())
    }

    pub fn render_empty(&self) -> Result<()> {
        self.clear();
        if let Some(empty) = self.empty.as_ref() {
            self.el().set_content(empty.nodes());
        }
        Ok(())
    }

    fn on_add(&self, event: &CollectionEvent) -> Result<()> {
        let (Some(model), Some(index)) = (event.model(), event.index()) else {
            return Ok(());
        };
        if event.collection.len() == 1 {
            self.clear();
        }
        let child = (self.factory)(model.clone())?;
        let index = self
            .composite
            .register(child.clone(), self.register_options(Some(index)));
        child.render()?;

        let host = self.el();
        let el = child.el();
        if index == 0 {
            host.prepend(&el);
        } else if index + 1 == self.composite.child_count() {
            host.append(&el);
        } else {
            match host.children().get(index) {
                Some(anchor) => {
                    anchor.insert_before(&el);
                }
                None => host.append(&el),
            }
        }
        self.ensure_delegated()?;
        self.note_reconciled("add", index);
        Ok(())
    }

    fn on_remove(&self, event: &CollectionEvent) -> Result<()> {
        let Some(index) = event.index() else {
            return Ok(());
        };
        if let Some(child) = self.composite.deregister_child_at(index) {
            child.view().remove();
            child.release();
        }
        if event.collection.is_empty() {
            self.render_empty()?;
        }
        self.note_reconciled("remove", index);
        Ok(())
    }

    fn on_reset(&self) -> Result<()> {
        for child in self.children() {
            child.view().remove();
            child.release();
        }
        self.sync_views()?;
        self.render_list()?;
        self.note_reconciled("reset", self.collection.len());
        Ok(())
    }

    fn subscribe(self: &Rc<Self>) {
        let owner = self.cid().clone();
        for name in ["add", "remove", "reset"] {
            let weak = Rc::downgrade(self);
            self.collection.on(name, Some(&owner), move |event| {
                let Some(view) = weak.upgrade() else {
                    return;
                };
                let outcome = match event.name() {
                    "add" => view.on_add(event),
                    "remove" => view.on_remove(event),
                    _ => view.on_reset(),
                };
                if let Err(err) = outcome {
                    view.config().log(
                        LogLevel::Error,
                        COLLECTION_TARGET,
                        "collection sync failed",
                        [
                            json_str("view", view.cid().as_str()),
                            json_str("event", event.name()),
                            json_str("error", err.to_string()),
                        ],
                    );
                }
            });
        }
    }

    fn register_options(&self, at: Option<usize>) -> RegisterOptions {
        RegisterOptions {
            selector: self.selector.clone(),
            at,
        }
    }

    /// Children added after the table was built may carry a selector nobody owns yet.
    fn ensure_delegated(&self) -> Result<()> {
        match self.selector.as_deref() {
            Some(selector)
                if self.composite.child_count() > 0 && !self.composite.is_delegated(selector) =>
            {
                self.composite.delegate_child_events()
            }
            _ => Ok(()),
        }
    }

    fn config(&self) -> &ViewConfig {
        self.composite.config()
    }

    fn note_reconciled(&self, step: &str, index: usize) {
        self.config().record(|metrics| metrics.record_reconciliation());
        self.config().log(
            LogLevel::Debug,
            COLLECTION_TARGET,
            "reconciled",
            [
                json_str("view", self.cid().as_str()),
                json_str("step", step),
                json_kv("index", index),
                json_kv("children", self.composite.child_count()),
            ],
        );
    }
}

impl Component for CollectionView {
    fn view(&self) -> &ViewBase {
        self.composite.view()
    }

    fn composite(&self) -> Option<&CompositeView> {
        Some(&self.composite)
    }

    fn render(&self) -> Result<()> {
        self.render_list()
    }
}
