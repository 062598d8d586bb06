use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;

use crate::events::{EventHub, ListenerId};
use crate::identity::Cid;

use super::Model;

pub type Comparator = Rc<dyn Fn(&Model, &Model) -> Ordering>;

/// What happened to a [`Collection`].
#[derive(Clone, Debug)]
pub enum CollectionEventKind {
    Add { model: Model, index: usize },
    Remove { model: Model, index: usize },
    Reset { previous: Vec<Model> },
}

/// Notification emitted by a [`Collection`] after its contents changed.
#[derive(Clone)]
pub struct CollectionEvent {
    pub collection: Collection,
    pub kind: CollectionEventKind,
}

impl CollectionEvent {
    pub fn name(&self) -> &'static str {
        match self.kind {
            CollectionEventKind::Add { .. } => "add",
            CollectionEventKind::Remove { .. } => "remove",
            CollectionEventKind::Reset { .. } => "reset",
        }
    }

    pub fn index(&self) -> Option<usize> {
        match &self.kind {
            CollectionEventKind::Add { index, .. } | CollectionEventKind::Remove { index, .. } => {
                Some(*index)
            }
            CollectionEventKind::Reset { .. } => None,
        }
    }

    pub fn model(&self) -> Option<&Model> {
        match &self.kind {
            CollectionEventKind::Add { model, .. } | CollectionEventKind::Remove { model, .. } => {
                Some(model)
            }
            CollectionEventKind::Reset { .. } => None,
        }
    }
}

struct CollectionInner {
    cid: Cid,
    models: RefCell<Vec<Model>>,
    comparator: RefCell<Option<Comparator>>,
    hub: EventHub<CollectionEvent>,
}

/// Ordered, observable list of models.
///
/// With a comparator, `add` inserts after any equal elements so the list stays
/// sorted; without one, models are appended.
#[derive(Clone)]
pub struct Collection(Rc<CollectionInner>);

#[derive(Clone)]
pub(crate) struct WeakCollection(Weak<CollectionInner>);

impl WeakCollection {
    pub(crate) fn upgrade(&self) -> Option<Collection> {
        self.0.upgrade().map(Collection)
    }
}

impl Collection {
    pub fn new() -> Self {
        Self(Rc::new(CollectionInner {
            cid: Cid::unique("collection"),
            models: RefCell::new(Vec::new()),
            comparator: RefCell::new(None),
            hub: EventHub::new(),
        }))
    }

    pub fn with_comparator(comparator: impl Fn(&Model, &Model) -> Ordering + 'static) -> Self {
        let collection = Self::new();
        collection.set_comparator(Some(Rc::new(comparator)));
        collection
    }

    /// Sorts ascending by one attribute.
    pub fn sorted_by(key: &str) -> Self {
        let key = key.to_string();
        Self::with_comparator(move |a, b| {
            compare_values(a.get(&key).as_ref(), b.get(&key).as_ref())
        })
    }

    pub fn cid(&self) -> &Cid {
        &self.0.cid
    }

    pub fn set_comparator(&self, comparator: Option<Comparator>) {
        *self.0.comparator.borrow_mut() = comparator;
    }

    pub fn len(&self) -> usize {
        self.0.models.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.models.borrow().is_empty()
    }

    pub fn at(&self, index: usize) -> Option<Model> {
        self.0.models.borrow().get(index).cloned()
    }

    pub fn models(&self) -> Vec<Model> {
        self.0.models.borrow().clone()
    }

    pub fn index_of(&self, model: &Model) -> Option<usize> {
        self.0
            .models
            .borrow()
            .iter()
            .position(|candidate| candidate.cid() == model.cid())
    }

    pub fn contains(&self, model: &Model) -> bool {
        self.index_of(model).is_some()
    }

    /// Looks a model up by its `id` attribute.
    pub fn get(&self, id: &Value) -> Option<Model> {
        self.0
            .models
            .borrow()
            .iter()
            .find(|model| model.id().as_ref() == Some(id))
            .cloned()
    }

    /// Adds a model at its sorted position (or the end) and emits `add`.
    ///
    /// Returns `None` if the model is already present.
    pub fn add(&self, model: Model) -> Option<usize> {
        let index = {
            let comparator = self.0.comparator.borrow().clone();
            let models = self.0.models.borrow();
            if models.iter().any(|m| m.cid() == model.cid()) {
                return None;
            }
            match comparator {
                Some(cmp) => models.partition_point(|existing| cmp(existing, &model) != Ordering::Greater),
                None => models.len(),
            }
        };
        self.insert(model, index)
    }

    /// Adds a model at an explicit position, ignoring the comparator.
    pub fn add_at(&self, model: Model, index: usize) -> Option<usize> {
        if self.contains(&model) {
            return None;
        }
        let index = index.min(self.len());
        self.insert(model, index)
    }

    pub fn add_all(&self, models: impl IntoIterator<Item = Model>) -> usize {
        models
            .into_iter()
            .filter_map(|model| self.add(model))
            .count()
    }

    fn insert(&self, model: Model, index: usize) -> Option<usize> {
        self.0.models.borrow_mut().insert(index, model.clone());
        model.set_collection(Some(self.downgrade()));
        self.emit(CollectionEventKind::Add { model, index });
        Some(index)
    }

    pub fn remove(&self, model: &Model) -> Option<usize> {
        let index = self.index_of(model)?;
        self.remove_at(index).map(|_| index)
    }

    pub fn remove_at(&self, index: usize) -> Option<Model> {
        let model = {
            let mut models = self.0.models.borrow_mut();
            if index >= models.len() {
                return None;
            }
            models.remove(index)
        };
        if model.belongs_to(self) {
            model.set_collection(None);
        }
        self.emit(CollectionEventKind::Remove {
            model: model.clone(),
            index,
        });
        Some(model)
    }

    /// Replaces the contents wholesale and emits a single `reset`.
    pub fn reset(&self, models: impl IntoIterator<Item = Model>) {
        let mut next: Vec<Model> = Vec::new();
        for model in models {
            if !next.iter().any(|m| m.cid() == model.cid()) {
                next.push(model);
            }
        }
        if let Some(cmp) = self.0.comparator.borrow().clone() {
            next.sort_by(|a, b| cmp(a, b));
        }
        let previous = std::mem::replace(&mut *self.0.models.borrow_mut(), next.clone());
        for model in &previous {
            if model.belongs_to(self) {
                model.set_collection(None);
            }
        }
        for model in &next {
            model.set_collection(Some(self.downgrade()));
        }
        self.emit(CollectionEventKind::Reset { previous });
    }

    /// Re-sorts with the comparator; observers see a `reset`.
    pub fn sort(&self) {
        let models = self.models();
        self.reset(models);
    }

    pub fn on(
        &self,
        event: &str,
        owner: Option<&Cid>,
        callback: impl Fn(&CollectionEvent) + 'static,
    ) -> ListenerId {
        self.0.hub.on(event, owner, callback)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.0.hub.off(id)
    }

    pub fn off_owner(&self, owner: &Cid) -> usize {
        self.0.hub.off_owner(owner)
    }

    pub fn listener_count(&self) -> usize {
        self.0.hub.listener_count()
    }

    pub fn ptr_eq(&self, other: &Collection) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn downgrade(&self) -> WeakCollection {
        WeakCollection(Rc::downgrade(&self.0))
    }

    fn emit(&self, kind: CollectionEventKind) {
        let event = CollectionEvent {
            collection: self.clone(),
            kind,
        };
        self.0.hub.emit(event.name(), &event);
    }
}

impl Default for Collection {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("cid", &self.0.cid)
            .field("len", &self.len())
            .finish()
    }
}

/// Orders JSON values: numbers numerically, strings lexically, missing values first.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}
