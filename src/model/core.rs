use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Result, ViewError};
use crate::events::{EventHub, ListenerId};
use crate::identity::Cid;

use super::collection::{Collection, WeakCollection};

/// Notification emitted by a [`Model`].
#[derive(Clone)]
pub struct ModelEvent {
    pub model: Model,
    /// Attribute keys touched by the change; empty for manual triggers.
    pub changed: Vec<String>,
}

struct ModelInner {
    cid: Cid,
    attributes: RefCell<Map<String, Value>>,
    hub: EventHub<ModelEvent>,
    collection: RefCell<Option<WeakCollection>>,
}

/// Observable attribute bag.
#[derive(Clone)]
pub struct Model(Rc<ModelInner>);

impl Model {
    pub fn new() -> Self {
        Self::from_map(Map::new())
    }

    fn from_map(attributes: Map<String, Value>) -> Self {
        Self(Rc::new(ModelInner {
            cid: Cid::unique("model"),
            attributes: RefCell::new(attributes),
            hub: EventHub::new(),
            collection: RefCell::new(None),
        }))
    }

    /// Builds a model from a JSON object.
    pub fn with_attributes(attributes: Value) -> Result<Self> {
        match attributes {
            Value::Object(map) => Ok(Self::from_map(map)),
            other => Err(ViewError::NotAnObject(other.to_string())),
        }
    }

    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self> {
        Self::with_attributes(serde_json::to_value(value)?)
    }

    pub fn cid(&self) -> &Cid {
        &self.0.cid
    }

    pub fn id(&self) -> Option<Value> {
        self.get("id")
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.attributes.borrow().get(key).cloned()
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(text) => Some(text),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.0
            .attributes
            .borrow()
            .get(key)
            .is_some_and(|value| !value.is_null())
    }

    /// Sets one attribute; emits `change:<key>` and `change` when the value differs.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
        let mut changes = Map::new();
        changes.insert(key.to_string(), value.into());
        self.set_many(changes)
    }

    pub fn set_many(&self, changes: Map<String, Value>) -> bool {
        let changed: Vec<String> = {
            let mut attributes = self.0.attributes.borrow_mut();
            changes
                .into_iter()
                .filter_map(|(key, value)| {
                    if attributes.get(&key) == Some(&value) {
                        return None;
                    }
                    attributes.insert(key.clone(), value);
                    Some(key)
                })
                .collect()
        };
        self.notify_changes(changed)
    }

    pub fn unset(&self, key: &str) -> bool {
        let removed = self.0.attributes.borrow_mut().remove(key).is_some();
        if removed {
            self.notify_changes(vec![key.to_string()])
        } else {
            false
        }
    }

    fn notify_changes(&self, changed: Vec<String>) -> bool {
        if changed.is_empty() {
            return false;
        }
        let event = ModelEvent {
            model: self.clone(),
            changed: changed.clone(),
        };
        for key in &changed {
            self.0.hub.emit(&format!("change:{key}"), &event);
        }
        self.0.hub.emit("change", &event);
        true
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.0.attributes.borrow().clone())
    }

    pub fn on(
        &self,
        event: &str,
        owner: Option<&Cid>,
        callback: impl Fn(&ModelEvent) + 'static,
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

    pub fn trigger(&self, event: &str) -> usize {
        let payload = ModelEvent {
            model: self.clone(),
            changed: Vec::new(),
        };
        self.0.hub.emit(event, &payload)
    }

    /// Collection currently holding this model, if any.
    pub fn collection(&self) -> Option<Collection> {
        self.0
            .collection
            .borrow()
            .as_ref()
            .and_then(WeakCollection::upgrade)
    }

    pub(crate) fn set_collection(&self, collection: Option<WeakCollection>) {
        *self.0.collection.borrow_mut() = collection;
    }

    pub(crate) fn belongs_to(&self, collection: &Collection) -> bool {
        self.collection()
            .is_some_and(|current| current.ptr_eq(collection))
    }

    pub fn ptr_eq(&self, other: &Model) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("cid", &self.0.cid)
            .field("attributes", &self.0.attributes.borrow())
            .finish()
    }
}
