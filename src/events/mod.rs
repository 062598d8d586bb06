//! Owner-tagged subscription lists.
//!
//! Models, collections and routers emit named notifications through an
//! [`EventHub`]. Subscriptions may carry the [`Cid`] of the view that created
//! them so the view can drop all of them at once when it is released.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::identity::Cid;

pub type ListenerId = u64;

/// Wildcard event name receiving every notification.
pub const ALL_EVENTS: &str = "all";

struct Subscription<E> {
    id: ListenerId,
    event: String,
    owner: Option<Cid>,
    callback: Rc<dyn Fn(&E)>,
}

pub struct EventHub<E> {
    subscriptions: RefCell<Vec<Subscription<E>>>,
    next_id: Cell<ListenerId>,
}

impl<E> Default for EventHub<E> {
    fn default() -> Self {
        Self {
            subscriptions: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }
}

impl<E> EventHub<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(
        &self,
        event: &str,
        owner: Option<&Cid>,
        callback: impl Fn(&E) + 'static,
    ) -> ListenerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.subscriptions.borrow_mut().push(Subscription {
            id,
            event: event.to_string(),
            owner: owner.cloned(),
            callback: Rc::new(callback),
        });
        id
    }

    pub fn off(&self, id: ListenerId) -> bool {
        let mut subs = self.subscriptions.borrow_mut();
        let before = subs.len();
        subs.retain(|sub| sub.id != id);
        subs.len() != before
    }

    /// Drops every subscription created on behalf of `owner`; returns how many went away.
    pub fn off_owner(&self, owner: &Cid) -> usize {
        let mut subs = self.subscriptions.borrow_mut();
        let before = subs.len();
        subs.retain(|sub| sub.owner.as_ref() != Some(owner));
        before - subs.len()
    }

    pub fn listener_count(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    pub fn owner_count(&self, owner: &Cid) -> usize {
        self.subscriptions
            .borrow()
            .iter()
            .filter(|sub| sub.owner.as_ref() == Some(owner))
            .count()
    }

    /// Invokes matching callbacks in subscription order.
    ///
    /// The list is snapshotted first: callbacks may subscribe or unsubscribe
    /// without affecting the current emission.
    pub fn emit(&self, event: &str, payload: &E) -> usize {
        let callbacks: Vec<Rc<dyn Fn(&E)>> = self
            .subscriptions
            .borrow()
            .iter()
            .filter(|sub| sub.event == event || sub.event == ALL_EVENTS)
            .map(|sub| Rc::clone(&sub.callback))
            .collect();
        for callback in &callbacks {
            callback(payload);
        }
        callbacks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_reaches_named_and_wildcard_listeners() {
        let hub: EventHub<u32> = EventHub::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let a = seen.clone();
        hub.on("add", None, move |value| a.borrow_mut().push(("add", *value)));
        let b = seen.clone();
        hub.on(ALL_EVENTS, None, move |value| b.borrow_mut().push(("all", *value)));

        assert_eq!(hub.emit("add", &7), 2);
        assert_eq!(hub.emit("remove", &8), 1);
        assert_eq!(*seen.borrow(), vec![("add", 7), ("all", 7), ("all", 8)]);
    }

    #[test]
    fn off_owner_removes_only_that_owner() {
        let hub: EventHub<()> = EventHub::new();
        let owner = Cid::from("view1");
        let other = Cid::from("view2");
        hub.on("change", Some(&owner), |_| {});
        hub.on("reset", Some(&owner), |_| {});
        hub.on("change", Some(&other), |_| {});

        assert_eq!(hub.off_owner(&owner), 2);
        assert_eq!(hub.off_owner(&owner), 0);
        assert_eq!(hub.listener_count(), 1);
        assert_eq!(hub.owner_count(&other), 1);
    }

    #[test]
    fn callbacks_may_unsubscribe_during_emit() {
        let hub: Rc<EventHub<()>> = Rc::new(EventHub::new());
        let count = Rc::new(Cell::new(0));
        let weak = Rc::downgrade(&hub);
        let counter = count.clone();
        let id = Rc::new(Cell::new(0));
        let own_id = id.clone();
        id.set(hub.on("change", None, move |_| {
            counter.set(counter.get() + 1);
            if let Some(hub) = weak.upgrade() {
                hub.off(own_id.get());
            }
        }));

        hub.emit("change", &());
        hub.emit("change", &());
        assert_eq!(count.get(), 1);
    }
}
