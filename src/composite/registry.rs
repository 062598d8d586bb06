use std::collections::HashMap;
use std::rc::Rc;

use crate::identity::Cid;
use crate::view::Component;

/// Outcome of [`ChildRegistry::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    Inserted(usize),
    /// Same object already tracked; position unchanged.
    Existing(usize),
    /// A different object claimed a tracked cid and took over its slot.
    Replaced(usize),
}

impl Placement {
    pub(crate) fn index(self) -> usize {
        match self {
            Self::Inserted(index) | Self::Existing(index) | Self::Replaced(index) => index,
        }
    }
}

/// Ordered children plus cid lookups, kept 1:1.
#[derive(Default)]
pub(crate) struct ChildRegistry {
    children: Vec<Rc<dyn Component>>,
    by_cid: HashMap<Cid, Rc<dyn Component>>,
    selectors: HashMap<Cid, String>,
}

pub(crate) fn same_component(a: &Rc<dyn Component>, b: &Rc<dyn Component>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

impl ChildRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.children.len()
    }

    pub(crate) fn position(&self, cid: &Cid) -> Option<usize> {
        self.children.iter().position(|child| child.cid() == cid)
    }

    /// Tracks `child` at `at` (clamped; default end). A cid already present keeps
    /// its slot.
    pub(crate) fn insert(&mut self, child: Rc<dyn Component>, at: Option<usize>) -> Placement {
        let cid = child.cid().clone();
        let existing = if self.by_cid.contains_key(&cid) {
            self.position(&cid)
        } else {
            None
        };
        if let Some(index) = existing {
            let same = same_component(&self.children[index], &child);
            self.by_cid.insert(cid, child.clone());
            if same {
                return Placement::Existing(index);
            }
            self.children[index] = child;
            return Placement::Replaced(index);
        }
        let index = at.unwrap_or(self.children.len()).min(self.children.len());
        self.children.insert(index, child.clone());
        self.by_cid.insert(cid, child);
        Placement::Inserted(index)
    }

    pub(crate) fn set_selector(&mut self, cid: &Cid, selector: String) {
        self.selectors.insert(cid.clone(), selector);
    }

    pub(crate) fn remove_at(&mut self, index: usize) -> Option<Rc<dyn Component>> {
        if index >= self.children.len() {
            return None;
        }
        let child = self.children.remove(index);
        self.by_cid.remove(child.cid());
        self.selectors.remove(child.cid());
        Some(child)
    }

    pub(crate) fn remove(&mut self, cid: &Cid) -> Option<(usize, Rc<dyn Component>)> {
        let index = self.position(cid)?;
        self.remove_at(index).map(|child| (index, child))
    }

    pub(crate) fn get(&self, cid: &Cid) -> Option<Rc<dyn Component>> {
        self.by_cid.get(cid).cloned()
    }

    pub(crate) fn selector(&self, cid: &Cid) -> Option<&str> {
        self.selectors.get(cid).map(String::as_str)
    }

    pub(crate) fn children(&self) -> Vec<Rc<dyn Component>> {
        self.children.clone()
    }

    /// Children paired with their delegation selectors, in order.
    pub(crate) fn delegated(&self) -> Vec<(Rc<dyn Component>, String)> {
        self.children
            .iter()
            .filter_map(|child| {
                self.selectors
                    .get(child.cid())
                    .map(|selector| (child.clone(), selector.clone()))
            })
            .collect()
    }

    /// Empties every table, returning the children that were tracked.
    pub(crate) fn reset(&mut self) -> Vec<Rc<dyn Component>> {
        self.by_cid.clear();
        self.selectors.clear();
        std::mem::take(&mut self.children)
    }

    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        self.children.len() == self.by_cid.len()
            && self.children.iter().all(|child| {
                self.by_cid
                    .get(child.cid())
                    .is_some_and(|tracked| same_component(tracked, child))
            })
            && self.selectors.keys().all(|cid| self.by_cid.contains_key(cid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{ViewBase, ViewOptions};

    struct Leaf(ViewBase);

    impl Component for Leaf {
        fn view(&self) -> &ViewBase {
            &self.0
        }
    }

    fn leaf() -> Rc<dyn Component> {
        Rc::new(Leaf(ViewBase::new(ViewOptions::new())))
    }

    fn order(registry: &ChildRegistry) -> Vec<Cid> {
        registry
            .children()
            .iter()
            .map(|child| child.cid().clone())
            .collect()
    }

    #[test]
    fn positions_clamp_and_preserve_order() {
        let mut registry = ChildRegistry::new();
        let (a, b, c) = (leaf(), leaf(), leaf());
        assert_eq!(registry.insert(a.clone(), None), Placement::Inserted(0));
        assert_eq!(registry.insert(b.clone(), Some(0)), Placement::Inserted(0));
        assert_eq!(registry.insert(c.clone(), Some(42)), Placement::Inserted(2));
        assert_eq!(
            order(&registry),
            vec![b.cid().clone(), a.cid().clone(), c.cid().clone()]
        );

        assert!(registry.remove(a.cid()).is_some());
        assert_eq!(order(&registry), vec![b.cid().clone(), c.cid().clone()]);
        assert!(registry.remove(a.cid()).is_none());
        assert!(registry.remove_at(5).is_none());
        assert!(registry.is_consistent());
    }

    #[test]
    fn reinsertion_keeps_slot() {
        let mut registry = ChildRegistry::new();
        let (a, b) = (leaf(), leaf());
        registry.insert(a.clone(), None);
        registry.insert(b.clone(), None);
        assert_eq!(registry.insert(a.clone(), Some(1)), Placement::Existing(0));
        assert_eq!(registry.len(), 2);
        assert!(registry.is_consistent());
    }

    #[test]
    fn selectors_follow_their_child() {
        let mut registry = ChildRegistry::new();
        let (a, b) = (leaf(), leaf());
        registry.insert(a.clone(), None);
        registry.insert(b.clone(), None);
        registry.set_selector(b.cid(), "li".to_string());

        let delegated = registry.delegated();
        assert_eq!(delegated.len(), 1);
        assert_eq!(delegated[0].1, "li");

        registry.remove_at(1);
        assert!(registry.selector(b.cid()).is_none());
        assert_eq!(registry.reset().len(), 1);
        assert_eq!(registry.len(), 0);
        assert!(registry.is_consistent());
    }
}
