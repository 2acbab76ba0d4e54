//! The single authoritative "currently highlighted detection" index.
//!
//! Overlay, object list and detail panel all subscribe here instead of
//! keeping their own copy of the selection.

use crate::error::ReviewError;

/// Handle returned by [`SelectionStore::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(usize);

type Listener = Box<dyn FnMut(Option<usize>)>;

/// Holds the selected index for the current detection list and notifies
/// subscribers synchronously on every change.
#[derive(Default)]
pub struct SelectionStore {
    selected: Option<usize>,
    len: usize,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: usize,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<usize> {
        self.selected
    }

    /// Number of detections the current index is validated against.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Selects `index` and notifies every subscriber before returning.
    ///
    /// An index outside the current list leaves the selection untouched and
    /// notifies nobody.
    pub fn select(&mut self, index: usize) -> Result<(), ReviewError> {
        if index >= self.len {
            return Err(ReviewError::OutOfRange {
                index,
                len: self.len,
            });
        }
        self.selected = Some(index);
        self.notify();
        Ok(())
    }

    /// Drops the selection, keeping the current list length.
    pub fn clear(&mut self) {
        self.selected = None;
        self.notify();
    }

    /// Starts over for a new detection list of `len` items.
    ///
    /// Always clears, even when `len` matches the old length: an index
    /// must never carry over into an unrelated result set.
    pub fn replace(&mut self, len: usize) {
        self.len = len;
        self.clear();
    }

    pub fn subscribe(&mut self, listener: impl FnMut(Option<usize>) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    fn notify(&mut self) {
        let selected = self.selected;
        for (_, listener) in self.listeners.iter_mut() {
            listener(selected);
        }
    }
}

impl std::fmt::Debug for SelectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionStore")
            .field("selected", &self.selected)
            .field("len", &self.len)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder(store: &mut SelectionStore) -> Rc<RefCell<Vec<Option<usize>>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        store.subscribe(move |index| sink.borrow_mut().push(index));
        seen
    }

    #[test]
    fn select_notifies_all_subscribers_synchronously() {
        let mut store = SelectionStore::new();
        store.replace(3);
        let overlay = recorder(&mut store);
        let list = recorder(&mut store);

        store.select(2).unwrap();

        assert_eq!(store.get(), Some(2));
        assert_eq!(overlay.borrow().last(), Some(&Some(2)));
        assert_eq!(list.borrow().last(), Some(&Some(2)));
    }

    #[test]
    fn out_of_range_is_rejected_without_notification() {
        let mut store = SelectionStore::new();
        store.replace(2);
        store.select(1).unwrap();
        let seen = recorder(&mut store);

        let err = store.select(2).unwrap_err();

        assert_eq!(err, ReviewError::OutOfRange { index: 2, len: 2 });
        assert_eq!(store.get(), Some(1));
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn replace_clears_even_for_longer_list() {
        let mut store = SelectionStore::new();
        store.replace(2);
        store.select(1).unwrap();

        store.replace(5);

        assert_eq!(store.get(), None);
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn unsubscribed_listener_is_not_called() {
        let mut store = SelectionStore::new();
        store.replace(1);
        let seen = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&seen);
        let id = store.subscribe(move |_| *sink.borrow_mut() += 1);

        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.select(0).unwrap();

        assert_eq!(*seen.borrow(), 0);
    }
}
