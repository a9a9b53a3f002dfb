use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<E, C> = Rc<dyn Fn(&E, &mut C)>;

/// Synchronous observer list. Handlers receive the event plus a caller-supplied context.
/// Delivery follows subscription order; the list is snapshotted before each broadcast.
pub struct Signal<E, C = ()> {
    next_id: u64,
    handlers: Vec<(SubscriptionId, Handler<E, C>)>,
}

impl<E, C> Default for Signal<E, C> {
    fn default() -> Self {
        Self {
            next_id: 0,
            handlers: Vec::new(),
        }
    }
}

impl<E, C> fmt::Debug for Signal<E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("subscribers", &self.handlers.len())
            .finish()
    }
}

impl<E, C> Signal<E, C> {
    pub fn subscribe(&mut self, handler: impl Fn(&E, &mut C) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.handlers.push((id, Rc::new(handler)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(existing, _)| *existing != id);
        self.handlers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    /// Broadcasts `event` to every current subscriber. Returns the number notified.
    pub fn emit(&self, event: &E, context: &mut C) -> usize {
        let snapshot: Vec<Handler<E, C>> = self
            .handlers
            .iter()
            .map(|(_, handler)| Rc::clone(handler))
            .collect();
        for handler in &snapshot {
            handler(event, context);
        }
        snapshot.len()
    }
}

impl<E> Signal<E, ()> {
    pub fn notify(&self, event: &E) -> usize {
        self.emit(event, &mut ())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[test]
    fn emit_reaches_every_subscriber_with_context() {
        let mut signal = Signal::<u32, Vec<u32>>::default();
        signal.subscribe(|value, seen| seen.push(*value));
        signal.subscribe(|value, seen| seen.push(*value * 10));

        let mut seen = Vec::new();
        assert_eq!(signal.emit(&3, &mut seen), 2);
        assert_eq!(seen, vec![3, 30]);
    }

    #[test]
    fn unsubscribed_handler_is_not_called() {
        let calls = Rc::new(RefCell::new(0));
        let mut signal = Signal::<()>::default();
        let counter = Rc::clone(&calls);
        let id = signal.subscribe(move |_, _| *counter.borrow_mut() += 1);

        signal.notify(&());
        assert!(signal.unsubscribe(id));
        assert!(!signal.unsubscribe(id));
        signal.notify(&());
        assert_eq!(*calls.borrow(), 1);
        assert_eq!(signal.subscriber_count(), 0);
    }
}
