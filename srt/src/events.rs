//! Generic observer registry - the event-emitter polymorphism of the
//! source collapses to one small type here: register by insertion order,
//! fire synchronously in that order, clear on dispose.

use parking_lot::Mutex;

type Listener<E> = Box<dyn Fn(&E) + Send + Sync>;

pub struct EventEmitter<E> {
    listeners: Mutex<Vec<Listener<E>>>,
}

impl<E> Default for EventEmitter<E> {
    fn default() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }
}

impl<E> EventEmitter<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, listener: impl Fn(&E) + Send + Sync + 'static) {
        self.listeners.lock().push(Box::new(listener));
    }

    /// Fires `event` to every registered listener, in registration order.
    pub fn emit(&self, event: &E) {
        for listener in self.listeners.lock().iter() {
            listener(event);
        }
    }

    /// Detaches every observer. Called once, from `dispose()`.
    pub fn clear(&self) {
        self.listeners.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    #[test]
    fn fires_listeners_in_registration_order() {
        let emitter: EventEmitter<u32> = EventEmitter::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for tag in 0..5u32 {
            let seen = seen.clone();
            emitter.on(move |event| seen.lock().push((tag, *event)));
        }

        emitter.emit(&42);

        let seen = seen.lock();
        let tags: Vec<u32> = seen.iter().map(|(tag, _)| *tag).collect();
        assert_eq!(tags, vec![0, 1, 2, 3, 4]);
        assert!(seen.iter().all(|(_, v)| *v == 42));
    }

    #[test]
    fn clear_detaches_all_observers() {
        let emitter: EventEmitter<()> = EventEmitter::new();
        let count = Arc::new(AtomicUsize::new(0));

        let count_clone = count.clone();
        emitter.on(move |_| {
            count_clone.fetch_add(1, Ordering::Relaxed);
        });

        emitter.emit(&());
        assert_eq!(count.load(Ordering::Relaxed), 1);

        emitter.clear();
        emitter.emit(&());
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }
}
