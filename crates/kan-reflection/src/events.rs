use std::collections::VecDeque;

/// Insert/change/delete event over a logically indexed record, as
/// emitted by the substrate when a usage record is created, edited, or
/// removed (spec.md §4.5.1, §4.6.1).
#[derive(Debug, Clone)]
pub enum UsageEvent<T> {
    Insert { new: T },
    Change { old: T, new: T },
    Delete { old: T },
}

/// A deferred, append-only event queue: planning-phase mutators push
/// events, execution-phase mutators drain them. Draining never
/// observes events pushed after the drain started, matching the
/// substrate's "planning emits, execution consumes" split (spec.md §2).
#[derive(Debug)]
pub struct EventQueue<T> {
    queue: VecDeque<T>,
}

impl<T> EventQueue<T> {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    pub fn push(&mut self, event: T) {
        self.queue.push_back(event);
    }

    pub fn drain(&mut self) -> std::collections::vec_deque::Drain<'_, T> {
        self.queue.drain(..)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_consumes_in_fifo_order() {
        let mut q: EventQueue<u32> = EventQueue::new();
        q.push(1);
        q.push(2);
        q.push(3);
        let drained: Vec<_> = q.drain().collect();
        assert_eq!(drained, vec![1, 2, 3]);
        assert!(q.is_empty());
    }
}
