use std::collections::VecDeque;

/// Append-only buffer with a hard capacity and a trim-to-keep-last policy.
///
/// Appending past `cap` replaces the contents with the `keep` most-recent
/// elements, preserving relative order. The series does no locking of its
/// own; owners guard it with whatever exclusion their context requires.
#[derive(Debug, Clone)]
pub struct BoundedSeries<T> {
    items: VecDeque<T>,
    cap: usize,
    keep: usize,
}

impl<T> BoundedSeries<T> {
    /// `keep` must be strictly smaller than `cap`.
    pub fn new(cap: usize, keep: usize) -> Self {
        debug_assert!(keep < cap);
        Self {
            items: VecDeque::with_capacity(keep.min(1024)),
            cap,
            keep,
        }
    }

    pub fn append(&mut self, item: T) {
        self.items.push_back(item);
        if self.items.len() > self.cap {
            let excess = self.items.len() - self.keep;
            self.items.drain(..excess);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: Clone> BoundedSeries<T> {
    /// Owned copy of the retained items, oldest first. Callers can iterate
    /// it while the owner keeps appending.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}
