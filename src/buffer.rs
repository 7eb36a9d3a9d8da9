//! Work buffers.
//!
//! The buffer discipline alone decides the sweep order: a [`Queue`]
//! expands elements first-in-first-out (breadth-first), a [`Stack`]
//! last-in-first-out (depth-first). Buffers are plain single-owner
//! containers; each one belongs to exactly one traversal loop.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Contract shared by the buffer disciplines.
pub trait Buffer<T> {
    /// Whether the buffer holds no pending items.
    fn is_empty(&self) -> bool;

    /// Number of pending items.
    fn len(&self) -> usize;

    /// Add a pending item.
    fn add(&mut self, item: T);

    /// Remove and return the next item, `None` when empty.
    fn get(&mut self) -> Option<T>;
}

/// LIFO buffer (depth-first order).
#[derive(Debug, Clone)]
pub struct Stack<T> {
    items: Vec<T>,
}

impl<T> Stack<T> {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Default for Stack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Buffer<T> for Stack<T> {
    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn add(&mut self, item: T) {
        self.items.push(item);
    }

    fn get(&mut self) -> Option<T> {
        self.items.pop()
    }
}

/// FIFO buffer (breadth-first order).
#[derive(Debug, Clone)]
pub struct Queue<T> {
    items: VecDeque<T>,
}

impl<T> Queue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Buffer<T> for Queue<T> {
    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn add(&mut self, item: T) {
        self.items.push_back(item);
    }

    fn get(&mut self) -> Option<T> {
        self.items.pop_front()
    }
}

/// Which buffer discipline a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferKind {
    /// FIFO, breadth-first.
    Queue,
    /// LIFO, depth-first.
    Stack,
}

impl BufferKind {
    /// Parse buffer kind from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "queue" | "bfs" => Some(Self::Queue),
            "stack" | "dfs" => Some(Self::Stack),
            _ => None,
        }
    }
}

impl Default for BufferKind {
    fn default() -> Self {
        Self::Queue
    }
}

impl std::fmt::Display for BufferKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queue => write!(f, "queue"),
            Self::Stack => write!(f, "stack"),
        }
    }
}

/// A buffer whose discipline is chosen at run time.
#[derive(Debug, Clone)]
pub enum WorkBuffer<T> {
    /// Breadth-first.
    Queue(Queue<T>),
    /// Depth-first.
    Stack(Stack<T>),
}

impl<T> WorkBuffer<T> {
    /// Create an empty buffer of the given kind.
    pub fn new(kind: BufferKind) -> Self {
        match kind {
            BufferKind::Queue => Self::Queue(Queue::new()),
            BufferKind::Stack => Self::Stack(Stack::new()),
        }
    }

    /// Discipline of this buffer.
    pub fn kind(&self) -> BufferKind {
        match self {
            Self::Queue(_) => BufferKind::Queue,
            Self::Stack(_) => BufferKind::Stack,
        }
    }
}

impl<T> Buffer<T> for WorkBuffer<T> {
    fn is_empty(&self) -> bool {
        match self {
            Self::Queue(q) => q.is_empty(),
            Self::Stack(s) => s.is_empty(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Queue(q) => q.len(),
            Self::Stack(s) => s.len(),
        }
    }

    fn add(&mut self, item: T) {
        match self {
            Self::Queue(q) => q.add(item),
            Self::Stack(s) => s.add(item),
        }
    }

    fn get(&mut self) -> Option<T> {
        match self {
            Self::Queue(q) => q.get(),
            Self::Stack(s) => s.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_buffers_yield_none() {
        let mut q: WorkBuffer<u32> = WorkBuffer::new(BufferKind::Queue);
        let mut s: WorkBuffer<u32> = WorkBuffer::new(BufferKind::Stack);
        assert!(q.is_empty() && s.is_empty());
        assert_eq!(q.get(), None);
        assert_eq!(s.get(), None);
    }

    #[test]
    fn test_interleaved_stack_returns_most_recent() {
        let mut s = Stack::new();
        s.add(1);
        s.add(2);
        assert_eq!(s.get(), Some(2));
        s.add(3);
        assert_eq!(s.get(), Some(3));
        assert_eq!(s.get(), Some(1));
        assert!(s.is_empty());
    }

    #[test]
    fn test_buffer_kind_parsing() {
        assert_eq!(BufferKind::from_str("BFS"), Some(BufferKind::Queue));
        assert_eq!(BufferKind::from_str("stack"), Some(BufferKind::Stack));
        assert_eq!(BufferKind::from_str("heap"), None);
        assert_eq!(WorkBuffer::<u8>::new(BufferKind::Stack).kind(), BufferKind::Stack);
    }

    proptest! {
        #[test]
        fn prop_queue_preserves_insertion_order(items in proptest::collection::vec(any::<u32>(), 0..64)) {
            let mut q = WorkBuffer::new(BufferKind::Queue);
            for item in &items {
                q.add(*item);
            }
            prop_assert_eq!(q.len(), items.len());
            let drained: Vec<_> = std::iter::from_fn(|| q.get()).collect();
            prop_assert_eq!(drained, items);
        }

        #[test]
        fn prop_stack_reverses_insertion_order(items in proptest::collection::vec(any::<u32>(), 0..64)) {
            let mut s = WorkBuffer::new(BufferKind::Stack);
            for item in &items {
                s.add(*item);
            }
            let drained: Vec<_> = std::iter::from_fn(|| s.get()).collect();
            let mut expected = items.clone();
            expected.reverse();
            prop_assert_eq!(drained, expected);
        }
    }
}
