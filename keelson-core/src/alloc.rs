//! Allocation strategies for message bodies.
//!
//! Decoders never allocate body storage themselves: they ask a
//! [`MsgAllocator`] for a zero-filled `BytesMut` of the exact body size,
//! fill it from the wire and freeze it into the final `Msg`.
//!
//! Two strategies ship here:
//! - [`HeapAllocator`]: one heap allocation per message.
//! - [`ArenaAllocator`]: small bodies are carved out of a shared page.
//!   The page stays alive as long as any message sliced from it does.

use bytes::BytesMut;

/// Size of one arena page.
/// Tuned for cache locality and amortized allocation cost.
pub const PAGE_SIZE: usize = 64 * 1024;

/// Source of backing storage for decoded message bodies.
pub trait MsgAllocator: Send {
    /// Returns a zero-filled buffer whose `len()` is exactly `size`.
    fn allocate(&mut self, size: usize) -> BytesMut;
}

/// One heap allocation per message.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapAllocator;

impl MsgAllocator for HeapAllocator {
    #[inline]
    fn allocate(&mut self, size: usize) -> BytesMut {
        BytesMut::zeroed(size)
    }
}

/// Page-carving allocator used by one decoder.
///
/// Not shared between decoders. Small bodies are split off the front of
/// the current page; the refcount inside `Bytes` keeps the page alive
/// after the message is frozen.
#[derive(Debug)]
pub struct ArenaAllocator {
    page: BytesMut,
    page_size: usize,
    max_chunk: usize,
}

impl Default for ArenaAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl ArenaAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::with_page_size(PAGE_SIZE)
    }

    #[must_use]
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page: BytesMut::new(), // force alloc on first use
            page_size,
            // bodies above a quarter page go straight to the heap
            max_chunk: page_size / 4,
        }
    }

    /// Bytes left in the current page.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.page.len()
    }

    #[inline(never)]
    fn alloc_page(&mut self) {
        self.page = BytesMut::zeroed(self.page_size);
    }
}

impl MsgAllocator for ArenaAllocator {
    fn allocate(&mut self, size: usize) -> BytesMut {
        if size == 0 {
            return BytesMut::new();
        }
        if size > self.max_chunk {
            return BytesMut::zeroed(size);
        }
        if self.page.len() < size {
            self.alloc_page();
        }
        self.page.split_to(size)
    }
}

/// Allocation strategy selected through socket options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocStrategy {
    #[default]
    Heap,
    Arena {
        page_size: usize,
    },
}

impl AllocStrategy {
    /// Build a fresh allocator instance for one decoder.
    #[must_use]
    pub fn build(self) -> Box<dyn MsgAllocator> {
        match self {
            Self::Heap => Box::new(HeapAllocator),
            Self::Arena { page_size } => Box::new(ArenaAllocator::with_page_size(page_size)),
        }
    }
}
