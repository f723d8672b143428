//! Cache line aligned growable buffers
//!
//! Hot buffers of the rasterizer (edge store, crossings, coverage line) are
//! backed by vectors of 64-byte blocks, so they are always aligned to a cache
//! line, and viewed as typed slices with `bytemuck`. Buffers are referenced by
//! index only, so growth never invalidates anything. Blocks replaced on growth
//! are kept in a size-bucketed [`BlockCache`] owned by the same renderer context.
use bytemuck::{Pod, Zeroable};
use std::{fmt, marker::PhantomData, mem};

/// Size of the cache line in bytes
pub const CACHE_LINE: usize = 64;

/// Smallest allocation handed out by the cache in bytes
pub const BUCKET_BASE_BYTES: usize = 4096;

/// Buffers below this size grow by a factor of four, above it they double
pub const GROW_THRESHOLD: usize = 1 << 20;

/// Maximum number of free blocks kept per bucket
const MAX_FREE_PER_BUCKET: usize = 4;

/// Number of buckets (sizes `BUCKET_BASE_BYTES * 4^i` up to `GROW_THRESHOLD`)
const BUCKETS: usize = 5;

#[derive(Clone, Copy)]
#[repr(C, align(64))]
pub struct Block([u8; CACHE_LINE]);

// SAFETY: plain byte array without padding, any bit pattern is valid
unsafe impl Zeroable for Block {}
unsafe impl Pod for Block {}

/// Compute new buffer size in bytes that is at least `needed`
pub fn grow_size(current: usize, needed: usize) -> usize {
    let mut size = current.max(BUCKET_BASE_BYTES);
    while size < needed {
        size = if size < GROW_THRESHOLD {
            size * 4
        } else {
            size * 2
        };
    }
    size
}

fn bucket_index(bytes: usize) -> Option<usize> {
    let mut size = BUCKET_BASE_BYTES;
    for index in 0..BUCKETS {
        if size == bytes {
            return Some(index);
        }
        size *= 4;
    }
    None
}

/// Size-bucketed free list of zeroed block vectors
#[derive(Default)]
pub struct BlockCache {
    free: [Vec<Vec<Block>>; BUCKETS],
    hits: usize,
    misses: usize,
}

impl BlockCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get zeroed blocks that cover at least `bytes`
    pub fn take(&mut self, bytes: usize) -> Vec<Block> {
        let count = bytes.div_ceil(CACHE_LINE);
        if let Some(index) = bucket_index(count * CACHE_LINE) {
            if let Some(mut blocks) = self.free[index].pop() {
                self.hits += 1;
                blocks.fill(Block::zeroed());
                return blocks;
            }
        }
        self.misses += 1;
        vec![Block::zeroed(); count]
    }

    /// Return blocks to the cache, blocks of non-bucket sizes are released
    pub fn put(&mut self, blocks: Vec<Block>) {
        if let Some(index) = bucket_index(blocks.len() * CACHE_LINE) {
            let bucket = &mut self.free[index];
            if bucket.len() < MAX_FREE_PER_BUCKET {
                bucket.push(blocks);
            }
        }
    }

    /// Number of block vectors currently cached
    pub fn len(&self) -> usize {
        self.free.iter().map(|bucket| bucket.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of requests served from the cache
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Number of requests that required an allocation
    pub fn misses(&self) -> usize {
        self.misses
    }
}

impl fmt::Debug for BlockCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockCache")
            .field("cached", &self.len())
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .finish()
    }
}

/// Growable buffer of `Pod` values backed by cache line aligned blocks
pub struct AlignedBuf<T> {
    name: &'static str,
    blocks: Vec<Block>,
    _marker: PhantomData<T>,
}

impl<T: Pod> AlignedBuf<T> {
    const ITEM_SIZE: usize = {
        assert!(mem::size_of::<T>() > 0 && mem::align_of::<T>() <= CACHE_LINE);
        mem::size_of::<T>()
    };

    /// Create buffer with the initial capacity of `len` items
    pub fn new(name: &'static str, len: usize, cache: &mut BlockCache) -> Self {
        let bytes = grow_size(0, len * Self::ITEM_SIZE);
        Self {
            name,
            blocks: cache.take(bytes),
            _marker: PhantomData,
        }
    }

    /// Number of items this buffer can hold
    pub fn capacity(&self) -> usize {
        self.blocks.len() * CACHE_LINE / Self::ITEM_SIZE
    }

    /// Size of the buffer in bytes
    pub fn byte_size(&self) -> usize {
        self.blocks.len() * CACHE_LINE
    }

    pub fn as_slice(&self) -> &[T] {
        let bytes: &[u8] = bytemuck::cast_slice(self.blocks.as_slice());
        bytemuck::cast_slice(&bytes[..self.capacity() * Self::ITEM_SIZE])
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let len = self.capacity() * Self::ITEM_SIZE;
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(self.blocks.as_mut_slice());
        bytemuck::cast_slice_mut(&mut bytes[..len])
    }

    /// Make sure buffer can hold at least `len` items, preserving the content
    ///
    /// Newly added items are zeroed.
    pub fn ensure(&mut self, len: usize, cache: &mut BlockCache) {
        if len <= self.capacity() {
            return;
        }
        let bytes = grow_size(self.byte_size(), len * Self::ITEM_SIZE);
        let mut blocks = cache.take(bytes);
        blocks[..self.blocks.len()].copy_from_slice(&self.blocks);
        let old = mem::replace(&mut self.blocks, blocks);
        tracing::debug!(
            "[arena:{}] grow {} -> {} bytes",
            self.name,
            old.len() * CACHE_LINE,
            self.byte_size()
        );
        cache.put(old);
    }

    /// Zero all items
    pub fn clear(&mut self) {
        self.blocks.fill(Block::zeroed());
    }

    /// Shrink back to the initial size if the buffer has grown, contents are zeroed
    pub fn reset(&mut self, len: usize, cache: &mut BlockCache) {
        let bytes = grow_size(0, len * Self::ITEM_SIZE);
        if self.byte_size() > bytes {
            let old = mem::replace(&mut self.blocks, cache.take(bytes));
            cache.put(old);
        } else {
            self.clear();
        }
    }

    /// Return blocks to the cache
    pub fn release(self, cache: &mut BlockCache) {
        cache.put(self.blocks);
    }
}

impl<T> fmt::Debug for AlignedBuf<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignedBuf")
            .field("name", &self.name)
            .field("bytes", &(self.blocks.len() * CACHE_LINE))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grow_size() {
        assert_eq!(grow_size(0, 1), BUCKET_BASE_BYTES);
        assert_eq!(grow_size(4096, 4097), 16384);
        assert_eq!(grow_size(4096, 70000), 262144);
        // doubling above threshold
        assert_eq!(grow_size(GROW_THRESHOLD, GROW_THRESHOLD + 1), 2 * GROW_THRESHOLD);
        assert_eq!(
            grow_size(GROW_THRESHOLD, 3 * GROW_THRESHOLD),
            4 * GROW_THRESHOLD
        );
    }

    #[test]
    fn test_aligned_buf() {
        let mut cache = BlockCache::new();
        let mut buf: AlignedBuf<i32> = AlignedBuf::new("test", 10, &mut cache);
        assert_eq!(buf.capacity(), BUCKET_BASE_BYTES / 4);
        assert_eq!(buf.as_slice().as_ptr() as usize % CACHE_LINE, 0);
        assert!(buf.as_slice().iter().all(|v| *v == 0));

        buf.as_mut_slice()[7] = 42;
        buf.ensure(5000, &mut cache);
        assert!(buf.capacity() >= 5000);
        assert_eq!(buf.as_slice()[7], 42);
        assert_eq!(buf.as_slice()[4999], 0);
        assert_eq!(cache.len(), 1);

        // reuse of the cached block after reset
        buf.reset(10, &mut cache);
        assert_eq!(buf.capacity(), BUCKET_BASE_BYTES / 4);
        assert!(buf.as_slice().iter().all(|v| *v == 0));
        assert_eq!(cache.hits(), 1);

        // buffer that never grew is zeroed in place
        buf.as_mut_slice()[3] = 7;
        buf.reset(10, &mut cache);
        assert_eq!(buf.capacity(), BUCKET_BASE_BYTES / 4);
        assert!(buf.as_slice().iter().all(|v| *v == 0));
        assert_eq!(cache.hits(), 1);
        buf.release(&mut cache);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_aligned_buf_struct() {
        #[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
        #[repr(C)]
        struct Triple {
            a: u64,
            b: u64,
            c: u64,
        }
        let mut cache = BlockCache::new();
        let mut buf: AlignedBuf<Triple> = AlignedBuf::new("triple", 1, &mut cache);
        assert_eq!(buf.capacity(), BUCKET_BASE_BYTES / 24);
        let last = buf.capacity() - 1;
        buf.as_mut_slice()[last] = Triple { a: 1, b: 2, c: 3 };
        buf.ensure(last + 2, &mut cache);
        assert_eq!(buf.as_slice()[last], Triple { a: 1, b: 2, c: 3 });
    }

    #[test]
    fn test_cache_limits() {
        let mut cache = BlockCache::new();
        for _ in 0..10 {
            let blocks = cache.take(BUCKET_BASE_BYTES);
            cache.put(blocks.clone());
            cache.put(blocks);
        }
        assert!(cache.len() <= MAX_FREE_PER_BUCKET);
        // odd sized blocks are not cached
        cache.put(vec![Block::zeroed(); 3]);
        assert!(cache.len() <= MAX_FREE_PER_BUCKET);
    }
}
