//! Definition of the fixed-size block pool that backs segment areas.

use memmap2::{MmapMut, MmapOptions};
use std::alloc::{self, Layout};
use std::collections::TryReserveError;
use std::ptr::{self, NonNull};
use thiserror::Error;

/// Errors raised when backing memory for the container cannot be acquired.
///
/// All failures are recoverable: the operation that hit the failure unwinds
/// its partial work before surfacing the error, leaving the container as it
/// was before the call.
#[derive(Debug, Error)]
pub enum AllocError {
    #[error("Cannot allocate a pool chunk of {0} bytes")]
    Chunk(usize),

    #[error("Cannot reserve backing memory: {0}")]
    Reserve(#[from] TryReserveError),
}

/// Memory source used for pool chunks.
///
/// Mirrors the two ways large buffers are usually carved out: the global
/// allocator for ordinary workloads, anonymous memory maps for containers
/// large enough that page-level control pays off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(test, derive(bolero::TypeGenerator))]
pub enum PoolBacking {
    /// Chunks come from the registered global allocator.
    Heap,

    /// Chunks come from anonymous, eagerly populated memory maps.
    Mmap,
}

impl Default for PoolBacking {
    fn default() -> Self {
        PoolBacking::Heap
    }
}

/// One contiguous slab of blocks.
#[derive(Debug)]
enum Chunk {
    Heap { ptr: NonNull<u8>, layout: Layout },
    Mmap(MmapMut),
}

impl Chunk {
    fn base(&mut self) -> *mut u8 {
        match self {
            Chunk::Heap { ptr, .. } => ptr.as_ptr(),
            Chunk::Mmap(map) => map.as_mut_ptr(),
        }
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        if let Chunk::Heap { ptr, layout } = self {
            // Safety: Allocated with this exact layout in `BlockPool::add_chunk`.
            unsafe { alloc::dealloc(ptr.as_ptr(), *layout) };
        }
    }
}

// Aim for slabs of at least this many blocks before page rounding.
const MIN_CHUNK_BLOCKS: usize = 16;

/// Fixed-size block allocator backed by page-sized chunks.
///
/// Every block has the same size and alignment, fixed at construction, so a
/// freed block can be handed out again verbatim. The free list is threaded
/// through the blocks themselves: the first pointer-sized bytes of a free
/// block hold the address of the next free block.
///
/// # Invariants
///
/// * `block_size` is a multiple of the block alignment.
/// * Every pointer on the free list points into one of `chunks`.
#[derive(Debug)]
pub(crate) struct BlockPool {
    block_size: usize,
    blocks_per_chunk: usize,
    chunk_bytes: usize,
    block_align: usize,
    backing: PoolBacking,
    chunks: Vec<Chunk>,
    free: *mut u8,
}

impl BlockPool {
    /// Create a pool handing out blocks of (at least) the given size and alignment.
    ///
    /// Chunk sizes are rounded up to the OS page size so the heap and mmap
    /// backings carve identical block counts.
    ///
    /// # Arguments
    ///
    /// * `size` - Number of bytes in one block.
    /// * `align` - Required alignment of every block.
    /// * `backing` - Where chunk memory comes from.
    pub(crate) fn new(size: usize, align: usize, backing: PoolBacking) -> Self {
        // A free block stores the next-free pointer in its first bytes.
        let align = align.max(align_of::<*mut u8>());
        let size = size.max(size_of::<*mut u8>()).next_multiple_of(align);

        let page = page_size::get();
        let chunk_bytes = (size * MIN_CHUNK_BLOCKS).next_multiple_of(page);

        Self {
            block_size: size,
            blocks_per_chunk: chunk_bytes / size,
            chunk_bytes,
            block_align: align,
            backing,
            chunks: Vec::new(),
            free: ptr::null_mut(),
        }
    }

    pub(crate) fn backing(&self) -> PoolBacking {
        self.backing
    }

    /// Pop a block off the free list, growing by one chunk when empty.
    pub(crate) fn allocate(&mut self) -> Result<NonNull<u8>, AllocError> {
        if self.free.is_null() {
            self.add_chunk()?;
        }

        // Safety: Non-null free-list entries always point at a free block,
        // whose first bytes hold the next entry.
        let block = self.free;
        self.free = unsafe { *(block as *mut *mut u8) };
        Ok(unsafe { NonNull::new_unchecked(block) })
    }

    /// Push a block back onto the free list.
    ///
    /// # Safety
    ///
    /// `block` must have been returned by `allocate` on this pool and must
    /// not be used again until re-acquired.
    pub(crate) unsafe fn deallocate(&mut self, block: NonNull<u8>) {
        let block = block.as_ptr();
        // Safety: The block is dead storage of at least pointer size and
        // pointer alignment; we may reuse its prefix as the list link.
        unsafe { *(block as *mut *mut u8) = self.free };
        self.free = block;
    }

    fn add_chunk(&mut self) -> Result<(), AllocError> {
        self.chunks.try_reserve(1)?;

        let chunk = match self.backing {
            PoolBacking::Heap => {
                let layout = Layout::from_size_align(self.chunk_bytes, self.block_align)
                    .expect("chunk layout must be valid");
                // Safety: Layout has non-zero size.
                let ptr = NonNull::new(unsafe { alloc::alloc(layout) })
                    .ok_or(AllocError::Chunk(self.chunk_bytes))?;
                Chunk::Heap { ptr, layout }
            }
            PoolBacking::Mmap => {
                debug_assert!(self.block_align <= page_size::get());
                let map = MmapOptions::new()
                    .len(self.chunk_bytes)
                    // Fault all pages so that they are eagerly initialized.
                    .populate()
                    .map_anon()
                    .map_err(|_| AllocError::Chunk(self.chunk_bytes))?;
                Chunk::Mmap(map)
            }
        };
        self.chunks.push(chunk);

        // Thread the free list through the new chunk's blocks.
        let chunk = self.chunks.last_mut().expect("chunk was just pushed");
        let base = chunk.base();
        for i in 0..self.blocks_per_chunk {
            // Safety: Every block lies inside the chunk and is at least
            // pointer sized and pointer aligned.
            unsafe {
                let block = base.add(i * self.block_size);
                let next = if i + 1 < self.blocks_per_chunk {
                    block.add(self.block_size)
                } else {
                    self.free
                };
                *(block as *mut *mut u8) = next;
            }
        }
        self.free = base;
        Ok(())
    }
}
