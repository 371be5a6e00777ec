use crate::config::{LocalMemoryConfig, ResolverConfig};
use crate::memory::{
    ADDRESS_SPACE_LEN, AddressRange, BlockHandle, MemoryBlockProvider, Segment, View, ViewCache,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("cannot resolve an empty range at {address:#010X}")]
    EmptyRange { address: u32 },
    #[error("range {range} extends past the end of the 32-bit address space")]
    AddressOverflow { range: AddressRange },
    #[error("RSX local memory is not mapped at {base:#010X}")]
    LocalMemoryUnmapped { base: u32 },
    #[error("no backing memory for {range}; first unmapped address is {unmapped_address:#010X}")]
    Unmapped { range: AddressRange, unmapped_address: u32 },
}

/// The RSX local memory region, resolved once per context.
#[derive(Debug, Clone)]
pub struct LocalMemoryWindow {
    segment: Segment,
}

impl LocalMemoryWindow {
    #[inline]
    #[must_use]
    pub fn range(&self) -> AddressRange {
        AddressRange::new(self.segment.address(), self.segment.len())
    }

    #[inline]
    #[must_use]
    pub fn block(&self) -> &BlockHandle {
        self.segment.block()
    }

    fn view(&self, range: AddressRange) -> Option<View> {
        let window = self.range();
        if !window.contains_range(range) {
            return None;
        }

        self.segment.slice(range.start - window.start, range.length).map(View::simple)
    }
}

#[derive(Debug, Clone, Default)]
enum LocalWindowState {
    #[default]
    Uninitialized,
    Disabled,
    Resolved(LocalMemoryWindow),
}

/// Resolves RSX address ranges into [`View`]s.
///
/// Lookups are checked in order: the local memory window, the view cache, a single backing
/// block, and finally a walk that stitches together every block the range touches.
#[derive(Debug, Clone)]
pub struct SuperPointerResolver {
    config: ResolverConfig,
    local_window: LocalWindowState,
    cache: ViewCache,
}

impl SuperPointerResolver {
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self { config, local_window: LocalWindowState::default(), cache: ViewCache::new() }
    }

    /// Resolve `range` into a view of exactly `range.length` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is empty or overflows the address space, if local memory is
    /// not mapped at all, or if any part of the range has no backing block. The last two indicate
    /// that the emulated RSX accessed unmapped memory and emulation cannot meaningfully continue.
    pub fn resolve<P: MemoryBlockProvider + ?Sized>(
        &mut self,
        provider: &P,
        range: AddressRange,
    ) -> Result<View, ResolveError> {
        if range.is_empty() {
            return Err(ResolveError::EmptyRange { address: range.start });
        }

        if range.end() > ADDRESS_SPACE_LEN {
            return Err(ResolveError::AddressOverflow { range });
        }

        if self.cache.sync_generation(provider.generation()) {
            // The local memory block may have been remapped too
            self.local_window = LocalWindowState::Uninitialized;
        }

        self.ensure_local_window(provider)?;

        if let LocalWindowState::Resolved(window) = &self.local_window {
            if let Some(view) = window.view(range) {
                log::trace!("Resolved {range} through local memory window");
                return Ok(view);
            }
        }

        if let Some(view) = self.cache.get(range.start, range.length) {
            log::trace!("View cache hit for {range}");
            return Ok(view);
        }

        log::trace!("View cache miss for {range}");

        if let Some(segment) = provider.find_contiguous(range).and_then(|block| {
            block.sub_reference(range.start - block.base_address(), range.length)
        }) {
            let view = View::simple(segment);
            self.cache.insert(range.start, view.clone());
            return Ok(view);
        }

        // Probably allocated as split blocks; grab each piece separately
        let view = resolve_fragmented(provider, range)?;
        self.cache.insert(range.start, view.clone());

        Ok(view)
    }

    /// The local memory window, if it has been resolved.
    #[must_use]
    pub fn local_window(&self) -> Option<&LocalMemoryWindow> {
        match &self.local_window {
            LocalWindowState::Resolved(window) => Some(window),
            LocalWindowState::Uninitialized | LocalWindowState::Disabled => None,
        }
    }

    #[must_use]
    pub fn cache(&self) -> &ViewCache {
        &self.cache
    }

    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    fn ensure_local_window<P: MemoryBlockProvider + ?Sized>(
        &mut self,
        provider: &P,
    ) -> Result<(), ResolveError> {
        if !matches!(self.local_window, LocalWindowState::Uninitialized) {
            return Ok(());
        }

        let Some(local_memory) = self.config.local_memory else {
            self.local_window = LocalWindowState::Disabled;
            return Ok(());
        };

        self.local_window = match resolve_local_window(provider, local_memory)? {
            Some(window) => {
                log::debug!("Initialized RSX local memory window at {}", window.range());
                LocalWindowState::Resolved(window)
            }
            None => {
                // Disjoint allocation?
                log::error!(
                    "Could not initialize contiguous RSX local memory at {local_memory}; local memory accesses will take the slow path"
                );
                LocalWindowState::Disabled
            }
        };

        Ok(())
    }
}

fn resolve_local_window<P: MemoryBlockProvider + ?Sized>(
    provider: &P,
    local_memory: LocalMemoryConfig,
) -> Result<Option<LocalMemoryWindow>, ResolveError> {
    let base = local_memory.base;
    let Some(first_block) = provider.find_block(base) else {
        log::error!("RSX local memory is not mapped at {base:#010X}");
        return Err(ResolveError::LocalMemoryUnmapped { base });
    };

    let size = local_memory.size.unwrap_or_else(|| {
        (u64::from(first_block.base_address()) + u64::from(first_block.size()) - u64::from(base))
            as u32
    });
    let range = AddressRange::new(base, size);
    if range.is_empty() || range.end() > ADDRESS_SPACE_LEN {
        return Ok(None);
    }

    Ok(provider
        .find_contiguous(range)
        .and_then(|block| block.sub_reference(base - block.base_address(), size))
        .map(|segment| LocalMemoryWindow { segment }))
}

fn resolve_fragmented<P: MemoryBlockProvider + ?Sized>(
    provider: &P,
    range: AddressRange,
) -> Result<View, ResolveError> {
    let mut segments = Vec::new();
    let mut next = range.start;
    let mut remaining = range.length;

    while remaining != 0 {
        let Some(segment) = provider.find_block(next).and_then(|block| {
            let block_offset = next.checked_sub(block.base_address())?;
            let block_length = remaining.min(block.size().checked_sub(block_offset)?);
            block.sub_reference(block_offset, block_length)
        }) else {
            log::error!("Could not get super pointer for memory block {range}; {next:#010X} is unmapped");
            return Err(ResolveError::Unmapped { range, unmapped_address: next });
        };

        remaining -= segment.len();
        next = next.wrapping_add(segment.len());
        segments.push(segment);
    }

    log::debug!("Stitched {} backing blocks together to resolve {range}", segments.len());

    Ok(View::composite(segments))
}
