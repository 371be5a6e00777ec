use crate::config::ContextConfig;
use crate::depth::DepthConverter;
use crate::memory::{AddressRange, MemoryBlockProvider, ResolveError, SuperPointerResolver, View};

/// Per-renderer RSX state: the memory provider, resolver caches, and the bound depth converter.
///
/// Operations take `&mut self`; several contexts may share one provider (e.g. through an `Arc`)
/// and read the same backing blocks concurrently.
#[derive(Debug)]
pub struct RenderContext<P> {
    provider: P,
    resolver: SuperPointerResolver,
    depth_converter: DepthConverter,
    config: ContextConfig,
}

impl<P: MemoryBlockProvider> RenderContext<P> {
    #[must_use]
    pub fn new(provider: P, config: ContextConfig) -> Self {
        log::debug!("Creating RSX render context with config:{config}");

        Self {
            provider,
            resolver: SuperPointerResolver::new(config.resolver),
            depth_converter: DepthConverter::new(config.converter_backend),
            config,
        }
    }

    /// Resolve an RSX address range to a view of its backing memory.
    ///
    /// # Errors
    ///
    /// See [`SuperPointerResolver::resolve`].
    pub fn resolve(&mut self, address: u32, length: u32) -> Result<View, ResolveError> {
        self.resolver.resolve(&self.provider, AddressRange::new(address, length))
    }

    pub fn reload_config(&mut self, config: ContextConfig) {
        if config.resolver != self.config.resolver {
            log::debug!("Resolver config changed; dropping local memory window and cached views");
            self.resolver = SuperPointerResolver::new(config.resolver);
        }

        if config.converter_backend != self.config.converter_backend {
            self.depth_converter = DepthConverter::new(config.converter_backend);
        }

        self.config = config;
    }

    #[must_use]
    pub fn depth_converter(&self) -> &DepthConverter {
        &self.depth_converter
    }

    #[must_use]
    pub fn resolver(&self) -> &SuperPointerResolver {
        &self.resolver
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Mutable access to the provider, e.g. to map or unmap blocks. Providers report such changes
    /// through [`MemoryBlockProvider::generation`], which invalidates previously resolved views.
    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    #[must_use]
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    #[must_use]
    pub fn into_provider(self) -> P {
        self.provider
    }
}
