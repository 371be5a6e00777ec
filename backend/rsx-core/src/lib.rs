pub mod blend;
pub mod config;
mod context;
pub mod depth;
pub mod image;
pub mod memory;
pub mod scale;

pub use config::{ContextConfig, ConverterBackend, LocalMemoryConfig, ResolverConfig};
pub use context::RenderContext;
pub use depth::{DepthBackend, DepthConvertError, DepthConverter};
pub use memory::{AddressRange, MemoryBlockProvider, ResolveError, View};
pub use scale::{ScaleDescriptor, ScaleError, scale_image_nearest};
