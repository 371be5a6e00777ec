use rsx_proc_macros::{EnumAll, EnumDisplay, EnumFromStr};
use std::fmt::{Display, Formatter};

/// Base address of RSX local memory
pub const RSX_LOCAL_MEMORY_BASE: u32 = 0xC000_0000;

/// Which implementation the depth transcoders use.
///
/// `Auto` picks the fastest implementation the host CPU supports. Requesting an instruction
/// set the CPU lacks falls back to the `Auto` choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumDisplay, EnumFromStr, EnumAll)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConverterBackend {
    #[default]
    Auto,
    Ssse3,
    Sse2,
    Scalar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocalMemoryConfig {
    pub base: u32,
    /// Size of the local memory window. If not set, the window extends to the end of the block
    /// containing `base`.
    pub size: Option<u32>,
}

impl Default for LocalMemoryConfig {
    fn default() -> Self {
        Self { base: RSX_LOCAL_MEMORY_BASE, size: None }
    }
}

impl Display for LocalMemoryConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.size {
            Some(size) => write!(f, "{:#010X}+{size:#X}", self.base),
            None => write!(f, "{:#010X}+<block>", self.base),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResolverConfig {
    /// Local memory window used for the resolver's fast path; `None` disables the fast path
    pub local_memory: Option<LocalMemoryConfig>,
}

impl ResolverConfig {
    #[must_use]
    pub fn without_local_memory() -> Self {
        Self { local_memory: None }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { local_memory: Some(LocalMemoryConfig::default()) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContextConfig {
    pub resolver: ResolverConfig,
    pub converter_backend: ConverterBackend,
}

impl Display for ContextConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        match self.resolver.local_memory {
            Some(local_memory) => writeln!(f, "  local_memory: {local_memory}")?,
            None => writeln!(f, "  local_memory: <None>")?,
        }
        write!(f, "  converter_backend: {}", self.converter_backend)
    }
}
