//! Constant blend color decoding

/// Render target color formats, numbered as in the RSX surface format register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SurfaceColorFormat {
    X1R5G5B5Z1R5G5B5,
    X1R5G5B5O1R5G5B5,
    R5G6B5,
    X8R8G8B8Z8R8G8B8,
    X8R8G8B8O8R8G8B8,
    A8R8G8B8,
    B8,
    G8B8,
    W16Z16Y16X16,
    W32Z32Y32X32,
    X32,
    X8B8G8R8Z8B8G8R8,
    X8B8G8R8O8B8G8R8,
    A8B8G8R8,
}

impl SurfaceColorFormat {
    #[must_use]
    pub fn from_register(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::X1R5G5B5Z1R5G5B5),
            2 => Some(Self::X1R5G5B5O1R5G5B5),
            3 => Some(Self::R5G6B5),
            4 => Some(Self::X8R8G8B8Z8R8G8B8),
            5 => Some(Self::X8R8G8B8O8R8G8B8),
            8 => Some(Self::A8R8G8B8),
            9 => Some(Self::B8),
            10 => Some(Self::G8B8),
            11 => Some(Self::W16Z16Y16X16),
            12 => Some(Self::W32Z32Y32X32),
            13 => Some(Self::X32),
            14 => Some(Self::X8B8G8R8Z8B8G8R8),
            15 => Some(Self::X8B8G8R8O8B8G8R8),
            16 => Some(Self::A8B8G8R8),
            _ => None,
        }
    }

    fn has_16_bit_channels(self) -> bool {
        self == Self::W16Z16Y16X16
    }
}

/// Constant blend color as latched from the blend color registers. Channels are in RGBA order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlendColor {
    pub color_8b: [u8; 4],
    pub color_16b: [u16; 4],
}

impl BlendColor {
    /// Decode the two blend color registers. The first holds RGBA8, or R16 and G16 for 16-bit
    /// surfaces; the second holds B16 and A16.
    #[must_use]
    pub fn from_registers(blend_color: u32, blend_color2: u32) -> Self {
        Self {
            color_8b: blend_color.to_le_bytes(),
            color_16b: [
                blend_color as u16,
                (blend_color >> 16) as u16,
                blend_color2 as u16,
                (blend_color2 >> 16) as u16,
            ],
        }
    }
}

/// Normalize the constant blend color to `[0, 1]` for the given render target format.
#[must_use]
pub fn constant_blend_colors(format: SurfaceColorFormat, color: &BlendColor) -> [f32; 4] {
    if format.has_16_bit_channels() {
        color.color_16b.map(|channel| f32::from(channel) / 65535.0)
    } else {
        color.color_8b.map(|channel| f32::from(channel) / 255.0)
    }
}
