/// Mask selecting the 24-bit depth value in a D24 or D24X8 word.
pub const D24_MASK: u32 = 0x00FF_FFFF;

pub trait SwapBytes: Copy {
    #[must_use]
    fn swap_bytes(self) -> Self;
}

macro_rules! impl_swap_bytes {
    ($t:ty) => {
        impl SwapBytes for $t {
            #[inline(always)]
            fn swap_bytes(self) -> Self {
                <$t>::swap_bytes(self)
            }
        }
    };
}

impl_swap_bytes!(u8);
impl_swap_bytes!(u16);
impl_swap_bytes!(u32);
impl_swap_bytes!(u64);

pub trait U24Ext {
    /// Reverse the order of the low three bytes, leaving the top byte untouched.
    #[must_use]
    fn reverse_low_bytes(self) -> Self;
}

impl U24Ext for u32 {
    #[inline(always)]
    fn reverse_low_bytes(self) -> Self {
        (self & 0xFF00FF00) | ((self << 16) & 0x00FF0000) | ((self >> 16) & 0x000000FF)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_low_bytes() {
        assert_eq!(0xAB123456_u32.reverse_low_bytes(), 0xAB563412);
        assert_eq!(0x00FFFFFF_u32.reverse_low_bytes(), 0x00FFFFFF);
        assert_eq!(0xFF000001_u32.reverse_low_bytes(), 0xFF010000);
        assert_eq!(0xAB123456_u32.reverse_low_bytes().reverse_low_bytes(), 0xAB123456);
    }

    #[test]
    fn swap_bytes() {
        assert_eq!(SwapBytes::swap_bytes(0x12_u8), 0x12);
        assert_eq!(SwapBytes::swap_bytes(0x1234_u16), 0x3412);
        assert_eq!(SwapBytes::swap_bytes(0x12345678_u32), 0x78563412);
        assert_eq!(SwapBytes::swap_bytes(0x0102030405060708_u64), 0x0807060504030201);
    }
}
