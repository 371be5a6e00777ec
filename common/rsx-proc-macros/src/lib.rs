mod enums;

use proc_macro::TokenStream;

/// Implement `Display` and a `to_str()` method that return the variant name.
///
/// Only fieldless enums are supported.
#[proc_macro_derive(EnumDisplay)]
pub fn enum_display(input: TokenStream) -> TokenStream {
    enums::enum_display(input)
}

/// Implement `FromStr`, parsing variant names case-insensitively.
///
/// Only fieldless enums are supported.
#[proc_macro_derive(EnumFromStr)]
pub fn enum_from_str(input: TokenStream) -> TokenStream {
    enums::enum_from_str(input)
}

/// Add an `ALL` constant listing every variant in declaration order.
///
/// Only fieldless enums are supported.
#[proc_macro_derive(EnumAll)]
pub fn enum_all(input: TokenStream) -> TokenStream {
    enums::enum_all(input)
}
