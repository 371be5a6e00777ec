use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Ident};

// Variant identifiers of a fieldless enum, or a compile error spanning the offending item
fn unit_variants<'a>(ast: &'a DeriveInput, derive_name: &str) -> syn::Result<Vec<&'a Ident>> {
    let name = &ast.ident;

    let Data::Enum(data) = &ast.data else {
        return Err(syn::Error::new_spanned(
            name,
            format!("{derive_name} can only be derived for enums; {name} is not an enum"),
        ));
    };

    data.variants
        .iter()
        .map(|variant| {
            let variant_name = &variant.ident;
            if !matches!(variant.fields, Fields::Unit) {
                return Err(syn::Error::new_spanned(
                    variant,
                    format!(
                        "{derive_name} only supports fieldless variants; {name}::{variant_name} has fields"
                    ),
                ));
            }

            Ok(variant_name)
        })
        .collect()
}

fn expand(
    input: TokenStream,
    derive_name: &str,
    f: impl FnOnce(&Ident, &[&Ident]) -> proc_macro2::TokenStream,
) -> TokenStream {
    let ast: DeriveInput = match syn::parse(input) {
        Ok(ast) => ast,
        Err(err) => return err.to_compile_error().into(),
    };

    match unit_variants(&ast, derive_name) {
        Ok(variants) => f(&ast.ident, &variants).into(),
        Err(err) => err.to_compile_error().into(),
    }
}

pub fn enum_display(input: TokenStream) -> TokenStream {
    expand(input, "EnumDisplay", |name, variants| {
        let variant_strs = variants.iter().map(|variant| variant.to_string());

        quote! {
            impl #name {
                #[must_use]
                pub fn to_str(&self) -> &'static str {
                    match self {
                        #(Self::#variants => #variant_strs,)*
                    }
                }
            }

            impl ::std::fmt::Display for #name {
                fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                    f.pad(self.to_str())
                }
            }
        }
    })
}

pub fn enum_from_str(input: TokenStream) -> TokenStream {
    expand(input, "EnumFromStr", |name, variants| {
        let lowercase_strs =
            variants.iter().map(|variant| variant.to_string().to_ascii_lowercase());
        let err_fmt_string = format!("invalid {name} string: '{{}}'");

        quote! {
            impl ::std::str::FromStr for #name {
                type Err = ::std::string::String;

                fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                    match s.to_ascii_lowercase().as_str() {
                        #(#lowercase_strs => ::std::result::Result::Ok(Self::#variants),)*
                        _ => ::std::result::Result::Err(::std::format!(#err_fmt_string, s)),
                    }
                }
            }
        }
    })
}

pub fn enum_all(input: TokenStream) -> TokenStream {
    expand(input, "EnumAll", |name, variants| {
        let num_variants = variants.len();

        quote! {
            impl #name {
                pub const ALL: [Self; #num_variants] = [#(Self::#variants,)*];
            }
        }
    })
}
