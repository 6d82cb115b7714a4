//! Augment the development of backpatch crates with procedural macros.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, AttributeArgs, ItemFn, Lit, Meta, NestedMeta};

/// Levels accepted by the `level` argument of [macro@test_traced].
const LEVELS: [&str; 5] = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];

/// Run a test function with a `tracing` subscriber that writes to the test output.
///
/// The subscriber is installed only for the duration of the test (it is not global), so tests
/// running in parallel do not interfere with one another. The crate using this attribute must
/// depend on `tracing` and `tracing-subscriber`.
///
/// The log level defaults to `DEBUG` and can be overridden with `level`.
///
/// # Example
///
/// ```rust,ignore
/// use backpatch_macros::test_traced;
/// use tracing::{debug, info};
///
/// #[test_traced(level = "INFO")]
/// fn test_info_level() {
///     info!("shown");
///     debug!("hidden");
/// }
/// ```
#[proc_macro_attribute]
pub fn test_traced(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as AttributeArgs);
    let input = parse_macro_input!(item as ItemFn);

    // Parse arguments
    let mut level = String::from("DEBUG");
    for arg in args {
        match arg {
            NestedMeta::Meta(Meta::NameValue(nv)) if nv.path.is_ident("level") => match nv.lit {
                Lit::Str(lit) => {
                    let value = lit.value().to_uppercase();
                    if !LEVELS.contains(&value.as_str()) {
                        return syn::Error::new_spanned(
                            lit,
                            format!("level must be one of {}", LEVELS.join(", ")),
                        )
                        .to_compile_error()
                        .into();
                    }
                    level = value;
                }
                other => {
                    return syn::Error::new_spanned(other, "level must be a string literal")
                        .to_compile_error()
                        .into();
                }
            },
            other => {
                return syn::Error::new_spanned(other, "unsupported argument")
                    .to_compile_error()
                    .into();
            }
        }
    }
    let level = syn::Ident::new(&level, proc_macro2::Span::call_site());

    // Wrap the test body
    let name = &input.sig.ident;
    let attrs = &input.attrs;
    let vis = &input.vis;
    let block = &input.block;
    let expanded = quote! {
        #[test]
        #(#attrs)*
        #vis fn #name() {
            let subscriber = ::tracing_subscriber::fmt()
                .with_test_writer()
                .with_max_level(::tracing::Level::#level)
                .with_line_number(true)
                .finish();
            let dispatcher = ::tracing::Dispatch::new(subscriber);
            ::tracing::dispatcher::with_default(&dispatcher, || #block);
        }
    };
    TokenStream::from(expanded)
}
