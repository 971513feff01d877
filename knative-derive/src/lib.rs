//! Derive [`ConditionType`] on your own enums to adhere to the Knative Source schema and condition
//! management.
//!
//! The enum must contain exactly one of the `Ready` or `Succeeded` variants, which becomes the
//! happy condition. Variants marked `#[dependent]` must all be true for the happy condition to be
//! true; any other variant is informational.
//!
//! [`ConditionType`]: ../knative_conditions/trait.ConditionType.html
use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod error;
mod inner;

pub(crate) const REQUIRED_VARIANTS: [&str; 2] = ["Ready", "Succeeded"];

#[proc_macro_derive(ConditionType, attributes(dependent))]
pub fn derive_condition_type(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    inner::inner_derive(ast).unwrap_or_else(|e| e.to_compile_error().into())
}
