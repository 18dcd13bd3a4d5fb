//! Derive macro for `kan_hiarc::Hiarc`.
//!
//! Mirrors the teacher's `hiarc-macro` crate: `#[derive(Hiarc)]` asserts,
//! at compile time, that every non-skipped field of the annotated type
//! itself implements `Hiarc`, and emits `unsafe impl Hiarc for Type {}`.
//! Fields tagged `#[hiarc_skip_unsafe]` are excluded from the bound (used
//! for raw FFI handles such as `ash::vk::*` objects that are `Copy` plain
//! data and carry no hierarchy of their own).

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

fn has_skip_attr(attrs: &[syn::Attribute]) -> bool {
    attrs
        .iter()
        .any(|attr| attr.path().is_ident("hiarc_skip_unsafe") || attr.path().is_ident("hiarc_skip"))
}

#[proc_macro_derive(Hiarc, attributes(hiarc_skip_unsafe, hiarc_skip))]
pub fn derive_hiarc(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let field_types: Vec<syn::Type> = match input.data {
        Data::Struct(data) => match data.fields {
            Fields::Named(named) => named
                .named
                .into_iter()
                .filter(|f| !has_skip_attr(&f.attrs))
                .map(|f| f.ty)
                .collect(),
            Fields::Unnamed(unnamed) => unnamed
                .unnamed
                .into_iter()
                .filter(|f| !has_skip_attr(&f.attrs))
                .map(|f| f.ty)
                .collect(),
            Fields::Unit => Vec::new(),
        },
        Data::Enum(data) => data
            .variants
            .into_iter()
            .flat_map(|v| match v.fields {
                Fields::Named(named) => named
                    .named
                    .into_iter()
                    .filter(|f| !has_skip_attr(&f.attrs))
                    .map(|f| f.ty)
                    .collect::<Vec<_>>(),
                Fields::Unnamed(unnamed) => unnamed
                    .unnamed
                    .into_iter()
                    .filter(|f| !has_skip_attr(&f.attrs))
                    .map(|f| f.ty)
                    .collect::<Vec<_>>(),
                Fields::Unit => Vec::new(),
            })
            .collect(),
        Data::Union(_) => Vec::new(),
    };

    let assertions = field_types.iter().map(|ty| {
        quote! {
            const _: fn() = || {
                fn assert_field_is_hiarc<T: kan_hiarc::Hiarc + ?Sized>() {}
                assert_field_is_hiarc::<#ty>();
            };
        }
    });

    let expanded = quote! {
        #(#assertions)*

        impl #impl_generics kan_hiarc::Hiarc for #name #ty_generics #where_clause {}
    };

    TokenStream::from(expanded)
}
