//! Derive macro for the serializable conversion interface.
//!
//! This crate provides `#[derive(Serializable)]`, which implements
//! `TypePath`, `Serializable`, `FromFields` and `FromValue` for a struct with
//! named fields, plus `From<T> for Value`.
//!
//! # Example
//!
//! ```ignore
//! use serializable::{Registry, Serializable, Value};
//!
//! #[derive(Debug, Clone, PartialEq, Serializable)]
//! #[serializable(module = "geometry")]
//! struct Point {
//!     x: i64,
//!     y: i64,
//! }
//!
//! let registry = Registry::with_builtins();
//! registry.register::<Point>().unwrap();
//! let value: Value = Point { x: 10, y: 20 }.into();
//! ```

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, LitStr};

/// Derive macro for types that round-trip through the serializable codec.
///
/// The type must also implement `Debug`, `Clone` and `PartialEq`, and every
/// field type must convert into `Value` and implement `FromValue`. Supported
/// field types are `bool`, `i8` through `i64`, `u8` through `u32`, `f32`,
/// `f64`, `char`, `String`, `Value`, `Dict`, other derived types, and `Vec`,
/// `Option`, `Box`, maps and tuples of those. `u64`, `usize` and `isize` do
/// not fit the `i64` integer model and are rejected at compile time.
///
/// # Container attributes
///
/// - `#[serializable(module = "a.b")]` - module written to `__class__`
///   (default: the Rust module path with `::` replaced by `.`)
/// - `#[serializable(name = "Outer.Inner")]` - qualified name (default: the
///   type's identifier)
/// - `#[serializable(record)]` - expose fields through `record_fields`
///   instead of `to_fields`
///
/// # Field attributes
///
/// - `#[serializable(rename = "name")]` - use a different field name
/// - `#[serializable(default)]` - use `Default::default()` when missing
#[proc_macro_derive(Serializable, attributes(serializable))]
pub fn derive_serializable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let expanded = match &input.data {
        Data::Struct(data) => derive_struct(&input, data),
        Data::Enum(_) | Data::Union(_) => Err(syn::Error::new_spanned(
            &input.ident,
            "Serializable can only be derived for structs",
        )),
    };

    expanded.unwrap_or_else(syn::Error::into_compile_error).into()
}

#[derive(Default)]
struct ContainerAttrs {
    module: Option<LitStr>,
    name: Option<LitStr>,
    record: bool,
}

#[derive(Default)]
struct FieldAttrs {
    rename: Option<LitStr>,
    default: bool,
}

fn container_attrs(attrs: &[Attribute]) -> syn::Result<ContainerAttrs> {
    let mut out = ContainerAttrs::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("serializable")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("module") {
                out.module = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("name") {
                out.name = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("record") {
                out.record = true;
            } else {
                return Err(meta.error("expected `module`, `name` or `record`"));
            }
            Ok(())
        })?;
    }
    Ok(out)
}

fn field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut out = FieldAttrs::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("serializable")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                out.rename = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("default") {
                out.default = true;
            } else {
                return Err(meta.error("expected `rename` or `default`"));
            }
            Ok(())
        })?;
    }
    Ok(out)
}

fn derive_struct(input: &DeriveInput, data: &syn::DataStruct) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let attrs = container_attrs(&input.attrs)?;

    let type_name = attrs
        .name
        .map(|lit| lit.value())
        .unwrap_or_else(|| name.to_string());
    let type_path = match &attrs.module {
        Some(module) => quote! {
            ::serializable::TypeReference::new(#module, #type_name)
        },
        None => quote! {
            ::serializable::TypeReference::from_rust_path(::core::module_path!(), #type_name)
        },
    };

    let named = match &data.fields {
        Fields::Named(fields) => fields.named.iter().collect::<Vec<_>>(),
        Fields::Unit => Vec::new(),
        Fields::Unnamed(fields) => {
            return Err(syn::Error::new_spanned(
                fields,
                "Serializable requires named fields; tuple structs have no field names",
            ))
        }
    };

    let mut to_fields = Vec::with_capacity(named.len());
    let mut from_fields = Vec::with_capacity(named.len());
    for field in &named {
        let field_name = field.ident.as_ref().expect("named field");
        let field_attrs = field_attrs(&field.attrs)?;
        let field_name_str = field_attrs
            .rename
            .map(|lit| lit.value())
            .unwrap_or_else(|| field_name.to_string());
        let field_type = &field.ty;

        to_fields.push(quote! {
            fields.insert(
                #field_name_str,
                ::serializable::Value::from(::core::clone::Clone::clone(&self.#field_name)),
            );
        });

        let missing = if field_attrs.default {
            quote! { ::core::default::Default::default() }
        } else {
            quote! {
                return ::core::result::Result::Err(
                    ::serializable::ConversionError::MissingField(
                        ::std::string::String::from(#field_name_str)
                    )
                )
            }
        };
        from_fields.push(quote! {
            #field_name: match fields.take(#field_name_str) {
                ::core::option::Option::Some(field_value) => {
                    <#field_type as ::serializable::FromValue>::from_value(field_value)
                        .map_err(|e| ::serializable::ConversionError::FieldError(
                            ::std::string::String::from(#field_name_str),
                            ::std::boxed::Box::new(e),
                        ))?
                }
                ::core::option::Option::None => { #missing }
            }
        });
    }

    let construct = match &data.fields {
        Fields::Unit => quote! { Self },
        _ => quote! { Self { #(#from_fields),* } },
    };

    let capability = if attrs.record {
        quote! { record_fields }
    } else {
        quote! { to_fields }
    };

    Ok(quote! {
        impl #impl_generics ::serializable::TypePath for #name #ty_generics #where_clause {
            fn type_path() -> ::serializable::TypeReference {
                #type_path
            }
        }

        impl #impl_generics ::serializable::Serializable for #name #ty_generics #where_clause {
            fn type_ref(&self) -> ::serializable::TypeReference {
                <Self as ::serializable::TypePath>::type_path()
            }

            #[allow(unused_mut)]
            fn #capability(&self) -> ::core::option::Option<::serializable::Fields> {
                let mut fields = ::serializable::Fields::new();
                #(#to_fields)*
                ::core::option::Option::Some(fields)
            }
        }

        impl #impl_generics ::serializable::FromFields for #name #ty_generics #where_clause {
            #[allow(unused_mut)]
            fn from_fields(
                mut fields: ::serializable::Fields,
            ) -> ::core::result::Result<Self, ::serializable::ConversionError> {
                let value = #construct;
                if let ::core::option::Option::Some(extra) = fields.names().next() {
                    return ::core::result::Result::Err(
                        ::serializable::ConversionError::UnexpectedField(
                            ::std::string::String::from(extra)
                        )
                    );
                }
                ::core::result::Result::Ok(value)
            }
        }

        impl #impl_generics ::core::convert::From<#name #ty_generics> for ::serializable::Value #where_clause {
            fn from(value: #name #ty_generics) -> ::serializable::Value {
                ::serializable::Value::Object(::serializable::Object::new(value))
            }
        }

        impl #impl_generics ::serializable::FromValue for #name #ty_generics #where_clause {
            fn from_value(
                value: ::serializable::Value,
            ) -> ::core::result::Result<Self, ::serializable::ConversionError> {
                match value {
                    ::serializable::Value::Object(object) => object
                        .downcast_ref::<Self>()
                        .cloned()
                        .ok_or_else(|| ::serializable::ConversionError::TypeMismatch {
                            expected: <Self as ::serializable::TypePath>::type_path().to_string(),
                            got: object.type_ref().to_string(),
                        }),
                    other => ::core::result::Result::Err(::serializable::ConversionError::TypeMismatch {
                        expected: <Self as ::serializable::TypePath>::type_path().to_string(),
                        got: ::std::string::String::from(other.kind_name()),
                    }),
                }
            }
        }
    })
}
