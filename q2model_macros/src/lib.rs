//! Derives for the binary decoding traits in `q2model::reader`. Misuse is reported as a compile error on the item.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{parse_macro_input, spanned::Spanned, Attribute, Data, DataEnum, DeriveInput, Error, Fields, FieldsNamed, Ident, Result, Type};

/// Implements `BspVariableValue` on a single-field tuple struct, taking the on-disk type for each schema from
/// `#[legacy(T)]` and `#[extended(T)]`. Both are required.
///
/// Also implements `From<T> where (inner type): From<T>` so either on-disk type converts into the wrapper, and
/// `Deref`/`DerefMut` to the inner type.
#[proc_macro_derive(BspVariableValue, attributes(legacy, extended))]
pub fn bsp_variable_value_derive(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
	let input = parse_macro_input!(input as DeriveInput);
	expand_variable_value(&input).unwrap_or_else(Error::into_compile_error).into()
}

/// Implements `BspValue` on structs with named fields, read in field order, or on unit enums with a `#[repr(..)]` and
/// explicit discriminants (e.g. `Foo = 1`).
#[proc_macro_derive(BspValue)]
pub fn bsp_value_derive(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
	let input = parse_macro_input!(input as DeriveInput);
	let expanded = match &input.data {
		Data::Struct(data) => match &data.fields {
			Fields::Named(fields) => Ok(expand_struct(&input.ident, fields)),
			other => Err(Error::new(other.span(), "BspValue needs named fields")),
		},
		Data::Enum(data) => expand_enum(&input, data),
		Data::Union(_) => Err(Error::new_spanned(&input.ident, "BspValue can't be derived for unions")),
	};
	expanded.unwrap_or_else(Error::into_compile_error).into()
}

/// The type inside `#[name(T)]`, if the attribute is present.
fn type_attr(attrs: &[Attribute], name: &str) -> Result<Option<Type>> {
	attrs.iter().find(|attr| attr.path().is_ident(name)).map(Attribute::parse_args::<Type>).transpose()
}

fn expand_variable_value(input: &DeriveInput) -> Result<TokenStream> {
	let ident = &input.ident;
	let inner = match &input.data {
		Data::Struct(data) => match &data.fields {
			Fields::Unnamed(fields) if fields.unnamed.len() == 1 => &fields.unnamed[0].ty,
			_ => return Err(Error::new_spanned(ident, "BspVariableValue needs a tuple struct with one field")),
		},
		_ => return Err(Error::new_spanned(ident, "BspVariableValue needs a tuple struct with one field")),
	};
	let legacy = type_attr(&input.attrs, "legacy")?.ok_or_else(|| Error::new_spanned(ident, "missing #[legacy(T)]"))?;
	let extended = type_attr(&input.attrs, "extended")?.ok_or_else(|| Error::new_spanned(ident, "missing #[extended(T)]"))?;

	Ok(quote! {
		impl ::q2model::reader::BspVariableValue for #ident {
			type Legacy = #legacy;
			type Extended = #extended;
		}

		impl<__T: ::core::convert::Into<#inner>> ::core::convert::From<__T> for #ident {
			fn from(value: __T) -> Self {
				Self(value.into())
			}
		}

		impl ::core::ops::Deref for #ident {
			type Target = #inner;
			fn deref(&self) -> &#inner {
				&self.0
			}
		}

		impl ::core::ops::DerefMut for #ident {
			fn deref_mut(&mut self) -> &mut #inner {
				&mut self.0
			}
		}
	})
}

fn expand_struct(ident: &Ident, fields: &FieldsNamed) -> TokenStream {
	let reads = fields.named.iter().map(|field| {
		let name = &field.ident;
		let job = format!("Reading field \"{}\" on type {ident}", quote!(#name));
		quote! {
			#name: ::q2model::ModelResultDoingJobExt::job(::q2model::reader::BspValue::bsp_parse(reader), #job)?
		}
	});
	let sizes = fields.named.iter().map(|field| {
		let ty = &field.ty;
		quote!(<#ty as ::q2model::reader::BspValue>::bsp_struct_size(ctx))
	});

	impl_bsp_value(
		ident,
		quote!(Ok(Self { #(#reads,)* })),
		quote!(0 #(+ #sizes)*),
	)
}

fn expand_enum(input: &DeriveInput, data: &DataEnum) -> Result<TokenStream> {
	let ident = &input.ident;
	let repr = type_attr(&input.attrs, "repr")?.ok_or_else(|| Error::new_spanned(ident, "BspValue enums need #[repr(..)]"))?;

	let mut arms = Vec::with_capacity(data.variants.len());
	let mut acceptable = String::new();
	for variant in &data.variants {
		if !variant.fields.is_empty() {
			return Err(Error::new_spanned(variant, "BspValue enums must be unit-only"));
		}
		let Some((_, discriminant)) = &variant.discriminant else {
			return Err(Error::new_spanned(variant, "BspValue enum variants need explicit discriminants (e.g. Foo = 1)"));
		};
		let name = &variant.ident;
		arms.push(quote!(#discriminant => Ok(Self::#name)));
		acceptable += &format!("{} - {name}\n", quote!(#discriminant));
	}

	Ok(impl_bsp_value(
		ident,
		quote! {
			match <#repr as ::q2model::reader::BspValue>::bsp_parse(reader)? {
				#(#arms,)*
				n => Err(::q2model::ModelError::InvalidVariant { value: n as i64, acceptable: #acceptable }),
			}
		},
		quote!(::core::mem::size_of::<#repr>()),
	))
}

fn impl_bsp_value(ident: &Ident, parse: TokenStream, size: TokenStream) -> TokenStream {
	quote! {
		impl ::q2model::reader::BspValue for #ident {
			fn bsp_parse(reader: &mut ::q2model::reader::ByteReader) -> ::q2model::ModelResult<Self> {
				#parse
			}
			fn bsp_struct_size(ctx: &::q2model::reader::ParseContext) -> usize {
				#size
			}
		}
	}
}
