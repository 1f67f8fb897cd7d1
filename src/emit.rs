//! Renders encoder plans into the generated Rust source file.
use proc_macro2::{Ident, Literal, Span, TokenStream};
use quote::{format_ident, quote};

use crate::descriptor::{FloatBits, IntBits};
use crate::error::GenError;
use crate::plan::{Access, Emit, TypePlan};
use crate::runtime::{PoolCapacity, PoolConfig};

pub const HEADER: &str = "// Code generated by json-writegen. DO NOT EDIT.\n// @generated\n";

/// Settings that shape the whole file rather than one type.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub runtime: syn::Path,
    pub marshal_json: bool,
    pub pool: PoolConfig,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

/// Renders the artifact: header, pool constructor, then one `impl` per plan
/// in the order given.
pub fn render_file<'a>(
    plans: impl IntoIterator<Item = &'a TypePlan>,
    settings: &RenderSettings,
) -> Result<String, GenError> {
    let pool = render_pool(settings);
    let impls = plans.into_iter().map(|plan| render_impl(plan, settings));
    let tokens = quote! {
        #pool
        #(#impls)*
    };
    let file: syn::File = syn::parse2(tokens).map_err(GenError::Render)?;
    Ok(format!("{HEADER}\n{}", prettyplease::unparse(&file)))
}

fn render_pool(settings: &RenderSettings) -> TokenStream {
    let rt = &settings.runtime;
    let buffer_size = Literal::usize_unsuffixed(settings.pool.buffer_size);
    let max_buffer_size = Literal::usize_unsuffixed(settings.pool.max_buffer_size);
    let capacity = match settings.pool.capacity {
        PoolCapacity::Fixed(n) => {
            let n = Literal::usize_unsuffixed(n);
            quote!(#rt::PoolCapacity::Fixed(#n))
        }
        PoolCapacity::PerProc(m) => {
            let m = Literal::usize_unsuffixed(m);
            quote!(#rt::PoolCapacity::PerProc(#m))
        }
        PoolCapacity::Disabled => quote!(#rt::PoolCapacity::Disabled),
    };
    quote! {
        /// Builds the buffer pool shared by the `write_json` methods of this module.
        pub fn new_json_buffer_pool() -> #rt::BufferPool {
            #rt::BufferPool::new(#rt::PoolConfig {
                buffer_size: #buffer_size,
                max_buffer_size: #max_buffer_size,
                capacity: #capacity,
            })
        }
    }
}

fn render_impl(plan: &TypePlan, settings: &RenderSettings) -> TokenStream {
    let rt = &settings.runtime;
    let name = format_ident!("{}", plan.type_name);
    let lifetimes: Vec<syn::Lifetime> = plan
        .lifetimes
        .iter()
        .map(|l| syn::Lifetime::new(&format!("'{l}"), Span::call_site()))
        .collect();
    let generics = if lifetimes.is_empty() {
        quote!()
    } else {
        quote!(<#(#lifetimes),*>)
    };
    let body = render_ops(&plan.ops, rt);
    let marshal = settings.marshal_json.then(|| {
        quote! {
            /// Returns the JSON encoding of `self` as an owned byte vector.
            pub fn marshal_json(&self, pool: &#rt::BufferPool) -> ::std::io::Result<::std::vec::Vec<u8>> {
                let mut out = ::std::vec::Vec::new();
                self.write_json(pool, &mut out)?;
                Ok(out)
            }
        }
    });
    quote! {
        impl #generics #name #generics {
            /// Writes the JSON encoding of `self` to `w` and returns the number of bytes written.
            pub fn write_json<W: ::std::io::Write + ?Sized>(
                &self,
                pool: &#rt::BufferPool,
                w: &mut W,
            ) -> ::std::io::Result<usize> {
                let mut buf = pool.acquire();
                self.encode_json(&mut buf);
                w.write_all(&buf)?;
                Ok(buf.len())
            }

            #marshal

            #[doc(hidden)]
            pub fn encode_json(&self, buf: &mut ::std::vec::Vec<u8>) {
                #body
            }
        }
    }
}

fn render_ops(ops: &[Emit], rt: &syn::Path) -> TokenStream {
    let stmts = ops.iter().map(|op| render_op(op, rt));
    quote!(#(#stmts)*)
}

fn render_op(op: &Emit, rt: &syn::Path) -> TokenStream {
    match op {
        Emit::Literal { text } => {
            let bytes = Literal::byte_string(text.as_bytes());
            quote!(buf.extend_from_slice(#bytes);)
        }
        Emit::Bool { value } => {
            let v = copied(value);
            quote!(#rt::write_bool(buf, #v);)
        }
        Emit::Int { value, signed, bits } => {
            let v = copied(value);
            match (signed, bits) {
                (true, IntBits::B128) => quote!(#rt::write_i128(buf, #v);),
                (false, IntBits::B128) => quote!(#rt::write_u128(buf, #v);),
                (true, IntBits::B64) => quote!(#rt::write_i64(buf, #v);),
                (false, IntBits::B64) => quote!(#rt::write_u64(buf, #v);),
                (true, IntBits::Size) => quote!(#rt::write_i64(buf, #v as i64);),
                (false, IntBits::Size) => quote!(#rt::write_u64(buf, #v as u64);),
                (true, _) => quote!(#rt::write_i64(buf, i64::from(#v));),
                (false, _) => quote!(#rt::write_u64(buf, u64::from(#v));),
            }
        }
        Emit::Float { value, bits } => {
            let v = copied(value);
            match bits {
                FloatBits::B32 => quote!(#rt::write_f32(buf, #v);),
                FloatBits::B64 => quote!(#rt::write_f64(buf, #v);),
            }
        }
        Emit::Str { value } => {
            let v = reference(value);
            quote!(#rt::write_str(buf, #v);)
        }
        Emit::Timestamp { value } => {
            let v = reference(value);
            quote!(#rt::write_timestamp(buf, #v);)
        }
        Emit::Nullable {
            value,
            binding,
            some,
        } => {
            let v = reference(value);
            let b = format_ident!("{}", binding);
            let some = render_ops(some, rt);
            quote! {
                match #v {
                    ::std::option::Option::Some(#b) => { #some }
                    ::std::option::Option::None => buf.extend_from_slice(#rt::NULL),
                }
            }
        }
        Emit::Sequence {
            value,
            index,
            binding,
            element,
        } => {
            let v = place(value);
            let i = format_ident!("{}", index);
            let b = format_ident!("{}", binding);
            let element = render_ops(element, rt);
            quote! {
                for (#i, #b) in #v.iter().enumerate() {
                    if #i > 0 {
                        buf.push(b',');
                    }
                    #element
                }
            }
        }
        Emit::Method {
            value,
            method,
            raw,
            binding,
            body,
        } => {
            let v = place(value);
            let m = ident(method, *raw);
            let b = format_ident!("{}", binding);
            let body = render_ops(body, rt);
            quote! {
                {
                    let #b = &#v.#m();
                    #body
                }
            }
        }
        Emit::Delegate { value, .. } => {
            let v = place(value);
            quote!(#v.encode_json(buf);)
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

// `self` and bindings are references; fields and tuple elements are places
// reached through auto-deref.

/// Expression usable as a method-call or field-access base.
fn place(access: &Access) -> TokenStream {
    match access {
        Access::Receiver => quote!(self),
        Access::Binding(name) => {
            let b = format_ident!("{}", name);
            quote!(#b)
        }
        Access::Field { of, name, raw } => {
            let of = place(of);
            let f = ident(name, *raw);
            quote!(#of.#f)
        }
        Access::Element { of, index } => {
            let of = place(of);
            let index = syn::Index::from(*index);
            quote!(#of.#index)
        }
        Access::Deref(of) => place(of),
    }
}

/// The value itself, for `Copy` scalars.
fn copied(access: &Access) -> TokenStream {
    match access {
        Access::Receiver => quote!(*self),
        Access::Binding(name) => {
            let b = format_ident!("{}", name);
            quote!(*#b)
        }
        Access::Field { .. } | Access::Element { .. } => place(access),
        Access::Deref(of) => {
            let of = copied(of);
            quote!(*#of)
        }
    }
}

/// A shared reference to the value.
fn reference(access: &Access) -> TokenStream {
    match access {
        Access::Receiver | Access::Binding(_) => place(access),
        Access::Field { .. } | Access::Element { .. } => {
            let p = place(access);
            quote!(&#p)
        }
        Access::Deref(of) => {
            let of = copied(of);
            quote!(&*#of)
        }
    }
}

fn ident(name: &str, raw: bool) -> Ident {
    if raw {
        Ident::new_raw(name, Span::call_site())
    } else {
        Ident::new(name, Span::call_site())
    }
}
