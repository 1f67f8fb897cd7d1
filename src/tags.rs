//! Field tag parsing: `#[serde(..)]` is the conventional tag, `#[genjson(..)]`
//! the alternate one. `genjson` is also read inside `#[cfg_attr(.., genjson(..))]`
//! so models can carry it without a proc-macro in scope.
use syn::meta::ParseNestedMeta;
use syn::punctuated::Punctuated;
use syn::{Attribute, LitStr, Meta, Token};

pub const CONVENTIONAL: &str = "serde";
pub const ALTERNATE: &str = "genjson";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTag {
    pub rename: Option<String>,
    pub skip: bool,
    pub omit_empty: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTags {
    pub conventional: Option<FieldTag>,
    pub alternate: Option<FieldTag>,
}

/// Key and omit-empty intent after precedence is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTag {
    /// `None` when the field is skipped.
    pub key: Option<String>,
    pub omit_empty: bool,
}

impl FieldTag {
    pub fn is_empty(&self) -> bool {
        self.rename.as_deref().is_none_or(str::is_empty) && !self.skip && !self.omit_empty
    }
}

impl FieldTags {
    pub fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut tags = FieldTags::default();
        for attr in attrs {
            if attr.path().is_ident(CONVENTIONAL) {
                let tag = tags.conventional.get_or_insert_with(FieldTag::default);
                attr.parse_nested_meta(|meta| conventional_item(tag, meta))?;
            } else if attr.path().is_ident(ALTERNATE) {
                let tag = tags.alternate.get_or_insert_with(FieldTag::default);
                attr.parse_nested_meta(|meta| alternate_item(tag, meta))?;
            } else if attr.path().is_ident("cfg_attr") {
                tags.parse_cfg_attr(attr)?;
            }
        }
        Ok(tags)
    }

    fn parse_cfg_attr(&mut self, attr: &Attribute) -> syn::Result<()> {
        let metas = attr.parse_args_with(|input: syn::parse::ParseStream| {
            let _predicate: Meta = input.parse()?;
            input.parse::<Token![,]>()?;
            Punctuated::<Meta, Token![,]>::parse_terminated(input)
        })?;
        for meta in metas {
            let Meta::List(list) = meta else { continue };
            if list.path.is_ident(CONVENTIONAL) {
                let tag = self.conventional.get_or_insert_with(FieldTag::default);
                list.parse_nested_meta(|meta| conventional_item(tag, meta))?;
            } else if list.path.is_ident(ALTERNATE) {
                let tag = self.alternate.get_or_insert_with(FieldTag::default);
                list.parse_nested_meta(|meta| alternate_item(tag, meta))?;
            }
        }
        Ok(())
    }

    /// A skip in either tag always wins. Otherwise a non-empty alternate tag
    /// replaces the conventional one, and the field name is the fallback key.
    pub fn resolve(&self, field_name: &str) -> ResolvedTag {
        let skip = [&self.conventional, &self.alternate]
            .into_iter()
            .flatten()
            .any(|tag| tag.skip);
        let chosen = match &self.alternate {
            Some(alternate) if !alternate.is_empty() => Some(alternate),
            _ => self.conventional.as_ref(),
        };
        let key = chosen
            .and_then(|tag| tag.rename.as_deref())
            .filter(|name| !name.is_empty())
            .unwrap_or(field_name);
        ResolvedTag {
            key: (!skip).then(|| key.to_string()),
            omit_empty: chosen.is_some_and(|tag| tag.omit_empty),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn conventional_item(tag: &mut FieldTag, meta: ParseNestedMeta) -> syn::Result<()> {
    if meta.path.is_ident("rename") {
        if meta.input.peek(Token![=]) {
            tag.rename = Some(meta.value()?.parse::<LitStr>()?.value());
        } else {
            meta.parse_nested_meta(|inner| {
                if inner.path.is_ident("serialize") {
                    tag.rename = Some(inner.value()?.parse::<LitStr>()?.value());
                } else {
                    skip_value(&inner)?;
                }
                Ok(())
            })?;
        }
    } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_serializing") {
        tag.skip = true;
    } else if meta.path.is_ident("skip_serializing_if") {
        tag.omit_empty = true;
        skip_value(&meta)?;
    } else {
        skip_value(&meta)?;
    }
    Ok(())
}

fn alternate_item(tag: &mut FieldTag, meta: ParseNestedMeta) -> syn::Result<()> {
    if meta.path.is_ident("rename") {
        tag.rename = Some(meta.value()?.parse::<LitStr>()?.value());
    } else if meta.path.is_ident("skip") {
        tag.skip = true;
    } else if meta.path.is_ident("omit_empty") || meta.path.is_ident("omitempty") {
        tag.omit_empty = true;
    } else {
        return Err(meta.error("expected `rename = \"..\"`, `skip` or `omit_empty`"));
    }
    Ok(())
}

/// Consumes `= expr` or `(..)` of an item this crate does not care about.
fn skip_value(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        let _: syn::Expr = meta.value()?.parse()?;
    } else if meta.input.peek(syn::token::Paren) {
        let content;
        syn::parenthesized!(content in meta.input);
        let _: proc_macro2::TokenStream = content.parse()?;
    }
    Ok(())
}
