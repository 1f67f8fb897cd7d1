//! Type catalog: loads the target module and describes its declarations.
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use syn::ext::IdentExt;
use syn::{Fields, GenericArgument, Item, PathArguments, ReturnType, Type, UseTree, Visibility};
use tracing::debug;

use crate::descriptor::{FieldDescriptor, FloatBits, IntBits, TypeDescriptor};
use crate::error::GenError;
use crate::options::TypeFilter;
use crate::tags::FieldTags;

/// Qualified path of the type encoded as Unix seconds.
pub const TEMPORAL_PATH: &str = "chrono::DateTime";

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Where the target module lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleRef {
    /// A `.rs` file, or a directory holding `mod.rs`, `lib.rs` or `main.rs`.
    Path(PathBuf),
    /// `crate::a::b`, resolved from the crate root under `crate_dir/src`.
    Logical { crate_dir: PathBuf, path: String },
}

/// A parsed module: its top-level items and the file they came from.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub file: PathBuf,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub name: String,
    pub visible: bool,
    /// Lifetime parameter names, without the leading `'`.
    pub lifetimes: Vec<String>,
    pub shape: DeclShape,
    pub methods: Vec<MethodSig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclShape {
    /// Named-field or unit struct; only visible fields are kept.
    Record(Vec<FieldDescriptor>),
    /// Single-field tuple struct.
    Newtype(TypeDescriptor),
    /// `type Name = ..;`
    Alias(TypeDescriptor),
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSig {
    pub name: String,
    pub raw: bool,
    pub receiver: Receiver,
    /// Inputs besides the receiver.
    pub inputs: usize,
    pub output: MethodOutput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receiver {
    None,
    Ref,
    RefMut,
    Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodOutput {
    Nothing,
    Single(TypeDescriptor),
    /// A tuple of this many values.
    Many(usize),
}

/// All declarations of a module plus the filtered list of catalog entries.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub module: String,
    pub file: PathBuf,
    decls: IndexMap<String, TypeDecl>,
    entries: Vec<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// MODULE LOADING
// ————————————————————————————————————————————————————————————————————————————

impl ModuleRef {
    /// Existing filesystem paths win; anything with `::` is a module path.
    pub fn parse(raw: &str, crate_dir: &Path) -> Self {
        let as_path = PathBuf::from(raw);
        if !as_path.exists() && raw.contains("::") {
            ModuleRef::Logical {
                crate_dir: crate_dir.to_path_buf(),
                path: raw.to_string(),
            }
        } else {
            ModuleRef::Path(as_path)
        }
    }

    pub fn load(&self) -> Result<Module, GenError> {
        match self {
            ModuleRef::Path(path) => self.load_path(path),
            ModuleRef::Logical { crate_dir, path } => self.load_logical(crate_dir, path),
        }
    }

    fn not_found(&self) -> GenError {
        GenError::ModuleNotFound {
            reference: self.to_string(),
        }
    }

    fn load_path(&self, path: &Path) -> Result<Module, GenError> {
        let file = if path.is_dir() {
            ["mod.rs", "lib.rs", "main.rs"]
                .iter()
                .map(|name| path.join(name))
                .find(|candidate| candidate.is_file())
                .ok_or_else(|| self.not_found())?
        } else if path.is_file() {
            path.to_path_buf()
        } else {
            return Err(self.not_found());
        };
        let name = module_name(&file);
        let items = parse_file(&file)?.items;
        Ok(Module { name, file, items })
    }

    fn load_logical(&self, crate_dir: &Path, path: &str) -> Result<Module, GenError> {
        let src = crate_dir.join("src");
        let root = ["lib.rs", "main.rs"]
            .iter()
            .map(|name| src.join(name))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| self.not_found())?;

        let mut file = root;
        let mut dir = src;
        let mut items = parse_file(&file)?.items;
        let mut name = String::from("crate");

        // the first segment names the crate itself
        // inside an inline module `#[path]` is relative to that module's
        // directory, otherwise to the directory of the current file
        let mut inline = false;
        for segment in path.split("::").skip(1).filter(|s| !s.is_empty()) {
            let found = items.iter().find_map(|item| match item {
                Item::Mod(m) if m.ident.unraw() == segment => {
                    Some((m.content.clone(), path_attr(&m.attrs)))
                }
                _ => None,
            });
            let Some((content, explicit)) = found else {
                return Err(self.not_found());
            };
            let mut child_dir = dir.join(segment);
            match (content, explicit) {
                (Some((_, inner)), explicit) => {
                    if let Some(explicit) = explicit {
                        child_dir = self.path_base(inline, &dir, &file)?.join(explicit);
                    }
                    items = inner;
                    inline = true;
                }
                (None, Some(explicit)) => {
                    file = self.path_base(inline, &dir, &file)?.join(explicit);
                    if !file.is_file() {
                        return Err(self.not_found());
                    }
                    child_dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
                    items = parse_file(&file)?.items;
                    inline = false;
                }
                (None, None) => {
                    let flat = dir.join(format!("{segment}.rs"));
                    let nested = child_dir.join("mod.rs");
                    file = if flat.is_file() {
                        flat
                    } else if nested.is_file() {
                        nested
                    } else {
                        return Err(self.not_found());
                    };
                    items = parse_file(&file)?.items;
                    inline = false;
                }
            }
            dir = child_dir;
            name = segment.to_string();
        }
        Ok(Module { name, file, items })
    }
}

impl ModuleRef {
    fn path_base(&self, inline: bool, dir: &Path, file: &Path) -> Result<PathBuf, GenError> {
        if inline {
            return Ok(dir.to_path_buf());
        }
        file.parent().map(Path::to_path_buf).ok_or_else(|| self.not_found())
    }
}

/// The value of a `#[path = "..."]` attribute, if present.
fn path_attr(attrs: &[syn::Attribute]) -> Option<String> {
    attrs.iter().find_map(|attr| match &attr.meta {
        syn::Meta::NameValue(nv) if nv.path.is_ident("path") => match &nv.value {
            syn::Expr::Lit(syn::ExprLit {
                lit: syn::Lit::Str(lit),
                ..
            }) => Some(lit.value()),
            _ => None,
        },
        _ => None,
    })
}

impl fmt::Display for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleRef::Path(path) => write!(f, "{}", path.display()),
            ModuleRef::Logical { crate_dir, path } => {
                write!(f, "{path} (in {})", crate_dir.display())
            }
        }
    }
}

fn parse_file(path: &Path) -> Result<syn::File, GenError> {
    let source = std::fs::read_to_string(path).map_err(|source| GenError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    syn::parse_file(&source).map_err(|source| GenError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn module_name(file: &Path) -> String {
    let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    match stem {
        "mod" | "lib" | "main" => file
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str())
            .unwrap_or(stem)
            .to_string(),
        _ => stem.to_string(),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CATALOG
// ————————————————————————————————————————————————————————————————————————————

impl Catalog {
    pub fn build(module: &Module, filter: &TypeFilter) -> Result<Self, GenError> {
        let uses = UseMap::collect(&module.items);
        let mut decls = IndexMap::new();
        let mut entries = Vec::new();

        for item in &module.items {
            let decl = match item {
                Item::Struct(s) => {
                    let name = s.ident.unraw().to_string();
                    let ctx = Describe { uses: &uses, self_name: Some(&name) };
                    let shape = if s.generics.type_params().next().is_some()
                        || s.generics.const_params().next().is_some()
                    {
                        DeclShape::Unsupported("generic type parameters are not supported".into())
                    } else {
                        struct_shape(&s.fields, &ctx)
                    };
                    TypeDecl {
                        visible: is_visible(&s.vis),
                        lifetimes: s
                            .generics
                            .lifetimes()
                            .map(|l| l.lifetime.ident.to_string())
                            .collect(),
                        name,
                        shape,
                        methods: Vec::new(),
                    }
                }
                Item::Enum(e) => TypeDecl::unsupported(&e.ident, &e.vis, "enums are not supported"),
                Item::Union(u) => {
                    TypeDecl::unsupported(&u.ident, &u.vis, "unions are not supported")
                }
                Item::Type(t) => {
                    let name = t.ident.unraw().to_string();
                    let ctx = Describe { uses: &uses, self_name: None };
                    TypeDecl {
                        visible: false,
                        lifetimes: Vec::new(),
                        shape: DeclShape::Alias(ctx.describe(&t.ty)),
                        name,
                        methods: Vec::new(),
                    }
                }
                _ => continue,
            };
            let is_entry = decl.visible && !matches!(decl.shape, DeclShape::Alias(_));
            if is_entry && filter.accepts(&decl.name) {
                entries.push(decl.name.clone());
            }
            decls.insert(decl.name.clone(), decl);
        }

        for item in &module.items {
            let Item::Impl(imp) = item else { continue };
            if imp.trait_.is_some() {
                continue;
            }
            let Some(owner) = impl_owner(&imp.self_ty) else { continue };
            let Some(decl) = decls.get_mut(&owner) else { continue };
            let ctx = Describe { uses: &uses, self_name: Some(&owner) };
            for impl_item in &imp.items {
                if let syn::ImplItem::Fn(f) = impl_item {
                    decl.methods.push(method_sig(&f.sig, &ctx));
                }
            }
        }

        debug!(module = %module.name, entries = entries.len(), declarations = decls.len(), "built type catalog");
        Ok(Catalog {
            module: module.name.clone(),
            file: module.file.clone(),
            decls,
            entries,
        })
    }

    /// Catalog entries in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = &TypeDecl> {
        self.entries.iter().filter_map(|name| self.decls.get(name))
    }

    /// Any declaration of the module, visible or not. Accepts `self::Name`.
    pub fn decl(&self, path: &str) -> Option<&TypeDecl> {
        let name = path.strip_prefix("self::").unwrap_or(path);
        self.decls.get(name)
    }

    /// Directory the module's source file lives in.
    pub fn dir(&self) -> &Path {
        self.file.parent().unwrap_or(Path::new("."))
    }
}

impl TypeDecl {
    fn unsupported(ident: &syn::Ident, vis: &Visibility, reason: &str) -> Self {
        TypeDecl {
            name: ident.unraw().to_string(),
            visible: is_visible(vis),
            lifetimes: Vec::new(),
            shape: DeclShape::Unsupported(reason.to_string()),
            methods: Vec::new(),
        }
    }

    pub fn method(&self, name: &str) -> Option<&MethodSig> {
        self.methods.iter().find(|m| m.name == name)
    }
}

fn is_visible(vis: &Visibility) -> bool {
    !matches!(vis, Visibility::Inherited)
}

/// A malformed field tag makes only this struct unsupported.
fn struct_shape(fields: &Fields, ctx: &Describe) -> DeclShape {
    match fields {
        Fields::Unit => DeclShape::Record(Vec::new()),
        Fields::Unnamed(unnamed) if unnamed.unnamed.len() == 1 => {
            DeclShape::Newtype(ctx.describe(&unnamed.unnamed[0].ty))
        }
        Fields::Unnamed(unnamed) => DeclShape::Unsupported(format!(
            "tuple structs with {} fields are not supported",
            unnamed.unnamed.len()
        )),
        Fields::Named(named) => {
            let mut out = Vec::new();
            for field in named.named.iter().filter(|f| is_visible(&f.vis)) {
                let Some(ident) = &field.ident else { continue };
                let name = ident.unraw().to_string();
                let tag = match FieldTags::parse(&field.attrs) {
                    Ok(tags) => tags.resolve(&name),
                    Err(err) => {
                        return DeclShape::Unsupported(format!(
                            "invalid field attribute on `{name}`: {err}"
                        ));
                    }
                };
                out.push(FieldDescriptor {
                    raw: ident.to_string().starts_with("r#"),
                    name,
                    key: tag.key,
                    omit_empty: tag.omit_empty,
                    ty: ctx.describe(&field.ty),
                });
            }
            DeclShape::Record(out)
        }
    }
}

fn impl_owner(ty: &Type) -> Option<String> {
    let Type::Path(p) = ty else { return None };
    if p.qself.is_some() {
        return None;
    }
    let segments: Vec<_> = p.path.segments.iter().map(|s| s.ident.to_string()).collect();
    match segments.as_slice() {
        [name] => Some(name.trim_start_matches("r#").to_string()),
        [first, name] if first == "self" => Some(name.trim_start_matches("r#").to_string()),
        _ => None,
    }
}

fn method_sig(sig: &syn::Signature, ctx: &Describe) -> MethodSig {
    // `ty` is filled in for the shorthand forms too, so `&self` and
    // `self: &Self` look the same here
    let receiver = match sig.receiver().map(|r| r.ty.as_ref()) {
        None => Receiver::None,
        Some(Type::Reference(r)) if r.mutability.is_some() => Receiver::RefMut,
        Some(Type::Reference(_)) => Receiver::Ref,
        Some(_) => Receiver::Value,
    };
    let inputs = sig
        .inputs
        .iter()
        .filter(|arg| matches!(arg, syn::FnArg::Typed(_)))
        .count();
    let output = match &sig.output {
        ReturnType::Default => MethodOutput::Nothing,
        ReturnType::Type(_, ty) => match ty.as_ref() {
            Type::Tuple(t) if t.elems.is_empty() => MethodOutput::Nothing,
            Type::Tuple(t) if t.elems.len() > 1 => MethodOutput::Many(t.elems.len()),
            other => MethodOutput::Single(ctx.describe(other)),
        },
    };
    MethodSig {
        name: sig.ident.unraw().to_string(),
        raw: sig.ident.to_string().starts_with("r#"),
        receiver,
        inputs,
        output,
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TYPE DESCRIPTION
// ————————————————————————————————————————————————————————————————————————————

/// Local names brought in by `use`, mapped to their full paths.
#[derive(Debug, Default)]
struct UseMap {
    names: HashMap<String, String>,
    globs: Vec<String>,
}

impl UseMap {
    fn collect(items: &[Item]) -> Self {
        let mut map = UseMap::default();
        for item in items {
            if let Item::Use(u) = item {
                map.walk(&u.tree, String::new());
            }
        }
        map
    }

    fn walk(&mut self, tree: &UseTree, prefix: String) {
        let join = |name: &str| {
            if prefix.is_empty() { name.to_string() } else { format!("{prefix}::{name}") }
        };
        match tree {
            UseTree::Path(p) => self.walk(&p.tree, join(&p.ident.to_string())),
            UseTree::Name(n) if n.ident == "self" => {
                if let Some(last) = prefix.rsplit("::").next() {
                    self.names.insert(last.to_string(), prefix.clone());
                }
            }
            UseTree::Name(n) => {
                let name = n.ident.to_string();
                self.names.insert(name.clone(), join(&name));
            }
            UseTree::Rename(r) => {
                self.names.insert(r.rename.to_string(), join(&r.ident.to_string()));
            }
            UseTree::Glob(_) => self.globs.push(prefix),
            UseTree::Group(g) => {
                for tree in &g.items {
                    self.walk(tree, prefix.clone());
                }
            }
        }
    }

    fn qualify(&self, segments: &[String]) -> String {
        let Some((first, rest)) = segments.split_first() else {
            return String::new();
        };
        let mut head = match self.names.get(first) {
            Some(full) => full.clone(),
            None if rest.is_empty() && self.glob_provides_temporal(first) => {
                return TEMPORAL_PATH.to_string();
            }
            None => first.clone(),
        };
        for segment in rest {
            head.push_str("::");
            head.push_str(segment);
        }
        normalize_temporal(head)
    }

    fn glob_provides_temporal(&self, name: &str) -> bool {
        name == "DateTime" && self.globs.iter().any(|g| g == "chrono" || g == "chrono::prelude")
    }
}

fn normalize_temporal(path: String) -> String {
    match path.as_str() {
        "chrono::prelude::DateTime" | "chrono::datetime::DateTime" => TEMPORAL_PATH.to_string(),
        _ => path,
    }
}

struct Describe<'a> {
    uses: &'a UseMap,
    self_name: Option<&'a str>,
}

impl Describe<'_> {
    fn describe(&self, ty: &Type) -> TypeDescriptor {
        match ty {
            Type::Paren(p) => self.describe(&p.elem),
            Type::Group(g) => self.describe(&g.elem),
            Type::Reference(r) => TypeDescriptor::pointer(self.describe(&r.elem), false),
            Type::Slice(s) => TypeDescriptor::sequence(self.describe(&s.elem)),
            Type::Array(a) => TypeDescriptor::sequence(self.describe(&a.elem)),
            Type::Path(p) if p.qself.is_none() => self.describe_path(&p.path, ty),
            Type::Tuple(t) if t.elems.is_empty() => {
                TypeDescriptor::unsupported("()", "the unit type has no JSON encoding")
            }
            other => TypeDescriptor::unsupported(render(other), "unsupported type shape"),
        }
    }

    fn describe_path(&self, path: &syn::Path, ty: &Type) -> TypeDescriptor {
        let segments: Vec<String> = path
            .segments
            .iter()
            .map(|s| s.ident.unraw().to_string())
            .collect();
        let Some(last) = path.segments.last() else {
            return TypeDescriptor::unsupported(render(ty), "empty path");
        };
        let std_like =
            segments.len() == 1 || matches!(segments[0].as_str(), "std" | "alloc" | "core");
        let name = segments[segments.len() - 1].as_str();

        if std_like {
            if let Some(scalar) = scalar(name) {
                return scalar;
            }
            let inner = first_type_arg(&last.arguments).map(|t| self.describe(t));
            match (name, inner) {
                ("Option", Some(inner)) => return TypeDescriptor::pointer(inner, true),
                ("Box" | "Rc" | "Arc" | "Cow", Some(inner)) => {
                    return TypeDescriptor::pointer(inner, false);
                }
                ("Vec" | "VecDeque", Some(inner)) => return TypeDescriptor::sequence(inner),
                ("HashMap" | "BTreeMap" | "HashSet" | "BTreeSet", _) => {
                    return TypeDescriptor::unsupported(render(ty), "maps and sets are not supported");
                }
                _ => {}
            }
        }
        if segments.len() == 1 && name == "Self" {
            if let Some(self_name) = self.self_name {
                return TypeDescriptor::named(self_name);
            }
        }
        TypeDescriptor::named(self.uses.qualify(&segments))
    }
}

fn scalar(name: &str) -> Option<TypeDescriptor> {
    let d = match name {
        "bool" => TypeDescriptor::Bool,
        "i8" => TypeDescriptor::int(true, IntBits::B8),
        "i16" => TypeDescriptor::int(true, IntBits::B16),
        "i32" => TypeDescriptor::int(true, IntBits::B32),
        "i64" => TypeDescriptor::int(true, IntBits::B64),
        "i128" => TypeDescriptor::int(true, IntBits::B128),
        "isize" => TypeDescriptor::int(true, IntBits::Size),
        "u8" => TypeDescriptor::int(false, IntBits::B8),
        "u16" => TypeDescriptor::int(false, IntBits::B16),
        "u32" => TypeDescriptor::int(false, IntBits::B32),
        "u64" => TypeDescriptor::int(false, IntBits::B64),
        "u128" => TypeDescriptor::int(false, IntBits::B128),
        "usize" => TypeDescriptor::int(false, IntBits::Size),
        "f32" => TypeDescriptor::Float { bits: FloatBits::B32 },
        "f64" => TypeDescriptor::Float { bits: FloatBits::B64 },
        "String" | "str" => TypeDescriptor::String,
        _ => return None,
    };
    Some(d)
}

fn first_type_arg(args: &PathArguments) -> Option<&Type> {
    let PathArguments::AngleBracketed(args) = args else { return None };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(t) => Some(t),
        _ => None,
    })
}

fn render(ty: &Type) -> String {
    quote::ToTokens::to_token_stream(ty).to_string()
}
