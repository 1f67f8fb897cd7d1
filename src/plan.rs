//! Encoder plans: the recursive lowering of a catalog entry into emit operations.
//!
//! Lowering walks the descriptor tree with an access path (how to reach the
//! value from `self`) and produces a flat list of [`Emit`] steps. Adjacent
//! literal text is merged, so `{"name":` is one write. Named records are
//! inlined unless they are already being lowered further up, in which case
//! the plan delegates to that type's own `encode_json` at run time.
use std::collections::BTreeSet;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::catalog::{Catalog, DeclShape, MethodOutput, Receiver, TEMPORAL_PATH, TypeDecl};
use crate::descriptor::{FieldDescriptor, FloatBits, IntBits, TypeDescriptor};
use crate::error::TypeDiagnostic;
use crate::options::GenerationOptions;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// One step of an encoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Emit {
    /// Fixed JSON text (punctuation and pre-escaped keys).
    Literal { text: String },
    Bool { value: Access },
    Int { value: Access, signed: bool, bits: IntBits },
    Float { value: Access, bits: FloatBits },
    Str { value: Access },
    Timestamp { value: Access },
    /// `null` when absent, otherwise `some` with `binding` bound to the pointee.
    Nullable {
        value: Access,
        binding: String,
        some: Vec<Emit>,
    },
    /// Comma-separated `element` for each item; brackets are separate literals.
    Sequence {
        value: Access,
        index: String,
        binding: String,
        element: Vec<Emit>,
    },
    /// Binds `&value.method()` for the duration of `body`.
    Method {
        value: Access,
        method: String,
        raw: bool,
        binding: String,
        body: Vec<Emit>,
    },
    /// Calls `encode_json` of an already generated type.
    Delegate { value: Access, type_name: String },
}

/// How the value being lowered is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Receiver,
    Binding(String),
    Field {
        of: Box<Access>,
        name: String,
        raw: bool,
    },
    /// Tuple-struct field `.0`.
    Element { of: Box<Access>, index: usize },
    /// Through a non-null pointer.
    Deref(Box<Access>),
}

/// Plan for one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypePlan {
    pub type_name: String,
    pub lifetimes: Vec<String>,
    pub ops: Vec<Emit>,
    /// Types whose `encode_json` this plan calls.
    pub requires: BTreeSet<String>,
}

struct PlanBuilder<'a> {
    catalog: &'a Catalog,
    opts: &'a GenerationOptions,
    /// Named types currently being lowered, outermost first.
    stack: Vec<String>,
    requires: BTreeSet<String>,
    next_binding: usize,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

/// Lowers one catalog entry. Fails on the first unsupported shape or bad
/// virtual field anywhere in its type graph.
pub fn plan_type(
    catalog: &Catalog,
    opts: &GenerationOptions,
    decl: &TypeDecl,
) -> Result<TypePlan, TypeDiagnostic> {
    let mut builder = PlanBuilder {
        catalog,
        opts,
        stack: Vec::new(),
        requires: BTreeSet::new(),
        next_binding: 0,
    };
    let mut ops = Vec::new();
    builder.lower_named(&decl.name, &decl.name, Access::Receiver, &mut ops)?;
    Ok(TypePlan {
        type_name: decl.name.clone(),
        lifetimes: decl.lifetimes.clone(),
        ops,
        requires: builder.requires,
    })
}

impl PlanBuilder<'_> {
    fn lower(
        &mut self,
        ty: &TypeDescriptor,
        owner: &str,
        value: Access,
        out: &mut Vec<Emit>,
    ) -> Result<(), TypeDiagnostic> {
        match ty {
            TypeDescriptor::Bool => out.push(Emit::Bool { value }),
            TypeDescriptor::Int { signed, bits } => out.push(Emit::Int {
                value,
                signed: *signed,
                bits: *bits,
            }),
            TypeDescriptor::Float { bits } => out.push(Emit::Float { value, bits: *bits }),
            TypeDescriptor::String => out.push(Emit::Str { value }),
            TypeDescriptor::Named { path } => self.lower_named(path, owner, value, out)?,
            TypeDescriptor::Pointer {
                pointee,
                nullable: true,
            } => {
                let binding = self.fresh("v");
                let mut some = Vec::new();
                self.lower(pointee, owner, Access::Binding(binding.clone()), &mut some)?;
                out.push(Emit::Nullable {
                    value,
                    binding,
                    some,
                });
            }
            TypeDescriptor::Pointer {
                pointee,
                nullable: false,
            } => self.lower(pointee, owner, Access::Deref(Box::new(value)), out)?,
            TypeDescriptor::Sequence { element } => {
                let index = self.fresh("i");
                let binding = self.fresh("v");
                let mut body = Vec::new();
                self.lower(element, owner, Access::Binding(binding.clone()), &mut body)?;
                push_literal(out, "[");
                out.push(Emit::Sequence {
                    value,
                    index,
                    binding,
                    element: body,
                });
                push_literal(out, "]");
            }
            TypeDescriptor::Unsupported { repr, reason } => {
                return Err(TypeDiagnostic::Unsupported {
                    type_name: owner.to_string(),
                    ty: repr.clone(),
                    reason: reason.clone(),
                });
            }
        }
        Ok(())
    }

    fn lower_named(
        &mut self,
        path: &str,
        owner: &str,
        value: Access,
        out: &mut Vec<Emit>,
    ) -> Result<(), TypeDiagnostic> {
        if path == TEMPORAL_PATH {
            out.push(Emit::Timestamp { value });
            return Ok(());
        }
        let catalog = self.catalog;
        let Some(decl) = catalog.decl(path) else {
            return Err(TypeDiagnostic::Unsupported {
                type_name: owner.to_string(),
                ty: path.to_string(),
                reason: "type is not declared in this module".into(),
            });
        };
        if self.stack.contains(&decl.name) {
            if let DeclShape::Alias(_) = decl.shape {
                return Err(TypeDiagnostic::Unsupported {
                    type_name: owner.to_string(),
                    ty: decl.name.clone(),
                    reason: "recursive type alias".into(),
                });
            }
            self.requires.insert(decl.name.clone());
            out.push(Emit::Delegate {
                value,
                type_name: decl.name.clone(),
            });
            return Ok(());
        }

        self.stack.push(decl.name.clone());
        let lowered = match &decl.shape {
            DeclShape::Alias(ty) => self.lower(ty, owner, value, out),
            DeclShape::Newtype(ty) => {
                let inner = Access::Element {
                    of: Box::new(value),
                    index: 0,
                };
                self.lower(ty, &decl.name, inner, out)
            }
            DeclShape::Record(fields) => self.lower_record(decl, fields, value, out),
            DeclShape::Unsupported(reason) => Err(TypeDiagnostic::Unsupported {
                type_name: owner.to_string(),
                ty: decl.name.clone(),
                reason: reason.clone(),
            }),
        };
        self.stack.pop();
        lowered
    }

    fn lower_record(
        &mut self,
        decl: &TypeDecl,
        fields: &[FieldDescriptor],
        value: Access,
        out: &mut Vec<Emit>,
    ) -> Result<(), TypeDiagnostic> {
        push_literal(out, "{");
        let mut first = true;
        for field in fields {
            // TODO: honor omit_empty once empty-value semantics per kind are settled
            let Some(key) = &field.key else { continue };
            push_key(out, key, &mut first);
            let access = Access::Field {
                of: Box::new(value.clone()),
                name: field.name.clone(),
                raw: field.raw,
            };
            self.lower(&field.ty, &decl.name, access, out)?;
        }

        let opts = self.opts;
        for spec in opts.methods_for(&decl.name) {
            let type_name = decl.name.clone();
            let method_name = spec.name.clone();
            let Some(method) = decl.method(&spec.name) else {
                return Err(TypeDiagnostic::MissingMethod { type_name, method: method_name });
            };
            // by-value receivers would move out of the borrowed record
            if method.receiver != Receiver::Ref {
                return Err(TypeDiagnostic::MethodReceiver { type_name, method: method_name });
            }
            if method.inputs > 0 {
                return Err(TypeDiagnostic::MethodArguments { type_name, method: method_name });
            }
            let MethodOutput::Single(result) = &method.output else {
                return Err(TypeDiagnostic::MethodResults { type_name, method: method_name });
            };

            push_key(out, &spec.key, &mut first);
            let binding = self.fresh("m");
            let mut body = Vec::new();
            self.lower(result, &decl.name, Access::Binding(binding.clone()), &mut body)?;
            out.push(Emit::Method {
                value: value.clone(),
                method: method.name.clone(),
                raw: method.raw,
                binding,
                body,
            });
        }
        push_literal(out, "}");
        Ok(())
    }

    fn fresh(&mut self, prefix: &str) -> String {
        let name = format!("__{prefix}{}", self.next_binding);
        self.next_binding += 1;
        name
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn push_literal(out: &mut Vec<Emit>, text: &str) {
    if let Some(Emit::Literal { text: last }) = out.last_mut() {
        last.push_str(text);
    } else {
        out.push(Emit::Literal {
            text: text.to_string(),
        });
    }
}

fn push_key(out: &mut Vec<Emit>, key: &str, first: &mut bool) {
    if !*first {
        push_literal(out, ",");
    }
    *first = false;
    let mut quoted = Vec::with_capacity(key.len() + 3);
    crate::runtime::write_str(&mut quoted, key);
    quoted.push(b':');
    // the escaper only ever emits valid UTF-8
    push_literal(out, &String::from_utf8_lossy(&quoted));
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Receiver => f.write_str("self"),
            Access::Binding(name) => f.write_str(name),
            Access::Field { of, name, raw } => {
                write!(f, "{of}.{}{name}", if *raw { "r#" } else { "" })
            }
            Access::Element { of, index } => write!(f, "{of}.{index}"),
            Access::Deref(of) => write!(f, "*{of}"),
        }
    }
}

impl Serialize for Access {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Module;
    use crate::options::{TypeFilter, VirtualFieldSpec};
    use std::path::PathBuf;

    fn catalog(src: &str) -> Catalog {
        let module = Module {
            name: "models".into(),
            file: PathBuf::from("src/models.rs"),
            items: syn::parse_file(src).unwrap().items,
        };
        Catalog::build(&module, &TypeFilter::default()).unwrap()
    }

    fn plan(src: &str, ty: &str, opts: &GenerationOptions) -> Result<TypePlan, TypeDiagnostic> {
        let c = catalog(src);
        let decl = c.decl(ty).unwrap().clone();
        plan_type(&c, opts, &decl)
    }

    fn lit(text: &str) -> Emit {
        Emit::Literal { text: text.into() }
    }

    fn field(name: &str) -> Access {
        Access::Field {
            of: Box::new(Access::Receiver),
            name: name.into(),
            raw: false,
        }
    }

    fn with_methods(ty: &str, specs: &[(&str, &str)]) -> GenerationOptions {
        let mut opts = GenerationOptions::default();
        opts.methods.insert(
            ty.into(),
            specs
                .iter()
                .map(|(name, key)| VirtualFieldSpec {
                    name: name.to_string(),
                    key: key.to_string(),
                    omit_empty: false,
                })
                .collect(),
        );
        opts
    }

    #[test]
    fn record_with_scalars_merges_literals() {
        let p = plan(
            "pub struct Person { pub name: String, pub age: i32, secret: String }",
            "Person",
            &GenerationOptions::default(),
        )
        .unwrap();
        assert_eq!(
            p.ops,
            vec![
                lit(r#"{"name":"#),
                Emit::Str { value: field("name") },
                lit(r#","age":"#),
                Emit::Int {
                    value: field("age"),
                    signed: true,
                    bits: IntBits::B32
                },
                lit("}"),
            ]
        );
        assert!(p.requires.is_empty());
    }

    #[test]
    fn only_private_fields_is_empty_object() {
        let p = plan("pub struct S { a: u8, b: String }", "S", &GenerationOptions::default()).unwrap();
        assert_eq!(p.ops, vec![lit("{}")]);
        let p = plan("pub struct Unit;", "Unit", &GenerationOptions::default()).unwrap();
        assert_eq!(p.ops, vec![lit("{}")]);
    }

    #[test]
    fn skipped_fields_do_not_leave_commas() {
        let p = plan(
            r#"
            pub struct S {
                #[serde(skip)] pub a: u8,
                pub b: bool,
                #[genjson(skip)] pub c: u8,
                #[serde(rename = "D\"")] pub d: bool,
            }
            "#,
            "S",
            &GenerationOptions::default(),
        )
        .unwrap();
        assert_eq!(
            p.ops,
            vec![
                lit(r#"{"b":"#),
                Emit::Bool { value: field("b") },
                lit(r#","D\"":"#),
                Emit::Bool { value: field("d") },
                lit("}"),
            ]
        );
    }

    #[test]
    fn pointers_and_sequences() {
        let p = plan(
            r#"
            pub struct Address { pub city: String }
            pub struct S { pub addr: Option<Box<Address>>, pub tags: Vec<String> }
            "#,
            "S",
            &GenerationOptions::default(),
        )
        .unwrap();
        let pointee = Access::Deref(Box::new(Access::Binding("__v0".into())));
        assert_eq!(
            p.ops,
            vec![
                lit(r#"{"addr":"#),
                Emit::Nullable {
                    value: field("addr"),
                    binding: "__v0".into(),
                    some: vec![
                        lit(r#"{"city":"#),
                        Emit::Str {
                            value: Access::Field {
                                of: Box::new(pointee),
                                name: "city".into(),
                                raw: false,
                            }
                        },
                        lit("}"),
                    ],
                },
                lit(r#","tags":["#),
                Emit::Sequence {
                    value: field("tags"),
                    index: "__i1".into(),
                    binding: "__v2".into(),
                    element: vec![Emit::Str {
                        value: Access::Binding("__v2".into())
                    }],
                },
                lit("]}"),
            ]
        );
    }

    #[test]
    fn temporal_aliases_and_newtypes() {
        let p = plan(
            r#"
            use chrono::{DateTime, Utc};
            pub type Stamp = DateTime<Utc>;
            pub struct Celsius(f32);
            pub struct S { pub at: Stamp, pub temp: Celsius }
            "#,
            "S",
            &GenerationOptions::default(),
        )
        .unwrap();
        assert_eq!(
            p.ops,
            vec![
                lit(r#"{"at":"#),
                Emit::Timestamp { value: field("at") },
                lit(r#","temp":"#),
                Emit::Float {
                    value: Access::Element {
                        of: Box::new(field("temp")),
                        index: 0
                    },
                    bits: FloatBits::B32
                },
                lit("}"),
            ]
        );
    }

    #[test]
    fn self_reference_delegates() {
        let p = plan(
            "pub struct Node { pub value: u64, pub next: Option<Box<Node>>, pub children: Vec<Node> }",
            "Node",
            &GenerationOptions::default(),
        )
        .unwrap();
        assert_eq!(p.requires, BTreeSet::from(["Node".to_string()]));
        assert!(p.ops.iter().any(|op| matches!(
            op,
            Emit::Nullable { some, .. } if matches!(&some[..], [Emit::Delegate { type_name, .. }] if type_name == "Node")
        )));
    }

    #[test]
    fn virtual_fields_follow_declared_fields() {
        let src = r#"
            pub struct P { pub first: String }
            impl P { pub fn full_name(&self) -> String { todo!() } }
        "#;
        let p = plan(src, "P", &with_methods("P", &[("full_name", "full_name")])).unwrap();
        assert_eq!(
            p.ops,
            vec![
                lit(r#"{"first":"#),
                Emit::Str { value: field("first") },
                lit(r#","full_name":"#),
                Emit::Method {
                    value: Access::Receiver,
                    method: "full_name".into(),
                    raw: false,
                    binding: "__m0".into(),
                    body: vec![Emit::Str {
                        value: Access::Binding("__m0".into())
                    }],
                },
                lit("}"),
            ]
        );
    }

    #[test]
    fn virtual_field_on_empty_record_has_no_leading_comma() {
        let src = "pub struct E; impl E { fn answer(&self) -> u8 { 42 } }";
        let p = plan(src, "E", &with_methods("E", &[("answer", "a")])).unwrap();
        assert_eq!(p.ops[0], lit(r#"{"a":"#));
    }

    #[test]
    fn bad_virtual_fields_name_type_and_method() {
        let src = r#"
            pub struct P { pub x: u8 }
            impl P {
                fn with_arg(&self, y: u8) -> u8 { y }
                fn nothing(&self) {}
                fn pair(&self) -> (u8, u8) { (0, 0) }
                fn bump(&mut self) -> u8 { 0 }
                fn consume(self) -> u8 { 0 }
                fn make() -> u8 { 0 }
            }
        "#;
        let cases = [
            ("missing", "does not have method missing"),
            ("with_arg", "requires arguments"),
            ("nothing", "must return exactly one value"),
            ("pair", "must return exactly one value"),
            ("bump", "can't be called"),
            ("consume", "can't be called"),
            ("make", "can't be called"),
        ];
        for (method, message) in cases {
            let err = plan(src, "P", &with_methods("P", &[(method, "k")])).unwrap_err();
            assert_eq!(err.type_name(), "P");
            assert_eq!(err.method(), Some(method));
            assert!(err.to_string().contains(message), "{err}");
        }
    }

    #[test]
    fn unsupported_shapes_fail_the_type() {
        let err = plan(
            "pub struct S { pub m: std::collections::HashMap<String, u8> }",
            "S",
            &GenerationOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TypeDiagnostic::Unsupported { ref type_name, .. } if type_name == "S"));

        let err = plan("pub enum E { A }", "E", &GenerationOptions::default()).unwrap_err();
        assert!(err.to_string().contains("enums are not supported"));

        let err = plan(
            "pub struct S { pub o: other::Thing }",
            "S",
            &GenerationOptions::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("other::Thing"));
    }
}
