//! The generation run: load, catalog, plan every entry, drop entries whose
//! delegates were not generated, render and write the artifact.
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::catalog::{Catalog, ModuleRef};
use crate::emit::{RenderSettings, render_file};
use crate::error::{GenError, TypeDiagnostic};
use crate::options::GenerationOptions;
use crate::plan::{TypePlan, plan_type};

/// File name of the artifact, created next to the module source.
pub const ARTIFACT_NAME: &str = "gen_json.rs";

/// Result for one catalog entry.
#[derive(Debug, Clone)]
pub struct TypeOutcome {
    pub type_name: String,
    pub result: Result<TypePlan, TypeDiagnostic>,
}

/// What a run produced: the artifact path and one outcome per catalog entry,
/// in catalog order.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub module: String,
    pub artifact: PathBuf,
    pub outcomes: Vec<TypeOutcome>,
}

impl GenerationReport {
    pub fn generated(&self) -> impl Iterator<Item = &TypePlan> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &TypeDiagnostic> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().err())
    }
}

/// Plans every catalog entry. Entries that delegate to a type without an
/// encoder of its own fail with [`TypeDiagnostic::MissingDependency`],
/// repeated until no more entries drop out.
pub fn plan_module(catalog: &Catalog, opts: &GenerationOptions) -> Vec<TypeOutcome> {
    let mut outcomes: Vec<TypeOutcome> = catalog
        .entries()
        .map(|decl| {
            let result = plan_type(catalog, opts, decl);
            match &result {
                Ok(plan) => debug!(type_name = %decl.name, ops = plan.ops.len(), "planned encoder"),
                Err(diagnostic) => debug!(type_name = %decl.name, %diagnostic, "skipping type"),
            }
            TypeOutcome {
                type_name: decl.name.clone(),
                result,
            }
        })
        .collect();

    loop {
        let generated: HashSet<String> = outcomes
            .iter()
            .filter(|o| o.result.is_ok())
            .map(|o| o.type_name.clone())
            .collect();
        let mut changed = false;
        for outcome in &mut outcomes {
            let Ok(plan) = &outcome.result else { continue };
            let Some(missing) = plan.requires.iter().find(|r| !generated.contains(*r)) else {
                continue;
            };
            outcome.result = Err(TypeDiagnostic::MissingDependency {
                type_name: outcome.type_name.clone(),
                dependency: missing.clone(),
            });
            changed = true;
        }
        if !changed {
            return outcomes;
        }
    }
}

/// Renders the artifact text for a set of outcomes. Failed entries are left out.
pub fn render_module(outcomes: &[TypeOutcome], opts: &GenerationOptions) -> Result<String, GenError> {
    let settings = RenderSettings {
        runtime: opts.runtime_path()?,
        marshal_json: opts.marshal_json,
        pool: opts.pool_config(),
    };
    render_file(outcomes.iter().filter_map(|o| o.result.as_ref().ok()), &settings)
}

/// Loads and plans a module without rendering or writing anything.
pub fn plan_encoders(module: &ModuleRef, opts: &GenerationOptions) -> Result<Vec<TypeOutcome>, GenError> {
    let filter = opts.filter()?;
    let catalog = Catalog::build(&module.load()?, &filter)?;
    Ok(plan_module(&catalog, opts))
}

/// Runs the generator over one module and writes `gen_json.rs`.
///
/// Fatal errors abort before anything is written. Per-type failures do not:
/// they are returned in the report and the affected types are simply absent
/// from the artifact.
pub fn generate(module: &ModuleRef, opts: &GenerationOptions) -> Result<GenerationReport, GenError> {
    let filter = opts.filter()?;
    let loaded = module.load()?;
    let catalog = Catalog::build(&loaded, &filter)?;
    let outcomes = plan_module(&catalog, opts);
    let source = render_module(&outcomes, opts)?;

    let dir = opts.out_dir.as_deref().unwrap_or_else(|| catalog.dir());
    let artifact = dir.join(ARTIFACT_NAME);
    write_artifact(&artifact, &source)?;
    debug!(artifact = %artifact.display(), bytes = source.len(), "wrote artifact");

    Ok(GenerationReport {
        module: catalog.module.clone(),
        artifact,
        outcomes,
    })
}

fn write_artifact(path: &Path, source: &str) -> Result<(), GenError> {
    let wrap = |source| GenError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(wrap)?;
    }
    std::fs::write(path, source).map_err(wrap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Module;
    use crate::options::TypeFilter;

    fn outcomes(src: &str, filter: TypeFilter) -> Vec<TypeOutcome> {
        let module = Module {
            name: "models".into(),
            file: PathBuf::from("src/models.rs"),
            items: syn::parse_file(src).unwrap().items,
        };
        let catalog = Catalog::build(&module, &filter).unwrap();
        plan_module(&catalog, &GenerationOptions::default())
    }

    #[test]
    fn self_recursive_type_is_generated() {
        let out = outcomes(
            "pub struct Node { pub next: Option<Box<Node>> }",
            TypeFilter::default(),
        );
        assert!(out[0].result.is_ok());
    }

    #[test]
    fn filtered_delegate_target_drops_dependents() {
        // Branch is on the lowering stack when its own `kids` are reached
        let src = r#"
            pub struct Branch { pub kids: Vec<Branch> }
            pub struct Tree { pub root: Branch }
            pub struct Forest { pub trees: Vec<Tree>, pub size: u32 }
        "#;
        let opts = GenerationOptions {
            exclude: Some("^Branch$".into()),
            ..Default::default()
        };
        let out = outcomes(src, opts.filter().unwrap());
        let names: Vec<_> = out.iter().map(|o| o.type_name.as_str()).collect();
        assert_eq!(names, ["Tree", "Forest"]);
        assert_eq!(
            out[0].result.as_ref().unwrap_err(),
            &TypeDiagnostic::MissingDependency {
                type_name: "Tree".into(),
                dependency: "Branch".into()
            }
        );
        assert!(matches!(
            out[1].result,
            Err(TypeDiagnostic::MissingDependency { ref dependency, .. }) if dependency == "Branch"
        ));
    }

    #[test]
    fn failures_do_not_stop_other_types() {
        let out = outcomes(
            "pub struct Good { pub a: u8 } pub enum Bad { X } pub struct AlsoGood;",
            TypeFilter::default(),
        );
        let ok: Vec<_> = out.iter().map(|o| o.result.is_ok()).collect();
        assert_eq!(ok, [true, false, true]);
    }
}
