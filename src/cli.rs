//! CLI: module → gen_json.rs (gen) | encoder plans as JSON (plan)
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde_json::json;
use tracing::warn;

use json_writegen::{GenerationOptions, GenerationReport, ModuleRef, VirtualFieldSpec};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// generate allocation-light JSON encoders for the structs of a Rust module
#[derive(Parser, Debug)]
#[command(name = "json-writegen", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// generate encoders and write gen_json.rs next to the module
    Gen(GenerationSettings),
    /// print the encoder plans and per-type diagnostics as JSON, without writing anything
    Plan(GenerationSettings),
}

#[derive(Args, Debug, Clone)]
struct GenerationSettings {
    /// module file or directory, or a module path such as `crate::models`
    module: String,

    /// crate directory used to resolve module paths
    #[arg(long, default_value = ".")]
    crate_dir: PathBuf,

    /// options file (.toml, or JSON for any other extension); flags override it
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// also generate `marshal_json`
    #[arg(long)]
    marshal_json: bool,

    /// capacity of freshly allocated buffers (0 = 8 KiB)
    #[arg(long)]
    buffer_size: Option<usize>,

    /// buffers larger than this are not returned to the pool
    #[arg(long)]
    max_buffer_size: Option<usize>,

    /// idle buffers kept by the pool (0 = one per CPU, negative disables pooling)
    #[arg(long, allow_negative_numbers = true)]
    buffer_count: Option<i64>,

    /// idle buffers kept per CPU; wins over --buffer-count
    #[arg(long)]
    buffers_per_proc: Option<usize>,

    /// virtual field as `Type.method[=key][,omit_empty]`; repeatable
    #[arg(long = "method", value_parser = parse_method)]
    methods: Vec<(String, VirtualFieldSpec)>,

    /// only generate types whose name matches this regex
    #[arg(long)]
    include: Option<String>,

    /// skip types whose name matches this regex
    #[arg(long)]
    exclude: Option<String>,

    /// path generated code uses for the runtime
    #[arg(long)]
    runtime_path: Option<String>,

    /// write gen_json.rs here instead of next to the module
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl GenerationSettings {
    fn module_ref(&self) -> ModuleRef {
        ModuleRef::parse(&self.module, &self.crate_dir)
    }

    fn options(&self) -> anyhow::Result<GenerationOptions> {
        let mut opts = match &self.config {
            Some(path) => GenerationOptions::from_file(path)?,
            None => GenerationOptions::default(),
        };
        opts.marshal_json |= self.marshal_json;
        if let Some(n) = self.buffer_size {
            opts.buffer_size = n;
        }
        if let Some(n) = self.max_buffer_size {
            opts.max_buffer_size = n;
        }
        if let Some(n) = self.buffer_count {
            opts.buffer_count = n;
        }
        if let Some(n) = self.buffers_per_proc {
            opts.buffers_per_proc = n;
        }
        for (type_name, spec) in &self.methods {
            opts.methods.entry(type_name.clone()).or_default().push(spec.clone());
        }
        if self.include.is_some() {
            opts.include = self.include.clone();
        }
        if self.exclude.is_some() {
            opts.exclude = self.exclude.clone();
        }
        if self.runtime_path.is_some() {
            opts.runtime_path = self.runtime_path.clone();
        }
        if self.out_dir.is_some() {
            opts.out_dir = self.out_dir.clone();
        }
        Ok(opts)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Gen(settings) => {
                // debug path
                if settings.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }
                let opts = settings.options()?;
                let module = settings.module_ref();
                let report = json_writegen::generate(&module, &opts)
                    .with_context(|| format!("generating encoders for {module}"))?;
                print_summary(&report);
                Ok(())
            }
            Command::Plan(settings) => {
                // debug path
                if settings.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }
                let opts = settings.options()?;
                let module = settings.module_ref();
                let outcomes = json_writegen::plan_encoders(&module, &opts)
                    .with_context(|| format!("planning encoders for {module}"))?;
                let view: Vec<_> = outcomes
                    .iter()
                    .map(|outcome| match &outcome.result {
                        Ok(plan) => json!({ "type": outcome.type_name, "plan": plan }),
                        Err(diagnostic) => json!({
                            "type": outcome.type_name,
                            "diagnostic": diagnostic,
                            "message": diagnostic.to_string(),
                        }),
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&view)?);
                Ok(())
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn print_summary(report: &GenerationReport) {
    for diagnostic in report.diagnostics() {
        warn!(type_name = diagnostic.type_name(), "{diagnostic}");
    }
    let generated = report.generated().count();
    let skipped = report.outcomes.len() - generated;
    let status = if skipped == 0 {
        "ok".green().bold()
    } else {
        "partial".yellow().bold()
    };
    eprintln!(
        "{status} {} → {} ({} generated, {} skipped)",
        report.module.cyan(),
        report.artifact.display(),
        generated,
        skipped,
    );
}

/// `Type.method`, `Type.method=key`, optionally followed by `,omit_empty`.
fn parse_method(raw: &str) -> Result<(String, VirtualFieldSpec), String> {
    let (head, omit_empty) = match raw.split_once(',') {
        Some((head, "omit_empty" | "omitempty")) => (head, true),
        Some((_, flag)) => return Err(format!("unknown method flag `{flag}`")),
        None => (raw, false),
    };
    let (target, key) = match head.split_once('=') {
        Some((target, key)) => (target, Some(key)),
        None => (head, None),
    };
    let Some((type_name, method)) = target.split_once('.') else {
        return Err(format!("expected `Type.method`, got `{target}`"));
    };
    if type_name.is_empty() || method.is_empty() {
        return Err(format!("expected `Type.method`, got `{target}`"));
    }
    let spec = VirtualFieldSpec {
        name: method.to_string(),
        key: key.filter(|k| !k.is_empty()).unwrap_or(method).to_string(),
        omit_empty,
    };
    Ok((type_name.to_string(), spec))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_flag_forms() {
        let (ty, spec) = parse_method("Person.full_name").unwrap();
        assert_eq!(ty, "Person");
        assert_eq!(spec.key, "full_name");
        assert!(!spec.omit_empty);

        let (_, spec) = parse_method("Person.full_name=name,omit_empty").unwrap();
        assert_eq!(spec.name, "full_name");
        assert_eq!(spec.key, "name");
        assert!(spec.omit_empty);

        assert!(parse_method("full_name").is_err());
        assert!(parse_method("Person.x,flatten").is_err());
    }

    #[test]
    fn flags_override_config() {
        let cli = CommandLineInterface::try_parse_from([
            "json-writegen",
            "gen",
            "src/models.rs",
            "--buffer-count",
            "-1",
            "--method",
            "Person.full_name",
            "--marshal-json",
        ])
        .unwrap();
        let Command::Gen(settings) = &cli.cmd else { panic!() };
        let opts = settings.options().unwrap();
        assert!(opts.marshal_json);
        assert_eq!(opts.buffer_count, -1);
        assert_eq!(opts.methods_for("Person")[0].name, "full_name");
    }
}
