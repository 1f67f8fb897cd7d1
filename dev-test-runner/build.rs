use std::path::PathBuf;

use json_writegen::{GenerationOptions, ModuleRef};

fn main() -> Result<(), json_writegen::GenError> {
    println!("cargo:rerun-if-changed=src/models.rs");
    println!("cargo:rerun-if-changed=json-writegen.toml");

    let manifest_dir = PathBuf::from(std::env::var_os("CARGO_MANIFEST_DIR").unwrap_or_default());
    let mut opts = GenerationOptions::from_file(&manifest_dir.join("json-writegen.toml"))?;
    opts.out_dir = std::env::var_os("OUT_DIR").map(PathBuf::from);

    let module = ModuleRef::Path(manifest_dir.join("src").join("models.rs"));
    let report = json_writegen::generate(&module, &opts)?;
    for diagnostic in report.diagnostics() {
        println!("cargo:warning={diagnostic}");
    }
    Ok(())
}
