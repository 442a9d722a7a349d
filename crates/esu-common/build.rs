//! ---
//! esu_section: "01-shared-foundation"
//! esu_subsection: "build"
//! esu_type: "source"
//! esu_scope: "code"
//! esu_description: "Build script embedding build metadata for version reporting."
//! esu_version: "v0.1.0"
//! esu_owner: "tbd"
//! ---
use vergen::EmitBuilder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    EmitBuilder::builder().all_build().all_cargo().emit()?;

    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
