use crewkit_core::{config, git, paths, CrewkitError};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    let path = paths::crew_config_path(root);
    if path.exists() {
        return Err(CrewkitError::ConfigExists(path.display().to_string()).into());
    }

    let main_branch = git::detect_main_branch(root);
    crewkit_core::io::atomic_write(&path, config::template(&main_branch).as_bytes())?;

    println!("Wrote {}", path.display());
    println!("Main branch: {main_branch}");
    println!("Edit the teammate list, then run `crewkit start`.");
    Ok(())
}
