use crate::config::Config;
use crate::error::Result;
use crate::terraform::Workspace;
use std::path::PathBuf;

pub async fn execute(dir: PathBuf) -> Result<()> {
    let config = Config::load()?;
    let restored = Workspace::new(&dir, &config.terraform).restore()?;

    match (restored.removed_override, restored.restored_backup) {
        (false, false) => println!("Nothing to restore"),
        (_, true) => println!("Restored {}", restored.providers.display()),
        (true, false) => println!("Removed {}", config.terraform.override_file.display()),
    }
    Ok(())
}
