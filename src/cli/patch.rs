//! `opskit patch-ansible`: Windows compatibility patch.

use std::path::Path;

use crate::cli::output;
use crate::error::{OpsError, Result};
use crate::patcher::{self, PatchResult};

pub fn run(venv: &Path) -> Result<()> {
    let Some(target) = patcher::find_cli_init(venv) else {
        return Err(OpsError::Patch(format!(
            "ansible/cli/__init__.py not found under {}; is Ansible installed in the virtualenv?",
            venv.display()
        )));
    };
    output::kv("target", target.display());

    match patcher::patch_file(&target)? {
        PatchResult::AlreadyPatched => {
            output::dimmed("already patched, nothing to do");
        }
        PatchResult::Patched(_) => {
            output::success("patch applied");
            output::kv("backup", target.with_extension("py.bak").display());
        }
        // patch_file maps this case to an error
        PatchResult::NotApplicable => unreachable!(),
    }
    Ok(())
}
