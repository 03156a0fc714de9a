//! Source patching for Ansible's CLI entry module on Windows.
//!
//! Ansible's `cli/__init__.py` calls `os.get_blocking()` (missing on
//! Windows) and probes the process locale (broken under some Windows
//! encodings). Both call sites are rewritten in place; a `.py.bak` copy
//! of the pristine file is kept next to it so re-runs patch a clean base.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{OpsError, Result};

/// Marker inserted into patched files; its presence short-circuits a re-run.
const PATCH_MARKER: &str = "PATCHED FOR WINDOWS";

const BLOCKING_OLD: &str = "        if not os.get_blocking(fd):";

const BLOCKING_NEW: &str = "        # PATCHED FOR WINDOWS - os.get_blocking() is not available on Windows
        try:
            is_blocking = os.get_blocking(fd)
        except (AttributeError, OSError):
            # Skip on Windows or if not supported
            continue

        if not is_blocking:";

const LOCALE_OLD: &str = "    try:
        locale.setlocale(locale.LC_ALL, '')
        dummy, encoding = locale.getlocale()
    except (locale.Error, ValueError) as e:";

const LOCALE_NEW: &str = "    # PATCHED FOR WINDOWS - Force UTF-8 on Windows
    import platform
    try:
        if platform.system() == 'Windows':
            # On Windows, force UTF-8 encoding
            encoding = 'UTF-8'
        else:
            locale.setlocale(locale.LC_ALL, '')
            dummy, encoding = locale.getlocale()
    except (locale.Error, ValueError) as e:";

/// Result of running the patch transform over file content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchResult {
    /// The marker is already present; nothing to do.
    AlreadyPatched,
    /// At least one site was rewritten.
    Patched(String),
    /// Neither expected site was found. The installed version likely
    /// differs from the one the patch targets.
    NotApplicable,
}

/// Candidate locations of `ansible/cli/__init__.py` relative to a
/// virtualenv root, checked in order.
pub fn candidate_cli_paths(venv: &Path) -> Vec<PathBuf> {
    let tail: PathBuf = ["ansible", "cli", "__init__.py"].iter().collect();
    vec![
        venv.join("Lib").join("site-packages").join(&tail),
        venv.join("lib").join("site-packages").join(&tail),
    ]
}

/// Locate the CLI entry module under a virtualenv, if present.
pub fn find_cli_init(venv: &Path) -> Option<PathBuf> {
    candidate_cli_paths(venv).into_iter().find(|p| p.exists())
}

/// Apply both rewrites to the given content. Pure transform, no I/O.
pub fn apply_windows_patches(content: &str) -> PatchResult {
    if content.contains(PATCH_MARKER) {
        return PatchResult::AlreadyPatched;
    }

    let mut patched = content.to_string();
    let mut any = false;

    if patched.contains(BLOCKING_OLD) {
        patched = patched.replace(BLOCKING_OLD, BLOCKING_NEW);
        debug!("rewrote os.get_blocking() call site");
        any = true;
    }

    if patched.contains(LOCALE_OLD) {
        patched = patched.replace(LOCALE_OLD, LOCALE_NEW);
        debug!("rewrote locale probe");
        any = true;
    }

    if any {
        PatchResult::Patched(patched)
    } else {
        PatchResult::NotApplicable
    }
}

/// Patch a file in place, keeping a `.py.bak` backup.
///
/// If a backup already exists the file is first restored from it, so the
/// transform always runs against a pristine base; otherwise the backup is
/// created before writing. Returns the transform outcome.
pub fn patch_file(path: &Path) -> Result<PatchResult> {
    let backup = path.with_extension("py.bak");

    if backup.exists() {
        debug!(backup = %backup.display(), "restoring pristine copy from backup");
        std::fs::copy(&backup, path)?;
    } else {
        debug!(backup = %backup.display(), "creating backup");
        std::fs::copy(path, &backup)?;
    }

    let content = std::fs::read_to_string(path)?;
    let result = apply_windows_patches(&content);

    match &result {
        PatchResult::Patched(new_content) => {
            std::fs::write(path, new_content)?;
            Ok(result)
        }
        PatchResult::AlreadyPatched => Ok(result),
        PatchResult::NotApplicable => Err(OpsError::Patch(
            "expected code patterns not found; the installed version may have changed".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
def check_blocking_io():
    for fd in fds:
        if not os.get_blocking(fd):
            to_fix.append(fd)


def initialize_locale():
    try:
        locale.setlocale(locale.LC_ALL, '')
        dummy, encoding = locale.getlocale()
    except (locale.Error, ValueError) as e:
        raise SystemExit(e)
";

    #[test]
    fn test_patches_both_sites() {
        let PatchResult::Patched(out) = apply_windows_patches(SAMPLE) else {
            panic!("expected a patched result");
        };
        assert!(out.contains(PATCH_MARKER));
        assert!(out.contains("except (AttributeError, OSError):"));
        assert!(out.contains("platform.system() == 'Windows'"));
        assert!(!out.contains("        if not os.get_blocking(fd):\n"));
    }

    #[test]
    fn test_patched_content_is_stable() {
        let PatchResult::Patched(out) = apply_windows_patches(SAMPLE) else {
            panic!("expected a patched result");
        };
        assert_eq!(apply_windows_patches(&out), PatchResult::AlreadyPatched);
    }

    #[test]
    fn test_unknown_content_not_applicable() {
        assert_eq!(
            apply_windows_patches("def unrelated():\n    pass\n"),
            PatchResult::NotApplicable
        );
    }

    #[test]
    fn test_single_site_is_enough() {
        let only_blocking = "    for fd in fds:\n        if not os.get_blocking(fd):\n            pass\n";
        assert!(matches!(
            apply_windows_patches(only_blocking),
            PatchResult::Patched(_)
        ));
    }

    #[test]
    fn test_patch_file_keeps_backup() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("__init__.py");
        std::fs::write(&file, SAMPLE).unwrap();

        let result = patch_file(&file).unwrap();
        assert!(matches!(result, PatchResult::Patched(_)));

        let backup = file.with_extension("py.bak");
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), SAMPLE);
        assert!(std::fs::read_to_string(&file).unwrap().contains(PATCH_MARKER));

        // Re-run restores from backup first, then reports patched again.
        let rerun = patch_file(&file).unwrap();
        assert!(matches!(rerun, PatchResult::Patched(_)));
    }

    #[test]
    fn test_candidate_paths_cover_both_layouts() {
        let venv = Path::new("/opt/venv");
        let paths = candidate_cli_paths(venv);
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("Lib/site-packages/ansible/cli/__init__.py"));
        assert!(paths[1].ends_with("lib/site-packages/ansible/cli/__init__.py"));
    }
}
