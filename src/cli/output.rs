//! Shared CLI output helpers for consistent terminal output.
//!
//! Styling goes through `console`, which already suppresses colors for
//! non-tty streams and NO_COLOR.
//!
//! Color scheme:
//! - Green: success, checkmarks
//! - Red: errors
//! - Yellow: warnings
//! - Cyan: hosts, names, keys, hints
//! - Bold: headers, important values
//! - Dimmed: secondary info

use std::fmt::Display;
use std::io::{self, Write as IoWrite};

use console::style;

const RULE_WIDTH: usize = 56;

/// Print a success message with checkmark (green).
///
/// Example: `✓ record created`
pub fn success(msg: &str) {
    println!("{} {}", style("✓").green(), msg);
}

/// Print an error message to stderr (red).
///
/// Example: `✗ zone not found`
pub fn error(msg: &str) {
    eprintln!("{} {}", style("✗").red(), msg);
}

/// Print a warning message (yellow).
///
/// Example: `⚠ name was sanitized`
pub fn warn(msg: &str) {
    println!("{} {}", style("⚠").yellow(), msg);
}

/// Print a hint message (cyan).
///
/// Example: `→ set CLOUDFLARE_API_TOKEN to skip this prompt`
pub fn hint(msg: &str) {
    println!("{} {}", style("→").cyan(), style(msg).cyan());
}

/// Print a bold section header.
pub fn header(title: &str) {
    println!("{}", style(title).bold());
}

/// Print a key-value pair (label dimmed, value bold).
///
/// Example: `  zone:  example.com`
pub fn kv(label: &str, value: impl Display) {
    println!("  {}  {}", style(label).dim(), style(value).bold());
}

/// Print a list item with bullet.
///
/// Example: `  • api.example.com`
pub fn list_item(item: &str) {
    println!("  • {}", item);
}

/// Print a horizontal rule separator.
pub fn rule() {
    println!("{}", style("─".repeat(RULE_WIDTH)).dim());
}

/// Format a name (record, tunnel, secret) in cyan for inline use.
pub fn name(n: &str) -> String {
    style(n).cyan().to_string()
}

/// Format a command string in green for inline use.
pub fn cmd(c: &str) -> String {
    style(c).green().to_string()
}

/// Start a progress line in the format `Label... `.
///
/// Call `progress_done()` to finish the line.
pub fn progress(label: &str) {
    print!("{}... ", style(label).dim());
    let _ = io::stdout().flush();
}

/// Finish a progress line with success/failure indicator.
pub fn progress_done(ok: bool) {
    if ok {
        println!("{}", style("ok").green());
    } else {
        println!("{}", style("failed").red());
    }
}

/// Print a dimmed/secondary message.
pub fn dimmed(msg: &str) {
    println!("{}", style(msg).dim());
}

/// Print a section header with a separator line.
pub fn section(title: &str) {
    println!();
    header(title);
    rule();
}

/// Print a succeeded/failed summary line after a batch.
pub fn summary(succeeded: usize, failed: usize) {
    println!();
    if failed == 0 {
        success(&format!("{} succeeded", succeeded));
    } else {
        warn(&format!("{} succeeded, {} failed", succeeded, failed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Styling may be a no-op off-tty; the text itself must survive either way.
    #[test]
    fn test_inline_formatters_keep_text() {
        assert!(name("api.example.com").contains("api.example.com"));
        assert!(cmd("kubectl apply -f k8s").contains("kubectl apply -f k8s"));
    }
}
