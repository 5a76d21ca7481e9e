//! Macro package persistence.
//!
//! Each recording is saved as a self-contained directory:
//!
//! ```text
//! macros/<name>_<timestamp>/
//!   macro.json        ordered events + metadata (screenshots by path only)
//!   screenshots/      annotated evidence images, numbered in capture order
//!   replay.py         directly executable input-replay statements
//!   README.md         human-readable summary
//! macros/<name>_<timestamp>.zip
//! ```
//!
//! Screenshot paths inside `macro.json` are package-relative so a package
//! stays portable when moved or unzipped elsewhere.

use crate::error::{MacroError, Result};
use crate::events::{EventData, Macro};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Where a saved package ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPackage {
    pub package_dir: PathBuf,
    pub zip_path: PathBuf,
    pub files: Vec<PathBuf>,
}

/// Package-layout helper bound to an output root (default `macros/`).
#[derive(Debug, Clone)]
pub struct MacroPackage {
    output_dir: PathBuf,
}

impl MacroPackage {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Create the package directory (plus `screenshots/`) for a recording
    /// that is about to start.
    pub fn create_layout(&self, macro_name: &str) -> Result<PathBuf> {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let dir = self
            .output_dir
            .join(format!("{}_{stamp}", sanitize(macro_name)));
        fs::create_dir_all(dir.join("screenshots"))
            .map_err(|e| MacroError::SaveError(format!("Failed to create {dir:?}: {e}")))?;
        Ok(dir)
    }

    /// Serialize a frozen macro into `package_dir` and zip the bundle.
    pub fn save(&self, macro_doc: &Macro, package_dir: &Path) -> Result<SavedPackage> {
        fs::create_dir_all(package_dir.join("screenshots"))
            .map_err(|e| MacroError::SaveError(format!("Failed to create package dir: {e}")))?;

        let mut files = Vec::new();

        let json_path = package_dir.join("macro.json");
        let json = macro_doc
            .to_json()
            .map_err(|e| MacroError::SaveError(format!("Failed to serialize macro: {e}")))?;
        fs::write(&json_path, json)
            .map_err(|e| MacroError::SaveError(format!("Failed to write macro.json: {e}")))?;
        files.push(json_path);

        let script_path = package_dir.join("replay.py");
        fs::write(&script_path, generate_replay_script(macro_doc))
            .map_err(|e| MacroError::SaveError(format!("Failed to write replay.py: {e}")))?;
        files.push(script_path);

        let readme_path = package_dir.join("README.md");
        fs::write(&readme_path, generate_readme(macro_doc))
            .map_err(|e| MacroError::SaveError(format!("Failed to write README.md: {e}")))?;
        files.push(readme_path);

        let zip_path = package_dir.with_extension("zip");
        if let Err(e) = zip_directory(package_dir, &zip_path) {
            cleanup_partial_zip(&zip_path);
            return Err(MacroError::SaveError(format!(
                "Failed to create zip bundle: {e}"
            )));
        }
        files.push(zip_path.clone());

        info!(
            "Saved macro '{}' to {:?} ({} events)",
            macro_doc.name,
            package_dir,
            macro_doc.events.len()
        );

        Ok(SavedPackage {
            package_dir: package_dir.to_path_buf(),
            zip_path,
            files,
        })
    }
}

impl Default for MacroPackage {
    fn default() -> Self {
        Self::new("macros")
    }
}

/// Load a macro from a package directory or a `macro.json` path.
pub fn load_macro(path: &Path) -> Result<Macro> {
    let json_path = if path.is_dir() {
        path.join("macro.json")
    } else {
        path.to_path_buf()
    };
    let json = fs::read_to_string(&json_path)
        .map_err(|e| MacroError::LoadError(format!("Failed to read {json_path:?}: {e}")))?;
    Macro::from_json(&json)
        .map_err(|e| MacroError::LoadError(format!("Invalid macro document: {e}")))
}

/// Keep alphanumerics, spaces, dashes and underscores; everything else is
/// unsafe in a directory name.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let trimmed = cleaned.trim().to_string();
    if trimmed.is_empty() {
        "macro".to_string()
    } else {
        trimmed
    }
}

/// Mirror the event stream as executable pyautogui statements with the
/// recorded inter-event delays.
fn generate_replay_script(macro_doc: &Macro) -> String {
    let mut lines = vec![
        "\"\"\"".to_string(),
        format!("Generated macro: {}", macro_doc.name),
        format!("Description: {}", macro_doc.description),
        format!("Created: {}", macro_doc.created_at),
        format!("Total events: {}", macro_doc.events.len()),
        "\"\"\"".to_string(),
        String::new(),
        "import time".to_string(),
        "import pyautogui".to_string(),
        String::new(),
        String::new(),
        "def replay_macro():".to_string(),
        "    \"\"\"Replay the recorded macro.\"\"\"".to_string(),
        "    print(\"Starting macro replay...\")".to_string(),
        "    pyautogui.FAILSAFE = False".to_string(),
        String::new(),
    ];

    let start = macro_doc.events.first().map(|e| e.timestamp).unwrap_or(0.0);
    for (index, event) in macro_doc.events.iter().enumerate() {
        lines.push(format!(
            "    # Event {}: {:?} at {:.2}s",
            index + 1,
            event.event_type,
            event.timestamp - start
        ));
        match &event.data {
            EventData::Click { x, y, .. } => {
                lines.push(format!("    pyautogui.click({x}, {y})"));
            }
            EventData::Scroll { x, y, scroll_dy, .. } => {
                lines.push(format!("    pyautogui.scroll({scroll_dy}, x={x}, y={y})"));
            }
            EventData::Text { text, .. } => {
                let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
                lines.push(format!("    pyautogui.write(\"{escaped}\")"));
            }
            EventData::Key { key } => {
                lines.push(format!("    pyautogui.press(\"{key}\")"));
            }
            EventData::Marker { .. } => {
                lines.push("    pass  # state marker".to_string());
            }
            EventData::Wait { duration } => {
                lines.push(format!("    time.sleep({duration:.2})"));
            }
        }
        if let Some(next) = macro_doc.events.get(index + 1) {
            let delay = next.timestamp - event.timestamp;
            if delay > 0.1 {
                lines.push(format!("    time.sleep({delay:.2})"));
            }
        }
        lines.push(String::new());
    }

    lines.push("    print(\"Macro replay completed.\")".to_string());
    lines.push(String::new());
    lines.push(String::new());
    lines.push("if __name__ == \"__main__\":".to_string());
    lines.push("    replay_macro()".to_string());
    lines.join("\n")
}

fn generate_readme(macro_doc: &Macro) -> String {
    let mut lines = vec![
        format!("# {}", macro_doc.name),
        String::new(),
        format!(
            "**Description:** {}",
            if macro_doc.description.is_empty() {
                "No description provided"
            } else {
                &macro_doc.description
            }
        ),
        format!("**Created:** {}", macro_doc.created_at),
        format!("**Duration:** {:.2} seconds", macro_doc.metadata.duration),
        format!("**Total Events:** {}", macro_doc.metadata.total_events),
        String::new(),
        "## Event Summary".to_string(),
        String::new(),
    ];

    for (event_type, count) in &macro_doc.metadata.event_counts {
        lines.push(format!("- **{event_type:?}**: {count} events"));
    }

    lines.extend([
        String::new(),
        "## Package Contents".to_string(),
        String::new(),
        "- `macro.json` - Complete macro data with UI context and timing".to_string(),
        "- `replay.py` - Executable replay script".to_string(),
        "- `screenshots/` - Action screenshots with highlighted UI elements".to_string(),
        "- `README.md` - This documentation file".to_string(),
        String::new(),
        "## Usage".to_string(),
        String::new(),
        "```bash".to_string(),
        "uiscribe play <package-dir>".to_string(),
        "```".to_string(),
    ]);

    lines.join("\n")
}

fn zip_directory(dir: &Path, zip_path: &Path) -> io::Result<()> {
    let file = File::create(zip_path)?;
    let mut zip = ZipWriter::new(file);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    add_directory(&mut zip, dir, dir, options)?;
    zip.finish()?;
    Ok(())
}

fn add_directory(
    zip: &mut ZipWriter<File>,
    base: &Path,
    dir: &Path,
    options: SimpleFileOptions,
) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            add_directory(zip, base, &path, options)?;
        } else {
            let name = path
                .strip_prefix(base)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            zip.start_file(name, options)?;
            let mut source = File::open(&path)?;
            io::copy(&mut source, zip)?;
        }
    }
    Ok(())
}

/// Remove an incomplete zip left behind by a failed save so a retry starts
/// clean.
fn cleanup_partial_zip(zip_path: &Path) {
    if zip_path.exists() {
        if let Err(e) = fs::remove_file(zip_path) {
            warn!("Failed to remove partial zip {zip_path:?}: {e}");
        }
    }
}
