//! Per-language message overrides.
//!
//! A language directory holds one `<language>.json` file per language, each
//! a `{ "Key": "template" }` object, e.g. `de.json`:
//!
//! ```json
//! { "Untie": "Die Kiste löst sich in {0} Sekunden." }
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};
use untie_core::MessageCatalog;

/// Register every `*.json` file in `dir` with `catalog`, keyed by file
/// stem. Returns the number of templates taken.
///
/// # Errors
///
/// Returns an error if the directory or a file cannot be read, or a file is
/// not a JSON object of strings.
pub fn load_language_dir(dir: &Path, catalog: &mut MessageCatalog) -> Result<usize> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("reading language dir {}", dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("reading language dir {}", dir.display()))?
            .path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut total = 0;
    for path in paths {
        let Some(language) = path.file_stem().and_then(|stem| stem.to_str()) else {
            warn!(path = %path.display(), "skipping language file with a non UTF-8 name");
            continue;
        };
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading language file {}", path.display()))?;
        let taken = catalog
            .register_json(language, &text)
            .with_context(|| format!("parsing language file {}", path.display()))?;
        info!(language, templates = taken, "language loaded");
        total += taken;
    }
    Ok(total)
}
