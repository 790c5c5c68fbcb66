use anyhow::{Result, anyhow};
use std::panic;
use std::path::Path;

/// Concatenated plain text of every page in the document.
///
/// pdf-extract can panic on malformed files, so the call is unwind-guarded
/// and a panic surfaces as an ordinary error.
pub fn extract_text(path: &Path) -> Result<String> {
    let owned = path.to_path_buf();
    let result = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text(&owned)
    }));

    match result {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(err)) => Err(anyhow!(
            "text extraction failed for {}: {err}",
            path.display()
        )),
        Err(_) => Err(anyhow!(
            "text extraction panicked on {} (malformed PDF)",
            path.display()
        )),
    }
}
