//! PDF page rasterization via poppler's `pdftoppm`, used to OCR scanned pages.

use crate::error::{ProcessError, ProcessResult};
use crate::require_tool;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Render one 1-based page of a PDF to a PNG inside `output_dir`.
pub fn rasterize_pdf_page(
    pdf_path: &Path,
    page: u32,
    dpi: u32,
    output_dir: &Path,
) -> ProcessResult<PathBuf> {
    if !pdf_path.exists() {
        return Err(ProcessError::FileNotFound(pdf_path.to_path_buf()));
    }
    if page == 0 {
        return Err(ProcessError::RasterizeError("pages are 1-based".to_string()));
    }
    require_tool("pdftoppm")?;

    let prefix = output_dir.join(format!("page-{}", page));
    debug!("Rasterizing page {} of {:?} at {} dpi", page, pdf_path, dpi);

    let page_arg = page.to_string();
    let output = Command::new("pdftoppm")
        .args(["-f", &page_arg, "-l", &page_arg])
        .args(["-r", &dpi.to_string()])
        .arg("-png")
        .arg("-singlefile")
        .arg(pdf_path)
        .arg(&prefix)
        .output()?;

    if !output.status.success() {
        return Err(ProcessError::RasterizeError(
            String::from_utf8_lossy(&output.stderr).to_string(),
        ));
    }

    let png = prefix.with_extension("png");
    if !png.exists() {
        return Err(ProcessError::RasterizeError(format!(
            "pdftoppm produced no image for page {}",
            page
        )));
    }

    Ok(png)
}
