use std::path::Path;

use pdfsvg::{ImportOptions, Pdf, Rect, parse_page_range};

/// Load `file` and build its font inventory, printing the reason to stderr
/// on failure.
pub fn open_pdf(file: &Path, options: Option<ImportOptions>) -> Result<Pdf, i32> {
    if !file.is_file() {
        eprintln!("Error: file not found: {}", file.display());
        return Err(1);
    }
    match Pdf::open_file(file, options) {
        Ok(pdf) => Ok(pdf),
        Err(err) => {
            eprintln!("Error: failed to open PDF {}: {err}", file.display());
            Err(1)
        }
    }
}

/// Turn the `--pages` argument into 0-based indices; no argument selects
/// every page.
pub fn resolve_pages(pages: Option<&str>, page_count: usize) -> Result<Vec<usize>, i32> {
    let Some(range) = pages else {
        return Ok((0..page_count).collect());
    };
    parse_page_range(range, page_count).map_err(|err| {
        eprintln!("Error: --pages {range}: {err}");
        1
    })
}

pub fn format_rect(r: &Rect) -> String {
    format!("[{:.2}, {:.2}, {:.2}, {:.2}]", r.x0, r.y0, r.x1, r.y1)
}

pub fn rect_to_json(r: &Rect) -> serde_json::Value {
    serde_json::json!([r.x0, r.y0, r.x1, r.y1])
}
