use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use pdfsvg::{CropBox, FontStrategy, ImportOptions, SvgDocument};
use tracing::{info, warn};

use crate::shared::{open_pdf, resolve_pages};

pub struct ConvertArgs<'a> {
    pub file: &'a Path,
    pub pages: Option<&'a str>,
    pub output: Option<&'a Path>,
    pub crop: Option<CropBox>,
    pub precision: f64,
    pub font_strategy: FontStrategy,
    pub embed_images: bool,
}

pub fn run(args: &ConvertArgs<'_>) -> Result<(), i32> {
    let options = ImportOptions {
        precision: args.precision,
        crop: args.crop,
        font_strategy: args.font_strategy,
        embed_images: args.embed_images,
        ..ImportOptions::default()
    };
    let pdf = open_pdf(args.file, Some(options))?;
    let page_indices = resolve_pages(args.pages, pdf.page_count())?;
    let single = page_indices.len() == 1;

    let mut failed = false;
    for (index, result) in pdf.render_pages(page_indices) {
        let page = index + 1;
        let result = match result {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Error rendering page {page}: {e}");
                failed = true;
                continue;
            }
        };
        for warning in &result.warnings {
            warn!(page, "{warning}");
        }
        let written = match output_path(args.file, args.output, page, single) {
            Some(path) => write_file(&path, &result.value)
                .map(|()| info!(page, path = %path.display(), "written")),
            None => write_stdout(&result.value),
        };
        if let Err(e) = written {
            eprintln!("Error writing page {page}: {e}");
            return Err(1);
        }
    }

    if failed { Err(1) } else { Ok(()) }
}

/// Where page `page` goes; `None` means stdout.
fn output_path(input: &Path, output: Option<&Path>, page: usize, single: bool) -> Option<PathBuf> {
    match output {
        Some(path) if single => Some(path.to_path_buf()),
        Some(path) => Some(numbered(path, page)),
        None if single => None,
        None => {
            let stem = input.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
            Some(PathBuf::from(format!("{stem}-{page}.svg")))
        }
    }
}

/// `out-{page}.svg` becomes `out-3.svg`; `out.svg` becomes `out-3.svg`.
fn numbered(path: &Path, page: usize) -> PathBuf {
    let text = path.to_string_lossy();
    if text.contains("{page}") {
        return PathBuf::from(text.replace("{page}", &page.to_string()));
    }
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}-{page}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{page}"),
    };
    path.with_file_name(name)
}

fn write_file(path: &Path, svg: &SvgDocument) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    svg.write_to(&mut out)?;
    out.flush()
}

fn write_stdout(svg: &SvgDocument) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    svg.write_to(&mut out)?;
    writeln!(out)?;
    out.flush()
}
