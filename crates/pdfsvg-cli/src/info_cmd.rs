use std::path::Path;

use pdfsvg::PageBoxes;

use crate::cli::TextFormat;
use crate::shared::{format_rect, open_pdf, rect_to_json, resolve_pages};

fn page_json(page: usize, boxes: &PageBoxes) -> serde_json::Value {
    let mut value = serde_json::json!({
        "page": page,
        "width": boxes.media.width(),
        "height": boxes.media.height(),
        "rotation": boxes.rotate,
        "media_box": rect_to_json(&boxes.media),
    });
    for (key, rect) in [
        ("crop_box", boxes.crop),
        ("trim_box", boxes.trim),
        ("bleed_box", boxes.bleed),
        ("art_box", boxes.art),
    ] {
        if let Some(r) = rect {
            value[key] = rect_to_json(&r);
        }
    }
    value
}

fn print_page(page: usize, boxes: &PageBoxes) {
    println!("Page {page}:");
    println!("  Dimensions: {:.2} x {:.2}", boxes.media.width(), boxes.media.height());
    println!("  Rotation: {}", boxes.rotate);
    println!("  MediaBox: {}", format_rect(&boxes.media));
    for (label, rect) in [
        ("CropBox", boxes.crop),
        ("TrimBox", boxes.trim),
        ("BleedBox", boxes.bleed),
        ("ArtBox", boxes.art),
    ] {
        if let Some(r) = rect {
            println!("  {label}: {}", format_rect(&r));
        }
    }
}

pub fn run(file: &Path, pages: Option<&str>, format: &TextFormat) -> Result<(), i32> {
    let pdf = open_pdf(file, None)?;
    let page_count = pdf.page_count();
    let page_indices = resolve_pages(pages, page_count)?;

    let mut page_infos = Vec::new();
    if matches!(format, TextFormat::Text) {
        println!("Pages: {page_count}");
        println!("Fonts: {}", pdf.fonts().len());
    }
    for idx in page_indices {
        let boxes = pdf.page_boxes(idx).map_err(|e| {
            eprintln!("Error reading page {}: {e}", idx + 1);
            1
        })?;
        match format {
            TextFormat::Text => print_page(idx + 1, &boxes),
            TextFormat::Json => page_infos.push(page_json(idx + 1, &boxes)),
        }
    }

    if matches!(format, TextFormat::Json) {
        let out = serde_json::json!({
            "pages": page_count,
            "fonts": pdf.fonts().len(),
            "page_info": page_infos,
        });
        println!("{}", serde_json::to_string_pretty(&out).unwrap_or_default());
    }
    Ok(())
}
