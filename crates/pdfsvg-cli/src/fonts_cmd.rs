use std::path::Path;

use pdfsvg::{FontFallback, FontReport, font_reports, font_reports_json};

use crate::cli::TextFormat;
use crate::shared::open_pdf;

fn fallback_str(fallback: FontFallback) -> &'static str {
    match fallback {
        FontFallback::AsVectorShapes => "shapes",
        FontFallback::AsTextKeepOriginalName => "text",
        FontFallback::AsTextSubstitute => "substitute",
        FontFallback::DeleteText => "delete",
    }
}

fn pages_str(pages: &[u32]) -> String {
    pages.iter().map(u32::to_string).collect::<Vec<_>>().join(",")
}

fn text_line(font: &FontReport) -> String {
    let mut line = format!("{:<10} {:<32} {:<10}", font.id, font.name, font.subtype);
    line.push_str(if font.embedded { " embedded" } else { " external" });
    line.push_str(if font.found { " found   " } else { " missing " });
    let fallback = fallback_str(font.fallback);
    line.push_str(&format!(" {fallback:<10} pages {}", pages_str(&font.pages)));
    if font.found {
        line.push_str(&format!(" family '{}'", font.family));
    }
    line
}

pub fn run(file: &Path, format: &TextFormat) -> Result<(), i32> {
    let pdf = open_pdf(file, None)?;
    let reports = font_reports(pdf.fonts(), pdf.font_strategies());

    match format {
        TextFormat::Text => {
            if reports.is_empty() {
                println!("No fonts.");
            }
            for font in &reports {
                println!("{}", text_line(font));
            }
        }
        TextFormat::Json => {
            let json = font_reports_json(&reports).map_err(|e| {
                eprintln!("Error: failed to serialize fonts: {e}");
                1
            })?;
            println!("{json}");
        }
    }
    Ok(())
}
