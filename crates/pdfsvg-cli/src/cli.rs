use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use pdfsvg::{CropBox, FontStrategy};

/// Convert PDF pages to SVG and inspect their fonts.
#[derive(Debug, Parser)]
#[command(name = "pdfsvg", about, version)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides it
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Convert PDF pages to SVG files
    Convert {
        /// Path to the PDF file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Page range (e.g. '1,3-5'), empty selects page 1. Default: all pages
        #[arg(long)]
        pages: Option<String>,

        /// Output file. With several pages, `{page}` is replaced by the
        /// page number, or `-N` is inserted before the extension.
        /// Default: stdout for a single page, `<FILE stem>-N.svg` otherwise
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Page box to crop to. Default: media box without a crop clip
        #[arg(long, value_enum)]
        crop: Option<CropArg>,

        /// Approximation precision for gradients and meshes
        #[arg(long, default_value_t = 2.0)]
        precision: f64,

        /// How text is rendered, depending on whether its font is installed
        #[arg(long, value_enum, default_value_t = FontStrategyArg::RenderMissing)]
        font_strategy: FontStrategyArg,

        /// Leave images out and keep only their geometry
        #[arg(long)]
        no_images: bool,
    },

    /// List the fonts used by the document
    Fonts {
        /// Path to the PDF file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t = TextFormat::Text)]
        format: TextFormat,
    },

    /// Show page count and page boxes
    Info {
        /// Path to the PDF file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Page range (e.g. '1,3-5'), empty selects page 1. Default: all pages
        #[arg(long)]
        pages: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = TextFormat::Text)]
        format: TextFormat,
    },
}

/// Output format for the fonts and info subcommands.
#[derive(Debug, Clone, ValueEnum)]
pub enum TextFormat {
    /// Human-readable text
    Text,
    /// JSON
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CropArg {
    Media,
    Crop,
    Trim,
    Bleed,
    Art,
}

impl From<CropArg> for CropBox {
    fn from(arg: CropArg) -> Self {
        match arg {
            CropArg::Media => CropBox::Media,
            CropArg::Crop => CropBox::Crop,
            CropArg::Trim => CropBox::Trim,
            CropArg::Bleed => CropBox::Bleed,
            CropArg::Art => CropBox::Art,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FontStrategyArg {
    /// Outline text whose font is not installed
    RenderMissing,
    /// Outline all text
    RenderAll,
    /// Name the closest installed font for missing fonts
    SubstituteMissing,
    /// Keep the PDF font name
    KeepMissing,
    /// Drop text whose font is not installed
    DeleteMissing,
    /// Drop all text
    DeleteAll,
}

impl From<FontStrategyArg> for FontStrategy {
    fn from(arg: FontStrategyArg) -> Self {
        match arg {
            FontStrategyArg::RenderMissing => FontStrategy::RenderMissing,
            FontStrategyArg::RenderAll => FontStrategy::RenderAll,
            FontStrategyArg::SubstituteMissing => FontStrategy::SubstituteMissing,
            FontStrategyArg::KeepMissing => FontStrategy::KeepMissing,
            FontStrategyArg::DeleteMissing => FontStrategy::DeleteMissing,
            FontStrategyArg::DeleteAll => FontStrategy::DeleteAll,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_defaults() {
        let cli = Cli::try_parse_from(["pdfsvg", "convert", "in.pdf"]).unwrap();
        match cli.command {
            Commands::Convert {
                file,
                pages,
                output,
                crop,
                precision,
                font_strategy,
                no_images,
            } => {
                assert_eq!(file, PathBuf::from("in.pdf"));
                assert!(pages.is_none() && output.is_none() && crop.is_none());
                assert_eq!(precision, 2.0);
                assert!(matches!(font_strategy, FontStrategyArg::RenderMissing));
                assert!(!no_images);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn convert_flags() {
        let cli = Cli::try_parse_from([
            "pdfsvg",
            "-vv",
            "convert",
            "in.pdf",
            "--pages",
            "1,3-5",
            "-o",
            "out.svg",
            "--crop",
            "trim",
            "--font-strategy",
            "substitute-missing",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Convert {
            pages,
            crop,
            font_strategy,
            ..
        } = cli.command
        else {
            panic!("expected convert");
        };
        assert_eq!(pages.as_deref(), Some("1,3-5"));
        assert!(matches!(crop.map(CropBox::from), Some(CropBox::Trim)));
        assert_eq!(FontStrategy::from(font_strategy), FontStrategy::SubstituteMissing);
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let args = ["pdfsvg", "convert", "in.pdf", "--font-strategy", "nope"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn fonts_json_format() {
        let cli = Cli::try_parse_from(["pdfsvg", "fonts", "in.pdf", "--format", "json"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Fonts {
                format: TextFormat::Json,
                ..
            }
        ));
    }
}
