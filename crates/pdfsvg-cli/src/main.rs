mod cli;
mod convert_cmd;
mod fonts_cmd;
mod info_cmd;
mod shared;

use std::io::IsTerminal;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        cli::Commands::Convert {
            ref file,
            ref pages,
            ref output,
            crop,
            precision,
            font_strategy,
            no_images,
        } => convert_cmd::run(&convert_cmd::ConvertArgs {
            file,
            pages: pages.as_deref(),
            output: output.as_deref(),
            crop: crop.map(Into::into),
            precision,
            font_strategy: font_strategy.into(),
            embed_images: !no_images,
        }),
        cli::Commands::Fonts { ref file, ref format } => fonts_cmd::run(file, format),
        cli::Commands::Info {
            ref file,
            ref pages,
            ref format,
        } => info_cmd::run(file, pages.as_deref(), format),
    };

    if let Err(code) = result {
        std::process::exit(code);
    }
}
