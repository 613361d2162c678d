use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "reelkit", version)]
#[command(about = "Render a promotional slideshow MP4 from a spreadsheet and product images")]
struct Cli {
    /// Run configuration JSON.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Increase log verbosity (-v: debug, -vv: trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let cfg = reelkit::Config::load(&cli.config)?;
    let report = reelkit::run(&cfg)?;

    eprintln!(
        "wrote {} ({} slides, {} frames, {:.2}s)",
        report.output_path.display(),
        report.slides,
        report.total_frames,
        report.duration_seconds
    );
    Ok(())
}
