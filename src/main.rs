use clap::Parser;

use synth2yolo::config::{Cli, Command};
use synth2yolo::diagnostics::Diagnostics;
use synth2yolo::draw::{load_font, run_draw};
use synth2yolo::split::run_split;
use synth2yolo::synth::run_generate;
use synth2yolo::train::run_train;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Generate(args) => {
            let diagnostics = Diagnostics::new(args.diagnostics);
            let stats = run_generate(&args, &diagnostics)?;
            stats.print_summary();
        }
        Command::Split(args) => {
            let stats = run_split(&args)?;
            stats.print_summary();
        }
        Command::Draw(args) => {
            let font = match &args.font {
                Some(path) => Some(load_font(path)?),
                None => None,
            };
            let stats = run_draw(&args.image, &args.labels, &args.output, font.as_ref())?;
            log::info!(
                "Drew {} boxes ({} malformed lines skipped)",
                stats.boxes_drawn,
                stats.malformed_lines
            );
        }
        #[cfg(feature = "video")]
        Command::Frames(args) => {
            let diagnostics = Diagnostics::new(args.diagnostics);
            let stats = synth2yolo::frames::run_frames(&args, &diagnostics)?;
            log::info!(
                "Extracted {} frames from {} videos ({} failed)",
                stats.frames_written,
                stats.videos_processed,
                stats.videos_failed
            );
        }
        Command::Train(args) => {
            run_train(&args)?;
        }
    }
    Ok(())
}
