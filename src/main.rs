mod app;

use std::path::PathBuf;

use clap::Parser;
use linkchart::LayoutMode;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Graph file: JSON object with `nodes` and `edges` arrays.
    #[arg(long)]
    graph: PathBuf,

    /// Engine configuration overrides as JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding `<type>.svg` icons.
    #[arg(long)]
    icons: Option<PathBuf>,

    /// Initial layout: grid, force or hierarchy.
    #[arg(long)]
    layout: Option<LayoutMode>,
}

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    let launch = app::Launch {
        graph_path: args.graph,
        config_path: args.config,
        icon_dir: args.icons,
        layout: args.layout,
    };
    eframe::run_native(
        "linkchart",
        options,
        Box::new(move |cc| Ok(Box::new(app::LinkChartApp::new(cc, launch)))),
    )
}
