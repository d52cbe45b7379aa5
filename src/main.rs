mod app;
mod db;
mod report;
mod utils;

use app::{App, Cli};
use clap::Parser;

fn main() {
    let cli = Cli::parse();
    let app = App::new(cli.config.as_deref());
    let code = app.run(cli.command);
    std::process::exit(code);
}
