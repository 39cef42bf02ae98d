use std::path::PathBuf;

use clap::Parser;

/// Command-line flags. Anything given here overrides the config file.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Address to listen on, e.g. 127.0.0.1:3000
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Path to a JSON config file (defaults to <config dir>/filebridge/config.json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory with the browser UI, served at /
    #[arg(short = 's', long = "static-dir")]
    pub static_dir: Option<PathBuf>,
}
