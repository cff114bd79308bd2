use std::process;

use clap::Parser;
use fitsio_lazy::header::format_card;
use fitsio_lazy::{HduList, OpenOptions};
use tracing_subscriber::EnvFilter;

/// Summarize the HDUs of a FITS file, local or remote.
#[derive(Debug, Parser)]
#[command(name = "fitsinfo", version)]
struct Cli {
    /// Path or file://, http(s)://, s3:// URI.
    uri: String,

    /// Read headers only, even for local files.
    #[arg(long, conflicts_with = "eager")]
    lazy: bool,

    /// Load every data segment at open time, even for s3:// URIs.
    #[arg(long)]
    eager: bool,

    /// Also print every header card.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> fitsio_lazy::Result<OpenOptions> {
        let options = OpenOptions::from_env()?;
        Ok(match (self.lazy, self.eager) {
            (true, _) => options.lazy(true),
            (_, true) => options.lazy(false),
            _ => options,
        })
    }
}

fn format_headers(list: &HduList) -> String {
    let mut out = String::new();
    for hdu in list.iter() {
        out.push_str(&format!("\nHeader cards of HDU {}:\n", hdu.index()));
        for card in hdu.cards() {
            let image = format_card(card);
            out.push_str(String::from_utf8_lossy(&image).trim_end());
            out.push('\n');
        }
    }
    out
}

fn run(cli: &Cli) -> fitsio_lazy::Result<String> {
    let list = cli.options()?.open(&cli.uri)?;
    let mut out = list.info();
    if cli.verbose {
        out.push_str(&format_headers(&list));
    }
    Ok(out)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(output) => print!("{output}"),
        Err(e) => {
            eprintln!("fitsinfo: {}: {e}", cli.uri);
            process::exit(1);
        }
    }
}
