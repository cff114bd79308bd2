use std::fmt::Write as _;
use std::process;

use clap::Parser;
use fitsio_lazy::{cutout_2d, Array, CutoutMode, Hdu, HduList, IndexExpr, OpenOptions};
use tracing_subscriber::EnvFilter;

/// Print a sub-array of a FITS image, reading only the bytes it needs.
#[derive(Debug, Parser)]
#[command(name = "fitscut", version)]
struct Cli {
    /// Path or file://, http(s)://, s3:// URI.
    uri: String,

    /// NumPy-style index, e.g. "10:20, ::2" or "..., 0". Omitted, the
    /// whole image is printed.
    #[arg(allow_hyphen_values = true)]
    index: Option<String>,

    /// HDU number or EXTNAME.
    #[arg(long, default_value = "0")]
    hdu: String,

    /// Cut a window centred on pixel X,Y instead of indexing.
    #[arg(long, value_name = "X,Y", value_parser = parse_pair::<f64>, requires = "size")]
    center: Option<(f64, f64)>,

    /// Cutout size as NY,NX.
    #[arg(long, value_name = "NY,NX", value_parser = parse_pair::<usize>)]
    size: Option<(usize, usize)>,

    /// Fail instead of trimming when the window crosses the image edge.
    #[arg(long)]
    strict: bool,

    /// Print only the shape and element type.
    #[arg(long)]
    shape_only: bool,
}

fn parse_pair<T: std::str::FromStr>(s: &str) -> Result<(T, T), String> {
    let (a, b) = s
        .split_once(',')
        .ok_or_else(|| format!("expected two comma-separated values, got {s:?}"))?;
    let parse = |v: &str| v.trim().parse::<T>().map_err(|_| format!("invalid value {v:?}"));
    Ok((parse(a)?, parse(b)?))
}

fn select<'a>(list: &'a HduList, hdu: &str) -> fitsio_lazy::Result<Hdu<'a>> {
    match hdu.parse::<usize>() {
        Ok(index) => list.hdu(index),
        Err(_) => list.by_name(hdu),
    }
}

fn render(array: &Array, shape_only: bool) -> String {
    let mut out = format!("shape: {:?}\ndtype: {}\n", array.shape(), array.dtype_name());
    if shape_only {
        return out;
    }
    let values = array.to_f64_vec();
    let width = array.shape().last().copied().unwrap_or(1).max(1);
    for row in values.chunks(width) {
        let line: Vec<String> = row.iter().map(|v| format!("{v}")).collect();
        let _ = writeln!(out, "{}", line.join(" "));
    }
    out
}

fn run(cli: &Cli) -> fitsio_lazy::Result<String> {
    // Only the selected bytes are wanted, so default to lazy regardless of
    // the location unless the environment says otherwise.
    let mut options = OpenOptions::from_env()?;
    if std::env::var_os("FITSIO_LAZY_MODE").is_none() {
        options = options.lazy(true);
    }
    let list = options.open(&cli.uri)?;
    let hdu = select(&list, &cli.hdu)?;
    let section = hdu.section()?;

    let array = match (cli.center, cli.size) {
        (Some(center), Some(size)) => {
            let mode = if cli.strict {
                CutoutMode::Strict
            } else {
                CutoutMode::Trim
            };
            cutout_2d(&section, center, size, mode)?.data
        }
        _ => {
            let expr = match &cli.index {
                Some(text) => text.parse::<IndexExpr>()?,
                None => IndexExpr::all(),
            };
            section.get(&expr)?
        }
    };
    tracing::info!(
        hdu = hdu.index(),
        fetched = hdu.fetched_bytes(),
        "cut {:?}",
        array.shape()
    );
    Ok(render(&array, cli.shape_only))
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
            eprintln!("fitscut: {}: {e}", cli.uri);
            process::exit(1);
        }
    }
}
