//! CLI binary for img2any.
//!
//! A thin shim over the library's codec dispatch for one-shot local
//! conversions — handy for smoke-testing the format table without wiring a
//! chat transport.

use anyhow::{bail, Context, Result};
use clap::Parser;
use img2any::{convert, ImageFormat, TargetFormat};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a PNG to JPEG (output path inferred: photo.jpeg)
  img2any photo.png --to jpeg

  # Explicit output path and JPEG quality
  img2any scan.bmp --to jpeg -o scan_small.jpeg --jpeg-quality 75

  # Source format normally comes from the input extension; override it
  # when the file is misnamed
  img2any download.bin --from gif --to png -o out.png

  # SVG has no encoder; the conversion is downgraded to PNG and says so
  img2any logo.png --to svg

  # List the supported formats
  img2any --list-formats

ENVIRONMENT VARIABLES:
  RUST_LOG    Log filter, e.g. RUST_LOG=img2any=debug
"#;

/// Convert an image file between raster formats.
#[derive(Parser, Debug)]
#[command(
    name = "img2any",
    version,
    about = "Convert an image file between PNG, JPEG, GIF, and BMP",
    after_help = AFTER_HELP
)]
struct Cli {
    /// Input image file.
    #[arg(required_unless_present = "list_formats")]
    input: Option<PathBuf>,

    /// Target format token (png, jpeg, gif, bmp, svg).
    #[arg(long, short = 't', required_unless_present = "list_formats")]
    to: Option<String>,

    /// Source format token; inferred from the input extension when omitted.
    #[arg(long, short = 'f')]
    from: Option<String>,

    /// Output path; defaults to the input path with the produced extension.
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// JPEG encoder quality (1-100).
    #[arg(long, default_value_t = 90, env = "IMG2ANY_JPEG_QUALITY")]
    jpeg_quality: u8,

    /// List supported source and target formats, then exit.
    #[arg(long)]
    list_formats: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.list_formats {
        println!("Source formats: png, jpeg, gif, bmp");
        println!("Target formats:");
        for t in TargetFormat::ALL {
            let (produced, downgraded) = t.resolve();
            if downgraded {
                println!("  {:<5} (served as {})", t.token(), produced.extension());
            } else {
                println!("  {}", t.token());
            }
        }
        return Ok(());
    }

    // Presence enforced by clap when not --list-formats.
    let input = cli.input.expect("input is required");
    let to = cli.to.expect("--to is required");

    let target = match TargetFormat::from_token(&to) {
        Some(t) => t,
        None => bail!("unknown target format '{to}' (try --list-formats)"),
    };

    let source = match &cli.from {
        Some(token) => source_from_token(token)?,
        None => source_from_extension(&input)?,
    };

    if cli.jpeg_quality == 0 || cli.jpeg_quality > 100 {
        bail!("--jpeg-quality must be 1-100, got {}", cli.jpeg_quality);
    }

    let bytes = std::fs::read(&input)
        .with_context(|| format!("failed to read '{}'", input.display()))?;

    let converted = convert(&bytes, source, target, cli.jpeg_quality)?;

    if converted.downgraded {
        eprintln!(
            "note: no {} encoder available — produced {} instead",
            target.token(),
            converted.produced.extension()
        );
    }

    let output = cli.output.unwrap_or_else(|| {
        input.with_extension(converted.produced.extension())
    });
    std::fs::write(&output, &converted.bytes)
        .with_context(|| format!("failed to write '{}'", output.display()))?;

    eprintln!(
        "{} -> {} ({} bytes)",
        input.display(),
        output.display(),
        converted.bytes.len()
    );
    Ok(())
}

/// Parse a source-format token (a target token that is directly encodable).
fn source_from_token(token: &str) -> Result<ImageFormat> {
    match TargetFormat::from_token(token).map(|t| t.resolve()) {
        Some((format, false)) => Ok(format),
        Some((_, true)) => bail!("'{token}' cannot be a source format"),
        None => bail!("unknown source format '{token}' (try --list-formats)"),
    }
}

/// Infer the source format from the input file extension.
fn source_from_extension(path: &std::path::Path) -> Result<ImageFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Ok(ImageFormat::Png),
        "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
        "gif" => Ok(ImageFormat::Gif),
        "bmp" => Ok(ImageFormat::Bmp),
        _ => bail!(
            "cannot infer source format from '{}'; pass --from",
            path.display()
        ),
    }
}
