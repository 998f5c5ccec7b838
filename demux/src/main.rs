//! A CLI tool for inspecting the pixel data of a DICOM file
//! and extracting its encapsulated payload stream.
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use clap::Parser;
use dicm_object::{DicmFile, OpenFileOptions, PixelDataLayout, ReadPreamble, WriteFragments};
use snafu::{Report, ResultExt, Whatever};
use tracing::{error, info, Level};

/// Exit code for when an error emerged while reading the DICOM file.
const ERROR_READ: i32 = -2;
/// Exit code for when an error emerged while writing the payload.
const ERROR_WRITE: i32 = -3;

/// Delimit the pixel data of a DICOM file
/// and extract its encapsulated payload
#[derive(Debug, Parser)]
#[command(version)]
struct App {
    /// Path to the DICOM file to read
    file: PathBuf,

    /// Path to write the fragment bytes to
    #[arg(short = 'o', long = "out")]
    output: Option<PathBuf>,

    /// Only write the first fragment
    #[arg(long = "first-only", requires = "output")]
    first_only: bool,

    /// Maximum nesting depth of sequences, items and encapsulated pixel data
    #[arg(long = "max-depth", default_value = "64")]
    max_depth: u32,

    /// The file has no 128-byte preamble before the magic code
    #[arg(long = "no-preamble")]
    no_preamble: bool,

    /// Print more information while reading the file
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() {
    let App {
        file,
        output,
        first_only,
        max_depth,
        no_preamble,
        verbose,
    } = App::parse();

    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
            .finish(),
    )
    .whatever_context("Could not set up global logging subscriber")
    .unwrap_or_else(|e: Whatever| {
        eprintln!("[ERROR] {}", Report::from_error(e));
    });

    let options = OpenFileOptions::new()
        .read_preamble(if no_preamble {
            ReadPreamble::Never
        } else {
            ReadPreamble::Auto
        })
        .max_depth(max_depth);

    let obj = match output {
        None => options.open_file(&file).unwrap_or_else(|e| {
            error!("{}", Report::from_error(e));
            std::process::exit(ERROR_READ);
        }),
        Some(output) => {
            let out = File::create(&output).unwrap_or_else(|e| {
                error!(
                    "Could not create '{}': {}",
                    output.display(),
                    Report::from_error(e)
                );
                std::process::exit(ERROR_WRITE);
            });
            let mut sink = WriteFragments::new(BufWriter::new(out)).first_only(first_only);
            let obj = options
                .open_file_with_sink(&file, &mut sink)
                .unwrap_or_else(|e| {
                    let code = if sink.write_failed() {
                        ERROR_WRITE
                    } else {
                        ERROR_READ
                    };
                    error!("{}", Report::from_error(e));
                    std::process::exit(code);
                });
            let written = sink.bytes_written();
            sink.into_inner().unwrap_or_else(|e| {
                error!(
                    "Could not write to '{}': {}",
                    output.display(),
                    Report::from_error(e)
                );
                std::process::exit(ERROR_WRITE);
            });
            info!("{} bytes written to {}", written, output.display());
            obj
        }
    };

    report(&obj);
}

fn report(obj: &DicmFile) {
    println!("File meta group length: {}", obj.meta_group_length);

    let (header, layout) = match (&obj.pixel_data_header, &obj.pixel_data) {
        (Some(header), Some(layout)) => (header, layout),
        _ => {
            println!("No pixel data");
            return;
        }
    };

    let vr = header
        .vr
        .map(|vr| vr.to_string())
        .unwrap_or_else(|| "--".to_string());
    match layout {
        PixelDataLayout::Native { offset, length } => {
            println!(
                "Native pixel data ({}) at position {}, {} bytes",
                vr, offset, length
            );
        }
        PixelDataLayout::Encapsulated {
            offset_table,
            fragments,
            total_length,
        } => {
            println!(
                "Encapsulated pixel data ({}), {} bytes in total",
                vr, total_length
            );
            if let Some(offset_table) = offset_table {
                println!(
                    "  Basic offset table at position {}, {} bytes",
                    offset_table.position, offset_table.len
                );
            }
            for fragment in fragments {
                println!(
                    "  Fragment #{} at position {}, {} bytes",
                    fragment.index, fragment.position, fragment.len
                );
            }
            match layout.first_fragment() {
                Some(first) => println!(
                    "Payload stream starts at position {}, {} bytes over {} fragment(s)",
                    first.position,
                    layout.payload_length(),
                    fragments.len()
                ),
                None => println!("No payload fragments"),
            }
        }
    }
}
