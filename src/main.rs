use clap::{Parser, Subcommand};
use lfp_reader::{logger, Capability, LfpFile, LfpReader, PictureModel};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "lfp", about = "Inspect LFP light-field picture and storage files")]
struct Cli {
    /// Log container parsing at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the metadata JSON and list data chunks
    Info {
        input: PathBuf,
    },
    /// Write the content of one data chunk to stdout
    Chunk {
        input: PathBuf,
        sha1:  String,
    },
    /// Show the frame, refocus stack and parallax stack of a picture
    Picture {
        input: PathBuf,
    },
    /// Pick the refocus image in focus at a normalized position
    Focus {
        input: PathBuf,
        /// Horizontal position in [0, 1)
        fx:    f64,
        /// Vertical position in [0, 1)
        fy:    f64,
    },
    /// Pick the parallax image nearest a normalized viewpoint
    Parallax {
        input: PathBuf,
        /// Horizontal viewpoint in [0, 1]
        fx:    f64,
        /// Vertical viewpoint in [0, 1]
        fy:    f64,
    },
    /// List the files embedded in a storage file
    Storage {
        input: PathBuf,
    },
    /// Write one embedded storage file to stdout
    Extract {
        input: PathBuf,
        /// Embedded path, e.g. 'C:\T1CALIB\MOD_0000.RAW'
        path:  String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init(cli.verbose);
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let mut lfp = open_generic(&input)?;
            let meta = serde_json::to_string_pretty(lfp.meta_content()?)?;
            println!("Metadata: {meta}");
            println!();
            let chunks = lfp.chunks_sorted();
            println!("Data Chunks: {} [", chunks.len());
            for chunk in chunks {
                println!("{:>12}\t{}", chunk.size, chunk.sha1.as_deref().unwrap_or_default());
            }
            println!("]");
        }

        // ── Chunk ────────────────────────────────────────────────────────────
        Commands::Chunk { input, sha1 } => {
            let mut lfp = open_generic(&input)?;
            std::io::stdout().lock().write_all(lfp.chunk_data(&sha1)?)?;
        }

        // ── Picture ──────────────────────────────────────────────────────────
        Commands::Picture { input } => {
            let lfp = LfpFile::open_picture(&input)?;
            print_picture(lfp.picture()?);
        }

        // ── Focus ────────────────────────────────────────────────────────────
        Commands::Focus { input, fx, fy } => {
            let lfp = LfpFile::open_picture(&input)?;
            let picture = lfp.picture()?;
            let (i, j) = picture.refocus_stack()?.cell_at(fx, fy)?;
            let image = picture.find_by_position(fx, fy)?;
            println!("cell ({i}, {j}) -> image {} lambda {:.6} ({}x{} {})",
                image.id, image.lambda, image.width, image.height, image.representation);
        }

        // ── Parallax ─────────────────────────────────────────────────────────
        Commands::Parallax { input, fx, fy } => {
            let lfp = LfpFile::open_picture(&input)?;
            let image = lfp.picture()?.find_by_viewpoint(fx, fy)?;
            println!("viewpoint ({fx}, {fy}) -> image {} at ({:.4}, {:.4})",
                image.id, image.coord.0, image.coord.1);
        }

        // ── Storage ──────────────────────────────────────────────────────────
        Commands::Storage { input } => {
            let lfp = LfpFile::open_storage(&input)?;
            for (path, chunk) in lfp.storage()?.files_sorted() {
                println!("{:>12}\t{}", chunk.size, path);
            }
        }

        // ── Extract ──────────────────────────────────────────────────────────
        Commands::Extract { input, path } => {
            let mut lfp = LfpFile::open_storage(&input)?;
            std::io::stdout().lock().write_all(lfp.file_data(&path)?)?;
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

/// Frame the container without building a model, so chunk-level commands
/// work on any file whose sections are valid.
fn open_generic(path: &PathBuf) -> lfp_reader::Result<LfpReader<BufReader<File>>> {
    let mut reader = LfpReader::new(BufReader::new(File::open(path)?))?;
    reader.load()?;
    Ok(reader)
}

fn print_picture(picture: &PictureModel) {
    if let Some(v) = picture.version() {
        println!("Version: {}.{} ({})", v.major, v.minor,
            v.provisional_date.as_deref().unwrap_or("-"));
    }

    println!();
    println!("Frame:");
    match &picture.frame {
        Some(frame) => {
            println!("\t{:<20}\t{:>12}", "metadata:", frame.metadata.size);
            println!("\t{:<20}\t{:>12}", "image:", frame.image.size);
            println!("\t{:<20}\t{:>12}", "private_metadata:", frame.private_metadata.size);
        }
        None => println!("\tNone"),
    }

    println!();
    println!("Refocus-Stack:");
    match &picture.refocus_stack {
        Capability::Present(stack) => {
            let lut = &stack.depth_lut;
            println!("\t{:<20}\t{:>12}", "images:", stack.images.len());
            println!("\t{:<20}\t{:>12}", "depth_lut:", format!("{}x{}", lut.width, lut.height));
            println!("\t{:<20}\t{:>12.4}", "default_lambda:", stack.default_lambda);
            println!("\t{:<20}\t{:>12.4}", "min_lambda:", stack.min_lambda);
            println!("\t{:<20}\t{:>12.4}", "max_lambda:", stack.max_lambda);
            if let Some((lo, hi)) = lut.range() {
                println!("\t{:<20}\t{:>12}", "depth_range:", format!("{lo:.4}..{hi:.4}"));
            }
            println!("\t{:<20}\t{:>12}", "width:", stack.width);
            println!("\t{:<20}\t{:>12}", "height:", stack.height);
            println!();
            println!("\tDepth Table:");
            for line in lut.to_text().lines() {
                println!("\t\t{line}");
            }
        }
        Capability::Absent => println!("\tNone"),
        Capability::Unavailable(why) => println!("\tUnavailable: {why}"),
        Capability::Invalid(why) => println!("\tInvalid: {why}"),
    }

    println!();
    println!("Parallax-Stack:");
    match &picture.parallax_stack {
        Capability::Present(stack) => {
            println!("\t{:<20}\t{:>12}", "images:", stack.images.len());
            println!("\t{:<20}\t{:>12.4}", "viewpoint_width:", stack.viewpoint_width);
            println!("\t{:<20}\t{:>12.4}", "viewpoint_height:", stack.viewpoint_height);
            println!("\t{:<20}\t{:>12}", "width:", stack.width);
            println!("\t{:<20}\t{:>12}", "height:", stack.height);
        }
        Capability::Absent => println!("\tNone"),
        Capability::Unavailable(why) => println!("\tUnavailable: {why}"),
        Capability::Invalid(why) => println!("\tInvalid: {why}"),
    }
}
