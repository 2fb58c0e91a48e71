//! Labelport: a conversion and hygiene toolkit for annotation datasets.
//!
//! Labelport converts between object-detection and instance-segmentation
//! annotation formats (YOLO, YOLO-seg, Pascal VOC, simple JSON, COCO,
//! write-only TFRecord) through a single intermediate representation (IR):
//! N formats need 2N codecs instead of N squared converters. Around the
//! conversion core it provides the dataset hygiene operations a training
//! pipeline needs: validation, repair, train/val/test splitting, statistics,
//! and annotation-space augmentation.
//!
//! # Modules
//!
//! - [`ir`]: Intermediate representation types and per-format codecs
//! - [`conversion`]: Format dispatch and lossiness reporting
//! - [`validation`]: Dataset validation and error reporting
//! - [`fix`]: Geometry repair pass
//! - [`split`]: Train/val/test partitioning
//! - [`stats`]: Dataset statistics
//! - [`augment`]: Annotation-space geometric augmentation
//! - [`compare`]: Side-by-side dataset comparison
//! - [`error`]: Error types for labelport operations

pub mod augment;
pub mod compare;
pub mod conversion;
pub mod error;
pub mod fix;
pub mod ir;
pub mod split;
pub mod stats;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use conversion::Format;
pub use error::LabelportError;

/// The labelport CLI application.
#[derive(Parser)]
#[command(name = "labelport")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Convert a dataset between annotation formats.
    Convert(ConvertArgs),
    /// Validate a dataset for errors and warnings.
    Validate(ValidateArgs),
    /// Repair dataset geometry (clamp or drop invalid boxes and polygons).
    Fix(FixArgs),
    /// Partition a dataset into train/val/test subsets.
    Split(SplitArgs),
    /// Print dataset statistics.
    Stats(StatsArgs),
    /// Apply annotation-space geometric augmentation.
    Augment(AugmentArgs),
    /// Compare two datasets by images, labels and annotation counts.
    Compare(CompareArgs),
    /// Export a dataset as TFRecord with a label map.
    ExportTfrecord(ExportTfrecordArgs),
}

/// Arguments for the convert subcommand.
#[derive(clap::Args)]
struct ConvertArgs {
    /// Input dataset (file or directory, depending on format).
    #[arg(short, long)]
    input: PathBuf,

    /// Input format.
    #[arg(short, long)]
    from: String,

    /// Output path (file or directory, depending on format).
    #[arg(short, long)]
    output: PathBuf,

    /// Output format.
    #[arg(short, long)]
    to: String,

    /// Proceed even when the conversion loses information.
    #[arg(long)]
    allow_lossy: bool,

    /// Output format for the conversion report ('text' or 'json').
    #[arg(long, default_value = "text")]
    report: String,
}

/// Arguments for the validate subcommand.
#[derive(clap::Args)]
struct ValidateArgs {
    /// Input dataset to validate.
    input: PathBuf,

    /// Input format.
    #[arg(long, default_value = "ir-json")]
    format: String,

    /// Treat warnings as errors (exit non-zero if any warnings).
    #[arg(long)]
    strict: bool,

    /// Output format for the report ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Arguments for the fix subcommand.
#[derive(clap::Args)]
struct FixArgs {
    /// Input dataset.
    #[arg(short, long)]
    input: PathBuf,

    /// Input format (also used for the repaired output).
    #[arg(short, long)]
    format: String,

    /// Output path for the repaired dataset.
    #[arg(short, long)]
    output: PathBuf,

    /// Drop boxes below this normalized area (box area / image area).
    #[arg(long)]
    min_area: Option<f64>,
}

/// Arguments for the split subcommand.
#[derive(clap::Args)]
struct SplitArgs {
    /// Input dataset.
    #[arg(short, long)]
    input: PathBuf,

    /// Input format (subsets are written in the same format).
    #[arg(short, long)]
    format: String,

    /// Output directory; subsets land in train/, val/ and test/ below it.
    #[arg(short, long)]
    output: PathBuf,

    /// Fraction of images for the training subset.
    #[arg(long, default_value_t = 0.7)]
    train: f64,

    /// Fraction of images for the validation subset.
    #[arg(long, default_value_t = 0.2)]
    val: f64,

    /// Fraction of images for the test subset.
    #[arg(long, default_value_t = 0.1)]
    test: f64,

    /// RNG seed for a reproducible shuffle.
    #[arg(long)]
    seed: Option<u64>,
}

/// Arguments for the stats subcommand.
#[derive(clap::Args)]
struct StatsArgs {
    /// Input dataset.
    input: PathBuf,

    /// Input format.
    #[arg(long, default_value = "ir-json")]
    format: String,

    /// Number of top labels to show in the histogram.
    #[arg(long, default_value_t = 10)]
    top: usize,

    /// Output format for the report ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Arguments for the augment subcommand.
#[derive(clap::Args)]
struct AugmentArgs {
    /// Input dataset.
    #[arg(short, long)]
    input: PathBuf,

    /// Input format (also used for the augmented output).
    #[arg(short, long)]
    format: String,

    /// Output path for the augmented dataset.
    #[arg(short, long)]
    output: PathBuf,

    /// Mirror annotations horizontally.
    #[arg(long)]
    hflip: bool,

    /// Mirror annotations vertically.
    #[arg(long)]
    vflip: bool,

    /// Rotate by whole degrees about the image center.
    #[arg(long, default_value_t = 0)]
    rotate: i32,

    /// Crop to this fraction of each dimension at a random offset.
    #[arg(long, default_value_t = 1.0)]
    crop_ratio: f64,

    /// Scale coordinates and dimensions uniformly.
    #[arg(long, default_value_t = 1.0)]
    scale_ratio: f64,

    /// Generate 2x2 mosaic composites.
    #[arg(long)]
    mosaic: bool,

    /// Generate mixup composites.
    #[arg(long)]
    mixup: bool,

    /// Blend factor recorded on mixup composites.
    #[arg(long, default_value_t = 0.5)]
    mixup_alpha: f64,

    /// RNG seed for reproducible crops and composite picks.
    #[arg(long)]
    seed: Option<u64>,
}

/// Arguments for the compare subcommand.
#[derive(clap::Args)]
struct CompareArgs {
    /// Left-hand dataset.
    left: PathBuf,

    /// Right-hand dataset.
    right: PathBuf,

    /// Format of both datasets.
    #[arg(long, default_value = "ir-json")]
    format: String,

    /// How many side-only file names to list.
    #[arg(long, default_value_t = 10)]
    max_listed: usize,

    /// Output format for the report ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Arguments for the export-tfrecord subcommand.
#[derive(clap::Args)]
struct ExportTfrecordArgs {
    /// Input dataset.
    #[arg(short, long)]
    input: PathBuf,

    /// Input format.
    #[arg(short, long)]
    format: String,

    /// Output directory for dataset.tfrecord and label_map.json.
    #[arg(short, long)]
    output: PathBuf,

    /// Directory holding the image files to embed in the records.
    #[arg(long)]
    images_dir: Option<PathBuf>,
}

/// Run the labelport CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), LabelportError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Convert(args)) => run_convert(args),
        Some(Commands::Validate(args)) => run_validate(args),
        Some(Commands::Fix(args)) => run_fix(args),
        Some(Commands::Split(args)) => run_split(args),
        Some(Commands::Stats(args)) => run_stats(args),
        Some(Commands::Augment(args)) => run_augment(args),
        Some(Commands::Compare(args)) => run_compare(args),
        Some(Commands::ExportTfrecord(args)) => run_export_tfrecord(args),
        None => {
            println!("labelport {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Annotation dataset converter and hygiene toolkit.");
            println!();
            println!("Run 'labelport --help' for usage information.");
            Ok(())
        }
    }
}

/// Execute the convert subcommand.
fn run_convert(args: ConvertArgs) -> Result<(), LabelportError> {
    let from: Format = args.from.parse()?;
    let to: Format = args.to.parse()?;

    let dataset = conversion::read_dataset(from, &args.input)?;

    let report = conversion::build_conversion_report(&dataset, from, to);

    if report.is_lossy() && !args.allow_lossy {
        return Err(LabelportError::LossyConversionRefused {
            from: from.name().to_string(),
            to: to.name().to_string(),
            summary: report.lossy_messages().collect::<Vec<_>>().join("; "),
        });
    }

    conversion::write_dataset(to, &args.output, &dataset)?;

    match args.report.as_str() {
        "json" => print_json(&report)?,
        _ => print!("{}", report),
    }

    Ok(())
}

/// Execute the validate subcommand.
fn run_validate(args: ValidateArgs) -> Result<(), LabelportError> {
    let format: Format = args.format.parse()?;
    let dataset = conversion::read_dataset(format, &args.input)?;

    let opts = validation::ValidateOptions {
        strict: args.strict,
    };
    let report = validation::validate_dataset(&dataset, &opts);

    match args.output.as_str() {
        "json" => {
            #[derive(serde::Serialize)]
            struct JsonReport<'a> {
                error_count: usize,
                warning_count: usize,
                issues: &'a [validation::ValidationIssue],
            }
            print_json(&JsonReport {
                error_count: report.error_count(),
                warning_count: report.warning_count(),
                issues: &report.issues,
            })?;
        }
        _ => print!("{}", report),
    }

    let has_errors = report.error_count() > 0;
    let has_warnings = report.warning_count() > 0;

    if has_errors || (args.strict && has_warnings) {
        Err(LabelportError::ValidationFailed {
            error_count: report.error_count(),
            warning_count: report.warning_count(),
            report,
        })
    } else {
        Ok(())
    }
}

/// Execute the fix subcommand.
fn run_fix(args: FixArgs) -> Result<(), LabelportError> {
    let format: Format = args.format.parse()?;
    let dataset = conversion::read_dataset(format, &args.input)?;

    let opts = fix::FixOptions {
        min_area: args.min_area,
    };
    let (fixed, report) = fix::fix_dataset(&dataset, &opts)?;

    conversion::write_dataset(format, &args.output, &fixed)?;
    print!("{}", report);
    Ok(())
}

/// Execute the split subcommand.
fn run_split(args: SplitArgs) -> Result<(), LabelportError> {
    let format: Format = args.format.parse()?;
    let dataset = conversion::read_dataset(format, &args.input)?;

    let opts = split::SplitOptions {
        train: args.train,
        val: args.val,
        test: args.test,
        seed: args.seed,
    };
    let result = split::split_dataset(&dataset, &opts)?;

    for (name, subset) in [
        ("train", &result.train),
        ("val", &result.val),
        ("test", &result.test),
    ] {
        let subset_dir = args.output.join(name);
        fs::create_dir_all(&subset_dir)?;
        conversion::write_dataset(format, &subset_output_path(&subset_dir, format), subset)?;
    }

    let (train, val, test) = result.counts();
    println!(
        "Split {} image(s): {} train, {} val, {} test",
        dataset.images.len(),
        train,
        val,
        test
    );
    Ok(())
}

/// Execute the stats subcommand.
fn run_stats(args: StatsArgs) -> Result<(), LabelportError> {
    let format: Format = args.format.parse()?;
    let dataset = conversion::read_dataset(format, &args.input)?;

    let opts = stats::StatsOptions {
        top_labels: args.top,
        ..Default::default()
    };
    let report = stats::stats_dataset(&dataset, &opts);

    match args.output.as_str() {
        "json" => print_json(&report)?,
        _ => print!("{}", report),
    }
    Ok(())
}

/// Execute the augment subcommand.
fn run_augment(args: AugmentArgs) -> Result<(), LabelportError> {
    let format: Format = args.format.parse()?;
    let dataset = conversion::read_dataset(format, &args.input)?;

    let opts = augment::AugmentOptions {
        hflip: args.hflip,
        vflip: args.vflip,
        rotate_deg: args.rotate,
        crop_ratio: args.crop_ratio,
        scale_ratio: args.scale_ratio,
        mosaic: args.mosaic,
        mixup: args.mixup,
        mixup_alpha: args.mixup_alpha,
        seed: args.seed,
    };
    let augmented = augment::augment_dataset(&dataset, &opts)?;

    conversion::write_dataset(format, &args.output, &augmented)?;
    println!(
        "Augmented {} image(s) into {} image(s)",
        dataset.images.len(),
        augmented.images.len()
    );
    Ok(())
}

/// Execute the compare subcommand.
fn run_compare(args: CompareArgs) -> Result<(), LabelportError> {
    let format: Format = args.format.parse()?;
    let left = conversion::read_dataset(format, &args.left)?;
    let right = conversion::read_dataset(format, &args.right)?;

    let opts = compare::CompareOptions {
        max_listed: args.max_listed,
    };
    let report = compare::compare_datasets(&left, &right, &opts);

    match args.output.as_str() {
        "json" => print_json(&report)?,
        _ => print!("{}", report),
    }
    Ok(())
}

/// Execute the export-tfrecord subcommand.
fn run_export_tfrecord(args: ExportTfrecordArgs) -> Result<(), LabelportError> {
    let format: Format = args.format.parse()?;
    let dataset = conversion::read_dataset(format, &args.input)?;

    let report =
        ir::io_tfrecord::write_tfrecord_dir(&args.output, &dataset, args.images_dir.as_deref())?;
    println!(
        "Wrote {} record(s) to {}",
        report.records_written,
        args.output.join("dataset.tfrecord").display()
    );
    if report.images_skipped_no_annotations > 0 {
        println!(
            "Skipped {} image(s) without annotations",
            report.images_skipped_no_annotations
        );
    }
    if report.images_missing_bytes > 0 {
        println!(
            "Warning: {} image file(s) not found; their records carry empty payloads",
            report.images_missing_bytes
        );
    }
    Ok(())
}

/// File-based formats get a default file name inside the subset directory;
/// directory-based formats take the directory itself.
fn subset_output_path(subset_dir: &Path, format: Format) -> PathBuf {
    match format {
        Format::Coco => subset_dir.join("coco.json"),
        Format::IrJson => subset_dir.join("dataset.json"),
        _ => subset_dir.to_path_buf(),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), LabelportError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| {
        LabelportError::IrJsonWrite {
            path: PathBuf::from("<stdout>"),
            source,
        }
    })?;
    println!("{}", json);
    Ok(())
}
