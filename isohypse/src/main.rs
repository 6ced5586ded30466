mod asc;

use anyhow::{Context, Result, ensure};
use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use isohypse_core::geojson::{GeoJsonLayout, GeoJsonWriter};
use isohypse_core::raster::SliceRasterProvider;
use isohypse_core::writer::FeatureSink;
use isohypse_core::{ContourOptions, generate, generate_tiled};
use isohypse_geometry::geo::Srs;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
	author,
	version,
	about,
	long_about = None,
	propagate_version = true,
	disable_help_subcommand = true,
)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	#[command(flatten)]
	verbose: Verbosity<WarnLevel>,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Trace isolines at each level
	Lines(GenerateArgs),

	/// Fill the bands between consecutive levels with polygons
	Polygons(GenerateArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
	/// Input rasters (ESRI ASCII grid); several inputs are stitched as tiles
	#[arg(required = true)]
	inputs: Vec<PathBuf>,

	/// Output GeoJSON file
	#[arg(short, long)]
	output: PathBuf,

	/// Distance between levels
	#[arg(long, default_value_t = 10.0)]
	interval: f64,

	/// Offset of the level ladder
	#[arg(long, default_value_t = 0.0)]
	base: f64,

	/// Use powers of this base as levels instead of the interval
	#[arg(long)]
	exp_base: Option<f64>,

	/// Explicit comma-separated levels; overrides every other level mode
	#[arg(long, value_delimiter = ',')]
	levels: Vec<f64>,

	/// Derive this many levels from the value distribution of the first input
	#[arg(long, conflicts_with = "levels")]
	quantiles: Option<usize>,

	/// Treat this sample value as nodata, overriding the raster header
	#[arg(long)]
	nodata: Option<f64>,

	/// EPSG code to tag the inputs with
	#[arg(long)]
	epsg: Option<u32>,

	/// Write one FeatureCollection instead of newline-delimited features
	#[arg(long)]
	collection: bool,

	/// Store each feature's level as a z coordinate
	#[arg(long)]
	elevation_as_z: bool,
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	env_logger::Builder::new()
		.filter_level(cli.verbose.log_level_filter())
		.format_timestamp(None)
		.init();

	run(cli)
}

fn run(cli: Cli) -> Result<()> {
	match &cli.command {
		Commands::Lines(args) => run_generate(args, false),
		Commands::Polygons(args) => run_generate(args, true),
	}
}

fn run_generate(args: &GenerateArgs, polygonize: bool) -> Result<()> {
	let srs = args.epsg.map_or_else(Srs::default, Srs::epsg);
	let mut rasters = Vec::with_capacity(args.inputs.len());
	for path in &args.inputs {
		rasters.push(asc::read_asc(path)?.with_srs(srs));
	}

	let fixed_levels = if args.levels.is_empty() {
		match args.quantiles {
			Some(count) => {
				ensure!(count > 0, "--quantiles needs at least one level");
				rasters[0].quantile_levels(count)
			}
			None => Vec::new(),
		}
	} else {
		args.levels.clone()
	};

	let options = ContourOptions {
		polygonize,
		interval: args.interval,
		base: args.base,
		exp_base: args.exp_base.unwrap_or(0.0),
		fixed_levels,
		nodata: args.nodata,
	};

	let file = File::create(&args.output).with_context(|| format!("creating {}", args.output.display()))?;
	let layout = if args.collection {
		GeoJsonLayout::FeatureCollection
	} else {
		GeoJsonLayout::NewlineDelimited
	};
	let mut writer = GeoJsonWriter::new(BufWriter::new(file), layout).with_elevation_as_z(args.elevation_as_z);

	if rasters.len() == 1 {
		generate(&mut rasters[0], &mut writer, &options)?;
	} else {
		log::info!("stitching {} tiles", rasters.len());
		let mut provider = SliceRasterProvider::new(rasters);
		generate_tiled(&mut provider, &mut writer, &options)?;
	}

	writer.close()?;
	Ok(())
}
