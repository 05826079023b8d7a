use clap::{Parser, Subcommand};
use cli::{load_config, save_crops, OutputFormat, SegmentReport};
use color_eyre::eyre::{Result, WrapErr};
use segmentation::{draw_segments, render::OVERLAY_COLOR, ContourSegmenter, Processor, SegmenterConfig};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment a page image into regions in reading order
    Segment {
        /// Path to the page image
        #[arg(short, long)]
        input: PathBuf,
        /// TOML or JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Parameter override, e.g. --set raw_contour.block_size=15 (repeatable)
        #[arg(long = "set", value_name = "STAGE.PARAM=VALUE")]
        overrides: Vec<String>,
        /// Output format of the segment table
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        /// Write the segment table here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Save a copy of the page with every segment outlined
        #[arg(long)]
        overlay: Option<PathBuf>,
        /// Directory receiving one cropped image per segment
        #[arg(long)]
        crops: Option<PathBuf>,
    },
    /// Print the effective parameters of every stage
    Params {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long = "set", value_name = "STAGE.PARAM=VALUE")]
        overrides: Vec<String>,
    },
    /// Print the JSON schema of the configuration file
    Schema,
    /// Write a configuration file holding the defaults
    InitConfig {
        #[arg(default_value = "segmenter.toml")]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Segment {
            input,
            config,
            overrides,
            format,
            output,
            overlay,
            crops,
        } => {
            let config = load_config(config.as_deref(), overrides)?;
            segment_page(
                input,
                &config,
                *format,
                output.as_deref(),
                overlay.as_deref(),
                crops.as_deref(),
            )?;
        }
        Commands::Params { config, overrides } => {
            let config = load_config(config.as_deref(), overrides)?;
            let segmenter = ContourSegmenter::new(&config)?;
            for (key, value) in segmenter.parameters() {
                println!("{key} = {value}");
            }
        }
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&SegmenterConfig::schema())?);
        }
        Commands::InitConfig { path } => {
            SegmenterConfig::default().to_toml_file(path)?;
            info!("Default configuration written to {:?}", path);
        }
    }

    Ok(())
}

fn segment_page(
    input: &Path,
    config: &SegmenterConfig,
    format: OutputFormat,
    output: Option<&Path>,
    overlay: Option<&Path>,
    crops: Option<&Path>,
) -> Result<()> {
    let page = image::open(input)
        .wrap_err_with(|| format!("Failed to open {}", input.display()))?
        .to_rgb8();
    info!("Segmenting {:?} ({}x{})", input, page.width(), page.height());

    let segmenter = ContourSegmenter::new(config)?;
    let run = segmenter.segment(&page)?;
    info!("Found {} segments", run.segments.len());

    if let Some(path) = overlay {
        draw_segments(&page, &run.segments, OVERLAY_COLOR).save(path)?;
        info!("Overlay saved to {:?}", path);
    }
    if let Some(dir) = crops {
        let written = save_crops(&page, &run.segments, dir)?;
        info!("Saved {} crops to {:?}", written.len(), dir);
    }

    let report = SegmentReport::new(input, page.width(), page.height(), run.segments);
    let rendered = report.render(format)?;
    match output {
        Some(path) => {
            std::fs::write(path, rendered)?;
            info!("Segment table written to {:?}", path);
        }
        None => print!("{rendered}"),
    }
    Ok(())
}
