use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use webcloud::pipeline::{Pipeline, RunOutcome, RunRequest};
use webcloud::shape::{BuiltinShape, NoticeLevel, ShapeNotice, ShapeSource};
use webcloud::{PipelineConfig, WordLimit, PREDEFINED_LINKS};

#[derive(Debug, Parser)]
#[command(name = "webcloud")]
#[command(about = "Turn the visible text of a web page into a word cloud", version)]
struct Cli {
    /// Font file used for the words (default: $WEBCLOUD_FONT, then system fonts)
    #[arg(long, global = true)]
    font: Option<PathBuf>,
    /// Fixed layout seed for reproducible clouds
    #[arg(long, global = true)]
    seed: Option<u64>,
    /// Fetch timeout in milliseconds
    #[arg(long = "timeout-ms", global = true, default_value_t = 10_000)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve the interactive control panel
    #[cfg(feature = "server")]
    Serve {
        #[arg(long, default_value = webcloud::panel::DEFAULT_ADDR)]
        addr: String,
    },
    /// Run the pipeline once and write the image
    Generate {
        /// Page to fetch; takes precedence over --link
        #[arg(long)]
        url: Option<String>,
        /// Index of a predefined link
        #[arg(long, default_value_t = 0)]
        link: usize,
        /// Maximum number of words (100-1000, step 100)
        #[arg(long, default_value_t = 400)]
        words: u32,
        /// Built-in shape: circle, star, heart or unique
        #[arg(long, conflicts_with = "shape_file")]
        shape: Option<String>,
        /// PNG, JPEG or SVG file used as the mask
        #[arg(long = "shape-file")]
        shape_file: Option<PathBuf>,
        #[arg(short = 'o', long = "out", default_value = "wordcloud.png")]
        out: PathBuf,
        /// Print the placed words as JSON
        #[arg(long)]
        json: bool,
        /// List the predefined links and exit
        #[arg(long = "list-links")]
        list_links: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = PipelineConfig::default();
    config.fetch.timeout_ms = cli.timeout_ms;
    config.font_path = cli.font;
    config.seed = cli.seed;
    let pipeline = Pipeline::new(config).context("failed to set up the pipeline")?;

    match cli.command {
        #[cfg(feature = "server")]
        Commands::Serve { addr } => {
            webcloud::panel::Panel::new(pipeline).serve(&addr)?;
        }
        Commands::Generate {
            url,
            link,
            words,
            shape,
            shape_file,
            out,
            json,
            list_links,
        } => {
            if list_links {
                for (i, link) in PREDEFINED_LINKS.iter().enumerate() {
                    println!("{}: {}", i, link);
                }
                return Ok(());
            }

            let shape = match (shape, shape_file) {
                (Some(name), _) => match BuiltinShape::from_name(&name) {
                    Some(s) => ShapeSource::Builtin(s),
                    None => bail!(
                        "unknown shape '{}'; expected one of: {}",
                        name,
                        BuiltinShape::ALL.map(|s| s.name()).join(", ")
                    ),
                },
                (None, Some(path)) => ShapeSource::Upload(
                    std::fs::read(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?,
                ),
                (None, None) => ShapeSource::None,
            };
            let request = match url {
                Some(url) => RunRequest::custom(url),
                None => RunRequest::predefined(link),
            }
            .with_word_limit(WordLimit::new(words))
            .with_shape(shape);

            match pipeline.run(&request) {
                RunOutcome::Done(report) => {
                    print_notices(&report.notices);
                    println!("{}", report.preview);
                    std::fs::write(&out, &report.png)
                        .with_context(|| format!("failed to write {}", out.display()))?;
                    info!("wrote {}", out.display());
                    if json {
                        println!("{}", serde_json::to_string_pretty(&report.image.words)?);
                    }
                }
                RunOutcome::Failed { error, notices } => {
                    print_notices(&notices);
                    bail!(error.user_message());
                }
            }
        }
    }
    Ok(())
}

fn print_notices(notices: &[ShapeNotice]) {
    for notice in notices {
        match notice.level {
            NoticeLevel::Info => eprintln!("{}", notice.message),
            NoticeLevel::Warning => eprintln!("warning: {}", notice.message),
        }
    }
}
