use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use director::DirectorSession;
use gen_client::{GeminiClient, GenerationClient};
use std::path::PathBuf;
use storyboard::{
    AspectRatio, GenerationConfig, LogPhase, Quality, ReferenceImage, SessionState,
};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "storyboard-cli")]
#[command(about = "Storyboard engine CLI - 9-frame character-consistent sequences from one reference image")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and package the results
    Generate {
        /// Reference image establishing character identity
        #[arg(short, long)]
        image: PathBuf,

        /// Story arc to break into 9 shots
        #[arg(short, long)]
        action: String,

        /// Frame aspect ratio (16:9, 4:3, 1:1)
        #[arg(long, default_value = "16:9")]
        aspect_ratio: AspectRatio,

        /// Render quality (standard, cinematic)
        #[arg(long, default_value = "standard")]
        quality: Quality,

        /// Directory for the ZIP archive
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Also write loose SCENE_{n}.png files into this directory
        #[arg(long)]
        frames_dir: Option<PathBuf>,

        /// Write the director log as JSON to this path
        #[arg(long)]
        log: Option<PathBuf>,

        /// Skip the ZIP archive
        #[arg(long)]
        no_zip: bool,
    },

    /// Analyze a reference image and print the extracted fingerprint
    Analyze {
        /// Reference image to analyze
        image: PathBuf,

        /// Output analysis to JSON file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Plan the 9-shot sequence without rendering frames
    Plan {
        /// Reference image establishing character identity
        #[arg(short, long)]
        image: PathBuf,

        /// Story arc to break into 9 shots
        #[arg(short, long)]
        action: String,

        /// Output plans to JSON file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt().with_max_level(level).init();

    match cli.command {
        Commands::Generate {
            image,
            action,
            aspect_ratio,
            quality,
            output,
            frames_dir,
            log,
            no_zip,
        } => {
            generate_command(
                image,
                action,
                aspect_ratio,
                quality,
                output,
                frames_dir,
                log,
                no_zip,
            )
            .await
        }
        Commands::Analyze { image, output } => analyze_command(image, output).await,
        Commands::Plan {
            image,
            action,
            output,
        } => plan_command(image, action, output).await,
    }
}

#[allow(clippy::too_many_arguments)]
async fn generate_command(
    image: PathBuf,
    action: String,
    aspect_ratio: AspectRatio,
    quality: Quality,
    output: PathBuf,
    frames_dir: Option<PathBuf>,
    log: Option<PathBuf>,
    no_zip: bool,
) -> Result<()> {
    let reference = ReferenceImage::from_path(&image)
        .with_context(|| format!("failed to load reference image {:?}", image))?;
    info!("Reference image loaded: {:?} ({})", image, reference.mime_type);

    let config = GenerationConfig {
        quality,
        aspect_ratio,
    };
    let mut session = DirectorSession::new(GeminiClient::new(), config);
    session.load_reference(reference);

    let final_state = session.run(&action).await?;

    if let Some(dir) = frames_dir {
        match exporters::export_frames_dir(session.frames(), &dir) {
            Ok(written) => info!("Wrote {} frame files to {:?}", written.len(), dir),
            Err(e) => {
                warn!("Frame export failed: {}", e);
                session.log(LogPhase::Error, "打包下载请求被拒绝。");
            }
        }
    }

    if !no_zip {
        session.log(LogPhase::Packaging, "正在聚合所有分镜素材，准备 ZIP 容器...");
        match exporters::export_zip(
            session.frames(),
            &output,
            exporters::DEFAULT_ARCHIVE_PREFIX,
        ) {
            Ok(Some(path)) => {
                session.log(LogPhase::System, "项目包已成功导出。");
                info!("Archive: {:?}", path);
            }
            Ok(None) => info!("No finished frames, archive skipped"),
            Err(e) => {
                warn!("Archive export failed: {}", e);
                session.log(LogPhase::Error, "打包下载请求被拒绝。");
            }
        }
    }

    if let Some(path) = log {
        let json = serde_json::to_string_pretty(session.console().entries())?;
        std::fs::write(&path, json)?;
        info!("Director log written to {:?}", path);
    }

    info!(
        "Session {}: {} done, {} failed",
        session.state(),
        session.done_count(),
        session.error_count()
    );

    if final_state == SessionState::Error {
        anyhow::bail!("storyboard run failed; see the director log");
    }
    Ok(())
}

async fn analyze_command(image: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let reference = ReferenceImage::from_path(&image)
        .with_context(|| format!("failed to load reference image {:?}", image))?;

    let client = GeminiClient::new();
    let analysis = client.analyze_reference(&reference).await?;

    let json = serde_json::to_string_pretty(&analysis)?;
    if let Some(path) = output {
        std::fs::write(&path, json)?;
        info!("Analysis written to {:?}", path);
    } else {
        println!("{}", json);
    }
    Ok(())
}

async fn plan_command(image: PathBuf, action: String, output: Option<PathBuf>) -> Result<()> {
    let reference = ReferenceImage::from_path(&image)
        .with_context(|| format!("failed to load reference image {:?}", image))?;

    let client = GeminiClient::new();
    let analysis = client.analyze_reference(&reference).await?;
    info!("Analysis complete, planning sequence");
    let plans = client.plan_sequence(&analysis, &action).await?;

    let json = serde_json::to_string_pretty(&plans)?;
    if let Some(path) = output {
        std::fs::write(&path, json)?;
        info!("Sequence plan written to {:?}", path);
    } else {
        println!("{}", json);
    }
    Ok(())
}
