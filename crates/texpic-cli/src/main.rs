//! texpic CLI - live previews of TikZ pictures in LaTeX documents.

mod colors;
mod input;
mod locate;
mod preamble;
mod render;
mod watch;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "texpic")]
#[command(about = "Live previews of TikZ pictures in LaTeX documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the preamble synthesized for a document's pictures
    Preamble {
        /// Path to the document (.tex file)
        file: String,

        /// Only scan the first N lines instead of everything before \begin{document}
        #[arg(long)]
        up_to: Option<u32>,

        /// Configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the range of the picture enclosing a line
    Locate {
        /// Path to the document (.tex file)
        file: String,

        /// Line inside the picture (1-based)
        #[arg(short, long)]
        line: u32,
    },

    /// Compile the picture at a line once
    Render {
        /// Path to the document (.tex file)
        file: String,

        /// Line inside the picture (1-based)
        #[arg(short, long)]
        line: u32,

        /// Output PDF path (default: <stem>-<line>.pdf next to the document)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Render the picture at a line and keep it fresh as the document changes
    Watch {
        /// Path to the document (.tex file)
        file: String,

        /// Line inside the picture (1-based)
        #[arg(short, long)]
        line: u32,

        /// Output PDF path (default: <stem>-<line>.pdf next to the document)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Helper to format texpic-core errors with recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(core_err) = err.downcast_ref::<texpic_core::Error>() {
            anyhow::anyhow!("{}", core_err.with_hint())
        } else {
            err
        }
    };

    match cli.command {
        Commands::Preamble {
            file,
            up_to,
            config,
        } => preamble::execute(&file, up_to, config.as_deref()).map_err(format_error)?,

        Commands::Locate { file, line } => locate::execute(&file, line).map_err(format_error)?,

        Commands::Render {
            file,
            line,
            output,
            config,
        } => {
            render::execute(&file, line, output, config.as_deref()).map_err(format_error)?;
        }

        Commands::Watch {
            file,
            line,
            output,
            config,
        } => {
            watch::execute(&file, line, output, config.as_deref())
                .await
                .map_err(format_error)?;
        }
    }

    Ok(())
}
