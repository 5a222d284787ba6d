//! PDF Figures Server - Entry point

use clap::{Parser, Subcommand};
use pdf_figures_server::client::{ExtractionClient, DEFAULT_ENDPOINT};
use pdf_figures_server::config::ServeArgs;
use pdf_figures_server::extractor::find_figure_by_image;
use pdf_figures_server::{server, ExtractionService};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "pdf-figures-server", version, about = "Extract figures and tables from PDFs")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (REST API, static resources and MCP at /mcp)
    Serve(ServeArgs),
    /// Run the MCP server over stdio
    McpStdio(ServeArgs),
    /// Send a local PDF to a running server and download the figures
    Extract {
        /// PDF file to process
        input_path: PathBuf,
        /// Directory for the downloaded figures
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,
        /// Extraction endpoint
        #[arg(long, default_value = DEFAULT_ENDPOINT)]
        url: url::Url,
        /// Print only the metadata of the figure rendered to this image file
        #[arg(long, value_name = "IMAGE")]
        figure: Option<String>,
    },
}

/// Server flags without a subcommand, read from the environment
#[derive(Debug, Parser)]
struct DefaultServe {
    #[command(flatten)]
    args: ServeArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_figures_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or_else(|| {
        Command::Serve(DefaultServe::parse_from(["pdf-figures-server"]).args)
    });

    match command {
        Command::Serve(args) => {
            tracing::info!("Starting PDF figures server");
            pdf_figures_server::serve(args.into_config()?).await
        }
        Command::McpStdio(args) => {
            let config = args.into_config()?;
            config.ensure_dirs()?;
            server::run_stdio(ExtractionService::new(config)?).await
        }
        Command::Extract {
            input_path,
            output_dir,
            url,
            figure,
        } => {
            let client = ExtractionClient::new(url)?;
            let figures = client.extract_file(&input_path, &output_dir).await?;
            match figure.as_deref() {
                Some(image) => {
                    let found = find_figure_by_image(&figures, image).ok_or_else(|| {
                        anyhow::anyhow!("no figure rendered to '{}' in {}", image, input_path.display())
                    })?;
                    println!("{}", serde_json::to_string_pretty(found)?);
                }
                None => println!("{}", serde_json::to_string_pretty(&figures)?),
            }
            tracing::info!(
                figures = figures.len(),
                output_dir = %output_dir.display(),
                "figures downloaded"
            );
            Ok(())
        }
    }
}
