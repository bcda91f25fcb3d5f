mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dojo_common::types::Language;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dojo-cli")]
#[command(about = "Dojo CLI - Browse challenges, run solutions and submit them", long_about = None)]
struct Cli {
    /// Challenge catalog (defaults to $DOJO_CHALLENGES or config/challenges.json)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every challenge
    List {
        /// Print as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Show a challenge statement
    Show {
        /// Challenge slug
        slug: String,
    },

    /// Print the starter code for a language
    Starter {
        /// Challenge slug
        slug: String,

        /// Language (typescript or kotlin)
        #[arg(short, long)]
        lang: Language,
    },

    /// Run a solution once against the sample or a custom input
    Run {
        /// Challenge slug
        slug: String,

        /// Language (typescript or kotlin)
        #[arg(short, long)]
        lang: Language,

        /// Solution source file
        #[arg(short, long)]
        file: PathBuf,

        /// Custom stdin (defaults to the sample input)
        #[arg(short, long)]
        input: Option<String>,
    },

    /// Submit a solution against every test case
    Submit {
        /// Challenge slug
        slug: String,

        /// Language (typescript or kotlin)
        #[arg(short, long)]
        lang: Language,

        /// Solution source file
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let catalog = commands::load_catalog(cli.catalog.as_deref())?;

    match cli.command {
        Commands::List { json } => {
            commands::list_challenges(&catalog, json)?;
        }
        Commands::Show { slug } => {
            commands::show_challenge(&catalog, &slug)?;
        }
        Commands::Starter { slug, lang } => {
            commands::print_starter(&catalog, &slug, lang)?;
        }
        Commands::Run {
            slug,
            lang,
            file,
            input,
        } => {
            commands::run_solution(&catalog, &slug, lang, &file, input.as_deref()).await?;
        }
        Commands::Submit { slug, lang, file } => {
            commands::submit_solution(&catalog, &slug, lang, &file).await?;
        }
    }

    Ok(())
}
