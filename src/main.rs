use std::{io, path::PathBuf, process::exit};

use clap::Parser;
use tracing::subscriber;
use tracing_log::LogTracer;
use tracing_subscriber::{filter::EnvFilter, FmtSubscriber};

use docsql::{
    cli::{commands::Command, DocsqlCli},
    config::{context::build_backend, schema::load_config},
};

const DEFAULT_CONFIG_PATH: &str = "docsql.toml";

#[derive(Debug, Parser)]
#[clap(name = "docsql", about = "Document collections stored in SQL tables", version)]
struct Args {
    #[clap(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config_path: PathBuf,

    #[clap(long, help = "Log in JSON format")]
    json_logs: bool,

    #[clap(subcommand)]
    command: Command,
}

fn prepare_tracing(json_logs: bool) {
    // Redirect all `log`'s events to our subscriber, to collect the ones from sqlx too
    LogTracer::init().expect("Failed to set logger");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    // Results go to stdout, so logs stay on stderr
    let sub = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(io::stderr);

    let result = if json_logs {
        subscriber::set_global_default(sub.json().finish())
    } else {
        subscriber::set_global_default(sub.compact().finish())
    };
    result.expect("Failed to set the global tracing subscriber");
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    prepare_tracing(args.json_logs);

    let config = match load_config(&args.config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading the config from {:?}: {e}", args.config_path);
            exit(2);
        }
    };

    let backend = match build_backend(&config).await {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("Error connecting to the backend: {e}");
            exit(2);
        }
    };

    let cli = DocsqlCli::new(backend);
    if let Err(e) = cli.run(args.command, &mut io::stdout()).await {
        eprintln!("{e}");
        exit(1);
    }
}
