use std::path::PathBuf;

use clap::{Parser, Subcommand};

use nestegg::api::{Scenario, load_scenario, project_scenario, run_http_server};

#[derive(Parser, Debug)]
#[command(name = "nestegg", about = "Monthly investment and retirement projection")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the JSON projection API.
    Serve {
        #[arg(default_value_t = 8080)]
        port: u16,
    },
    /// Project a scenario file (or the built-in demo) and print JSON.
    Project {
        #[arg(long)]
        scenario: Option<PathBuf>,
        #[arg(long)]
        pretty: bool,
    },
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve { port } => {
            if let Err(e) = run_http_server(port).await {
                eprintln!("Server error: {e}");
                std::process::exit(1);
            }
        }
        Command::Project { scenario, pretty } => {
            if let Err(e) = print_projection(scenario, pretty) {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
    }
}

fn print_projection(path: Option<PathBuf>, pretty: bool) -> nestegg::Result<()> {
    let scenario = match path {
        Some(path) => load_scenario(&path)?,
        None => Scenario::defaults(),
    };
    let response = project_scenario(&scenario)?;
    let json = if pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{json}");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
