//! Demo binary exercising the store, the command tree and hot reload.

use std::{env, error::Error, process};

use clap::{Parser, Subcommand};
use cmdopt::{
    app::{AppBuilder, AppService},
    command::{CommandTree, FlagValue, TreeBuilder},
    config_store::Lookup,
    plugins::shell::with_shell_module,
    sources::Format,
    tracing_config,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "cmdopt")]
#[command(about = "Inspect the layered configuration of a demo application")]
struct Cli {
    /// Location template to search instead of the defaults (repeatable)
    #[arg(short, long)]
    location: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the merged configuration
    Dump {
        #[arg(short, long, default_value = "yaml")]
        format: Format,
    },
    /// Print a single value
    Get {
        key: String,
        /// Resolve the key under the store prefix
        #[arg(short, long)]
        prefixed: bool,
    },
    /// Print the command tree
    Tree,
    /// Reload on config file changes until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Watch => tracing_config::init()?,
        _ => tracing_config::init_cli_mode()?,
    }

    let app = build_app(&cli.location);
    app.bootstrap(&env::args().collect::<Vec<_>>())?;

    match cli.command {
        Commands::Dump { format } => {
            let output = match format {
                Format::Yaml => app.store().as_yaml()?,
                Format::Json => app.store().as_json()?,
                Format::Toml => app.store().as_toml()?,
            };
            println!("{output}");
        }
        Commands::Get { key, prefixed } => {
            let value = if prefixed {
                app.store().prefixed().get(&key)
            } else {
                app.store().get(&key)
            };

            match value {
                Some(value) => println!("{value}"),
                None => {
                    eprintln!("{key}: not set");
                    process::exit(1);
                }
            }
        }
        Commands::Tree => {
            println!("{}", app.with_tree(render_tree));
        }
        Commands::Watch => {
            app.start_watching().await?;
            info!(files = ?app.watched_files(), "Watching; press Ctrl-C to stop");

            tokio::signal::ctrl_c().await?;
            app.stop_watching().await;
        }
    }

    Ok(())
}

fn build_app(locations: &[String]) -> AppService {
    let mut tree = TreeBuilder::new("cmdopt", env!("CARGO_PKG_VERSION"));
    tree.header("cmdopt demo application")
        .copyright("Copyright (C) the cmdopt authors", "cmdopt authors");

    tree.root()
        .new_flag(FlagValue::Bool(false))
        .titles("v", "verbose")
        .description("Log more")
        .env_vars(&["CMDOPT_VERBOSE"]);

    let server = tree
        .new_sub_cmd()
        .titles("s", "server")
        .description("Server settings")
        .id();
    tree.new_uint(8080)
        .titles("p", "port")
        .description("Listen port")
        .env_vars(&["PORT"])
        .attach_to(server);
    tree.new_string("info")
        .titles("", "log-level")
        .valid_args(&["trace", "debug", "info", "warn", "error"])
        .attach_to(server);

    let mut builder = AppBuilder::new(tree.build());
    if !locations.is_empty() {
        let locations: Vec<&str> = locations.iter().map(String::as_str).collect();
        builder = builder.with_predefined_locations(&locations);
    }

    with_shell_module(builder).build()
}

fn render_tree(tree: &CommandTree) -> String {
    let mut out = String::new();

    for id in tree.walk() {
        let Some(command) = tree.command(id) else {
            continue;
        };
        let depth = tree.ancestors(id).count();
        let indent = "  ".repeat(depth);
        let name = if id == CommandTree::ROOT {
            tree.meta().app_name.as_str()
        } else {
            command.titles.full.as_str()
        };

        out.push_str(&format!("{indent}{name}\n"));
        for flag in command.flags().iter().filter_map(|f| tree.flag(*f)) {
            out.push_str(&format!(
                "{indent}  --{} ({}) = {}\n",
                flag.titles.full,
                flag.default.kind(),
                flag.default.display_value()
            ));
        }
    }

    out
}
