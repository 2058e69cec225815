//! Operator tooling for Cyrkensia content roots and configuration

use std::io::{self, BufRead};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rand::distributions::Alphanumeric;
use rand::Rng;

use cyrkensia_core::auth::{hash_apr1, hash_bcrypt};
use cyrkensia_core::{catalog, CatalogSnapshot, ConfigLayer, ConfigResolver, CredentialStore, ServerConfig};

#[derive(Parser)]
#[command(name = "cyrk")]
#[command(about = "Cyrkensia operator CLI")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the catalog of a content root and print it
    Scan {
        root: PathBuf,
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve the layered configuration and validate it
    Check {
        /// Explicit config file, as passed to the server
        #[arg(short, long, env = cyrkensia_core::config::CONFIG_ENVVAR)]
        config: Option<PathBuf>,
    },

    /// Print an htpasswd line; the password is read from stdin
    Passwd {
        user: String,
        /// Apache MD5 instead of bcrypt
        #[arg(long)]
        apr1: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Scan { root, json } => {
            if !root.is_dir() {
                return Err(format!("{:?} is not a directory", root).into());
            }
            let snapshot = catalog::build(&root);
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print_snapshot(&snapshot);
            }
        }

        Commands::Check { config } => {
            let config = ConfigResolver::standard(config.as_deref(), ConfigLayer::default()).resolve()?;
            print_config(&config);
            if let Some(path) = &config.htpasswd {
                let store = CredentialStore::load(path)?;
                println!("✓ {} credential(s) in {}", store.len(), path.display());
            }
            println!("✓ Configuration OK");
        }

        Commands::Passwd { user, apr1 } => {
            let mut password = String::new();
            io::stdin().lock().read_line(&mut password)?;
            let password = password.trim_end_matches(['\r', '\n']);
            println!("{}", htpasswd_line(&user, password, apr1)?);
        }
    }

    Ok(())
}

fn print_snapshot(snapshot: &CatalogSnapshot) {
    for album in &snapshot.albums {
        println!("{} ({})", album.name, album.dir);
        for file in &album.files {
            println!("    {}", file);
        }
    }
    println!();
    println!("{} album(s), {}", snapshot.albums.len(), format_size(snapshot.size));

    if !snapshot.issues.is_empty() {
        println!();
        println!("Skipped:");
        for issue in &snapshot.issues {
            println!("  ✗ {}", issue);
        }
    }
}

fn print_config(config: &ServerConfig) {
    println!("Listen:   {}", config.listen_addr());
    println!("Root:     {}", config.root.display());
    println!("Name:     {}", config.name);
    println!("Icon:     {}", config.icon);
    println!("UUID:     {}", if config.uuid.is_empty() { "-" } else { config.uuid.as_str() });
    println!("Gated:    {}", config.gated());
    match &config.tls {
        Some(tls) => println!("TLS:      {} / {}", tls.cert.display(), tls.key.display()),
        None => println!("TLS:      off"),
    }
    for owner in &config.owners {
        println!("Owner:    {} <{}> {}", owner.name, owner.email, owner.website);
    }
    if !config.root.is_dir() {
        println!("⚠ {} is not a directory", config.root.display());
    }
}

fn htpasswd_line(user: &str, password: &str, apr1: bool) -> Result<String, Box<dyn std::error::Error>> {
    if user.is_empty() || user.contains(':') {
        return Err("username must be non-empty and must not contain ':'".into());
    }
    if password.is_empty() {
        return Err("empty password".into());
    }
    let hash = if apr1 {
        let salt: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();
        hash_apr1(password, &salt)
    } else {
        hash_bcrypt(password)?
    };
    Ok(format!("{}:{}", user, hash))
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
