//! Command-line flags
//!
//! Every flag left unset falls through to the config files below it.

use std::path::PathBuf;

use clap::Parser;

use cyrkensia_core::config::CONFIG_ENVVAR;
use cyrkensia_core::ConfigLayer;

#[derive(Parser, Debug)]
#[command(name = "cyrkensia", version)]
#[command(about = "Origin server for Azura and Shigure music repositories")]
pub struct Cli {
    /// Explicit config file, layered above the system and user files
    #[arg(short, long, env = CONFIG_ENVVAR)]
    pub config: Option<PathBuf>,

    /// Address to bind
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Content root with album directories
    #[arg(short, long)]
    pub root: Option<String>,

    /// Display name reported in hostinfo
    #[arg(long)]
    pub name: Option<String>,

    /// Icon key reported in hostinfo
    #[arg(long)]
    pub icon: Option<String>,

    /// Server UUID reported in hostinfo
    #[arg(long)]
    pub uuid: Option<String>,

    /// htpasswd file; enables HTTP Basic auth for file delivery
    #[arg(long)]
    pub htpasswd: Option<String>,

    /// TLS certificate chain (PEM)
    #[arg(long)]
    pub pem: Option<String>,

    /// TLS private key (PEM)
    #[arg(long)]
    pub key: Option<String>,

    /// Also write logs to daily rotated files in this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// The highest-precedence config layer
    pub fn to_layer(&self) -> ConfigLayer {
        ConfigLayer {
            port: self.port.unwrap_or(0),
            root: self.root.clone().unwrap_or_default(),
            bind_addr: self.bind.clone().unwrap_or_default(),
            hosticon: self.icon.clone().unwrap_or_default(),
            uuid: self.uuid.clone().unwrap_or_default(),
            vendor_name: self.name.clone().unwrap_or_default(),
            htpasswd: self.htpasswd.clone().unwrap_or_default(),
            pem_tls: self.pem.clone().unwrap_or_default(),
            key_tls: self.key.clone().unwrap_or_default(),
            owners: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyrkensia_core::config::merge_layers;

    #[test]
    fn test_flags_to_layer() {
        let cli = Cli::try_parse_from([
            "cyrkensia", "--root", "/srv/music", "--port", "9000", "--name", "Shelf", "--htpasswd", "/etc/htpasswd",
        ])
        .unwrap();
        let layer = cli.to_layer();
        assert_eq!(layer.root, "/srv/music");
        assert_eq!(layer.port, 9000);
        assert_eq!(layer.vendor_name, "Shelf");
        assert_eq!(layer.htpasswd, "/etc/htpasswd");
        assert!(layer.bind_addr.is_empty());
    }

    #[test]
    fn test_unset_flags_fall_through() {
        let cli = Cli::try_parse_from(["cyrkensia", "-b", "127.0.0.1"]).unwrap();
        let file = ConfigLayer {
            root: "/from/file".into(),
            port: 7000,
            bind_addr: "0.0.0.0".into(),
            ..Default::default()
        };
        let merged = merge_layers(vec![ConfigLayer::defaults(), file, cli.to_layer()]);
        assert_eq!(merged.bind_addr, "127.0.0.1");
        assert_eq!(merged.root, "/from/file");
        assert_eq!(merged.port, 7000);
    }

    #[test]
    fn test_logging_flags() {
        let cli = Cli::try_parse_from(["cyrkensia", "-v", "--log-dir", "/var/log/cyrkensia"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.log_dir, Some(PathBuf::from("/var/log/cyrkensia")));
    }
}
