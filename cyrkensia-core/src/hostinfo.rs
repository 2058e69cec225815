//! Public status document served at `/` and `/hostinfo`

use serde::{Deserialize, Serialize};

use crate::catalog::{Album, CatalogSnapshot};
use crate::config::{Owner, ServerConfig};

/// Description of this server and its catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    pub name: String,
    #[serde(rename = "hosticon")]
    pub icon: String,
    pub uuid: String,
    /// Whether file delivery requires HTTP Basic credentials
    pub secured: bool,
    /// Total size of all cataloged files in bytes
    pub size: u64,
    /// URL this document can be fetched from again
    #[serde(rename = "originURI")]
    pub origin: String,
    pub owners: Vec<Owner>,
    pub albums: Vec<Album>,
}

impl HostInfo {
    /// Assemble a HostInfo. Pure, performs no I/O.
    pub fn compose(config: &ServerConfig, snapshot: CatalogSnapshot, origin: String) -> Self {
        Self {
            name: config.name.clone(),
            icon: config.icon.clone(),
            uuid: config.uuid.clone(),
            secured: config.gated(),
            size: snapshot.size,
            origin,
            owners: config.owners.clone(),
            albums: snapshot.albums,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigLayer, merge_layers};

    fn config(htpasswd: &str) -> ServerConfig {
        let flags = ConfigLayer {
            root: "/music".into(),
            uuid: "5a0e4fd6-3b8e-4b8e-9f6e-2a0c7c3c1d11".into(),
            htpasswd: htpasswd.into(),
            owners: vec![Owner {
                name: "Op".into(),
                website: "https://op.example".into(),
                email: "op@example.org".into(),
            }],
            ..Default::default()
        };
        ServerConfig::try_from(merge_layers(vec![ConfigLayer::defaults(), flags])).unwrap()
    }

    fn snapshot() -> CatalogSnapshot {
        CatalogSnapshot {
            albums: vec![Album {
                dir: "AlbumA".into(),
                name: "Foo".into(),
                cover: "c.jpg".into(),
                files: vec!["song1.mp3".into(), "song2.mp3".into()],
                authors: Vec::new(),
            }],
            size: 3000,
            issues: Vec::new(),
        }
    }

    #[test]
    fn test_compose() {
        let info = HostInfo::compose(&config(""), snapshot(), "http://host:8080/".into());
        assert_eq!(info.name, "Cyrkensia");
        assert_eq!(info.icon, "cyrkensia");
        assert!(!info.secured);
        assert_eq!(info.size, 3000);
        assert_eq!(info.albums.len(), 1);
        assert_eq!(info.owners[0].name, "Op");
        assert_eq!(info.origin, "http://host:8080/");
    }

    #[test]
    fn test_secured_mirrors_gated() {
        let info = HostInfo::compose(&config("/etc/htpasswd"), CatalogSnapshot::default(), String::new());
        assert!(info.secured);
        assert!(info.albums.is_empty());
        assert_eq!(info.size, 0);
    }

    #[test]
    fn test_wire_format() {
        let info = HostInfo::compose(&config(""), snapshot(), "https://cdn.example/hostinfo".into());
        let json = serde_json::to_value(&info).unwrap();

        assert_eq!(json["hosticon"], "cyrkensia");
        assert_eq!(json["originURI"], "https://cdn.example/hostinfo");
        assert_eq!(json["secured"], false);
        assert_eq!(json["size"], 3000);
        assert_eq!(json["albums"][0]["dir"], "AlbumA");
        assert_eq!(json["albums"][0]["files"][1], "song2.mp3");
        assert_eq!(json["owners"][0]["email"], "op@example.org");
        assert!(json.get("icon").is_none());
    }
}
