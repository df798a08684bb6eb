//! Link cards and link-preview metadata.

use super::{TextMeasure, note_height};
use crate::config::BoardConfig;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// A bookmarked URL with optional preview data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkContent {
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Preview image path relative to the board directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub note_expanded: bool,
}

impl LinkContent {
    /// A link whose preview has not been fetched yet; the URL doubles as title.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            title: url.clone(),
            url,
            description: None,
            image: None,
            site_name: None,
            note: None,
            note_expanded: false,
        }
    }

    pub(super) fn natural_height(&self, config: &BoardConfig, measure: &dyn TextMeasure) -> f64 {
        let mut height = config.card_header_height + config.link_text_height;
        if self.image.is_some() {
            height += config.link_image_height;
        }
        if self.note_expanded {
            height += note_height(self.note.as_deref().unwrap_or_default(), config, measure)
                + config.note_border;
        }
        height
    }

    /// Patch preview fields from fetched metadata. Returns true if anything
    /// changed.
    pub fn apply_metadata(&mut self, meta: &LinkMetadata) -> bool {
        let before = self.clone();
        if !meta.url.trim().is_empty() {
            self.url = meta.url.clone();
        }
        if !meta.title.trim().is_empty() {
            self.title = meta.title.clone();
        }
        self.image = meta.image.clone();
        self.site_name = meta.site_name.clone();
        *self != before
    }
}

/// Preview data returned by the link-metadata collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkMetadata {
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
}

/// Reasons a URL is refused for preview fetching.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("invalid url: {0}")]
    Invalid(String),
    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),
    #[error("blocked url host")]
    BlockedHost,
}

/// Parse a URL and check it is safe to fetch: http(s) only, and no
/// loopback, private, link-local or `.local` hosts.
pub fn validate_link_url(raw: &str) -> Result<Url, LinkError> {
    let url = Url::parse(raw.trim()).map_err(|e| LinkError::Invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(LinkError::UnsupportedScheme(other.to_string())),
    }
    if !is_public_host(&url) {
        return Err(LinkError::BlockedHost);
    }
    Ok(url)
}

fn is_public_host(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    if host.eq_ignore_ascii_case("localhost") || host.ends_with(".local") {
        return false;
    }
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    match bare.parse::<IpAddr>() {
        Ok(ip) => is_public_ip(ip),
        Err(_) => true,
    }
}

fn is_public_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => !(v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()),
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_public_ip(IpAddr::V4(v4));
            }
            let segments = v6.segments();
            let unique_local = (segments[0] & 0xfe00) == 0xfc00;
            let link_local = (segments[0] & 0xffc0) == 0xfe80;
            !(v6.is_loopback() || v6.is_unspecified() || unique_local || link_local)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_public_https() {
        assert!(validate_link_url("https://example.com/a").is_ok());
        assert!(validate_link_url("  http://8.8.8.8/ ").is_ok());
        assert!(validate_link_url("http://[::ffff:8.8.8.8]/").is_ok());
    }

    #[test]
    fn test_validate_rejects_scheme() {
        assert_eq!(
            validate_link_url("ftp://example.com"),
            Err(LinkError::UnsupportedScheme("ftp".into()))
        );
        assert!(matches!(validate_link_url("not a url"), Err(LinkError::Invalid(_))));
    }

    #[test]
    fn test_validate_blocks_private_hosts() {
        for url in [
            "http://localhost:8080",
            "http://printer.local",
            "http://127.0.0.1",
            "http://192.168.1.10",
            "http://169.254.0.1",
            "http://[::1]/",
            "http://[fd00::1]/",
            "http://[fe80::1]/",
            "http://[::ffff:127.0.0.1]/",
            "http://[::ffff:10.1.2.3]/",
        ] {
            assert_eq!(validate_link_url(url), Err(LinkError::BlockedHost), "{url}");
        }
    }

    #[test]
    fn test_height_grows_with_preview_image() {
        let config = BoardConfig::default();
        let m = crate::cards::EstimatedTextMeasure::default();
        let mut link = LinkContent::new("https://example.com");
        let bare = link.natural_height(&config, &m);
        link.image = Some("assets/link-1.png".into());
        assert_eq!(link.natural_height(&config, &m) - bare, config.link_image_height);
    }

    #[test]
    fn test_expanded_note_adds_border() {
        let config = BoardConfig::default();
        let m = crate::cards::EstimatedTextMeasure::default();
        let mut link = LinkContent::new("https://example.com");
        let bare = link.natural_height(&config, &m);
        link.note_expanded = true;
        assert_eq!(
            link.natural_height(&config, &m) - bare,
            config.note_min_height + config.note_border
        );
    }

    #[test]
    fn test_apply_metadata_keeps_url_when_blank() {
        let mut link = LinkContent::new("https://example.com");
        let changed = link.apply_metadata(&LinkMetadata {
            url: String::new(),
            title: "Example".into(),
            image: None,
            site_name: Some("example.com".into()),
        });
        assert!(changed);
        assert_eq!(link.url, "https://example.com");
        assert_eq!(link.title, "Example");
    }
}
