//! Audio source provider seam.
//!
//! Providers turn a track into playable audio. Two primary providers are
//! raced by the resolver; an optional host-capability "unblock" provider is
//! consulted only after both primaries come up empty.

use crate::error::Result;
use crate::model::{ResolvedSource, SourceHints, Track};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identity of a provider, used for latency bookkeeping and cache tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// The catalog's own streaming endpoint.
    Official,
    /// Third-party mirror without trial restrictions.
    Alternate,
    /// Host-capability fallback searching external sources.
    Unblock,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Official => "official",
            ProviderKind::Alternate => "alternate",
            ProviderKind::Unblock => "unblock",
        }
    }
}

/// Resolves a track to playable audio.
///
/// `Ok(None)` means "no source available here", the expected outcome for
/// region locks, trial-only tracks, and exhausted mirrors. Implementations
/// must reserve `Err` for unexpected failures; the resolver swallows those
/// and treats them as empty results anyway.
#[async_trait]
pub trait AudioSourceProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn resolve(&self, track: &Track, hints: &SourceHints) -> Result<Option<ResolvedSource>>;
}

/// How the unblock provider searches its upstream sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SearchMode {
    #[default]
    FastFirst,
    OrderFirst,
}

/// Configuration for the host-capability unblock provider.
///
/// Every field is optional and validated independently; hosts set only
/// what their deployment supports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnblockConfig {
    /// Upstream source names to search, in priority order.
    pub sources: Vec<String>,
    pub search_mode: SearchMode,
    /// Allow lossless results where the upstream offers them.
    pub enable_flac: bool,
    /// Proxy for upstream requests, e.g. `socks5://127.0.0.1:1080`.
    pub proxy_uri: Option<String>,
    /// Cookie for the Joox upstream.
    pub joox_cookie: Option<String>,
    /// Cookie for the QQ upstream.
    pub qq_cookie: Option<String>,
    /// Path to a yt-dlp executable for the ytdl upstream.
    pub ytdl_path: Option<String>,
}

impl UnblockConfig {
    /// Checks each configured field on its own terms.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(proxy) = &self.proxy_uri {
            if !proxy.contains("://") {
                return Err(format!("proxy_uri is not a URI: {proxy}"));
            }
        }
        if let Some(cookie) = &self.joox_cookie {
            if cookie.trim().is_empty() {
                return Err("joox_cookie is set but empty".into());
            }
        }
        if let Some(cookie) = &self.qq_cookie {
            if cookie.trim().is_empty() {
                return Err("qq_cookie is set but empty".into());
            }
        }
        if let Some(path) = &self.ytdl_path {
            if path.trim().is_empty() {
                return Err("ytdl_path is set but empty".into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unblock_config_accepts_defaults() {
        assert!(UnblockConfig::default().validate().is_ok());
    }

    #[test]
    fn unblock_config_rejects_bad_proxy() {
        let config = UnblockConfig {
            proxy_uri: Some("localhost:1080".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unblock_config_rejects_empty_cookie() {
        let config = UnblockConfig {
            qq_cookie: Some("  ".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn search_mode_serializes_kebab_case() {
        let json = serde_json::to_string(&SearchMode::OrderFirst).unwrap();
        assert_eq!(json, "\"order-first\"");
    }
}
