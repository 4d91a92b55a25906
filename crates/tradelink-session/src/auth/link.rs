/*
[INPUT]:  Page address carrying `#<token>[-...-<telegramId>]` in its fragment
[OUTPUT]: One-time link token plus optional numeric identity hint
[POS]:    Auth layer - messaging-bot deep-link handoff parsing and consumption
[UPDATE]: When the fragment format or consumption rules change
*/

use std::sync::Mutex;

use tracing::debug;
use url::Url;

use crate::http::Result;

/// Token and identity hint carried by a handoff fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkToken {
    pub token: String,
    pub telegram_id: Option<i64>,
}

/// The page's visible address, as far as the handoff flow needs it
pub trait PageLocation: Send + Sync {
    /// Current fragment without the leading `#`, if any
    fn fragment(&self) -> Option<String>;

    /// Remove the fragment from the visible address
    fn clear_fragment(&self);
}

/// In-process page address backed by a parsed URL
#[derive(Debug)]
pub struct BrowserLocation {
    url: Mutex<Url>,
}

impl BrowserLocation {
    pub fn parse(address: &str) -> Result<Self> {
        Ok(Self {
            url: Mutex::new(Url::parse(address)?),
        })
    }

    /// Current visible address
    pub fn href(&self) -> String {
        self.url
            .lock()
            .map(|url| url.to_string())
            .unwrap_or_default()
    }
}

impl PageLocation for BrowserLocation {
    fn fragment(&self) -> Option<String> {
        let url = self.url.lock().ok()?;
        url.fragment().map(str::to_string)
    }

    fn clear_fragment(&self) {
        if let Ok(mut url) = self.url.lock() {
            url.set_fragment(None);
        }
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

/// Parse a fragment (with or without the leading `#`) into a link token.
///
/// The token is the first `-` segment, cut at any `%`. With three or more
/// segments the last one is read as the numeric telegram id.
pub fn parse_fragment(fragment: &str) -> Option<LinkToken> {
    let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
    if fragment.is_empty() {
        return None;
    }

    let segments: Vec<&str> = fragment.split('-').collect();
    let first = segments.first()?;
    let token = first.split('%').next().unwrap_or_default();
    if token.is_empty() || !token.chars().all(is_token_char) {
        debug!("fragment does not carry a valid link token");
        return None;
    }

    let telegram_id = if segments.len() >= 3 {
        segments.last().and_then(|last| last.parse::<i64>().ok())
    } else {
        None
    };

    Some(LinkToken {
        token: token.to_string(),
        telegram_id,
    })
}

/// Whether the page currently carries a link token
pub fn has_link_token(location: &dyn PageLocation) -> bool {
    extract_link_token(location).is_some()
}

/// Read the link token from the page's fragment without consuming it
pub fn extract_link_token(location: &dyn PageLocation) -> Option<LinkToken> {
    location.fragment().as_deref().and_then(parse_fragment)
}

/// Strip the token from the visible address so it is handed off once only
pub fn clear_link_token(location: &dyn PageLocation) {
    location.clear_fragment();
}

/// Extract then immediately clear; the one-shot consumption used at mount
pub fn take_link_token(location: &dyn PageLocation) -> Option<LinkToken> {
    let token = extract_link_token(location)?;
    clear_link_token(location);
    Some(token)
}

impl LinkToken {
    /// Telegram id to attribute the session to, falling back when the link carried none
    pub fn telegram_id_or(&self, fallback: i64) -> i64 {
        self.telegram_id.unwrap_or(fallback)
    }
}
