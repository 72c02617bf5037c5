//! Stream kinds, formats, and the URLs built from them.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;
use url::form_urlencoded;

use crate::upstream::UpstreamCredentials;

/// Kind of content a playback token grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    Live,
    Vod,
    Series,
}

impl StreamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamType::Live => "live",
            StreamType::Vod => "vod",
            StreamType::Series => "series",
        }
    }

    /// First path segment on the upstream server.
    pub fn path_segment(&self) -> &'static str {
        match self {
            StreamType::Live => "live",
            StreamType::Vod => "movie",
            StreamType::Series => "series",
        }
    }
}

impl FromStr for StreamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(StreamType::Live),
            "vod" => Ok(StreamType::Vod),
            "series" => Ok(StreamType::Series),
            "" => Err("type required".into()),
            other => Err(format!("invalid type: {other}")),
        }
    }
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery format requested at redeem time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamFormat {
    #[default]
    Hls,
    Dash,
}

impl StreamFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamFormat::Hls => "hls",
            StreamFormat::Dash => "dash",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            StreamFormat::Hls => "m3u8",
            StreamFormat::Dash => "mpd",
        }
    }

    /// Parse an optional query value; absent or blank means HLS.
    pub fn parse_optional(raw: Option<&str>) -> Result<Self, String> {
        match raw.map(str::trim) {
            None | Some("") => Ok(StreamFormat::Hls),
            Some(s) => s.parse(),
        }
    }
}

impl FromStr for StreamFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hls" => Ok(StreamFormat::Hls),
            "dash" => Ok(StreamFormat::Dash),
            other => Err(format!("invalid format: {other}")),
        }
    }
}

/// `{base}/{live|movie|series}/{username}/{password}/{id}.{ext}`.
///
/// Every segment is percent-encoded on its own, so credentials containing
/// `/`, `?` or `#` cannot change the URL's structure.
pub fn build_stream_url(
    upstream: &UpstreamCredentials,
    stream_type: StreamType,
    id: &str,
    format: StreamFormat,
) -> Result<String, String> {
    let mut url = Url::parse(&upstream.base_url)
        .map_err(|e| format!("invalid upstream base URL: {e}"))?;
    let file = format!("{id}.{}", format.extension());
    url.path_segments_mut()
        .map_err(|_| "upstream base URL cannot carry a path".to_string())?
        .clear()
        .extend([
            stream_type.path_segment(),
            upstream.username.as_str(),
            upstream.password.as_str(),
            file.as_str(),
        ]);
    Ok(url.into())
}

/// Link a client follows to redeem a playback token.
///
/// Relative (`{path}?token=…`) when no public base URL is configured.
pub fn build_playback_link(
    public_base_url: Option<&str>,
    stream_path: &str,
    token: &str,
    format: StreamFormat,
) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("token", token)
        .append_pair("format", format.as_str())
        .finish();
    let prefix = public_base_url.map(str::trim).filter(|b| !b.is_empty()).map(|b| {
        let b = b.trim_end_matches('/');
        let lower = b.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            b.to_string()
        } else {
            format!("https://{b}")
        }
    });
    format!("{}{stream_path}?{query}", prefix.unwrap_or_default())
}
