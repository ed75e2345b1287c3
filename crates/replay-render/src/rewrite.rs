//! Asset reference rewriting.
//!
//! Generated reports reference their scripts and stylesheets relative to the
//! engine package. Those references are pointed at the server's asset route
//! instead, tagged with the engine version that should serve them:
//!
//! ```text
//! <script src="js/report.js">        -> <script src="/assets/report.js?v=10.4.0">
//! <link rel="stylesheet" href="x.css"> -> <link rel="stylesheet" href="/assets/x.css?v=10.4.0">
//! ```
//!
//! Absolute URLs (any scheme, protocol-relative, `data:`) are left alone.
//! Rewriting an already rewritten document is a no-op.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use replay_engine::VersionIdentifier;

/// Route prefix assets are served under.
pub const ASSET_ROUTE: &str = "/assets";

static SCRIPT_OR_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(script|link)\b[^>]*>").expect("invalid tag regex"));

static URL_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)(\s(?:src|href)\s*=\s*)(?:"([^"]*)"|'([^']*)')"#)
        .expect("invalid attribute regex")
});

static STYLESHEET_REL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\srel\s*=\s*["']?[^"'>]*\bstylesheet\b"#).expect("invalid rel regex")
});

static SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*:").expect("invalid scheme regex"));

/// Point script and stylesheet references at the asset route.
pub fn rewrite_asset_refs(html: &str, version: &VersionIdentifier) -> String {
    SCRIPT_OR_LINK
        .replace_all(html, |caps: &Captures<'_>| {
            let tag = &caps[0];
            let is_script = caps[1].eq_ignore_ascii_case("script");
            rewrite_tag(tag, is_script, version.as_str()).into_owned()
        })
        .into_owned()
}

fn rewrite_tag<'a>(tag: &'a str, is_script: bool, version: &str) -> Cow<'a, str> {
    URL_ATTR.replace(tag, |caps: &Captures<'_>| {
        let prefix = &caps[1];
        let (quote, value) = match (caps.get(2), caps.get(3)) {
            (Some(v), _) => ('"', v.as_str()),
            (None, Some(v)) => ('\'', v.as_str()),
            (None, None) => return caps[0].to_owned(),
        };

        let attr_is_src = prefix.trim_start().to_ascii_lowercase().starts_with("src");
        let eligible = if is_script {
            attr_is_src
        } else {
            !attr_is_src && (STYLESHEET_REL.is_match(tag) || has_extension(value, "css"))
        };

        match eligible.then(|| asset_url(value, version)).flatten() {
            Some(url) => format!("{prefix}{quote}{url}{quote}"),
            None => caps[0].to_owned(),
        }
    })
}

/// `/assets/{filename}?v={version}` for a relative reference.
fn asset_url(value: &str, version: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.starts_with("//") || value.starts_with('#') {
        return None;
    }
    if SCHEME.is_match(value) {
        return None;
    }

    let path = value.split(['?', '#']).next().unwrap_or_default();
    let filename = path.rsplit('/').next().unwrap_or_default();
    if filename.is_empty() || filename == "." || filename == ".." {
        return None;
    }

    Some(format!("{ASSET_ROUTE}/{filename}?v={version}"))
}

fn has_extension(value: &str, ext: &str) -> bool {
    let path = value.split(['?', '#']).next().unwrap_or_default();
    path.rsplit_once('.')
        .is_some_and(|(_, e)| e.eq_ignore_ascii_case(ext))
}
