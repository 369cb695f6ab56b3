//! HTML rewriting for proxied pages
//!
//! Keeps relative links and Swagger UI assets flowing back through `/fetch`
//! so a proxied admin page stays usable from the browser.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use url::{Position, Url};

use crate::templating::urlencode;

static HEAD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<head\b[^>]*>").expect("head regex should compile"));

static STATIC_ASSET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?P<prefix>(?:src|href)=["'])/?(?P<url>(?:swagger|flasgger_static|static)/[^"']+)"#,
    )
    .expect("static asset regex should compile")
});

static SCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script.*?>.*?</script>").expect("script regex should compile"));

/// True when an upstream content type should go through [`rewrite_html`]
pub fn is_html(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("text/html")
}

/// Where proxied assets and the Swagger UI spec are pointed
#[derive(Debug, Clone)]
pub struct RewriteTargets {
    /// Base for `swagger*` asset paths, ending in `/`
    pub openapi_base: String,
    pub spec_url: String,
}

impl RewriteTargets {
    pub fn from_spec_url(spec_url: &str) -> Self {
        let openapi_base = Url::parse(spec_url)
            .and_then(|u| u.join("./"))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| "http://localhost:9000/openapi/".to_string());
        Self {
            openapi_base,
            spec_url: spec_url.to_string(),
        }
    }
}

pub fn rewrite_html(body: &[u8], target: &Url, targets: &RewriteTargets) -> String {
    let text = String::from_utf8_lossy(body);
    let text = inject_base(&text, target);
    let text = rewrite_static_assets(&text, target, targets);
    let text = null_out_python_none(&text);
    pin_swagger_spec(&text, &targets.spec_url)
}

fn fetch_link(url: &str) -> String {
    format!("/fetch?url={}", urlencode(url))
}

fn inject_base(text: &str, target: &Url) -> String {
    match HEAD_RE.find(text) {
        Some(m) => {
            let base = format!(r#"<base href="{}" />"#, fetch_link(target.as_str()));
            let mut out = String::with_capacity(text.len() + base.len());
            out.push_str(&text[..m.end()]);
            out.push_str(&base);
            out.push_str(&text[m.end()..]);
            out
        }
        None => text.to_string(),
    }
}

fn rewrite_static_assets(text: &str, target: &Url, targets: &RewriteTargets) -> String {
    let authority = &target[..Position::AfterPort];
    STATIC_ASSET_RE
        .replace_all(text, |caps: &Captures| {
            let path = &caps["url"];
            let full = if path.starts_with("swagger") {
                format!("{}{}", targets.openapi_base, path)
            } else {
                format!("{}/{}", authority, path)
            };
            format!("{}{}", &caps["prefix"], fetch_link(&full))
        })
        .into_owned()
}

/// Flask templates leak Python's `None` into inline scripts
fn null_out_python_none(text: &str) -> String {
    SCRIPT_RE
        .replace_all(text, |caps: &Captures| caps[0].replace("None", "null"))
        .into_owned()
}

fn pin_swagger_spec(text: &str, spec_url: &str) -> String {
    let script = format!(
        r#"
<script>
(function() {{
    const FIXED_SPEC_URL = "{spec_url}";
    function updateSwaggerSpec() {{
        if (window.ui && ui.specActions) {{
            ui.specActions.updateUrl(FIXED_SPEC_URL);
            ui.specActions.download(FIXED_SPEC_URL);
        }}
        const input = document.querySelector(".download-url-input");
        if (input) input.value = FIXED_SPEC_URL;
    }}
    document.addEventListener("DOMContentLoaded", updateSwaggerSpec);
    window.addEventListener("load", updateSwaggerSpec);
    setTimeout(updateSwaggerSpec, 100);
}})();
</script>
"#
    );
    text.replace("</body>", &format!("{script}</body>"))
}
