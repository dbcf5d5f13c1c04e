//! The cross-reference hook.
//!
//! The host renders every reference with its own linker first. Whatever it
//! produced is what we try to resolve against the standard library, so
//! project-local links always win and we only fill the gaps.

use crate::context::LinkContext;
use crate::error::Result;

/// Overrides the host's rendering of `reference` with a standard library
/// link when its fallback text names a known object.
///
/// Returns `None` when there is no fallback to override, the fallback
/// unchanged when the name is unknown, and an anchor otherwise.
pub fn link_object(
    ctx: &LinkContext,
    reference: &str,
    fallback: Option<&str>,
) -> Result<Option<String>> {
    let Some(label) = fallback else {
        return Ok(None);
    };

    match ctx.url_for(label)? {
        Some(url) => {
            tracing::debug!("Linked {reference:?} to {url}");
            Ok(Some(format!(
                "<a href=\"{}\">{}</a>",
                escape_html(&url),
                escape_html(label)
            )))
        }
        None => Ok(Some(label.to_string())),
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
