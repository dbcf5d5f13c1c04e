use crate::version::Version;

pub const DEFAULT_DOMAIN: &str = "docs.ruby-lang.org";
pub const DEFAULT_LANGUAGE: &str = "en";

/// How documentation URLs are rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlOptions {
    pub use_https: bool,
    pub domain: String,
    pub language: String,
}

impl Default for UrlOptions {
    fn default() -> Self {
        Self {
            use_https: true,
            domain: DEFAULT_DOMAIN.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl UrlOptions {
    fn scheme(&self) -> &'static str {
        if self.use_https { "https" } else { "http" }
    }
}

/// `<scheme>://<domain>/<language>/<minor>/<relative_path>`.
///
/// The doc host only publishes one tree per minor release, so the patch
/// level of `version` is always dropped.
pub fn build(relative_path: &str, version: &Version, options: &UrlOptions) -> String {
    format!(
        "{}://{}/{}/{}/{}",
        options.scheme(),
        options.domain.trim_end_matches('/'),
        options.language,
        version.minor(),
        relative_path.trim_start_matches('/')
    )
}
