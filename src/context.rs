use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::Settings;
use crate::error::Result;
use crate::fetch::{HttpTransport, TarGzUnpacker};
use crate::index::IndexBuilder;
use crate::object_map::{self, MapBuilder, ObjectMap};
use crate::ruby::RubyRuntime;
use crate::rules::NameRules;
use crate::selector::VersionSelector;
use crate::source::SourceFetcher;
use crate::url::UrlOptions;
use crate::version::Version;

/// Resolution state shared by the link hook and the sub-commands.
///
/// Holds the "current" map for the selected version. The cached map is
/// replaced, never mutated, when the selector starts answering a different
/// version.
pub struct LinkContext {
    selector: VersionSelector,
    data_dir: PathBuf,
    rules: Arc<NameRules>,
    builder: MapBuilder,
    url_options: UrlOptions,
    current: Mutex<Option<Arc<ObjectMap>>>,
}

impl LinkContext {
    pub fn new(selector: VersionSelector, data_dir: PathBuf, builder: MapBuilder) -> Self {
        Self {
            selector,
            data_dir,
            rules: Arc::new(NameRules::stdlib()),
            builder,
            url_options: UrlOptions::default(),
            current: Mutex::new(None),
        }
    }

    /// The production wiring: HTTP downloads, in-process untar, and RDoc
    /// run by the configured interpreter.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let runtime = RubyRuntime::new(settings.ruby_bin.clone());
        let selector =
            VersionSelector::new(settings.project_dir.clone(), settings.fallback, runtime.clone())
                .with_explicit(settings.ruby_version.clone());
        let fetcher = SourceFetcher::new(
            settings.tmp_dir.clone(),
            settings.make_missing,
            Box::new(HttpTransport::new()?),
            Box::new(TarGzUnpacker),
        );
        let builder = MapBuilder::new(fetcher, IndexBuilder::new(Box::new(runtime)));
        Ok(Self::new(selector, settings.data_dir.clone(), builder)
            .with_url_options(settings.url_options.clone()))
    }

    pub fn with_url_options(mut self, options: UrlOptions) -> Self {
        self.url_options = options;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn url_options(&self) -> &UrlOptions {
        &self.url_options
    }

    pub fn selector(&self) -> &VersionSelector {
        &self.selector
    }

    /// Pins the version. The next [`current`](Self::current) call picks it up.
    pub fn set_version(&mut self, version: Version) {
        self.selector.set(version);
    }

    /// The map for the selected version, built first if it is missing.
    pub fn current(&self) -> Result<Arc<ObjectMap>> {
        let version = self.selector.get();
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(map) = current.as_ref()
            && map.version() == &version
        {
            return Ok(Arc::clone(map));
        }

        let map = self.map_for(version);
        map.make(&self.builder, false)?;
        let map = Arc::new(map);
        tracing::debug!("Current object map is now Ruby {}", map.version());
        *current = Some(Arc::clone(&map));
        Ok(map)
    }

    pub fn map_for(&self, version: Version) -> ObjectMap {
        ObjectMap::new(version, &self.data_dir, Arc::clone(&self.rules))
    }

    /// Every persisted map, ascending by version.
    pub fn all(&self) -> Result<Vec<ObjectMap>> {
        object_map::list(&self.data_dir, &self.rules)
    }

    /// Builds the map for `version`, rebuilding it when `force` is set.
    pub fn add(&self, version: Version, force: bool) -> Result<ObjectMap> {
        let map = self.map_for(version);
        map.make(&self.builder, force)?;
        if force {
            // A cached copy of this version would still hold the old data.
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            if current.as_ref().is_some_and(|c| c.version() == map.version()) {
                *current = None;
            }
        }
        Ok(map)
    }

    pub fn url_for(&self, name: &str) -> Result<Option<String>> {
        self.current()?.url_for(name, &self.url_options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, FetchError};
    use crate::index::{MapData, TreeExtractor, write_map};
    use crate::selector::FallbackMode;
    use crate::source::{Transport, Unpacker};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "link_stdlib_context_test_{}_{}_{}",
            std::process::id(),
            nanos,
            name
        ))
    }

    struct Offline;
    impl Transport for Offline {
        fn get(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
            Err(FetchError::Status {
                url: url.to_string(),
                status: 503,
            })
        }
    }
    impl Unpacker for Offline {
        fn unpack(&self, archive: &Path, _dest: &Path) -> std::result::Result<(), FetchError> {
            Err(FetchError::Extract {
                archive: archive.to_path_buf(),
                reason: "offline".to_string(),
            })
        }
    }

    struct NoExtract;
    impl TreeExtractor for NoExtract {
        fn extract(&self, _: &Path, _: &Path) -> std::result::Result<(), crate::error::BuildError> {
            panic!("extraction must not run in this test");
        }
    }

    fn context(base: &Path) -> LinkContext {
        context_with(
            base,
            FallbackMode::LatestStable,
            RubyRuntime::new(base.join("no-ruby")),
        )
    }

    fn context_with(base: &Path, fallback: FallbackMode, runtime: RubyRuntime) -> LinkContext {
        let data_dir = base.join("maps");
        std::fs::create_dir_all(&data_dir).unwrap();
        let selector = VersionSelector::new(base.to_path_buf(), fallback, runtime);
        let builder = MapBuilder::new(
            SourceFetcher::new(base.join("tmp"), false, Box::new(Offline), Box::new(Offline)),
            IndexBuilder::new(Box::new(NoExtract)),
        );
        LinkContext::new(selector, data_dir, builder)
    }

    fn seed(ctx: &LinkContext, version: &str, entries: &[(&str, &str)]) {
        let data: MapData = entries
            .iter()
            .map(|(k, p)| (k.to_string(), Some(p.to_string())))
            .collect();
        let map = ctx.map_for(version.parse().unwrap());
        write_map(map.path(), &data).unwrap();
    }

    #[test]
    fn current_follows_selected_version() -> anyhow::Result<()> {
        let base = temp_dir("current");
        let mut ctx = context(&base);
        seed(&ctx, "2.5.1", &[("String", "String.html")]);
        seed(&ctx, "2.4.0", &[("Fixnum", "Fixnum.html")]);

        let first = ctx.current()?;
        assert_eq!(first.version().to_string(), "2.5.1");
        assert!(Arc::ptr_eq(&first, &ctx.current()?));

        ctx.set_version("2.4.0".parse()?);
        let second = ctx.current()?;
        assert_eq!(second.version().to_string(), "2.4.0");
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(ctx.url_for("Fixnum")?.is_some());
        assert!(ctx.url_for("String")?.is_none());

        let _ = std::fs::remove_dir_all(base);
        Ok(())
    }

    #[test]
    fn short_gemspec_requirement_uses_the_patch_zero_map() -> anyhow::Result<()> {
        let base = temp_dir("short_requirement");
        std::fs::create_dir_all(&base)?;
        std::fs::write(
            base.join("demo.gemspec"),
            "Gem::Specification.new do |s|\n  s.required_ruby_version = '>= 2.3'\nend\n",
        )?;
        let ctx = context(&base);
        seed(&ctx, "2.3.0", &[("String", "String.html")]);
        assert!(ctx.data_dir().join("ruby-2.3.0.json.gz").is_file());

        assert_eq!(ctx.selector().get().to_string(), "2.3.0");
        assert_eq!(
            ctx.url_for("String")?.as_deref(),
            Some("https://docs.ruby-lang.org/en/2.3.0/String.html")
        );
        let names: Vec<String> = std::fs::read_dir(ctx.data_dir())?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["ruby-2.3.0.json.gz"]);

        let _ = std::fs::remove_dir_all(base);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn linking_many_references_probes_the_runtime_once() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let base = temp_dir("probe_once");
        std::fs::create_dir_all(&base)?;
        let calls = base.join("calls");
        let fake_ruby = base.join("ruby");
        std::fs::write(
            &fake_ruby,
            format!(
                "#!/bin/sh\necho x >> '{}'\nprintf '2.5.1'\n",
                calls.display()
            ),
        )?;
        std::fs::set_permissions(&fake_ruby, std::fs::Permissions::from_mode(0o755))?;

        let ctx = context_with(&base, FallbackMode::CurrentRuntime, RubyRuntime::new(fake_ruby));
        seed(&ctx, "2.5.1", &[("String", "String.html")]);

        for _ in 0..10 {
            let linked = crate::link::link_object(&ctx, "String", Some("String"))?;
            assert!(linked.is_some_and(|html| html.contains("2.5.0/String.html")));
        }
        assert_eq!(std::fs::read_to_string(&calls)?.lines().count(), 1);

        let _ = std::fs::remove_dir_all(base);
        Ok(())
    }

    #[test]
    fn url_for_uses_configured_options() -> anyhow::Result<()> {
        let base = temp_dir("options");
        let ctx = context(&base).with_url_options(UrlOptions {
            use_https: false,
            domain: "example.com".to_string(),
            language: "ja".to_string(),
        });
        seed(&ctx, "2.5.1", &[("String", "String.html")]);

        assert_eq!(
            ctx.url_for("String")?.as_deref(),
            Some("http://example.com/ja/2.5.0/String.html")
        );

        let _ = std::fs::remove_dir_all(base);
        Ok(())
    }

    #[test]
    fn missing_map_without_fetching_is_a_config_error() {
        let base = temp_dir("missing");
        let ctx = context(&base);

        let err = ctx.url_for("String").unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{err}");

        let _ = std::fs::remove_dir_all(base);
    }

    #[test]
    fn all_lists_seeded_versions() -> anyhow::Result<()> {
        let base = temp_dir("all");
        let ctx = context(&base);
        seed(&ctx, "2.5.1", &[]);
        seed(&ctx, "2.3.0", &[]);

        let versions: Vec<String> = ctx.all()?.iter().map(|m| m.version().to_string()).collect();
        assert_eq!(versions, vec!["2.3.0", "2.5.1"]);

        let _ = std::fs::remove_dir_all(base);
        Ok(())
    }
}
