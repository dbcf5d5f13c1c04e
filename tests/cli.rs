use link_stdlib::index::{MapData, write_map};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "link_stdlib_it_{}_{}_{}",
        std::process::id(),
        nanos,
        name
    ))
}

fn write_file(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

fn seed_map(data_dir: &Path, version: &str, entries: &[(&str, Option<&str>)]) -> anyhow::Result<()> {
    let data: MapData = entries
        .iter()
        .map(|(k, p)| (k.to_string(), p.map(str::to_string)))
        .collect();
    write_map(&data_dir.join(format!("ruby-{version}.json.gz")), &data)?;
    Ok(())
}

fn run(base: &Path, args: &[&str]) -> anyhow::Result<Output> {
    let bin = env!("CARGO_BIN_EXE_link-stdlib");
    let data_dir = base.join("maps");
    let mut cmd = Command::new(bin);
    cmd.args(args)
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("--project")
        .arg(base)
        .arg("--tmp-dir")
        .arg("project");
    for var in [
        "LINK_STDLIB_DATA_DIR",
        "LINK_STDLIB_TMP_DIR",
        "LINK_STDLIB_FALLBACK",
        "LINK_STDLIB_RUBY",
        "LINK_STDLIB_RUBY_VERSION",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    Ok(cmd.output()?)
}

fn run_ok(base: &Path, args: &[&str]) -> anyhow::Result<String> {
    let out = run(base, args)?;
    if !out.status.success() {
        return Err(anyhow::anyhow!(
            "command failed: status={:?}, stderr={}",
            out.status.code(),
            String::from_utf8_lossy(&out.stderr)
        ));
    }
    Ok(String::from_utf8(out.stdout)?)
}

fn fixture(name: &str) -> anyhow::Result<PathBuf> {
    let base = temp_dir(name);
    let data_dir = base.join("maps");
    std::fs::create_dir_all(&data_dir)?;
    seed_map(
        &data_dir,
        "2.5.1",
        &[
            ("String", Some("String.html")),
            ("String#upcase", Some("String.html#method-i-upcase")),
            ("Psych::load", Some("Psych.html#method-c-load")),
            ("Math::sqrt", Some("Math.html#method-c-sqrt")),
            ("Comparable", None),
        ],
    )?;
    seed_map(&data_dir, "2.3.0", &[("String", Some("String.html"))])?;
    std::fs::write(data_dir.join("README"), "not a map")?;
    Ok(base)
}

#[test]
fn list_prints_versions_ascending() -> anyhow::Result<()> {
    let base = fixture("list")?;
    assert_eq!(run_ok(&base, &["list"])?, "2.3.0\n2.5.1\n");
    let _ = std::fs::remove_dir_all(base);
    Ok(())
}

#[test]
fn url_resolves_direct_alias_and_rewritten_names() -> anyhow::Result<()> {
    let base = fixture("url")?;

    assert_eq!(
        run_ok(&base, &["url", "-R", "2.5.1", "String"])?.trim(),
        "https://docs.ruby-lang.org/en/2.5.0/String.html"
    );
    assert_eq!(
        run_ok(&base, &["url", "-R", "2.5.1", "YAML::load"])?.trim(),
        "https://docs.ruby-lang.org/en/2.5.0/Psych.html#method-c-load"
    );
    assert_eq!(
        run_ok(&base, &["url", "-R", "2.5.1", "Math#sqrt"])?.trim(),
        "https://docs.ruby-lang.org/en/2.5.0/Math.html#method-c-sqrt"
    );
    assert_eq!(
        run_ok(
            &base,
            &[
                "url", "-R", "2.5.1", "--http", "--domain", "example.com", "--language", "ja",
                "String",
            ]
        )?
        .trim(),
        "http://example.com/ja/2.5.0/String.html"
    );

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}

#[test]
fn url_uses_gemspec_version_without_override() -> anyhow::Result<()> {
    let base = fixture("gemspec")?;
    write_file(
        &base.join("demo.gemspec"),
        "Gem::Specification.new do |s|\n  s.required_ruby_version = '>= 2.3.0'\nend\n",
    )?;

    assert_eq!(
        run_ok(&base, &["url", "String"])?.trim(),
        "https://docs.ruby-lang.org/en/2.3.0/String.html"
    );

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}

#[test]
fn url_for_unknown_name_fails() -> anyhow::Result<()> {
    let base = fixture("unknown")?;

    for name in ["TotallyUnknownThing", "Comparable"] {
        let out = run(&base, &["url", "-R", "2.5.1", name])?;
        assert!(!out.status.success());
        assert!(out.stdout.is_empty());
        let stderr = String::from_utf8_lossy(&out.stderr);
        assert!(stderr.contains("Name not found"), "{stderr}");
    }

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}

#[test]
fn url_for_unbuilt_version_without_make_missing_fails() -> anyhow::Result<()> {
    let base = fixture("unbuilt")?;

    let out = run(&base, &["url", "-R", "2.4.4", "String"])?;
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("fetching is disabled"), "{stderr}");

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}

#[test]
fn search_formats() -> anyhow::Result<()> {
    let base = fixture("search")?;

    let plain = run_ok(&base, &["search", "-R", "2.5.1", "String"])?;
    assert_eq!(plain, "String\nString#upcase\n");

    let with_urls = run_ok(&base, &["search", "-R", "2.5.1", "-u", "upcase"])?;
    assert_eq!(
        with_urls.trim(),
        "String#upcase <https://docs.ruby-lang.org/en/2.5.0/String.html#method-i-upcase>"
    );

    let json: Value = serde_json::from_str(&run_ok(
        &base,
        &["search", "-R", "2.5.1", "--format", "json", "--regexp", "^(Psych|Math)::"],
    )?)?;
    assert_eq!(json, serde_json::json!(["Math::sqrt", "Psych::load"]));

    let json_urls: Value = serde_json::from_str(&run_ok(
        &base,
        &["search", "-R", "2.5.1", "-f", "j", "-u", "Comparable"],
    )?)?;
    assert_eq!(json_urls, serde_json::json!([{ "name": "Comparable" }]));

    let yaml = run_ok(&base, &["search", "-R", "2.5.1", "-f", "yaml", "sqrt"])?;
    let parsed: Vec<String> = serde_yaml::from_str(&yaml)?;
    assert_eq!(parsed, vec!["Math::sqrt"]);

    let all = run_ok(&base, &["search", "-R", "2.5.1"])?;
    assert_eq!(all.lines().count(), 5);

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}

#[test]
fn invalid_data_dir_is_rejected() -> anyhow::Result<()> {
    let base = temp_dir("no_data_dir");
    std::fs::create_dir_all(&base)?;

    let out = run(&base, &["list"])?;
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("custom data dir"), "{stderr}");

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}

#[cfg(unix)]
#[test]
fn add_builds_map_with_ruby_then_url_resolves() -> anyhow::Result<()> {
    let base = temp_dir("add");
    std::fs::create_dir_all(base.join("maps"))?;
    let src = base.join("tmp").join("link-stdlib").join("ruby-2_5_1");
    write_file(&src.join("widget.rb"), "class Widget; def spin; end; end\n")?;

    let fake_ruby = base.join("bin").join("ruby");
    write_file(
        &fake_ruby,
        r#"#!/bin/sh
set -e
[ -f widget.rb ] || { echo "not in source tree" >&2; exit 3; }
cat > "$4" <<'EOF'
[
  {
    "full_name": "Widget",
    "path": "Widget.html",
    "class_methods": [{"full_name": "Widget::build", "path": "Widget.html#method-c-build"}],
    "instance_methods": [{"full_name": "Widget#spin", "path": "Widget.html#method-i-spin"}]
  }
]
EOF
"#,
    )?;
    make_executable(&fake_ruby)?;
    let ruby = fake_ruby.to_string_lossy().to_string();

    let added = run_ok(&base, &["add", "2.5.1", "--ruby", &ruby])?;
    assert!(added.trim().ends_with("ruby-2.5.1.json.gz"), "{added}");
    assert_eq!(run_ok(&base, &["list"])?, "2.5.1\n");

    assert_eq!(
        run_ok(&base, &["url", "-R", "2.5.1", "Widget#spin"])?.trim(),
        "https://docs.ruby-lang.org/en/2.5.0/Widget.html#method-i-spin"
    );

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}

#[cfg(unix)]
#[test]
fn failing_extraction_reports_stderr() -> anyhow::Result<()> {
    let base = temp_dir("add_fail");
    std::fs::create_dir_all(base.join("maps"))?;
    std::fs::create_dir_all(base.join("tmp").join("link-stdlib").join("ruby-2_5_1"))?;

    let fake_ruby = base.join("bin").join("ruby");
    write_file(&fake_ruby, "#!/bin/sh\necho 'rdoc exploded' >&2\nexit 1\n")?;
    make_executable(&fake_ruby)?;
    let ruby = fake_ruby.to_string_lossy().to_string();

    let out = run(&base, &["add", "2.5.1", "--ruby", &ruby])?;
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("rdoc exploded"), "{stderr}");
    assert_eq!(run_ok(&base, &["list"])?, "");

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}
