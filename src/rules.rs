//! Name fix-ups applied when a direct lookup misses.
//!
//! Aliases swap a facade namespace for the one that really implements it.
//! Rewrite rules recover names RDoc records under a different key than the
//! one people write, e.g. module functions it only lists as instance
//! methods (`Math#sqrt` rather than `Math::sqrt`).

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Modules whose methods are `module_function`s, callable on the module.
const MODULE_FUNCTION_HOLDERS: &[&str] = &[
    "Kernel",
    "Math",
    "Process",
    "Signal",
    "GC",
    "ObjectSpace",
    "Marshal",
    "FileUtils",
    "FileTest",
    "Open3",
    "Shellwords",
    "Base64",
    "Etc",
    "Benchmark",
];

static MODULE_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    let holders = MODULE_FUNCTION_HOLDERS.join("|");
    Regex::new(&format!(r"^({holders})#([^#:.\s]+)$")).expect("static regex")
});

static SINGLETON_METHOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z][\w:]*)::([a-z_][\w]*[?!=]?)$").expect("static regex")
});

pub type Transform = fn(&Captures<'_>) -> String;

pub struct RewriteRule {
    name: &'static str,
    matcher: Regex,
    transform: Transform,
}

impl RewriteRule {
    pub fn new(name: &'static str, matcher: Regex, transform: Transform) -> Self {
        Self {
            name,
            matcher,
            transform,
        }
    }

    pub fn apply(&self, input: &str) -> Option<String> {
        self.matcher
            .captures(input)
            .map(|caps| (self.transform)(&caps))
    }
}

impl std::fmt::Debug for RewriteRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewriteRule")
            .field("name", &self.name)
            .field("matcher", &self.matcher.as_str())
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct NameRules {
    aliases: HashMap<String, String>,
    rewrites: Vec<RewriteRule>,
}

impl NameRules {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The rules used against the Ruby standard library.
    pub fn stdlib() -> Self {
        Self::empty()
            .with_alias("YAML", "Psych")
            .with_rewrite(RewriteRule::new(
                "module-function",
                MODULE_FUNCTION.clone(),
                |caps| format!("{}::{}", &caps[1], &caps[2]),
            ))
            .with_rewrite(RewriteRule::new(
                "singleton-dot",
                SINGLETON_METHOD.clone(),
                |caps| format!("{}.{}", &caps[1], &caps[2]),
            ))
    }

    pub fn with_alias(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.aliases.insert(from.into(), to.into());
        self
    }

    pub fn with_rewrite(mut self, rule: RewriteRule) -> Self {
        self.rewrites.push(rule);
        self
    }

    /// Replaces the leading namespace with its alias, if it has one.
    pub fn dealias(&self, name: &str) -> Option<String> {
        let split = first_separator(name).unwrap_or(name.len());
        let (head, tail) = name.split_at(split);
        self.aliases.get(head).map(|real| format!("{real}{tail}"))
    }

    /// Applies the first rule that matches.
    pub fn rewrite(&self, name: &str) -> Option<String> {
        self.rewrites.iter().find_map(|rule| rule.apply(name))
    }

    pub fn has_rewrites(&self) -> bool {
        !self.rewrites.is_empty()
    }
}

fn first_separator(name: &str) -> Option<usize> {
    ["::", "#", "."]
        .iter()
        .filter_map(|sep| name.find(sep))
        .min()
}

/// Trims whitespace and a leading top-level scope marker (`::String`).
pub fn normalize_name(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed.strip_prefix("::").unwrap_or(trimmed).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_scope_marker() {
        assert_eq!(normalize_name("  ::String#upcase "), "String#upcase");
        assert_eq!(normalize_name("String"), "String");
    }

    #[test]
    fn dealias_swaps_first_segment_only() {
        let rules = NameRules::stdlib();
        assert_eq!(rules.dealias("YAML::load").as_deref(), Some("Psych::load"));
        assert_eq!(rules.dealias("YAML.dump").as_deref(), Some("Psych.dump"));
        assert_eq!(rules.dealias("YAML").as_deref(), Some("Psych"));
        assert_eq!(rules.dealias("YAMLish::load"), None);
        assert_eq!(rules.dealias("Foo::YAML"), None);
    }

    #[test]
    fn module_functions_gain_a_scoped_form() {
        let rules = NameRules::stdlib();
        assert_eq!(rules.rewrite("Math#sqrt").as_deref(), Some("Math::sqrt"));
        assert_eq!(rules.rewrite("String#upcase"), None);
    }

    #[test]
    fn singleton_methods_gain_a_dotted_form() {
        let rules = NameRules::stdlib();
        assert_eq!(rules.rewrite("File::join").as_deref(), Some("File.join"));
        assert_eq!(
            rules.rewrite("Net::HTTP::get_response").as_deref(),
            Some("Net::HTTP.get_response")
        );
        assert_eq!(rules.rewrite("Net::HTTP"), None);
    }

    #[test]
    fn first_matching_rule_wins() {
        let rules = NameRules::empty()
            .with_rewrite(RewriteRule::new(
                "first",
                Regex::new("^A$").unwrap(),
                |_| "one".to_string(),
            ))
            .with_rewrite(RewriteRule::new(
                "second",
                Regex::new("^A$").unwrap(),
                |_| "two".to_string(),
            ));
        assert_eq!(rules.rewrite("A").as_deref(), Some("one"));
    }
}
