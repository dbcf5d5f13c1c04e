use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::TmpDirMode;
use crate::selector::FallbackMode;
use crate::version::Version;

#[derive(Debug, Clone, Parser)]
#[command(name = "link-stdlib", version)]
#[command(about = "Link Ruby standard library names to their pages on docs.ruby-lang.org")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the built object maps
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Where Ruby source archives are downloaded and extracted
    #[arg(long, global = true, value_enum, value_name = "MODE")]
    pub tmp_dir: Option<TmpDirMode>,

    /// Version to use when nothing else decides it
    #[arg(long, global = true, value_enum, value_name = "MODE")]
    pub fallback: Option<FallbackMode>,

    /// Ruby interpreter used to run RDoc
    #[arg(long, global = true, value_name = "FILE")]
    pub ruby: Option<PathBuf>,

    /// Project whose gemspecs decide the Ruby version
    #[arg(long, global = true, value_name = "DIR")]
    pub project: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// List Ruby versions with a built object map
    List,
    /// Build object maps for the given Ruby versions
    Add {
        #[arg(required = true, value_name = "VERSION")]
        versions: Vec<Version>,

        /// Rebuild even if the map already exists
        #[arg(short, long)]
        force: bool,
    },
    /// Print the documentation URL for a name
    Url {
        #[command(flatten)]
        version: VersionArgs,

        #[command(flatten)]
        url: UrlArgs,

        name: String,
    },
    /// List known names, optionally filtered
    Search {
        #[command(flatten)]
        version: VersionArgs,

        #[command(flatten)]
        url: UrlArgs,

        /// Treat terms as regular expressions
        #[arg(short, long)]
        regexp: bool,

        /// Print each name's URL next to it
        #[arg(short, long)]
        urls: bool,

        #[arg(short, long, value_enum, default_value_t = SearchFormat::Plain)]
        format: SearchFormat,

        #[arg(value_name = "TERM")]
        terms: Vec<String>,
    },
}

#[derive(Debug, Clone, Args)]
pub struct VersionArgs {
    /// Ruby version to resolve against
    #[arg(short = 'R', long = "ruby-version", value_name = "VERSION")]
    pub ruby_version: Option<Version>,

    /// Download and build the map if it is missing
    #[arg(long)]
    pub make_missing: bool,
}

#[derive(Debug, Clone, Args)]
pub struct UrlArgs {
    /// Use http instead of https
    #[arg(long)]
    pub http: bool,

    #[arg(long, value_name = "HOST")]
    pub domain: Option<String>,

    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum SearchFormat {
    #[value(alias = "p")]
    Plain,
    #[value(alias = "j")]
    Json,
    #[value(alias = "y")]
    Yaml,
}
