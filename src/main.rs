use anyhow::{Result, bail};
use clap::Parser;
use link_stdlib::cli::{Cli, Commands, SearchFormat};
use link_stdlib::config::Settings;
use link_stdlib::context::LinkContext;
use link_stdlib::object_map::ObjectMap;
use link_stdlib::url::UrlOptions;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let settings = Settings::from_cli(&cli)?;
    let ctx = LinkContext::from_settings(&settings)?;
    tracing::debug!("Object maps in {}", ctx.data_dir().display());

    match cli.command {
        Commands::List => {
            for map in ctx.all()? {
                println!("{}", map.version());
            }
        }
        Commands::Add { versions, force } => {
            for version in versions {
                let map = ctx.add(version, force)?;
                println!("{}", map.path().display());
            }
        }
        Commands::Url { name, .. } => match ctx.url_for(&name)? {
            Some(url) => println!("{url}"),
            None => bail!("Name not found: {name:?}"),
        },
        Commands::Search {
            regexp,
            urls,
            format,
            terms,
            ..
        } => {
            let map = ctx.current()?;
            let names = map.grep(&terms, regexp)?;
            let hits = if urls {
                with_urls(&map, names, ctx.url_options())?
            } else {
                names
                    .into_iter()
                    .map(|name| SearchHit { name, url: None })
                    .collect()
            };
            write_search_output(&hits, urls, format)?;
        }
    }

    Ok(())
}

fn init_tracing(cli: &Cli) {
    let level = match cli.verbose {
        0 if matches!(cli.command, Commands::Add { .. }) => "info",
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,link_stdlib={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[derive(Debug, Serialize)]
struct SearchHit {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

fn with_urls(map: &ObjectMap, names: Vec<String>, options: &UrlOptions) -> Result<Vec<SearchHit>> {
    names
        .into_iter()
        .map(|name| -> Result<SearchHit> {
            let url = map.url_for(&name, options)?;
            Ok(SearchHit { name, url })
        })
        .collect()
}

fn write_search_output(hits: &[SearchHit], urls: bool, format: SearchFormat) -> Result<()> {
    match format {
        SearchFormat::Plain => {
            for hit in hits {
                match &hit.url {
                    Some(url) => println!("{} <{}>", hit.name, url),
                    None => println!("{}", hit.name),
                }
            }
        }
        SearchFormat::Json if urls => println!("{}", serde_json::to_string_pretty(hits)?),
        SearchFormat::Json => {
            let names: Vec<&str> = hits.iter().map(|h| h.name.as_str()).collect();
            println!("{}", serde_json::to_string_pretty(&names)?);
        }
        SearchFormat::Yaml if urls => print!("{}", serde_yaml::to_string(hits)?),
        SearchFormat::Yaml => {
            let names: Vec<&str> = hits.iter().map(|h| h.name.as_str()).collect();
            print!("{}", serde_yaml::to_string(&names)?);
        }
    }
    Ok(())
}
