extern crate chrono;
extern crate directories;
extern crate easy_error;
extern crate ego_tree;
extern crate encoding_rs;
extern crate epub_builder;
#[macro_use]
extern crate html5ever;
extern crate html_escape;
#[macro_use]
extern crate lazy_static;
extern crate markup5ever;
#[cfg(test)]
extern crate proptest;
extern crate regex;
extern crate reqwest;
extern crate scraper;
extern crate structopt;
#[cfg(test)]
extern crate tempfile;
extern crate thiserror;
extern crate tracing;
extern crate tracing_subscriber;
extern crate xml5ever;

mod adapters;
mod cached_client;
mod dates;
mod dom_manipulation;
mod epub;
mod error;
mod html_utils;
mod normalize;
mod story;
mod xml_utils;

use adapters::{adapter_for_url, AdapterConfig};
use cached_client::CachedClient;
use directories::ProjectDirs;
use easy_error::{Error, ResultExt};
use std::path::PathBuf;
use structopt::StructOpt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Downloads stories from nifty.org and converts them to EPUB format.
#[derive(StructOpt)]
struct Args {
    /// Story URL, e.g. http://www.nifty.org/nifty/genre/category/story-title
    url: String,
    /// Confirm that you are an adult. Nothing is downloaded without it.
    #[structopt(long)]
    is_adult: bool,
    /// Do not read or write the page cache.
    #[structopt(long)]
    no_cache: bool,
    /// Where to write the EPUB. Defaults to the lowercased story title.
    #[structopt(short, long, parse(from_os_str))]
    output: Option<PathBuf>,
    /// Log debug output. RUST_LOG takes precedence.
    #[structopt(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Error> {
    let args = Args::from_args();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact());

    tracing::subscriber::with_default(subscriber, || run(args))
}

fn run(args: Args) -> Result<(), Error> {
    let cache_dir = if args.no_cache {
        None
    } else {
        ProjectDirs::from("org", "Nifty", "nifty-scraper").map(|dirs| dirs.cache_dir().to_path_buf())
    };
    if let Some(ref cache_path) = cache_dir {
        println!("Using cache directory: {:?}", cache_path);
    }
    let client = CachedClient::new(cache_dir).context("Could not create cache directory")?;

    let config = AdapterConfig {
        is_adult: args.is_adult,
        ..AdapterConfig::default()
    };
    let span = tracing::info_span!("story", url = %args.url);
    let mut adapter = adapter_for_url(&args.url, config, &client, span).context("Unsupported story URL")?;
    adapter
        .extract_chapter_urls_and_metadata()
        .context(format!("Could not read story at {}", args.url))?;

    let story = adapter.story();
    println!("Found {} by {} ({} chapters)", story.title, story.author, story.num_chapters);

    let builder = epub::build_book(&*adapter)?;
    let path = args
        .output
        .unwrap_or_else(|| PathBuf::from(story.title.to_lowercase() + ".epub"));
    epub::write_book(builder, &path)?;
    println!("Done downloading {}", story.title);
    Ok(())
}
