//! CLI tool for collecting posts that match keyword groups
//! Posts are deduplicated per group in a REST key-value store, raw search responses are kept in a file
use anyhow::{anyhow, Context};
use env_logger::Env;
use log::error;
use std::path::PathBuf;
use structopt::StructOpt;

mod cli;
mod clock;
mod config;
mod dedup_store;
mod error;
mod group_resolver;
mod kv_client;
mod normalizer;
mod scout_app;
mod search_client;
#[cfg(test)]
mod test_server;
mod twitter_object;

use cli::{Action::*, CommandLineArgs};
use clock::{ClockTrait, SystemClock};
use config::ScoutConfig;
use dedup_store::DedupStore;
use error::ScoutError;
use group_resolver::GroupResolver;
use kv_client::KvClient;
use search_client::{DateWindow, SearchClient};

/// Entrypoint Function
///
/// It will use the following environment variables
/// * `TWEETSCOUT_LOG_LEVEL` Log level setting e.g. `TWEETSCOUT_LOG_LEVEL=tweetscout=debug`
/// * `TWITTER_TOKEN` Bearer Token of the search API
/// * `TWITTER_API_BASE` URL of the recent search endpoint
/// * `UPSTASH_REDIS_REST_URL`, `UPSTASH_REDIS_REST_TOKEN` The key-value store holding groups and posts
/// * `SCRAPER_MAX_RESULTS` Posts per search, clamped to 5..=100
fn main() -> anyhow::Result<()> {
    let env = Env::default().filter_or("TWEETSCOUT_LOG_LEVEL", "info");
    env_logger::init_from_env(env);

    let CommandLineArgs {
        action,
        group,
        list,
        start_date,
        end_date,
        output,
        config_file,
    } = CommandLineArgs::from_args();

    let config = match config_file {
        Some(path) => ScoutConfig::load(Some(&path), true),
        None => ScoutConfig::load(find_default_config_file().as_deref(), false),
    }
    .context("Failed to load the configuration")?;

    let kv = KvClient::new(&config.store, config.timeout_secs);
    let resolver = GroupResolver::new(&kv);
    let store = DedupStore::new(&kv);

    let result = match (action, group) {
        (Some(AddGroup { name, keywords }), _) => resolver.add_group(&name, &keywords),
        (Some(RemoveGroup { name }), _) => resolver.remove_group(&name).map(|_| ()),
        (Some(Posts { group, limit }), _) => scout_app::show_posts(&store, &group, limit),
        (None, _) if list => scout_app::list_groups(&resolver),
        (None, Some(group)) => {
            let clock = SystemClock;
            let window = DateWindow::resolve(
                start_date.as_deref(),
                end_date.as_deref(),
                clock.now().date_naive(),
            )?;
            let search = SearchClient::new(&config.search, config.timeout_secs);
            scout_app::ingest_group(
                &resolver, &search, &store, &clock, &group, &window, &output,
            )
            .map(|_| ())
        }
        (None, None) => return Err(anyhow!("Either --group <name> or --list is required.")),
    };

    match result {
        Err(ScoutError::GroupNotFound { group }) => {
            error!("Group {} was not found, check `tweetscout --list`", group);
            std::process::exit(1);
        }
        other => Ok(other?),
    }
}

/// Get the default path of the config file
/// It is only read when it exists
fn find_default_config_file() -> Option<PathBuf> {
    let default_path = ".tweetscout.json";
    home::home_dir().map(|mut path| {
        path.push(default_path);
        path
    })
}
