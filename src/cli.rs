//! Definition of CLI flags/sub commands + its option parameters
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "tweetscout",
    about = "Collect posts matching keyword groups into a dedup store"
)]
pub struct CommandLineArgs {
    #[structopt(subcommand)]
    pub action: Option<Action>,

    /// Group whose keywords will be searched
    #[structopt(short, long, conflicts_with = "list")]
    pub group: Option<String>,

    /// List the configured groups and their keywords
    #[structopt(short, long)]
    pub list: bool,

    #[structopt(
        short,
        long,
        help = "The most earliest date for the search e.g. 2025-05-01 (default: 6 days before the end date)"
    )]
    pub start_date: Option<String>,

    #[structopt(
        short,
        long,
        help = "The end of the search, exclusive e.g. 2025-05-07 (default: today)"
    )]
    pub end_date: Option<String>,

    /// Where the raw search responses are written
    #[structopt(parse(from_os_str), short, long, default_value = "tweets.json")]
    pub output: PathBuf,

    /// Use a different config file.
    #[structopt(parse(from_os_str), short, long)]
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, StructOpt)]
pub enum Action {
    #[structopt(about = "Create a group or replace its keywords")]
    AddGroup {
        name: String,
        #[structopt(help = "Comma separated phrases e.g. \"binance kyb, exchange freeze\"")]
        keywords: String,
    },
    #[structopt(about = "Delete a group and every post stored for it")]
    RemoveGroup { name: String },
    #[structopt(about = "Show the stored posts of a group, newest first")]
    Posts {
        group: String,
        #[structopt(short = "n", long, help = "Show at most this many posts")]
        limit: Option<usize>,
    },
}
