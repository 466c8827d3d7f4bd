#[macro_use]
extern crate log;

mod branch;
mod config;
mod console;
mod flows;
mod issue;
mod picker;
mod shell;
#[cfg(test)]
mod tests;
mod tracker;

use crate::config::Settings;
use crate::console::Console;
use crate::flows::Flows;
use crate::shell::Subprocess;

use anyhow::{bail, Error};
use colored::*;
use env_logger::Env;
use std::path::PathBuf;
use structopt::StructOpt;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, StructOpt)]
#[structopt(
    rename_all = "kebab",
    after_help = "\
    Set RUST_LOG=linear_branch=debug in the environment to get full logging output.
    Tunables are read from LINEAR_BRANCH_* environment variables, see DEBOUNCE_MS,
    SEARCH_THRESHOLD, PAGE_SIZE, CURRENT_CYCLE_ONLY, TEAM, API_URL, OPENER, SLUG_STYLE,
    BRANCH_TITLE, PREFER_TRACKER_BRANCH and BRANCH_MAX_LEN.
    "
)]
pub struct Opt {
    /// Linear personal API key
    ///
    /// Alternatively set the LINEAR_API_KEY environment variable
    #[structopt(short = "k", long, global = true, env = "LINEAR_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    /// Git working copy to operate on
    #[structopt(
        short = "C",
        long,
        global = true,
        value_name = "DIR",
        default_value = ".",
        parse(from_os_str)
    )]
    workdir: PathBuf,
    /// Defaults to `branch`
    #[structopt(subcommand)]
    command: Option<Cmd>,
}

#[derive(Debug, Clone, StructOpt)]
pub enum Cmd {
    /// Picks an issue (or creates one) and checks out a branch for it.
    Branch,
    /// Creates a new issue assigned to yourself.
    Create(Create),
    /// Opens the issue belonging to the current branch in the browser.
    Open(Open),
    /// Changes title, description, priority or state of an issue.
    Update,
}

#[derive(Debug, Clone, StructOpt, Default)]
pub struct Create {
    /// Check out a branch for the new issue afterwards
    #[structopt(short, long)]
    branch: bool,
    /// Proposed issue title
    #[structopt(value_name = "TITLE")]
    title: Vec<String>,
}

#[derive(Debug, Clone, StructOpt, Default)]
pub struct Open {
    /// Only print the issue URL
    #[structopt(short, long)]
    print: bool,
}

async fn run() -> Result<()> {
    dotenv::dotenv().ok();
    let Opt {
        api_key,
        workdir,
        command,
    } = Opt::from_args();
    let settings = Settings::from_env();
    debug!("{:?}", settings);
    let api_key = match api_key {
        Some(k) if !k.trim().is_empty() => k,
        _ => bail!(
            "No Linear API key given either as option or via the LINEAR_API_KEY environment \
             variable"
        ),
    };
    let tracker = tracker::Linear::new(api_key.trim(), &settings)?;
    let shell = Subprocess::new(workdir.clone());
    let flows = Flows {
        tracker: &tracker,
        shell: &shell,
        settings: &settings,
    };
    let mut console = Console::new();
    match command.unwrap_or(Cmd::Branch) {
        Cmd::Branch => {
            if let Some(name) = flows.create_branch(&mut console).await? {
                info!("On branch {}", name.green());
            }
        }
        Cmd::Create(c) => {
            let issue = flows.create_issue(&mut console, &c.title.join(" ")).await?;
            if let (Some(issue), true) = (issue, c.branch) {
                flows.branch_for(&mut console, &issue).await?;
            }
        }
        Cmd::Open(o) => {
            let current = branch::current(&workdir)?;
            flows.open_issue(&mut console, &current, o.print).await?;
        }
        Cmd::Update => {
            flows.update_issue(&mut console).await?;
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    if let Err(err) = run().await {
        for e in err.chain() {
            error!("{}", e);
            // reqwest seems to fold all causes into its head error
            if e.downcast_ref::<reqwest::Error>().is_some() {
                break;
            }
        }
        std::process::exit(1);
    }
}
