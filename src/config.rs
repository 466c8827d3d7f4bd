//! Tunables read from `LINEAR_BRANCH_*` environment variables (or `.env`).
//!
//! Lookups never fail: missing keys yield the default, unparsable values are logged and
//! replaced by the default as well.

use crate::branch::BranchPolicy;

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

const PREFIX: &str = "LINEAR_BRANCH_";

/// Reads `PREFIX` + `key` through `lookup`.
pub fn get<F, T>(lookup: F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let var = format!("{}{}", PREFIX, key);
    match lookup(&var) {
        Some(val) => match val.trim().parse() {
            Ok(v) => v,
            Err(e) => {
                warn!("Ignoring invalid value {:?} for {}: {}", val, var, e);
                default
            }
        },
        None => default,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub debounce: Duration,
    /// Remote search is skipped while at least this many items match locally
    pub search_threshold: usize,
    pub page_size: u32,
    pub current_cycle_only: bool,
    /// Team key for new issues
    pub team: Option<String>,
    pub api_url: Option<String>,
    /// Command used to open URLs
    pub opener: String,
    pub branch: BranchPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            search_threshold: 5,
            page_size: 50,
            current_cycle_only: true,
            team: None,
            api_url: None,
            opener: "xdg-open".to_owned(),
            branch: BranchPolicy::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| env::var(k).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let d = Self::default();
        let optional = |key: &str| {
            let v: String = get(&lookup, key, String::new());
            Some(v).filter(|v| !v.is_empty())
        };
        Self {
            debounce: Duration::from_millis(get(
                &lookup,
                "DEBOUNCE_MS",
                d.debounce.as_millis() as u64,
            )),
            search_threshold: get(&lookup, "SEARCH_THRESHOLD", d.search_threshold),
            page_size: get(&lookup, "PAGE_SIZE", d.page_size),
            current_cycle_only: get(&lookup, "CURRENT_CYCLE_ONLY", d.current_cycle_only),
            team: optional("TEAM"),
            api_url: optional("API_URL"),
            opener: get(&lookup, "OPENER", d.opener),
            branch: BranchPolicy {
                style: get(&lookup, "SLUG_STYLE", d.branch.style),
                include_title: get(&lookup, "BRANCH_TITLE", d.branch.include_title),
                prefer_tracker: get(
                    &lookup,
                    "PREFER_TRACKER_BRANCH",
                    d.branch.prefer_tracker,
                ),
                max_len: get(&lookup, "BRANCH_MAX_LEN", d.branch.max_len),
            },
        }
    }
}
