//! Incremental search picker.
//!
//! Shows the tracker's default list (assigned issues) right away and refines it with debounced
//! remote searches while the user types. Pinned actions always come first, followed by a
//! separator and the merged issue list.

mod merge;
mod session;

pub use session::SearchSession;
use session::{Resolution, Trigger};

use crate::config::Settings;
use crate::issue::Issue;
use crate::tracker::{self, Tracker};

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Sleep};

/// Invalid or missing user input. Aborts the current step but keeps the flow alive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("Invalid {field} '{value}'")]
    Invalid { field: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerItem {
    Action { id: &'static str, label: String },
    Separator,
    /// Placeholder while the default list loads
    Busy,
    Issue(Issue),
}

impl PickerItem {
    fn is_selectable(&self) -> bool {
        matches!(self, PickerItem::Action { .. } | PickerItem::Issue(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AfterAccept {
    Close,
    /// Informational action: show the message and keep the picker open
    Inform(String),
}

type Handler = Box<dyn FnMut(&str) -> Result<AfterAccept, ValidationError> + Send>;

/// Pinned entry which is never filtered by search
pub struct Action {
    pub id: &'static str,
    pub label: String,
    handler: Handler,
}

impl Action {
    /// Action which closes the picker when accepted
    pub fn new<S: Into<String>>(id: &'static str, label: S) -> Self {
        Self {
            id,
            label: label.into(),
            handler: Box::new(|_| Ok(AfterAccept::Close)),
        }
    }

    /// Handler receives the current query
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&str) -> Result<AfterAccept, ValidationError> + Send + 'static,
    {
        self.handler = Box::new(handler);
        self
    }
}

/// Snapshot handed to the frontend on every change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub query: String,
    pub items: Vec<PickerItem>,
    /// A remote search is in flight
    pub busy: bool,
}

impl View {
    /// Selectable items numbered from 1
    pub fn selectable(&self) -> impl Iterator<Item = (usize, &PickerItem)> {
        self.items
            .iter()
            .filter(|i| i.is_selectable())
            .enumerate()
            .map(|(n, i)| (n + 1, i))
    }

    /// First issue, or the first action if there are no issues
    pub fn highlighted(&self) -> Option<&PickerItem> {
        self.items
            .iter()
            .find(|i| matches!(i, PickerItem::Issue(_)))
            .or_else(|| self.items.iter().find(|i| i.is_selectable()))
    }

    pub fn pick(&self, number: Option<usize>) -> Option<&PickerItem> {
        match number {
            None => self.highlighted(),
            Some(n) => self.selectable().find(|(k, _)| *k == n).map(|(_, i)| i),
        }
    }

    pub fn issues(&self) -> impl Iterator<Item = &Issue> {
        self.items.iter().filter_map(|i| match i {
            PickerItem::Issue(issue) => Some(issue),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Query(String),
    /// Accept the given selectable item number or the highlighted one
    Accept(Option<usize>),
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Issue(Issue),
    Action { id: &'static str, query: String },
    Cancelled,
}

/// User-facing side of the picker and of the flows around it
#[async_trait]
pub trait Frontend: Send {
    fn render(&mut self, view: &View);

    fn notice(&mut self, notice: Notice);

    /// `None` when input is exhausted
    async fn next_input(&mut self) -> Option<Input>;

    /// Free text prompt. `None` means the user aborted.
    async fn ask(&mut self, question: &str, default: &str) -> Option<String>;

    /// Static pick list, returns index into `options`
    async fn choose(&mut self, question: &str, options: &[&str]) -> Option<usize>;

    /// Short usage hint offered as a picker action
    fn help(&self) -> Option<String> {
        None
    }
}

type Search<'a> = BoxFuture<'a, (u64, String, Result<Vec<Issue>, tracker::Error>)>;

async fn maybe<F: Future + Unpin>(fut: Option<&mut F>) -> F::Output {
    match fut {
        Some(f) => f.await,
        None => std::future::pending().await,
    }
}

struct Debounce {
    generation: u64,
    timer: Pin<Box<Sleep>>,
}

pub struct Picker<'a> {
    tracker: &'a dyn Tracker,
    actions: Vec<Action>,
    debounce: Duration,
    threshold: usize,
}

impl<'a> Picker<'a> {
    pub fn new(tracker: &'a dyn Tracker, settings: &Settings) -> Self {
        Self {
            tracker,
            actions: Vec::new(),
            debounce: settings.debounce,
            threshold: settings.search_threshold,
        }
    }

    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    fn view(&self, session: &SearchSession) -> View {
        let actions = self.actions.iter().map(|a| PickerItem::Action {
            id: a.id,
            label: a.label.clone(),
        });
        View {
            query: session.query().to_owned(),
            items: merge::layout(actions, session.issues(), session.is_loading()),
            busy: session.is_searching(),
        }
    }

    /// Runs the accept handler of action `id`. `Some` resolves the picker.
    fn run_action(
        &mut self,
        id: &'static str,
        session: &SearchSession,
        frontend: &mut dyn Frontend,
    ) -> Option<Outcome> {
        let action = self.actions.iter_mut().find(|a| a.id == id)?;
        match (action.handler)(session.query()) {
            Ok(AfterAccept::Close) => Some(Outcome::Action {
                id,
                query: session.query().to_owned(),
            }),
            Ok(AfterAccept::Inform(msg)) => {
                frontend.notice(Notice::Info(msg));
                None
            }
            Err(e) => {
                frontend.notice(Notice::Error(e.to_string()));
                None
            }
        }
    }

    /// Interacts with the user until an item is accepted or the picker is dismissed.
    pub async fn run(mut self, frontend: &mut dyn Frontend) -> Outcome {
        let tracker = self.tracker;
        let mut session = SearchSession::new(self.threshold);
        let mut defaults = Some(tracker.assigned());
        let mut debounce: Option<Debounce> = None;
        let mut searches: FuturesUnordered<Search<'a>> = FuturesUnordered::new();
        frontend.render(&self.view(&session));

        let outcome = loop {
            tokio::select! {
                res = maybe(defaults.as_mut()) => {
                    defaults = None;
                    if let Err(e) = session.defaults_loaded(res) {
                        frontend.notice(Notice::Error(format!(
                            "Cannot load issues from {}: {:#}",
                            tracker.name(),
                            anyhow::Error::from(e)
                        )));
                    }
                }
                _ = maybe(debounce.as_mut().map(|d| &mut d.timer)) => {
                    let fired = debounce.take().and_then(|d| session.debounce_fired(d.generation));
                    if let Some(req) = fired {
                        debug!("Searching for {:?} (generation {})", req.query, req.generation);
                        searches.push(
                            async move {
                                let res = tracker.search(&req.query).await;
                                (req.generation, req.query, res)
                            }
                            .boxed(),
                        );
                    }
                }
                Some((gen, query, res)) = searches.next(), if !searches.is_empty() => {
                    match session.search_resolved(gen, query, res) {
                        Resolution::Applied => (),
                        Resolution::Failed(e) => frontend.notice(Notice::Error(format!(
                            "Search failed: {:#}",
                            anyhow::Error::from(e)
                        ))),
                        Resolution::Stale => {
                            debug!("Discarding stale search result (generation {})", gen);
                            continue;
                        }
                    }
                }
                input = frontend.next_input() => match input {
                    None | Some(Input::Cancel) => break Outcome::Cancelled,
                    Some(Input::Query(q)) => {
                        if let Trigger::Debounce(generation) = session.set_query(&q) {
                            debounce = Some(Debounce {
                                generation,
                                timer: Box::pin(sleep(self.debounce)),
                            });
                        }
                    }
                    Some(Input::Accept(n)) => {
                        let picked = self.view(&session).pick(n).cloned();
                        match picked {
                            Some(PickerItem::Issue(issue)) => break Outcome::Issue(issue),
                            Some(PickerItem::Action { id, .. }) => {
                                if let Some(outcome) = self.run_action(id, &session, frontend) {
                                    break outcome;
                                }
                            }
                            _ => continue,
                        }
                    }
                },
            }
            frontend.render(&self.view(&session));
        };

        session.close();
        // pending timer and in-flight searches are released here
        drop(debounce);
        drop(searches);
        outcome
    }
}
