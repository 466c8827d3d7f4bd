//! Shared test fakes

use crate::issue::Issue;
use crate::picker::{Frontend, Input, Notice, View};
use crate::shell::{self, Shell};
use crate::tracker::{self, linear, Change, Draft, Tracker};

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use subprocess::ExitStatus;
use tokio::sync::mpsc;
use tokio::time::sleep;

pub fn issues(list: &[(&str, &str)]) -> Vec<Issue> {
    list.iter().map(|(id, title)| Issue::new(id, title)).collect()
}

pub fn failure() -> tracker::Error {
    linear::Error::GraphQl("service unavailable".into()).into()
}

/// In-memory tracker with configurable search latency
#[derive(Default)]
pub struct FakeTracker {
    defaults: Vec<Issue>,
    fail_defaults: bool,
    results: HashMap<String, (u64, Vec<Issue>)>,
    failing: HashMap<String, u64>,
    known: Vec<Issue>,
    searches: Mutex<Vec<String>>,
    pub created: Mutex<Vec<Draft>>,
    pub updated: Mutex<Vec<(String, Change)>>,
}

impl FakeTracker {
    pub fn with_defaults(defaults: Vec<Issue>) -> Self {
        Self {
            defaults,
            ..Self::default()
        }
    }

    pub fn failing_defaults() -> Self {
        Self {
            fail_defaults: true,
            ..Self::default()
        }
    }

    /// Search for `query` answers after `delay` ms
    pub fn result(mut self, query: &str, delay: u64, issues: Vec<Issue>) -> Self {
        self.results.insert(query.to_owned(), (delay, issues));
        self
    }

    pub fn failure(mut self, query: &str, delay: u64) -> Self {
        self.failing.insert(query.to_owned(), delay);
        self
    }

    /// Issues found by identifier lookups
    pub fn knows(mut self, issue: Issue) -> Self {
        self.known.push(issue);
        self
    }

    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tracker for FakeTracker {
    async fn assigned(&self) -> Result<Vec<Issue>, tracker::Error> {
        if self.fail_defaults {
            Err(failure())
        } else {
            Ok(self.defaults.clone())
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<Issue>, tracker::Error> {
        self.searches.lock().unwrap().push(query.to_owned());
        if let Some(delay) = self.failing.get(query) {
            sleep(Duration::from_millis(*delay)).await;
            return Err(failure());
        }
        let (delay, res) = self.results.get(query).cloned().unwrap_or_default();
        sleep(Duration::from_millis(delay)).await;
        Ok(res)
    }

    async fn create_issue(&self, draft: &Draft) -> Result<Issue, tracker::Error> {
        let mut created = self.created.lock().unwrap();
        created.push(draft.clone());
        Ok(Issue {
            url: Some(format!("https://linear.app/t/issue/NEW-{}", created.len())),
            ..Issue::new(&format!("NEW-{}", created.len()), &draft.title)
        })
    }

    async fn issue(&self, identifier: &str) -> Result<Issue, tracker::Error> {
        self.known
            .iter()
            .chain(self.defaults.iter())
            .find(|i| i.identifier == identifier)
            .cloned()
            .ok_or_else(|| linear::Error::GraphQl("Entity not found".into()).into())
    }

    async fn update_issue(&self, identifier: &str, change: &Change) -> Result<Issue, tracker::Error> {
        let mut issue = self.issue(identifier).await?;
        if let Change::Title(t) = change {
            issue.title = t.clone();
        }
        self.updated
            .lock()
            .unwrap()
            .push((identifier.to_owned(), change.clone()));
        Ok(issue)
    }

    fn name(&self) -> String {
        "Fake".into()
    }
}

/// Frontend fed from a timed script. Prompts are answered from queues.
pub struct Scripted {
    inputs: mpsc::UnboundedReceiver<Input>,
    answers: VecDeque<Option<String>>,
    choices: VecDeque<Option<usize>>,
    pub views: Vec<View>,
    pub notices: Vec<Notice>,
    /// Questions asked so far, with their proposed defaults
    pub asked: Vec<(String, String)>,
    help: Option<String>,
}

impl Scripted {
    /// Each input is sent after waiting the given number of ms. Input ends after the last one.
    pub fn new(script: Vec<(u64, Input)>) -> Self {
        let (tx, inputs) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            for (delay, input) in script {
                sleep(Duration::from_millis(delay)).await;
                if tx.send(input).is_err() {
                    break;
                }
            }
        });
        Self {
            inputs,
            answers: VecDeque::new(),
            choices: VecDeque::new(),
            views: Vec::new(),
            notices: Vec::new(),
            asked: Vec::new(),
            help: None,
        }
    }

    pub fn with_help(mut self, text: &str) -> Self {
        self.help = Some(text.to_owned());
        self
    }

    /// Answer to the next text prompt; `Some("")` accepts the default
    pub fn answer(mut self, a: Option<&str>) -> Self {
        self.answers.push_back(a.map(String::from));
        self
    }

    pub fn choice(mut self, c: Option<usize>) -> Self {
        self.choices.push_back(c);
        self
    }
}

#[async_trait]
impl Frontend for Scripted {
    fn render(&mut self, view: &View) {
        self.views.push(view.clone());
    }

    fn notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    async fn next_input(&mut self) -> Option<Input> {
        self.inputs.recv().await
    }

    async fn ask(&mut self, question: &str, default: &str) -> Option<String> {
        self.asked.push((question.to_owned(), default.to_owned()));
        match self.answers.pop_front().flatten() {
            Some(a) if a.is_empty() => Some(default.to_owned()),
            a => a,
        }
    }

    async fn choose(&mut self, _question: &str, options: &[&str]) -> Option<usize> {
        self.choices
            .pop_front()
            .flatten()
            .filter(|c| *c < options.len())
    }

    fn help(&self) -> Option<String> {
        self.help.clone()
    }
}

/// Records commands; commands listed in `failing` exit with status 1
#[derive(Default)]
pub struct RecordingShell {
    failing: HashSet<String>,
    pub commands: Mutex<Vec<String>>,
}

impl RecordingShell {
    pub fn failing(commands: &[&str]) -> Self {
        Self {
            failing: commands.iter().map(|c| c.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl Shell for RecordingShell {
    async fn run(&self, command: &str) -> Result<String, shell::Error> {
        self.commands.lock().unwrap().push(command.to_owned());
        if self.failing.contains(command) {
            Err(shell::Error::Failed {
                command: command.to_owned(),
                status: ExitStatus::Exited(1),
                output: "fatal: simulated".into(),
            })
        } else {
            Ok(String::new())
        }
    }
}
