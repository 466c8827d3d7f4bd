//! User-facing commands built on the picker.

use crate::branch;
use crate::config::Settings;
use crate::issue::Issue;
use crate::picker::{Action, AfterAccept, Frontend, Notice, Outcome, Picker, ValidationError};
use crate::shell::{quote, Shell};
use crate::tracker::{Change, Draft, Tracker};

use anyhow::{Context, Result};
use colored::*;
use std::fmt;

const CREATE: &str = "create";
const HELP: &str = "help";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Description,
    Priority,
    State,
}

const FIELDS: [Field; 4] = [Field::Title, Field::Description, Field::Priority, Field::State];

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Title => "Title",
            Field::Description => "Description",
            Field::Priority => "Priority (0 = none, 1 = urgent ... 4 = low)",
            Field::State => "State",
        })
    }
}

fn parse_change(field: Field, value: &str) -> Result<Change, ValidationError> {
    let value = value.trim();
    match field {
        Field::Title if value.is_empty() => Err(ValidationError::Empty("title")),
        Field::Title => Ok(Change::Title(value.to_owned())),
        Field::Description => Ok(Change::Description(value.to_owned())),
        Field::Priority => match value.parse::<u8>() {
            Ok(p) if p <= 4 => Ok(Change::Priority(p)),
            _ => Err(ValidationError::Invalid {
                field: "priority",
                value: value.to_owned(),
            }),
        },
        Field::State if value.is_empty() => Err(ValidationError::Empty("state")),
        Field::State => Ok(Change::State(value.to_owned())),
    }
}

/// Collaborators shared by all flows
pub struct Flows<'a> {
    pub tracker: &'a dyn Tracker,
    pub shell: &'a dyn Shell,
    pub settings: &'a Settings,
}

impl<'a> Flows<'a> {
    fn picker(&self) -> Picker<'a> {
        Picker::new(self.tracker, self.settings)
    }

    /// Picks an issue (or creates one) and checks out a branch for it.
    /// Returns the branch name unless the user aborted.
    ///
    /// An invalid or aborted issue creation returns to the picker.
    pub async fn create_branch(&self, fe: &mut dyn Frontend) -> Result<Option<String>> {
        let issue = loop {
            match self.picker_with_actions(fe).run(fe).await {
                Outcome::Issue(issue) => break issue,
                Outcome::Action { query, .. } => match self.create_issue(fe, &query).await {
                    Ok(Some(issue)) => break issue,
                    Ok(None) => continue,
                    Err(e) => match e.downcast_ref::<ValidationError>() {
                        Some(v) => fe.notice(Notice::Error(v.to_string())),
                        None => return Err(e),
                    },
                },
                Outcome::Cancelled => return Ok(None),
            }
        };
        self.branch_for(fe, &issue).await
    }

    /// Picker with the create action and the frontend's help, if any
    fn picker_with_actions(&self, fe: &dyn Frontend) -> Picker<'a> {
        let create = Action::new(CREATE, "Create new issue...").with_handler(|query| {
            if query.trim().is_empty() {
                Err(ValidationError::Empty("title (type it as query first)"))
            } else {
                Ok(AfterAccept::Close)
            }
        });
        let mut picker = self.picker().action(create);
        if let Some(help) = fe.help() {
            picker = picker.action(
                Action::new(HELP, "Key bindings")
                    .with_handler(move |_| Ok(AfterAccept::Inform(help.clone()))),
            );
        }
        picker
    }

    /// Asks for the branch name, proposing one derived from `issue`
    pub async fn branch_for(&self, fe: &mut dyn Frontend, issue: &Issue) -> Result<Option<String>> {
        let proposed = self.settings.branch.propose(issue);
        let answer = match fe.ask("Branch name", &proposed).await {
            Some(a) => a,
            None => return Ok(None),
        };
        let name = branch::normalize(&answer);
        if name.is_empty() {
            return Err(ValidationError::Empty("branch name").into());
        }
        fe.notice(Notice::Info(format!("Creating branch {}", name)));
        self.checkout(&name).await?;
        Ok(Some(name))
    }

    /// `git checkout -b`, falling back to switching to an existing branch of that name
    async fn checkout(&self, name: &str) -> Result<()> {
        let create = format!("git checkout -b {}", quote(name));
        match self.shell.run(&create).await {
            Ok(_) => Ok(()),
            Err(e) => {
                debug!("{}", e);
                let switch = format!("git checkout {}", quote(name));
                match self.shell.run(&switch).await {
                    Ok(_) => {
                        info!("Switched to existing branch {}", name.green());
                        Ok(())
                    }
                    Err(_) => Err(e.into()),
                }
            }
        }
    }

    /// Prompts for title and description. `proposed_title` is offered as default.
    pub async fn create_issue(
        &self,
        fe: &mut dyn Frontend,
        proposed_title: &str,
    ) -> Result<Option<Issue>> {
        let title = match fe.ask("Issue title", proposed_title.trim()).await {
            Some(t) => t.trim().to_owned(),
            None => return Ok(None),
        };
        if title.is_empty() {
            return Err(ValidationError::Empty("title").into());
        }
        let description = match fe.ask("Description (optional)", "").await {
            Some(d) => Some(d.trim().to_owned()).filter(|d| !d.is_empty()),
            None => return Ok(None),
        };
        let draft = Draft {
            title,
            description,
            team: self.settings.team.clone(),
            assign_to_me: true,
        };
        let issue = self
            .tracker
            .create_issue(&draft)
            .await
            .with_context(|| format!("Cannot create issue in {}", self.tracker.name()))?;
        fe.notice(Notice::Info(format!(
            "Created {} {}",
            issue,
            issue.url.as_deref().unwrap_or_default()
        )));
        Ok(Some(issue))
    }

    /// Looks up the issue named by `branch_name` and opens it unless `print_only`.
    ///
    /// Names like `release-2024-eng-42` contain several candidates; the first one the tracker
    /// knows wins.
    pub async fn open_issue(
        &self,
        fe: &mut dyn Frontend,
        branch_name: &str,
        print_only: bool,
    ) -> Result<Issue> {
        let mut failed = Vec::new();
        for id in branch::identifiers_in(branch_name, self.settings.team.as_deref()) {
            match self.tracker.issue(&id).await {
                Ok(issue) => return self.open_url(fe, issue, print_only).await,
                Err(e) => {
                    debug!("No issue {}: {}", id, e);
                    failed.push((id, e));
                }
            }
        }
        match failed.into_iter().next() {
            Some((id, e)) => Err(anyhow::Error::from(e).context(format!("Cannot look up {}", id))),
            None => Err(ValidationError::Invalid {
                field: "branch (no issue identifier)",
                value: branch_name.to_owned(),
            }
            .into()),
        }
    }

    async fn open_url(&self, fe: &mut dyn Frontend, issue: Issue, print_only: bool) -> Result<Issue> {
        let url = issue
            .url
            .clone()
            .with_context(|| format!("{} has no URL", issue.identifier))?;
        fe.notice(Notice::Info(format!("{}\n{}", issue, url)));
        if !print_only {
            self.shell
                .run(&format!("{} {}", self.settings.opener, quote(&url)))
                .await
                .context("Cannot launch browser")?;
        }
        Ok(issue)
    }

    /// Picks an issue and changes one of its fields
    pub async fn update_issue(&self, fe: &mut dyn Frontend) -> Result<Option<Issue>> {
        let issue = match self.picker().run(fe).await {
            Outcome::Issue(issue) => issue,
            _ => return Ok(None),
        };
        let labels: Vec<String> = FIELDS.iter().map(Field::to_string).collect();
        let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
        let field = match fe.choose(&format!("Update {}", issue), &labels).await {
            Some(n) => FIELDS[n],
            None => return Ok(None),
        };
        let current = match field {
            Field::Title => issue.title.as_str(),
            _ => "",
        };
        let value = match fe.ask(&field.to_string(), current).await {
            Some(v) => v,
            None => return Ok(None),
        };
        let change = parse_change(field, &value)?;
        let updated = self
            .tracker
            .update_issue(&issue.identifier, &change)
            .await
            .with_context(|| format!("Cannot update {}", issue.identifier))?;
        fe.notice(Notice::Info(format!(
            "Updated {}: {}",
            updated.identifier, change
        )));
        Ok(Some(updated))
    }
}
