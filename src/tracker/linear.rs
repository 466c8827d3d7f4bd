use super::{Change, Draft, Tracker};
use crate::config::Settings;
use crate::issue::Issue;

use async_trait::async_trait;
use clap::{crate_name, crate_version};
use reqwest::header::*;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid Linear API response: {res}")]
    API {
        res: String,
        #[source]
        e: serde_json::Error,
    },
    #[error("HTTP request error")]
    Request(#[from] reqwest::Error),
    #[error("Linear API error: {0}")]
    GraphQl(String),
    #[error("Trying to construct invalid HTTP header")]
    Header(#[from] http::header::InvalidHeaderValue),
    #[error("No team '{0}' visible with this API key")]
    NoTeam(String),
    #[error("Workflow state '{0}' does not exist for this issue's team")]
    UnknownState(String),
    #[error("Linear rejected {0}")]
    Rejected(&'static str),
}

type Result<T, E = Error> = std::result::Result<T, E>;

macro_rules! with_issue_fields {
    ($q:literal) => {
        concat!(
            $q,
            r#"
fragment IssueFields on Issue {
  identifier
  title
  branchName
  url
  cycle {
    number
  }
}
"#
        )
    };
}

const ASSIGNED_QUERY: &str = with_issue_fields!(
    r#"
query Assigned($first: Int!) {
  viewer {
    assignedIssues(
      first: $first
      filter: { state: { type: { nin: ["completed", "canceled"] } } }
    ) {
      nodes {
        ...IssueFields
      }
    }
  }
}
"#
);

const SEARCH_QUERY: &str = with_issue_fields!(
    r#"
query Search($term: String!, $first: Int!) {
  searchIssues(term: $term, first: $first) {
    nodes {
      ...IssueFields
    }
  }
}
"#
);

const ISSUE_QUERY: &str = with_issue_fields!(
    r#"
query Issue($id: String!) {
  issue(id: $id) {
    ...IssueFields
  }
}
"#
);

const CREATE_MUTATION: &str = with_issue_fields!(
    r#"
mutation IssueCreate($input: IssueCreateInput!) {
  issueCreate(input: $input) {
    success
    issue {
      ...IssueFields
    }
  }
}
"#
);

const UPDATE_MUTATION: &str = with_issue_fields!(
    r#"
mutation IssueUpdate($id: String!, $input: IssueUpdateInput!) {
  issueUpdate(id: $id, input: $input) {
    success
    issue {
      ...IssueFields
    }
  }
}
"#
);

const VIEWER_QUERY: &str = r#"
query Viewer {
  viewer {
    id
  }
}
"#;

const TEAMS_QUERY: &str = r#"
query Teams {
  teams {
    nodes {
      id
      key
      name
    }
  }
}
"#;

const ISSUE_TEAM_STATES_QUERY: &str = r#"
query IssueTeamStates($id: String!) {
  issue(id: $id) {
    team {
      states {
        nodes {
          id
          name
        }
      }
    }
  }
}
"#;

/// GraphQL response wrapper
#[derive(Deserialize, Debug)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize, Debug)]
struct GraphQlError {
    message: String,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<T> {
        if !self.errors.is_empty() {
            let msg: Vec<String> = self.errors.into_iter().map(|e| e.message).collect();
            return Err(Error::GraphQl(msg.join("; ")));
        }
        self.data
            .ok_or_else(|| Error::GraphQl("response contains no data".to_owned()))
    }
}

#[derive(Deserialize, Debug)]
struct Nodes<T> {
    nodes: Vec<T>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
struct Cycle {
    number: f64,
}

#[derive(Deserialize, Debug)]
struct IssueNode {
    #[serde(flatten)]
    issue: Issue,
    cycle: Option<Cycle>,
}

impl IssueNode {
    fn cycle_number(&self) -> u32 {
        self.cycle.map(|c| c.number as u32).unwrap_or(0)
    }
}

impl From<IssueNode> for Issue {
    fn from(node: IssueNode) -> Self {
        Issue {
            group_label: node.cycle.map(|c| format!("Cycle {}", c.number as u32)),
            ..node.issue
        }
    }
}

#[derive(Deserialize, Debug)]
struct Viewer<T> {
    viewer: T,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Assigned {
    assigned_issues: Nodes<IssueNode>,
}

#[derive(Deserialize, Debug)]
struct Id {
    id: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Searched {
    search_issues: Nodes<IssueNode>,
}

#[derive(Deserialize, Debug)]
struct Single<T> {
    issue: T,
}

#[derive(Deserialize, Debug)]
struct Payload {
    success: bool,
    issue: Option<IssueNode>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Created {
    issue_create: Payload,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Updated {
    issue_update: Payload,
}

impl Payload {
    fn into_issue(self, what: &'static str) -> Result<Issue> {
        match (self.success, self.issue) {
            (true, Some(node)) => Ok(node.into()),
            _ => Err(Error::Rejected(what)),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
struct Team {
    id: String,
    key: String,
    name: String,
}

#[derive(Deserialize, Debug)]
struct Teams {
    teams: Nodes<Team>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
struct State {
    id: String,
    name: String,
}

#[derive(Deserialize, Debug)]
struct TeamStates {
    team: TeamStateNodes,
}

#[derive(Deserialize, Debug)]
struct TeamStateNodes {
    states: Nodes<State>,
}

const DEFAULT_API_URL: &str = "https://api.linear.app/graphql";

/// Keeps only issues in the most recent cycle. Issues without cycle count as cycle 0.
fn current_cycle(nodes: Vec<IssueNode>) -> Vec<IssueNode> {
    let max = nodes.iter().map(IssueNode::cycle_number).max().unwrap_or(0);
    nodes
        .into_iter()
        .filter(|n| n.cycle_number() == max)
        .collect()
}

fn pick_team<'t>(teams: &'t [Team], key: Option<&str>) -> Result<&'t Team> {
    match key {
        Some(key) => teams
            .iter()
            .find(|t| t.key.eq_ignore_ascii_case(key))
            .ok_or_else(|| Error::NoTeam(key.to_owned())),
        None => teams
            .first()
            .ok_or_else(|| Error::NoTeam("<any>".to_owned())),
    }
}

fn create_input(draft: &Draft, team_id: &str, assignee: Option<&str>) -> Value {
    let mut input = Map::new();
    input.insert("teamId".into(), json!(team_id));
    input.insert("title".into(), json!(draft.title));
    if let Some(desc) = &draft.description {
        input.insert("description".into(), json!(desc));
    }
    if let Some(a) = assignee {
        input.insert("assigneeId".into(), json!(a));
    }
    Value::Object(input)
}

/// `state_id` must be resolved beforehand for [`Change::State`]
fn update_input(change: &Change, state_id: Option<&str>) -> Value {
    match change {
        Change::Title(t) => json!({ "title": t }),
        Change::Description(d) => json!({ "description": d }),
        Change::Priority(p) => json!({ "priority": p }),
        Change::State(_) => json!({ "stateId": state_id }),
    }
}

#[derive(Clone)]
pub struct Linear {
    client: Client,
    url: String,
    page_size: u32,
    current_cycle_only: bool,
}

impl fmt::Debug for Linear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Linear")
            .field("url", &self.url)
            .field("page_size", &self.page_size)
            .field("current_cycle_only", &self.current_cycle_only)
            .finish()
    }
}

impl Linear {
    pub fn new(api_key: &str, settings: &Settings) -> Result<Self> {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, api_key.parse()?);
        h.insert(
            USER_AGENT,
            format!("{}/{}", crate_name!(), crate_version!()).parse()?,
        );
        let client = Client::builder().default_headers(h).build()?;
        Ok(Self {
            client,
            url: settings
                .api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_URL.to_owned()),
            page_size: settings.page_size,
            current_cycle_only: settings.current_cycle_only,
        })
    }

    async fn query<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T> {
        let res = self
            .client
            .post(&self.url)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?
            .text()
            .await?;
        let envelope: Envelope<T> =
            serde_json::from_str(&res).map_err(|e| Error::API { res, e })?;
        envelope.into_data()
    }

    async fn viewer_id(&self) -> Result<String> {
        let v: Viewer<Id> = self.query(VIEWER_QUERY, json!({})).await?;
        Ok(v.viewer.id)
    }

    async fn state_id(&self, identifier: &str, name: &str) -> Result<String> {
        let s: Single<TeamStates> = self
            .query(ISSUE_TEAM_STATES_QUERY, json!({ "id": identifier }))
            .await?;
        s.issue
            .team
            .states
            .nodes
            .into_iter()
            .find(|st| st.name.eq_ignore_ascii_case(name))
            .map(|st| st.id)
            .ok_or_else(|| Error::UnknownState(name.to_owned()))
    }
}

#[async_trait]
impl Tracker for Linear {
    async fn assigned(&self) -> Result<Vec<Issue>, super::Error> {
        let v: Viewer<Assigned> = self
            .query(ASSIGNED_QUERY, json!({ "first": self.page_size }))
            .await?;
        let mut nodes = v.viewer.assigned_issues.nodes;
        debug!("{} assigned issues", nodes.len());
        if self.current_cycle_only {
            nodes = current_cycle(nodes);
        }
        Ok(nodes.into_iter().map(Issue::from).collect())
    }

    async fn search(&self, query: &str) -> Result<Vec<Issue>, super::Error> {
        let s: Searched = self
            .query(
                SEARCH_QUERY,
                json!({ "term": query, "first": self.page_size }),
            )
            .await?;
        Ok(s.search_issues.nodes.into_iter().map(Issue::from).collect())
    }

    async fn create_issue(&self, draft: &Draft) -> Result<Issue, super::Error> {
        let t: Teams = self.query(TEAMS_QUERY, json!({})).await?;
        let team = pick_team(&t.teams.nodes, draft.team.as_deref())?;
        debug!("Creating issue in team {} ({})", team.key, team.name);
        let assignee = if draft.assign_to_me {
            Some(self.viewer_id().await?)
        } else {
            None
        };
        let c: Created = self
            .query(
                CREATE_MUTATION,
                json!({ "input": create_input(draft, &team.id, assignee.as_deref()) }),
            )
            .await?;
        Ok(c.issue_create.into_issue("issue creation")?)
    }

    async fn issue(&self, identifier: &str) -> Result<Issue, super::Error> {
        let s: Single<IssueNode> = self.query(ISSUE_QUERY, json!({ "id": identifier })).await?;
        Ok(s.issue.into())
    }

    async fn update_issue(&self, identifier: &str, change: &Change) -> Result<Issue, super::Error> {
        let state_id = match change {
            Change::State(name) => Some(self.state_id(identifier, name).await?),
            _ => None,
        };
        let u: Updated = self
            .query(
                UPDATE_MUTATION,
                json!({ "id": identifier, "input": update_input(change, state_id.as_deref()) }),
            )
            .await?;
        Ok(u.issue_update.into_issue("issue update")?)
    }

    fn name(&self) -> String {
        "Linear".into()
    }
}
