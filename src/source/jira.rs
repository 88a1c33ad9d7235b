//! Jira Cloud integration.
//!
//! Reads project metadata, boards, sprints, workflow statuses, and issues
//! through the Jira platform and Jira Software REST APIs.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{
    ItemTypeStatuses, ProjectInfo, RawBoard, RawIssue, RawSprint, SchemaStatus, SourceError,
    SourceResult, TrackerSource, WorkflowSchema,
};
use crate::core::SourceConfig;
use crate::model::{Phase, ProjectKind};

/// Fields requested for every issue.
const ISSUE_FIELDS: &str = "summary,status,issuetype,priority,assignee,created,updated,\
    resolutiondate,statuscategorychangedate,issuelinks,subtasks,parent,flagged,\
    customfield_10016,customfield_10020,customfield_10021,customfield_10026";

/// One column of a board's configuration.
#[derive(Debug, Deserialize)]
struct BoardColumn {
    #[serde(default)]
    max: Option<u32>,
    #[serde(default)]
    statuses: Vec<ColumnStatus>,
}

#[derive(Debug, Deserialize)]
struct ColumnStatus {
    id: String,
}

/// Sum of column maxima over the columns that hold in-progress statuses.
fn in_progress_limit(columns: &[BoardColumn], phases: &HashMap<String, Phase>) -> Option<u32> {
    let limit: u32 = columns
        .iter()
        .filter(|c| c.statuses.iter().any(|s| phases.get(&s.id) == Some(&Phase::InProgress)))
        .filter_map(|c| c.max)
        .sum();
    (limit > 0).then_some(limit)
}

/// Jira API client.
#[derive(Debug, Clone)]
pub struct JiraSource {
    /// Site URL without trailing slash
    base_url: String,
    /// Account email
    email: String,
    /// API token
    token: String,
    /// Maximum issues fetched per refresh
    max_issues: u32,
    /// HTTP client
    client: reqwest::Client,
}

impl JiraSource {
    /// Create a new Jira client.
    pub fn new(
        base_url: impl Into<String>,
        email: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            email: email.into(),
            token: token.into(),
            max_issues: 500,
            client: reqwest::Client::new(),
        }
    }

    /// Create from configuration and the environment.
    ///
    /// `JIRA_BASE_URL` and `JIRA_EMAIL` override the config file;
    /// `JIRA_API_TOKEN` is only read from the environment.
    pub fn from_env(config: &SourceConfig) -> SourceResult<Self> {
        let base_url = std::env::var("JIRA_BASE_URL")
            .ok()
            .or_else(|| config.jira_url.clone())
            .ok_or_else(|| SourceError::NotConfigured("JIRA_BASE_URL is not set".to_string()))?;
        let email = std::env::var("JIRA_EMAIL")
            .ok()
            .or_else(|| config.jira_email.clone())
            .ok_or_else(|| SourceError::NotConfigured("JIRA_EMAIL is not set".to_string()))?;
        let token = std::env::var("JIRA_API_TOKEN")
            .map_err(|_| SourceError::NotConfigured("JIRA_API_TOKEN is not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SourceError::Http(e.to_string()))?;

        let mut source = Self::new(base_url, email, token);
        source.client = client;
        source.max_issues = config.max_issues;
        Ok(source)
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Make an authenticated GET request and decode the JSON body.
    async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> SourceResult<T> {
        let url = self.api_url(path);
        tracing::debug!(url = %url, "Jira request");

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.email, Some(&self.token))
            .header("Accept", "application/json")
            .header("User-Agent", "boardpulse")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::parse_error(response).await);
        }

        let body: serde_json::Value = response.json().await?;
        serde_json::from_value(body).map_err(|e| SourceError::Parse(e.to_string()))
    }

    /// Phase of every status on the site, keyed by status ID.
    async fn status_phases(&self) -> SourceResult<HashMap<String, Phase>> {
        #[derive(Deserialize)]
        struct Category {
            key: String,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Status {
            id: String,
            status_category: Category,
        }

        let statuses: Vec<Status> = self.get("rest/api/3/status").await?;
        Ok(statuses
            .into_iter()
            .map(|s| (s.id, Phase::from_category(&s.status_category.key)))
            .collect())
    }

    /// Parse error response from the Jira API.
    async fn parse_error(response: reqwest::Response) -> SourceError {
        let status = response.status().as_u16();

        match status {
            401 | 403 => SourceError::Unauthorized,
            404 => SourceError::NotFound(response.url().path().to_string()),
            429 => SourceError::RateLimited,
            500..=599 => SourceError::Unavailable(format!("HTTP {}", status)),
            _ => {
                let message = response
                    .json::<serde_json::Value>()
                    .await
                    .ok()
                    .and_then(|v| {
                        v.get("errorMessages")
                            .and_then(|m| m.as_array())
                            .and_then(|m| m.first())
                            .and_then(|m| m.as_str())
                            .map(String::from)
                    })
                    .unwrap_or_else(|| format!("HTTP {}", status));
                SourceError::Api { status, message }
            }
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(Duration::ZERO)
        } else if error.is_decode() {
            Self::Parse(error.to_string())
        } else {
            Self::Http(error.to_string())
        }
    }
}

#[async_trait]
impl TrackerSource for JiraSource {
    fn name(&self) -> &str {
        "jira"
    }

    async fn project(&self, project_key: &str) -> SourceResult<ProjectInfo> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Response {
            key: String,
            #[serde(default)]
            name: String,
            #[serde(default)]
            project_type_key: String,
        }

        let path = format!("rest/api/3/project/{}", urlencoding::encode(project_key));
        let response: Response = self.get(&path).await?;

        Ok(ProjectInfo {
            key: response.key,
            name: response.name,
            kind: ProjectKind::parse(&response.project_type_key),
        })
    }

    async fn boards(&self, project_key: &str) -> SourceResult<Vec<RawBoard>> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Location {
            project_key: Option<String>,
        }

        #[derive(Deserialize)]
        struct Board {
            id: u64,
            #[serde(default)]
            name: String,
            #[serde(rename = "type", default)]
            board_type: String,
            location: Option<Location>,
        }

        #[derive(Deserialize)]
        struct Response {
            values: Vec<Board>,
        }

        let path =
            format!("rest/agile/1.0/board?projectKeyOrId={}", urlencoding::encode(project_key));
        let response: Response = self.get(&path).await?;

        Ok(response
            .values
            .into_iter()
            .map(|b| RawBoard {
                id: b.id,
                name: b.name,
                board_type: b.board_type,
                project_key: b.location.and_then(|l| l.project_key),
            })
            .collect())
    }

    async fn sprints(&self, board_id: u64) -> SourceResult<Vec<RawSprint>> {
        #[derive(Deserialize)]
        struct Response {
            values: Vec<RawSprint>,
        }

        let path = format!("rest/agile/1.0/board/{}/sprint?state=active,future", board_id);
        let response: Response = self.get(&path).await?;
        Ok(response.values)
    }

    async fn board_wip_limit(&self, board_id: u64) -> SourceResult<Option<u32>> {
        #[derive(Deserialize)]
        struct ColumnConfig {
            #[serde(default)]
            columns: Vec<BoardColumn>,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Response {
            column_config: Option<ColumnConfig>,
        }

        let path = format!("rest/agile/1.0/board/{}/configuration", board_id);
        let response: Response = self.get(&path).await?;

        let columns = response.column_config.map(|c| c.columns).unwrap_or_default();
        if columns.iter().all(|c| c.max.is_none()) {
            return Ok(None);
        }

        let phases = self.status_phases().await?;
        Ok(in_progress_limit(&columns, &phases))
    }

    async fn workflow_schema(&self, project_key: &str) -> SourceResult<WorkflowSchema> {
        #[derive(Deserialize)]
        struct Category {
            key: String,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Status {
            name: String,
            status_category: Category,
        }

        #[derive(Deserialize)]
        struct IssueType {
            name: String,
            statuses: Vec<Status>,
        }

        let path = format!("rest/api/3/project/{}/statuses", urlencoding::encode(project_key));
        let issue_types: Vec<IssueType> = self.get(&path).await?;

        let mut schema = WorkflowSchema::default();
        for issue_type in issue_types {
            let statuses: Vec<SchemaStatus> = issue_type
                .statuses
                .into_iter()
                .map(|s| SchemaStatus::new(s.name, s.status_category.key))
                .collect();

            for status in &statuses {
                if !schema.statuses.iter().any(|s| s.name.eq_ignore_ascii_case(&status.name)) {
                    schema.statuses.push(status.clone());
                }
            }
            schema.by_item_type.push(ItemTypeStatuses { item_type: issue_type.name, statuses });
        }

        Ok(schema)
    }

    async fn issues(&self, project_key: &str) -> SourceResult<Vec<RawIssue>> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            issues: Vec<RawIssue>,
            #[serde(default)]
            total: u32,
        }

        let jql = format!("project = \"{}\" ORDER BY updated DESC", project_key);
        let mut issues = Vec::new();
        let mut start_at = 0u32;

        loop {
            let page_size = self.max_issues.saturating_sub(start_at).min(100);
            let path = format!(
                "rest/api/3/search?jql={}&fields={}&expand=changelog&startAt={}&maxResults={}",
                urlencoding::encode(&jql),
                ISSUE_FIELDS,
                start_at,
                page_size
            );
            let page: Response = self.get(&path).await?;
            let fetched = page.issues.len() as u32;
            issues.extend(page.issues);
            start_at += fetched;

            if fetched == 0 || start_at >= page.total || start_at >= self.max_issues {
                break;
            }
        }

        tracing::debug!(project = project_key, count = issues.len(), "Fetched Jira issues");
        Ok(issues)
    }
}
