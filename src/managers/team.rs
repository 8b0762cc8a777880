use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join3;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::errors::ToolError;
use crate::managers::render::{field, items, settle};
use crate::mcp::catalog::ToolDescriptor;
use crate::mcp::content::ToolResult;
use crate::mcp::schema::{FieldKind, FieldSpec, ParameterSchema};
use crate::services::config::Config;
use crate::services::credentials::TokenSource;
use crate::services::dispatcher::ToolHandler;
use crate::services::logger::Logger;
use crate::services::upstream::{endpoint, Upstream, UpstreamRequest};

#[derive(Debug, Deserialize)]
struct OverviewArgs {
    team_id: Option<String>,
    include_metrics: Option<bool>,
}

/// Everything the overview renders, gathered before any text is produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamSnapshot {
    pub team: Value,
    pub members: Vec<Value>,
    pub projects: Vec<Value>,
    pub metrics: Option<Result<Value, String>>,
    pub retrieved_at: DateTime<Utc>,
}

pub struct TeamOverview {
    config: Arc<Config>,
    upstream: Arc<dyn Upstream>,
    token: TokenSource,
    logger: Logger,
}

impl TeamOverview {
    pub fn new(
        config: Arc<Config>,
        upstream: Arc<dyn Upstream>,
        token: TokenSource,
        logger: Logger,
    ) -> Self {
        Self {
            config,
            upstream,
            token,
            logger: logger.child("team"),
        }
    }

    async fn collect(&self, team_id: &str, include_metrics: bool) -> Result<TeamSnapshot, ToolError> {
        let token = self.token.get_token().await?;
        let base = self.config.tasks_base_url.as_str();
        let get = |segments: &[&str]| -> Result<UpstreamRequest, ToolError> {
            Ok(UpstreamRequest::get(endpoint(base, segments)?).with_bearer(token.as_str()))
        };

        let team_req = get(&["teams", team_id])?;
        let members_req = get(&["teams", team_id, "members"])?;
        let projects_req = get(&["teams", team_id, "projects"])?;
        let (team, members, projects) = join3(
            self.upstream.send(team_req),
            self.upstream.send(members_req),
            self.upstream.send(projects_req),
        )
        .await;
        let team = team?;
        let members = items(&members?, "team members")?;
        let projects = items(&projects?, "projects")?;

        let metrics = if include_metrics {
            let request = get(&["teams", team_id, "metrics"])?;
            Some(match self.upstream.send(request).await {
                Ok(value) => Ok(value),
                Err(err) => {
                    self.logger.warn(
                        "team metrics unavailable",
                        Some(&json!({"team_id": team_id, "error": err.to_string()})),
                    );
                    Err(match err.status() {
                        Some(status) => format!("upstream returned HTTP {}", status),
                        None => err.to_string(),
                    })
                }
            })
        } else {
            None
        };

        Ok(TeamSnapshot {
            team,
            members,
            projects,
            metrics,
            retrieved_at: Utc::now(),
        })
    }
}

pub fn render_overview(snapshot: &TeamSnapshot) -> String {
    let mut out = format!(
        "# Team Overview: {}\n\n",
        field(&snapshot.team, "name", "Unknown team")
    );

    out.push_str("## Team Members\n");
    for member in &snapshot.members {
        let available = member
            .get("available")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        out.push_str(&format!(
            "• {} **{}** - {}\n",
            if available { "🟢" } else { "🔴" },
            field(member, "name", "Unknown"),
            field(member, "role", "Unknown"),
        ));
    }

    out.push_str("\n## Active Projects\n");
    let active: Vec<&Value> = snapshot
        .projects
        .iter()
        .filter(|p| p.get("status").and_then(Value::as_str) == Some("active"))
        .collect();
    if active.is_empty() {
        out.push_str("No active projects\n");
    }
    for project in active {
        out.push_str(&format!(
            "• **{}** - {}% complete\n",
            field(project, "name", "Unknown"),
            field(project, "progress", "N/A"),
        ));
    }

    match &snapshot.metrics {
        Some(Ok(metrics)) => {
            out.push_str("\n## Team Metrics\n");
            out.push_str(&format!(
                "• Tasks completed this week: {}\n",
                field(metrics, "tasks_completed", "N/A")
            ));
            out.push_str(&format!(
                "• Average completion time: {}\n",
                field(metrics, "avg_completion_time", "N/A")
            ));
            out.push_str(&format!(
                "• Team velocity: {}\n",
                field(metrics, "velocity", "N/A")
            ));
        }
        Some(Err(reason)) => {
            out.push_str("\n## Team Metrics\n");
            out.push_str(&format!("_Metrics unavailable: {}_\n", reason));
        }
        None => {}
    }

    out.push_str(&format!(
        "\n*Retrieved at: {}*",
        snapshot.retrieved_at.format("%Y-%m-%d %H:%M UTC")
    ));
    out
}

#[async_trait]
impl ToolHandler for TeamOverview {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "get_team_overview",
            "Team members with availability, active projects and optional performance \
             metrics in one call. Good for \"what is my team working on?\" questions.",
            ParameterSchema::new()
                .field(
                    FieldSpec::new(
                        "team_id",
                        FieldKind::String,
                        "Team identifier (defaults to the primary team)",
                    )
                    .default_value(json!("default")),
                )
                .field(
                    FieldSpec::new(
                        "include_metrics",
                        FieldKind::Boolean,
                        "Include performance metrics",
                    )
                    .default_value(json!(true)),
                ),
        )
    }

    async fn handle(&self, args: Value) -> Result<ToolResult, ToolError> {
        let args: OverviewArgs = serde_json::from_value(args)
            .map_err(|err| ToolError::invalid_params(format!("Invalid get_team_overview arguments: {}", err)))?;
        let team_id = args
            .team_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| "default".to_string());
        let include_metrics = args.include_metrics.unwrap_or(true);
        let outcome = self
            .collect(&team_id, include_metrics)
            .await
            .map(|snapshot| render_overview(&snapshot));
        settle(outcome)
    }
}
