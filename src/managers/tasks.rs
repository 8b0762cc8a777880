use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::constants::limits::TASK_LIST_PREVIEW;
use crate::errors::ToolError;
use crate::managers::render::{field, items, required_field, settle};
use crate::mcp::catalog::ToolDescriptor;
use crate::mcp::content::ToolResult;
use crate::mcp::schema::{FieldKind, FieldSpec, ParameterSchema};
use crate::services::config::Config;
use crate::services::credentials::TokenSource;
use crate::services::dispatcher::ToolHandler;
use crate::services::upstream::{endpoint, Upstream, UpstreamRequest};
use crate::utils::tool_errors::unknown_operation_error;

const TOOL_NAME: &str = "manage_task";
const OPERATIONS: [&str; 4] = ["create", "update", "get", "list"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskStatus {
    fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
}

/// Only the fields the caller supplied; absent ones never reach the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskCommand {
    Create(NewTask),
    Update { task_id: String, patch: TaskPatch },
    Get { task_id: String },
    List { status: Option<TaskStatus> },
}

#[derive(Debug, Deserialize)]
struct TaskArgs {
    operation: String,
    task_id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    status: Option<TaskStatus>,
    priority: Option<TaskPriority>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl TaskCommand {
    pub fn parse(args: Value) -> Result<Self, ToolError> {
        let args: TaskArgs = serde_json::from_value(args)
            .map_err(|err| ToolError::invalid_params(format!("Invalid manage_task arguments: {}", err)))?;
        match args.operation.as_str() {
            "create" => {
                let title = non_empty(args.title)
                    .ok_or_else(|| ToolError::invalid_params("title is required for create operations"))?;
                Ok(TaskCommand::Create(NewTask {
                    title,
                    description: args.description.unwrap_or_default(),
                    status: args.status.unwrap_or(TaskStatus::Todo),
                    priority: args.priority.unwrap_or(TaskPriority::Medium),
                }))
            }
            "update" => {
                let task_id = non_empty(args.task_id)
                    .ok_or_else(|| ToolError::invalid_params("task_id is required for update operations"))?;
                Ok(TaskCommand::Update {
                    task_id,
                    patch: TaskPatch {
                        title: args.title,
                        description: args.description,
                        status: args.status,
                        priority: args.priority,
                    },
                })
            }
            "get" => {
                let task_id = non_empty(args.task_id)
                    .ok_or_else(|| ToolError::invalid_params("task_id is required for get operations"))?;
                Ok(TaskCommand::Get { task_id })
            }
            "list" => Ok(TaskCommand::List {
                status: args.status,
            }),
            other => Err(unknown_operation_error(TOOL_NAME, other, &OPERATIONS)),
        }
    }
}

pub struct TaskManager {
    config: Arc<Config>,
    upstream: Arc<dyn Upstream>,
    token: TokenSource,
}

impl TaskManager {
    pub fn new(config: Arc<Config>, upstream: Arc<dyn Upstream>, token: TokenSource) -> Self {
        Self {
            config,
            upstream,
            token,
        }
    }

    async fn execute(&self, command: TaskCommand) -> Result<String, ToolError> {
        let token = self.token.get_token().await?;
        let base = self.config.tasks_base_url.as_str();
        match command {
            TaskCommand::Create(task) => {
                let body = serde_json::to_value(&task)?;
                let request = UpstreamRequest::post(endpoint(base, &["tasks"])?, body).with_bearer(token);
                let created = self.upstream.send(request).await?;
                render_saved("✅ Task created successfully!", &created)
            }
            TaskCommand::Update { task_id, patch } => {
                let body = serde_json::to_value(&patch)?;
                let request = UpstreamRequest::patch(endpoint(base, &["tasks", task_id.as_str()])?, body)
                    .with_bearer(token);
                let updated = self.upstream.send(request).await?;
                render_saved("✅ Task updated successfully!", &updated)
            }
            TaskCommand::Get { task_id } => {
                let request = UpstreamRequest::get(endpoint(base, &["tasks", task_id.as_str()])?).with_bearer(token);
                let task = self.upstream.send(request).await?;
                render_details(&task)
            }
            TaskCommand::List { status } => {
                let mut request = UpstreamRequest::get(endpoint(base, &["tasks"])?).with_bearer(token);
                if let Some(status) = status {
                    request = request.with_query("status", status.as_str());
                }
                let payload = self.upstream.send(request).await?;
                render_list(&items(&payload, "tasks")?)
            }
        }
    }
}

fn render_saved(headline: &str, task: &Value) -> Result<String, ToolError> {
    Ok(format!(
        "{}\n\n**Task ID**: {}\n**Title**: {}\n**Status**: {}\n**Priority**: {}",
        headline,
        required_field(task, "id")?,
        required_field(task, "title")?,
        required_field(task, "status")?,
        required_field(task, "priority")?,
    ))
}

fn render_details(task: &Value) -> Result<String, ToolError> {
    Ok(format!(
        "**Task Details**\n\n**ID**: {}\n**Title**: {}\n**Description**: {}\n**Status**: {}\n**Priority**: {}\n**Created**: {}",
        required_field(task, "id")?,
        required_field(task, "title")?,
        field(task, "description", "No description"),
        required_field(task, "status")?,
        required_field(task, "priority")?,
        field(task, "created_at", "Unknown"),
    ))
}

fn render_list(tasks: &[Value]) -> Result<String, ToolError> {
    if tasks.is_empty() {
        return Ok("No tasks found.".to_string());
    }
    let mut out = String::from("**Task List**\n\n");
    for task in tasks.iter().take(TASK_LIST_PREVIEW) {
        out.push_str(&format!(
            "• **{}** (ID: {}) - {} - {} priority\n",
            required_field(task, "title")?,
            required_field(task, "id")?,
            required_field(task, "status")?,
            required_field(task, "priority")?,
        ));
    }
    if tasks.len() > TASK_LIST_PREVIEW {
        out.push_str(&format!(
            "\n*Showing first {} of {} tasks*",
            TASK_LIST_PREVIEW,
            tasks.len()
        ));
    }
    Ok(out)
}

#[async_trait]
impl ToolHandler for TaskManager {
    fn descriptor(&self) -> ToolDescriptor {
        let statuses = vec!["todo", "in_progress", "done"];
        let schema = ParameterSchema::new()
            .field(
                FieldSpec::new(
                    "operation",
                    FieldKind::Enum(OPERATIONS.to_vec()),
                    "The operation to perform",
                )
                .required(),
            )
            .field(FieldSpec::new(
                "task_id",
                FieldKind::String,
                "Task ID (required for update/get operations)",
            ))
            .field(FieldSpec::new(
                "title",
                FieldKind::String,
                "Task title (required for create operation)",
            ))
            .field(FieldSpec::new(
                "description",
                FieldKind::String,
                "Task description (optional)",
            ))
            .field(FieldSpec::new("status", FieldKind::Enum(statuses), "Task status"))
            .field(FieldSpec::new(
                "priority",
                FieldKind::Enum(vec!["low", "medium", "high"]),
                "Task priority",
            ));
        ToolDescriptor::new(
            TOOL_NAME,
            "Create, update, read and list tasks in one tool.\n\n\
             Operations:\n\
             - 'create': create a task (title required)\n\
             - 'update': change only the supplied fields (task_id required)\n\
             - 'get': task details (task_id required)\n\
             - 'list': up to 10 tasks, optionally filtered by status",
            schema,
        )
    }

    async fn handle(&self, args: Value) -> Result<ToolResult, ToolError> {
        let command = TaskCommand::parse(args)?;
        settle(self.execute(command).await)
    }
}
