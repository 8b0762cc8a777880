//! Direct one-endpoint-per-tool wrappers around the Google Calendar v3 API.
//!
//! Each tool renders the whole upstream payload and then applies the soft
//! character cap, so long answers can be cut mid-entry.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::errors::ToolError;
use crate::managers::render::{display, field, items, settle, soft_cap};
use crate::mcp::catalog::ToolDescriptor;
use crate::mcp::content::ToolResult;
use crate::mcp::schema::{FieldKind, FieldSpec, ParameterSchema};
use crate::services::config::Config;
use crate::services::credentials::TokenSource;
use crate::services::dispatcher::ToolHandler;
use crate::services::upstream::{endpoint, Upstream, UpstreamRequest};

const PRIMARY: &str = "primary";

/// Shared plumbing for the calendar tools: base URL, bearer token and the cap.
pub struct CalendarApi {
    config: Arc<Config>,
    upstream: Arc<dyn Upstream>,
    token: TokenSource,
}

impl CalendarApi {
    pub fn new(config: Arc<Config>, upstream: Arc<dyn Upstream>, token: TokenSource) -> Arc<Self> {
        Arc::new(Self {
            config,
            upstream,
            token,
        })
    }

    async fn get(&self, segments: &[&str], query: &[(&str, Option<&str>)]) -> Result<Value, ToolError> {
        let token = self.token.get_token().await?;
        let mut request =
            UpstreamRequest::get(endpoint(&self.config.calendar_base_url, segments)?).with_bearer(token);
        for (key, value) in query {
            if let Some(value) = value {
                request = request.with_query(key, *value);
            }
        }
        Ok(self.upstream.send(request).await?)
    }

    async fn post(&self, segments: &[&str], body: Value) -> Result<Value, ToolError> {
        let token = self.token.get_token().await?;
        let request = UpstreamRequest::post(endpoint(&self.config.calendar_base_url, segments)?, body)
            .with_bearer(token);
        Ok(self.upstream.send(request).await?)
    }

    fn finish(&self, rendered: Result<String, ToolError>) -> Result<ToolResult, ToolError> {
        settle(rendered.map(|text| soft_cap(text, self.config.max_response_chars)))
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(tool: &str, args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args)
        .map_err(|err| ToolError::invalid_params(format!("Invalid {} arguments: {}", tool, err)))
}

fn calendar_id_field() -> FieldSpec {
    FieldSpec::new("calendar_id", FieldKind::String, "Calendar ID (default: primary)")
        .default_value(json!(PRIMARY))
}

fn calendar_id_or_primary(raw: Option<String>) -> String {
    raw.filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| PRIMARY.to_string())
}

pub struct ListCalendars {
    api: Arc<CalendarApi>,
}

impl ListCalendars {
    pub fn new(api: Arc<CalendarApi>) -> Self {
        Self { api }
    }
}

pub fn render_calendars(payload: &Value) -> Result<String, ToolError> {
    let calendars = items(payload.get("items").unwrap_or(&Value::Null), "calendars")?;
    let mut out = String::from("**Calendars List**\n\n");
    for calendar in &calendars {
        out.push_str(&format!(
            "• **{}** (ID: {})\n  - Primary: {}\n  - Access Role: {}\n\n",
            field(calendar, "summary", "Unknown"),
            field(calendar, "id", "Unknown"),
            field(calendar, "primary", "false"),
            field(calendar, "accessRole", "Unknown"),
        ));
    }
    Ok(out)
}

#[async_trait]
impl ToolHandler for ListCalendars {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("list_calendars", "Lists all user calendars.", ParameterSchema::new())
    }

    async fn handle(&self, _args: Value) -> Result<ToolResult, ToolError> {
        let outcome = match self.api.get(&["users", "me", "calendarList"], &[]).await {
            Ok(payload) => render_calendars(&payload),
            Err(err) => Err(err),
        };
        self.api.finish(outcome)
    }
}

#[derive(Debug, Deserialize)]
struct EventsArgs {
    calendar_id: Option<String>,
    time_min: Option<String>,
    time_max: Option<String>,
    #[serde(default)]
    verbose: bool,
}

pub struct ListCalendarEvents {
    api: Arc<CalendarApi>,
}

impl ListCalendarEvents {
    pub fn new(api: Arc<CalendarApi>) -> Self {
        Self { api }
    }
}

fn event_time(event: &Value, key: &str) -> String {
    let slot = event.get(key);
    let value = slot
        .and_then(|s| s.get("dateTime"))
        .or_else(|| slot.and_then(|s| s.get("date")));
    display(value, "Unknown")
}

pub fn render_events(payload: &Value, verbose: bool) -> Result<String, ToolError> {
    let events = items(payload.get("items").unwrap_or(&Value::Null), "events")?;
    if events.is_empty() {
        return Ok("No events found for the specified time period.".to_string());
    }
    let mut out = format!("**Calendar Events** ({} found)\n\n", events.len());
    for event in &events {
        out.push_str(&format!("### {}\n", field(event, "summary", "No title")));
        out.push_str(&format!("**Start**: {}\n", event_time(event, "start")));
        out.push_str(&format!("**End**: {}\n", event_time(event, "end")));
        if verbose {
            out.push_str(&format!("**ID**: {}\n", field(event, "id", "Unknown")));
            out.push_str(&format!("**Status**: {}\n", field(event, "status", "Unknown")));
            out.push_str(&format!(
                "**Creator**: {}\n",
                display(event.pointer("/creator/email"), "Unknown")
            ));
            out.push_str(&format!(
                "**Organizer**: {}\n",
                display(event.pointer("/organizer/email"), "Unknown")
            ));
            let attendees = event
                .get("attendees")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            if !attendees.is_empty() {
                out.push_str(&format!("**Attendees** ({}):\n", attendees.len()));
                for attendee in &attendees {
                    out.push_str(&format!(
                        "  - {} ({})\n",
                        field(attendee, "email", "Unknown"),
                        field(attendee, "responseStatus", "Unknown"),
                    ));
                }
            }
            for (key, label) in [("description", "Description"), ("location", "Location")] {
                let value = field(event, key, "");
                if !value.is_empty() {
                    out.push_str(&format!("**{}**: {}\n", label, value));
                }
            }
        }
        out.push_str("\n---\n\n");
    }
    Ok(out)
}

#[async_trait]
impl ToolHandler for ListCalendarEvents {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "list_calendar_events",
            "Get all events for a specified time period for a given calendar.",
            ParameterSchema::new()
                .field(calendar_id_field())
                .field(FieldSpec::new(
                    "time_max",
                    FieldKind::String,
                    "Upper bound (exclusive) for an event's start time (RFC3339 timestamp)",
                ))
                .field(FieldSpec::new(
                    "time_min",
                    FieldKind::String,
                    "Lower bound (exclusive) for an event's end time (RFC3339 timestamp)",
                ))
                .field(
                    FieldSpec::new("verbose", FieldKind::Boolean, "Include detailed event information")
                        .default_value(json!(false)),
                ),
        )
    }

    async fn handle(&self, args: Value) -> Result<ToolResult, ToolError> {
        let args: EventsArgs = parse_args("list_calendar_events", args)?;
        let calendar_id = calendar_id_or_primary(args.calendar_id);
        let query = [
            ("timeMax", args.time_max.as_deref()),
            ("timeMin", args.time_min.as_deref()),
        ];
        let outcome = match self
            .api
            .get(&["calendars", calendar_id.as_str(), "events"], &query)
            .await
        {
            Ok(payload) => render_events(&payload, args.verbose),
            Err(err) => Err(err),
        };
        self.api.finish(outcome)
    }
}

#[derive(Debug, Deserialize)]
struct TimezoneArgs {
    calendar_id: Option<String>,
}

pub struct RetrieveTimezone {
    api: Arc<CalendarApi>,
}

impl RetrieveTimezone {
    pub fn new(api: Arc<CalendarApi>) -> Self {
        Self { api }
    }
}

pub fn render_timezone(payload: &Value) -> String {
    format!(
        "**Calendar Timezone Information**\n\n**Calendar**: {}\n**Timezone**: {}\n**Location**: {}\n",
        field(payload, "summary", "Unknown"),
        field(payload, "timeZone", "Unknown"),
        field(payload, "location", "Not specified"),
    )
}

#[async_trait]
impl ToolHandler for RetrieveTimezone {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "retrieve_timezone",
            "Retrieves timezone for a given calendar.",
            ParameterSchema::new().field(calendar_id_field()),
        )
    }

    async fn handle(&self, args: Value) -> Result<ToolResult, ToolError> {
        let args: TimezoneArgs = parse_args("retrieve_timezone", args)?;
        let calendar_id = calendar_id_or_primary(args.calendar_id);
        let outcome = self
            .api
            .get(&["calendars", calendar_id.as_str()], &[])
            .await
            .map(|payload| render_timezone(&payload));
        self.api.finish(outcome)
    }
}

#[derive(Debug, Deserialize)]
struct FreeBusyArgs {
    time_min: String,
    time_max: String,
    timezone: Option<String>,
    calendar_ids: Option<Vec<String>>,
}

pub struct RetrieveFreeBusy {
    api: Arc<CalendarApi>,
}

impl RetrieveFreeBusy {
    pub fn new(api: Arc<CalendarApi>) -> Self {
        Self { api }
    }
}

pub fn render_free_busy(time_min: &str, time_max: &str, timezone: &str, payload: &Value) -> String {
    let mut out = format!(
        "**Free/Busy Information**\n\n**Time Range**: {} to {}\n**Timezone**: {}\n\n",
        time_min, time_max, timezone
    );
    let Some(calendars) = payload.get("calendars").and_then(Value::as_object) else {
        return out;
    };
    for (calendar_id, data) in calendars {
        out.push_str(&format!("### Calendar: {}\n", calendar_id));
        let busy = data.get("busy").and_then(Value::as_array);
        match busy {
            Some(periods) if !periods.is_empty() => {
                out.push_str("**Busy periods**:\n");
                for period in periods {
                    out.push_str(&format!(
                        "  - {} to {}\n",
                        field(period, "start", "?"),
                        field(period, "end", "?"),
                    ));
                }
            }
            _ => out.push_str("**No busy periods found**\n"),
        }
        if let Some(errors) = data.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                out.push_str("**Errors**:\n");
                for error in errors {
                    out.push_str(&format!("  - {}\n", field(error, "reason", "Unknown error")));
                }
            }
        }
        out.push('\n');
    }
    out
}

#[async_trait]
impl ToolHandler for RetrieveFreeBusy {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "retrieve_calendar_free_busy_slots",
            "Retrieves free and busy slots from the calendars of the calendar_ids list.",
            ParameterSchema::new()
                .field(
                    FieldSpec::new("time_min", FieldKind::String, "Lower bound for the query (RFC3339 timestamp)")
                        .required(),
                )
                .field(
                    FieldSpec::new("time_max", FieldKind::String, "Upper bound for the query (RFC3339 timestamp)")
                        .required(),
                )
                .field(
                    FieldSpec::new("timezone", FieldKind::String, "Timezone to use for the query")
                        .default_value(json!("UTC")),
                )
                .field(
                    FieldSpec::new(
                        "calendar_ids",
                        FieldKind::Array(Box::new(FieldKind::String)),
                        "List of calendar IDs to query",
                    )
                    .default_value(json!([PRIMARY])),
                ),
        )
    }

    async fn handle(&self, args: Value) -> Result<ToolResult, ToolError> {
        let args: FreeBusyArgs = parse_args("retrieve_calendar_free_busy_slots", args)?;
        let timezone = args.timezone.unwrap_or_else(|| "UTC".to_string());
        let calendar_ids = args
            .calendar_ids
            .filter(|ids| !ids.is_empty())
            .unwrap_or_else(|| vec![PRIMARY.to_string()]);
        let body = json!({
            "timeMin": args.time_min,
            "timeMax": args.time_max,
            "timeZone": timezone,
            "items": calendar_ids.iter().map(|id| json!({"id": id})).collect::<Vec<_>>(),
        });
        let outcome = self
            .api
            .post(&["freeBusy"], body)
            .await
            .map(|payload| render_free_busy(&args.time_min, &args.time_max, &timezone, &payload));
        self.api.finish(outcome)
    }
}
