mod common;
use common::{build_app, stocked_store, test_config, text, FakeUpstream, TOKEN};

use reqwest::Method;
use serde_json::json;

#[tokio::test]
async fn events_forward_time_bounds_and_default_calendar() {
    let upstream = FakeUpstream::new();
    upstream.ok(
        Method::GET,
        "/v3/calendars/primary/events",
        json!({"items": [{"summary": "Review", "start": {"dateTime": "2024-06-03T10:00:00Z"}, "end": {"dateTime": "2024-06-03T11:00:00Z"}}]}),
    );
    let app = build_app(test_config(), stocked_store(), upstream.clone());

    let result = app
        .dispatcher
        .dispatch(
            "list_calendar_events",
            json!({"time_min": "2024-06-01T00:00:00Z", "time_max": "2024-06-08T00:00:00Z"}),
        )
        .await;
    let body = text(&result);
    assert!(body.starts_with("**Calendar Events** (1 found)\n\n### Review\n**Start**: 2024-06-03T10:00:00Z\n"));

    let sent = &upstream.requests()[0];
    assert_eq!(sent.bearer.as_deref(), Some(TOKEN));
    assert_eq!(sent.query_value("timeMin"), Some("2024-06-01T00:00:00Z"));
    assert_eq!(sent.query_value("timeMax"), Some("2024-06-08T00:00:00Z"));
}

#[tokio::test]
async fn omitted_bounds_are_not_sent() {
    let upstream = FakeUpstream::new();
    upstream.ok(Method::GET, "/v3/calendars/work/events", json!({"items": []}));
    let app = build_app(test_config(), stocked_store(), upstream.clone());

    let result = app
        .dispatcher
        .dispatch("list_calendar_events", json!({"calendar_id": "work"}))
        .await;
    assert_eq!(text(&result), "No events found for the specified time period.");
    assert!(upstream.requests()[0].query.is_empty());
}

#[tokio::test]
async fn timezone_uses_primary_when_no_calendar_given() {
    let upstream = FakeUpstream::new();
    upstream.ok(
        Method::GET,
        "/v3/calendars/primary",
        json!({"summary": "Me", "timeZone": "Europe/Berlin"}),
    );
    let app = build_app(test_config(), stocked_store(), upstream.clone());

    let result = app.dispatcher.dispatch("retrieve_timezone", json!({})).await;
    assert_eq!(
        text(&result),
        "**Calendar Timezone Information**\n\n**Calendar**: Me\n**Timezone**: Europe/Berlin\n**Location**: Not specified\n"
    );
}

#[tokio::test]
async fn free_busy_posts_items_and_renders_each_calendar() {
    let upstream = FakeUpstream::new();
    upstream.ok(
        Method::POST,
        "/v3/freeBusy",
        json!({"calendars": {
            "a@x.io": {"busy": [{"start": "09:00", "end": "10:00"}]},
            "b@x.io": {"busy": [], "errors": [{"reason": "notFound"}]}
        }}),
    );
    let app = build_app(test_config(), stocked_store(), upstream.clone());

    let result = app
        .dispatcher
        .dispatch(
            "retrieve_calendar_free_busy_slots",
            json!({"time_min": "2024-06-03T00:00:00Z", "time_max": "2024-06-04T00:00:00Z", "calendar_ids": ["a@x.io", "b@x.io"]}),
        )
        .await;
    let body = text(&result);
    assert!(body.contains("**Timezone**: UTC\n"));
    assert!(body.contains("### Calendar: a@x.io\n**Busy periods**:\n  - 09:00 to 10:00\n"));
    assert!(body.contains("### Calendar: b@x.io\n**No busy periods found**\n**Errors**:\n  - notFound\n"));

    assert_eq!(
        upstream.requests()[0].body,
        Some(json!({
            "timeMin": "2024-06-03T00:00:00Z",
            "timeMax": "2024-06-04T00:00:00Z",
            "timeZone": "UTC",
            "items": [{"id": "a@x.io"}, {"id": "b@x.io"}]
        }))
    );
}

#[tokio::test]
async fn free_busy_requires_bounds() {
    let upstream = FakeUpstream::new();
    let app = build_app(test_config(), stocked_store(), upstream.clone());
    let result = app
        .dispatcher
        .dispatch("retrieve_calendar_free_busy_slots", json!({"time_min": "2024-06-03T00:00:00Z"}))
        .await;
    assert!(result.is_error);
    assert!(text(&result).contains("missing required field 'time_max'"));
    assert!(upstream.requests().is_empty());
}

#[tokio::test]
async fn long_output_is_cut_with_a_marker() {
    let upstream = FakeUpstream::new();
    let calendars: Vec<_> = (0..40)
        .map(|i| json!({"id": format!("cal-{}", i), "summary": format!("Calendar {}", i), "accessRole": "owner"}))
        .collect();
    upstream.ok(Method::GET, "/v3/users/me/calendarList", json!({"items": calendars}));
    let mut config = test_config();
    config.max_response_chars = 200;
    let app = build_app(config, stocked_store(), upstream);

    let result = app.dispatcher.dispatch("list_calendars", json!({})).await;
    let body = text(&result);
    assert!(!result.is_error);
    assert!(body.starts_with("**Calendars List**\n\n• **Calendar 0** (ID: cal-0)\n"));
    assert!(body.ends_with("*[Response truncated - too much data]*"));
    assert!(!body.contains("Calendar 39"));
}
