mod common;

use common::mock_server::SmctfMock;
use serde_json::json;
use smctf::timeline::{project, TimelineInput, CHART_PALETTE};
use smctf::types::CtfState;
use time::macros::datetime;
use time::OffsetDateTime;

const NOW: OffsetDateTime = datetime!(2026-03-01 12:00 UTC);

#[tokio::test]
async fn challenge_list_parses() {
    let mock = SmctfMock::start().await;
    mock.mount_fixture("challenges/list.json").await;

    let list = mock.client().challenges().await.unwrap();
    assert_eq!(list.ctf_state, CtfState::Active);
    assert_eq!(list.challenges.len(), 2);

    let heap = &list.challenges[1];
    assert_eq!(heap.title, "Heap Feng Shui");
    assert_eq!(heap.description, "");
    assert_eq!(heap.points, 480);
    assert_eq!(heap.initial_points, 500);
}

#[tokio::test]
async fn timeline_sends_window_query() {
    let mock = SmctfMock::start().await;
    mock.mount_fixture("scoreboard/timeline.json").await;

    let timeline = mock.client().timeline(Some(60)).await.unwrap();
    assert_eq!(timeline.submissions.len(), 3);
    assert_eq!(timeline.submissions[1].username, "bob");
    assert_eq!(
        timeline.submissions[0].timestamp,
        datetime!(2026-03-01 11:10 UTC)
    );

    let calls = mock.requests_to("/api/timeline").await;
    assert_eq!(calls[0].url.query(), Some("window=60"));
}

#[tokio::test]
async fn user_scoreboard_projects_into_a_chart() {
    let mock = SmctfMock::start().await;
    mock.mount_fixture("scoreboard/leaderboard.json").await;
    mock.mount_fixture("scoreboard/timeline.json").await;

    let client = mock.client();
    let leaderboard = client.leaderboard().await.unwrap();
    let timeline = client.timeline(Some(60)).await.unwrap();
    assert_eq!(leaderboard.entries[0].solves.len(), 2);
    assert!(leaderboard.entries[0].solves[0].is_first_blood);

    let input = TimelineInput::users(&leaderboard, &timeline);
    let chart = project(&input, 60.0, 0.0, NOW).unwrap();

    assert_eq!(chart.width, 720.0);
    assert_eq!(chart.height, 320.0);
    assert_eq!(chart.series.len(), 2);

    let alice = &chart.series[0];
    assert_eq!(alice.label, "alice");
    assert_eq!(alice.color, CHART_PALETTE[0]);
    assert_eq!(alice.points.len(), 3);
    assert_eq!(alice.points[0].value, 0);
    assert_eq!(alice.points[0].x, 48.0);
    assert_eq!(alice.points[0].y, 284.0);
    assert!((alice.points[1].x - 156.0).abs() < 1e-9);
    assert_eq!(alice.points[2].value, 350);
    assert!((alice.points[2].y - 20.0).abs() < 1e-9);

    let bob = &chart.series[1];
    assert_eq!(bob.color, CHART_PALETTE[1]);
    assert_eq!(bob.event_points.len(), 1);
    assert!((bob.event_points[0].x - 264.0).abs() < 1e-9);
    assert_eq!(bob.event_points[0].event.subject_label, "bob");

    let values: Vec<i64> = chart.axis_ticks.iter().map(|t| t.value).collect();
    assert_eq!(values, vec![0, 88, 175, 263, 350]);
    let labels: Vec<&str> = chart.time_ticks.iter().map(|t| t.label.as_str()).collect();
    assert_eq!(labels, vec!["11:00", "11:15", "11:30", "11:45", "12:00"]);
    assert_eq!(chart.window_start_label, "2026-03-01T11:00:00Z");
    assert_eq!(chart.window_end_label, "2026-03-01T12:00:00Z");

    let svg = chart.to_svg();
    assert!(svg.starts_with("<svg"));
    assert!(svg.contains("<title>alice</title>"));
    assert_eq!(svg.matches("<circle").count(), 3);
}

#[tokio::test]
async fn team_scoreboard_follows_leaderboard_rank() {
    let mock = SmctfMock::start().await;
    mock.mount_fixture("scoreboard/team_timeline.json").await;
    mock.mount_json(
        "GET",
        "/api/leaderboard/teams",
        200,
        json!({
            "challenges": [],
            "entries": [
                { "team_id": 4, "team_name": "red", "score": 450 },
                { "team_id": 3, "team_name": "blue", "score": 200 }
            ]
        }),
    )
    .await;

    let client = mock.client();
    let leaderboard = client.team_leaderboard().await.unwrap();
    let timeline = client.team_timeline(None).await.unwrap();
    assert!(mock.requests_to("/api/timeline/teams").await[0]
        .url
        .query()
        .is_none());

    let input = TimelineInput::teams(&leaderboard, &timeline);
    let chart = project(&input, 60.0, 1024.0, NOW).unwrap();

    assert_eq!(chart.width, 1024.0);
    let labels: Vec<&str> = chart.series.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, vec!["red", "blue"]);
    // red scored 150 inside the window; the scale follows the window, not the leaderboard
    assert_eq!(chart.axis_ticks.last().map(|t| t.value), Some(200));
}

#[tokio::test]
async fn empty_leaderboard_has_no_chart() {
    let mock = SmctfMock::start().await;
    mock.mount_json("GET", "/api/leaderboard", 200, json!({ "challenges": [], "entries": [] }))
        .await;
    mock.mount_json("GET", "/api/timeline", 200, json!({ "submissions": [] }))
        .await;

    let client = mock.client();
    let leaderboard = client.leaderboard().await.unwrap();
    let timeline = client.timeline(None).await.unwrap();

    let input = TimelineInput::users(&leaderboard, &timeline);
    assert!(project(&input, 60.0, 0.0, NOW).is_none());
}
