use anyhow::{Context, Result};
use colored::Colorize;
use smconfig::TimelineConfig;
use smctf::timeline::{ChartLayout, ChartModel, TimelineInput};
use smctf::SmctfClient;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;
use tempfile::NamedTempFile;
use time::UtcOffset;
use tracing::debug;

/// Fetches the leaderboard and the matching timeline together.
pub async fn fetch_input(
    client: &SmctfClient,
    teams: bool,
    window_minutes: u32,
) -> Result<TimelineInput> {
    let input = if teams {
        let (leaderboard, timeline) = tokio::try_join!(
            client.team_leaderboard(),
            client.team_timeline(Some(window_minutes))
        )?;
        TimelineInput::teams(&leaderboard, &timeline)
    } else {
        let (leaderboard, timeline) = tokio::try_join!(
            client.leaderboard(),
            client.timeline(Some(window_minutes))
        )?;
        TimelineInput::users(&leaderboard, &timeline)
    };
    debug!(
        subjects = input.subjects.len(),
        events = input.events.len(),
        "timeline fetched"
    );
    Ok(input)
}

/// Chart layout for the configured label zone. `local_offset` is read before
/// the runtime starts; when it is unknown the labels stay in UTC.
pub fn layout(config: &TimelineConfig, local_offset: Option<UtcOffset>) -> ChartLayout {
    let layout = ChartLayout::default();
    if !config.local_time {
        return layout;
    }
    match local_offset {
        Some(offset) => layout.with_label_offset(offset),
        None => {
            debug!("local offset unavailable; labelling the chart in UTC");
            layout
        }
    }
}

/// One line per series: rank, colour swatch, label, total and event count.
pub fn summary(chart: &ChartModel, window_minutes: u32) -> String {
    let mut output = String::new();
    let start = chart.time_ticks.first().map_or("", |t| t.label.as_str());
    let end = chart.time_ticks.last().map_or("", |t| t.label.as_str());
    let _ = writeln!(
        output,
        "Last {window_minutes} minutes ({start} to {end})"
    );

    for (rank, series) in chart.series.iter().enumerate() {
        let total = series.points.last().map_or(0, |p| p.value);
        let swatch = match hex_rgb(&series.color) {
            Some((r, g, b)) => "●".truecolor(r, g, b).to_string(),
            None => "●".to_string(),
        };
        let events = series.event_points.len();
        let _ = writeln!(
            output,
            "{:>2}. {swatch} {:<20} {:>6} pts  {events} scoring event{}",
            rank + 1,
            series.label,
            total,
            if events == 1 { "" } else { "s" }
        );
    }
    output
}

/// Writes through a temp file in the target directory so readers never see
/// a partial document.
pub fn write_svg(path: &Path, svg: &str) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut file = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    file.write_all(svg.as_bytes())
        .with_context(|| "Failed to write SVG")?;
    file.persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn hex_rgb(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |at: usize| u8::from_str_radix(hex.get(at..at + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use smctf::timeline::{project, TimelineEvent};
    use time::macros::datetime;

    fn chart_input() -> TimelineInput {
        let event = |minute: u8, id: i64, label: &str, points: i64| TimelineEvent {
            submitted_at: datetime!(2026-03-01 11:00 UTC)
                + time::Duration::minutes(i64::from(minute)),
            subject_id: id,
            subject_label: label.to_string(),
            points,
        };
        TimelineInput::from_events(vec![
            event(5, 1, "alice", 100),
            event(20, 2, "bob", 300),
            event(50, 1, "alice", 250),
        ])
    }

    fn chart() -> ChartModel {
        project(&chart_input(), 60.0, 0.0, datetime!(2026-03-01 12:00 UTC)).unwrap()
    }

    #[test]
    fn parses_palette_colors() {
        assert_eq!(hex_rgb("#38bdf8"), Some((0x38, 0xbd, 0xf8)));
        assert_eq!(hex_rgb("38bdf8"), None);
        assert_eq!(hex_rgb("#fff"), None);
        assert_eq!(hex_rgb("#zzzzzz"), None);
    }

    #[test]
    fn summary_lists_series_in_rank_order() {
        colored::control::set_override(false);
        let text = summary(&chart(), 60);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Last 60 minutes (11:00 to 12:00)");
        assert!(lines[1].starts_with(" 1. ● alice"));
        assert!(lines[1].contains("350 pts  2 scoring events"));
        assert!(lines[2].starts_with(" 2. ● bob"));
        assert!(lines[2].ends_with("1 scoring event"));
    }

    #[test]
    fn layout_uses_local_offset_only_when_asked() {
        let offset = UtcOffset::from_hms(2, 0, 0).unwrap();
        let local = TimelineConfig {
            local_time: true,
            ..TimelineConfig::default()
        };
        let utc = TimelineConfig {
            local_time: false,
            ..TimelineConfig::default()
        };

        assert_eq!(layout(&local, Some(offset)).label_offset, offset);
        assert_eq!(layout(&utc, Some(offset)).label_offset, UtcOffset::UTC);
    }

    #[test]
    fn unknown_local_offset_falls_back_to_utc() {
        let local = TimelineConfig {
            local_time: true,
            ..TimelineConfig::default()
        };
        let chart = layout(&local, None).project(
            &chart_input(),
            60.0,
            0.0,
            datetime!(2026-03-01 12:00 UTC),
        );

        assert_eq!(layout(&local, None).label_offset, UtcOffset::UTC);
        assert_eq!(chart.unwrap().time_ticks[0].label, "11:00");
    }

    #[test]
    fn svg_is_written_whole() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timeline.svg");
        let svg = chart().to_svg();

        write_svg(&path, &svg).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), svg);
    }
}
