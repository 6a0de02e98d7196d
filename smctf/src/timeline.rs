//! Projection of scoring events onto a line-chart model.
//!
//! [`ChartLayout::project`] is pure: "now" is an argument, nothing is read
//! from the environment, and the same input always yields the same model.

use crate::types::{Leaderboard, TeamLeaderboard, TeamTimeline, Timeline};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, UtcOffset};

pub const CHART_PALETTE: [&str; 10] = [
    "#38bdf8", "#34d399", "#fbbf24", "#f472b6", "#a78bfa", "#f97316", "#22d3ee", "#f87171",
    "#4ade80", "#60a5fa",
];
pub const MAX_SERIES: usize = 10;
pub const DEFAULT_WINDOW_MINUTES: f64 = 60.0;

// =============================================================================
// INPUT
// =============================================================================

/// A user or team that gets its own series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineSubject {
    pub id: i64,
    pub label: String,
}

/// Points scored by a subject at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEvent {
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
    pub subject_id: i64,
    pub subject_label: String,
    pub points: i64,
}

/// Ranked subjects plus their events in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimelineInput {
    pub subjects: Vec<TimelineSubject>,
    pub events: Vec<TimelineEvent>,
}

impl TimelineInput {
    /// Users ranked as on the leaderboard.
    #[must_use]
    pub fn users(leaderboard: &Leaderboard, timeline: &Timeline) -> Self {
        Self {
            subjects: leaderboard
                .entries
                .iter()
                .map(|entry| TimelineSubject {
                    id: entry.user_id,
                    label: entry.username.clone(),
                })
                .collect(),
            events: timeline
                .submissions
                .iter()
                .map(|s| TimelineEvent {
                    submitted_at: s.timestamp,
                    subject_id: s.user_id,
                    subject_label: s.username.clone(),
                    points: s.points,
                })
                .collect(),
        }
    }

    /// Teams ranked as on the team leaderboard.
    #[must_use]
    pub fn teams(leaderboard: &TeamLeaderboard, timeline: &TeamTimeline) -> Self {
        Self {
            subjects: leaderboard
                .entries
                .iter()
                .map(|entry| TimelineSubject {
                    id: entry.team_id,
                    label: entry.team_name.clone(),
                })
                .collect(),
            events: timeline
                .submissions
                .iter()
                .map(|s| TimelineEvent {
                    submitted_at: s.timestamp,
                    subject_id: s.team_id,
                    subject_label: s.team_name.clone(),
                    points: s.points,
                })
                .collect(),
        }
    }

    /// Derives subjects from the events alone, highest total first.
    /// Ties keep first-appearance order.
    #[must_use]
    pub fn from_events(events: Vec<TimelineEvent>) -> Self {
        let mut totals: Vec<(TimelineSubject, i64)> = Vec::new();
        for event in &events {
            match totals.iter_mut().find(|(s, _)| s.id == event.subject_id) {
                Some((_, total)) => *total += event.points,
                None => totals.push((
                    TimelineSubject {
                        id: event.subject_id,
                        label: event.subject_label.clone(),
                    },
                    event.points,
                )),
            }
        }
        totals.sort_by(|a, b| b.1.cmp(&a.1));
        Self {
            subjects: totals.into_iter().map(|(subject, _)| subject).collect(),
            events,
        }
    }
}

// =============================================================================
// OUTPUT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Padding {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

/// A vertex of a series polyline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartPoint {
    pub x: f64,
    pub y: f64,
    /// Cumulative score at this point
    pub value: i64,
}

/// A vertex produced by a concrete event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartEventPoint {
    pub x: f64,
    pub y: f64,
    pub value: i64,
    pub event: TimelineEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisTick {
    pub value: i64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeTick {
    pub x: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub subject_id: i64,
    pub label: String,
    pub color: String,
    /// Window-start baseline followed by one vertex per event
    pub points: Vec<ChartPoint>,
    pub event_points: Vec<ChartEventPoint>,
}

impl ChartSeries {
    /// SVG path data (`M x y L x y ...`) with one decimal place.
    #[must_use]
    pub fn svg_path(&self) -> String {
        let mut path = String::new();
        for (idx, point) in self.points.iter().enumerate() {
            if idx > 0 {
                path.push(' ');
            }
            let command = if idx == 0 { 'M' } else { 'L' };
            let _ = write!(path, "{command}{:.1} {:.1}", point.x, point.y);
        }
        path
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartModel {
    pub width: f64,
    pub height: f64,
    pub padding: Padding,
    pub axis_ticks: Vec<AxisTick>,
    pub time_ticks: Vec<TimeTick>,
    pub series: Vec<ChartSeries>,
    pub window_start_label: String,
    pub window_end_label: String,
}

impl ChartModel {
    /// Renders a standalone SVG document.
    #[must_use]
    pub fn to_svg(&self) -> String {
        let mut svg = String::new();
        let left = self.padding.left;
        let right = self.width - self.padding.right;
        let bottom = self.height - self.padding.bottom;
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height
        );
        for tick in &self.axis_ticks {
            let _ = writeln!(
                svg,
                r##"  <line x1="{left:.1}" y1="{y:.1}" x2="{right:.1}" y2="{y:.1}" stroke="#334155" stroke-width="1"/>"##,
                y = tick.y
            );
            let _ = writeln!(
                svg,
                r##"  <text x="{x:.1}" y="{y:.1}" fill="#94a3b8" font-size="10" text-anchor="end">{value}</text>"##,
                x = left - 6.0,
                y = tick.y + 3.0,
                value = tick.value
            );
        }
        for tick in &self.time_ticks {
            let _ = writeln!(
                svg,
                r##"  <text x="{x:.1}" y="{y:.1}" fill="#94a3b8" font-size="10" text-anchor="middle">{label}</text>"##,
                x = tick.x,
                y = bottom + 16.0,
                label = escape_xml(&tick.label)
            );
        }
        for series in &self.series {
            let _ = writeln!(
                svg,
                r#"  <path d="{d}" fill="none" stroke="{color}" stroke-width="2"><title>{label}</title></path>"#,
                d = series.svg_path(),
                color = series.color,
                label = escape_xml(&series.label)
            );
            for point in &series.event_points {
                let _ = writeln!(
                    svg,
                    r#"  <circle cx="{x:.1}" cy="{y:.1}" r="3" fill="{color}"><title>{label}: {value}</title></circle>"#,
                    x = point.x,
                    y = point.y,
                    color = series.color,
                    label = escape_xml(&series.label),
                    value = point.value
                );
            }
        }
        svg.push_str("</svg>\n");
        svg
    }
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

// =============================================================================
// PROJECTION
// =============================================================================

/// Fixed geometry and styling of the chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartLayout {
    /// Minimum width; wider viewports stretch the chart
    pub width: f64,
    pub height: f64,
    pub padding: Padding,
    pub value_ticks: usize,
    pub time_ticks: usize,
    pub max_series: usize,
    pub palette: &'static [&'static str],
    /// Offset used for time tick labels
    pub label_offset: UtcOffset,
}

impl Default for ChartLayout {
    fn default() -> Self {
        Self {
            width: 720.0,
            height: 320.0,
            padding: Padding {
                top: 20.0,
                right: 24.0,
                bottom: 36.0,
                left: 48.0,
            },
            value_ticks: 4,
            time_ticks: 4,
            max_series: MAX_SERIES,
            palette: &CHART_PALETTE,
            label_offset: UtcOffset::UTC,
        }
    }
}

impl ChartLayout {
    #[must_use]
    pub const fn with_label_offset(mut self, offset: UtcOffset) -> Self {
        self.label_offset = offset;
        self
    }

    /// Color of the series at `rank`, independent of the subject.
    #[must_use]
    pub fn color(&self, rank: usize) -> &'static str {
        let palette = if self.palette.is_empty() {
            &CHART_PALETTE[..]
        } else {
            self.palette
        };
        palette[rank % palette.len()]
    }

    /// Projects `input` over the `window_minutes` ending at `now`.
    ///
    /// Returns `None` when there is no subject to plot.
    #[must_use]
    pub fn project(
        &self,
        input: &TimelineInput,
        window_minutes: f64,
        viewport_width: f64,
        now: OffsetDateTime,
    ) -> Option<ChartModel> {
        let subjects: Vec<&TimelineSubject> =
            input.subjects.iter().take(self.max_series).collect();
        if subjects.is_empty() {
            return None;
        }

        let width = self.resolve_width(viewport_width);
        let window_end = now;
        let window_start = window_start(now, window_minutes);

        let mut in_window: Vec<&TimelineEvent> = input
            .events
            .iter()
            .filter(|e| e.submitted_at >= window_start && e.submitted_at <= window_end)
            .collect();
        in_window.sort_by_key(|e| e.submitted_at);

        let mut by_subject: HashMap<i64, Vec<&TimelineEvent>> =
            subjects.iter().map(|s| (s.id, Vec::new())).collect();
        for event in in_window {
            if let Some(events) = by_subject.get_mut(&event.subject_id) {
                events.push(event);
            }
        }

        let max_value = by_subject
            .values()
            .flat_map(|events| {
                events.iter().scan(0_i64, |total, e| {
                    *total += e.points;
                    Some(*total)
                })
            })
            .max()
            .unwrap_or(0);

        let scale = Scale {
            window_start,
            window_end,
            span_seconds: (window_end - window_start).as_seconds_f64().max(0.001),
            left: self.padding.left,
            top: self.padding.top,
            plot_width: width - self.padding.left - self.padding.right,
            plot_height: self.height - self.padding.top - self.padding.bottom,
            max_value: max_value.max(1),
        };

        let series = subjects
            .iter()
            .enumerate()
            .map(|(rank, subject)| {
                let events = by_subject.get(&subject.id).map_or(&[][..], Vec::as_slice);
                self.series(rank, subject, events, &scale)
            })
            .collect();

        Some(ChartModel {
            width,
            height: self.height,
            padding: self.padding,
            axis_ticks: self.axis_ticks(&scale),
            time_ticks: self.time_ticks(&scale),
            series,
            window_start_label: rfc3339(window_start),
            window_end_label: rfc3339(window_end),
        })
    }

    fn resolve_width(&self, viewport_width: f64) -> f64 {
        if viewport_width.is_finite() && viewport_width > 0.0 {
            self.width.max(viewport_width.floor())
        } else {
            self.width
        }
    }

    fn series(
        &self,
        rank: usize,
        subject: &TimelineSubject,
        events: &[&TimelineEvent],
        scale: &Scale,
    ) -> ChartSeries {
        let mut running = 0_i64;
        let event_points: Vec<ChartEventPoint> = events
            .iter()
            .map(|event| {
                running += event.points;
                ChartEventPoint {
                    x: scale.x(event.submitted_at),
                    y: scale.y(running),
                    value: running,
                    event: (*event).clone(),
                }
            })
            .collect();

        let points = std::iter::once(ChartPoint {
            x: scale.x(scale.window_start),
            y: scale.y(0),
            value: 0,
        })
        .chain(event_points.iter().map(|p| ChartPoint {
            x: p.x,
            y: p.y,
            value: p.value,
        }))
        .collect();

        ChartSeries {
            subject_id: subject.id,
            label: subject.label.clone(),
            color: self.color(rank).to_string(),
            points,
            event_points,
        }
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn axis_ticks(&self, scale: &Scale) -> Vec<AxisTick> {
        let count = self.value_ticks.max(1);
        let step = scale.max_value as f64 / count as f64;
        (0..=count)
            .map(|idx| {
                let value = (step * idx as f64).round() as i64;
                AxisTick {
                    value,
                    y: scale.y(value),
                }
            })
            .collect()
    }

    #[allow(clippy::cast_precision_loss)]
    fn time_ticks(&self, scale: &Scale) -> Vec<TimeTick> {
        let count = self.time_ticks.max(1);
        let step = scale.span_seconds / count as f64;
        let label_format = format_description!("[hour]:[minute]");
        (0..=count)
            .map(|idx| {
                let time = scale.window_start + Duration::seconds_f64(step * idx as f64);
                TimeTick {
                    x: scale.x(time),
                    label: time
                        .to_offset(self.label_offset)
                        .format(label_format)
                        .unwrap_or_default(),
                }
            })
            .collect()
    }
}

/// Projects with the default layout.
#[must_use]
pub fn project(
    input: &TimelineInput,
    window_minutes: f64,
    viewport_width: f64,
    now: OffsetDateTime,
) -> Option<ChartModel> {
    ChartLayout::default().project(input, window_minutes, viewport_width, now)
}

/// Start of the window ending at `now`. Windows that are not positive or
/// reach outside the representable date range use the default length.
fn window_start(now: OffsetDateTime, window_minutes: f64) -> OffsetDateTime {
    let requested = if window_minutes.is_finite() && window_minutes > 0.0 {
        Duration::checked_seconds_f64(window_minutes * 60.0).and_then(|span| now.checked_sub(span))
    } else {
        None
    };
    requested.unwrap_or_else(|| now - Duration::seconds_f64(DEFAULT_WINDOW_MINUTES * 60.0))
}

struct Scale {
    window_start: OffsetDateTime,
    window_end: OffsetDateTime,
    span_seconds: f64,
    left: f64,
    top: f64,
    plot_width: f64,
    plot_height: f64,
    max_value: i64,
}

impl Scale {
    fn x(&self, time: OffsetDateTime) -> f64 {
        let clamped = time.clamp(self.window_start, self.window_end);
        let offset = (clamped - self.window_start).as_seconds_f64();
        self.left + (offset / self.span_seconds) * self.plot_width
    }

    #[allow(clippy::cast_precision_loss)]
    fn y(&self, value: i64) -> f64 {
        self.top + self.plot_height - (value as f64 / self.max_value as f64) * self.plot_height
    }
}

fn rfc3339(time: OffsetDateTime) -> String {
    time.to_offset(UtcOffset::UTC)
        .format(&Rfc3339)
        .unwrap_or_default()
}
