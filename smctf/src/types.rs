use crate::credentials::AuthUser;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

// =============================================================================
// AUTH
// =============================================================================

/// Parameters for creating an account
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    /// One-time key handed out by an administrator
    pub registration_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub id: i64,
    pub email: String,
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Tokens and identity returned by a successful login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: AuthUser,
}

/// Body of the refresh and logout endpoints
#[derive(Debug, Clone, Serialize)]
pub struct RefreshTokenRequest<'a> {
    pub refresh_token: &'a str,
}

/// Profile changes; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateMe {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

// =============================================================================
// CHALLENGES
// =============================================================================

/// Whether the competition currently accepts submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CtfState {
    NotStarted,
    Active,
    Ended,
    #[serde(other)]
    Unknown,
}

impl CtfState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Active => "active",
            Self::Ended => "ended",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for CtfState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    /// Current (possibly decayed) value
    pub points: i64,
    #[serde(default)]
    pub initial_points: i64,
    #[serde(default)]
    pub minimum_points: i64,
    #[serde(default)]
    pub solve_count: i64,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub has_file: bool,
    #[serde(default)]
    pub file_name: Option<String>,
}

/// Challenge list; empty unless the CTF is running
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeList {
    pub ctf_state: CtfState,
    #[serde(default)]
    pub challenges: Vec<Challenge>,
}

/// Parameters for creating a challenge (admin only)
#[derive(Debug, Clone, Serialize)]
pub struct CreateChallenge {
    pub title: String,
    pub description: String,
    pub category: String,
    pub points: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_points: Option<i64>,
    pub flag: String,
    pub is_active: bool,
}

impl CreateChallenge {
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        category: impl Into<String>,
        points: i64,
        flag: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            category: category.into(),
            points,
            minimum_points: None,
            flag: flag.into(),
            is_active: true,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub const fn with_minimum_points(mut self, minimum_points: i64) -> Self {
        self.minimum_points = Some(minimum_points);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FlagSubmission<'a> {
    pub flag: &'a str,
}

/// Outcome of a flag submission. `correct` is absent when the CTF is not active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagResult {
    #[serde(default)]
    pub correct: bool,
    pub ctf_state: CtfState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolvedChallenge {
    pub challenge_id: i64,
    pub title: String,
    pub points: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub solved_at: OffsetDateTime,
}

// =============================================================================
// SCOREBOARD
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardChallenge {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub category: String,
    pub points: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardSolve {
    pub challenge_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub solved_at: OffsetDateTime,
    #[serde(default)]
    pub is_first_blood: bool,
}

/// One ranked user. Entries arrive ordered by score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: i64,
    pub username: String,
    pub score: i64,
    #[serde(default)]
    pub solves: Vec<LeaderboardSolve>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leaderboard {
    #[serde(default)]
    pub challenges: Vec<LeaderboardChallenge>,
    #[serde(default)]
    pub entries: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamLeaderboardEntry {
    pub team_id: i64,
    pub team_name: String,
    pub score: i64,
    #[serde(default)]
    pub solves: Vec<LeaderboardSolve>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamLeaderboard {
    #[serde(default)]
    pub challenges: Vec<LeaderboardChallenge>,
    #[serde(default)]
    pub entries: Vec<TeamLeaderboardEntry>,
}

/// Points scored by one user at one instant (submissions are bucketed server-side)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineSubmission {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub user_id: i64,
    pub username: String,
    pub points: i64,
    #[serde(default)]
    pub challenge_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeline {
    #[serde(default)]
    pub submissions: Vec<TimelineSubmission>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamTimelineSubmission {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub team_id: i64,
    pub team_name: String,
    pub points: i64,
    #[serde(default)]
    pub challenge_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamTimeline {
    #[serde(default)]
    pub submissions: Vec<TeamTimelineSubmission>,
}

// =============================================================================
// USERS & TEAMS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub role: String,
    #[serde(default)]
    pub team_id: Option<i64>,
    #[serde(default)]
    pub team_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamSummary {
    pub id: i64,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub member_count: i64,
    #[serde(default)]
    pub total_score: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: i64,
    pub username: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamSolvedChallenge {
    pub challenge_id: i64,
    pub title: String,
    pub points: i64,
    #[serde(default)]
    pub solve_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub last_solved_at: OffsetDateTime,
}

// =============================================================================
// SITE
// =============================================================================

/// Public site configuration shown in the page header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub header_title: String,
    #[serde(default)]
    pub header_description: String,
    /// RFC 3339 start time; empty when unset
    #[serde(default)]
    pub ctf_start_at: String,
    #[serde(default)]
    pub ctf_end_at: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}
