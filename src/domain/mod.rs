//! Domain entities and helpers.
//!
//! These are the data-shaped collaborators of the core: player, team member,
//! team, match, and attendance records, plus id generation and phone
//! normalization. Business logic lives in [`services`]; persistence plumbing
//! in [`repository`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::store::CollectionKind;
use crate::types::KickAiError;

pub mod repository;
pub mod services;

pub use repository::{Entity, Repository};

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Lifecycle of a player record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    /// Registered, awaiting leadership approval.
    Pending,
    /// Approved and selectable.
    Active,
    /// Registration declined.
    Rejected,
    /// Removed from the squad.
    Removed,
}

impl PlayerStatus {
    /// Stable lowercase identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Rejected => "rejected",
            Self::Removed => "removed",
        }
    }
}

/// A playing-squad member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Short id: initials plus sequence number, e.g. `JS1`.
    pub player_id: String,
    /// Owning tenant.
    pub team_id: String,
    /// Full name as registered.
    pub name: String,
    /// E.164 phone number, once known.
    pub phone: Option<String>,
    /// Preferred position (free text).
    pub position: Option<String>,
    /// Lifecycle status.
    pub status: PlayerStatus,
    /// Telegram account linked to this record.
    pub telegram_id: Option<i64>,
    /// Telegram username at registration time.
    pub username: Option<String>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Last modification instant.
    pub updated_at: DateTime<Utc>,
}

/// Role of a leadership-side team member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    /// Full administrative rights.
    Admin,
    /// Squad and fixture management.
    Manager,
    /// Training and selection input.
    Coach,
    /// Plain leadership member.
    Member,
}

impl MemberRole {
    /// Stable lowercase identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Coach => "coach",
            Self::Member => "member",
        }
    }
}

impl std::str::FromStr for MemberRole {
    type Err = KickAiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "coach" => Ok(Self::Coach),
            "member" => Ok(Self::Member),
            other => Err(KickAiError::validation(
                "role",
                format!("unknown member role: {other}"),
            )),
        }
    }
}

/// A leadership-chat team member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    /// Short id, e.g. `MJD1`.
    pub member_id: String,
    /// Owning tenant.
    pub team_id: String,
    /// Full name.
    pub name: String,
    /// Telegram account.
    pub telegram_id: Option<i64>,
    /// Leadership role.
    pub role: MemberRole,
    /// E.164 phone number, once known.
    pub phone: Option<String>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
}

impl TeamMember {
    /// Whether this member carries administrative rights.
    pub fn is_admin(&self) -> bool {
        self.role == MemberRole::Admin
    }
}

/// A tenant record from the global teams collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    /// Tenant identifier.
    pub team_id: String,
    /// Display name.
    pub name: String,
    /// Telegram chat id of the players' chat.
    pub main_chat_id: String,
    /// Telegram chat id of the administrators' chat.
    pub leadership_chat_id: String,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl MatchStatus {
    /// Stable lowercase identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// A fixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    /// Short id: `M` plus sequence number, e.g. `M3`.
    pub match_id: String,
    /// Owning tenant.
    pub team_id: String,
    /// Opposing team name.
    pub opponent: String,
    /// Match date.
    pub date: NaiveDate,
    /// Venue, when known.
    pub venue: Option<String>,
    /// Lifecycle status.
    pub status: MatchStatus,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
}

/// A player's availability answer for one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Yes,
    No,
    Maybe,
}

impl AttendanceStatus {
    /// Stable lowercase identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Maybe => "maybe",
        }
    }
}

impl std::str::FromStr for AttendanceStatus {
    type Err = KickAiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yes" | "y" => Ok(Self::Yes),
            "no" | "n" => Ok(Self::No),
            "maybe" | "m" => Ok(Self::Maybe),
            other => Err(KickAiError::validation(
                "attendance",
                format!("expected yes/no/maybe, got: {other}"),
            )),
        }
    }
}

/// One player's attendance record for one match.
///
/// The document id is `{team_id}_{match_id}_{player_id}` so a record can be
/// addressed directly without a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// Owning tenant.
    pub team_id: String,
    /// Fixture.
    pub match_id: String,
    /// Player.
    pub player_id: String,
    /// Availability answer.
    pub status: AttendanceStatus,
    /// When the answer was recorded.
    pub marked_at: DateTime<Utc>,
}

impl AttendanceRecord {
    /// Compose the direct-lookup document id.
    pub fn compose_id(team_id: &str, match_id: &str, player_id: &str) -> String {
        format!("{team_id}_{match_id}_{player_id}")
    }
}

// ---------------------------------------------------------------------------
// Entity trait wiring
// ---------------------------------------------------------------------------

impl Entity for Player {
    const KIND: CollectionKind = CollectionKind::Players;
    const NAME: &'static str = "player";

    fn doc_id(&self) -> String {
        self.player_id.clone()
    }
}

impl Entity for TeamMember {
    const KIND: CollectionKind = CollectionKind::TeamMembers;
    const NAME: &'static str = "team member";

    fn doc_id(&self) -> String {
        self.member_id.clone()
    }
}

impl Entity for Team {
    const KIND: CollectionKind = CollectionKind::Teams;
    const NAME: &'static str = "team";

    fn doc_id(&self) -> String {
        self.team_id.clone()
    }
}

impl Entity for Match {
    const KIND: CollectionKind = CollectionKind::Matches;
    const NAME: &'static str = "match";

    fn doc_id(&self) -> String {
        self.match_id.clone()
    }
}

impl Entity for AttendanceRecord {
    const KIND: CollectionKind = CollectionKind::Attendance;
    const NAME: &'static str = "attendance record";

    fn doc_id(&self) -> String {
        Self::compose_id(&self.team_id, &self.match_id, &self.player_id)
    }
}

// ---------------------------------------------------------------------------
// Id generation and phone normalization
// ---------------------------------------------------------------------------

/// Extract uppercase initials from a full name.
///
/// Multi-word names contribute one letter per word; single-word names
/// contribute their first two letters. The result always has at least two
/// letters (padded with `X` for degenerate input).
pub fn name_initials(name: &str) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    let mut initials: String = match words.as_slice() {
        [] => String::new(),
        [only] => only.chars().take(2).collect(),
        many => many
            .iter()
            .filter_map(|w| w.chars().next())
            .collect(),
    };
    initials = initials
        .chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_uppercase)
        .collect();
    while initials.chars().count() < 2 {
        initials.push('X');
    }
    initials
}

/// Generate a player id of the form `<INITIALS><seq>` that does not collide
/// with any existing id.
pub fn generate_player_id(name: &str, existing_ids: &[String]) -> String {
    let initials = name_initials(name);
    let mut seq: u32 = 1;
    loop {
        let candidate = format!("{initials}{seq}");
        if !existing_ids.iter().any(|id| id == &candidate) {
            return candidate;
        }
        seq = seq.saturating_add(1);
    }
}

/// Generate the next match id `M<seq>`.
pub fn next_match_id(existing_ids: &[String]) -> String {
    let mut seq: u32 = 1;
    loop {
        let candidate = format!("M{seq}");
        if !existing_ids.iter().any(|id| id == &candidate) {
            return candidate;
        }
        seq = seq.saturating_add(1);
    }
}

/// Normalize a phone number to E.164, defaulting to the UK country code.
///
/// Accepts `+44...`, `44...`, and national `07...` forms with optional
/// spaces, dashes, and parentheses.
pub fn normalize_phone(raw: &str) -> Result<String, KickAiError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();

    let normalized = if let Some(rest) = cleaned.strip_prefix('+') {
        format!("+{rest}")
    } else if let Some(rest) = cleaned.strip_prefix("44") {
        format!("+44{rest}")
    } else if let Some(rest) = cleaned.strip_prefix('0') {
        format!("+44{rest}")
    } else {
        return Err(KickAiError::validation(
            "phone",
            format!("cannot normalize phone number: {raw}"),
        ));
    };

    let e164 = regex::Regex::new(r"^\+[1-9]\d{7,14}$")
        .map_err(|e| KickAiError::Programming(format!("bad phone regex: {e}")))?;
    if !e164.is_match(&normalized) {
        return Err(KickAiError::validation(
            "phone",
            format!("not a valid phone number: {raw}"),
        ));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initials_multi_word() {
        assert_eq!(name_initials("John Smith"), "JS");
        assert_eq!(name_initials("Mary Jane Doe"), "MJD");
    }

    #[test]
    fn test_initials_single_word_and_degenerate() {
        assert_eq!(name_initials("Pele"), "PE");
        assert_eq!(name_initials("X"), "XX");
        assert_eq!(name_initials(""), "XX");
    }

    #[test]
    fn test_player_id_sequence_avoids_collisions() {
        let existing = vec!["JS1".to_owned(), "JS2".to_owned()];
        assert_eq!(generate_player_id("John Smith", &existing), "JS3");
        assert_eq!(generate_player_id("Ann Bell", &existing), "AB1");
    }

    #[test]
    fn test_player_id_shape() {
        let id = generate_player_id("John Smith", &[]);
        let pattern = regex::Regex::new(r"^[A-Z]{2,}\d+$").expect("regex");
        assert!(pattern.is_match(&id), "id {id} must match the shape");
    }

    #[test]
    fn test_match_id_sequence() {
        assert_eq!(next_match_id(&[]), "M1");
        assert_eq!(next_match_id(&["M1".to_owned(), "M2".to_owned()]), "M3");
    }

    #[test]
    fn test_phone_national_to_e164() {
        assert_eq!(
            normalize_phone("07123 456789").expect("ok"),
            "+447123456789"
        );
        assert_eq!(
            normalize_phone("07123-456-789").expect("ok"),
            "+447123456789"
        );
    }

    #[test]
    fn test_phone_already_e164_unchanged() {
        assert_eq!(
            normalize_phone("+447123456789").expect("ok"),
            "+447123456789"
        );
        assert_eq!(normalize_phone("+14155550100").expect("ok"), "+14155550100");
    }

    #[test]
    fn test_phone_junk_rejected() {
        assert!(normalize_phone("not a phone").is_err());
        assert!(normalize_phone("+0123").is_err());
        assert!(normalize_phone("").is_err());
    }

    #[test]
    fn test_attendance_id_composition() {
        assert_eq!(
            AttendanceRecord::compose_id("KAI", "M1", "JS1"),
            "KAI_M1_JS1"
        );
    }
}
