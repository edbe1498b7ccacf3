//! Domain services — stateless business operations over the repositories.
//!
//! Services throw typed [`KickAiError`]s; the tool layer renders them as
//! user-safe envelope strings. Every service is cheap to construct and safe
//! for concurrent use by many tasks.

use std::sync::Arc;

use base64::Engine;
use chrono::{NaiveDate, Utc};
use rand::RngCore;
use tracing::{debug, info};

use crate::domain::{
    generate_player_id, next_match_id, normalize_phone, AttendanceRecord, AttendanceStatus, Match,
    MatchStatus, MemberRole, Player, PlayerStatus, Repository, Team, TeamMember,
};
use crate::store::{DocumentStore, TEAMS_COLLECTION};
use crate::types::{ChatType, KickAiError, UserPermissions};

/// Default squad size cap for selection.
const SQUAD_SIZE: usize = 11;

// ---------------------------------------------------------------------------
// PlayerService
// ---------------------------------------------------------------------------

/// Player registration and lifecycle.
#[derive(Debug, Clone)]
pub struct PlayerService {
    players: Repository<Player>,
    team_id: String,
}

impl PlayerService {
    /// Create a service scoped to one tenant.
    pub fn new(store: Arc<dyn DocumentStore>, team_id: &str) -> Self {
        Self {
            players: Repository::new(store, team_id),
            team_id: team_id.to_owned(),
        }
    }

    /// Register a new player in `pending` status.
    ///
    /// The phone number, when supplied, is normalized to E.164 and checked
    /// for duplicates; a clash is a conflict naming the existing record.
    pub async fn register(
        &self,
        name: &str,
        phone: Option<&str>,
        position: Option<&str>,
        telegram_id: i64,
        username: &str,
    ) -> Result<Player, KickAiError> {
        if name.trim().is_empty() {
            return Err(KickAiError::validation("name", "must not be empty"));
        }

        let phone = match phone {
            Some(raw) => Some(normalize_phone(raw)?),
            None => None,
        };

        if let Some(ref normalized) = phone {
            if let Some(existing) = self.find_by_phone(normalized).await? {
                return Err(KickAiError::Conflict {
                    entity: "player",
                    key: format!("{normalized} ({})", existing.player_id),
                });
            }
        }

        let existing_ids: Vec<String> = self
            .players
            .all()
            .await?
            .into_iter()
            .map(|p| p.player_id)
            .collect();
        let player_id = generate_player_id(name, &existing_ids);

        let now = Utc::now();
        let player = Player {
            player_id: player_id.clone(),
            team_id: self.team_id.clone(),
            name: name.trim().to_owned(),
            phone,
            position: position.map(|p| p.trim().to_lowercase()),
            status: PlayerStatus::Pending,
            telegram_id: Some(telegram_id),
            username: Some(username.to_owned()),
            created_at: now,
            updated_at: now,
        };
        self.players.save(&player).await?;
        info!(team_id = %self.team_id, player_id = %player_id, "player registered");
        Ok(player)
    }

    /// Approve a pending player.
    pub async fn approve(&self, player_id: &str) -> Result<Player, KickAiError> {
        self.transition(player_id, PlayerStatus::Active).await
    }

    /// Reject a pending player.
    pub async fn reject(&self, player_id: &str) -> Result<Player, KickAiError> {
        self.transition(player_id, PlayerStatus::Rejected).await
    }

    /// Remove a player from the squad.
    pub async fn remove(&self, player_id: &str) -> Result<Player, KickAiError> {
        self.transition(player_id, PlayerStatus::Removed).await
    }

    async fn transition(
        &self,
        player_id: &str,
        status: PlayerStatus,
    ) -> Result<Player, KickAiError> {
        let mut player = self.get(player_id).await?;
        player.status = status;
        player.updated_at = Utc::now();
        self.players.save(&player).await?;
        info!(
            team_id = %self.team_id,
            player_id = %player.player_id,
            status = status.as_str(),
            "player status changed"
        );
        Ok(player)
    }

    /// Fetch a player by id, with lookup hints on miss.
    pub async fn get(&self, player_id: &str) -> Result<Player, KickAiError> {
        self.players
            .find(player_id)
            .await?
            .ok_or_else(|| KickAiError::NotFound {
                entity: "player",
                key: player_id.to_owned(),
                hint: Some("player id or phone number".to_owned()),
            })
    }

    /// Find a player by E.164 phone number.
    pub async fn find_by_phone(&self, phone: &str) -> Result<Option<Player>, KickAiError> {
        Ok(self
            .players
            .all()
            .await?
            .into_iter()
            .find(|p| p.phone.as_deref() == Some(phone)))
    }

    /// Find a player by linked Telegram account.
    pub async fn find_by_telegram(&self, telegram_id: i64) -> Result<Option<Player>, KickAiError> {
        Ok(self
            .players
            .all()
            .await?
            .into_iter()
            .find(|p| p.telegram_id == Some(telegram_id)))
    }

    /// All players, every status.
    pub async fn list(&self) -> Result<Vec<Player>, KickAiError> {
        self.players.all().await
    }

    /// Active players only.
    pub async fn active(&self) -> Result<Vec<Player>, KickAiError> {
        Ok(self
            .players
            .all()
            .await?
            .into_iter()
            .filter(|p| p.status == PlayerStatus::Active)
            .collect())
    }

    /// Attach a contact-shared phone number to the caller's record.
    ///
    /// Used by the synthetic contact-share command to complete a pending
    /// registration.
    pub async fn link_contact(
        &self,
        telegram_id: i64,
        phone_raw: &str,
    ) -> Result<Player, KickAiError> {
        let normalized = normalize_phone(phone_raw)?;
        let mut player = self
            .find_by_telegram(telegram_id)
            .await?
            .ok_or_else(|| KickAiError::NotFound {
                entity: "player",
                key: format!("telegram:{telegram_id}"),
                hint: Some("register first with /register".to_owned()),
            })?;
        player.phone = Some(normalized);
        player.updated_at = Utc::now();
        self.players.save(&player).await?;
        info!(team_id = %self.team_id, player_id = %player.player_id, "contact linked");
        Ok(player)
    }
}

// ---------------------------------------------------------------------------
// TeamMemberService
// ---------------------------------------------------------------------------

/// Leadership-side team member administration.
#[derive(Debug, Clone)]
pub struct TeamMemberService {
    members: Repository<TeamMember>,
    team_id: String,
}

impl TeamMemberService {
    /// Create a service scoped to one tenant.
    pub fn new(store: Arc<dyn DocumentStore>, team_id: &str) -> Self {
        Self {
            members: Repository::new(store, team_id),
            team_id: team_id.to_owned(),
        }
    }

    /// Add a leadership member.
    pub async fn add(
        &self,
        name: &str,
        telegram_id: Option<i64>,
        role: MemberRole,
    ) -> Result<TeamMember, KickAiError> {
        if name.trim().is_empty() {
            return Err(KickAiError::validation("name", "must not be empty"));
        }
        let existing_ids: Vec<String> = self
            .members
            .all()
            .await?
            .into_iter()
            .map(|m| m.member_id)
            .collect();
        let member_id = generate_player_id(name, &existing_ids);

        let member = TeamMember {
            member_id: member_id.clone(),
            team_id: self.team_id.clone(),
            name: name.trim().to_owned(),
            telegram_id,
            role,
            phone: None,
            created_at: Utc::now(),
        };
        self.members.save(&member).await?;
        info!(team_id = %self.team_id, member_id = %member_id, role = role.as_str(), "team member added");
        Ok(member)
    }

    /// All members.
    pub async fn list(&self) -> Result<Vec<TeamMember>, KickAiError> {
        self.members.all().await
    }

    /// Find a member by Telegram account.
    pub async fn find_by_telegram(
        &self,
        telegram_id: i64,
    ) -> Result<Option<TeamMember>, KickAiError> {
        Ok(self
            .members
            .all()
            .await?
            .into_iter()
            .find(|m| m.telegram_id == Some(telegram_id)))
    }

    /// Whether the Telegram account belongs to an admin member.
    pub async fn is_admin(&self, telegram_id: i64) -> Result<bool, KickAiError> {
        Ok(self
            .find_by_telegram(telegram_id)
            .await?
            .map(|m| m.is_admin())
            .unwrap_or(false))
    }
}

// ---------------------------------------------------------------------------
// MatchService
// ---------------------------------------------------------------------------

/// Fixture management.
#[derive(Debug, Clone)]
pub struct MatchService {
    matches: Repository<Match>,
    team_id: String,
}

impl MatchService {
    /// Create a service scoped to one tenant.
    pub fn new(store: Arc<dyn DocumentStore>, team_id: &str) -> Self {
        Self {
            matches: Repository::new(store, team_id),
            team_id: team_id.to_owned(),
        }
    }

    /// Create a scheduled match.
    pub async fn create(
        &self,
        opponent: &str,
        date: &str,
        venue: Option<&str>,
    ) -> Result<Match, KickAiError> {
        if opponent.trim().is_empty() {
            return Err(KickAiError::validation("opponent", "must not be empty"));
        }
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|_| KickAiError::validation("date", "expected YYYY-MM-DD"))?;

        let existing_ids: Vec<String> = self
            .matches
            .all()
            .await?
            .into_iter()
            .map(|m| m.match_id)
            .collect();
        let match_id = next_match_id(&existing_ids);

        let fixture = Match {
            match_id: match_id.clone(),
            team_id: self.team_id.clone(),
            opponent: opponent.trim().to_owned(),
            date,
            venue: venue.map(|v| v.trim().to_owned()),
            status: MatchStatus::Scheduled,
            created_at: Utc::now(),
        };
        self.matches.save(&fixture).await?;
        info!(team_id = %self.team_id, match_id = %match_id, "match created");
        Ok(fixture)
    }

    /// Fetch a match by id.
    pub async fn get(&self, match_id: &str) -> Result<Match, KickAiError> {
        self.matches.require(match_id).await
    }

    /// All matches, ordered by id.
    pub async fn list(&self) -> Result<Vec<Match>, KickAiError> {
        self.matches.all().await
    }
}

// ---------------------------------------------------------------------------
// AttendanceService
// ---------------------------------------------------------------------------

/// Per-match availability tracking and squad selection.
#[derive(Debug, Clone)]
pub struct AttendanceService {
    attendance: Repository<AttendanceRecord>,
    team_id: String,
}

impl AttendanceService {
    /// Create a service scoped to one tenant.
    pub fn new(store: Arc<dyn DocumentStore>, team_id: &str) -> Self {
        Self {
            attendance: Repository::new(store, team_id),
            team_id: team_id.to_owned(),
        }
    }

    /// Record (or overwrite) a player's availability for a match.
    pub async fn mark(
        &self,
        match_id: &str,
        player_id: &str,
        status: AttendanceStatus,
    ) -> Result<AttendanceRecord, KickAiError> {
        let record = AttendanceRecord {
            team_id: self.team_id.clone(),
            match_id: match_id.to_owned(),
            player_id: player_id.to_owned(),
            status,
            marked_at: Utc::now(),
        };
        self.attendance.save(&record).await?;
        debug!(
            team_id = %self.team_id,
            match_id,
            player_id,
            status = status.as_str(),
            "attendance marked"
        );
        Ok(record)
    }

    /// Every record for one match.
    pub async fn for_match(&self, match_id: &str) -> Result<Vec<AttendanceRecord>, KickAiError> {
        Ok(self
            .attendance
            .all()
            .await?
            .into_iter()
            .filter(|r| r.match_id == match_id)
            .collect())
    }

    /// Availability counts for one match: (yes, no, maybe).
    pub async fn summary(&self, match_id: &str) -> Result<(usize, usize, usize), KickAiError> {
        let records = self.for_match(match_id).await?;
        let yes = records
            .iter()
            .filter(|r| r.status == AttendanceStatus::Yes)
            .count();
        let no = records
            .iter()
            .filter(|r| r.status == AttendanceStatus::No)
            .count();
        let maybe = records
            .iter()
            .filter(|r| r.status == AttendanceStatus::Maybe)
            .count();
        Ok((yes, no, maybe))
    }

    /// Select a squad of up to eleven from the players who answered yes.
    ///
    /// Selection order is answer time: first to confirm, first selected.
    pub async fn select_squad(
        &self,
        match_id: &str,
        active_players: &[Player],
    ) -> Result<Vec<Player>, KickAiError> {
        let mut available: Vec<AttendanceRecord> = self
            .for_match(match_id)
            .await?
            .into_iter()
            .filter(|r| r.status == AttendanceStatus::Yes)
            .collect();
        available.sort_by_key(|r| r.marked_at);

        let squad: Vec<Player> = available
            .iter()
            .filter_map(|r| {
                active_players
                    .iter()
                    .find(|p| p.player_id == r.player_id)
                    .cloned()
            })
            .take(SQUAD_SIZE)
            .collect();
        Ok(squad)
    }
}

// ---------------------------------------------------------------------------
// TeamService
// ---------------------------------------------------------------------------

/// Tenant records from the global teams collection.
#[derive(Debug, Clone)]
pub struct TeamService {
    teams: Repository<Team>,
}

impl TeamService {
    /// Create the service over the global collection.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            teams: Repository::with_collection(store, TEAMS_COLLECTION),
        }
    }

    /// Fetch a team by id.
    pub async fn get(&self, team_id: &str) -> Result<Team, KickAiError> {
        self.teams.require(team_id).await
    }

    /// Fetch a team if present.
    pub async fn find(&self, team_id: &str) -> Result<Option<Team>, KickAiError> {
        self.teams.find(team_id).await
    }

    /// Insert or replace a team record.
    pub async fn upsert(&self, team: &Team) -> Result<(), KickAiError> {
        self.teams.save(team).await
    }
}

// ---------------------------------------------------------------------------
// InviteService
// ---------------------------------------------------------------------------

/// Invite-link generation keyed by the configured secret.
#[derive(Debug, Clone)]
pub struct InviteService {
    secret: String,
}

impl InviteService {
    /// Create the service. An empty secret is a configuration problem the
    /// startup validator reports; codes minted without one never verify
    /// against a properly configured instance.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Generate an opaque invite code for a chat of the given team.
    ///
    /// The code embeds a random nonce and a checksum folded over the secret;
    /// it is opaque to clients and validated server-side.
    pub fn generate(&self, team_id: &str, chat_type: ChatType) -> String {
        let mut nonce = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce);
        let nonce_hex: String = nonce.iter().map(|b| format!("{b:02x}")).collect();

        let tag = self.tag(team_id, chat_type, &nonce_hex);
        let payload = format!("{team_id}:{}:{nonce_hex}:{tag}", chat_type.as_str());
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(payload)
    }

    /// Verify an invite code and return its `(team_id, chat_type)`.
    pub fn verify(&self, code: &str) -> Result<(String, ChatType), KickAiError> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(code)
            .map_err(|_| KickAiError::validation("invite", "malformed invite code"))?;
        let payload = String::from_utf8(bytes)
            .map_err(|_| KickAiError::validation("invite", "malformed invite code"))?;

        let parts: Vec<&str> = payload.split(':').collect();
        let [team_id, chat, nonce, tag] = parts.as_slice() else {
            return Err(KickAiError::validation("invite", "malformed invite code"));
        };
        let chat_type: ChatType = chat.parse()?;
        if self.tag(team_id, chat_type, nonce) != *tag {
            return Err(KickAiError::validation("invite", "invite code failed verification"));
        }
        Ok(((*team_id).to_owned(), chat_type))
    }

    /// Keyed checksum over the payload fields.
    ///
    /// Not a cryptographic MAC; invite codes gate chat joins, not secrets,
    /// and are additionally checked against the team record server-side.
    fn tag(&self, team_id: &str, chat_type: ChatType, nonce: &str) -> String {
        let mut acc: u64 = 0xcbf2_9ce4_8422_2325;
        for b in self
            .secret
            .bytes()
            .chain(team_id.bytes())
            .chain(chat_type.as_str().bytes())
            .chain(nonce.bytes())
        {
            acc ^= u64::from(b);
            acc = acc.wrapping_mul(0x1000_0000_01b3);
        }
        format!("{acc:016x}")
    }
}

// ---------------------------------------------------------------------------
// Permission lookup
// ---------------------------------------------------------------------------

/// Resolve the caller's permission snapshot from the domain records.
///
/// `is_admin` requires an admin-role member record; `is_leadership` is any
/// member record. Both therefore satisfy the context invariant that admin
/// and leadership imply registration.
pub async fn lookup_permissions(
    players: &PlayerService,
    members: &TeamMemberService,
    telegram_id: i64,
) -> Result<UserPermissions, KickAiError> {
    let player = players.find_by_telegram(telegram_id).await?;
    let member = members.find_by_telegram(telegram_id).await?;

    Ok(UserPermissions {
        is_player: player.is_some(),
        is_team_member: member.is_some(),
        is_admin: member.as_ref().map(TeamMember::is_admin).unwrap_or(false),
        is_leadership: member.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn store() -> Arc<dyn DocumentStore> {
        Arc::new(MemoryStore::new())
    }

    #[tokio::test]
    async fn test_register_generates_sequential_ids() {
        let players = PlayerService::new(store(), "KAI");
        let p1 = players
            .register("John Smith", Some("+447123456789"), Some("midfielder"), 1, "js")
            .await
            .expect("register");
        let p2 = players
            .register("Jane Stone", Some("+447123456780"), Some("defender"), 2, "jstone")
            .await
            .expect("register");
        assert_eq!(p1.player_id, "JS1");
        assert_eq!(p2.player_id, "JS2");
        assert_eq!(p1.status, PlayerStatus::Pending);
    }

    #[tokio::test]
    async fn test_duplicate_phone_is_conflict() {
        let players = PlayerService::new(store(), "KAI");
        players
            .register("John Smith", Some("07123456789"), None, 1, "js")
            .await
            .expect("register");
        let err = players
            .register("Jim Shoe", Some("+447123456789"), None, 2, "jshoe")
            .await
            .expect_err("duplicate phone");
        assert!(matches!(err, KickAiError::Conflict { .. }));
        assert!(err.to_string().contains("JS1"));
    }

    #[tokio::test]
    async fn test_approve_lifecycle() {
        let players = PlayerService::new(store(), "KAI");
        let p = players
            .register("John Smith", None, None, 1, "js")
            .await
            .expect("register");
        let approved = players.approve(&p.player_id).await.expect("approve");
        assert_eq!(approved.status, PlayerStatus::Active);
        assert_eq!(players.active().await.expect("active").len(), 1);
    }

    #[tokio::test]
    async fn test_link_contact_normalizes_phone() {
        let players = PlayerService::new(store(), "KAI");
        players
            .register("John Smith", None, None, 42, "js")
            .await
            .expect("register");
        let linked = players
            .link_contact(42, "07123 456789")
            .await
            .expect("link");
        assert_eq!(linked.phone.as_deref(), Some("+447123456789"));
    }

    #[tokio::test]
    async fn test_link_contact_without_registration_fails() {
        let players = PlayerService::new(store(), "KAI");
        let err = players
            .link_contact(99, "07123456789")
            .await
            .expect_err("no record");
        assert!(matches!(err, KickAiError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_attendance_summary_and_squad() {
        let s = store();
        let players = PlayerService::new(Arc::clone(&s), "KAI");
        let attendance = AttendanceService::new(Arc::clone(&s), "KAI");

        let mut active = Vec::new();
        for (i, name) in ["Ann Ash", "Ben Bay", "Cal Cox"].iter().enumerate() {
            let i = i64::try_from(i).expect("small");
            let p = players
                .register(name, None, None, i.saturating_add(1), "u")
                .await
                .expect("register");
            active.push(players.approve(&p.player_id).await.expect("approve"));
        }

        attendance
            .mark("M1", &active[0].player_id, AttendanceStatus::Yes)
            .await
            .expect("mark");
        attendance
            .mark("M1", &active[1].player_id, AttendanceStatus::No)
            .await
            .expect("mark");
        attendance
            .mark("M1", &active[2].player_id, AttendanceStatus::Maybe)
            .await
            .expect("mark");

        assert_eq!(attendance.summary("M1").await.expect("summary"), (1, 1, 1));

        let squad = attendance
            .select_squad("M1", &active)
            .await
            .expect("squad");
        assert_eq!(squad.len(), 1);
        assert_eq!(squad[0].player_id, active[0].player_id);
    }

    #[tokio::test]
    async fn test_match_creation_validates_date() {
        let matches = MatchService::new(store(), "KAI");
        assert!(matches.create("Rovers", "not-a-date", None).await.is_err());
        let m = matches
            .create("Rovers", "2026-09-12", Some("Home pitch"))
            .await
            .expect("create");
        assert_eq!(m.match_id, "M1");
        assert_eq!(m.status, MatchStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_permission_lookup_flags() {
        let s = store();
        let players = PlayerService::new(Arc::clone(&s), "KAI");
        let members = TeamMemberService::new(Arc::clone(&s), "KAI");

        players
            .register("John Smith", None, None, 1, "js")
            .await
            .expect("register");
        members
            .add("Mary Jane Doe", Some(2), MemberRole::Admin)
            .await
            .expect("add");

        let player_perms = lookup_permissions(&players, &members, 1)
            .await
            .expect("lookup");
        assert!(player_perms.is_player);
        assert!(!player_perms.is_admin);
        player_perms.validate().expect("consistent");

        let admin_perms = lookup_permissions(&players, &members, 2)
            .await
            .expect("lookup");
        assert!(admin_perms.is_admin);
        assert!(admin_perms.is_leadership);
        admin_perms.validate().expect("consistent");

        let stranger = lookup_permissions(&players, &members, 3)
            .await
            .expect("lookup");
        assert!(!stranger.is_player && !stranger.is_team_member);
    }

    #[test]
    fn test_invite_roundtrip_and_tamper() {
        let invites = InviteService::new("super-secret-key");
        let code = invites.generate("KAI", ChatType::Main);
        let (team, chat) = invites.verify(&code).expect("verify");
        assert_eq!(team, "KAI");
        assert_eq!(chat, ChatType::Main);

        let other = InviteService::new("different-secret");
        assert!(other.verify(&code).is_err());
    }
}
