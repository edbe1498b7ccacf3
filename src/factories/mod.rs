//! Service and repository factories with bounded per-team caches.
//!
//! Both factories cache instances keyed by `(kind, team_id)`. On insertion
//! past the size bound the oldest entry (by creation time) is evicted; on
//! read, entries older than the TTL are lazily dropped. Defaults: services
//! 100 entries / 1 h, repositories 50 entries / 30 min — both configurable.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::LimitsConfig;
use crate::domain::services::{
    AttendanceService, MatchService, PlayerService, TeamMemberService, TeamService,
};
use crate::domain::{AttendanceRecord, Match, Player, Repository, TeamMember};
use crate::store::DocumentStore;

// ---------------------------------------------------------------------------
// TtlCache
// ---------------------------------------------------------------------------

/// Bounded cache with creation-time TTL and oldest-first eviction.
///
/// Safe under the cooperative scheduler; the mutex serializes access when
/// tasks run on multiple worker threads.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, (V, Instant)>>,
    max_size: usize,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache with the given bound and TTL.
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_size,
            ttl,
        }
    }

    /// Fetch a live entry, dropping it first if it has expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some((_, created)) if created.elapsed() > self.ttl => {
                entries.remove(key);
                debug!(key, "cache entry expired");
                None
            }
            Some((value, _)) => Some(value.clone()),
            None => None,
        }
    }

    /// Insert an entry, evicting expired entries and then the oldest one if
    /// the cache is still at its bound.
    pub fn put(&self, key: &str, value: V) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };

        entries.retain(|_, (_, created)| created.elapsed() <= self.ttl);

        if entries.len() >= self.max_size {
            let oldest = entries
                .iter()
                .min_by_key(|(_, (_, created))| *created)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
                debug!(key = %oldest, "evicted oldest cache entry");
            }
        }

        entries.insert(key.to_owned(), (value, Instant::now()));
    }

    /// Number of live entries (expired ones included until touched).
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// RepositoryFactory
// ---------------------------------------------------------------------------

/// Creates tenant-scoped repositories, cached per `(kind, team_id)`.
pub struct RepositoryFactory {
    store: Arc<dyn DocumentStore>,
    players: TtlCache<Repository<Player>>,
    members: TtlCache<Repository<TeamMember>>,
    matches: TtlCache<Repository<Match>>,
    attendance: TtlCache<Repository<AttendanceRecord>>,
}

impl RepositoryFactory {
    /// Create a factory with the configured bound and TTL.
    pub fn new(store: Arc<dyn DocumentStore>, limits: &LimitsConfig) -> Self {
        let ttl = Duration::from_secs(limits.repository_cache_ttl_secs);
        let size = limits.repository_cache_size;
        Self {
            store,
            players: TtlCache::new(size, ttl),
            members: TtlCache::new(size, ttl),
            matches: TtlCache::new(size, ttl),
            attendance: TtlCache::new(size, ttl),
        }
    }

    /// The backing document store.
    pub fn store(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.store)
    }

    /// Player repository for a team.
    pub fn players(&self, team_id: &str) -> Repository<Player> {
        if let Some(repo) = self.players.get(team_id) {
            return repo;
        }
        let repo = Repository::new(Arc::clone(&self.store), team_id);
        self.players.put(team_id, repo.clone());
        repo
    }

    /// Team member repository for a team.
    pub fn members(&self, team_id: &str) -> Repository<TeamMember> {
        if let Some(repo) = self.members.get(team_id) {
            return repo;
        }
        let repo = Repository::new(Arc::clone(&self.store), team_id);
        self.members.put(team_id, repo.clone());
        repo
    }

    /// Match repository for a team.
    pub fn matches(&self, team_id: &str) -> Repository<Match> {
        if let Some(repo) = self.matches.get(team_id) {
            return repo;
        }
        let repo = Repository::new(Arc::clone(&self.store), team_id);
        self.matches.put(team_id, repo.clone());
        repo
    }

    /// Attendance repository for a team.
    pub fn attendance(&self, team_id: &str) -> Repository<AttendanceRecord> {
        if let Some(repo) = self.attendance.get(team_id) {
            return repo;
        }
        let repo = Repository::new(Arc::clone(&self.store), team_id);
        self.attendance.put(team_id, repo.clone());
        repo
    }
}

// ---------------------------------------------------------------------------
// ServiceFactory
// ---------------------------------------------------------------------------

/// Creates tenant-scoped domain services, cached per `(kind, team_id)`.
pub struct ServiceFactory {
    store: Arc<dyn DocumentStore>,
    players: TtlCache<PlayerService>,
    members: TtlCache<TeamMemberService>,
    matches: TtlCache<MatchService>,
    attendance: TtlCache<AttendanceService>,
    teams: TeamService,
}

impl ServiceFactory {
    /// Create a factory with the configured bound and TTL.
    pub fn new(store: Arc<dyn DocumentStore>, limits: &LimitsConfig) -> Self {
        let ttl = Duration::from_secs(limits.service_cache_ttl_secs);
        let size = limits.service_cache_size;
        Self {
            teams: TeamService::new(Arc::clone(&store)),
            players: TtlCache::new(size, ttl),
            members: TtlCache::new(size, ttl),
            matches: TtlCache::new(size, ttl),
            attendance: TtlCache::new(size, ttl),
            store,
        }
    }

    /// Player service for a team.
    pub fn players(&self, team_id: &str) -> PlayerService {
        if let Some(service) = self.players.get(team_id) {
            return service;
        }
        let service = PlayerService::new(Arc::clone(&self.store), team_id);
        self.players.put(team_id, service.clone());
        service
    }

    /// Team member service for a team.
    pub fn members(&self, team_id: &str) -> TeamMemberService {
        if let Some(service) = self.members.get(team_id) {
            return service;
        }
        let service = TeamMemberService::new(Arc::clone(&self.store), team_id);
        self.members.put(team_id, service.clone());
        service
    }

    /// Match service for a team.
    pub fn matches(&self, team_id: &str) -> MatchService {
        if let Some(service) = self.matches.get(team_id) {
            return service;
        }
        let service = MatchService::new(Arc::clone(&self.store), team_id);
        self.matches.put(team_id, service.clone());
        service
    }

    /// Attendance service for a team.
    pub fn attendance(&self, team_id: &str) -> AttendanceService {
        if let Some(service) = self.attendance.get(team_id) {
            return service;
        }
        let service = AttendanceService::new(Arc::clone(&self.store), team_id);
        self.attendance.put(team_id, service.clone());
        service
    }

    /// The global team service (uncached; one collection).
    pub fn teams(&self) -> &TeamService {
        &self.teams
    }

    /// The backing document store.
    pub fn store(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_ttl_cache_evicts_oldest_at_bound() {
        let cache: TtlCache<u32> = TtlCache::new(2, Duration::from_secs(60));
        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("c", 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None, "oldest entry must be evicted");
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn test_ttl_cache_expires_on_read() {
        let cache: TtlCache<u32> = TtlCache::new(10, Duration::from_millis(0));
        cache.put("a", 1);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("a"), None, "expired entry must be dropped lazily");
    }

    #[tokio::test]
    async fn test_service_factory_reuses_instances() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let factory = ServiceFactory::new(store, &LimitsConfig::default());

        let a = factory.players("KAI");
        let b = factory.players("KAI");
        // Same cached instance: writes through one are visible via the other.
        a.register("John Smith", None, None, 1, "js")
            .await
            .expect("register");
        assert_eq!(b.list().await.expect("list").len(), 1);

        // Different tenant, different collection.
        let other = factory.players("OTHER");
        assert!(other.list().await.expect("list").is_empty());
    }
}
