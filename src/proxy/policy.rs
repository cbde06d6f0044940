//! Resource classification by upstream path.
//!
//! # Design Decisions
//! - Pure path-segment matching; no regex, never looks at response content
//! - Each kind maps to one TTL class and one sensitivity flag
//! - Deterministic: the same path always yields the same kind

use std::fmt;
use std::time::Duration;

use crate::config::CacheConfig;

/// What an upstream path refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    BootstrapStatic,
    Fixtures,
    EventStatus,
    Live,
    Picks,
    EntryHistory,
    Transfers,
    EntrySummary,
    ElementSummary,
    LeagueStandings,
    MyTeam,
    Other,
}

/// How long a kind of resource stays fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlClass {
    /// Season-wide reference data.
    Static,
    /// Completed gameweeks, per-entry history.
    Historical,
    /// In-play and per-gameweek data.
    Live,
    Default,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 12] = [
        Self::BootstrapStatic,
        Self::Fixtures,
        Self::EventStatus,
        Self::Live,
        Self::Picks,
        Self::EntryHistory,
        Self::Transfers,
        Self::EntrySummary,
        Self::ElementSummary,
        Self::LeagueStandings,
        Self::MyTeam,
        Self::Other,
    ];

    /// Inverse of [`ResourceKind::as_str`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Classify a normalized upstream path (no leading slash, no query).
    pub fn classify(path: &str) -> Self {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            ["bootstrap-static"] => Self::BootstrapStatic,
            ["fixtures"] => Self::Fixtures,
            ["event-status"] => Self::EventStatus,
            ["event", _, "live"] => Self::Live,
            ["entry", _, "event", _, "picks"] => Self::Picks,
            ["entry", _, "history"] => Self::EntryHistory,
            ["entry", _, "transfers"] => Self::Transfers,
            ["entry", _] => Self::EntrySummary,
            ["element-summary", _] => Self::ElementSummary,
            ["leagues-classic" | "leagues-h2h", _, "standings"] => Self::LeagueStandings,
            ["my-team", ..] => Self::MyTeam,
            _ => Self::Other,
        }
    }

    pub fn ttl_class(self) -> TtlClass {
        match self {
            Self::BootstrapStatic => TtlClass::Static,
            Self::Fixtures
            | Self::EntryHistory
            | Self::Transfers
            | Self::EntrySummary
            | Self::ElementSummary
            | Self::LeagueStandings => TtlClass::Historical,
            Self::EventStatus | Self::Live | Self::Picks | Self::MyTeam => TtlClass::Live,
            Self::Other => TtlClass::Default,
        }
    }

    /// Per-user, live or event-scoped resources where a 403 is often transient.
    pub fn is_sensitive(self) -> bool {
        matches!(
            self,
            Self::EventStatus
                | Self::Live
                | Self::Picks
                | Self::EntryHistory
                | Self::Transfers
                | Self::EntrySummary
                | Self::LeagueStandings
                | Self::MyTeam
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BootstrapStatic => "bootstrap_static",
            Self::Fixtures => "fixtures",
            Self::EventStatus => "event_status",
            Self::Live => "live",
            Self::Picks => "picks",
            Self::EntryHistory => "entry_history",
            Self::Transfers => "transfers",
            Self::EntrySummary => "entry_summary",
            Self::ElementSummary => "element_summary",
            Self::LeagueStandings => "league_standings",
            Self::MyTeam => "my_team",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caching policy derived from configuration.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    static_ttl: Duration,
    historical_ttl: Duration,
    live_ttl: Duration,
    default_ttl: Duration,
    stale_horizon: Duration,
}

impl CachePolicy {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            static_ttl: Duration::from_secs(config.ttl_static_secs),
            historical_ttl: Duration::from_secs(config.ttl_historical_secs),
            live_ttl: Duration::from_secs(config.ttl_live_secs),
            default_ttl: Duration::from_secs(config.ttl_default_secs),
            stale_horizon: config.stale_horizon(),
        }
    }

    pub fn ttl(&self, kind: ResourceKind) -> Duration {
        match kind.ttl_class() {
            TtlClass::Static => self.static_ttl,
            TtlClass::Historical => self.historical_ttl,
            TtlClass::Live => self.live_ttl,
            TtlClass::Default => self.default_ttl,
        }
    }

    pub fn stale_horizon(&self) -> Duration {
        self.stale_horizon
    }

    /// `Cache-Control` for an authoritative (fresh or just fetched) response.
    pub fn cache_control(&self, kind: ResourceKind) -> String {
        let ttl = self.ttl(kind).as_secs();
        match kind.ttl_class() {
            TtlClass::Static | TtlClass::Historical => format!(
                "public, max-age={}, stale-while-revalidate={}",
                ttl,
                self.stale_horizon.as_secs()
            ),
            TtlClass::Live | TtlClass::Default => format!("public, max-age={}", ttl),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_paths() {
        let cases = [
            ("bootstrap-static/", ResourceKind::BootstrapStatic),
            ("fixtures/", ResourceKind::Fixtures),
            ("event-status/", ResourceKind::EventStatus),
            ("event/12/live/", ResourceKind::Live),
            ("entry/123/event/12/picks/", ResourceKind::Picks),
            ("entry/123/history/", ResourceKind::EntryHistory),
            ("entry/123/transfers/", ResourceKind::Transfers),
            ("entry/123/", ResourceKind::EntrySummary),
            ("element-summary/7/", ResourceKind::ElementSummary),
            ("leagues-classic/314/standings/", ResourceKind::LeagueStandings),
            ("leagues-h2h/9/standings/", ResourceKind::LeagueStandings),
            ("my-team/123/", ResourceKind::MyTeam),
            ("teams/", ResourceKind::Other),
            ("entry/123/event/12/", ResourceKind::Other),
        ];
        for (path, expected) in cases {
            assert_eq!(ResourceKind::classify(path), expected, "path {}", path);
        }
    }

    #[test]
    fn test_sensitivity() {
        assert!(ResourceKind::Picks.is_sensitive());
        assert!(ResourceKind::Live.is_sensitive());
        assert!(ResourceKind::EntrySummary.is_sensitive());
        assert!(!ResourceKind::BootstrapStatic.is_sensitive());
        assert!(!ResourceKind::ElementSummary.is_sensitive());
        assert!(!ResourceKind::Other.is_sensitive());
    }

    #[test]
    fn test_ttl_and_cache_control_per_class() {
        let policy = CachePolicy::from_config(&CacheConfig::default());

        assert_eq!(policy.ttl(ResourceKind::BootstrapStatic), Duration::from_secs(3600));
        assert_eq!(policy.ttl(ResourceKind::Picks), Duration::from_secs(30));
        assert_eq!(policy.ttl(ResourceKind::EntryHistory), Duration::from_secs(300));
        assert_eq!(policy.ttl(ResourceKind::Other), Duration::from_secs(60));

        assert_eq!(policy.cache_control(ResourceKind::Live), "public, max-age=30");
        assert_eq!(
            policy.cache_control(ResourceKind::BootstrapStatic),
            "public, max-age=3600, stale-while-revalidate=43200"
        );
    }
}
