use indexmap::IndexMap;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::{Add, AddAssign};

/// A package whose source lives in a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub ecosystem: String,
    pub owner: String,
    pub repo: String,
    pub dependents_count: u64,
    pub repository_url: String,
}

impl Package {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// Per-contributor activity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ContributionStats {
    pub commits: u64,
    pub pull_requests_opened: u64,
    pub pull_requests_merged: u64,
    pub issues_opened: u64,
    pub issue_comments: u64,
    pub pr_review_comments: u64,
}

impl ContributionStats {
    /// Merged PRs are a subset of opened PRs and are not counted twice.
    pub fn total_activity(&self) -> u64 {
        self.commits
            + self.pull_requests_opened
            + self.issues_opened
            + self.issue_comments
            + self.pr_review_comments
    }
}

impl Add for ContributionStats {
    type Output = ContributionStats;

    fn add(mut self, other: ContributionStats) -> ContributionStats {
        self += other;
        self
    }
}

impl AddAssign for ContributionStats {
    fn add_assign(&mut self, other: ContributionStats) {
        self.commits += other.commits;
        self.pull_requests_opened += other.pull_requests_opened;
        self.pull_requests_merged += other.pull_requests_merged;
        self.issues_opened += other.issues_opened;
        self.issue_comments += other.issue_comments;
        self.pr_review_comments += other.pr_review_comments;
    }
}

impl std::iter::Sum for ContributionStats {
    fn sum<I: Iterator<Item = ContributionStats>>(iter: I) -> Self {
        iter.fold(ContributionStats::default(), Add::add)
    }
}

impl Serialize for ContributionStats {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ContributionStats", 7)?;
        state.serialize_field("commits", &self.commits)?;
        state.serialize_field("pull_requests_opened", &self.pull_requests_opened)?;
        state.serialize_field("pull_requests_merged", &self.pull_requests_merged)?;
        state.serialize_field("issues_opened", &self.issues_opened)?;
        state.serialize_field("issue_comments", &self.issue_comments)?;
        state.serialize_field("pr_review_comments", &self.pr_review_comments)?;
        state.serialize_field("total_activity", &self.total_activity())?;
        state.end()
    }
}

/// Accounts on one side of a sponsorship relation, split by whether the
/// sponsorship is still running.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SponsorshipData {
    pub current: HashSet<String>,
    pub past: HashSet<String>,
}

impl SponsorshipData {
    pub fn is_empty(&self) -> bool {
        self.current.is_empty() && self.past.is_empty()
    }

    pub fn record(&mut self, login: impl Into<String>, active: bool) {
        if active {
            self.current.insert(login.into());
        } else {
            self.past.insert(login.into());
        }
    }

    /// Union with another source. An account active in either source is
    /// current and is removed from `past`.
    pub fn merge(&mut self, other: SponsorshipData) {
        self.current.extend(other.current);
        self.past.extend(other.past);
        let current = &self.current;
        self.past.retain(|login| !current.contains(login));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SponsorshipKind {
    ActiveDirect,
    PastDirect,
    ActiveViaMaintainer,
    PastViaMaintainer,
    ActiveConfirmed,
    PastConfirmed,
    NotSponsored,
}

impl SponsorshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SponsorshipKind::ActiveDirect => "ACTIVE_DIRECT",
            SponsorshipKind::PastDirect => "PAST_DIRECT",
            SponsorshipKind::ActiveViaMaintainer => "ACTIVE_VIA_MAINTAINER",
            SponsorshipKind::PastViaMaintainer => "PAST_VIA_MAINTAINER",
            SponsorshipKind::ActiveConfirmed => "ACTIVE_CONFIRMED",
            SponsorshipKind::PastConfirmed => "PAST_CONFIRMED",
            SponsorshipKind::NotSponsored => "NOT_SPONSORED",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SponsorshipKind::ActiveDirect
                | SponsorshipKind::ActiveViaMaintainer
                | SponsorshipKind::ActiveConfirmed
        )
    }

    pub fn is_past(&self) -> bool {
        matches!(
            self,
            SponsorshipKind::PastDirect
                | SponsorshipKind::PastViaMaintainer
                | SponsorshipKind::PastConfirmed
        )
    }
}

impl fmt::Display for SponsorshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SponsorshipStatus {
    pub status: SponsorshipKind,
    pub entity: Option<String>,
}

impl SponsorshipStatus {
    pub fn new(status: SponsorshipKind, entity: impl Into<String>) -> Self {
        Self {
            status,
            entity: Some(entity.into()),
        }
    }

    pub fn not_sponsored() -> Self {
        Self {
            status: SponsorshipKind::NotSponsored,
            entity: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_past(&self) -> bool {
        self.status.is_past()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngagementTier {
    FullEngagement,
    CodeOnly,
    MoneyOnly,
    NoEngagement,
}

impl EngagementTier {
    pub const ALL: [EngagementTier; 4] = [
        EngagementTier::FullEngagement,
        EngagementTier::CodeOnly,
        EngagementTier::MoneyOnly,
        EngagementTier::NoEngagement,
    ];

    pub fn classify(has_contributions: bool, has_active_sponsorship: bool) -> Self {
        match (has_contributions, has_active_sponsorship) {
            (true, true) => EngagementTier::FullEngagement,
            (true, false) => EngagementTier::CodeOnly,
            (false, true) => EngagementTier::MoneyOnly,
            (false, false) => EngagementTier::NoEngagement,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementTier::FullEngagement => "FULL_ENGAGEMENT",
            EngagementTier::CodeOnly => "CODE_ONLY",
            EngagementTier::MoneyOnly => "MONEY_ONLY",
            EngagementTier::NoEngagement => "NO_ENGAGEMENT",
        }
    }
}

impl fmt::Display for EngagementTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Analysis outcome for a single package. `contributors` is keyed by
/// attribution key (matched email, or `login@domain` for member matches).
#[derive(Debug, Clone, PartialEq)]
pub struct PackageResult {
    pub package: Package,
    pub contributors: IndexMap<String, ContributionStats>,
    pub total_contributions: ContributionStats,
    pub unique_contributor_count: usize,
    pub sponsorship: SponsorshipStatus,
}

impl PackageResult {
    pub fn new(
        package: Package,
        contributors: IndexMap<String, ContributionStats>,
        sponsorship: SponsorshipStatus,
    ) -> Self {
        let total_contributions = contributors.values().copied().sum();
        let unique_contributor_count = contributors.len();
        Self {
            package,
            contributors,
            total_contributions,
            unique_contributor_count,
            sponsorship,
        }
    }

    pub fn has_contributions(&self) -> bool {
        self.total_contributions.total_activity() > 0
    }

    pub fn has_active_sponsorship(&self) -> bool {
        self.sponsorship.is_active()
    }

    pub fn engagement_tier(&self) -> EngagementTier {
        EngagementTier::classify(self.has_contributions(), self.has_active_sponsorship())
    }

    /// Contributor with the highest total activity, if any.
    pub fn top_contributor(&self) -> Option<(&str, &ContributionStats)> {
        let mut best: Option<(&str, &ContributionStats)> = None;
        for (key, stats) in &self.contributors {
            match best {
                Some((_, b)) if b.total_activity() >= stats.total_activity() => {}
                _ => best = Some((key.as_str(), stats)),
            }
        }
        best
    }
}

impl Serialize for PackageResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PackageResult", 6)?;
        state.serialize_field("package", &self.package)?;
        state.serialize_field("unique_contributor_count", &self.unique_contributor_count)?;
        state.serialize_field("total_contributions", &self.total_contributions)?;
        state.serialize_field("sponsorship", &self.sponsorship)?;
        state.serialize_field("engagement_tier", &self.engagement_tier())?;
        state.serialize_field("contributors", &self.contributors)?;
        state.end()
    }
}

/// A git author as reported by the commits service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Committer {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub count: u64,
}

/// Issue and PR author counts keyed by GitHub login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueContributors {
    #[serde(default, deserialize_with = "null_as_default")]
    pub issue_authors: HashMap<String, u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pull_request_authors: HashMap<String, u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub past_year_issue_authors: HashMap<String, u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub past_year_pull_request_authors: HashMap<String, u64>,
}

impl IssueContributors {
    pub fn issue_authors(&self, past_year: bool) -> &HashMap<String, u64> {
        if past_year {
            &self.past_year_issue_authors
        } else {
            &self.issue_authors
        }
    }

    pub fn pull_request_authors(&self, past_year: bool) -> &HashMap<String, u64> {
        if past_year {
            &self.past_year_pull_request_authors
        } else {
            &self.pull_request_authors
        }
    }
}

/// Registry metadata returned by a purl lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ecosystem: Option<String>,
    #[serde(default)]
    pub repository_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dependent_repos_count: u64,
}

pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
