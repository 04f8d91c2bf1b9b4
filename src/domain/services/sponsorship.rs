use crate::domain::model::{SponsorshipData, SponsorshipKind, SponsorshipStatus};
use crate::domain::ports::SponsorSource;
use crate::utils::error::Result;

/// Resolves whether an organization funds a project, directly, through a
/// maintainer listed in the funding file, or as seen from the project side.
pub struct SponsorshipChecker<S: SponsorSource> {
    source: S,
}

impl<S: SponsorSource> SponsorshipChecker<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn org_sponsorships(&self, org_name: &str) -> Result<SponsorshipData> {
        self.source.account_sponsorships(org_name).await
    }

    pub async fn entity_sponsors(&self, login: &str) -> Result<SponsorshipData> {
        self.source.account_sponsors(login).await
    }

    pub async fn check_project_sponsorship(
        &self,
        owner: &str,
        repo: &str,
        org_name: &str,
        org_sponsorships: &SponsorshipData,
    ) -> SponsorshipStatus {
        // Direct: the repository owner is sponsored by the org
        if org_sponsorships.current.contains(owner) {
            return SponsorshipStatus::new(SponsorshipKind::ActiveDirect, owner);
        }
        if org_sponsorships.past.contains(owner) {
            return SponsorshipStatus::new(SponsorshipKind::PastDirect, owner);
        }

        // Via maintainer: a funding-file target is sponsored by the org
        let funding = match self.source.repo_funding(owner, repo).await {
            Ok(targets) => targets,
            Err(e) => {
                tracing::debug!("{}/{}: funding lookup failed: {}", owner, repo, e);
                Vec::new()
            }
        };
        for target in &funding {
            if org_sponsorships.current.contains(target) {
                return SponsorshipStatus::new(SponsorshipKind::ActiveViaMaintainer, target.as_str());
            }
            if org_sponsorships.past.contains(target) {
                return SponsorshipStatus::new(SponsorshipKind::PastViaMaintainer, target.as_str());
            }
        }

        // Confirmed: the org shows up among the owner's sponsors
        let sponsors = match self.entity_sponsors(owner).await {
            Ok(sponsors) => sponsors,
            Err(e) => {
                tracing::debug!("{}: sponsor lookup failed: {}", owner, e);
                SponsorshipData::default()
            }
        };
        let org_lower = org_name.to_lowercase();
        if sponsors.current.iter().any(|s| s.to_lowercase() == org_lower) {
            return SponsorshipStatus::new(SponsorshipKind::ActiveConfirmed, owner);
        }
        if sponsors.past.iter().any(|s| s.to_lowercase() == org_lower) {
            return SponsorshipStatus::new(SponsorshipKind::PastConfirmed, owner);
        }

        SponsorshipStatus::not_sponsored()
    }
}
