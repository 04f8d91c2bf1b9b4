use crate::domain::model::ContributionStats;
use crate::domain::ports::ContributionSource;
use crate::utils::error::Result;
use indexmap::IndexMap;
use std::collections::HashSet;

/// True when `email` belongs to `email_domain`. GitHub noreply addresses
/// never match, whatever the domain.
pub fn email_matches_domain(email: Option<&str>, email_domain: &str) -> bool {
    let Some(email) = email.filter(|e| !e.is_empty()) else {
        return false;
    };

    let email_lower = email.to_lowercase();
    if email_lower.contains("noreply") && email_lower.contains("github.com") {
        return false;
    }

    email_lower.ends_with(&format!("@{}", email_domain.to_lowercase()))
}

/// Attributes repository activity to an organization, first by commit email
/// domain and then by org membership.
pub struct ContributionAnalyzer<S: ContributionSource> {
    source: S,
    org_name: String,
    org_members: HashSet<String>,
}

impl<S: ContributionSource> ContributionAnalyzer<S> {
    pub fn new(source: S, org_name: impl Into<String>) -> Self {
        Self {
            source,
            org_name: org_name.into(),
            org_members: HashSet::new(),
        }
    }

    pub fn with_members<I, T>(source: S, org_name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut analyzer = Self::new(source, org_name);
        analyzer.set_org_members(members);
        analyzer
    }

    pub fn set_org_members<I, T>(&mut self, members: I)
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.org_members = members
            .into_iter()
            .map(|m| m.as_ref().to_lowercase())
            .collect();
        tracing::debug!(
            "{} org members loaded for {}",
            self.org_members.len(),
            self.org_name
        );
    }

    pub fn org_members(&self) -> &HashSet<String> {
        &self.org_members
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Attribution key for an affiliated contributor, or `None` when the
    /// contributor is not affiliated.
    pub fn affiliation(
        &self,
        login: Option<&str>,
        email: Option<&str>,
        email_domain: &str,
    ) -> Option<String> {
        if email_matches_domain(email, email_domain) {
            return email.map(str::to_string);
        }

        let login = login.filter(|l| !l.is_empty())?;
        if self.org_members.contains(&login.to_lowercase()) {
            return Some(format!("{}@{}", login, email_domain));
        }

        None
    }

    pub async fn analyze_contributions(
        &self,
        owner: &str,
        repo: &str,
        email_domain: &str,
        past_year: bool,
    ) -> Result<IndexMap<String, ContributionStats>> {
        let mut contributions: IndexMap<String, ContributionStats> = IndexMap::new();

        let committers = self.source.repo_committers(owner, repo, past_year).await?;
        for committer in &committers {
            if let Some(key) = self.affiliation(
                committer.login.as_deref(),
                committer.email.as_deref(),
                email_domain,
            ) {
                contributions.entry(key).or_default().commits += committer.count;
            }
        }

        // Issue and PR authors come without an email, so only membership applies
        let issue_data = self.source.repo_issue_contributors(owner, repo).await?;

        for (login, count) in issue_data.issue_authors(past_year) {
            if let Some(key) = self.affiliation(Some(login.as_str()), None, email_domain) {
                contributions.entry(key).or_default().issues_opened += count;
            }
        }

        for (login, count) in issue_data.pull_request_authors(past_year) {
            if let Some(key) = self.affiliation(Some(login.as_str()), None, email_domain) {
                contributions.entry(key).or_default().pull_requests_opened += count;
            }
        }

        tracing::debug!(
            "{}/{}: {} affiliated contributors",
            owner,
            repo,
            contributions.len()
        );

        Ok(contributions)
    }
}
