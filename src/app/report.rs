//! Report assembly, console summary and CSV export.

use crate::domain::model::{ContributionStats, EngagementTier, PackageResult};
use crate::utils::error::{AnalyzerError, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;

const TOP_CONTRIBUTORS_KEPT: usize = 20;
const TOP_CONTRIBUTORS_PRINTED: usize = 10;
const PACKAGES_PRINTED: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngagementBreakdown {
    pub full_engagement: usize,
    pub code_only: usize,
    pub money_only: usize,
    pub no_engagement: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub organization: String,
    pub email_domain: String,
    pub time_window_years: u32,
    pub analysis_date: String,
    pub total_critical_packages: usize,
    pub packages_with_contributions: usize,
    pub packages_with_active_sponsorship: usize,
    pub packages_with_past_sponsorship: usize,
    pub packages_with_no_engagement: usize,
    pub total_commits: u64,
    pub total_prs_opened: u64,
    pub total_issues_opened: u64,
    pub unique_contributors: usize,
    pub engagement_breakdown: EngagementBreakdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopContributor {
    pub email: String,
    pub packages_count: usize,
    pub packages: Vec<String>,
    pub contributions: ContributionStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub summary: ReportSummary,
    pub engagement_tiers: BTreeMap<EngagementTier, Vec<PackageResult>>,
    pub top_contributors: Vec<TopContributor>,
    pub detailed_results: Vec<PackageResult>,
}

impl AnalysisReport {
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Aggregate contributors across packages, keeping first-seen order.
fn aggregate_contributors(results: &[PackageResult]) -> Vec<TopContributor> {
    let mut order: Vec<TopContributor> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for result in results {
        for (key, stats) in &result.contributors {
            let slot = *index.entry(key.as_str()).or_insert_with(|| {
                order.push(TopContributor {
                    email: key.clone(),
                    packages_count: 0,
                    packages: Vec::new(),
                    contributions: ContributionStats::default(),
                });
                order.len() - 1
            });
            let entry = &mut order[slot];
            entry.packages.push(result.package.name.clone());
            entry.packages_count = entry.packages.len();
            entry.contributions += *stats;
        }
    }

    order
}

pub fn generate_report(
    results: Vec<PackageResult>,
    org_name: &str,
    email_domain: &str,
    time_window_years: u32,
) -> AnalysisReport {
    let mut tiers: BTreeMap<EngagementTier, Vec<PackageResult>> =
        EngagementTier::ALL.iter().map(|t| (*t, Vec::new())).collect();
    for result in &results {
        tiers
            .entry(result.engagement_tier())
            .or_default()
            .push(result.clone());
    }

    let mut contributors = aggregate_contributors(&results);
    let unique_contributors = contributors.len();
    // Stable sort: ties stay in first-seen order
    contributors.sort_by(|a, b| b.packages_count.cmp(&a.packages_count));
    contributors.truncate(TOP_CONTRIBUTORS_KEPT);

    let tier_len = |tier: EngagementTier| tiers.get(&tier).map_or(0, Vec::len);
    let totals: ContributionStats = results.iter().map(|r| r.total_contributions).sum();

    let summary = ReportSummary {
        organization: org_name.to_string(),
        email_domain: email_domain.to_string(),
        time_window_years,
        analysis_date: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        total_critical_packages: results.len(),
        packages_with_contributions: results.iter().filter(|r| r.has_contributions()).count(),
        packages_with_active_sponsorship: results
            .iter()
            .filter(|r| r.has_active_sponsorship())
            .count(),
        packages_with_past_sponsorship: results
            .iter()
            .filter(|r| r.sponsorship.is_past() && !r.has_active_sponsorship())
            .count(),
        packages_with_no_engagement: tier_len(EngagementTier::NoEngagement),
        total_commits: totals.commits,
        total_prs_opened: totals.pull_requests_opened,
        total_issues_opened: totals.issues_opened,
        unique_contributors,
        engagement_breakdown: EngagementBreakdown {
            full_engagement: tier_len(EngagementTier::FullEngagement),
            code_only: tier_len(EngagementTier::CodeOnly),
            money_only: tier_len(EngagementTier::MoneyOnly),
            no_engagement: tier_len(EngagementTier::NoEngagement),
        },
    };

    AnalysisReport {
        summary,
        engagement_tiers: tiers,
        top_contributors: contributors,
        detailed_results: results,
    }
}

/// Human-readable summary text.
pub fn render_summary<W: Write>(report: &AnalysisReport, out: &mut W) -> std::io::Result<()> {
    let s = &report.summary;
    let time_label = if s.time_window_years == 1 {
        "past year"
    } else {
        "all time"
    };

    writeln!(out)?;
    writeln!(out, "OSS Engagement: {}", s.organization)?;
    writeln!(out, "Email domain: {}", s.email_domain)?;
    writeln!(out, "Time window: {}", time_label)?;
    writeln!(out)?;
    writeln!(out, "Packages analyzed: {}", s.total_critical_packages)?;
    writeln!(out, "  With contributions: {}", s.packages_with_contributions)?;
    writeln!(out, "  With sponsorship: {}", s.packages_with_active_sponsorship)?;
    writeln!(out, "  No engagement: {}", s.packages_with_no_engagement)?;
    writeln!(out)?;
    writeln!(
        out,
        "Contributions: {} commits, {} PRs, {} issues",
        s.total_commits, s.total_prs_opened, s.total_issues_opened
    )?;
    writeln!(out, "Contributors: {}", s.unique_contributors)?;
    writeln!(out)?;

    if !report.top_contributors.is_empty() {
        writeln!(out, "Top contributors:")?;
        for contributor in report.top_contributors.iter().take(TOP_CONTRIBUTORS_PRINTED) {
            writeln!(out, "  {}", contributor.email)?;
            writeln!(
                out,
                "    {} packages, {} commits, {} PRs",
                contributor.packages_count,
                contributor.contributions.commits,
                contributor.contributions.pull_requests_opened
            )?;
        }
        writeln!(out)?;
    }

    writeln!(out, "Packages with contributions:")?;
    let with_contributions: Vec<&PackageResult> = report
        .detailed_results
        .iter()
        .filter(|r| r.has_contributions())
        .collect();

    if with_contributions.is_empty() {
        writeln!(out, "  (none)")?;
    } else {
        for result in with_contributions.iter().take(PACKAGES_PRINTED) {
            let (top_key, details) = match result.top_contributor() {
                Some((key, stats)) => {
                    let mut details = Vec::new();
                    if stats.commits > 0 {
                        details.push(format!("{} commits", stats.commits));
                    }
                    if stats.pull_requests_opened > 0 {
                        details.push(format!("{} PRs", stats.pull_requests_opened));
                    }
                    (key, details.join(", "))
                }
                None => ("", String::new()),
            };
            writeln!(
                out,
                "  {}: {} ({})",
                result.package.full_name(),
                top_key,
                details
            )?;
        }
        if with_contributions.len() > PACKAGES_PRINTED {
            writeln!(
                out,
                "  ... and {} more",
                with_contributions.len() - PACKAGES_PRINTED
            )?;
        }
    }
    writeln!(out)?;

    Ok(())
}

pub fn print_summary(report: &AnalysisReport) -> Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    render_summary(report, &mut handle)?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    owner: &'a str,
    repo: &'a str,
    ecosystem: &'a str,
    name: &'a str,
    dependents_count: u64,
    engagement_tier: &'static str,
    sponsorship_status: &'static str,
    sponsorship_entity: &'a str,
    contributors: usize,
    commits: u64,
    prs_opened: u64,
    issues_opened: u64,
    total_activity: u64,
}

/// One CSV row per package.
pub fn to_csv(results: &[PackageResult]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    for result in results {
        let totals = &result.total_contributions;
        writer.serialize(CsvRow {
            owner: &result.package.owner,
            repo: &result.package.repo,
            ecosystem: &result.package.ecosystem,
            name: &result.package.name,
            dependents_count: result.package.dependents_count,
            engagement_tier: result.engagement_tier().as_str(),
            sponsorship_status: result.sponsorship.status.as_str(),
            sponsorship_entity: result.sponsorship.entity.as_deref().unwrap_or(""),
            contributors: result.unique_contributor_count,
            commits: totals.commits,
            prs_opened: totals.pull_requests_opened,
            issues_opened: totals.issues_opened,
            total_activity: totals.total_activity(),
        })?;
    }

    writer.into_inner().map_err(|e| AnalyzerError::Processing {
        message: format!("failed to flush CSV output: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Package, SponsorshipKind, SponsorshipStatus};

    fn package(owner: &str, repo: &str) -> Package {
        Package {
            name: repo.to_string(),
            ecosystem: "npmjs.org".to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            dependents_count: 100,
            repository_url: format!("https://github.com/{}/{}", owner, repo),
        }
    }

    fn commits(n: u64) -> ContributionStats {
        ContributionStats {
            commits: n,
            ..Default::default()
        }
    }

    fn result(
        repo: &str,
        contributors: &[(&str, u64)],
        sponsorship: SponsorshipStatus,
    ) -> PackageResult {
        let contributors = contributors
            .iter()
            .map(|(k, n)| (k.to_string(), commits(*n)))
            .collect();
        PackageResult::new(package("owner", repo), contributors, sponsorship)
    }

    fn sample() -> Vec<PackageResult> {
        vec![
            result(
                "full",
                &[("alice@acme.com", 5), ("bob@acme.com", 1)],
                SponsorshipStatus::new(SponsorshipKind::ActiveDirect, "owner"),
            ),
            result("code", &[("alice@acme.com", 3)], SponsorshipStatus::not_sponsored()),
            result(
                "money",
                &[],
                SponsorshipStatus::new(SponsorshipKind::ActiveViaMaintainer, "maint"),
            ),
            result(
                "past",
                &[],
                SponsorshipStatus::new(SponsorshipKind::PastConfirmed, "owner"),
            ),
        ]
    }

    #[test]
    fn test_generate_report_summary() {
        let report = generate_report(sample(), "acme", "acme.com", 1);
        let s = &report.summary;

        assert_eq!(s.total_critical_packages, 4);
        assert_eq!(s.packages_with_contributions, 2);
        assert_eq!(s.packages_with_active_sponsorship, 2);
        assert_eq!(s.packages_with_past_sponsorship, 1);
        assert_eq!(s.packages_with_no_engagement, 1);
        assert_eq!(s.total_commits, 9);
        assert_eq!(s.unique_contributors, 2);
        assert_eq!(
            s.engagement_breakdown,
            EngagementBreakdown {
                full_engagement: 1,
                code_only: 1,
                money_only: 1,
                no_engagement: 1,
            }
        );
        assert!(s.analysis_date.ends_with('Z'));
    }

    #[test]
    fn test_all_tiers_present_when_empty() {
        let report = generate_report(Vec::new(), "acme", "acme.com", 2);
        assert_eq!(report.engagement_tiers.len(), 4);
        assert!(report.engagement_tiers.values().all(Vec::is_empty));

        let json: serde_json::Value =
            serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap();
        for key in ["FULL_ENGAGEMENT", "CODE_ONLY", "MONEY_ONLY", "NO_ENGAGEMENT"] {
            assert!(json["engagement_tiers"][key].is_array(), "missing {key}");
        }
    }

    #[test]
    fn test_top_contributors_sorted_by_package_count() {
        let report = generate_report(sample(), "acme", "acme.com", 1);
        let top = &report.top_contributors;

        assert_eq!(top.len(), 2);
        assert_eq!(top[0].email, "alice@acme.com");
        assert_eq!(top[0].packages_count, 2);
        assert_eq!(top[0].packages, vec!["full", "code"]);
        assert_eq!(top[0].contributions.commits, 8);
        assert_eq!(top[1].email, "bob@acme.com");
    }

    #[test]
    fn test_top_contributors_capped_at_twenty() {
        let results = (0..25)
            .map(|i| {
                let email = format!("dev{i:02}@acme.com");
                result(&format!("repo{i}"), &[(email.as_str(), 1)], SponsorshipStatus::not_sponsored())
            })
            .collect();
        let report = generate_report(results, "acme", "acme.com", 1);

        assert_eq!(report.summary.unique_contributors, 25);
        assert_eq!(report.top_contributors.len(), 20);
        assert_eq!(report.top_contributors[0].email, "dev00@acme.com");
    }

    fn rendered(report: &AnalysisReport) -> String {
        let mut out = Vec::new();
        render_summary(report, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_render_summary() {
        let report = generate_report(sample(), "acme", "acme.com", 1);
        let text = rendered(&report);

        assert!(text.contains("OSS Engagement: acme"));
        assert!(text.contains("Time window: past year"));
        assert!(text.contains("Contributions: 9 commits, 0 PRs, 0 issues"));
        assert!(text.contains("  owner/full: alice@acme.com (5 commits)"));
        assert!(!text.contains("owner/money"));
    }

    #[test]
    fn test_render_summary_truncates_package_list() {
        let results = (0..23)
            .map(|i| result(&format!("repo{i}"), &[("a@acme.com", 1)], SponsorshipStatus::not_sponsored()))
            .collect();
        let report = generate_report(results, "acme", "acme.com", 3);
        let text = rendered(&report);

        assert!(text.contains("Time window: all time"));
        assert!(text.contains("  ... and 3 more"));
    }

    #[test]
    fn test_render_summary_without_contributions() {
        let report = generate_report(Vec::new(), "acme", "acme.com", 1);
        assert!(rendered(&report).contains("  (none)"));
    }

    #[test]
    fn test_to_csv() {
        let csv = String::from_utf8(to_csv(&sample()).unwrap()).unwrap();
        let mut lines = csv.lines();

        assert_eq!(
            lines.next().unwrap(),
            "owner,repo,ecosystem,name,dependents_count,engagement_tier,sponsorship_status,sponsorship_entity,contributors,commits,prs_opened,issues_opened,total_activity"
        );
        assert_eq!(
            lines.next().unwrap(),
            "owner,full,npmjs.org,full,100,FULL_ENGAGEMENT,ACTIVE_DIRECT,owner,2,6,0,0,6"
        );
        assert_eq!(csv.lines().count(), 5);
    }
}
