pub mod attribution;
pub mod sponsorship;

pub use attribution::{email_matches_domain, ContributionAnalyzer};
pub use sponsorship::SponsorshipChecker;
