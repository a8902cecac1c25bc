//! Wires the rule engine, ledger and analytics around one database and policy.

use anyhow::Context;
use db::DBService;
use tracing::info;

use super::{
    progress_ledger::ProgressLedger,
    xp_analytics::XpAnalyticsService,
    xp_policy::{PolicyError, XpPolicy},
    xp_rules::XpRuleEngine,
};

#[derive(Clone)]
pub struct XpCore {
    pub engine: XpRuleEngine,
    pub ledger: ProgressLedger,
    pub analytics: XpAnalyticsService,
}

impl XpCore {
    pub fn new(db: DBService, policy: XpPolicy) -> Result<Self, PolicyError> {
        let engine = XpRuleEngine::new(policy)?;
        let analytics = XpAnalyticsService::new(db.clone(), engine.calendar());
        let ledger = ProgressLedger::new(db, engine.clone());
        Ok(Self {
            engine,
            ledger,
            analytics,
        })
    }

    /// Install tracing (if the host has not), load the policy and open the database
    pub async fn bootstrap(database_url: &str) -> anyhow::Result<Self> {
        utils::logging::init_tracing();

        let policy = XpPolicy::load_or_default().context("failed to load XP policy")?;
        let db = DBService::new(database_url)
            .await
            .with_context(|| format!("failed to open XP database at {database_url}"))?;

        let core = Self::new(db, policy)?;
        info!(
            utc_offset = %core.engine.calendar().offset(),
            "XP core ready"
        );
        Ok(core)
    }
}
