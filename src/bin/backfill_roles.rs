//! Point every user at a role row.
//!
//! ```text
//! backfill-roles            # assign `user` to users without a role, then report
//! backfill-roles --verify   # report only; exits non-zero while users lack a role
//! ```

use anyhow::{bail, Result};
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quillboard::{
    config::Config,
    db::{
        self,
        repositories::{SqlxPasswordResetRepository, SqlxSessionRepository, SqlxUserRepository},
    },
    services::{MaintenanceService, RoleReport},
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quillboard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut verify_only = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--verify" => verify_only = true,
            other => bail!("Unknown argument: {} (usage: backfill-roles [--verify])", other),
        }
    }

    let config = Config::load_with_env(Path::new("config.yml"))?;
    let pool = db::create_pool(&config.database).await?;
    db::migrations::run_migrations(&pool).await?;

    let maintenance = MaintenanceService::new(
        SqlxUserRepository::boxed(pool.clone()),
        SqlxSessionRepository::boxed(pool.clone()),
        SqlxPasswordResetRepository::boxed(pool.clone()),
    );

    if !verify_only {
        maintenance.backfill_role_ids().await?;
    }

    let report = maintenance.verify_role_ids().await?;
    print_report(&report)?;
    pool.close().await;

    if !report.is_complete() {
        bail!("{} user(s) still have no role", report.without_role);
    }
    Ok(())
}

fn print_report(report: &RoleReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
