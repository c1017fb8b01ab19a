//! Elo Ledger
//!
//! Operator binary. Given a JSON store snapshot it rebuilds every standing
//! from the validated history and prints the leaderboards. Without one it
//! plays a small demo league and checks that resynchronization is
//! deterministic.
//!
//! ```text
//! elo-ledger [SNAPSHOT.json [OUTPUT.json]]
//! ```
//!
//! The snapshot path may also come from `LEDGER_SNAPSHOT`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use elo_ledger::{
    ledger::{Outcome, Summary},
    store::StoreSnapshot,
    Actor, LedgerConfig, MatchLedger, MatchMode, MemoryStore, Participants, VERSION,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let default_level = if cfg!(feature = "debug-tracing") { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let config = LedgerConfig::from_env();
    info!("Elo Ledger v{}", VERSION);
    info!(
        "Initial rating: {}, replay experience: {:?}, resync tolerance: {}",
        config.elo.initial_rating, config.replay_experience, config.resync_tolerance
    );

    let mut args = std::env::args().skip(1);
    let snapshot = args
        .next()
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("LEDGER_SNAPSHOT").map(PathBuf::from));
    let output = args.next().map(PathBuf::from);

    match snapshot {
        Some(path) => resync_snapshot(&path, output.as_deref(), config).await,
        None => demo_league(config).await,
    }
}

/// Load a snapshot, resynchronize it and optionally write it back out.
async fn resync_snapshot(
    path: &Path,
    output: Option<&Path>,
    config: LedgerConfig,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading snapshot {}", path.display()))?;
    let snapshot: StoreSnapshot = serde_json::from_str(&raw)
        .with_context(|| format!("parsing snapshot {}", path.display()))?;
    info!(
        "Loaded {} players and {} matches from {}",
        snapshot.players.len(),
        snapshot.matches.len(),
        path.display()
    );

    let ledger = MatchLedger::new(MemoryStore::from_snapshot(snapshot)?, config);
    let report = ledger.resync(&Actor::system()).await?;
    info!("{}", report.summary());
    info!("Standings digest: {}", report.digest);

    log_leaderboards(&ledger).await?;

    if let Some(out) = output {
        let json = serde_json::to_string_pretty(&ledger.store().snapshot().await)?;
        std::fs::write(out, json).with_context(|| format!("writing {}", out.display()))?;
        info!("Wrote resynchronized snapshot to {}", out.display());
    }
    Ok(())
}

/// Demo: a short league covering every lifecycle path.
async fn demo_league(config: LedgerConfig) -> anyhow::Result<()> {
    info!("=== Starting Demo League ===");

    let ledger = MatchLedger::new(MemoryStore::new(), config);
    let admin = Actor::system();

    let mut players = Vec::new();
    for name in ["ana", "bob", "cal", "dan", "eve"] {
        let record = ledger.register_player(name).await?;
        players.push(Actor::player(record.id));
    }
    let [ana, bob, cal, dan, eve] = [players[0], players[1], players[2], players[3], players[4]];

    // Confirmed 1v1
    let m = ledger.declare_match(&ana, Participants::one_v_one(ana.id, bob.id)).await?;
    report(ledger.confirm_loss(&bob, m.id).await);
    // Retried confirmation changes nothing
    report(ledger.confirm_loss(&bob, m.id).await);

    // Rejected and closed
    let m = ledger.declare_match(&cal, Participants::one_v_one(cal.id, ana.id)).await?;
    report(ledger.reject(&ana, m.id).await);
    report(ledger.accept_rejection(&cal, m.id).await);

    // Rejected, disputed, force validated
    let m = ledger.declare_match(&dan, Participants::one_v_one(dan.id, eve.id)).await?;
    report(ledger.reject(&eve, m.id).await);
    report(ledger.dispute(&dan, m.id).await);
    report(ledger.force_validate(&admin, m.id).await);

    // Rejected, disputed, rejection upheld
    let m = ledger.declare_match(&eve, Participants::one_v_one(eve.id, cal.id)).await?;
    report(ledger.reject(&cal, m.id).await);
    report(ledger.dispute(&eve, m.id).await);
    report(ledger.confirm_rejection(&admin, m.id).await);

    // Team matches
    let m = ledger
        .declare_match(&ana, Participants::two_v_two([ana.id, cal.id], [bob.id, dan.id]))
        .await?;
    report(ledger.confirm_loss(&dan, m.id).await);
    let m = ledger
        .declare_match(&bob, Participants::two_v_two([bob.id, eve.id], [ana.id, dan.id]))
        .await?;
    report(ledger.confirm_loss(&ana, m.id).await);

    // Validated, then revoked
    let m = ledger.declare_match(&bob, Participants::one_v_one(bob.id, cal.id)).await?;
    report(ledger.force_validate(&admin, m.id).await);
    report(ledger.revoke(&admin, m.id).await);

    // Not allowed
    report(ledger.revoke(&admin, m.id).await);
    report(ledger.confirm_loss(&ana, m.id).await);

    let pending = ledger.pending_confirmations(bob.id).await?;
    info!("Pending confirmations for bob: {}", pending.len());
    let queue = ledger.admin_queue(&admin, &[]).await?;
    info!("Administrator queue: {} matches", queue.len());

    log_leaderboards(&ledger).await?;

    // Verify determinism by resynchronizing twice
    info!("=== Verifying Determinism ===");
    let first = ledger.resync(&admin).await?;
    info!("{}", first.summary());
    info!("First Resync Digest: {}", first.digest);
    let second = ledger.resync(&admin).await?;
    info!("Second Resync Digest: {}", second.digest);

    if first.digest != second.digest {
        bail!("DETERMINISM FAILURE: digests differ");
    }
    info!("DETERMINISM VERIFIED: Digests match!");
    Ok(())
}

fn report<T: Summary>(result: Result<T, elo_ledger::LedgerError>) {
    let outcome = Outcome::from(result);
    if outcome.success {
        info!("ok: {}", outcome.message);
    } else {
        info!("refused: {}", outcome.message);
    }
}

async fn log_leaderboards(ledger: &MatchLedger<MemoryStore>) -> anyhow::Result<()> {
    for mode in [MatchMode::OneVOne, MatchMode::TwoVTwo] {
        info!("=== {} Leaderboard ===", mode);
        for entry in ledger.leaderboard(mode).await? {
            info!(
                "#{}: {} - {} ({} matches)",
                entry.rank, entry.username, entry.rating, entry.matches
            );
        }
    }
    Ok(())
}
