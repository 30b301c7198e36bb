//! Walks one household through the full relocation chain against a local sled
//! database. Settings come from flags or the RELOCATION_* environment variables.
use anyhow::Context;
use clap::Parser;
use residence_transfer::config::Config;
use residence_transfer::jurisdiction::{Actor, VillageId, WardId};
use residence_transfer::request::InitiationKind;
use residence_transfer::residence::{Residence, ResidenceId};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "relocation")]
#[command(about = "Residence relocation approval walkthrough")]
struct Args {
    /// Path of the sled database
    #[arg(long, env = "RELOCATION_DB_PATH", default_value = "relocation-demo.db")]
    db_path: String,

    /// Prefix stored in front of administrative cancellation reasons
    #[arg(long, env = "RELOCATION_CANCEL_MARKER")]
    cancel_marker: Option<String>,

    /// Flush the database after every commit
    #[arg(long, env = "RELOCATION_FLUSH", default_value = "false")]
    flush: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("residence_transfer={},info", args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::new(&args.db_path).set_flush_on_commit(args.flush);
    if let Some(marker) = &args.cancel_marker {
        config = config.set_cancellation_marker(marker);
    }
    let service = config.open()?;

    // units are write-once, so a rerun against the same database reuses them
    if service.store().ward(WardId(5))?.is_none() {
        service.register_ward(WardId(5), "Kilimani")?;
        service.register_ward(WardId(7), "Mjini")?;
        service.register_village(VillageId(50), WardId(5), "Mwembe")?;
        service.register_village(VillageId(42), WardId(7), "Bondeni")?;
    }

    let mut household = ResidenceId(1001);
    while service.store().residence(household)?.is_some() {
        household = ResidenceId(household.0 + 1);
    }
    let residence = service.register_residence(Residence::new(
        household,
        "Rehema Hassan",
        WardId(5),
        VillageId(50),
    ))?;

    let sending_veo = service.veo_for_village("user_veo50", VillageId(50))?;
    let receiving_veo = service.veo_for_village("user_veo42", VillageId(42))?;
    let weo = Actor::weo("user_weo7", WardId(7));

    let request = service
        .submit_transfer(
            residence.id,
            WardId(7),
            VillageId(42),
            InitiationKind::VeoInitiated,
            &sending_veo,
        )
        .context("submit failed")?;
    let request = service.approve(&weo, &request.id).context("WEO approval failed")?;
    let request = service.approve(&weo, &request.id).context("ward approval failed")?;
    let request = service
        .approve(&receiving_veo, &request.id)
        .context("VEO acceptance failed")?;

    request.view_history();

    let moved = service.residence(residence.id)?;
    println!("{} now registered in {} / {}", moved.household_head, moved.ward_id, moved.village_id);

    Ok(())
}
