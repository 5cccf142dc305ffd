#![deny(warnings)]

//! Headless CLI: load a build, recompute its economy, print balances and inventory.

use anyhow::{bail, Context, Result};
use build_core::{validate_build, validate_pricing, BuildState, Currency, PricingConfig};
use build_econ::EconomyReport;
use build_runtime::Session;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    build: Option<PathBuf>,
    load: Option<PathBuf>,
    pricing: Option<PathBuf>,
    gate: Option<bool>,
    save: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--build" => args.build = it.next().map(PathBuf::from),
            "--load" => args.load = it.next().map(PathBuf::from),
            "--pricing" => args.pricing = it.next().map(PathBuf::from),
            "--save" => args.save = it.next().map(PathBuf::from),
            "--gate" => {
                args.gate = match it.next().as_deref() {
                    Some("open") => Some(true),
                    Some("closed") => Some(false),
                    other => bail!("--gate expects open|closed, got {other:?}"),
                }
            }
            other => warn!(arg = other, "ignoring unknown argument"),
        }
    }
    Ok(args)
}

fn load_pricing(path: Option<&Path>) -> Result<PricingConfig> {
    let pricing = match path {
        Some(p) => {
            let text = fs::read_to_string(p)
                .with_context(|| format!("reading pricing {}", p.display()))?;
            serde_yaml::from_str(&text).with_context(|| format!("parsing pricing {}", p.display()))?
        }
        None => PricingConfig::default(),
    };
    validate_pricing(&pricing)?;
    Ok(pricing)
}

fn open_session(args: &Args, pricing: PricingConfig) -> Result<Session> {
    if let Some(path) = &args.load {
        let doc = persistence::load_document(path)
            .with_context(|| format!("loading save {}", path.display()))?;
        let (session, pruned) = persistence::restore_session(&doc, pricing)?;
        for key in pruned {
            info!(node = %key, "override dropped on restore");
        }
        return Ok(session);
    }
    let state: BuildState = match &args.build {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading build {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing build {}", path.display()))?
        }
        None => BuildState::default(),
    };
    Ok(Session::new(state, pricing))
}

fn print_report(report: &EconomyReport) {
    for currency in Currency::ALL {
        if currency == Currency::Tertiary && !report.tertiary_unlocked && !report.debug {
            continue;
        }
        let c = report.currencies[currency];
        println!(
            "{:>2} | balance: {:>5} | baseline: {:>4} | gained: {:>4} | spent: {:>4}",
            currency, c.balance, c.baseline, c.gained, c.spent
        );
    }
    for (tier, inv) in report.inventory.iter() {
        println!(
            "T{} {:<8} | acquired: {:>4} | used: {:>4} | available: {:>4}",
            tier.rank(),
            tier,
            inv.acquired,
            inv.used,
            inv.available
        );
    }
    for line in &report.lines {
        println!(
            "  {:<32} {:>2} +{:<4} -{}",
            line.source, line.currency, line.gained, line.spent
        );
    }
    if report.debug {
        println!("debug override active: balances are fixed");
    }
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = parse_args()?;
    info!(?args, "starting CLI");

    let pricing = load_pricing(args.pricing.as_deref())?;
    let mut session = open_session(&args, pricing)?;
    validate_build(session.state(), session.pricing())?;

    let mut outcome = session.recompute();
    if let Some(open) = args.gate {
        outcome = session.update(|state| state.gate_open = open);
    }
    for notice in &outcome.notices {
        println!("notice: {notice}");
    }
    print_report(&outcome.report);

    if let Some(path) = &args.save {
        persistence::save_to_path(path, session.state())?;
        println!("saved to {}", path.display());
    }
    Ok(())
}
