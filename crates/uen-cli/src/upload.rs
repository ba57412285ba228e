//! Commands that talk to the registry contract.

use crate::config::{self, ChainArgs, ChainConfig, FileConfig, DEFAULT_LIMIT, SIGNER_KEY_ENV};
use crate::data;
use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use colored::Colorize;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uen_ledger::abi::AbiDescriptor;
use uen_ledger::{CancelFlag, JsonRpcClient, LocalSigner, MemoryLedger, RecordLedger, UenRegistry};
use uen_reconcile::{Outcome, ReconcileEvent, ReconcileReport, Reconciler, RetryPolicy};
use uen_records::LocalRecordSet;

#[derive(Args, Debug)]
pub struct UploadArgs {
    #[command(flatten)]
    pub chain: ChainArgs,

    #[arg(long)]
    pub data_root: Option<PathBuf>,

    /// Use the full dump instead of the sample set.
    #[arg(long)]
    pub full: bool,

    /// Initial batch size [default: 200]
    #[arg(long)]
    pub limit: Option<usize>,

    /// Only report how far the registry is behind; submit nothing.
    #[arg(long, conflicts_with = "dry_run")]
    pub manual: bool,

    /// Reconcile against an in-memory copy of the registry; nothing is signed or sent.
    #[arg(long)]
    pub dry_run: bool,

    /// Write the final report as JSON.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Identifiers to print with names once synced.
    #[arg(long, default_value_t = 10)]
    pub names: usize,

    /// Ask the node for a gas estimate instead of the fixed gas limit.
    #[arg(long)]
    pub estimate_gas: bool,

    /// Single-identifier failures before that identifier is skipped (0 = never) [default: 3]
    #[arg(long)]
    pub quarantine_after: Option<usize>,

    /// Consecutive failed batches before giving up [default: 32]
    #[arg(long)]
    pub max_failures: Option<usize>,

    /// Give up once failures continue past this many seconds of run time.
    #[arg(long)]
    pub max_duration_secs: Option<u64>,
}

impl UploadArgs {
    fn policy(&self, file: &FileConfig) -> RetryPolicy {
        let mut policy = config::retry_policy(file);
        if let Some(n) = self.quarantine_after {
            policy.quarantine_after = n;
        }
        if let Some(n) = self.max_failures {
            policy.max_consecutive_failures = n;
        }
        if let Some(secs) = self.max_duration_secs {
            policy.max_duration = Some(Duration::from_secs(secs));
        }
        policy
    }
}

fn connect(chain: &ChainConfig) -> Result<UenRegistry> {
    let abi = AbiDescriptor::load(&chain.abi_path)?;
    let rpc = JsonRpcClient::new(&chain.rpc_url, chain.rpc_timeout)?;
    let registry = UenRegistry::connect(rpc, chain.contract, &abi)
        .with_context(|| format!("failed to connect to {}", chain.rpc_url))?
        .with_gas(chain.gas)
        .with_receipt_wait(chain.receipt_wait);
    println!(
        "{} to chain {} at {}",
        "Connected".green().bold(),
        registry.chain_id().to_string().cyan(),
        chain.rpc_url
    );
    Ok(registry)
}

pub fn cmd_network(file: &FileConfig, args: &ChainArgs) -> Result<()> {
    let chain = ChainConfig::resolve(args, file)?;
    let rpc = JsonRpcClient::new(&chain.rpc_url, chain.rpc_timeout)?;
    let chain_id = rpc
        .chain_id()
        .with_context(|| format!("{} is not reachable", chain.rpc_url))?;
    println!("{} {}", "Network".green().bold(), chain.rpc_url);
    println!("  Chain id: {}", chain_id.to_string().cyan());
    println!("  Registry: {}", chain.contract);
    Ok(())
}

pub fn cmd_remote_list(file: &FileConfig, args: &ChainArgs, names: usize) -> Result<()> {
    let chain = ChainConfig::resolve(args, file)?;
    let registry = connect(&chain)?;
    let ids = registry.list_all_identifiers()?;
    println!("Current data count on blockchain: {}", ids.len().to_string().cyan());
    print_names(&registry, &ids, names)
}

fn print_names<L: RecordLedger>(ledger: &L, ids: &[String], limit: usize) -> Result<()> {
    if limit == 0 || ids.is_empty() {
        return Ok(());
    }
    println!("\nUENs on contract:");
    for id in ids.iter().take(limit) {
        let name = ledger.get_display_name(id)?;
        println!("{id}: {name}");
    }
    Ok(())
}

/// First Ctrl-C raises `cancel`; a second one while the first is still
/// being handled exits immediately.
fn install_interrupt_handler(cancel: &CancelFlag) -> Result<()> {
    use signal_hook::consts::SIGINT;

    let flag = cancel.shared();
    signal_hook::flag::register_conditional_shutdown(SIGINT, 130, Arc::clone(&flag))
        .context("failed to install SIGINT handler")?;
    signal_hook::flag::register(SIGINT, flag).context("failed to install SIGINT handler")?;
    Ok(())
}

fn print_event(event: &ReconcileEvent) {
    match event {
        ReconcileEvent::RemoteLoaded {
            remote_total,
            local_total,
            pending,
        } => {
            if *pending > 0 {
                println!(
                    "Data is different, updating now. {} of {} local records missing ({} on chain).",
                    pending, local_total, remote_total
                );
            }
        }
        ReconcileEvent::BatchCommitted {
            size,
            tx_hash,
            remote_total,
            local_total,
            next_limit,
        } => {
            println!("Transaction sent: {}", tx_hash.to_string().dimmed());
            println!(
                "{} entries added. Current data count on blockchain: {}, total data count on local: {} (next batch {})",
                size.to_string().green(),
                remote_total,
                local_total,
                next_limit
            );
        }
        ReconcileEvent::BatchFailed {
            size,
            error,
            next_limit,
        } => {
            println!(
                "{} uploading {} entries: {}\nReducing the limit to {} and trying again.",
                "Error".red().bold(),
                size,
                error,
                next_limit
            );
        }
        ReconcileEvent::Quarantined {
            identifier,
            failures,
        } => {
            println!(
                "{} {} after {} failed single-record attempts",
                "Skipping".yellow().bold(),
                identifier,
                failures
            );
        }
        ReconcileEvent::RemoteReadFailed { attempt, error } => {
            println!(
                "{} reading registry (attempt {}): {}",
                "Retrying".yellow(),
                attempt,
                error
            );
        }
        ReconcileEvent::Synced { remote_total, .. } => {
            println!(
                "Data is the same. Total data on blockchain: {}",
                remote_total.to_string().cyan()
            );
        }
        ReconcileEvent::Cancelled => {
            println!(
                "{}",
                "Keyboard interrupt detected, stopping the upload process.".yellow()
            );
        }
    }
}

fn reconcile<L: RecordLedger>(
    ledger: L,
    local: &LocalRecordSet,
    limit: usize,
    policy: RetryPolicy,
    cancel: CancelFlag,
    names: usize,
) -> Result<ReconcileReport> {
    let mut reconciler = Reconciler::new(ledger, policy, cancel);
    reconciler.on_event(Box::new(print_event));
    let report = reconciler.run(local, limit)?;
    if report.outcome == Outcome::Synced {
        let ids = reconciler.ledger().list_all_identifiers()?;
        print_names(reconciler.ledger(), &ids, names)?;
    }
    Ok(report)
}

pub fn cmd_upload(file: &FileConfig, args: &UploadArgs) -> Result<()> {
    let mut chain = ChainConfig::resolve(&args.chain, file)?;
    if args.estimate_gas {
        chain.gas.gas_limit = None;
    }
    let registry = connect(&chain)?;

    let root = config::data_root(args.data_root.as_deref(), file);
    let local = data::load_local(&root, config::use_sample(args.full, file))?.records;
    let limit = args.limit.or(file.limit).unwrap_or(DEFAULT_LIMIT);

    if args.manual {
        let remote = registry.list_all_identifiers()?;
        let on_chain: HashSet<&str> = remote.iter().map(String::as_str).collect();
        let pending = local.identifiers().filter(|id| !on_chain.contains(id)).count();
        println!(
            "Current data count on blockchain: {}, total data count on local: {}, missing: {}",
            remote.len(),
            local.len(),
            pending.to_string().yellow()
        );
        return Ok(());
    }

    let cancel = CancelFlag::new();
    install_interrupt_handler(&cancel)?;
    let policy = args.policy(file);

    let report = if args.dry_run {
        let snapshot = registry.list_all_identifiers()?;
        println!(
            "{} reconciling against a copy of {} on-chain records; nothing is signed or sent.",
            "Dry run:".yellow().bold(),
            snapshot.len()
        );
        let ledger =
            MemoryLedger::new().with_records(snapshot.into_iter().map(|id| (id, String::new())));
        reconcile(&ledger, &local, limit, policy, cancel, 0)?
    } else {
        let key = config::signer_key_from_env().ok_or_else(|| {
            anyhow!("{SIGNER_KEY_ENV} is not set; export the hex private key of the uploading account")
        })?;
        let signer = LocalSigner::from_hex(&key).context("invalid signing key")?;
        println!("Uploading as {}", signer.address().to_string().cyan());
        reconcile(
            registry.with_signer(signer),
            &local,
            limit,
            policy,
            cancel,
            args.names,
        )?
    };

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    }

    println!(
        "\n{} {:?}: {} batches, {} records, {} failed attempts in {:.1?}",
        "Upload".green().bold(),
        report.outcome,
        report.batches_committed,
        report.records_committed,
        report.failed_attempts,
        report.elapsed
    );
    check_quarantine(&report)
}

/// An interrupted run is a clean stop whatever it skipped on the way; a
/// finished one fails when identifiers were left behind.
fn check_quarantine(report: &ReconcileReport) -> Result<()> {
    if report.outcome == Outcome::Synced && !report.quarantined.is_empty() {
        bail!(
            "{} identifiers could not be uploaded: {}",
            report.quarantined.len(),
            report.quarantined.join(", ")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcome: Outcome, quarantined: &[&str]) -> ReconcileReport {
        ReconcileReport {
            outcome,
            batches_committed: 1,
            records_committed: 1,
            failed_attempts: 3,
            final_limit: 1,
            local_total: 2,
            remote_total: 1,
            quarantined: quarantined.iter().map(|s| s.to_string()).collect(),
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn finished_run_with_skipped_identifiers_fails() {
        let err = check_quarantine(&report(Outcome::Synced, &["BAD"])).unwrap_err();
        assert!(err.to_string().contains("BAD"));
        assert!(check_quarantine(&report(Outcome::Synced, &[])).is_ok());
    }

    #[test]
    fn interrupted_run_exits_cleanly_after_quarantine() {
        assert!(check_quarantine(&report(Outcome::Cancelled, &["BAD"])).is_ok());
    }
}
