//! sysreclaim CLI.

use std::collections::HashSet;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use sysreclaim::cleaner::{format_size, CleanupCategory, DiskCleaner};
use sysreclaim::core::{is_protected, AutoCleanMode, ProcessScorer, ReclaimConfig};
use sysreclaim::metrics::{Sampler, ThermalState};
use sysreclaim::monitor::RealtimeMonitor;
use sysreclaim::process::{terminate, ProtectionVerdict, TerminateOutcome};

#[derive(Parser)]
#[command(name = "sysreclaim")]
#[command(about = "Process-safety scoring and disk reclamation engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current system status
    Status,

    /// Analyze processes and cleanable disk space without changing anything
    Analyze,

    /// Run a cleanup pass (processes and caches)
    Cleanup {
        /// Preview only, delete and kill nothing
        #[arg(long)]
        dry_run: bool,

        /// Lower the score floors and include logs and Xcode caches
        #[arg(short, long)]
        aggressive: bool,

        /// Skip the process kill pass
        #[arg(long)]
        no_processes: bool,

        /// Skip the cache cleanup pass
        #[arg(long)]
        no_caches: bool,

        /// Restrict cache cleanup to these categories
        #[arg(long, value_name = "CATEGORY")]
        category: Vec<CleanupCategory>,

        /// Also clean targets marked unsafe (Downloads, Docker VM data)
        #[arg(long)]
        include_unsafe: bool,
    },

    /// Monitor continuously and trigger cleanup automatically
    Monitor {
        /// Seconds between metric samples
        #[arg(short, long, default_value = "2")]
        interval: u64,

        /// Trigger mode: off, conservative, balanced or aggressive
        #[arg(short, long, default_value = "balanced")]
        mode: AutoCleanMode,
    },

    /// Show the active configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG overrides the default level.
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let config = ReclaimConfig::load_or_default();

    match cli.command {
        Commands::Status => cmd_status(&config),
        Commands::Analyze => cmd_analyze(&config),
        Commands::Cleanup {
            dry_run,
            aggressive,
            no_processes,
            no_caches,
            category,
            include_unsafe,
        } => cmd_cleanup(
            &config,
            dry_run,
            aggressive,
            no_processes,
            no_caches,
            &category,
            include_unsafe,
        ),
        Commands::Monitor { interval, mode } => {
            info!(interval, %mode, "starting monitor");
            RealtimeMonitor::new(interval, mode, config).start().await;
        }
        Commands::Config => cmd_config(&config),
    }

    Ok(())
}

fn cmd_status(config: &ReclaimConfig) {
    let mut sampler = Sampler::new();
    sampler.refresh();
    // Second refresh so CPU usage has a delta to report.
    std::thread::sleep(Duration::from_millis(200));
    sampler.refresh();

    let reading = sampler.reading();
    let thermal = sampler.thermal();
    let disk = sampler.disk_usage();

    println!("System Status");
    println!();
    println!("CPU");
    println!("  Usage:      {:.1}%", reading.cpu_percent);
    println!();
    println!("Memory");
    println!(
        "  Used:       {} / {} ({:.1}%)",
        format_size(reading.used_memory),
        format_size(reading.total_memory),
        reading.memory_percent
    );
    println!("  Pressure:   {}", reading.pressure.as_str());
    if reading.swap_used > 0 {
        println!("  Swap used:  {}", format_size(reading.swap_used));
    }
    println!();
    println!("Thermal");
    match thermal.cpu_temp {
        Some(temp) => println!("  CPU temp:   {temp:.1}C"),
        None => println!("  CPU temp:   n/a"),
    }
    println!("  State:      {}", thermal.state.as_str());
    if thermal.state.at_least(ThermalState::Hot) {
        println!("  Throttling: {}", thermal.throttle.as_str());
    }
    println!();
    println!("Disk");
    println!(
        "  Used:       {} / {} ({:.1}%)",
        format_size(disk.used),
        format_size(disk.total),
        disk.percent_used()
    );
    println!("  Free:       {}", format_size(disk.free));

    let shielded = sampler.own_ancestry();
    let scorer = ProcessScorer::new(config, shielded);
    let samples = sampler.processes();
    let hogs = scorer.top_hogs(&samples, 5);
    if !hogs.is_empty() {
        println!();
        println!("Top processes");
        for record in hogs {
            let marker = if record.protected { "*" } else { " " };
            println!(
                "  {marker} {:<20} CPU:{:5.1}% MEM:{:5.1}%",
                truncate(&record.name, 20),
                record.cpu_percent,
                record.memory_percent
            );
        }
        println!("  (* = protected)");
    }
}

fn cmd_analyze(config: &ReclaimConfig) {
    let mut sampler = Sampler::new();
    sampler.refresh();
    std::thread::sleep(Duration::from_millis(200));
    sampler.refresh();

    let shielded = sampler.own_ancestry();
    let scorer = ProcessScorer::new(config, shielded);
    let samples = sampler.processes();
    let records: Vec<_> = samples.iter().map(|s| scorer.record(s)).collect();

    let protected = records.iter().filter(|r| r.protected).count();
    let killable = records.len() - protected;

    println!("Process Analysis");
    println!("  Total processes:     {}", records.len());
    println!("  Protected processes: {protected}");
    println!("  Killable processes:  {killable}");

    let mut by_category: std::collections::BTreeMap<&str, usize> =
        std::collections::BTreeMap::new();
    for record in &records {
        *by_category.entry(record.category.as_str()).or_insert(0) += 1;
    }
    println!();
    println!("  By category:");
    for (category, count) in by_category {
        println!("    {category:<20}: {count}");
    }

    let reading = sampler.reading();
    println!();
    println!("Memory");
    println!("  Pressure:  {}", reading.pressure.as_str());
    println!("  Used:      {:.1}%", reading.memory_percent);

    let cleaner = DiskCleaner::new(sampler.home());
    let sizes = cleaner.analyze(None);
    let total: u64 = sizes.values().sum();
    println!();
    println!("Cleanable space by category:");
    for (category, size) in &sizes {
        if *size > 0 {
            println!("    {:<20}: {}", category.as_str(), format_size(*size));
        }
    }
    println!();
    println!("  Total cleanable: {}", format_size(total));
}

fn cmd_cleanup(
    config: &ReclaimConfig,
    dry_run: bool,
    aggressive: bool,
    no_processes: bool,
    no_caches: bool,
    categories: &[CleanupCategory],
    include_unsafe: bool,
) {
    if dry_run {
        println!("DRY RUN - nothing will be killed or deleted");
        println!();
    }

    let mut killed = 0usize;
    let mut bytes_freed = 0u64;
    let mut files_deleted = 0u64;

    if !no_processes {
        let (min_score, min_cpu) = if aggressive { (25.0, 15.0) } else { (40.0, 25.0) };
        killed = manual_kill_pass(config, min_score, min_cpu, dry_run);
    }

    if !no_caches {
        let selected: Vec<CleanupCategory> = if categories.is_empty() {
            let mut defaults = vec![
                CleanupCategory::UserCache,
                CleanupCategory::BrowserCache,
                CleanupCategory::DevCache,
                CleanupCategory::TempFiles,
            ];
            if aggressive {
                defaults.push(CleanupCategory::Logs);
                defaults.push(CleanupCategory::Xcode);
            }
            defaults
        } else {
            categories.to_vec()
        };

        let home = dirs::home_dir().unwrap_or_else(|| "/".into());
        let mut cleaner = DiskCleaner::new(&home);
        let outcomes = cleaner.clean(Some(&selected), dry_run, include_unsafe);

        println!("Cache cleanup:");
        for outcome in &outcomes {
            if outcome.skipped || outcome.bytes_freed == 0 {
                continue;
            }
            let action = if dry_run { "Would free" } else { "Freed" };
            println!(
                "  {action} {:>10} from {}",
                format_size(outcome.bytes_freed),
                outcome.description
            );
            bytes_freed += outcome.bytes_freed;
            files_deleted += outcome.files_deleted;
            for error in &outcome.errors {
                println!("    {error}");
            }
        }
        if bytes_freed == 0 {
            println!("  No cleanable caches found");
        }
    }

    println!();
    if dry_run {
        println!("Would kill {killed} processes");
        println!("Would free {}", format_size(bytes_freed));
        println!();
        println!("Run without --dry-run to execute cleanup");
    } else {
        println!("Killed {killed} processes");
        println!("Freed {} ({files_deleted} files)", format_size(bytes_freed));
    }
}

/// Kill pass for the manual cleanup command. Unlike the monitor's pass it
/// prints per-process lines and honors the manual cap.
fn manual_kill_pass(config: &ReclaimConfig, min_score: f64, min_cpu: f64, dry_run: bool) -> usize {
    let mut sampler = Sampler::new();
    sampler.refresh();
    std::thread::sleep(Duration::from_millis(200));
    sampler.refresh();

    let shielded = sampler.own_ancestry();
    let scorer = ProcessScorer::new(config, shielded.clone());
    let samples = sampler.processes();
    let mut candidates = scorer.killable(&samples, min_score, min_cpu);
    candidates.truncate(config.manual_kill_cap);

    println!("Process cleanup:");
    if candidates.is_empty() {
        println!("  No killable processes found");
        return 0;
    }

    if dry_run {
        return preview_candidates(&candidates);
    }

    let grace = Duration::from_secs_f64(config.grace_period_secs);
    let mut killed = 0;
    for candidate in candidates {
        let verdict = revalidate(&mut sampler, &scorer, &shielded, candidate.pid);
        match terminate(candidate.pid, grace, |_| verdict) {
            Ok(TerminateOutcome::Terminated | TerminateOutcome::ForceKilled) => {
                println!("  Killed: {} (CPU:{:.1}%)", candidate.name, candidate.cpu_percent);
                killed += 1;
            }
            Ok(TerminateOutcome::Refused) => {
                println!("  Skipped (protected): {}", candidate.name);
            }
            Ok(TerminateOutcome::AlreadyGone) => {}
            Err(e) => println!("  Failed: {} ({e})", candidate.name),
        }
    }
    killed
}

/// Print the would-kill lines and return how many candidates the summary
/// should report.
fn preview_candidates(candidates: &[sysreclaim::ProcessRecord]) -> usize {
    for candidate in candidates {
        println!(
            "  Would kill: {} (CPU:{:.1}%, Score:{:.0})",
            candidate.name, candidate.cpu_percent, candidate.kill_score
        );
    }
    candidates.len()
}

fn revalidate(
    sampler: &mut Sampler,
    scorer: &ProcessScorer,
    shielded: &HashSet<u32>,
    pid: u32,
) -> ProtectionVerdict {
    match sampler.sample_process(pid) {
        None => ProtectionVerdict::Gone,
        Some(sample) => {
            let record = scorer.record(&sample);
            if is_protected(
                pid,
                record.category,
                sample.children_count,
                sample.has_open_files_in_home,
                shielded,
            ) {
                ProtectionVerdict::Protected
            } else {
                ProtectionVerdict::Clear
            }
        }
    }
}

fn cmd_config(config: &ReclaimConfig) {
    println!("Configuration");
    match ReclaimConfig::default_path() {
        Some(path) if path.exists() => println!("  Source: {}", path.display()),
        Some(path) => println!("  Source: defaults (no file at {})", path.display()),
        None => println!("  Source: defaults"),
    }
    println!();
    println!("  Score weights:");
    println!("    cpu:      {:.2}", config.weights.cpu);
    println!("    memory:   {:.2}", config.weights.memory);
    println!("    fds:      {:.2}", config.weights.fds);
    println!("    age:      {:.2}", config.weights.age);
    println!("    category: {:.2}", config.weights.category);
    println!();
    println!("  Cooldown:        {}s", config.cooldown_secs);
    println!("  Auto kill cap:   {}", config.auto_kill_cap);
    println!("  Manual kill cap: {}", config.manual_kill_cap);
    println!("  Grace period:    {:.1}s", config.grace_period_secs);
    println!("  Auto-clean caches: {}", config.auto_clean_caches);
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysreclaim::core::ProcessCategory;
    use sysreclaim::ProcessRecord;

    fn record(pid: u32, name: &str, score: f64) -> ProcessRecord {
        ProcessRecord {
            pid,
            name: name.to_string(),
            cmdline: String::new(),
            username: "user".to_string(),
            cpu_percent: 50.0,
            memory_percent: 2.0,
            thread_count: 1,
            fd_count: 0,
            start_time: 0,
            children_count: 0,
            has_open_files_in_home: false,
            category: ProcessCategory::Browser,
            protected: false,
            kill_score: score,
        }
    }

    #[test]
    fn dry_run_preview_counts_every_listed_candidate() {
        let candidates = vec![
            record(100, "Google Chrome Helper", 62.0),
            record(101, "Dropbox", 48.5),
            record(102, "mds_stores", 41.0),
        ];
        assert_eq!(preview_candidates(&candidates), 3);
        assert_eq!(preview_candidates(&[]), 0);
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate("short", 20), "short");
        assert_eq!(truncate("abcdefgh", 3), "abc");
    }
}
