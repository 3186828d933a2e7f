//! SDNFW - SDN firewall controller
//!
//! Command-line front end for the firewall policy core. Each invocation loads
//! the persisted controller state, applies one operation and exits.
//!
//! # Usage
//!
//! ```bash
//! sdnfw status                               # Mode, topology and rule counts
//! sdnfw mode blacklist                       # Switch operating mode
//! sdnfw add "Block telnet" -P tcp -p 23      # Append rule to the active list
//! sdnfw add "Drop scanner" --src 203.0.113.0/24
//! sdnfw edit 0 "Block telnet" -P tcp -p 23-24
//! sdnfw remove 0                             # Remove rule by index
//! sdnfw list --list whitelist                # Show a list regardless of mode
//! sdnfw events --count 50                    # Recent audit events
//! ```
//!
//! No switch transport is attached to the CLI, so flow invalidation is a
//! logged no-op here; a long-running controller registers switches with its
//! `SwitchRegistry` as they connect.

use clap::{Args, Parser, Subcommand};
use ipnetwork::IpNetwork;
use sdnfw::audit::AuditLog;
use sdnfw::config::{ConfigStore, JsonConfigStore};
use sdnfw::core::firewall::{ListKind, Mode, Protocol, Rule, RuleDraft, RuleList};
use sdnfw::core::switches::SwitchRegistry;
use sdnfw::validators::parse_port_spec;
use sdnfw::{FirewallController, utils};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "sdnfw")]
#[command(about = "SDN firewall controller - mode and rule management", long_about = None)]
struct Cli {
    /// Controller configuration file (default: <data dir>/controller.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show mode, managed switch and rule counts
    Status,
    /// List rules (defaults to the list of the current mode)
    List {
        /// Which list to show (blacklist or whitelist)
        #[arg(short, long)]
        list: Option<ListKind>,
    },
    /// Switch operating mode (passthrough, blacklist, whitelist)
    Mode { mode: Mode },
    /// Append a rule to the list of the current mode
    Add(RuleArgs),
    /// Remove the rule at INDEX from the list of the current mode
    Remove { index: usize },
    /// Replace the rule at INDEX; the new rule moves to the end of the list
    Edit {
        index: usize,
        #[command(flatten)]
        rule: RuleArgs,
    },
    /// Show recent audit events, newest first
    Events {
        #[arg(short, long, default_value_t = 20)]
        count: usize,
    },
}

impl Commands {
    /// Whether the command changes controller state
    fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::Mode { .. } | Self::Add(_) | Self::Remove { .. } | Self::Edit { .. }
        )
    }
}

#[derive(Args)]
struct RuleArgs {
    /// Human-readable rule label
    label: String,
    /// Protocol to match (any, tcp, udp, icmp)
    #[arg(short = 'P', long, default_value = "any")]
    protocol: Protocol,
    /// Source network (CIDR)
    #[arg(long)]
    src: Option<IpNetwork>,
    /// Destination network (CIDR)
    #[arg(long)]
    dst: Option<IpNetwork>,
    /// Destination port or range, e.g. 22 or 8000-9000 (tcp/udp only)
    #[arg(short, long, value_parser = parse_port_spec)]
    port: Option<(u16, u16)>,
}

impl RuleArgs {
    fn into_rule(self) -> sdnfw::Result<Rule> {
        Rule::from_draft(RuleDraft {
            label: self.label,
            protocol: self.protocol,
            source: self.src,
            destination: self.dst,
            ports: self.port,
        })
    }
}

fn main() -> ExitCode {
    let _ = utils::ensure_dirs();
    init_tracing();
    let cli = Cli::parse();

    let runtime = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");
    match runtime.block_on(handle_cli(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Logs to `<state dir>/sdnfw.log`, falling back to stdout.
fn init_tracing() {
    if let Some(mut log_path) = utils::get_state_dir() {
        log_path.push("sdnfw.log");
        if let Ok(file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
        {
            tracing_subscriber::fmt().with_ansi(false).with_writer(file).init();
            return;
        }
    }
    tracing_subscriber::fmt::init();
}

fn print_rules(title: &str, rules: &RuleList) {
    println!("{title} ({} rules):", rules.len());
    for (index, rule) in rules.iter().enumerate() {
        println!("  [{index}] {rule}");
    }
}

async fn handle_cli(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let store = match cli.config {
        Some(path) => JsonConfigStore::new(path),
        None => JsonConfigStore::default_location()
            .ok_or("No data directory available, pass --config <PATH>")?,
    };
    let config_path = store.path().to_path_buf();
    let store: Arc<dyn ConfigStore> = Arc::new(store);
    let audit = AuditLog::in_state_dir().ok();
    let switches = Arc::new(SwitchRegistry::new());

    // Read-only commands leave the audit trail untouched
    let controller_audit = audit.clone().filter(|_| cli.command.is_mutating());
    let controller = FirewallController::start(store, switches.clone(), controller_audit).await;

    match cli.command {
        Commands::Status => {
            let state = controller.snapshot().await;
            println!("Mode: {}", state.mode);
            println!("Managed switch: {}", state.topology.datapath_id);
            println!(
                "Ports: ingress {} / egress {}",
                state.topology.ingress_port, state.topology.egress_port
            );
            println!("Blacklist rules: {}", state.blacklist.len());
            println!("Whitelist rules: {}", state.whitelist.len());
            println!("Flow idle timeout: {}s", state.flow_active_time_secs);
            println!("Configuration: {}", config_path.display());
            println!("Connected switches: {}", switches.connected().len());
        }
        Commands::List { list } => {
            let kind = list.or(controller.mode().await.writable_list());
            match kind {
                Some(kind) => {
                    let rules = controller.rules(kind).await;
                    print_rules(&kind.to_string(), &rules);
                }
                None => {
                    println!("Mode is passthrough, no rules are evaluated.");
                    println!("Use --list blacklist or --list whitelist to inspect stored rules.");
                }
            }
        }
        Commands::Mode { mode } => {
            controller.set_mode(mode).await?;
            println!("✓ Mode set to {mode}");
        }
        Commands::Add(args) => {
            let rule = args.into_rule()?;
            let index = controller.add_rule(rule).await?;
            println!("✓ Added rule [{index}]");
        }
        Commands::Remove { index } => {
            let rule = controller.remove_rule(index).await?;
            println!("✓ Removed rule {rule}");
        }
        Commands::Edit { index, rule } => {
            let rule = rule.into_rule()?;
            let old = controller.edit_rule(index, rule).await?;
            let len = controller.active_rules().await.len();
            println!("✓ Replaced rule {old}");
            println!("  New rule is now at index {}", len.saturating_sub(1));
        }
        Commands::Events { count } => {
            let audit = audit.ok_or("State directory not available, no audit log")?;
            for event in audit.read_recent(count).await? {
                println!(
                    "{} [{:?}] {}",
                    event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    event.severity,
                    event.message
                );
            }
        }
    }
    Ok(())
}
