//! Kernel safety check command

use anyhow::{Context, Result};
use colored::*;
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use tracing::debug;

use fwlink_errors::KernelPolicyError;
use fwlink_kernel::{GateOutcome, KernelInfo, ProcKernelInfo};
use fwlink_plugin::{HostConfig, builtin_kernel_policies};

use crate::commands::config::load_config;
use crate::error::CliError;

/// Result of one plugin's gate.
#[derive(Debug, Serialize)]
struct GateReport {
    plugin: &'static str,
    allowed: bool,
    reason: String,
}

impl GateReport {
    fn new(plugin: &'static str, result: Result<GateOutcome, KernelPolicyError>) -> Self {
        match result {
            Ok(outcome) => Self {
                plugin,
                allowed: true,
                reason: describe_outcome(&outcome),
            },
            Err(e) => Self {
                plugin,
                allowed: false,
                reason: e.requirement().map_or_else(|| e.to_string(), |req| format!("{e} (needs {req})")),
            },
        }
    }
}

fn describe_outcome(outcome: &GateOutcome) -> String {
    match outcome {
        GateOutcome::NoPolicy => "no minimum kernel configured".to_string(),
        GateOutcome::NoModuleSupport => "kernel has no module support".to_string(),
        GateOutcome::ModuleAbsent => "module not loaded".to_string(),
        GateOutcome::Satisfied { running } => format!("kernel {running} is new enough"),
    }
}

/// Run every built-in plugin's gate against `proc_root`.
pub async fn execute(config_path: &Path, proc_root: &Path, json: bool) -> Result<()> {
    let config = load_config(config_path).await?;
    let info = ProcKernelInfo::with_root(proc_root);
    let reports = run_gates(&config, &info);

    if json {
        let output = json!({
            "success": reports.iter().all(|r| r.allowed),
            "plugins": reports,
        });
        let text = serde_json::to_string_pretty(&output)
            .map_err(CliError::from)
            .context("failed to format kernel check report")?;
        println!("{text}");
    } else {
        print_reports_human(&reports);
    }

    let refused: Vec<&str> = reports
        .iter()
        .filter(|r| !r.allowed)
        .map(|r| r.plugin)
        .collect();
    if !refused.is_empty() {
        return Err(CliError::KernelRefused(refused.join(", ")).into());
    }

    Ok(())
}

fn run_gates(config: &HostConfig, info: &dyn KernelInfo) -> Vec<GateReport> {
    builtin_kernel_policies(config)
        .into_iter()
        .map(|(plugin, policy)| {
            debug!(plugin, ?policy, "checking kernel policy");
            GateReport::new(plugin, fwlink_kernel::check(&policy, info))
        })
        .collect()
}

fn print_reports_human(reports: &[GateReport]) {
    println!("{}", "Kernel Safety Checks:".bold());
    for report in reports {
        let status = if report.allowed {
            "✓".green()
        } else {
            "✗".red()
        };
        println!("  {} {}: {}", status, report.plugin.bold(), report.reason);
    }
}
