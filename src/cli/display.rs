use chrono::Utc;
use console::{Style, style};

use crate::hooks::{BlockingGateResult, HookRegistration, HookResult};
use crate::routing::{ResolvedRoute, format_complexity_decision};
use crate::workspace::{AuditRecord, Availability, SweepResult, WorkspaceRecord};

pub struct Display;

impl Display {
    pub fn new() -> Self {
        Self
    }

    pub fn print_header(&self, text: &str) {
        println!();
        println!("{}", style(text).bold().cyan());
        println!("{}", style("═".repeat(60)).dim());
        println!();
    }

    pub fn print_workspace(&self, workspace: &WorkspaceRecord) {
        let status = match workspace.availability {
            Availability::Available => Style::new().green().apply_to("available"),
            Availability::Leased => Style::new().yellow().apply_to("leased"),
        };
        println!(
            "{}  {}  [{}]",
            style(&workspace.id).bold(),
            workspace.name,
            status
        );
        println!(
            "    Provider: {}{}",
            workspace.provider,
            workspace
                .region
                .as_deref()
                .map(|r| format!(" ({r})"))
                .unwrap_or_default()
        );
        if let Some(lease) = &workspace.lease {
            let expiry = if lease.is_expired(Utc::now()) {
                Style::new().red().apply_to("expired")
            } else {
                Style::new().dim().apply_to("active")
            };
            println!(
                "    Lease: {} until {} ({})",
                style(&lease.owner).bold(),
                lease.expires_at.format("%Y-%m-%d %H:%M UTC"),
                expiry
            );
            if let Some(note) = &lease.note {
                println!("    Note: {}", style(note).dim());
            }
        }
        println!();
    }

    pub fn print_audit_record(&self, record: &AuditRecord) {
        println!(
            "{}  {:<9}  {}{}",
            style(record.at.format("%Y-%m-%d %H:%M:%S")).dim(),
            record.action.as_str(),
            record.workspace_id,
            record
                .owner
                .as_deref()
                .map(|o| format!("  by {o}"))
                .unwrap_or_default()
        );
    }

    pub fn print_sweep_result(&self, result: &SweepResult, dry_run: bool) {
        self.print_header(if dry_run {
            "Reaper Sweep (dry run)"
        } else {
            "Reaper Sweep"
        });
        println!(
            "Leases:    {} expired, {} released, {} errors",
            result.leases.expired, result.leases.cleaned, result.leases.errors
        );
        println!(
            "Worktrees: {} scanned, {} cleaned, {} skipped, {} errors",
            result.worktrees.scanned,
            result.worktrees.cleaned,
            result.worktrees.skipped,
            result.worktrees.errors
        );
        for (reason, count) in &result.worktrees.skipped_reasons {
            println!("    skipped ({reason}): {count}");
        }
        for path in &result.worktrees.cleaned_paths {
            println!("    {} {}", style("cleaned").green(), path.display());
        }
        println!();
    }

    pub fn print_route(&self, route: &ResolvedRoute) {
        self.print_header("Complexity Routing");
        println!("{}", format_complexity_decision(route));
        println!();
        println!("Executor: {}", style(&route.executor).bold());
        if let Some(model) = &route.model {
            println!("Model:    {}", style(model).bold());
        }
        if let Some(variant) = &route.variant {
            println!("Variant:  {variant}");
        }
        if let Some(effort) = route.reasoning_effort {
            println!("Effort:   {}", effort.as_str());
        }
        println!();
    }

    pub fn print_hook(&self, hook: &HookRegistration) {
        let kind = if hook.builtin {
            style("builtin").dim()
        } else {
            style("user").dim()
        };
        println!(
            "{}  {}  ({}, {}, timeout {}s)",
            style(hook.event.as_str()).bold(),
            hook.id,
            kind,
            if hook.blocking { "blocking" } else { "async" },
            hook.timeout_secs
        );
        println!("    {}", style(&hook.command).dim());
        if !hook.sdks.is_empty() {
            println!("    sdks: {}", hook.sdks.join(", "));
        }
    }

    pub fn print_hook_result(&self, result: &HookResult) {
        let status = if result.success {
            Style::new().green().apply_to("ok")
        } else {
            Style::new().red().apply_to("failed")
        };
        let exit = result
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "timeout".to_string());
        println!("{}  {}  (exit {})", status, style(&result.id).bold(), exit);
        if !result.success && !result.stderr.is_empty() {
            for line in result.stderr.lines().take(5) {
                println!("    {}", style(line).red().dim());
            }
        }
    }

    pub fn print_gate_result(&self, gate: &BlockingGateResult) {
        for result in &gate.results {
            self.print_hook_result(result);
        }
        println!();
        if gate.passed {
            println!("{}", style("Blocking gate passed").green().bold());
        } else {
            println!(
                "{} ({})",
                style("Blocking gate failed").red().bold(),
                gate.failures.join(", ")
            );
        }
    }

    pub fn print_success(&self, message: &str) {
        println!("{} {}", style("✓").green().bold(), message);
    }

    pub fn print_error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red().bold(), message);
    }

    pub fn print_info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}
