//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::ValidationResult;
use crate::kind::{AddressingStyle, KindRegistry, ResourceKind};
use crate::planner::{ActionType, display};
use crate::reconciler::{Inventory, OutcomeStatus, PassReport};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Outcome row for table display.
#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

/// Current object row for table display.
#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Content")]
    content: String,
}

/// Kind row for table display.
#[derive(Tabled)]
struct KindRow {
    #[tabled(rename = "Kind")]
    name: String,
    #[tabled(rename = "Style")]
    style: String,
    #[tabled(rename = "Discovery")]
    discovery: String,
    #[tabled(rename = "Write")]
    write: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the report of a plan or sync pass.
    #[must_use]
    pub fn format_report(&self, report: &PassReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    fn format_report_text(report: &PassReport) -> String {
        let verb = if report.dry_run { "Plan" } else { "Sync" };
        let mut output = String::new();

        let _ = writeln!(output, "\n{verb} {}", report.pass_id.to_string().dimmed());

        if report.outcomes.is_empty() {
            let _ = writeln!(output, "   No resources declared.");
            return output;
        }

        let rows: Vec<OutcomeRow> = report
            .outcomes
            .iter()
            .map(|o| OutcomeRow {
                kind: o.kind.clone(),
                name: o.name.clone(),
                action: Self::format_action_type(o.action),
                status: Self::format_status(o.status),
                detail: o.message.as_deref().map(|m| Self::truncate(m, 60)).unwrap_or_default(),
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let summary = if report.dry_run {
            format!(
                "\nPlan: {} to create, {} to update, {} to delete, {} unchanged\n",
                report.count(ActionType::Create).to_string().green(),
                report.count(ActionType::Update).to_string().yellow(),
                report.count(ActionType::Delete).to_string().red(),
                report.unchanged()
            )
        } else {
            format!(
                "\n{} {} created, {} updated, {} deleted, {} unchanged\n",
                if report.is_success() { "✓".green() } else { "✗".red() },
                report.count(ActionType::Create),
                report.count(ActionType::Update),
                report.count(ActionType::Delete),
                report.unchanged()
            )
        };
        output.push_str(&summary);

        let failures = report.failures();
        if !failures.is_empty() {
            let _ = write!(output, "\n{} {} failure(s):\n", "⚠".yellow(), failures.len());
            for failure in &failures {
                let _ = writeln!(output, "   - {failure}");
            }
        }

        output
    }

    /// Formats an audit listing. Content is redacted per kind.
    #[must_use]
    pub fn format_inventory(&self, inventory: &Inventory, registry: &KindRegistry) -> String {
        match self.format {
            OutputFormat::Json => {
                let records: Vec<serde_json::Value> = inventory
                    .records
                    .iter()
                    .map(|r| {
                        serde_json::json!({
                            "kind": r.kind,
                            "name": r.name,
                            "ensure": r.ensure,
                            "content": registry.get(&r.kind).map_or_else(
                                || serde_json::Value::Object(r.content.clone()),
                                |kind| serde_json::Value::Object(crate::planner::redact(&r.content, &kind.redacted_fields)),
                            ),
                        })
                    })
                    .collect();
                let json = serde_json::json!({ "records": records, "failures": inventory.failures });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_inventory_text(inventory, registry),
        }
    }

    fn format_inventory_text(inventory: &Inventory, registry: &KindRegistry) -> String {
        let mut output = String::new();

        if inventory.records.is_empty() {
            output.push_str("   No objects found.\n");
        } else {
            let rows: Vec<RecordRow> = inventory
                .records
                .iter()
                .map(|r| RecordRow {
                    kind: r.kind.clone(),
                    name: r.name.clone(),
                    content: registry
                        .get(&r.kind)
                        .map_or_else(String::new, |kind| Self::truncate(&display(kind, &r.content), 60)),
                })
                .collect();
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
            let _ = writeln!(output, "\n{} object(s)", inventory.records.len());
        }

        if !inventory.failures.is_empty() {
            let _ = write!(output, "\n{} Could not read:\n", "⚠".yellow());
            for failure in &inventory.failures {
                let _ = writeln!(output, "   - {failure}");
            }
        }

        output
    }

    /// Formats the registered kinds.
    #[must_use]
    pub fn format_kinds(&self, registry: &KindRegistry) -> String {
        match self.format {
            OutputFormat::Json => {
                let kinds: Vec<&ResourceKind> = registry.iter().collect();
                serde_json::to_string_pretty(&kinds).unwrap_or_default()
            }
            OutputFormat::Text => {
                let rows: Vec<KindRow> = registry
                    .iter()
                    .map(|k| KindRow {
                        name: k.name.clone(),
                        style: match k.style {
                            AddressingStyle::Prefix => String::from("prefix"),
                            AddressingStyle::Bare if k.is_keyed() && k.batched => String::from("bare (keyed, batched)"),
                            AddressingStyle::Bare if k.is_keyed() => String::from("bare (keyed)"),
                            AddressingStyle::Bare => String::from("bare"),
                        },
                        discovery: k.discovery_uri.clone(),
                        write: k.object_uri.clone(),
                    })
                    .collect();
                let mut output = Table::new(rows).to_string();
                output.push('\n');
                output
            }
        }
    }

    /// Formats the result of configuration validation.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, resources: usize, warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "status": "valid",
                    "resources": resources,
                    "warnings": result.warnings,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = format!("{} Configuration is valid ({resources} resource(s))\n", "✓".green());
                if warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }
                output
            }
        }
    }

    /// Formats an error message.
    #[must_use]
    pub fn format_error(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": "error", "message": message });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{} {message}", "✗".red()),
        }
    }

    /// Formats an action type with color.
    fn format_action_type(action_type: ActionType) -> String {
        match action_type {
            ActionType::Create => "+create".green().to_string(),
            ActionType::Update => "~update".yellow().to_string(),
            ActionType::Delete => "-delete".red().to_string(),
            ActionType::Noop => "none".dimmed().to_string(),
        }
    }

    /// Formats an outcome status with color.
    fn format_status(status: OutcomeStatus) -> String {
        match status {
            OutcomeStatus::Applied => "applied".green().to_string(),
            OutcomeStatus::Pending => "pending".yellow().to_string(),
            OutcomeStatus::Unchanged => "unchanged".dimmed().to_string(),
            OutcomeStatus::Failed => "failed".red().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{head}...")
        }
    }
}
