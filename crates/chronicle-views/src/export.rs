//! Export surface for reconstructed views.
//!
//! Serializes an [`AggregateView`] to pretty JSON, YAML, or a flattened
//! human-readable Markdown report. Field names are stable; there is no wire
//! versioning beyond that.

use std::fmt;
use std::str::FromStr;

use crate::builder::AggregateView;
use crate::errors::{Result, ViewError};

/// Markdown sections list at most this many entries per insight category.
const MARKDOWN_SECTION_LIMIT: usize = 10;

/// Supported export formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    /// Pretty-printed JSON.
    Json,
    /// YAML document.
    Yaml,
    /// Flattened human-readable report.
    Markdown,
}

impl ExportFormat {
    /// Canonical lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Yaml => "yaml",
            ExportFormat::Markdown => "markdown",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "yaml" => Ok(ExportFormat::Yaml),
            "markdown" => Ok(ExportFormat::Markdown),
            other => Err(ViewError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Serialize a view in the requested format.
pub fn export_view(view: &AggregateView, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(view)?),
        ExportFormat::Yaml => Ok(serde_yaml::to_string(view)?),
        ExportFormat::Markdown => Ok(render_markdown(view)),
    }
}

fn render_markdown(view: &AggregateView) -> String {
    let params = &view.view_parameters;
    let insights = &view.aggregated_insights;
    let mut lines: Vec<String> = Vec::new();

    lines.push("# Context View".to_string());
    lines.push(String::new());
    lines.push(format!(
        "- Sessions considered: {}",
        params.sessions_considered
    ));
    lines.push(format!("- Domain: {}", params.domain));
    if let Some(as_of) = &params.as_of {
        lines.push(format!("- As of: {as_of}"));
    }
    if let Some(last_activity) = &view.activity.last_activity {
        lines.push(format!("- Last activity: {last_activity}"));
    }
    lines.push(String::new());
    lines.push("## Aggregated Insights".to_string());
    lines.push(format!("- Decisions: {}", insights.total_decisions));
    lines.push(format!("- Learnings: {}", insights.total_learnings));
    lines.push(format!("- Constraints: {}", insights.total_constraints));
    lines.push(String::new());

    push_section(&mut lines, "Decisions", &view.decisions_made);
    push_section(&mut lines, "Learnings", &view.learnings);
    push_section(&mut lines, "Constraints", &view.constraints);

    if !view.recent_sessions.is_empty() {
        lines.push("## Recent Sessions".to_string());
        for digest in &view.recent_sessions {
            lines.push(format!(
                "- {}: {} ({}) — captures: {}",
                digest.id, digest.title, digest.session_type, digest.capture_count
            ));
        }
        lines.push(String::new());
    }

    if !view.pending_next_steps.is_empty() {
        lines.push("## Pending Next Steps".to_string());
        for step in &view.pending_next_steps {
            lines.push(format!("- {step}"));
        }
    }

    lines.join("\n").trim().to_string()
}

fn push_section(lines: &mut Vec<String>, heading: &str, entries: &[String]) {
    if entries.is_empty() {
        return;
    }
    lines.push(format!("### {heading}"));
    for entry in entries.iter().take(MARKDOWN_SECTION_LIMIT) {
        lines.push(format!("- {entry}"));
    }
    lines.push(String::new());
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::SessionDigest;
    use crate::builder::{ActivityMetrics, AggregatedInsights, ViewParameters};
    use assert_matches::assert_matches;
    use std::collections::BTreeMap;

    fn sample_view() -> AggregateView {
        AggregateView {
            view_parameters: ViewParameters {
                as_of: Some("2025-01-01T10:00:00Z".into()),
                domain: "all".into(),
                recent_limit: 10,
                sessions_considered: 1,
            },
            activity: ActivityMetrics {
                session_count: 1,
                sprint_count: 0,
                last_activity: Some("2025-01-01T10:00:00Z".into()),
            },
            aggregated_insights: AggregatedInsights {
                total_decisions: 1,
                total_learnings: 0,
                total_constraints: 1,
                capture_totals: BTreeMap::from([
                    ("constraint".to_string(), 1),
                    ("decision".to_string(), 1),
                ]),
                by_sprint: BTreeMap::new(),
            },
            decisions_made: vec!["Use REST (from PS-2025-01-01-001)".into()],
            learnings: Vec::new(),
            constraints: vec!["Must support 10k RPS".into()],
            context_notes: Vec::new(),
            recent_sessions: vec![SessionDigest {
                id: "PS-2025-01-01-001".into(),
                session_type: "planning".into(),
                title: "Design API".into(),
                sprint_id: None,
                completed_at: Some("2025-01-01T10:00:00Z".into()),
                summary: Some("Approved".into()),
                capture_count: 2,
                captures: BTreeMap::from([
                    ("constraint".to_string(), 1),
                    ("decision".to_string(), 1),
                ]),
                domain: None,
            }],
            pending_next_steps: vec!["PS-2025-01-01-001: Draft OpenAPI spec".into()],
        }
    }

    #[test]
    fn format_parse_round_trip() {
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!(" YAML ".parse::<ExportFormat>().unwrap(), ExportFormat::Yaml);
        assert_eq!(
            "Markdown".parse::<ExportFormat>().unwrap(),
            ExportFormat::Markdown
        );
        assert_matches!(
            "xml".parse::<ExportFormat>(),
            Err(ViewError::UnsupportedFormat(_))
        );
    }

    #[test]
    fn json_export_is_parseable() {
        let text = export_view(&sample_view(), ExportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["view_parameters"]["sessions_considered"], 1);
        assert_eq!(value["constraints"][0], "Must support 10k RPS");
    }

    #[test]
    fn yaml_export_is_parseable() {
        let text = export_view(&sample_view(), ExportFormat::Yaml).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
        assert_eq!(value["view_parameters"]["domain"], "all");
    }

    #[test]
    fn markdown_report_has_expected_sections() {
        let text = export_view(&sample_view(), ExportFormat::Markdown).unwrap();
        assert!(text.starts_with("# Context View"));
        assert!(text.contains("- Sessions considered: 1"));
        assert!(text.contains("## Aggregated Insights"));
        assert!(text.contains("### Decisions"));
        assert!(text.contains("- Use REST (from PS-2025-01-01-001)"));
        assert!(text.contains("### Constraints"));
        assert!(text.contains("## Recent Sessions"));
        assert!(text.contains("- PS-2025-01-01-001: Design API (planning) — captures: 2"));
        assert!(text.contains("## Pending Next Steps"));
        // Empty categories are omitted entirely.
        assert!(!text.contains("### Learnings"));
    }

    #[test]
    fn markdown_sections_are_capped() {
        let mut view = sample_view();
        view.decisions_made = (0..15).map(|n| format!("Decision {n}")).collect();
        let text = export_view(&view, ExportFormat::Markdown).unwrap();
        assert!(text.contains("- Decision 9"));
        assert!(!text.contains("- Decision 10"));
    }
}
