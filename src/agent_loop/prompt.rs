//! System instructions for a session.

use serde::Serialize;

use crate::datasource::SourceKind;
use crate::error::Result;
use crate::output::TypeDescriptor;
use crate::tools::ToolCatalog;

const AGENT_RULES: &str = "\
You answer questions using only the data reachable through the tools listed below.

Rules:
- Start with `discover` to see which sources are connected and what tables they hold.
- Use `scan` to narrow down relevant tables, `inspect` a table before querying it, \
and `sample` it when you need to see real values.
- Call exactly one tool per turn.
- Every statement must be read-only. Anything that inserts, updates, deletes or \
alters data is rejected before it reaches the source.
- Tool errors are information. Read them, adjust your next call and continue.
- When you know the answer, reply with JSON only, matching the answer schema, and \
call no tool.
- If the data cannot answer the question and the schema allows null, answer null.";

/// One source as listed in the instructions.
#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub name: String,
    pub kind: SourceKind,
    pub reachable: bool,
}

/// Render the instructions shown to the model as the system message.
pub fn instructions(
    catalog: &ToolCatalog,
    sources: &[SourceSummary],
    context: Option<&str>,
    output_type: &TypeDescriptor,
) -> Result<String> {
    let mut out = String::from(AGENT_RULES);

    out.push_str("\n\n## Tools\n");
    for def in catalog.definitions() {
        out.push_str(&format!("- {}: {}\n", def.name, def.description));
    }

    out.push_str("\n## Sources\n");
    if sources.is_empty() {
        out.push_str("No sources are configured.\n");
    } else {
        out.push_str(&serde_yaml::to_string(sources)?);
    }

    if let Some(context) = context.map(str::trim).filter(|c| !c.is_empty()) {
        out.push_str("\n## Context\n");
        out.push_str(context);
        out.push('\n');
    }

    out.push_str(&format!(
        "\n## Answer schema ({output_type})\n{}\n",
        serde_json::to_string_pretty(&output_type.json_schema())?
    ));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instructions_list_sources_as_yaml() {
        let sources = vec![
            SourceSummary {
                name: "A".into(),
                kind: SourceKind::Database,
                reachable: true,
            },
            SourceSummary {
                name: "docs".into(),
                kind: SourceKind::Library,
                reachable: false,
            },
        ];
        let text = instructions(
            &ToolCatalog::default(),
            &sources,
            Some("Fiscal year starts in April."),
            &TypeDescriptor::optional(TypeDescriptor::Integer),
        )
        .unwrap();
        assert!(text.contains("- name: A\n  kind: database\n  reachable: true"));
        assert!(text.contains("## Context\nFiscal year starts in April."));
        assert!(text.contains("## Answer schema (integer | null)"));
        assert!(text.contains("\"anyOf\""));
    }

    #[test]
    fn blank_context_is_omitted() {
        let text = instructions(&ToolCatalog::default(), &[], Some("  "), &TypeDescriptor::Any).unwrap();
        assert!(!text.contains("## Context"));
        assert!(text.contains("No sources are configured."));
    }
}
