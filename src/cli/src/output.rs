//! Result formatting for CLI output.

use a3s_index_runtime::Composed;
use clap::ValueEnum;
use serde::Serialize;

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// JSON rendering of a published index.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexOutput {
    pub reference: String,
    pub media_type: String,
    pub digest: String,
    pub size: u64,
    pub tags: Vec<String>,
}

/// Render a composed index. `verb` is "Created" or "Updated".
pub fn render_index(
    verb: &str,
    name: &str,
    composed: &Composed,
    format: OutputFormat,
) -> Result<String, serde_json::Error> {
    let desc = &composed.descriptor;
    match format {
        OutputFormat::Text => {
            let mut lines = vec![format!("{} and pushed index: {}", verb, desc.digest)];
            lines.extend(composed.references.iter().map(|r| format!("Tagged {}", r)));
            Ok(lines.join("\n"))
        }
        OutputFormat::Json => serde_json::to_string_pretty(&IndexOutput {
            reference: format!("{}@{}", name, desc.digest),
            media_type: desc.media_type.clone(),
            digest: desc.digest.clone(),
            size: desc.size,
            tags: composed.references.clone(),
        }),
    }
}
