//! Slack Block Kit payloads for a batch.

use crate::output::{Paper, PaperBatch};
use serde_json::{json, Value};

/// Alt text of the figure block.
pub const FIGURE_ALT_TEXT: &str = "the first figure of this paper";

/// Parent message: headline plus a 1-indexed title list.
pub fn parent_text(batch: &PaperBatch) -> String {
    let mut text = format!(
        "*The last {} papers of those submitted on {} (UTC)*\n",
        batch.papers.len(),
        batch.date.format("%Y-%m-%d")
    );
    for (i, paper) in batch.papers.iter().enumerate() {
        text.push_str(&format!("{}. {}\n", i + 1, paper.title));
    }
    text
}

/// Fallback text of a threaded message.
pub fn thread_text(paper: &Paper) -> String {
    format!("summary of {}", paper.title)
}

fn labelled(label: &str, text: &str) -> Value {
    json!({
        "type": "rich_text_section",
        "elements": [
            {"type": "text", "text": format!("{label}: "), "style": {"bold": true}},
            {"type": "text", "text": text},
        ]
    })
}

fn references(paper: &Paper) -> Option<Value> {
    let refs = &paper.gist.reference_urls;
    if refs.is_empty() {
        return None;
    }
    let mut elements = vec![json!({"type": "text", "text": "references: ", "style": {"bold": true}})];
    for (i, r) in refs.iter().enumerate() {
        if i > 0 {
            elements.push(json!({"type": "text", "text": ", "}));
        }
        elements.push(json!({"type": "link", "url": r.url, "text": r.text}));
    }
    Some(json!({"type": "rich_text_section", "elements": elements}))
}

/// Blocks of one threaded message. `image_file_id` adds the figure.
pub fn paper_blocks(paper: &Paper, image_file_id: Option<&str>) -> Vec<Value> {
    let gist = &paper.gist;
    let mut items = vec![
        labelled("about", &gist.about),
        labelled("objective", &gist.objective),
        labelled("novelty", &gist.novelty),
        labelled("key", &gist.key),
    ];
    items.extend(references(paper));

    let mut blocks = vec![
        json!({"type": "section", "text": {"type": "mrkdwn", "text": format!("*{}*", paper.title)}}),
        json!({"type": "divider"}),
        json!({
            "type": "rich_text",
            "elements": [{"type": "rich_text_list", "style": "bullet", "elements": items}]
        }),
    ];
    if let Some(id) = image_file_id {
        blocks.push(json!({
            "type": "image",
            "slack_file": {"id": id},
            "alt_text": FIGURE_ALT_TEXT,
        }));
    }
    blocks.push(json!({
        "type": "actions",
        "elements": [{
            "type": "button",
            "text": {"type": "plain_text", "text": "view on arXiv :globe_with_meridians:"},
            "url": paper.url,
        }]
    }));
    blocks
}
