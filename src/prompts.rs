//! Prompts for the summarizer, the agent, and the formatter.
//!
//! Every prompt lives here so wording changes never touch retry or parsing
//! logic, and tests can inspect prompts without a model.

/// Build the free-form summary request for a paper.
pub fn summary_prompt(title: &str, abstract_text: &str) -> String {
    format!(
        r#"You are a renowned professor in Computer Science. Your lab student, who is well versed in various Computer Science fields, asked you to write a concise summary about the following academic paper utilizing your expertise.

Your summary can be written in a free format, but should answer questions below:
- [About] What did this research do?
- [Objective] What did this research tried to achieve?
- [Novelty] How is this research superior to existing ones?
- [Key] What are the most important findings of this research?

Do not put any URL inside these four answers.

```
[Paper Information]
title: {title}
abstract: {abstract_text}
```
"#
    )
}

/// Extra instructions appended to [`summary_prompt`] when the summarizer is an agent.
pub const AGENT_SUFFIX: &str = r#"
You can use tools given to you to obtain additional information about unfamiliar (even to CS graduate students) notions and keywords that appear in the abstract. Whether to use tools is up to you, but if you decide to use them, they MUST be used BEFORE you start to write the summary.
Additionally, when you actually used tools to obtain information about a keyword from a Web article which turned out to be written in English and ACTUALLY INDISPENSABLE to understand the research paper, write its URL and title (that come as part of tools' responses) in the reference section at the bottom of the final summary. The reference section should ONLY exist when actual tool calls are made. The reference section should ONLY include urls that were really helpful, and shouldn't include random articles merely sharing similar concepts.
Moreover, please don't include any URLs of the paper itself, arxiv.org, www.mdpi.com, or placeholder URLs like example.com, which are not real URLs, in ANY of your outputs."#;

/// System prompt describing the text protocol the agent uses to call tools.
///
/// The placeholder `{tools}` is replaced with one `- name: description` line
/// per tool.
pub const AGENT_SYSTEM_PROMPT: &str = r#"You can call tools to look things up before answering.

Available tools:
{tools}

To call a tool, reply with exactly these two lines and nothing else:
Action: <tool name>
Input: <tool input>

The tool result will be sent back to you as a message starting with "Observation:".
When you are done with tools, reply with your final answer only, without any "Action:" line."#;

/// Render [`AGENT_SYSTEM_PROMPT`] for the given `(name, description)` pairs.
pub fn agent_system_prompt(tools: &[(&str, &str)]) -> String {
    let listing = tools
        .iter()
        .map(|(name, description)| format!("- {name}: {description}"))
        .collect::<Vec<_>>()
        .join("\n");
    AGENT_SYSTEM_PROMPT.replace("{tools}", &listing)
}

/// Sent to the agent when it has used up its tool budget.
pub const AGENT_BUDGET_EXHAUSTED: &str =
    "You cannot call any more tools. Write the final summary now.";

/// JSON shape the formatter must produce.
pub const GIST_SCHEMA: &str = r#"{
  "type": "object",
  "properties": {
    "about": {"type": "string"},
    "objective": {"type": "string"},
    "novelty": {"type": "string"},
    "key": {"type": "string"},
    "reference_urls": {
      "type": "array",
      "items": {
        "type": "object",
        "properties": {"url": {"type": "string"}, "text": {"type": "string"}},
        "required": ["url", "text"]
      }
    }
  },
  "required": ["about", "objective", "novelty", "key"]
}"#;

const FORMAT_RULES: &str = r#"[Format Instructions]
- Each point should be around 50 words, and no newline character may be included.
- When you want to emphasize words, be sure to surround them with *single asterisk at each end*, not double asterisks.
- Do not put any URL inside "about", "objective", "novelty" or "key".
- Put URLs listed in a reference section, if any, into "reference_urls" with a short label in "text".
- Reply with a single JSON object matching the schema below and nothing else.

[JSON Schema]
"#;

/// Ask the formatter to map a free-form summary onto the gist schema.
pub fn format_prompt(summary: &str) -> String {
    format!(
        "Format the following summary of an academic paper in Computer Science into the specified format.\n\n\
         {FORMAT_RULES}{GIST_SCHEMA}\n\n[Paper Summary]\n{summary}\n"
    )
}

/// Single-stage request: summarise the paper straight into the gist schema.
pub fn direct_gist_prompt(title: &str, abstract_text: &str) -> String {
    format!(
        "{}\nAnswer the four questions in the specified format.\n\n{FORMAT_RULES}{GIST_SCHEMA}\n",
        summary_prompt(title, abstract_text)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_prompt_embeds_paper() {
        let p = summary_prompt("Attention Is All You Need", "We propose the Transformer.");
        assert!(p.contains("title: Attention Is All You Need"));
        assert!(p.contains("abstract: We propose the Transformer."));
        for label in ["[About]", "[Objective]", "[Novelty]", "[Key]"] {
            assert!(p.contains(label), "missing {label}");
        }
    }

    #[test]
    fn format_prompt_carries_schema_and_summary() {
        let p = format_prompt("It does X.");
        assert!(p.contains("\"required\": [\"about\", \"objective\", \"novelty\", \"key\"]"));
        assert!(p.ends_with("It does X.\n"));
        assert!(p.contains("around 50 words"));
    }

    #[test]
    fn direct_prompt_is_summary_plus_schema() {
        let p = direct_gist_prompt("T", "A");
        assert!(p.contains("title: T"));
        assert!(p.contains("reference_urls"));
    }

    #[test]
    fn agent_prompt_lists_tools() {
        let p = agent_system_prompt(&[("web_search", "search"), ("fetch_url", "fetch")]);
        assert!(p.contains("- web_search: search\n- fetch_url: fetch"));
        assert!(!p.contains("{tools}"));
    }
}
