//! Markdown rendering for rich mode
//!
//! The collected response is parsed once into an mdast tree and rendered
//! block by block into styled terminal lines. Wrapping is left to the
//! terminal.

use crate::cli::Palette;
use colored::*;
use markdown::{mdast, to_mdast, ParseOptions};

/// Width of `---` rules
const RULE_WIDTH: usize = 60;

/// Render `text` into terminal lines. Unparseable input is returned as-is.
pub fn render_markdown(text: &str, palette: &Palette) -> Vec<String> {
    let root = match to_mdast(text, &ParseOptions::gfm()) {
        Ok(node) => node,
        Err(e) => {
            tracing::debug!("Markdown parse failed, printing raw text: {}", e);
            return text.lines().map(str::to_string).collect();
        }
    };

    let blocks = match root {
        mdast::Node::Root(root) => root.children,
        other => vec![other],
    };

    let renderer = Renderer { palette };
    let mut lines = Vec::new();
    for (i, block) in blocks.iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
        }
        lines.extend(renderer.block(block, 0));
    }
    lines
}

struct Renderer<'a> {
    palette: &'a Palette,
}

impl Renderer<'_> {
    fn block(&self, node: &mdast::Node, depth: usize) -> Vec<String> {
        match node {
            mdast::Node::Heading(heading) => {
                let text = self.inline(&heading.children);
                let styled = match heading.depth {
                    1 => text.bold().underline().color(self.palette.agent),
                    2 => text.bold().color(self.palette.agent),
                    n => format!("{} {}", "#".repeat(n as usize), text)
                        .bold()
                        .color(self.palette.agent),
                };
                vec![styled.to_string()]
            }
            mdast::Node::Paragraph(paragraph) => self
                .inline(&paragraph.children)
                .split('\n')
                .map(str::to_string)
                .collect(),
            mdast::Node::Code(code) => {
                let fence = format!("```{}", code.lang.as_deref().unwrap_or_default());
                let mut lines = vec![fence.color(self.palette.dim).to_string()];
                lines.extend(
                    code.value
                        .split('\n')
                        .map(|line| format!("  {}", line.color(self.palette.success))),
                );
                lines.push("```".color(self.palette.dim).to_string());
                lines
            }
            mdast::Node::List(list) => self.list(list, depth),
            mdast::Node::Blockquote(quote) => {
                let border = "│ ".color(self.palette.dim).to_string();
                quote
                    .children
                    .iter()
                    .flat_map(|child| self.block(child, depth))
                    .map(|line| format!("{}{}", border, line.italic()))
                    .collect()
            }
            mdast::Node::ThematicBreak(_) => {
                vec!["─".repeat(RULE_WIDTH).color(self.palette.dim).to_string()]
            }
            mdast::Node::Table(table) => self.table(table),
            mdast::Node::Html(html) => vec![html.value.trim().to_string()],
            other => {
                let text = self.inline(std::slice::from_ref(other));
                if text.is_empty() {
                    Vec::new()
                } else {
                    vec![text]
                }
            }
        }
    }

    fn inline(&self, nodes: &[mdast::Node]) -> String {
        let mut out = String::new();
        for node in nodes {
            match node {
                mdast::Node::Text(text) => out.push_str(&text.value),
                mdast::Node::Strong(strong) => {
                    out.push_str(&self.inline(&strong.children).bold().to_string())
                }
                mdast::Node::Emphasis(emphasis) => {
                    out.push_str(&self.inline(&emphasis.children).italic().to_string())
                }
                mdast::Node::Delete(delete) => {
                    out.push_str(&self.inline(&delete.children).strikethrough().to_string())
                }
                mdast::Node::InlineCode(code) => {
                    out.push_str(&code.value.color(self.palette.success).to_string())
                }
                mdast::Node::Link(link) => {
                    let label = self.inline(&link.children);
                    out.push_str(&label.underline().to_string());
                    if label != link.url {
                        out.push_str(&format!(" ({})", link.url).color(self.palette.dim).to_string());
                    }
                }
                mdast::Node::Image(image) => {
                    out.push_str(if image.alt.is_empty() { &image.url } else { &image.alt })
                }
                mdast::Node::Break(_) => out.push('\n'),
                mdast::Node::Html(html) => out.push_str(&html.value),
                mdast::Node::Paragraph(paragraph) => out.push_str(&self.inline(&paragraph.children)),
                _ => {}
            }
        }
        out
    }

    fn list(&self, list: &mdast::List, depth: usize) -> Vec<String> {
        let indent = "  ".repeat(depth);
        let mut lines = Vec::new();
        let mut number = list.start.unwrap_or(1);

        for node in &list.children {
            let mdast::Node::ListItem(item) = node else {
                continue;
            };
            let bullet = if list.ordered {
                let marker = format!("{}.", number);
                number += 1;
                marker
            } else {
                match item.checked {
                    Some(true) => "[x]".to_string(),
                    Some(false) => "[ ]".to_string(),
                    None => "•".to_string(),
                }
            };
            let bullet = bullet.color(self.palette.system).to_string();

            let mut first = true;
            for child in &item.children {
                match child {
                    mdast::Node::List(nested) => lines.extend(self.list(nested, depth + 1)),
                    other => {
                        for line in self.block(other, depth + 1) {
                            if first {
                                lines.push(format!("{}{} {}", indent, bullet, line));
                                first = false;
                            } else {
                                lines.push(format!("{}  {}", indent, line));
                            }
                        }
                    }
                }
            }
            if first {
                lines.push(format!("{}{}", indent, bullet));
            }
        }
        lines
    }

    fn table(&self, table: &mdast::Table) -> Vec<String> {
        let rows: Vec<Vec<String>> = table
            .children
            .iter()
            .filter_map(|row| match row {
                mdast::Node::TableRow(row) => Some(
                    row.children
                        .iter()
                        .map(|cell| match cell {
                            mdast::Node::TableCell(cell) => self.inline(&cell.children),
                            _ => String::new(),
                        })
                        .collect(),
                ),
                _ => None,
            })
            .collect();

        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        let widths: Vec<usize> = (0..columns)
            .map(|col| {
                rows.iter()
                    .filter_map(|row| row.get(col))
                    .map(|cell| visible_len(cell))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut lines = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            let cells: Vec<String> = widths
                .iter()
                .enumerate()
                .map(|(col, width)| {
                    let cell = row.get(col).map(String::as_str).unwrap_or_default();
                    let pad = width.saturating_sub(visible_len(cell));
                    let cell = if i == 0 {
                        cell.bold().to_string()
                    } else {
                        cell.to_string()
                    };
                    format!("{}{}", cell, " ".repeat(pad))
                })
                .collect();
            lines.push(cells.join(" │ "));
            if i == 0 {
                let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
                lines.push(rule.join("─┼─").color(self.palette.dim).to_string());
            }
        }
        lines
    }
}

/// Character count ignoring ANSI escape sequences
fn visible_len(text: &str) -> usize {
    let mut len = 0;
    let mut in_escape = false;
    for ch in text.chars() {
        match (in_escape, ch) {
            (false, '\u{1b}') => in_escape = true,
            (true, 'm') => in_escape = false,
            (true, _) => {}
            (false, _) => len += 1,
        }
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &str) -> Vec<String> {
        colored::control::set_override(false);
        render_markdown(text, &Palette::default())
    }

    #[test]
    fn test_heading_and_paragraph() {
        let lines = plain("# Title\n\nSome **bold** and `code`.");
        assert_eq!(lines, vec!["Title", "", "Some bold and code."]);
    }

    #[test]
    fn test_lists() {
        let lines = plain("- one\n- two\n  - nested\n\n3. three\n4. four");
        assert_eq!(
            lines,
            vec!["• one", "• two", "  • nested", "", "3. three", "4. four"]
        );
    }

    #[test]
    fn test_code_block_keeps_content() {
        let lines = plain("```rust\nfn main() {}\n```");
        assert_eq!(lines, vec!["```rust", "  fn main() {}", "```"]);
    }

    #[test]
    fn test_link_shows_url() {
        let lines = plain("[docs](https://example.com)");
        assert_eq!(lines, vec!["docs (https://example.com)"]);
    }

    #[test]
    fn test_table_columns_align() {
        let lines = plain("| a | long |\n|---|---|\n| xyz | b |");
        assert_eq!(lines[0], "a   │ long");
        assert_eq!(lines[2], "xyz │ b   ");
    }

    #[test]
    fn test_visible_len_skips_escapes() {
        assert_eq!(visible_len("\u{1b}[1mab\u{1b}[0m"), 2);
    }
}
