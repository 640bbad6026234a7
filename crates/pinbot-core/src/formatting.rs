//! Formatting utilities (reports and replies as Telegram HTML).

use crate::{
    domain::{MatchMode, PostalCode, ServiceabilityReport},
    exclusion::{SourceKind, SourceStats},
};

pub const WELCOME_TEXT: &str = "📮 Welcome!\n\nSend a 6-digit PIN code (e.g. 110086)";

pub const HELP_TEXT: &str = "📮 <b>PIN code delivery check</b>\n\n\
Send a 6-digit PIN code to see which areas under it can receive delivery.\n\n\
/start - welcome message\n\
/help - this message\n\
/sources - health of the exclusion feeds";

pub const INVALID_INPUT_TEXT: &str = "❌ Please send a valid 6-digit PIN code";

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn not_found_html(code: &PostalCode) -> String {
    format!("❌ PIN code <code>{}</code> not found", escape_html(code.as_str()))
}

fn bullet_list(areas: &[String]) -> String {
    if areas.is_empty() {
        return "• none".to_string();
    }
    areas
        .iter()
        .map(|a| {
            if a.is_empty() {
                "• <i>(unnamed area)</i>".to_string()
            } else {
                format!("• {}", escape_html(a))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a report for the chat.
pub fn report_html(report: &ServiceabilityReport) -> String {
    let delivery = if report.overall_deliverable {
        "✅ Delivery Available"
    } else if report.hard_blocked {
        "❌ Delivery Not Available (PIN code cannot be processed)"
    } else {
        "❌ Delivery Not Available"
    };

    let mut out = String::new();
    out.push_str("✅ <b>PIN Code Found</b>\n\n");
    out.push_str(&format!(
        "📮 <b>PIN Code:</b> {}\n",
        escape_html(report.postal_code.as_str())
    ));
    out.push_str(&format!(
        "🟢 <b>Serviceable areas:</b>\n{}\n",
        bullet_list(&report.serviceable_areas)
    ));
    out.push_str(&format!(
        "🔴 <b>Non-serviceable areas:</b>\n{}\n\n",
        bullet_list(&report.non_serviceable_areas)
    ));
    out.push_str(&format!("🏙 <b>City:</b> {}\n", escape_html(&report.city)));
    out.push_str(&format!("🗺 <b>State:</b> {}\n", escape_html(&report.state)));
    out.push_str(&format!("📦 <b>Delivery:</b> {delivery}"));
    out
}

/// Render per-feed health counters.
pub fn source_stats_html(stats: &[SourceStats]) -> String {
    if stats.is_empty() {
        return "No exclusion sources configured.".to_string();
    }

    let mut out = String::from("📊 <b>Exclusion sources</b>\n");
    for s in stats {
        let kind = match s.kind {
            SourceKind::Exclusion(MatchMode::CodeAndArea) => "areas",
            SourceKind::Exclusion(MatchMode::CodeOnly) => "codes",
            SourceKind::HardBlock => "hard block",
        };
        out.push_str(&format!(
            "\n<code>{}</code> ({kind}): {} queries, {} failed, {} timed out",
            escape_html(&s.id),
            s.queries,
            s.failures,
            s.timeouts
        ));
    }
    out
}

/// Split a message on line boundaries so each chunk stays within `limit` bytes.
///
/// Every tag this module emits opens and closes on one line, so line splits never
/// break markup. A line longer than `limit` is cut between characters, never
/// inside an entity (`&amp;`), a tag, or an open `<b>...</b>` pair. When the
/// first such unit on a line is itself wider than `limit`, it is emitted whole,
/// so a chunk may exceed a very small `limit`.
pub fn split_message(html: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if html.len() <= limit {
        return vec![html.to_string()];
    }

    let mut out = Vec::new();
    let mut chunk = String::new();
    for line in html.split('\n') {
        let mut line = line;
        while line.len() > limit {
            let cut = safe_cut(line, limit);
            if !chunk.is_empty() {
                out.push(std::mem::take(&mut chunk));
            }
            out.push(line[..cut].to_string());
            line = &line[cut..];
        }

        let needed = if chunk.is_empty() {
            line.len()
        } else {
            chunk.len() + 1 + line.len()
        };
        if needed > limit && !chunk.is_empty() {
            out.push(std::mem::take(&mut chunk));
        }
        if !chunk.is_empty() {
            chunk.push('\n');
        }
        chunk.push_str(line);
    }
    if !chunk.is_empty() {
        out.push(chunk);
    }
    out
}

/// Byte offset (always > 0 for a non-empty line) where `line` can be cut
/// without splitting a char, an entity, a tag, or an open tag pair.
fn safe_cut(line: &str, limit: usize) -> usize {
    let mut depth = 0usize;
    let mut last_safe = 0usize;
    let mut i = 0usize;

    while i < line.len() {
        let rest = &line[i..];
        let end = if rest.starts_with('<') {
            rest.find('>').map(|p| i + p + 1).unwrap_or(line.len())
        } else if rest.starts_with('&') {
            rest.find(';')
                .filter(|p| *p <= 8)
                .map(|p| i + p + 1)
                .unwrap_or(i + 1)
        } else {
            i + rest.chars().next().map(char::len_utf8).unwrap_or(1)
        };

        if end > limit && last_safe > 0 {
            return last_safe;
        }

        let unit = &line[i..end];
        if unit.starts_with("</") {
            depth = depth.saturating_sub(1);
        } else if unit.starts_with('<') && !unit.ends_with("/>") {
            depth += 1;
        }

        i = end;
        if depth == 0 {
            last_safe = i;
            if i >= limit {
                return i;
            }
        }
    }
    line.len()
}
