//! Console panels

use std::io::{self, Write};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const MIN_WIDTH: usize = 40;
const MAX_WIDTH: usize = 100;

pub const GOODBYE_TEXT: &str = "👋 Goodbye! Thanks for using Strands.";

/// Terminal columns taken by `s`
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Greedy word wrap to `width` columns. Words wider than a line are split.
pub fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    if display_width(line) <= width {
        return vec![line.to_string()];
    }

    let mut rows = Vec::new();
    let mut current = String::new();
    let mut current_width = 0;

    for word in line.split(' ') {
        let word_width = display_width(word);
        let sep = usize::from(!current.is_empty());

        if current_width + sep + word_width <= width {
            if sep == 1 {
                current.push(' ');
            }
            current.push_str(word);
            current_width += sep + word_width;
            continue;
        }

        if !current.is_empty() {
            rows.push(std::mem::take(&mut current));
            current_width = 0;
        }

        if word_width <= width {
            current.push_str(word);
            current_width = word_width;
            continue;
        }

        for ch in word.chars() {
            let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
            if current_width + ch_width > width && !current.is_empty() {
                rows.push(std::mem::take(&mut current));
                current_width = 0;
            }
            current.push(ch);
            current_width += ch_width;
        }
    }

    if !current.is_empty() || rows.is_empty() {
        rows.push(current);
    }
    rows
}

/// Draw `body` in a rounded box, with an optional caption in the bottom edge.
///
/// Lines longer than the widest allowed panel are wrapped.
pub fn panel(out: &mut dyn Write, body: &str, subtitle: Option<&str>) -> io::Result<()> {
    let lines: Vec<String> = body
        .lines()
        .flat_map(|line| wrap_line(line, MAX_WIDTH))
        .collect();
    let caption = subtitle.map(|s| format!(" {} ", s));

    let content_width = lines.iter().map(|l| display_width(l)).max().unwrap_or(0);
    let caption_width = caption.as_deref().map(display_width).unwrap_or(0) + 2;
    let width = content_width
        .max(caption_width)
        .clamp(MIN_WIDTH, MAX_WIDTH);

    writeln!(out, "╭{}╮", "─".repeat(width + 2))?;
    for line in &lines {
        let pad = width.saturating_sub(display_width(line));
        writeln!(out, "│ {}{} │", line, " ".repeat(pad))?;
    }
    match caption {
        Some(caption) => {
            let rest = (width + 2).saturating_sub(display_width(&caption) + 1);
            writeln!(out, "╰─{}{}╯", caption, "─".repeat(rest))?;
        }
        None => writeln!(out, "╰{}╯", "─".repeat(width + 2))?,
    }
    Ok(())
}

pub fn render_welcome_message(out: &mut dyn Write, welcome_text: &str) -> io::Result<()> {
    panel(out, welcome_text.trim_end(), Some("Strands Agents"))?;
    writeln!(out)
}

pub fn render_goodbye_message(out: &mut dyn Write) -> io::Result<()> {
    writeln!(out)?;
    panel(out, GOODBYE_TEXT, None)
}
