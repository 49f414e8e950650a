//! Markdown rendering for agent replies.
//!
//! Reader operations return markdown. On a terminal it is styled with
//! `console`; anywhere else it is printed as written.

use console::{Style, Term};
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag};

/// Turns markdown into text for display.
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, markdown: &str) -> String;
}

/// Passes markdown through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainRenderer;

impl MarkdownRenderer for PlainRenderer {
    fn render(&self, markdown: &str) -> String {
        markdown.to_string()
    }
}

/// Styles headings, emphasis, lists, quotes, links and code.
#[derive(Debug, Clone, Copy)]
pub struct TerminalRenderer {
    styled: bool,
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalRenderer {
    /// Styles output only when stdout is a terminal.
    pub fn new() -> Self {
        Self {
            styled: Term::stdout().is_term(),
        }
    }

    /// Forces styling on or off.
    pub fn with_styling(styled: bool) -> Self {
        Self { styled }
    }

    pub fn is_styled(&self) -> bool {
        self.styled
    }
}

impl MarkdownRenderer for TerminalRenderer {
    fn render(&self, markdown: &str) -> String {
        if !self.styled {
            return markdown.to_string();
        }

        let mut writer = StyledWriter::default();
        for event in Parser::new(markdown) {
            writer.event(event);
        }
        writer.finish()
    }
}

/// An open markdown element.
#[derive(Debug)]
enum Frame {
    Heading(HeadingLevel),
    Paragraph,
    Emphasis,
    Strong,
    Quote,
    List,
    Item,
    CodeBlock,
    Link { url: String, text: String },
    Other,
}

/// Accumulates styled output from parser events.
#[derive(Debug, Default)]
struct StyledWriter {
    out: String,
    stack: Vec<Frame>,
    /// Next number of each open list; `None` for bullet lists.
    lists: Vec<Option<u64>>,
}

fn paint(style: Style, text: &str) -> String {
    style.force_styling(true).apply_to(text).to_string()
}

impl StyledWriter {
    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(_) => self.end(),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => {
                self.start_line();
                self.out.push_str(&paint(Style::new().yellow(), &code));
                self.link_text(&code);
            }
            Event::Html(html) | Event::InlineHtml(html) => self.out.push_str(&html),
            Event::SoftBreak | Event::HardBreak => self.newline(),
            Event::Rule => {
                self.blank_line();
                self.start_line();
                self.out.push_str(&paint(Style::new().dim(), "────────"));
                self.newline();
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        let frame = match tag {
            Tag::Heading { level, .. } => {
                self.blank_line();
                Frame::Heading(level)
            }
            Tag::Paragraph => {
                // paragraphs of a loose list item start on the bullet line
                if !matches!(self.stack.last(), Some(Frame::Item)) {
                    self.blank_line();
                }
                Frame::Paragraph
            }
            Tag::Emphasis => Frame::Emphasis,
            Tag::Strong => Frame::Strong,
            Tag::BlockQuote(_) => {
                self.blank_line();
                Frame::Quote
            }
            Tag::List(first) => {
                if self.lists.is_empty() {
                    self.blank_line();
                } else {
                    self.newline();
                }
                self.lists.push(first);
                Frame::List
            }
            Tag::Item => {
                self.newline();
                self.start_line();
                let depth = self.lists.len().saturating_sub(1);
                self.out.push_str(&"  ".repeat(depth));
                let marker = match self.lists.last_mut() {
                    Some(Some(next)) => {
                        let marker = format!("{next}.");
                        *next += 1;
                        marker
                    }
                    _ => "•".to_string(),
                };
                self.out.push_str(&paint(Style::new().cyan(), &marker));
                self.out.push(' ');
                Frame::Item
            }
            Tag::CodeBlock(_) => {
                self.blank_line();
                Frame::CodeBlock
            }
            Tag::Link { dest_url, .. } => Frame::Link {
                url: dest_url.to_string(),
                text: String::new(),
            },
            _ => Frame::Other,
        };
        self.stack.push(frame);
    }

    fn end(&mut self) {
        match self.stack.pop() {
            Some(Frame::Heading(_) | Frame::Paragraph | Frame::Item) => self.newline(),
            Some(Frame::List) => {
                self.lists.pop();
            }
            Some(Frame::Link { url, text }) if !url.is_empty() && url != text => {
                self.out.push_str(&paint(Style::new().dim(), &format!(" ({url})")));
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if matches!(self.stack.last(), Some(Frame::CodeBlock)) {
            for line in text.lines() {
                self.start_line();
                self.out.push_str("    ");
                self.out.push_str(&paint(Style::new().green(), line));
                self.out.push('\n');
            }
            return;
        }

        self.start_line();
        match self.inline_style() {
            Some(style) => self.out.push_str(&paint(style, text)),
            None => self.out.push_str(text),
        }
        self.link_text(text);
    }

    fn link_text(&mut self, text: &str) {
        let link = self.stack.iter_mut().rev().find_map(|frame| match frame {
            Frame::Link { text: buf, .. } => Some(buf),
            _ => None,
        });
        if let Some(link) = link {
            link.push_str(text);
        }
    }

    /// Combined style of the open inline elements; `None` for plain text.
    fn inline_style(&self) -> Option<Style> {
        self.stack.iter().fold(None, |style: Option<Style>, frame| {
            let apply: fn(Style) -> Style = match frame {
                Frame::Heading(HeadingLevel::H1) => |s| s.bold().underlined().cyan(),
                Frame::Heading(HeadingLevel::H2) => |s| s.bold().cyan(),
                Frame::Heading(_) | Frame::Strong => |s| s.bold(),
                Frame::Emphasis | Frame::Quote => |s| s.italic(),
                Frame::Link { .. } => |s| s.underlined().blue(),
                _ => return style,
            };
            Some(apply(style.unwrap_or_else(Style::new)))
        })
    }

    fn quote_depth(&self) -> usize {
        self.stack
            .iter()
            .filter(|frame| matches!(frame, Frame::Quote))
            .count()
    }

    /// Writes the quote bars when at the start of a line.
    fn start_line(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            return;
        }
        let bar = paint(Style::new().dim(), "│ ");
        for _ in 0..self.quote_depth() {
            self.out.push_str(&bar);
        }
    }

    fn newline(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn blank_line(&mut self) {
        self.newline();
        if !self.out.is_empty() && !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }

    fn finish(mut self) -> String {
        let len = self.out.trim_end_matches('\n').len();
        self.out.truncate(len);
        self.out
    }
}
