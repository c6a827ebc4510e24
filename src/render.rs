//! Reply classification and terminal rendering.
//!
//! A reply is shown one of three ways: a reply that is exactly one fenced
//! code block is syntax highlighted with line numbers, anything else is
//! rendered as markdown, and if either of those fails the raw text is
//! printed unchanged.

use std::io::{self, Stdout, Write};
use std::sync::OnceLock;

use markdown::{ParseOptions, mdast, to_mdast};
use regex::Regex;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Style as SyntectStyle, Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::{LinesWithEndings, as_24_bit_terminal_escaped};
use unicode_width::UnicodeWidthChar;

use crate::observability::RENDER_FALLBACKS;

/// ANSI escape code for bold text.
const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_BOLD_OFF: &str = "\x1b[22m";

/// ANSI escape code for dim text (gutters, borders, link targets).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for italic text.
const ANSI_ITALIC: &str = "\x1b[3m";
const ANSI_ITALIC_OFF: &str = "\x1b[23m";

const ANSI_UNDERLINE: &str = "\x1b[4m";
const ANSI_UNDERLINE_OFF: &str = "\x1b[24m";
const ANSI_STRIKE: &str = "\x1b[9m";
const ANSI_STRIKE_OFF: &str = "\x1b[29m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";
const ANSI_FG_DEFAULT: &str = "\x1b[39m";

const ANSI_RED: &str = "\x1b[31m";
const ANSI_YELLOW: &str = "\x1b[33m";
const ANSI_BLUE: &str = "\x1b[34m";
const ANSI_CYAN: &str = "\x1b[36m";

/// Theme for a reply that is a single code block.
const CODE_THEME: &str = "Solarized (dark)";
/// Theme for code blocks embedded in markdown.
const MARKDOWN_CODE_THEME: &str = "base16-mocha.dark";

/// Width used when none is configured.
pub const DEFAULT_WIDTH: usize = 100;

///////////////////////////////////////// Classification /////////////////////////////////////////

/// How a reply should be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyKind<'a> {
    /// Nothing but whitespace.
    Empty,
    /// The whole reply is one fenced code block.
    CodeBlock {
        /// The fence's language tag, lowercased.
        language: Option<String>,
        /// The code between the fences.
        body: &'a str,
    },
    /// Anything else; rendered as markdown.
    Formatted(&'a str),
}

fn single_fence() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)\A```([\w+#.-]*)[ \t]*\n(.*?)\n?```\z").ok())
        .as_ref()
}

/// Decides how to render `text`.
pub fn classify(text: &str) -> ReplyKind<'_> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ReplyKind::Empty;
    }
    if let Some(captures) = single_fence().and_then(|fence| fence.captures(trimmed)) {
        let body = captures.get(2).map_or("", |m| m.as_str());
        let nested_fence = body
            .lines()
            .any(|line| line.trim_start().starts_with("```"));
        if !nested_fence {
            let language = captures
                .get(1)
                .map(|m| m.as_str())
                .filter(|lang| !lang.is_empty())
                .map(str::to_lowercase);
            let body = body.trim_start_matches(['\n', '\r']).trim_end();
            return ReplyKind::CodeBlock { language, body };
        }
    }
    ReplyKind::Formatted(text)
}

///////////////////////////////////////// Renderer /////////////////////////////////////////

/// Trait for rendering chat output.
///
/// This abstraction allows for different rendering strategies:
/// - ANSI-styled terminal output
/// - Plain text without styling (for piping/redirecting)
/// - Capturing output in tests
pub trait Renderer: Send {
    /// Print the label that introduces a reply.
    fn start_reply(&mut self);

    /// Print a model reply using the mode chosen by [`classify`].
    fn print_reply(&mut self, text: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an error message followed by dimmed diagnostic detail.
    fn print_error_detail(&mut self, error: &str, detail: &str) {
        self.print_error(error);
        self.print_info(detail);
    }

    /// Print a warning.
    fn print_warning(&mut self, warning: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);
}

/// Renderer for an ANSI terminal (or any writer).
pub struct TerminalRenderer<W: Write + Send> {
    out: W,
    use_color: bool,
    width: usize,
}

impl TerminalRenderer<Stdout> {
    /// Creates a renderer writing to stdout.
    pub fn stdout(use_color: bool, width: usize) -> Self {
        Self::new(io::stdout(), use_color, width)
    }
}

impl<W: Write + Send> TerminalRenderer<W> {
    /// Creates a renderer writing to `out`.
    pub fn new(out: W, use_color: bool, width: usize) -> Self {
        Self {
            out,
            use_color,
            width: width.max(20),
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, line: &str) {
        let _ = writeln!(self.out, "{line}");
        let _ = self.out.flush();
    }

    fn labelled(&self, color: &str, label: &str, message: &str) -> String {
        if self.use_color {
            format!("{ANSI_BOLD}{color}{label}{ANSI_RESET} {message}")
        } else {
            format!("{label} {message}")
        }
    }

    fn render(&self, text: &str) -> Result<String, RenderFailure> {
        match classify(text) {
            ReplyKind::Empty => Ok(String::new()),
            ReplyKind::CodeBlock { language, body } => {
                render_code(body, language.as_deref(), self.use_color, self.width)
            }
            ReplyKind::Formatted(text) => render_markdown(text, self.use_color, self.width),
        }
    }
}

impl<W: Write + Send> Renderer for TerminalRenderer<W> {
    fn start_reply(&mut self) {
        let label = if self.use_color {
            format!("\n{ANSI_BOLD}{ANSI_BLUE}AI >>>:{ANSI_RESET}")
        } else {
            "\nAI >>>:".to_string()
        };
        self.write_line(&label);
    }

    fn print_reply(&mut self, text: &str) {
        if matches!(classify(text), ReplyKind::Empty) {
            self.print_warning("Empty response.");
            return;
        }
        let rendered = rendered_or_raw(self.render(text), text);
        self.write_line(&rendered);
    }

    fn print_error(&mut self, error: &str) {
        let line = self.labelled(ANSI_RED, "Error:", error);
        self.write_line(&line);
    }

    fn print_error_detail(&mut self, error: &str, detail: &str) {
        self.print_error(error);
        if self.use_color {
            self.write_line(&format!("{ANSI_DIM}{detail}{ANSI_RESET}"));
        } else {
            self.write_line(detail);
        }
    }

    fn print_warning(&mut self, warning: &str) {
        let line = self.labelled(ANSI_YELLOW, "Warning:", warning);
        self.write_line(&line);
    }

    fn print_info(&mut self, info: &str) {
        self.write_line(info);
    }
}

/// A structural failure while formatting; the caller falls back to raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenderFailure {
    Markdown,
    Highlight,
    Theme,
}

/// The rendered text, or `raw` untouched if rendering failed.
fn rendered_or_raw(result: Result<String, RenderFailure>, raw: &str) -> String {
    match result {
        Ok(rendered) => rendered.trim_end_matches('\n').to_string(),
        Err(_) => {
            RENDER_FALLBACKS.click();
            raw.to_string()
        }
    }
}

///////////////////////////////////////// Highlighting /////////////////////////////////////////

struct SyntaxAssets {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
}

fn assets() -> &'static SyntaxAssets {
    static ASSETS: OnceLock<SyntaxAssets> = OnceLock::new();
    ASSETS.get_or_init(|| SyntaxAssets {
        syntax_set: SyntaxSet::load_defaults_newlines(),
        theme_set: ThemeSet::load_defaults(),
    })
}

fn find_syntax<'a>(syntax_set: &'a SyntaxSet, language: Option<&str>) -> &'a SyntaxReference {
    language
        .and_then(|lang| {
            syntax_set
                .find_syntax_by_token(lang)
                .or_else(|| syntax_set.find_syntax_by_extension(lang))
        })
        .unwrap_or_else(|| syntax_set.find_syntax_plain_text())
}

fn theme(name: &str) -> Result<&'static Theme, RenderFailure> {
    assets().theme_set.themes.get(name).ok_or(RenderFailure::Theme)
}

type StyledLine = Vec<(SyntectStyle, String)>;

/// Highlights `code` line by line.  Returned lines carry no newline.
fn highlight(
    code: &str,
    language: Option<&str>,
    theme_name: &str,
) -> Result<Vec<StyledLine>, RenderFailure> {
    let assets = assets();
    let syntax = find_syntax(&assets.syntax_set, language);
    let mut highlighter = HighlightLines::new(syntax, theme(theme_name)?);
    let mut lines = Vec::new();
    for line in LinesWithEndings::from(code) {
        let ranges = highlighter
            .highlight_line(line, &assets.syntax_set)
            .map_err(|_| RenderFailure::Highlight)?;
        let styled: StyledLine = ranges
            .into_iter()
            .map(|(style, text)| (style, text.trim_end_matches(['\n', '\r']).to_string()))
            .filter(|(_, text)| !text.is_empty())
            .collect();
        lines.push(styled);
    }
    if lines.is_empty() {
        lines.push(Vec::new());
    }
    Ok(lines)
}

fn escape(line: &[(SyntectStyle, String)]) -> String {
    if line.is_empty() {
        return String::new();
    }
    let ranges: Vec<(SyntectStyle, &str)> = line
        .iter()
        .map(|(style, text)| (*style, text.as_str()))
        .collect();
    format!("{}{ANSI_RESET}", as_24_bit_terminal_escaped(&ranges, false))
}

/// Splits a styled line into chunks no wider than `width` columns.
fn wrap_styled(line: &[(SyntectStyle, String)], width: usize) -> Vec<StyledLine> {
    let width = width.max(1);
    let mut chunks = vec![Vec::new()];
    let mut used = 0usize;
    for (style, text) in line {
        let mut piece = String::new();
        for c in text.chars() {
            let w = c.width().unwrap_or(0);
            if used + w > width && used > 0 {
                if !piece.is_empty() {
                    if let Some(chunk) = chunks.last_mut() {
                        chunk.push((*style, std::mem::take(&mut piece)));
                    }
                }
                chunks.push(Vec::new());
                used = 0;
            }
            piece.push(c);
            used += w;
        }
        if !piece.is_empty()
            && let Some(chunk) = chunks.last_mut()
        {
            chunk.push((*style, piece));
        }
    }
    chunks
}

fn plain(line: &[(SyntectStyle, String)]) -> String {
    line.iter().map(|(_, text)| text.as_str()).collect()
}

/// Renders a code block with a line-number gutter, soft-wrapped to `width`.
fn render_code(
    body: &str,
    language: Option<&str>,
    use_color: bool,
    width: usize,
) -> Result<String, RenderFailure> {
    let lines = highlight(body, language, CODE_THEME)?;
    let digits = lines.len().to_string().len();
    let content_width = width.saturating_sub(digits + 3).max(10);
    let mut out = String::new();
    for (idx, line) in lines.iter().enumerate() {
        for (part, chunk) in wrap_styled(line, content_width).iter().enumerate() {
            let number = if part == 0 {
                format!("{:>digits$}", idx + 1)
            } else {
                " ".repeat(digits)
            };
            if use_color {
                out.push_str(&format!("{ANSI_DIM}{number} │{ANSI_RESET} {}", escape(chunk)));
            } else {
                out.push_str(&format!("{number} │ {}", plain(chunk)));
            }
            out.push('\n');
        }
    }
    Ok(out)
}

///////////////////////////////////////// Markdown /////////////////////////////////////////

struct MarkdownWriter {
    use_color: bool,
    width: usize,
}

impl MarkdownWriter {
    fn paint(&self, on: &str, off: &str, text: &str) -> String {
        if self.use_color {
            format!("{on}{text}{off}")
        } else {
            text.to_string()
        }
    }

    fn inline(&self, nodes: &[mdast::Node]) -> Result<String, RenderFailure> {
        let mut out = String::new();
        for node in nodes {
            match node {
                mdast::Node::Text(text) => out.push_str(&text.value),
                mdast::Node::Strong(strong) => {
                    let content = self.inline(&strong.children)?;
                    out.push_str(&self.paint(ANSI_BOLD, ANSI_BOLD_OFF, &content));
                }
                mdast::Node::Emphasis(emphasis) => {
                    let content = self.inline(&emphasis.children)?;
                    out.push_str(&self.paint(ANSI_ITALIC, ANSI_ITALIC_OFF, &content));
                }
                mdast::Node::Delete(delete) => {
                    let content = self.inline(&delete.children)?;
                    if self.use_color {
                        out.push_str(&self.paint(ANSI_STRIKE, ANSI_STRIKE_OFF, &content));
                    } else {
                        out.push_str(&format!("~~{content}~~"));
                    }
                }
                mdast::Node::InlineCode(code) => {
                    if self.use_color {
                        out.push_str(&self.paint(ANSI_YELLOW, ANSI_FG_DEFAULT, &code.value));
                    } else {
                        out.push_str(&format!("`{}`", code.value));
                    }
                }
                mdast::Node::Link(link) => {
                    let text = self.inline(&link.children)?;
                    let label = self.paint(ANSI_UNDERLINE, ANSI_UNDERLINE_OFF, &text);
                    let label = self.paint(ANSI_BLUE, ANSI_FG_DEFAULT, &label);
                    out.push_str(&label);
                    let href = link.url.strip_prefix("mailto:").unwrap_or(&link.url);
                    if plain_text(&link.children) != href {
                        let url = format!(" ({})", link.url);
                        out.push_str(&self.paint(ANSI_DIM, ANSI_BOLD_OFF, &url));
                    }
                }
                mdast::Node::LinkReference(link) => out.push_str(&self.inline(&link.children)?),
                mdast::Node::Image(image) => {
                    let alt = if image.alt.is_empty() {
                        image.url.as_str()
                    } else {
                        image.alt.as_str()
                    };
                    out.push_str(&format!("[image: {alt}]"));
                }
                mdast::Node::Break(_) => out.push('\n'),
                mdast::Node::Html(html) => out.push_str(&html.value),
                mdast::Node::InlineMath(math) => out.push_str(&math.value),
                mdast::Node::Paragraph(paragraph) => out.push_str(&self.inline(&paragraph.children)?),
                _ => out.push_str(&plain_text(std::slice::from_ref(node))),
            }
        }
        Ok(out)
    }

    fn code_block(&self, code: &mdast::Code) -> Result<Vec<String>, RenderFailure> {
        let lang = code.lang.as_deref().map(str::to_lowercase);
        let fence = format!("```{}", lang.as_deref().unwrap_or(""));
        let mut lines = vec![self.paint(ANSI_DIM, ANSI_RESET, &fence)];
        if self.use_color {
            for line in highlight(&code.value, lang.as_deref(), MARKDOWN_CODE_THEME)? {
                lines.push(format!("  {}", escape(&line)));
            }
        } else {
            for line in code.value.split('\n') {
                lines.push(format!("  {line}"));
            }
        }
        lines.push(self.paint(ANSI_DIM, ANSI_RESET, "```"));
        Ok(lines)
    }

    fn list(&self, list: &mdast::List, depth: usize) -> Result<Vec<String>, RenderFailure> {
        let indent = "  ".repeat(depth);
        let start = list.start.unwrap_or(1);
        let mut lines = Vec::new();
        for (i, node) in list.children.iter().enumerate() {
            let mdast::Node::ListItem(item) = node else {
                continue;
            };
            let mut bullet = if list.ordered {
                format!("{}.", start + i as u32)
            } else {
                "•".to_string()
            };
            match item.checked {
                Some(true) => bullet.push_str(" [x]"),
                Some(false) => bullet.push_str(" [ ]"),
                None => {}
            }
            let bullet = self.paint(ANSI_CYAN, ANSI_FG_DEFAULT, &bullet);
            let mut first = true;
            for child in &item.children {
                let child_lines = match child {
                    mdast::Node::List(nested) => self.list(nested, depth + 1)?,
                    other => self.block(other, depth + 1)?,
                };
                for line in child_lines {
                    if first && !matches!(child, mdast::Node::List(_)) {
                        lines.push(format!("{indent}{bullet} {line}"));
                    } else if matches!(child, mdast::Node::List(_)) {
                        lines.push(line);
                    } else {
                        lines.push(format!("{indent}  {line}"));
                    }
                    first = false;
                }
            }
            if first {
                lines.push(format!("{indent}{bullet}"));
            }
        }
        Ok(lines)
    }

    fn table(&self, table: &mdast::Table) -> Result<Vec<String>, RenderFailure> {
        let mut rows = Vec::new();
        for row in &table.children {
            let mdast::Node::TableRow(row) = row else {
                continue;
            };
            let mut cells = Vec::new();
            for cell in &row.children {
                let mdast::Node::TableCell(cell) = cell else {
                    continue;
                };
                cells.push(self.inline(&cell.children)?);
            }
            rows.push(cells);
        }
        let separator = self.paint(ANSI_DIM, ANSI_BOLD_OFF, " │ ");
        let mut lines = Vec::new();
        for (idx, cells) in rows.iter().enumerate() {
            let line = cells.join(&separator);
            if idx == 0 {
                lines.push(self.paint(ANSI_BOLD, ANSI_BOLD_OFF, &line));
            } else {
                lines.push(line);
            }
        }
        Ok(lines)
    }

    fn block(&self, node: &mdast::Node, depth: usize) -> Result<Vec<String>, RenderFailure> {
        let lines = match node {
            mdast::Node::Heading(heading) => {
                let text = self.inline(&heading.children)?;
                if self.use_color {
                    let text = if heading.depth == 1 {
                        format!("{ANSI_UNDERLINE}{text}")
                    } else {
                        text
                    };
                    vec![format!("{ANSI_BOLD}{ANSI_CYAN}{text}{ANSI_RESET}")]
                } else {
                    vec![format!("{} {text}", "#".repeat(heading.depth as usize))]
                }
            }
            mdast::Node::Paragraph(paragraph) => self
                .inline(&paragraph.children)?
                .split('\n')
                .map(str::to_string)
                .collect(),
            mdast::Node::Code(code) => self.code_block(code)?,
            mdast::Node::List(list) => self.list(list, depth)?,
            mdast::Node::Blockquote(quote) => {
                let mut lines = Vec::new();
                for child in &quote.children {
                    lines.extend(self.block(child, depth)?);
                }
                let border = self.paint(ANSI_DIM, ANSI_BOLD_OFF, "│");
                lines
                    .into_iter()
                    .map(|line| format!("{border} {}", self.paint(ANSI_ITALIC, ANSI_ITALIC_OFF, &line)))
                    .collect()
            }
            mdast::Node::ThematicBreak(_) => {
                vec![self.paint(ANSI_DIM, ANSI_BOLD_OFF, &"─".repeat(self.width.min(80)))]
            }
            mdast::Node::Table(table) => self.table(table)?,
            mdast::Node::Html(html) => html.value.lines().map(str::to_string).collect(),
            mdast::Node::Math(math) => math.value.lines().map(|l| format!("  {l}")).collect(),
            mdast::Node::Definition(_) => Vec::new(),
            other => {
                let text = self.inline(std::slice::from_ref(other))?;
                text.split('\n').map(str::to_string).collect()
            }
        };
        Ok(lines)
    }

    fn document(&self, root: &mdast::Node) -> Result<String, RenderFailure> {
        let children = match root {
            mdast::Node::Root(root) => root.children.as_slice(),
            other => std::slice::from_ref(other),
        };
        let mut blocks = Vec::new();
        for child in children {
            let lines = self.block(child, 0)?;
            if !lines.is_empty() {
                blocks.push(lines.join("\n"));
            }
        }
        Ok(blocks.join("\n\n"))
    }
}

fn plain_text(nodes: &[mdast::Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            mdast::Node::Text(text) => out.push_str(&text.value),
            mdast::Node::InlineCode(code) => out.push_str(&code.value),
            mdast::Node::Code(code) => out.push_str(&code.value),
            mdast::Node::Html(html) => out.push_str(&html.value),
            other => {
                if let Some(children) = other.children() {
                    out.push_str(&plain_text(children));
                }
            }
        }
    }
    out
}

/// Renders markdown `text` for a terminal.
fn render_markdown(text: &str, use_color: bool, width: usize) -> Result<String, RenderFailure> {
    let root = to_mdast(text, &ParseOptions::gfm()).map_err(|_| RenderFailure::Markdown)?;
    MarkdownWriter { use_color, width }.document(&root)
}
