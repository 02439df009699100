//! Typeset document model produced by the conversion pipeline.
//!
//! These are the finished, immutable elements handed to the output side once
//! their closing markup event has been processed: paragraphs of styled text
//! runs, lists, tables with a rectangular cell grid, and placed images.

/// Horizontal alignment of a block or table cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HorizontalAlign {
    /// No explicit alignment requested; renderer default applies.
    #[default]
    Undefined,
    Left,
    Center,
    Right,
    Justified,
}

/// Vertical alignment of a table cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VerticalAlign {
    Top,
    #[default]
    Middle,
    Bottom,
}

/// Resolved text/paragraph direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    LeftToRight,
    RightToLeft,
    /// Explicit `auto`: renderer picks the default rendering direction.
    Auto,
    /// Nothing resolved anywhere in the chain; no bidi override is applied.
    #[default]
    Unset,
}

/// Sub/superscript position of a text run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScriptPosition {
    #[default]
    Normal,
    Superscript,
    Subscript,
}

/// Character style resolved through the cascade for one text run.
#[derive(Clone, Debug, PartialEq)]
pub struct TextStyle {
    /// Resolved font family, when one was requested and registered.
    pub family: Option<String>,
    /// Absolute size in points.
    pub size_pt: f32,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    pub script: ScriptPosition,
    /// Raw color token as written in the source (`#rrggbb`, named, ...).
    pub color: Option<String>,
    /// Link target when the run sits inside an anchor with an href.
    pub link: Option<String>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            family: None,
            size_pt: 12.0,
            bold: false,
            italic: false,
            underline: false,
            strike: false,
            script: ScriptPosition::Normal,
            color: None,
            link: None,
        }
    }
}

/// A run of text sharing one resolved style.
#[derive(Clone, Debug, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub style: TextStyle,
}

/// A finished paragraph of styled runs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Paragraph {
    pub runs: Vec<TextRun>,
    pub alignment: HorizontalAlign,
    /// Left indentation in points.
    pub indent_left: f32,
    /// Right indentation in points.
    pub indent_right: f32,
    /// Vertical space before the paragraph, after margin collapsing.
    pub spacing_before: f32,
    /// Vertical space after the paragraph.
    pub spacing_after: f32,
    pub direction: Direction,
    /// Local destination name set by an enclosing named anchor.
    pub anchor_name: Option<String>,
}

impl Paragraph {
    /// Create an empty paragraph with renderer defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the paragraph holds no runs at all.
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Concatenated text of all runs.
    pub fn text(&self) -> String {
        let mut out = String::with_capacity(16);
        for run in &self.runs {
            out.push_str(&run.text);
        }
        out
    }

    /// Whether appended text should suppress a leading collapsed space.
    pub(crate) fn ends_with_space(&self) -> bool {
        match self.runs.last() {
            Some(run) => run.text.ends_with(' ') || run.text.ends_with('\n'),
            None => true,
        }
    }
}

/// One item of a finished list; may itself contain nested block elements.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListItem {
    pub content: Vec<DocElement>,
}

impl ListItem {
    /// Concatenated text of all paragraph content, for symbol-free consumers.
    pub fn text(&self) -> String {
        let mut out = String::with_capacity(16);
        for element in &self.content {
            if let DocElement::Paragraph(p) = element {
                out.push_str(&p.text());
            }
        }
        out
    }
}

/// A finished ordered or unordered list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocList {
    pub ordered: bool,
    /// Explicit indentation in points; `None` means automatic indentation.
    pub indentation: Option<f32>,
    pub items: Vec<ListItem>,
}

/// Width request for a table or cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WidthSpec {
    /// Percentage of the available width.
    Percent(f32),
    /// Fixed width in points.
    Absolute(f32),
}

impl Default for WidthSpec {
    fn default() -> Self {
        WidthSpec::Percent(100.0)
    }
}

/// A finished table cell.
#[derive(Clone, Debug, PartialEq)]
pub struct TableCell {
    pub colspan: u32,
    pub rowspan: u32,
    pub horizontal_align: HorizontalAlign,
    pub vertical_align: VerticalAlign,
    /// Explicit cell width, when declared.
    pub width: Option<WidthSpec>,
    /// Border width in points, when declared on the cell or inherited.
    pub border_width: Option<f32>,
    /// Cell padding in points, when declared.
    pub padding: Option<f32>,
    /// Raw background color token.
    pub background_color: Option<String>,
    /// True for `th` cells.
    pub header: bool,
    pub content: Vec<DocElement>,
}

impl Default for TableCell {
    fn default() -> Self {
        Self {
            colspan: 1,
            rowspan: 1,
            horizontal_align: HorizontalAlign::Undefined,
            vertical_align: VerticalAlign::Middle,
            width: None,
            border_width: None,
            padding: None,
            background_color: None,
            header: false,
            content: Vec::with_capacity(0),
        }
    }
}

impl TableCell {
    /// Concatenated text of all paragraph content.
    pub fn text(&self) -> String {
        let mut out = String::with_capacity(16);
        for element in &self.content {
            if let DocElement::Paragraph(p) = element {
                out.push_str(&p.text());
            }
        }
        out
    }
}

/// One finished table row, cells in source (left-to-right) order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

/// A finished table grid.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocTable {
    pub rows: Vec<TableRow>,
    /// Sum of first-row colspans; 1 for an empty table.
    pub column_count: u32,
    pub width: WidthSpec,
    /// Border width in points declared on the table itself.
    pub border_width: Option<f32>,
}

/// A placed image element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocImage {
    /// Source reference as written in the markup.
    pub src: String,
    /// Alternate text, empty when absent.
    pub alt: String,
    /// Decoded pixel width from the resource resolver.
    pub width_px: u32,
    /// Decoded pixel height from the resource resolver.
    pub height_px: u32,
}

/// A finished top-level or nested document element.
#[derive(Clone, Debug, PartialEq)]
pub enum DocElement {
    Paragraph(Paragraph),
    List(DocList),
    Table(DocTable),
    Image(DocImage),
}

impl DocElement {
    /// Stable kind tag, used in logs and structural guards.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Paragraph(_) => "paragraph",
            Self::List(_) => "list",
            Self::Table(_) => "table",
            Self::Image(_) => "image",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraph_text_concatenates_runs() {
        let mut p = Paragraph::new();
        p.runs.push(TextRun {
            text: "hello ".to_string(),
            style: TextStyle::default(),
        });
        p.runs.push(TextRun {
            text: "world".to_string(),
            style: TextStyle {
                bold: true,
                ..TextStyle::default()
            },
        });
        assert_eq!(p.text(), "hello world");
        assert!(!p.is_empty());
    }

    #[test]
    fn empty_paragraph_counts_as_ending_with_space() {
        let p = Paragraph::new();
        assert!(p.ends_with_space());
    }

    #[test]
    fn table_cell_defaults() {
        let cell = TableCell::default();
        assert_eq!(cell.colspan, 1);
        assert_eq!(cell.rowspan, 1);
        assert_eq!(cell.vertical_align, VerticalAlign::Middle);
        assert_eq!(cell.horizontal_align, HorizontalAlign::Undefined);
        assert!(!cell.header);
    }

    #[test]
    fn width_spec_defaults_to_full_percent() {
        assert_eq!(WidthSpec::default(), WidthSpec::Percent(100.0));
    }
}
