//! In-progress container builders held on the open-element stack.
//!
//! Each stack owner (list, list item, table, cell, anchor) gets a typed
//! builder; the stack itself is the tagged-variant [`OpenContainer`] enum so
//! structural guards can check kinds explicitly instead of downcasting.

use crate::model::{
    DocElement, DocList, DocTable, HorizontalAlign, ListItem, TableCell, TableRow, VerticalAlign,
    WidthSpec,
};

/// Table under construction.
#[derive(Clone, Debug)]
pub struct TableBuilder {
    pub width: WidthSpec,
    pub border_width: Option<f32>,
    pub rows: Vec<TableRow>,
    /// Cells of the row currently being collected, in document order.
    pub row_buffer: Vec<TableCell>,
    /// Pending-row flag of the enclosing scope, restored at table close.
    pub saved_pending_row: bool,
    /// Pending-cell flag of the enclosing scope, restored at table close.
    pub saved_pending_cell: bool,
    /// Pending-list-item flag of the enclosing scope, restored at table close.
    pub saved_pending_item: bool,
    /// Whether the enclosing pending row pushed a style scope, restored at
    /// table close.
    pub saved_row_scope: bool,
}

impl TableBuilder {
    pub fn new(width: Option<WidthSpec>, border_width: Option<f32>) -> Self {
        Self {
            width: width.unwrap_or_default(),
            border_width,
            rows: Vec::with_capacity(8),
            row_buffer: Vec::with_capacity(8),
            saved_pending_row: false,
            saved_pending_cell: false,
            saved_pending_item: false,
            saved_row_scope: false,
        }
    }

    /// Finalize the current row buffer into the row list.
    ///
    /// Cells arrive in close-event order, which for a left-to-right source is
    /// already document order, so the buffer is moved as-is; the column-order
    /// tests pin this down.
    pub fn finish_row(&mut self) {
        let cells = core::mem::take(&mut self.row_buffer);
        self.rows.push(TableRow { cells });
    }

    /// Build the finished grid. Column count is the sum of the first row's
    /// colspans; a table with no rows yields a single-column empty table.
    pub fn finish(mut self) -> DocTable {
        if !self.row_buffer.is_empty() {
            self.finish_row();
        }
        let column_count = self
            .rows
            .first()
            .map(|row| row.cells.iter().map(|c| c.colspan).sum::<u32>())
            .filter(|n| *n > 0)
            .unwrap_or(1);
        DocTable {
            rows: self.rows,
            column_count,
            width: self.width,
            border_width: self.border_width,
        }
    }
}

/// Cell under construction; seeded from the cascade at `<td>`/`<th>` open.
#[derive(Clone, Debug)]
pub struct CellBuilder {
    /// Tag this cell was opened with (`td` or `th`), used to pop its scope
    /// on implicit close.
    pub tag: String,
    pub cell: TableCell,
}

impl CellBuilder {
    pub fn new(tag: impl Into<String>, header: bool) -> Self {
        Self {
            tag: tag.into(),
            cell: TableCell {
                header,
                ..TableCell::default()
            },
        }
    }
}

/// List under construction.
#[derive(Clone, Debug)]
pub struct ListBuilder {
    pub ordered: bool,
    pub indentation: Option<f32>,
    pub items: Vec<ListItem>,
    /// `skip_text` flag of the enclosing scope, restored at list close.
    pub saved_skip_text: bool,
    /// Pending-list-item flag of the enclosing scope, restored at list
    /// close so a nested list never heal-closes its parent's item.
    pub saved_pending_item: bool,
}

impl ListBuilder {
    pub fn new(
        ordered: bool,
        indentation: Option<f32>,
        saved_skip_text: bool,
        saved_pending_item: bool,
    ) -> Self {
        Self {
            ordered,
            indentation,
            items: Vec::with_capacity(8),
            saved_skip_text,
            saved_pending_item,
        }
    }

    pub fn finish(self) -> DocList {
        DocList {
            ordered: self.ordered,
            indentation: self.indentation,
            items: self.items,
        }
    }
}

/// List item under construction.
#[derive(Clone, Debug, Default)]
pub struct ListItemBuilder {
    pub content: Vec<DocElement>,
}

impl ListItemBuilder {
    pub fn finish(self) -> ListItem {
        ListItem {
            content: self.content,
        }
    }
}

/// Anchor under construction. Runs appended while the anchor is open pick up
/// the href through the cascade scope; the builder itself carries the
/// destination name applied at close.
#[derive(Clone, Debug, Default)]
pub struct AnchorBuilder {
    pub href: Option<String>,
    pub name: Option<String>,
}

/// Tagged-variant entry of the open-element stack.
#[derive(Clone, Debug)]
pub enum OpenContainer {
    List(ListBuilder),
    ListItem(ListItemBuilder),
    Table(TableBuilder),
    Cell(CellBuilder),
    Anchor(AnchorBuilder),
}

impl OpenContainer {
    /// Stable kind tag for structural-guard logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::List(_) => "list",
            Self::ListItem(_) => "list-item",
            Self::Table(_) => "table",
            Self::Cell(_) => "cell",
            Self::Anchor(_) => "anchor",
        }
    }
}

/// Parse a `width` token into a width spec, flagging percentages.
pub fn parse_width_spec(raw: &str) -> Option<WidthSpec> {
    let raw = raw.trim();
    if let Some(stripped) = raw.strip_suffix('%') {
        return stripped.trim().parse::<f32>().ok().map(WidthSpec::Percent);
    }
    let stripped = raw.strip_suffix("pt").or_else(|| raw.strip_suffix("px"));
    stripped
        .unwrap_or(raw)
        .trim()
        .parse::<f32>()
        .ok()
        .map(WidthSpec::Absolute)
}

/// Parse an `align`/`text-align` token.
pub fn parse_horizontal_align(raw: &str) -> Option<HorizontalAlign> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "left" => Some(HorizontalAlign::Left),
        "center" | "middle" => Some(HorizontalAlign::Center),
        "right" => Some(HorizontalAlign::Right),
        "justify" | "justified" => Some(HorizontalAlign::Justified),
        _ => None,
    }
}

/// Parse a `valign` token; anything unrecognized keeps the middle default.
pub fn parse_vertical_align(raw: &str) -> Option<VerticalAlign> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "top" => Some(VerticalAlign::Top),
        "middle" | "center" => Some(VerticalAlign::Middle),
        "bottom" => Some(VerticalAlign::Bottom),
        _ => None,
    }
}

/// Parse a span count, clamping to at least 1.
pub fn parse_span(raw: &str) -> u32 {
    raw.trim().parse::<u32>().unwrap_or(1).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Paragraph, TextRun, TextStyle};

    fn text_cell(text: &str, colspan: u32) -> TableCell {
        let mut p = Paragraph::new();
        p.runs.push(TextRun {
            text: text.to_string(),
            style: TextStyle::default(),
        });
        TableCell {
            colspan,
            content: vec![DocElement::Paragraph(p)],
            ..TableCell::default()
        }
    }

    #[test]
    fn column_count_is_first_row_colspan_sum() {
        let mut builder = TableBuilder::new(None, None);
        builder.row_buffer.push(text_cell("a", 2));
        builder.row_buffer.push(text_cell("b", 1));
        builder.finish_row();
        builder.row_buffer.push(text_cell("c", 1));
        builder.finish_row();
        let table = builder.finish();
        assert_eq!(table.column_count, 3);
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn empty_table_yields_single_column() {
        let table = TableBuilder::new(None, None).finish();
        assert_eq!(table.column_count, 1);
        assert!(table.rows.is_empty());
        assert_eq!(table.width, WidthSpec::Percent(100.0));
    }

    #[test]
    fn unterminated_row_buffer_is_flushed_at_finish() {
        let mut builder = TableBuilder::new(None, None);
        builder.row_buffer.push(text_cell("a", 1));
        let table = builder.finish();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.column_count, 1);
    }

    #[test]
    fn row_cells_keep_document_order() {
        let mut builder = TableBuilder::new(None, None);
        builder.row_buffer.push(text_cell("first", 1));
        builder.row_buffer.push(text_cell("second", 1));
        builder.finish_row();
        let table = builder.finish();
        assert_eq!(table.rows[0].cells[0].text(), "first");
        assert_eq!(table.rows[0].cells[1].text(), "second");
    }

    #[test]
    fn width_spec_parses_percent_and_absolute() {
        assert_eq!(parse_width_spec("50%"), Some(WidthSpec::Percent(50.0)));
        assert_eq!(parse_width_spec("120"), Some(WidthSpec::Absolute(120.0)));
        assert_eq!(parse_width_spec("72pt"), Some(WidthSpec::Absolute(72.0)));
        assert_eq!(parse_width_spec("bogus"), None);
    }

    #[test]
    fn span_parse_clamps_to_one() {
        assert_eq!(parse_span("3"), 3);
        assert_eq!(parse_span("0"), 1);
        assert_eq!(parse_span("x"), 1);
    }
}
