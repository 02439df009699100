//! The document stack machine.
//!
//! [`DocConverter`] consumes a stream of [`MarkupEvent`]s and assembles
//! finished [`DocElement`]s. Structure is tracked three ways at once: the
//! property cascade (one scope per styled element), the open-container stack
//! (lists, items, tables, cells, anchors), and the frame chain used for
//! direction resolution. Malformed nesting never errors; missing closers are
//! healed in place and logged.

use smallvec::SmallVec;

use crate::builders::{
    parse_horizontal_align, parse_span, parse_vertical_align, parse_width_spec, AnchorBuilder,
    CellBuilder, ListBuilder, ListItemBuilder, OpenContainer, TableBuilder,
};
use crate::cascade::{parse_pt, Cascade, StyleScope, DEFAULT_BASE_FONT_SIZE};
use crate::collab::{
    pick_registered_family, AllFonts, FontProvider, NoResources, ResourceError, ResourceResolver,
};
use crate::direction::{apply_rtl, resolve_direction, ElementFrame};
use crate::error::ConvertError;
use crate::model::{
    DocElement, DocImage, HorizontalAlign, Paragraph, ScriptPosition, TextRun, TextStyle,
};
use crate::outline::OutlineTree;
use crate::tags::{behavior_for, TagBehavior};

/// Hard limits applied during conversion.
///
/// # Defaults
/// - `max_nesting`: 64 open elements
/// - `max_attr_bytes`: 16 KiB of attribute bytes per element
#[derive(Clone, Copy, Debug)]
pub struct ConvertLimits {
    /// Elements opened past this depth are ignored with a warning.
    pub max_nesting: usize,
    /// Attribute byte budget per element; exceeding it aborts conversion.
    pub max_attr_bytes: usize,
}

impl Default for ConvertLimits {
    fn default() -> Self {
        Self {
            max_nesting: 64,
            max_attr_bytes: 16 * 1024,
        }
    }
}

/// Conversion options.
#[derive(Clone, Copy, Debug)]
pub struct ConvertOptions {
    /// Collect headings into a bookmark outline.
    pub auto_bookmark: bool,
    /// Base font size in points, seeding the root cascade scope.
    pub base_font_size: f32,
    pub limits: ConvertLimits,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            auto_bookmark: true,
            base_font_size: DEFAULT_BASE_FONT_SIZE,
            limits: ConvertLimits::default(),
        }
    }
}

/// One parsed markup event fed to the converter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarkupEvent {
    Start {
        name: String,
        /// Attribute pairs; names are canonicalized to lowercase on intake.
        attrs: Vec<(String, String)>,
    },
    Text(String),
    End {
        name: String,
    },
}

/// Result of a completed conversion.
#[derive(Clone, Debug, Default)]
pub struct DocumentOutput {
    /// Top-level elements in document order.
    pub elements: Vec<DocElement>,
    /// Bookmark outline, present when headings were seen and bookmarking on.
    pub outline: Option<OutlineTree>,
}

/// A repair the machine must perform before honoring a structural event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HealAction {
    CloseCell,
    CloseRow,
    CloseListItem,
}

/// Structural event that may require healing first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HealTrigger {
    RowStart,
    CellStart,
    ListItemStart,
    TableEnd,
}

/// Compute the repairs needed before `trigger` can be honored, given the
/// current pending flags. Pure so the policy is testable on its own.
pub fn healing_actions(
    trigger: HealTrigger,
    pending_cell: bool,
    pending_row: bool,
    pending_list_item: bool,
) -> SmallVec<[HealAction; 2]> {
    let mut actions = SmallVec::new();
    match trigger {
        HealTrigger::RowStart => {
            if pending_cell {
                actions.push(HealAction::CloseCell);
            }
            if pending_row {
                actions.push(HealAction::CloseRow);
            }
        }
        HealTrigger::CellStart => {
            if pending_cell {
                actions.push(HealAction::CloseCell);
            }
        }
        HealTrigger::ListItemStart => {
            if pending_list_item {
                actions.push(HealAction::CloseListItem);
            }
        }
        HealTrigger::TableEnd => {
            if pending_cell {
                actions.push(HealAction::CloseCell);
            }
            if pending_row {
                actions.push(HealAction::CloseRow);
            }
        }
    }
    actions
}

/// Collapse runs of whitespace in `input` to single spaces.
///
/// Carriage returns and tabs vanish without leaving a space behind; newlines
/// and spaces collapse. `prev_space` seeds the collapse state from whatever
/// already sits at the end of the current paragraph. Preformatted text keeps
/// everything except carriage returns.
pub fn sanitize_text(input: &str, preserve: bool, mut prev_space: bool) -> String {
    let mut out = String::with_capacity(input.len());
    if preserve {
        for c in input.chars() {
            if c != '\r' {
                out.push(c);
            }
        }
        return out;
    }
    for c in input.chars() {
        match c {
            ' ' | '\n' => {
                if !prev_space {
                    out.push(' ');
                    prev_space = true;
                }
            }
            '\r' | '\t' => {}
            other => {
                out.push(other);
                prev_space = false;
            }
        }
    }
    out
}

fn prop_get<'a>(props: &'a [(String, String)], name: &str) -> Option<&'a str> {
    props
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

/// Streaming markup-to-document converter.
pub struct DocConverter<R = NoResources, F = AllFonts> {
    opts: ConvertOptions,
    resources: R,
    fonts: F,
    cascade: Cascade,
    stack: Vec<OpenContainer>,
    frames: Vec<ElementFrame>,
    paragraph: Option<Paragraph>,
    pending_row: bool,
    /// Whether the pending row came from a real `<tr>` and so owns a style
    /// scope and frame; a cell-implied row pushes neither.
    row_has_scope: bool,
    pending_cell: bool,
    pending_list_item: bool,
    /// Text outside list items is dropped while a list is collecting.
    skip_text: bool,
    /// Depth inside a content-skipping subtree (`script`, `style`, ...).
    skip_depth: usize,
    /// Depth inside preformatted blocks.
    pre_depth: usize,
    /// Elements ignored past the nesting limit, awaiting their end events.
    nesting_overflow: usize,
    outline: OutlineTree,
    /// Bottom margin of the last flushed paragraph, for margin collapsing.
    last_margin_bottom: f32,
    out: Vec<DocElement>,
}

impl DocConverter<NoResources, AllFonts> {
    /// Converter with the default collaborators: no resources, all fonts.
    pub fn new(opts: ConvertOptions) -> Self {
        Self::with_collaborators(opts, NoResources, AllFonts)
    }
}

impl Default for DocConverter<NoResources, AllFonts> {
    fn default() -> Self {
        Self::new(ConvertOptions::default())
    }
}

impl<R: ResourceResolver, F: FontProvider> DocConverter<R, F> {
    pub fn with_collaborators(opts: ConvertOptions, resources: R, fonts: F) -> Self {
        let mut conv = Self {
            opts,
            resources,
            fonts,
            cascade: Cascade::new(),
            stack: Vec::with_capacity(8),
            frames: Vec::with_capacity(8),
            paragraph: None,
            pending_row: false,
            row_has_scope: false,
            pending_cell: false,
            pending_list_item: false,
            skip_text: false,
            skip_depth: 0,
            pre_depth: 0,
            nesting_overflow: 0,
            outline: OutlineTree::new(),
            last_margin_bottom: 0.0,
            out: Vec::with_capacity(8),
        };
        conv.begin_document();
        conv
    }

    /// Reset all conversion state and seed the root cascade scope.
    pub fn begin_document(&mut self) {
        self.cascade = Cascade::new();
        self.cascade.push(StyleScope::new(
            "document",
            vec![(
                "basefontsize".to_string(),
                format!("{}", self.opts.base_font_size),
            )],
        ));
        self.stack.clear();
        self.frames.clear();
        self.paragraph = None;
        self.pending_row = false;
        self.row_has_scope = false;
        self.pending_cell = false;
        self.pending_list_item = false;
        self.skip_text = false;
        self.skip_depth = 0;
        self.pre_depth = 0;
        self.nesting_overflow = 0;
        self.outline = OutlineTree::new();
        self.last_margin_bottom = 0.0;
        self.out.clear();
    }

    /// Limits in force for this conversion.
    pub fn limits(&self) -> ConvertLimits {
        self.opts.limits
    }

    /// Process one event.
    pub fn process_event(&mut self, event: MarkupEvent) -> Result<(), ConvertError> {
        match event {
            MarkupEvent::Start { name, attrs } => self.handle_start(&name.to_ascii_lowercase(), attrs),
            MarkupEvent::Text(text) => {
                self.handle_text(&text);
                Ok(())
            }
            MarkupEvent::End { name } => {
                self.handle_end(&name.to_ascii_lowercase());
                Ok(())
            }
        }
    }

    /// Finish the conversion: flush the open paragraph, close everything
    /// still pending deepest-first, and hand over the assembled document.
    pub fn end_document(&mut self) -> Result<DocumentOutput, ConvertError> {
        self.flush_paragraph();
        self.implicit_close_cell();
        self.implicit_close_row();
        self.implicit_close_list_item();
        while let Some(top) = self.stack.pop() {
            match top {
                OpenContainer::Anchor(anchor) => {
                    // Same as an explicit close: a destination name with no
                    // text still needs a paragraph to land on.
                    if let Some(name) = anchor.name {
                        let paragraph = self.paragraph.get_or_insert_with(Paragraph::new);
                        if paragraph.anchor_name.is_none() {
                            paragraph.anchor_name = Some(name);
                        }
                        self.flush_paragraph();
                    }
                }
                OpenContainer::ListItem(builder) => {
                    let item = builder.finish();
                    if let Some(list) = self.nearest_list() {
                        list.items.push(item);
                    } else {
                        for element in item.content {
                            self.fold_element(element);
                        }
                    }
                }
                OpenContainer::List(builder) => {
                    self.skip_text = builder.saved_skip_text;
                    self.pending_list_item = builder.saved_pending_item;
                    let list = builder.finish();
                    if list.items.is_empty() {
                        log::debug!("dropping empty list at document end");
                    } else {
                        self.fold_element(DocElement::List(list));
                    }
                }
                OpenContainer::Table(builder) => {
                    self.pending_row = builder.saved_pending_row;
                    self.pending_cell = builder.saved_pending_cell;
                    self.pending_list_item = builder.saved_pending_item;
                    self.row_has_scope = builder.saved_row_scope;
                    let table = builder.finish();
                    if table.rows.is_empty() {
                        log::debug!("dropping empty table at document end");
                    } else {
                        self.fold_element(DocElement::Table(table));
                    }
                }
                OpenContainer::Cell(builder) => {
                    if let Some(table) = self.nearest_table() {
                        table.row_buffer.push(builder.cell);
                    } else {
                        for element in builder.cell.content {
                            self.fold_element(element);
                        }
                    }
                }
            }
        }
        let outline = if self.opts.auto_bookmark && !self.outline.is_empty() {
            Some(core::mem::take(&mut self.outline))
        } else {
            None
        };
        Ok(DocumentOutput {
            elements: core::mem::take(&mut self.out),
            outline,
        })
    }

    fn handle_start(
        &mut self,
        name: &str,
        attrs: Vec<(String, String)>,
    ) -> Result<(), ConvertError> {
        if self.skip_depth > 0 {
            self.skip_depth += 1;
            return Ok(());
        }
        let behavior = behavior_for(name);
        if behavior == TagBehavior::SkipContent {
            self.skip_depth = 1;
            return Ok(());
        }
        if self.frames.len() >= self.opts.limits.max_nesting {
            self.nesting_overflow += 1;
            log::warn!(
                "nesting limit {} exceeded, ignoring <{name}>",
                self.opts.limits.max_nesting
            );
            return Ok(());
        }

        let props = Self::collect_props(name, attrs);
        // Void elements never get a matching end event, so they contribute no
        // direction frame.
        if !matches!(behavior, TagBehavior::LineBreak | TagBehavior::Image) {
            let mut frame = ElementFrame::new(name);
            frame.dir_attr = prop_get(&props, "dir").map(str::to_string);
            frame.css_direction = prop_get(&props, "direction").map(str::to_string);
            self.frames.push(frame);
        }

        if behavior.is_block_level() {
            self.flush_paragraph();
        }
        match behavior {
            TagBehavior::Paragraph => {
                self.cascade.push(StyleScope::new(name, props));
                self.paragraph = Some(self.make_paragraph());
            }
            TagBehavior::Heading(level) => {
                let mut props = props;
                if prop_get(&props, "size").is_none() {
                    props.push(("size".to_string(), format!("{}", 7 - level.min(6))));
                }
                self.cascade.push(StyleScope::new(name, props));
                self.paragraph = Some(self.make_paragraph());
            }
            TagBehavior::InlineStyle => {
                self.cascade.push(StyleScope::new(name, props));
            }
            TagBehavior::LineBreak => {
                let style = self.current_text_style();
                let paragraph = self.paragraph.get_or_insert_with(Paragraph::new);
                paragraph.runs.push(TextRun {
                    text: "\n".to_string(),
                    style,
                });
            }
            TagBehavior::Anchor => {
                let builder = AnchorBuilder {
                    href: prop_get(&props, "href")
                        .filter(|v| !v.is_empty())
                        .map(str::to_string),
                    name: prop_get(&props, "name")
                        .or_else(|| prop_get(&props, "id"))
                        .filter(|v| !v.is_empty())
                        .map(str::to_string),
                };
                self.cascade.push(StyleScope::new(name, props));
                self.stack.push(OpenContainer::Anchor(builder));
            }
            TagBehavior::List { ordered } => {
                let indentation = prop_get(&props, "indent").and_then(parse_pt);
                self.cascade.push(StyleScope::new(name, props));
                self.stack.push(OpenContainer::List(ListBuilder::new(
                    ordered,
                    indentation,
                    self.skip_text,
                    self.pending_list_item,
                )));
                self.skip_text = true;
                self.pending_list_item = false;
            }
            TagBehavior::ListItem => {
                self.implicit_close_list_item();
                self.cascade.push(StyleScope::new(name, props));
                self.stack
                    .push(OpenContainer::ListItem(ListItemBuilder::default()));
                self.pending_list_item = true;
                self.skip_text = false;
            }
            TagBehavior::Table => {
                let width = prop_get(&props, "width").and_then(parse_width_spec);
                let border = prop_get(&props, "border").and_then(parse_pt);
                let mut builder = TableBuilder::new(width, border);
                builder.saved_pending_row = self.pending_row;
                builder.saved_pending_cell = self.pending_cell;
                builder.saved_pending_item = self.pending_list_item;
                builder.saved_row_scope = self.row_has_scope;
                self.pending_row = false;
                self.pending_cell = false;
                self.pending_list_item = false;
                self.row_has_scope = false;
                self.cascade.push(StyleScope::new(name, props));
                self.stack.push(OpenContainer::Table(builder));
            }
            TagBehavior::TableRow => {
                self.apply_healing(HealTrigger::RowStart);
                self.cascade.push(StyleScope::new(name, props));
                self.pending_row = true;
                self.row_has_scope = true;
            }
            TagBehavior::TableCell { header } => {
                self.apply_healing(HealTrigger::CellStart);
                if !self.pending_row {
                    // A cell outside any row opens one implicitly.
                    self.pending_row = true;
                }
                let builder = self.seed_cell(name, header, &props);
                self.cascade.push(StyleScope::new(name, props));
                self.stack.push(OpenContainer::Cell(builder));
                self.pending_cell = true;
            }
            TagBehavior::Preformatted => {
                self.cascade.push(StyleScope::new(name, props));
                self.pre_depth += 1;
                self.paragraph = Some(self.make_paragraph());
            }
            TagBehavior::Image => {
                return self.place_image(&props);
            }
            // Handled before the frame push.
            TagBehavior::SkipContent => {}
            TagBehavior::Transparent => {}
        }
        Ok(())
    }

    fn handle_end(&mut self, name: &str) {
        if self.skip_depth > 0 {
            self.skip_depth -= 1;
            return;
        }
        if self.nesting_overflow > 0 {
            self.nesting_overflow -= 1;
            return;
        }
        match behavior_for(name) {
            TagBehavior::Paragraph => {
                self.flush_paragraph();
                self.cascade.pop(name);
                self.remove_frame(name);
            }
            TagBehavior::Heading(level) => {
                if self.opts.auto_bookmark {
                    if let Some(paragraph) = &self.paragraph {
                        let title = paragraph.text();
                        if !title.trim().is_empty() {
                            self.outline.on_header_close(level, title);
                        }
                    }
                }
                self.flush_paragraph();
                self.cascade.pop(name);
                self.remove_frame(name);
            }
            TagBehavior::InlineStyle => {
                self.cascade.pop(name);
                self.remove_frame(name);
            }
            // Void elements pushed no frame at start.
            TagBehavior::LineBreak | TagBehavior::Image => {}
            TagBehavior::Anchor => {
                self.close_anchor();
                self.cascade.pop(name);
                self.remove_frame(name);
            }
            TagBehavior::List { .. } => {
                self.implicit_close_list_item();
                self.flush_paragraph();
                self.close_list(name);
                self.cascade.pop(name);
                self.remove_frame(name);
            }
            TagBehavior::ListItem => {
                self.implicit_close_list_item();
                // Back between items: text is dropped again until the next
                // item opens, if a list is still collecting.
                if self.nearest_list().is_some() {
                    self.skip_text = true;
                }
            }
            TagBehavior::Table => {
                self.flush_paragraph();
                self.apply_healing(HealTrigger::TableEnd);
                self.close_table(name);
                self.cascade.pop(name);
                self.remove_frame(name);
            }
            TagBehavior::TableRow => {
                self.implicit_close_cell();
                self.implicit_close_row();
            }
            TagBehavior::TableCell { .. } => {
                self.implicit_close_cell();
            }
            TagBehavior::Preformatted => {
                self.flush_paragraph();
                self.pre_depth = self.pre_depth.saturating_sub(1);
                self.cascade.pop(name);
                self.remove_frame(name);
            }
            TagBehavior::SkipContent => {}
            TagBehavior::Transparent => {
                self.remove_frame(name);
            }
        }
    }

    fn handle_text(&mut self, text: &str) {
        if self.skip_depth > 0 || self.skip_text {
            return;
        }
        let prev_space = self
            .paragraph
            .as_ref()
            .map_or(true, Paragraph::ends_with_space);
        let sanitized = sanitize_text(text, self.pre_depth > 0, prev_space);
        if sanitized.is_empty() {
            return;
        }
        let style = self.current_text_style();
        if self.paragraph.is_none() {
            self.paragraph = Some(self.make_paragraph());
        }
        if let Some(paragraph) = &mut self.paragraph {
            // Adjacent runs with the same resolved style merge.
            if let Some(last) = paragraph.runs.last_mut() {
                if last.style == style {
                    last.text.push_str(&sanitized);
                    return;
                }
            }
            paragraph.runs.push(TextRun {
                text: sanitized,
                style,
            });
        }
    }

    /// Lowercase attribute names, merge inline `style` declarations, and add
    /// the tag-name marker property used by style lookups.
    fn collect_props(name: &str, attrs: Vec<(String, String)>) -> Vec<(String, String)> {
        let mut props: Vec<(String, String)> = Vec::with_capacity(attrs.len() + 1);
        props.push((name.to_string(), String::new()));
        for (key, value) in attrs {
            let key = key.to_ascii_lowercase();
            if key == "style" {
                for declaration in value.split(';') {
                    let Some((prop, val)) = declaration.split_once(':') else {
                        continue;
                    };
                    let prop = prop.trim().to_ascii_lowercase();
                    let val = val.trim().to_string();
                    if prop.is_empty() || val.is_empty() {
                        continue;
                    }
                    if prop == "font-size" {
                        props.push(("size".to_string(), val));
                    } else {
                        props.push((prop, val));
                    }
                }
            } else {
                props.push((key, value));
            }
        }
        props
    }

    /// New paragraph styled from the current cascade, with vertical margins
    /// collapsed against the previously flushed block.
    fn make_paragraph(&self) -> Paragraph {
        let mut paragraph = Paragraph::new();
        if let Some(align) = self
            .cascade
            .lookup("align")
            .or_else(|| self.cascade.lookup("text-align"))
            .and_then(parse_horizontal_align)
        {
            paragraph.alignment = align;
        }
        paragraph.indent_left = self
            .cascade
            .lookup("margin-left")
            .and_then(parse_pt)
            .unwrap_or(0.0);
        paragraph.indent_right = self
            .cascade
            .lookup("margin-right")
            .and_then(parse_pt)
            .unwrap_or(0.0);
        let margin_top = self
            .cascade
            .lookup("margin-top")
            .and_then(parse_pt)
            .unwrap_or(0.0);
        paragraph.spacing_before = (margin_top - self.last_margin_bottom).max(0.0);
        paragraph.spacing_after = self
            .cascade
            .lookup("margin-bottom")
            .and_then(parse_pt)
            .unwrap_or(0.0);
        paragraph
    }

    /// Character style resolved from the cascade and the open-anchor chain.
    fn current_text_style(&self) -> TextStyle {
        let marker = |tag: &str| self.cascade.has_property(tag);
        let decoration = self.cascade.lookup("text-decoration").unwrap_or("");
        let weight = self.cascade.lookup("font-weight").unwrap_or("");
        let font_style = self.cascade.lookup("font-style").unwrap_or("");
        let script = if marker("sub") {
            ScriptPosition::Subscript
        } else if marker("sup") {
            ScriptPosition::Superscript
        } else {
            ScriptPosition::Normal
        };
        let family = self
            .cascade
            .lookup("face")
            .or_else(|| self.cascade.lookup("font-family"))
            .and_then(|list| pick_registered_family(&self.fonts, list));
        let link = self.stack.iter().rev().find_map(|entry| match entry {
            OpenContainer::Anchor(anchor) => anchor.href.clone(),
            _ => None,
        });
        TextStyle {
            family,
            size_pt: self.cascade.resolved_size_pt(),
            bold: marker("b") || marker("strong") || weight.eq_ignore_ascii_case("bold") || weight == "700",
            italic: marker("i") || marker("em") || font_style.eq_ignore_ascii_case("italic"),
            underline: marker("u") || marker("ins") || decoration.contains("underline"),
            strike: marker("s")
                || marker("strike")
                || marker("del")
                || decoration.contains("line-through"),
            script,
            color: self.cascade.lookup("color").map(str::to_string),
            link,
        }
    }

    /// Fold the accumulating paragraph into the innermost accepting
    /// container, applying direction inversion first.
    fn flush_paragraph(&mut self) {
        let Some(mut paragraph) = self.paragraph.take() else {
            return;
        };
        // An empty paragraph is dropped unless it carries a destination name.
        if paragraph.is_empty() && paragraph.anchor_name.is_none() {
            return;
        }
        let direction = resolve_direction(&self.frames);
        if direction == crate::model::Direction::RightToLeft {
            apply_rtl(&mut paragraph);
        } else {
            paragraph.direction = direction;
        }
        self.last_margin_bottom = paragraph.spacing_after;
        self.fold_element(DocElement::Paragraph(paragraph));
    }

    /// Hand a finished element to the innermost container that accepts
    /// block content; top-level elements land in the output.
    fn fold_element(&mut self, element: DocElement) {
        for entry in self.stack.iter_mut().rev() {
            match entry {
                OpenContainer::Anchor(_) => continue,
                OpenContainer::ListItem(item) => {
                    item.content.push(element);
                    return;
                }
                OpenContainer::Cell(cell) => {
                    cell.cell.content.push(element);
                    return;
                }
                OpenContainer::List(list) => {
                    if let Some(last) = list.items.last_mut() {
                        last.content.push(element);
                    } else {
                        log::warn!("dropping {} outside any list item", element.kind());
                    }
                    return;
                }
                OpenContainer::Table(_) => {
                    log::debug!("dropping {} between table cells", element.kind());
                    return;
                }
            }
        }
        self.out.push(element);
    }

    fn apply_healing(&mut self, trigger: HealTrigger) {
        let actions = healing_actions(
            trigger,
            self.pending_cell,
            self.pending_row,
            self.pending_list_item,
        );
        for action in actions {
            match action {
                HealAction::CloseCell => self.implicit_close_cell(),
                HealAction::CloseRow => self.implicit_close_row(),
                HealAction::CloseListItem => self.implicit_close_list_item(),
            }
        }
    }

    fn implicit_close_cell(&mut self) {
        if !self.pending_cell {
            return;
        }
        self.pending_cell = false;
        self.flush_paragraph();
        match self.stack.pop() {
            Some(OpenContainer::Cell(builder)) => {
                self.cascade.pop(&builder.tag);
                self.remove_frame(&builder.tag);
                if let Some(table) = self.nearest_table() {
                    table.row_buffer.push(builder.cell);
                } else {
                    log::warn!("cell closed with no open table, folding its content");
                    for element in builder.cell.content {
                        self.fold_element(element);
                    }
                }
            }
            Some(other) => {
                log::warn!("expected open cell on stack, found {}", other.kind());
                self.stack.push(other);
            }
            None => log::warn!("expected open cell on empty stack"),
        }
    }

    fn implicit_close_row(&mut self) {
        if !self.pending_row {
            return;
        }
        self.pending_row = false;
        if self.row_has_scope {
            // A real <tr> pushed a scope and frame; a cell-implied row did
            // not, so the pop belongs to whoever retires the row.
            self.row_has_scope = false;
            self.cascade.pop("tr");
            self.remove_frame("tr");
        }
        if let Some(table) = self.nearest_table() {
            if !table.row_buffer.is_empty() {
                table.finish_row();
            }
        } else {
            log::warn!("row closed with no open table");
        }
    }

    fn implicit_close_list_item(&mut self) {
        if !self.pending_list_item {
            return;
        }
        self.pending_list_item = false;
        self.flush_paragraph();
        match self.stack.pop() {
            Some(OpenContainer::ListItem(builder)) => {
                self.cascade.pop("li");
                self.remove_frame("li");
                let item = builder.finish();
                if let Some(list) = self.nearest_list() {
                    list.items.push(item);
                } else {
                    log::warn!("list item closed with no open list, folding its content");
                    for element in item.content {
                        self.fold_element(element);
                    }
                }
            }
            Some(other) => {
                log::warn!("expected open list item on stack, found {}", other.kind());
                self.stack.push(other);
            }
            None => log::warn!("expected open list item on empty stack"),
        }
    }

    fn close_anchor(&mut self) {
        let Some(idx) = self
            .stack
            .iter()
            .rposition(|e| matches!(e, OpenContainer::Anchor(_)))
        else {
            return;
        };
        let OpenContainer::Anchor(anchor) = self.stack.remove(idx) else {
            return;
        };
        if let Some(name) = anchor.name {
            let paragraph = self.paragraph.get_or_insert_with(Paragraph::new);
            if paragraph.anchor_name.is_none() {
                paragraph.anchor_name = Some(name);
            }
        }
    }

    fn close_list(&mut self, tag: &str) {
        let Some(idx) = self
            .stack
            .iter()
            .rposition(|e| matches!(e, OpenContainer::List(_)))
        else {
            log::warn!("</{tag}> with no open list");
            return;
        };
        let OpenContainer::List(builder) = self.stack.remove(idx) else {
            return;
        };
        self.skip_text = builder.saved_skip_text;
        self.pending_list_item = builder.saved_pending_item;
        let list = builder.finish();
        if list.items.is_empty() {
            log::debug!("dropping empty list <{tag}>");
            return;
        }
        self.fold_element(DocElement::List(list));
    }

    fn close_table(&mut self, tag: &str) {
        let Some(idx) = self
            .stack
            .iter()
            .rposition(|e| matches!(e, OpenContainer::Table(_)))
        else {
            log::warn!("</{tag}> with no open table");
            return;
        };
        let OpenContainer::Table(builder) = self.stack.remove(idx) else {
            return;
        };
        self.pending_row = builder.saved_pending_row;
        self.pending_cell = builder.saved_pending_cell;
        self.pending_list_item = builder.saved_pending_item;
        self.row_has_scope = builder.saved_row_scope;
        let table = builder.finish();
        self.fold_element(DocElement::Table(table));
    }

    /// Seed a cell builder from its own attributes plus inherited table
    /// properties. Header cells default to centered content.
    fn seed_cell(&mut self, tag: &str, header: bool, props: &[(String, String)]) -> CellBuilder {
        let mut builder = CellBuilder::new(tag, header);
        let cell = &mut builder.cell;
        cell.colspan = prop_get(props, "colspan").map(parse_span).unwrap_or(1);
        cell.rowspan = prop_get(props, "rowspan").map(parse_span).unwrap_or(1);
        cell.horizontal_align = prop_get(props, "align")
            .or_else(|| prop_get(props, "text-align"))
            .and_then(parse_horizontal_align)
            .unwrap_or(if header {
                HorizontalAlign::Center
            } else {
                HorizontalAlign::Undefined
            });
        if let Some(valign) = prop_get(props, "valign")
            .or_else(|| prop_get(props, "vertical-align"))
            .and_then(parse_vertical_align)
        {
            cell.vertical_align = valign;
        }
        cell.width = prop_get(props, "width").and_then(parse_width_spec);
        cell.border_width = prop_get(props, "border")
            .and_then(parse_pt)
            .or_else(|| self.cascade.lookup("border").and_then(parse_pt));
        cell.padding = prop_get(props, "padding")
            .and_then(parse_pt)
            .or_else(|| self.cascade.lookup("cellpadding").and_then(parse_pt));
        cell.background_color = prop_get(props, "bgcolor")
            .or_else(|| prop_get(props, "background-color"))
            .map(str::to_string);
        builder
    }

    /// Resolve and place an image. A missing resource skips the element; a
    /// hard resolver failure aborts the conversion.
    fn place_image(&mut self, props: &[(String, String)]) -> Result<(), ConvertError> {
        let Some(src) = prop_get(props, "src").filter(|s| !s.is_empty()) else {
            log::warn!("image without src, skipping");
            return Ok(());
        };
        match self.resources.resolve_image(src, &self.cascade) {
            Ok(decoded) => {
                self.flush_paragraph();
                let alt = prop_get(props, "alt").unwrap_or("").to_string();
                self.fold_element(DocElement::Image(DocImage {
                    src: src.to_string(),
                    alt,
                    width_px: decoded.width_px,
                    height_px: decoded.height_px,
                }));
                Ok(())
            }
            Err(ResourceError::NotFound) => {
                log::warn!("image {src} not found, skipping");
                Ok(())
            }
            Err(ResourceError::Failed(message)) => Err(ConvertError::new(
                ConvertError::RESOURCE_FAILED,
                format!("image {src}: {message}"),
            )
            .with_tag("img")),
        }
    }

    fn nearest_table(&mut self) -> Option<&mut TableBuilder> {
        self.stack.iter_mut().rev().find_map(|entry| match entry {
            OpenContainer::Table(builder) => Some(builder),
            _ => None,
        })
    }

    fn nearest_list(&mut self) -> Option<&mut ListBuilder> {
        self.stack.iter_mut().rev().find_map(|entry| match entry {
            OpenContainer::List(builder) => Some(builder),
            _ => None,
        })
    }

    fn remove_frame(&mut self, tag: &str) {
        if let Some(idx) = self.frames.iter().rposition(|f| f.tag == tag) {
            self.frames.remove(idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(name: &str, attrs: &[(&str, &str)]) -> MarkupEvent {
        MarkupEvent::Start {
            name: name.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn text(t: &str) -> MarkupEvent {
        MarkupEvent::Text(t.to_string())
    }

    fn end(name: &str) -> MarkupEvent {
        MarkupEvent::End {
            name: name.to_string(),
        }
    }

    fn convert(events: Vec<MarkupEvent>) -> DocumentOutput {
        let mut conv = DocConverter::default();
        for event in events {
            conv.process_event(event).unwrap();
        }
        conv.end_document().unwrap()
    }

    #[test]
    fn whitespace_collapses_to_single_spaces() {
        assert_eq!(sanitize_text("  a\n   b  ", false, true), "a b ");
        assert_eq!(sanitize_text("a\r\tb", false, false), "ab");
        assert_eq!(sanitize_text(" x", false, false), " x");
    }

    #[test]
    fn preformatted_text_keeps_layout() {
        assert_eq!(sanitize_text("a\n  b\tc", true, true), "a\n  b\tc");
        assert_eq!(sanitize_text("a\r\nb", true, true), "a\nb");
    }

    #[test]
    fn heal_policy_row_start_closes_cell_then_row() {
        let actions = healing_actions(HealTrigger::RowStart, true, true, false);
        assert_eq!(
            actions.as_slice(),
            &[HealAction::CloseCell, HealAction::CloseRow]
        );
        let actions = healing_actions(HealTrigger::RowStart, false, false, false);
        assert!(actions.is_empty());
    }

    #[test]
    fn heal_policy_cell_start_only_closes_cell() {
        let actions = healing_actions(HealTrigger::CellStart, true, true, false);
        assert_eq!(actions.as_slice(), &[HealAction::CloseCell]);
    }

    #[test]
    fn paragraph_with_bold_run() {
        let out = convert(vec![
            start("p", &[]),
            text("plain "),
            start("b", &[]),
            text("bold"),
            end("b"),
            end("p"),
        ]);
        assert_eq!(out.elements.len(), 1);
        let DocElement::Paragraph(p) = &out.elements[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(p.runs.len(), 2);
        assert!(!p.runs[0].style.bold);
        assert!(p.runs[1].style.bold);
        assert_eq!(p.text(), "plain bold");
    }

    #[test]
    fn unclosed_elements_are_folded_at_end() {
        let out = convert(vec![
            start("ul", &[]),
            start("li", &[]),
            text("dangling"),
        ]);
        assert_eq!(out.elements.len(), 1);
        let DocElement::List(list) = &out.elements[0] else {
            panic!("expected list");
        };
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].text(), "dangling");
    }

    #[test]
    fn missing_cell_closers_are_healed() {
        let out = convert(vec![
            start("table", &[]),
            start("tr", &[]),
            start("td", &[]),
            text("A"),
            start("td", &[]),
            text("B"),
            end("tr"),
            end("table"),
        ]);
        let DocElement::Table(table) = &out.elements[0] else {
            panic!("expected table");
        };
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].cells.len(), 2);
        assert_eq!(table.rows[0].cells[0].text(), "A");
        assert_eq!(table.rows[0].cells[1].text(), "B");
    }

    #[test]
    fn text_between_list_items_is_dropped() {
        let out = convert(vec![
            start("ul", &[]),
            text("stray"),
            start("li", &[]),
            text("kept"),
            end("li"),
            text("stray again"),
            end("ul"),
        ]);
        let DocElement::List(list) = &out.elements[0] else {
            panic!("expected list");
        };
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].text(), "kept");
    }

    #[test]
    fn nesting_limit_ignores_deep_elements() {
        let opts = ConvertOptions {
            limits: ConvertLimits {
                max_nesting: 2,
                ..ConvertLimits::default()
            },
            ..ConvertOptions::default()
        };
        let mut conv = DocConverter::new(opts);
        for _ in 0..4 {
            conv.process_event(start("span", &[])).unwrap();
        }
        conv.process_event(text("deep")).unwrap();
        for _ in 0..4 {
            conv.process_event(end("span")).unwrap();
        }
        conv.process_event(text(" shallow")).unwrap();
        let out = conv.end_document().unwrap();
        let DocElement::Paragraph(p) = &out.elements[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(p.text(), "deep shallow");
    }

    #[test]
    fn skip_content_subtrees_are_discarded() {
        let out = convert(vec![
            text("before "),
            start("script", &[]),
            text("var x = 1;"),
            start("b", &[]),
            text("nested"),
            end("b"),
            end("script"),
            text("after"),
        ]);
        let DocElement::Paragraph(p) = &out.elements[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(p.text(), "before after");
    }

    #[test]
    fn adjacent_same_style_runs_merge() {
        let out = convert(vec![start("p", &[]), text("one "), text("two"), end("p")]);
        let DocElement::Paragraph(p) = &out.elements[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(p.runs.len(), 1);
        assert_eq!(p.runs[0].text, "one two");
    }

    #[test]
    fn font_size_attribute_cascades_into_runs() {
        let out = convert(vec![
            start("p", &[]),
            start("font", &[("size", "+1")]),
            text("bigger"),
            end("font"),
            end("p"),
        ]);
        let DocElement::Paragraph(p) = &out.elements[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(p.runs[0].style.size_pt, 14.0);
    }

    #[test]
    fn heading_close_records_outline_entry() {
        let out = convert(vec![
            start("h1", &[]),
            text("Chapter"),
            end("h1"),
            start("h2", &[]),
            text("Section"),
            end("h2"),
        ]);
        let outline = out.outline.expect("outline");
        assert_eq!(outline.flat(), vec![(1, "Chapter"), (2, "Section")]);
        // Heading text also lands in the document body.
        assert_eq!(out.elements.len(), 2);
    }

    #[test]
    fn bookmarking_can_be_disabled() {
        let opts = ConvertOptions {
            auto_bookmark: false,
            ..ConvertOptions::default()
        };
        let mut conv = DocConverter::new(opts);
        for event in [start("h1", &[]), text("Chapter"), end("h1")] {
            conv.process_event(event).unwrap();
        }
        let out = conv.end_document().unwrap();
        assert!(out.outline.is_none());
        assert_eq!(out.elements.len(), 1);
    }

    #[test]
    fn rtl_paragraph_is_inverted_at_flush() {
        let out = convert(vec![
            start("p", &[("dir", "rtl"), ("align", "right")]),
            text("שלום"),
            end("p"),
        ]);
        let DocElement::Paragraph(p) = &out.elements[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(p.direction, crate::model::Direction::RightToLeft);
        assert_eq!(p.alignment, HorizontalAlign::Left);
    }

    #[test]
    fn named_anchor_marks_the_paragraph() {
        let out = convert(vec![
            start("p", &[]),
            start("a", &[("name", "dest")]),
            text("target"),
            end("a"),
            end("p"),
        ]);
        let DocElement::Paragraph(p) = &out.elements[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(p.anchor_name.as_deref(), Some("dest"));
    }

    #[test]
    fn unclosed_named_anchor_keeps_its_destination() {
        let out = convert(vec![start("a", &[("name", "dest")])]);
        assert_eq!(out.elements.len(), 1);
        let DocElement::Paragraph(p) = &out.elements[0] else {
            panic!("expected paragraph");
        };
        assert!(p.is_empty());
        assert_eq!(p.anchor_name.as_deref(), Some("dest"));
    }

    #[test]
    fn unmatched_break_leaves_no_direction_frame() {
        // A raw <br> start with no end event must not linger as an ancestor
        // for later direction resolution.
        let out = convert(vec![
            start("br", &[("dir", "rtl")]),
            start("p", &[]),
            text("after"),
            end("p"),
        ]);
        let DocElement::Paragraph(p) = out.elements.last().expect("paragraph") else {
            panic!("expected paragraph");
        };
        assert_eq!(p.text(), "after");
        assert_eq!(p.direction, crate::model::Direction::Unset);
    }

    #[test]
    fn href_anchor_links_contained_runs() {
        let out = convert(vec![
            start("p", &[]),
            start("a", &[("href", "https://example.org")]),
            text("link"),
            end("a"),
            text(" tail"),
            end("p"),
        ]);
        let DocElement::Paragraph(p) = &out.elements[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(p.runs[0].style.link.as_deref(), Some("https://example.org"));
        assert_eq!(p.runs[1].style.link, None);
    }
}
