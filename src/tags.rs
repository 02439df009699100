//! Tag behavior registry.
//!
//! Every canonical (lowercased) tag name maps to one closed [`TagBehavior`]
//! variant; unknown names get [`TagBehavior::Transparent`], which contributes
//! nothing structurally but leaves enclosing constructs free to claim the
//! nested content.

/// Closed set of per-tag behaviors dispatched by the stack machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagBehavior {
    /// Paragraph-like block: `p`, `div`, `blockquote`.
    Paragraph,
    /// Heading block, level 1-6.
    Heading(u8),
    /// Inline style scope: `span`, `font`, `b`, `i`, ...
    InlineStyle,
    /// Explicit line break: `br`.
    LineBreak,
    /// Anchor: stack owner carrying an href or destination name.
    Anchor,
    /// List container.
    List {
        ordered: bool,
    },
    ListItem,
    Table,
    TableRow,
    /// Table cell; `header` is true for `th`.
    TableCell {
        header: bool,
    },
    /// Preformatted block: whitespace preserved verbatim.
    Preformatted,
    /// Image placement: `img`.
    Image,
    /// Content is discarded wholesale: `script`, `style`, `head`, `title`.
    SkipContent,
    /// Unknown tag: no structural effect, content passes through.
    Transparent,
}

/// Resolve the behavior for an already lowercased tag name.
pub fn behavior_for(tag: &str) -> TagBehavior {
    match tag {
        "p" | "div" | "blockquote" => TagBehavior::Paragraph,
        "h1" => TagBehavior::Heading(1),
        "h2" => TagBehavior::Heading(2),
        "h3" => TagBehavior::Heading(3),
        "h4" => TagBehavior::Heading(4),
        "h5" => TagBehavior::Heading(5),
        "h6" => TagBehavior::Heading(6),
        "span" | "font" | "b" | "strong" | "i" | "em" | "u" | "ins" | "s" | "strike" | "del"
        | "sub" | "sup" => TagBehavior::InlineStyle,
        "br" => TagBehavior::LineBreak,
        "a" => TagBehavior::Anchor,
        "ul" => TagBehavior::List { ordered: false },
        "ol" => TagBehavior::List { ordered: true },
        "li" => TagBehavior::ListItem,
        "table" => TagBehavior::Table,
        "tr" => TagBehavior::TableRow,
        "td" => TagBehavior::TableCell { header: false },
        "th" => TagBehavior::TableCell { header: true },
        "pre" => TagBehavior::Preformatted,
        "img" | "image" => TagBehavior::Image,
        "script" | "style" | "head" | "title" => TagBehavior::SkipContent,
        _ => TagBehavior::Transparent,
    }
}

impl TagBehavior {
    /// Whether the element owns an entry on the open-element stack.
    pub fn is_stack_owner(&self) -> bool {
        matches!(
            self,
            Self::Anchor | Self::List { .. } | Self::ListItem | Self::Table | Self::TableCell { .. }
        )
    }

    /// Whether opening this element must first fold the accumulating
    /// paragraph into the stack.
    pub fn is_block_level(&self) -> bool {
        matches!(
            self,
            Self::Paragraph
                | Self::Heading(_)
                | Self::List { .. }
                | Self::ListItem
                | Self::Table
                | Self::TableRow
                | Self::TableCell { .. }
                | Self::Preformatted
        )
    }

    /// Whether the element pushes (and later pops) a cascade scope.
    pub fn pushes_scope(&self) -> bool {
        matches!(
            self,
            Self::Paragraph
                | Self::Heading(_)
                | Self::InlineStyle
                | Self::Anchor
                | Self::List { .. }
                | Self::ListItem
                | Self::Table
                | Self::TableRow
                | Self::TableCell { .. }
                | Self::Preformatted
        )
    }
}
