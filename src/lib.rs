//! Streaming conversion of HTML-like markup into a typeset document model.
//!
//! The pipeline tokenizes markup bytes with `quick-xml`, resolves styles
//! through a property cascade, and assembles finished paragraphs, lists,
//! tables, and images with a self-healing stack machine. Malformed nesting
//! never aborts a conversion; missing closers are repaired in place.
//!
//! ```
//! use markup_flow::{convert_markup, ConvertOptions, DocElement};
//!
//! let out = convert_markup(b"<p>Hello <b>world</b></p>", ConvertOptions::default())?;
//! let DocElement::Paragraph(p) = &out.elements[0] else { panic!() };
//! assert_eq!(p.text(), "Hello world");
//! # Ok::<(), markup_flow::ConvertError>(())
//! ```

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

mod builders;
mod cascade;
mod collab;
mod direction;
mod error;
mod machine;
mod model;
mod outline;
mod reader;
mod tags;

pub use cascade::{normalize_font_size, Cascade, StyleScope, FONT_SIZE_LADDER};
pub use collab::{
    pick_registered_family, AllFonts, DecodedImage, FontProvider, NoResources, ResourceError,
    ResourceResolver,
};
pub use direction::{
    invert_alignment, resolve_direction, ElementFrame, NON_PROPAGATING_DIR_TAGS,
};
pub use error::ConvertError;
pub use machine::{
    ConvertLimits, ConvertOptions, DocConverter, DocumentOutput, MarkupEvent,
};
pub use model::{
    Direction, DocElement, DocImage, DocList, DocTable, HorizontalAlign, ListItem, Paragraph,
    ScriptPosition, TableCell, TableRow, TextRun, TextStyle, VerticalAlign, WidthSpec,
};
pub use outline::{OutlineNode, OutlineTree};
pub use reader::{convert_markup, feed_markup};
pub use tags::{behavior_for, TagBehavior};
