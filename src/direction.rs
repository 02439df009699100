//! Direction resolution and right-to-left layout inversion.
//!
//! Direction is resolved lazily per element from, in precedence order: the
//! element's own `dir` attribute (unless its tag is in the non-propagating
//! set), its own CSS `direction` property, then the ancestor chain. When
//! right-to-left resolves on a closing block, left/right indentation swaps
//! and horizontal alignment inverts.

use crate::model::{Direction, HorizontalAlign, Paragraph};

/// Tags whose own `dir` attribute is not consulted (and is skipped during
/// the ancestor walk); their inherited CSS direction still applies.
pub const NON_PROPAGATING_DIR_TAGS: [&str; 4] = ["table", "tr", "td", "th"];

/// One entry of the open-element chain used for direction resolution.
#[derive(Clone, Debug, Default)]
pub struct ElementFrame {
    pub tag: String,
    /// Raw `dir` attribute value, when present and non-empty.
    pub dir_attr: Option<String>,
    /// Raw CSS `direction` property value, when present.
    pub css_direction: Option<String>,
}

impl ElementFrame {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            dir_attr: None,
            css_direction: None,
        }
    }
}

fn propagates_dir(tag: &str) -> bool {
    !NON_PROPAGATING_DIR_TAGS.contains(&tag)
}

fn map_token(token: &str) -> Direction {
    if token.eq_ignore_ascii_case("rtl") {
        Direction::RightToLeft
    } else if token.eq_ignore_ascii_case("ltr") {
        Direction::LeftToRight
    } else {
        // Unknown tokens (including explicit "auto") fall back to the
        // default rendering direction.
        Direction::Auto
    }
}

/// Resolve the direction of the innermost element of `frames`.
///
/// `frames` is the open-element chain, outermost first; the last entry is
/// the element being resolved. Returns [`Direction::Unset`] when nothing in
/// the chain declares a direction.
pub fn resolve_direction(frames: &[ElementFrame]) -> Direction {
    let Some((own, ancestors)) = frames.split_last() else {
        return Direction::Unset;
    };
    if propagates_dir(&own.tag) {
        if let Some(token) = own.dir_attr.as_deref().filter(|t| !t.is_empty()) {
            return map_token(token);
        }
    }
    if let Some(token) = own.css_direction.as_deref().filter(|t| !t.is_empty()) {
        return map_token(token);
    }
    for frame in ancestors.iter().rev() {
        if propagates_dir(&frame.tag) {
            if let Some(token) = frame.dir_attr.as_deref().filter(|t| !t.is_empty()) {
                return map_token(token);
            }
        }
        if let Some(token) = frame.css_direction.as_deref().filter(|t| !t.is_empty()) {
            return map_token(token);
        }
    }
    Direction::Unset
}

/// Invert horizontal alignment for right-to-left layout.
///
/// Involution: applying it twice restores the original alignment.
pub fn invert_alignment(align: HorizontalAlign) -> HorizontalAlign {
    match align {
        HorizontalAlign::Left => HorizontalAlign::Right,
        HorizontalAlign::Right => HorizontalAlign::Left,
        other => other,
    }
}

/// Apply right-to-left inversion to a paragraph in place: indentation sides
/// swap and alignment inverts.
pub fn apply_rtl(paragraph: &mut Paragraph) {
    core::mem::swap(&mut paragraph.indent_left, &mut paragraph.indent_right);
    paragraph.alignment = invert_alignment(paragraph.alignment);
    paragraph.direction = Direction::RightToLeft;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tag: &str, dir: Option<&str>, css: Option<&str>) -> ElementFrame {
        ElementFrame {
            tag: tag.to_string(),
            dir_attr: dir.map(str::to_string),
            css_direction: css.map(str::to_string),
        }
    }

    #[test]
    fn own_attribute_wins() {
        let frames = vec![frame("body", Some("ltr"), None), frame("p", Some("RTL"), None)];
        assert_eq!(resolve_direction(&frames), Direction::RightToLeft);
    }

    #[test]
    fn own_css_beats_ancestor_attribute() {
        let frames = vec![frame("body", Some("rtl"), None), frame("p", None, Some("ltr"))];
        assert_eq!(resolve_direction(&frames), Direction::LeftToRight);
    }

    #[test]
    fn ancestor_walk_finds_nearest_declaration() {
        let frames = vec![
            frame("body", Some("rtl"), None),
            frame("div", None, None),
            frame("span", None, None),
        ];
        assert_eq!(resolve_direction(&frames), Direction::RightToLeft);
    }

    #[test]
    fn non_propagating_tag_attribute_is_skipped_but_css_honored() {
        // The td's own dir attribute must be ignored...
        let frames = vec![frame("td", Some("rtl"), None)];
        assert_eq!(resolve_direction(&frames), Direction::Unset);
        // ...but its CSS direction still applies.
        let frames = vec![frame("td", Some("rtl"), Some("ltr"))];
        assert_eq!(resolve_direction(&frames), Direction::LeftToRight);
        // And an ancestor table's dir attribute does not propagate either.
        let frames = vec![frame("table", Some("rtl"), None), frame("p", None, None)];
        assert_eq!(resolve_direction(&frames), Direction::Unset);
    }

    #[test]
    fn unknown_token_maps_to_auto() {
        let frames = vec![frame("p", Some("sideways"), None)];
        assert_eq!(resolve_direction(&frames), Direction::Auto);
        let frames = vec![frame("p", Some("auto"), None)];
        assert_eq!(resolve_direction(&frames), Direction::Auto);
    }

    #[test]
    fn nothing_resolved_means_unset() {
        assert_eq!(resolve_direction(&[]), Direction::Unset);
        let frames = vec![frame("body", None, None), frame("p", None, None)];
        assert_eq!(resolve_direction(&frames), Direction::Unset);
    }

    #[test]
    fn rtl_inversion_round_trips() {
        let mut p = Paragraph {
            alignment: HorizontalAlign::Right,
            indent_left: 10.0,
            indent_right: 2.0,
            ..Paragraph::new()
        };
        apply_rtl(&mut p);
        assert_eq!(p.alignment, HorizontalAlign::Left);
        assert_eq!(p.indent_left, 2.0);
        assert_eq!(p.indent_right, 10.0);
        apply_rtl(&mut p);
        assert_eq!(p.alignment, HorizontalAlign::Right);
        assert_eq!(p.indent_left, 10.0);
    }

    #[test]
    fn center_and_justified_are_unchanged_by_inversion() {
        assert_eq!(
            invert_alignment(HorizontalAlign::Center),
            HorizontalAlign::Center
        );
        assert_eq!(
            invert_alignment(HorizontalAlign::Justified),
            HorizontalAlign::Justified
        );
        assert_eq!(
            invert_alignment(HorizontalAlign::Undefined),
            HorizontalAlign::Undefined
        );
    }
}
