//! Markup front end built on `quick-xml`.
//!
//! Tokenizes HTML-like bytes and feeds [`MarkupEvent`]s to a
//! [`DocConverter`]. Tag names are namespace-stripped and lowercased;
//! self-closing elements are expanded into a start/end pair so the machine
//! sees one uniform event shape.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::collab::{FontProvider, ResourceResolver};
use crate::error::ConvertError;
use crate::machine::{ConvertOptions, DocConverter, DocumentOutput, MarkupEvent};

fn reader_token_offset(reader: &Reader<&[u8]>) -> usize {
    usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX)
}

fn decode_tag_name(reader: &Reader<&[u8]>, raw: &[u8]) -> Result<String, ConvertError> {
    let decoded = reader.decoder().decode(raw).map_err(|err| {
        ConvertError::new(
            ConvertError::TOKENIZE_ERROR,
            format!("tag name decode error: {err:?}"),
        )
        .with_offset(reader_token_offset(reader))
    })?;
    let local_name = decoded.rsplit(':').next().unwrap_or(decoded.as_ref());
    Ok(local_name.to_ascii_lowercase())
}

/// Decode the attributes of a start tag, enforcing the per-element byte
/// budget. Attributes that fail to decode are dropped individually.
fn decode_attrs(
    reader: &Reader<&[u8]>,
    e: &BytesStart<'_>,
    tag: &str,
    max_attr_bytes: usize,
) -> Result<Vec<(String, String)>, ConvertError> {
    let mut attrs = Vec::with_capacity(8);
    let mut total_bytes = 0usize;
    for attr in e.attributes().flatten() {
        total_bytes += attr.key.as_ref().len() + attr.value.len();
        if total_bytes > max_attr_bytes {
            return Err(ConvertError::new(
                ConvertError::ATTR_BYTES_LIMIT,
                format!("attribute bytes exceed max_attr_bytes ({max_attr_bytes})"),
            )
            .with_tag(tag)
            .with_offset(reader_token_offset(reader)));
        }
        let key = match reader.decoder().decode(attr.key.as_ref()) {
            Ok(v) => v.to_ascii_lowercase(),
            Err(_) => continue,
        };
        let value = match attr.unescape_value() {
            Ok(v) => v.to_string(),
            Err(_) => match reader.decoder().decode(&attr.value) {
                Ok(v) => v.to_string(),
                Err(_) => continue,
            },
        };
        attrs.push((key, value));
    }
    Ok(attrs)
}

/// Tokenize `bytes` and feed every event to `conv`.
///
/// The converter keeps its state across calls, so a document may be fed in
/// chunks as long as chunk boundaries fall between tokens.
pub fn feed_markup<R, F>(conv: &mut DocConverter<R, F>, bytes: &[u8]) -> Result<(), ConvertError>
where
    R: ResourceResolver,
    F: FontProvider,
{
    let max_attr_bytes = conv.limits().max_attr_bytes;
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(false);
    // Sloppy HTML nesting is the machine's problem, not the tokenizer's.
    reader.config_mut().check_end_names = false;
    reader.config_mut().allow_unmatched_ends = true;
    let mut buf = Vec::with_capacity(8);
    let mut entity_buf = String::with_capacity(16);

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = decode_tag_name(&reader, e.name().as_ref())?;
                let attrs = decode_attrs(&reader, &e, &name, max_attr_bytes)?;
                conv.process_event(MarkupEvent::Start { name, attrs })?;
            }
            Ok(Event::Empty(e)) => {
                let name = decode_tag_name(&reader, e.name().as_ref())?;
                let attrs = decode_attrs(&reader, &e, &name, max_attr_bytes)?;
                conv.process_event(MarkupEvent::Start {
                    name: name.clone(),
                    attrs,
                })?;
                conv.process_event(MarkupEvent::End { name })?;
            }
            Ok(Event::End(e)) => {
                let name = decode_tag_name(&reader, e.name().as_ref())?;
                conv.process_event(MarkupEvent::End { name })?;
            }
            Ok(Event::Text(e)) => {
                let text = e.decode().map_err(|err| {
                    ConvertError::new(
                        ConvertError::TEXT_DECODE_ERROR,
                        format!("text node decode error: {err:?}"),
                    )
                    .with_offset(reader_token_offset(&reader))
                })?;
                conv.process_event(MarkupEvent::Text(text.into_owned()))?;
            }
            Ok(Event::CData(e)) => {
                let text = reader.decoder().decode(&e).map_err(|err| {
                    ConvertError::new(
                        ConvertError::TEXT_DECODE_ERROR,
                        format!("cdata decode error: {err:?}"),
                    )
                    .with_offset(reader_token_offset(&reader))
                })?;
                conv.process_event(MarkupEvent::Text(text.into_owned()))?;
            }
            Ok(Event::GeneralRef(e)) => {
                let entity_name = e.decode().map_err(|err| {
                    ConvertError::new(
                        ConvertError::ENTITY_ERROR,
                        format!("entity decode error: {err:?}"),
                    )
                    .with_offset(reader_token_offset(&reader))
                })?;
                entity_buf.clear();
                entity_buf.push('&');
                entity_buf.push_str(entity_name.as_ref());
                entity_buf.push(';');
                let resolved = quick_xml::escape::unescape(&entity_buf).map_err(|err| {
                    ConvertError::new(
                        ConvertError::ENTITY_ERROR,
                        format!("entity unescape error: {err:?}"),
                    )
                    .with_offset(reader_token_offset(&reader))
                })?;
                conv.process_event(MarkupEvent::Text(resolved.into_owned()))?;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(ConvertError::new(
                    ConvertError::TOKENIZE_ERROR,
                    format!("tokenizer error: {err:?}"),
                )
                .with_offset(reader_token_offset(&reader)));
            }
        }
        buf.clear();
    }

    Ok(())
}

/// One-shot conversion of a complete markup document.
pub fn convert_markup(bytes: &[u8], opts: ConvertOptions) -> Result<DocumentOutput, ConvertError> {
    let mut conv = DocConverter::new(opts);
    feed_markup(&mut conv, bytes)?;
    conv.end_document()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocElement;

    #[test]
    fn namespaced_tags_are_stripped_and_lowercased() {
        let out = convert_markup(
            b"<html:P>Hello <html:B>there</html:B></html:P>",
            ConvertOptions::default(),
        )
        .unwrap();
        let DocElement::Paragraph(p) = &out.elements[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(p.text(), "Hello there");
        assert!(p.runs[1].style.bold);
    }

    #[test]
    fn self_closing_break_splits_text() {
        let out = convert_markup(b"<p>one<br/>two</p>", ConvertOptions::default()).unwrap();
        let DocElement::Paragraph(p) = &out.elements[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(p.text(), "one\ntwo");
    }

    #[test]
    fn entities_resolve_to_characters() {
        let out = convert_markup(b"<p>a &amp; b</p>", ConvertOptions::default()).unwrap();
        let DocElement::Paragraph(p) = &out.elements[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(p.text(), "a & b");
    }

    #[test]
    fn attribute_budget_is_enforced() {
        let opts = ConvertOptions {
            limits: crate::machine::ConvertLimits {
                max_attr_bytes: 8,
                ..Default::default()
            },
            ..ConvertOptions::default()
        };
        let err = convert_markup(b"<p class=\"averylongclassname\">x</p>", opts)
            .expect_err("limit should trip");
        assert_eq!(err.code, ConvertError::ATTR_BYTES_LIMIT);
        assert_eq!(err.tag.as_deref(), Some("p"));
    }

    #[test]
    fn tokenizer_errors_surface_with_offset() {
        let err = convert_markup(b"<p><![CDATA[unterminated", ConvertOptions::default())
            .expect_err("tokenizer should fail");
        assert_eq!(err.code, ConvertError::TOKENIZE_ERROR);
        assert!(err.offset.is_some());
    }
}
