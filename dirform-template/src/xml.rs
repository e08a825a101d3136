//! Minimal element tree over `quick-xml` events.
//!
//! Descriptors are small, so the builder works on a fully materialized tree
//! instead of streaming events.

use crate::{TemplateError, TemplateResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// One XML element with its attributes, child elements and text content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    /// Concatenated text and CDATA content, trimmed.
    pub text: String,
}

impl XmlElement {
    /// Parses a document and returns its root element.
    pub fn parse(xml: &str) -> TemplateResult<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root = None;
        let mut buf = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| TemplateError::Xml(format!("at byte {}: {}", reader.buffer_position(), e)))?;
            match event {
                Event::Start(ref e) => stack.push(Self::open(e)?),
                Event::Empty(ref e) => {
                    let element = Self::open(e)?;
                    Self::attach(element, &mut stack, &mut root);
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| TemplateError::Xml("unbalanced end tag".to_string()))?;
                    Self::attach(element, &mut stack, &mut root);
                }
                Event::Text(ref t) => {
                    let text = t
                        .unescape()
                        .map_err(|e| TemplateError::Xml(format!("bad text: {}", e)))?;
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(text.trim());
                    }
                }
                Event::CData(ref c) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(String::from_utf8_lossy(c).trim());
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(TemplateError::Xml("unexpected end of document".to_string()));
        }
        root.ok_or_else(|| TemplateError::Xml("empty document".to_string()))
    }

    fn open(start: &BytesStart) -> TemplateResult<Self> {
        let name = String::from_utf8_lossy(start.name().as_ref()).to_string();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| TemplateError::Xml(format!("attribute error in <{}>: {}", name, e)))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = attr
                .unescape_value()
                .map_err(|e| TemplateError::Xml(format!("attribute error in <{}>: {}", name, e)))?
                .to_string();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
            text: String::new(),
        })
    }

    fn attach(element: XmlElement, stack: &mut [XmlElement], root: &mut Option<XmlElement>) {
        match stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None => *root = Some(element),
        }
    }

    /// Value of attribute `key`.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Integer attribute, `None` if absent or not a number.
    pub fn attr_u32(&self, key: &str) -> Option<u32> {
        self.attr(key).and_then(|v| v.trim().parse().ok())
    }

    /// First child element named `name`.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All child elements named `name`.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text of the first child named `name`.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_text() {
        let root = XmlElement::parse(
            r#"<ui version="4.0"><class>Foo</class><widget class="QWidget" name="w"/></ui>"#,
        )
        .unwrap();
        assert_eq!(root.name, "ui");
        assert_eq!(root.attr("version"), Some("4.0"));
        assert_eq!(root.child_text("class"), Some("Foo"));
        assert_eq!(root.child("widget").unwrap().attr("name"), Some("w"));
    }

    #[test]
    fn unescapes_entities() {
        let root = XmlElement::parse("<string>a &amp; b</string>").unwrap();
        assert_eq!(root.text, "a & b");
    }

    #[test]
    fn rejects_truncated_document() {
        assert!(XmlElement::parse("<ui><widget>").is_err());
    }
}
