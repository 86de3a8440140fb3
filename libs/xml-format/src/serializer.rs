//! Fragment tree to XML text

use crate::error::Result;
use crate::text::{comment_text, escape_attribute, escape_text, normalize};
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::Writer;
use std::borrow::Cow;
use tracing::debug;
use xmlview_engine::{AttributeFragment, ElementFragment, Fragment, FragmentDocument};
use xmlview_model::Namespace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializerOptions {
    /// Spaces per nesting level in formatted output.
    pub indent: usize,
    /// Overrides the document's own format flag.
    pub formatted: Option<bool>,
    /// Emit `<?xml version="1.0" encoding="UTF-8"?>`.
    pub declaration: bool,
}

impl Default for SerializerOptions {
    fn default() -> Self {
        Self {
            indent: 4,
            formatted: None,
            declaration: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct XmlSerializer {
    options: SerializerOptions,
}

impl XmlSerializer {
    pub fn new(options: SerializerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SerializerOptions {
        &self.options
    }

    pub fn serialize(&self, document: &FragmentDocument) -> Result<String> {
        let formatted = self.options.formatted.unwrap_or(document.formatted);
        let mut emitter = Emitter {
            writer: Writer::new(Vec::new()),
            formatted,
            indent: self.options.indent,
            scope: Vec::new(),
        };
        if self.options.declaration {
            emitter
                .writer
                .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
            emitter.line_break(0)?;
        }
        emitter.element(&document.root, 0)?;
        let text = String::from_utf8(emitter.writer.into_inner())?;
        debug!(document = %document.name, bytes = text.len(), formatted, "serialized document");
        Ok(text)
    }

    pub fn serialize_all(&self, documents: &[FragmentDocument]) -> Result<Vec<String>> {
        documents.iter().map(|d| self.serialize(d)).collect()
    }
}

/// Serialize with default options.
pub fn to_string(document: &FragmentDocument) -> Result<String> {
    XmlSerializer::default().serialize(document)
}

struct Emitter {
    writer: Writer<Vec<u8>>,
    formatted: bool,
    indent: usize,
    /// In-scope namespace bindings, innermost last.
    scope: Vec<Namespace>,
}

impl Emitter {
    fn line_break(&mut self, level: usize) -> Result<()> {
        if self.formatted {
            let whitespace = format!("\r\n{}", " ".repeat(level * self.indent));
            self.writer
                .write_event(Event::Text(BytesText::from_escaped(whitespace)))?;
        }
        Ok(())
    }

    fn lookup(&self, prefix: &str) -> Option<&str> {
        self.scope
            .iter()
            .rev()
            .find(|ns| ns.prefix == prefix)
            .map(|ns| ns.uri.as_str())
    }

    /// Queue a declaration of `ns` unless it is already in scope.
    fn require(&self, ns: &Namespace, declared: &mut Vec<Namespace>) {
        if declared.iter().any(|d| d.prefix == ns.prefix) {
            return;
        }
        if self.lookup(&ns.prefix) == Some(ns.uri.as_str()) {
            return;
        }
        declared.push(ns.clone());
    }

    /// Declarations for `element` plus the binding each attribute is written
    /// under. An attribute whose prefix is taken by a different URI on this
    /// element is moved to a fresh `nsN` prefix.
    fn declarations(
        &self,
        element: &ElementFragment,
    ) -> (Vec<Namespace>, Vec<Option<Namespace>>) {
        let mut declared: Vec<Namespace> = Vec::new();
        match &element.namespace {
            Some(ns) => self.require(ns, &mut declared),
            None => {
                if self.lookup("").is_some_and(|uri| !uri.is_empty()) {
                    declared.push(Namespace::new("", ""));
                }
            }
        }
        // Explicit declarations are emitted even when already in scope.
        for ns in &element.declarations {
            if !declared.iter().any(|d| d.prefix == ns.prefix) {
                declared.push(ns.clone());
            }
        }
        let bindings = element
            .attributes
            .iter()
            .map(|attribute| {
                attribute_namespace(attribute)
                    .map(|ns| self.bind_attribute(element, ns, &mut declared))
            })
            .collect();
        if element.nil {
            self.require(&Namespace::xsi(), &mut declared);
        }
        (declared, bindings)
    }

    fn bind_attribute(
        &self,
        element: &ElementFragment,
        ns: &Namespace,
        declared: &mut Vec<Namespace>,
    ) -> Namespace {
        let clashes = match declared.iter().find(|d| d.prefix == ns.prefix) {
            Some(existing) => existing.uri != ns.uri,
            None => element
                .namespace
                .as_ref()
                .is_some_and(|own| own.prefix == ns.prefix && own.uri != ns.uri),
        };
        if !clashes {
            self.require(ns, declared);
            return ns.clone();
        }
        if let Some(existing) = declared
            .iter()
            .find(|d| !d.is_default() && d.uri == ns.uri)
        {
            return existing.clone();
        }
        let taken = |prefix: &str| {
            declared.iter().any(|d| d.prefix == prefix) || self.lookup(prefix).is_some()
        };
        let mut n = 1;
        while taken(&format!("ns{n}")) {
            n += 1;
        }
        let fresh = Namespace::new(format!("ns{n}"), ns.uri.clone());
        declared.push(fresh.clone());
        fresh
    }

    fn element(&mut self, element: &ElementFragment, level: usize) -> Result<()> {
        let (declared, bindings) = self.declarations(element);
        let mark = self.scope.len();

        let name = match &element.namespace {
            Some(ns) => ns.qualify(&element.name),
            None => element.name.clone(),
        };
        let mut start = BytesStart::new(name.as_str());
        for ns in &declared {
            let key = if ns.is_default() {
                "xmlns".to_string()
            } else {
                format!("xmlns:{}", ns.prefix)
            };
            push_attribute(&mut start, &key, &ns.uri);
        }
        for (attribute, binding) in element.attributes.iter().zip(&bindings) {
            let key = match binding {
                Some(ns) => ns.qualify(&attribute.name),
                None => attribute.name.clone(),
            };
            push_attribute(&mut start, &key, &attribute.value);
        }
        if element.nil {
            push_attribute(&mut start, &Namespace::xsi().qualify("nil"), "true");
        }
        self.scope.extend(declared);

        let text = element
            .text
            .as_deref()
            .map(|t| normalize(t, element.normalize))
            .filter(|t| !t.is_empty());

        if text.is_none() && element.children.is_empty() {
            self.writer.write_event(Event::Empty(start))?;
            self.scope.truncate(mark);
            return Ok(());
        }

        self.writer.write_event(Event::Start(start))?;
        if let Some(text) = text {
            self.writer
                .write_event(Event::Text(BytesText::from_escaped(escape_text(&text))))?;
        }
        for child in &element.children {
            self.line_break(level + 1)?;
            match child {
                Fragment::Element(child) => self.element(child, level + 1)?,
                Fragment::Comment(comment) => {
                    self.writer
                        .write_event(Event::Comment(BytesText::from_escaped(comment_text(comment))))?;
                }
            }
        }
        if !element.children.is_empty() {
            self.line_break(level)?;
        }
        self.writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
        self.scope.truncate(mark);
        Ok(())
    }
}

/// Attributes in a default-prefix namespace are unqualified.
fn attribute_namespace(attribute: &AttributeFragment) -> Option<&Namespace> {
    attribute.namespace.as_ref().filter(|ns| !ns.is_default())
}

fn push_attribute(start: &mut BytesStart<'_>, key: &str, value: &str) {
    start.push_attribute(Attribute {
        key: QName(key.as_bytes()),
        value: Cow::Owned(escape_attribute(value).into_owned().into_bytes()),
    });
}
