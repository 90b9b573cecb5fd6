//! SOAP 1.1 envelope rendering.
//!
//! A [`CallDescriptor`] body is a JSON object; each key becomes a child
//! element of the operation element, arrays become repeated elements, and
//! `null` values are omitted. Keys are converted to the lowerCamel form the
//! remote schema uses (`full_name` → `fullName`).
//!
//! The descriptor's [`TypeTag`] becomes an `xsi:type` attribute on every
//! top-level `metadata` element, or on the operation element itself when the
//! body has no `metadata` list.

use metadata::{CallDescriptor, TransportError, TypeTag};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde_json::Value;

const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Body key whose elements receive the schema-type attribute.
const TAGGED_KEY: &str = "metadata";

/// An XML namespace with the prefix used for it in rendered envelopes.
#[derive(Debug, Clone, Copy)]
pub struct Namespace {
    pub prefix: &'static str,
    pub uri: &'static str,
}

/// The Metadata API namespace. Its prefix matches [`TypeTag::NAMESPACE_PREFIX`]
/// so `tns:<Type>` resolves against it.
pub const METADATA: Namespace = Namespace {
    prefix: TypeTag::NAMESPACE_PREFIX,
    uri: "http://soap.sforce.com/2006/04/metadata",
};

/// The partner API namespace used for login.
pub const PARTNER: Namespace = Namespace {
    prefix: "urn",
    uri: "urn:partner.soap.sforce.com",
};

/// Renders a metadata call with a `SessionHeader` carrying `session_token`.
pub fn render_call(session_token: &str, request: &CallDescriptor) -> Result<String, TransportError> {
    render(
        METADATA,
        Some(session_token),
        request.operation().wire_name(),
        request.body(),
        request.type_tag(),
    )
}

/// Renders a complete envelope for `operation` in namespace `ns`.
pub fn render(
    ns: Namespace,
    session_token: Option<&str>,
    operation: &str,
    body: &Value,
    tag: Option<&TypeTag>,
) -> Result<String, TransportError> {
    let empty = serde_json::Map::new();
    let fields = match body {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            return Err(TransportError::Encoding {
                message: format!("call body must be an object, got {other}"),
            })
        }
    };

    let tag_value = tag.map(TypeTag::qualified_name);
    let tag_attr = tag_value
        .as_deref()
        .map(|value| (TypeTag::ATTRIBUTE, value));
    let (op_attr, metadata_attr) = if fields.contains_key(TAGGED_KEY) {
        (None, tag_attr)
    } else {
        (tag_attr, None)
    };

    let mut out = EnvelopeWriter::new(ns);
    out.emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    out.emit(Event::Start(
        BytesStart::new("soapenv:Envelope").with_attributes([
            ("xmlns:soapenv", SOAP_ENV_NS),
            ("xmlns:xsi", XSI_NS),
            (format!("xmlns:{}", ns.prefix).as_str(), ns.uri),
        ]),
    ))?;

    if let Some(token) = session_token {
        out.emit(Event::Start(BytesStart::new("soapenv:Header")))?;
        out.open("SessionHeader", None)?;
        out.field("sessionId", &Value::String(token.to_string()), None)?;
        out.close("SessionHeader")?;
        out.emit(Event::End(BytesEnd::new("soapenv:Header")))?;
    }

    out.emit(Event::Start(BytesStart::new("soapenv:Body")))?;
    out.open(operation, op_attr)?;
    for (name, value) in fields {
        let attr = if name == TAGGED_KEY { metadata_attr } else { None };
        out.field(name, value, attr)?;
    }
    out.close(operation)?;
    out.emit(Event::End(BytesEnd::new("soapenv:Body")))?;
    out.emit(Event::End(BytesEnd::new("soapenv:Envelope")))?;

    String::from_utf8(out.into_inner()).map_err(|e| TransportError::Encoding {
        message: e.to_string(),
    })
}

/// Converts `snake_case` keys to `lowerCamel`; other keys pass through.
pub fn wire_field_name(name: &str) -> String {
    let mut segments = name.split('_').filter(|s| !s.is_empty());
    let mut out = String::with_capacity(name.len());
    if let Some(first) = segments.next() {
        out.push_str(first);
    }
    for segment in segments {
        let mut chars = segment.chars();
        if let Some(c) = chars.next() {
            out.extend(c.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    if out.is_empty() {
        name.to_string()
    } else {
        out
    }
}

struct EnvelopeWriter {
    writer: Writer<Vec<u8>>,
    ns: Namespace,
}

impl EnvelopeWriter {
    fn new(ns: Namespace) -> Self {
        Self {
            writer: Writer::new(Vec::new()),
            ns,
        }
    }

    fn into_inner(self) -> Vec<u8> {
        self.writer.into_inner()
    }

    fn emit(&mut self, event: Event<'_>) -> Result<(), TransportError> {
        self.writer
            .write_event(event)
            .map_err(|e| TransportError::Encoding {
                message: e.to_string(),
            })
    }

    fn qualified(&self, name: &str) -> String {
        format!("{}:{}", self.ns.prefix, name)
    }

    fn open(&mut self, name: &str, attr: Option<(&str, &str)>) -> Result<(), TransportError> {
        let mut start = BytesStart::new(self.qualified(name));
        if let Some(attr) = attr {
            start.push_attribute(attr);
        }
        self.emit(Event::Start(start))
    }

    fn close(&mut self, name: &str) -> Result<(), TransportError> {
        let end = self.qualified(name);
        self.emit(Event::End(BytesEnd::new(end)))
    }

    fn field(
        &mut self,
        name: &str,
        value: &Value,
        attr: Option<(&str, &str)>,
    ) -> Result<(), TransportError> {
        let name = wire_field_name(name);
        match value {
            Value::Null => Ok(()),
            Value::Array(items) => {
                for item in items {
                    self.field(&name, item, attr)?;
                }
                Ok(())
            }
            Value::Object(map) => {
                self.open(&name, attr)?;
                for (child, child_value) in map {
                    self.field(child, child_value, None)?;
                }
                self.close(&name)
            }
            Value::String(text) => self.leaf(&name, text, attr),
            Value::Bool(b) => self.leaf(&name, &b.to_string(), attr),
            Value::Number(n) => self.leaf(&name, &n.to_string(), attr),
        }
    }

    fn leaf(&mut self, name: &str, text: &str, attr: Option<(&str, &str)>) -> Result<(), TransportError> {
        self.open(name, attr)?;
        self.emit(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }
}
