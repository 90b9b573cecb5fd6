//! SOAP response parsing.
//!
//! The response body is converted into JSON generically: an element with
//! children becomes an object keyed by local name (repeated names become
//! arrays), a leaf becomes its text, and an `xsi:nil` leaf becomes `null`.
//! All `result` elements of the operation response form the
//! [`metadata::RemoteResponse`] body: one result is an object, several are an
//! array, none is `null`.

use metadata::TransportError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};

#[derive(Debug, Default)]
struct XmlNode {
    name: String,
    nil: bool,
    text: String,
    children: Vec<XmlNode>,
}

impl XmlNode {
    fn open(start: &BytesStart<'_>) -> Self {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let nil = start.attributes().flatten().any(|attr| {
            attr.key.local_name().as_ref() == b"nil" && attr.value.as_ref() == b"true"
        });
        Self {
            name,
            nil,
            ..Self::default()
        }
    }

    fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Text of an element with children is formatting whitespace and is
    /// dropped.
    fn to_json(&self) -> Value {
        if self.children.is_empty() {
            return if self.nil {
                Value::Null
            } else {
                Value::String(self.text.clone())
            };
        }
        let mut map = Map::new();
        for child in &self.children {
            let value = child.to_json();
            match map.get_mut(&child.name) {
                Some(Value::Array(items)) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    map.insert(child.name.clone(), value);
                }
            }
        }
        Value::Object(map)
    }
}

fn protocol(message: impl std::fmt::Display) -> TransportError {
    TransportError::Protocol {
        message: message.to_string(),
    }
}

fn parse_tree(xml: &str) -> Result<XmlNode, TransportError> {
    // Text is kept verbatim; leaf values may carry significant whitespace.
    let mut reader = Reader::from_str(xml);

    let mut stack = vec![XmlNode::default()];
    loop {
        match reader.read_event().map_err(protocol)? {
            Event::Start(start) => stack.push(XmlNode::open(&start)),
            Event::Empty(start) => {
                let node = XmlNode::open(&start);
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                }
            }
            Event::End(_) => {
                let node = stack.pop().ok_or_else(|| protocol("unbalanced end tag"))?;
                let parent = stack
                    .last_mut()
                    .ok_or_else(|| protocol("unbalanced end tag"))?;
                parent.children.push(node);
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(protocol)?;
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    match stack.pop() {
        Some(root) if stack.is_empty() => Ok(root),
        _ => Err(protocol("document ended inside an element")),
    }
}

/// Parses a SOAP response into the JSON body of its `result` elements.
///
/// A SOAP fault is returned as [`TransportError::RemoteApplication`]
/// carrying the fault code and string verbatim.
pub fn parse_response(xml: &str) -> Result<Value, TransportError> {
    let root = parse_tree(xml)?;
    let body = root
        .child("Envelope")
        .and_then(|envelope| envelope.child("Body"))
        .ok_or_else(|| protocol("response has no SOAP body"))?;
    let payload = body
        .children
        .first()
        .ok_or_else(|| protocol("SOAP body is empty"))?;

    if payload.name == "Fault" {
        let text = |name: &str| {
            payload
                .child(name)
                .map(|n| n.text.clone())
                .unwrap_or_default()
        };
        return Err(TransportError::RemoteApplication {
            fault_code: text("faultcode"),
            message: text("faultstring"),
        });
    }

    let mut results: Vec<Value> = payload
        .children
        .iter()
        .filter(|c| c.name == "result")
        .map(XmlNode::to_json)
        .collect();
    Ok(match results.len() {
        0 => Value::Null,
        1 => results.remove(0),
        _ => Value::Array(results),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn envelope(body: &str) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <soapenv:Envelope xmlns:soapenv=\"http://schemas.xmlsoap.org/soap/envelope/\" \
             xmlns=\"http://soap.sforce.com/2006/04/metadata\" \
             xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">\
             <soapenv:Body>{body}</soapenv:Body></soapenv:Envelope>"
        )
    }

    #[test]
    fn single_result_becomes_an_object() {
        let xml = envelope(
            "<createMetadataResponse><result>\
             <fullName>TestPage</fullName><success>true</success>\
             </result></createMetadataResponse>",
        );
        assert_eq!(
            parse_response(&xml).unwrap(),
            json!({"fullName": "TestPage", "success": "true"})
        );
    }

    #[test]
    fn leaf_text_keeps_surrounding_whitespace() {
        let xml = envelope(
            "<readMetadataResponse>\n  <result>\n    <records>\n      \
             <fullName>Page</fullName>\n      \
             <description>  padded text  </description>\n      \
             <label> </label>\n    </records>\n  </result>\n</readMetadataResponse>",
        );
        assert_eq!(
            parse_response(&xml).unwrap(),
            json!({"records": {
                "fullName": "Page",
                "description": "  padded text  ",
                "label": " "
            }})
        );
    }

    #[test]
    fn repeated_results_and_fields_become_arrays() {
        let xml = envelope(
            "<deleteMetadataResponse>\
             <result><fullName>A</fullName><success>true</success></result>\
             <result><fullName>B</fullName><success>false</success>\
               <errors><message>one</message></errors>\
               <errors><message>two</message></errors></result>\
             </deleteMetadataResponse>",
        );
        assert_eq!(
            parse_response(&xml).unwrap(),
            json!([
                {"fullName": "A", "success": "true"},
                {"fullName": "B", "success": "false",
                 "errors": [{"message": "one"}, {"message": "two"}]}
            ])
        );
    }

    #[test]
    fn text_is_unescaped_and_nil_is_null() {
        let xml = envelope(
            "<readMetadataResponse><result><records xsi:type=\"ApexPage\">\
             <fullName>P</fullName><description>a &lt;b&gt; &amp; c</description>\
             <label xsi:nil=\"true\"/></records></result></readMetadataResponse>",
        );
        assert_eq!(
            parse_response(&xml).unwrap(),
            json!({"records": {"fullName": "P", "description": "a <b> & c", "label": null}})
        );
    }

    #[test]
    fn empty_response_is_null() {
        let xml = envelope("<describeResponse/>");
        assert_eq!(parse_response(&xml).unwrap(), Value::Null);
    }

    #[test]
    fn faults_become_remote_application_errors() {
        let xml = envelope(
            "<soapenv:Fault><faultcode>sf:INVALID_SESSION_ID</faultcode>\
             <faultstring>INVALID_SESSION_ID: Invalid Session ID</faultstring></soapenv:Fault>",
        );
        assert_eq!(
            parse_response(&xml).unwrap_err(),
            TransportError::RemoteApplication {
                fault_code: "sf:INVALID_SESSION_ID".to_string(),
                message: "INVALID_SESSION_ID: Invalid Session ID".to_string(),
            }
        );
    }

    #[test]
    fn malformed_documents_are_protocol_errors() {
        assert!(matches!(
            parse_response("<html>oops</html>"),
            Err(TransportError::Protocol { .. })
        ));
        assert!(matches!(
            parse_response("<a><b></a>"),
            Err(TransportError::Protocol { .. })
        ));
    }
}
