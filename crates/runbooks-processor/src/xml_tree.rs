//! Minimal XML-to-`serde_json::Value` tree builder, used so XML payloads
//! can share the structured metadata/searchable-projection path with JSON
//! (spec §4.C4: "for JSON/XML, keep the parsed tree").

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde_json::{Map, Value};

/// Parses `xml` into a nested object tree: each element becomes a key whose
/// value is either its text content (a string) or, when it has children, an
/// object merging them (repeated child tags collapse into an array).
pub fn parse(xml: &str) -> Result<Value, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text = true;

    let mut stack: Vec<(String, Map<String, Value>, String)> = Vec::new();
    let mut root: Option<Value> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                stack.push((name, Map::new(), String::new()));
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                insert_child(&mut stack, &mut root, name, Value::String(String::new()));
            }
            Event::Text(t) => {
                if let Some((_, _, text)) = stack.last_mut() {
                    text.push_str(&t.unescape().unwrap_or_default());
                }
            }
            Event::End(_) => {
                if let Some((name, children, text)) = stack.pop() {
                    let value = if children.is_empty() {
                        Value::String(text.trim().to_string())
                    } else {
                        Value::Object(children)
                    };
                    insert_child(&mut stack, &mut root, name, value);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(root.unwrap_or(Value::Object(Map::new())))
}

fn insert_child(
    stack: &mut [(String, Map<String, Value>, String)],
    root: &mut Option<Value>,
    name: String,
    value: Value,
) {
    match stack.last_mut() {
        Some((_, children, _)) => merge_child(children, name, value),
        None => *root = Some(value),
    }
}

fn merge_child(children: &mut Map<String, Value>, name: String, value: Value) {
    match children.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let previous = existing.take();
            *existing = Value::Array(vec![previous, value]);
        }
        None => {
            children.insert(name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_into_objects() {
        let xml = "<root><title>Outage</title><steps><step>one</step><step>two</step></steps></root>";
        let tree = parse(xml).unwrap();
        assert_eq!(tree["title"], Value::String("Outage".into()));
        assert_eq!(tree["steps"]["step"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn empty_elements_become_empty_strings() {
        let xml = "<root><flag/></root>";
        let tree = parse(xml).unwrap();
        assert_eq!(tree["flag"], Value::String(String::new()));
    }
}
