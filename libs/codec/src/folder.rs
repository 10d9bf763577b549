//! RFH2 folder markup
//!
//! Each RFH2 folder is a small XML-like document: one root element named after the
//! folder whose direct leaf children are the fields, e.g.
//! `<usr><count dt='i4'>5</count><name>abc</name></usr>`. The `dt` attribute carries the
//! field type; an absent `dt` means string. Only the subset the middleware emits is
//! understood here: elements, quoted attributes, text and the predefined entities.

use crate::error::{ProtocolError, ProtocolResult};
use crate::wire::trim_padding;
use types::{FieldValue, Rfh2Field};

const DATA_TYPE_ATTRIBUTE: &str = "dt";

/// Deepest element nesting accepted from the wire
pub(crate) const MAX_FOLDER_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Body {
    Text(String),
    Children(Vec<Element>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub body: Body,
}

impl Element {
    pub fn group(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: Vec::new(),
            body: Body::Children(Vec::new()),
        }
    }

    pub fn leaf(name: &str, data_type: Option<&str>, text: String) -> Self {
        let mut element = Self {
            name: name.to_string(),
            attributes: Vec::new(),
            body: Body::Text(text),
        };
        element.set_data_type(data_type);
        element
    }

    pub fn data_type(&self) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == DATA_TYPE_ATTRIBUTE)
            .map(|(_, value)| value.as_str())
    }

    fn set_data_type(&mut self, data_type: Option<&str>) {
        self.attributes.retain(|(name, _)| name != DATA_TYPE_ATTRIBUTE);
        if let Some(dt) = data_type {
            self.attributes
                .insert(0, (DATA_TYPE_ATTRIBUTE.to_string(), dt.to_string()));
        }
    }

    /// Replace type and text of a leaf, keeping any other attributes
    pub fn set_value(&mut self, data_type: Option<&str>, text: String) {
        self.set_data_type(data_type);
        self.body = Body::Text(text);
    }

    pub fn text(&self) -> Option<&str> {
        match &self.body {
            Body::Text(text) => Some(text),
            Body::Children(_) => None,
        }
    }

    /// The `occurrence`-th direct leaf child called `name`
    pub fn nth_leaf_mut(&mut self, name: &str, occurrence: usize) -> Option<&mut Element> {
        match &mut self.body {
            Body::Children(children) => children
                .iter_mut()
                .filter(|child| child.name == name && matches!(child.body, Body::Text(_)))
                .nth(occurrence),
            Body::Text(_) => None,
        }
    }

    /// Append a child; an empty text body turns into a child list
    pub fn push_child(&mut self, child: Element) -> Result<(), String> {
        match &mut self.body {
            Body::Children(children) => {
                children.push(child);
                Ok(())
            }
            Body::Text(text) if text.trim().is_empty() => {
                self.body = Body::Children(vec![child]);
                Ok(())
            }
            Body::Text(_) => Err(format!(
                "folder <{}> holds text and cannot take field <{}>",
                self.name, child.name
            )),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (name, value) in &self.attributes {
            out.push(' ');
            out.push_str(name);
            out.push_str("='");
            out.push_str(&escape(value));
            out.push('\'');
        }
        out.push('>');
        match &self.body {
            Body::Text(text) => out.push_str(&escape(text)),
            Body::Children(children) => {
                for child in children {
                    child.render_into(out);
                }
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

/// Parse one folder string into its root element
pub(crate) fn parse_folder(input: &str) -> Result<Element, String> {
    let mut parser = Parser {
        src: input,
        pos: 0,
        depth: 0,
    };
    parser.skip_whitespace();
    let element = parser.element()?;
    parser.skip_whitespace();
    if parser.pos != input.len() {
        return Err(format!("unexpected content after </{}> at {}", element.name, parser.pos));
    }
    Ok(element)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn expect(&mut self, token: &str) -> Result<(), String> {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            Ok(())
        } else {
            Err(format!("expected '{}' at {}", token, self.pos))
        }
    }

    fn name(&mut self) -> Result<&'a str, String> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| c.is_whitespace() || matches!(c, '<' | '>' | '/' | '=' | '\'' | '"'))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(format!("expected a name at {}", self.pos));
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    fn attribute_value(&mut self) -> Result<String, String> {
        let quote = match self.rest().chars().next() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(format!("expected quoted attribute value at {}", self.pos)),
        };
        self.pos += 1;
        let rest = self.rest();
        let end = rest
            .find(quote)
            .ok_or_else(|| format!("unterminated attribute value at {}", self.pos))?;
        self.pos += end + 1;
        unescape(&rest[..end])
    }

    fn element(&mut self) -> Result<Element, String> {
        if self.depth >= MAX_FOLDER_DEPTH {
            return Err(format!(
                "elements nested deeper than {} at {}",
                MAX_FOLDER_DEPTH, self.pos
            ));
        }
        self.depth += 1;
        let element = self.element_body();
        self.depth -= 1;
        element
    }

    fn element_body(&mut self) -> Result<Element, String> {
        self.expect("<")?;
        let name = self.name()?.to_string();
        let mut attributes = Vec::new();
        loop {
            self.skip_whitespace();
            if self.rest().starts_with("/>") {
                self.pos += 2;
                return Ok(Element {
                    name,
                    attributes,
                    body: Body::Text(String::new()),
                });
            }
            if self.rest().starts_with('>') {
                self.pos += 1;
                break;
            }
            let attribute = self.name()?.to_string();
            self.skip_whitespace();
            self.expect("=")?;
            self.skip_whitespace();
            attributes.push((attribute, self.attribute_value()?));
        }

        let content_start = self.pos;
        self.skip_whitespace();
        let body = if self.rest().starts_with('<') && !self.rest().starts_with("</") {
            let mut children = Vec::new();
            loop {
                self.skip_whitespace();
                if self.rest().starts_with("</") || self.rest().is_empty() {
                    break;
                }
                children.push(self.element()?);
            }
            Body::Children(children)
        } else {
            self.pos = content_start;
            let rest = self.rest();
            let end = rest
                .find('<')
                .ok_or_else(|| format!("unterminated element <{}>", name))?;
            self.pos += end;
            Body::Text(unescape(&rest[..end])?)
        };

        self.expect("</")?;
        let closing = self.name()?;
        if closing != name {
            return Err(format!("</{}> closes <{}>", closing, name));
        }
        self.skip_whitespace();
        self.expect(">")?;
        Ok(Element {
            name,
            attributes,
            body,
        })
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(text: &str) -> Result<String, String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let semi = after
            .find(';')
            .ok_or_else(|| format!("unterminated entity in {:?}", text))?;
        let entity = &after[..semi];
        let decoded = match entity {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "apos" => '\'',
            "quot" => '"',
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32)
                    .ok_or_else(|| format!("unknown entity &{};", entity))?
            }
        };
        out.push(decoded);
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Typed value of a leaf according to its `dt` attribute
pub(crate) fn decode_value(folder: &str, leaf: &Element) -> ProtocolResult<FieldValue> {
    let text = leaf.text().unwrap_or_default();
    let data_type = leaf.data_type().unwrap_or("string");
    let trimmed = text.trim();
    let invalid = || ProtocolError::invalid_field_value(folder, &leaf.name, data_type, text);

    let value = match data_type {
        "i1" => FieldValue::Byte(trimmed.parse().map_err(|_| invalid())?),
        "i2" => FieldValue::Long(i64::from(trimmed.parse::<i16>().map_err(|_| invalid())?)),
        "i4" | "int" => FieldValue::Long(i64::from(trimmed.parse::<i32>().map_err(|_| invalid())?)),
        "i8" => FieldValue::Long(trimmed.parse().map_err(|_| invalid())?),
        "r4" => FieldValue::Float(trimmed.parse().map_err(|_| invalid())?),
        "r8" => FieldValue::Double(trimmed.parse().map_err(|_| invalid())?),
        "boolean" => match trimmed.to_ascii_lowercase().as_str() {
            "1" | "true" => FieldValue::Bool(true),
            "0" | "false" => FieldValue::Bool(false),
            _ => return Err(invalid()),
        },
        "bin.hex" => FieldValue::Bytes(hex::decode(trimmed).map_err(|_| invalid())?),
        _ => FieldValue::String(text.to_string()),
    };
    Ok(value)
}

/// `dt` attribute and text written for a value
pub(crate) fn wire_form(value: &FieldValue) -> (Option<&'static str>, String) {
    match value {
        FieldValue::Int(v) => (Some("i4"), v.to_string()),
        FieldValue::Long(v) => (Some("i8"), (*v as i32).to_string()),
        FieldValue::Bool(v) => (Some("boolean"), if *v { "1" } else { "0" }.to_string()),
        FieldValue::Byte(v) => (Some("i1"), v.to_string()),
        FieldValue::Bytes(v) => (Some("bin.hex"), hex::encode(v)),
        FieldValue::Float(v) => (Some("r4"), v.to_string()),
        FieldValue::Double(v) => (Some("r4"), (*v as f32).to_string()),
        FieldValue::String(v) => (None, v.clone()),
    }
}

/// Flatten the direct leaf children of a folder into table entries
///
/// Blank folder strings hold no fields. Nested groups stay in the folder string only.
pub(crate) fn folder_fields(folder_string: &str) -> Result<Vec<Rfh2Field>, FolderError> {
    let trimmed = trim_padding(folder_string);
    if trimmed.trim().is_empty() {
        return Ok(Vec::new());
    }
    let root = parse_folder(trimmed).map_err(FolderError::Markup)?;
    let mut fields = Vec::new();
    if let Body::Children(children) = &root.body {
        for child in children.iter().filter(|c| matches!(c.body, Body::Text(_))) {
            fields.push(Rfh2Field {
                folder: root.name.clone(),
                field: child.name.clone(),
                value: decode_value(&root.name, child).map_err(FolderError::Value)?,
            });
        }
    }
    Ok(fields)
}

/// Folder failure, split so callers can attach header position to markup errors
#[derive(Debug)]
pub(crate) enum FolderError {
    Markup(String),
    Value(ProtocolError),
}
