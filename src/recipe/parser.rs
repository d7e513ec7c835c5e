// src/recipe/parser.rs

//! Recipe file parsing
//!
//! Parses the XML build-automation grammar into a `RecipeDocument`. The
//! grammar is treated as a fixed external format: `<project>` root,
//! `<target name="..">` children become named blocks, and every other
//! element becomes a directive. Element nesting below a directive is kept
//! as child directives, and directive names are never interpreted here —
//! unknown names stay opaque so a recipe parses even when an optional
//! handler is unavailable. Binding names to handlers happens later in
//! `recipe::descriptor`.

use crate::error::{Error, Result};
use crate::recipe::document::{Block, Directive, RecipeDocument};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;

const ROOT_ELEMENT: &str = "project";
const BLOCK_ELEMENT: &str = "target";

/// Parse a recipe from raw bytes
pub fn parse(bytes: &[u8]) -> Result<RecipeDocument> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();

    let mut doc_name: Option<String> = None;
    let mut implicit: Vec<Directive> = Vec::new();
    let mut named: Vec<Block> = Vec::new();
    let mut current_block: Option<Block> = None;
    let mut open: Vec<Directive> = Vec::new();

    loop {
        buf.clear();
        let offset = reader.buffer_position() as u64;
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| Error::parse(reader.buffer_position() as u64, e.to_string()))?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let empty = matches!(event, Event::Empty(_));
                let name = qualified_name(e);

                if doc_name.is_none() {
                    if name != ROOT_ELEMENT {
                        return Err(Error::parse(
                            offset,
                            format!("root element must be <{ROOT_ELEMENT}>, found <{name}>"),
                        ));
                    }
                    doc_name = Some(attribute(e, offset, "name")?.unwrap_or_default());
                    continue;
                }

                if open.is_empty() && current_block.is_none() && name == BLOCK_ELEMENT {
                    let block_name = attribute(e, offset, "name")?.ok_or_else(|| {
                        Error::parse(offset, format!("<{BLOCK_ELEMENT}> requires a name attribute"))
                    })?;
                    let block = Block {
                        name: block_name,
                        directives: Vec::new(),
                        executable: true,
                    };
                    if empty {
                        named.push(block);
                    } else {
                        current_block = Some(block);
                    }
                    continue;
                }

                let directive = Directive {
                    name,
                    attrs: attributes(e, offset)?,
                    children: Vec::new(),
                    offset,
                };
                if empty {
                    attach(directive, &mut open, &mut current_block, &mut implicit);
                } else {
                    open.push(directive);
                }
            }
            Event::End(_) => {
                if let Some(done) = open.pop() {
                    attach(done, &mut open, &mut current_block, &mut implicit);
                } else if let Some(block) = current_block.take() {
                    named.push(block);
                }
                // remaining End is </project>
            }
            Event::Eof => break,
            // Text, CDATA, comments, PIs and the XML declaration carry no
            // directive structure in this grammar
            _ => {}
        }
    }

    match doc_name {
        Some(name) => Ok(RecipeDocument::new(name, named, implicit)),
        None => Err(Error::parse(0, format!("document has no <{ROOT_ELEMENT}> root"))),
    }
}

/// Parse a recipe from a file
pub fn parse_recipe_file(path: &Path) -> Result<RecipeDocument> {
    let bytes = std::fs::read(path)?;
    parse(&bytes)
}

fn attach(
    directive: Directive,
    open: &mut [Directive],
    current_block: &mut Option<Block>,
    implicit: &mut Vec<Directive>,
) {
    if let Some(parent) = open.last_mut() {
        parent.children.push(directive);
    } else if let Some(block) = current_block.as_mut() {
        block.directives.push(directive);
    } else {
        implicit.push(directive);
    }
}

fn qualified_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn attributes(e: &BytesStart<'_>, offset: u64) -> Result<Vec<(String, String)>> {
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| Error::parse(offset, err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| Error::parse(offset, err.to_string()))?
            .into_owned();
        attrs.push((key, value));
    }
    Ok(attrs)
}

fn attribute(e: &BytesStart<'_>, offset: u64, name: &str) -> Result<Option<String>> {
    Ok(attributes(e, offset)?
        .into_iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v))
}
