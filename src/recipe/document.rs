// src/recipe/document.rs

//! In-memory recipe document model
//!
//! A parsed recipe is a tree of blocks, each holding an ordered list of
//! directives. One block is always the implicit block: it has the empty
//! name and collects every directive declared outside any named block.
//! The implicit block is evaluated first during a full run; named blocks
//! only run when something references them.
//!
//! Directives keep their qualified names exactly as written, their
//! attributes in document order, and the byte offset of their opening
//! element so errors can point back into the source. Unknown directive
//! names are kept opaque here; binding a directive to a typed handler is
//! a separate resolution step (see `recipe::descriptor`).

/// Name of the implicit block
pub const IMPLICIT_BLOCK: &str = "";

/// A single operation invocation inside a block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Qualified element name as written, prefix preserved
    pub name: String,
    /// Attributes in document order
    pub attrs: Vec<(String, String)>,
    /// Nested child directives in document order
    pub children: Vec<Directive>,
    /// Byte offset of the opening element in the source document
    pub offset: u64,
}

impl Directive {
    /// Look up an attribute value by exact name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Element name without its namespace prefix
    pub fn local_name(&self) -> &str {
        match self.name.rsplit_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }

    /// Whether the name carries a namespace prefix
    pub fn is_namespaced(&self) -> bool {
        self.name.contains(':')
    }

    /// Child directives with the given local name, in document order
    pub fn children_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a Directive> {
        self.children.iter().filter(move |c| c.local_name() == local)
    }
}

/// A named or implicit grouping of directives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Block name; empty string for the implicit block
    pub name: String,
    /// Directives in document order
    pub directives: Vec<Directive>,
    /// False for blocks that are never entered (parse-only placeholders)
    pub executable: bool,
}

impl Block {
    /// Whether this is the implicit block
    pub fn is_implicit(&self) -> bool {
        self.name.is_empty()
    }
}

/// The parsed recipe: an ordered collection of blocks
///
/// Immutable once validation completes; the execution engine borrows it
/// and never copies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeDocument {
    /// Recipe name from the root element
    pub name: String,
    /// All blocks; index 0 is always the implicit block
    blocks: Vec<Block>,
}

impl RecipeDocument {
    /// Build a document from parsed blocks, guaranteeing the implicit
    /// block exists and sits first
    pub(crate) fn new(name: String, named_blocks: Vec<Block>, implicit: Vec<Directive>) -> Self {
        let mut blocks = Vec::with_capacity(named_blocks.len() + 1);
        blocks.push(Block {
            name: IMPLICIT_BLOCK.to_string(),
            directives: implicit,
            executable: true,
        });
        blocks.extend(named_blocks);
        RecipeDocument { name, blocks }
    }

    /// The implicit block; always present, possibly empty
    pub fn implicit_block(&self) -> &Block {
        &self.blocks[0]
    }

    /// Find a named block
    pub fn block(&self, name: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.name == name)
    }

    /// All blocks in document order, implicit first
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Every directive in the document paired with its enclosing block name,
    /// walking nested children too
    pub fn directives_with_blocks(&self) -> Vec<(&str, &Directive)> {
        let mut out = Vec::new();
        for block in &self.blocks {
            for directive in &block.directives {
                collect(&block.name, directive, &mut out);
            }
        }
        out
    }
}

fn collect<'a>(block: &'a str, d: &'a Directive, out: &mut Vec<(&'a str, &'a Directive)>) {
    out.push((block, d));
    for child in &d.children {
        collect(block, child, out);
    }
}
