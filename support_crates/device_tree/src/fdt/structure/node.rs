//! Handling of single nodes inside the structure block

use crate::fdt::cursor::{Cursor, CursorError};
use crate::fdt::structure::property::{NodeProperty, PropertyIter, PropertyParseError};
use crate::fdt::structure::{peek_token, FDT_BEGIN_NODE, FDT_END, FDT_END_NODE, FDT_PROP};
use crate::fdt::Strings;
use core::mem;
use thiserror_no_std::Error;

/// How deeply nodes may be nested below the root node.
///
/// Parsing is recursive so an attacker controlled blob must not be able to nest arbitrarily deep.
pub const MAX_NODE_DEPTH: usize = 64;

const TOKEN_SIZE: usize = mem::size_of::<u32>();

#[derive(Debug, Error, Eq, PartialEq)]
pub enum NodeStructureError {
    #[error("The given buffer does not contain a FDT_BEGIN_NODE token at the start")]
    NoNodeBeginToken,
    #[error("The given buffer does not contain a FDT_END_NODE token at the end")]
    NoNodeEndToken,
    #[error("The given buffer does not contain a FDT_END token at the end")]
    NoStructEndToken,
    #[error("The given buffer contained a FDT_BEGIN_NODE token but it was not followed by a string encoding the nodes name")]
    NoNodeName,
    #[error("The given buffer contained a node name but it is invalid UTF-8 although node names are restricted to ASCII")]
    InvalidNodeName,
    #[error("The root node has a non-empty name")]
    InvalidRootNodeName,
    #[error("The node contained an invalid property: {0}")]
    InvalidProperty(#[from] PropertyParseError),
    #[error("Nodes are nested deeper than {MAX_NODE_DEPTH} levels")]
    TooDeep,
    #[error("The structure block ended in the middle of a node: {0}")]
    Truncated(#[from] CursorError),
}

/// A single node inside the structure block.
///
/// Each node consists of the following components:
/// - Node header which contains the node's name (which includes the units memory address if applicable)
/// - Node properties which each contain a name (that is looked up from the strings block) and a value of variable length.
/// - Any number of child nodes which are structured the same.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct StructureNode<'buf> {
    /// The name of the node
    pub name: &'buf str,
    /// How many levels below the root node this node is located
    pub depth: usize,
    /// The complete encoding of this node from its FDT_BEGIN_NODE up to and including its FDT_END_NODE token
    raw: &'buf [u8],
    /// The part of the underlying buffer that contains the nodes properties
    props_buf: &'buf [u8],
    /// The part of the underlying buffer that contains this nodes children
    children_buf: &'buf [u8],
    strings: Strings<'buf>,
}

/// Where the parts of a node were found, relative to the buffer it was parsed from
struct ParsedNode<'buf> {
    node: StructureNode<'buf>,
    /// Offset of the first byte after the node's FDT_END_NODE token
    end: usize,
    /// Offset of the first byte after the node's properties, which is where its children start
    children_begin: usize,
}

impl<'buf> StructureNode<'buf> {
    /// Interpret a buffer as the root node of the device tree.
    ///
    /// The buffer must hold the complete structure block, including its final FDT_END token.
    pub fn from_buffer_as_root(
        buf: &'buf [u8],
        strings: &Strings<'buf>,
    ) -> Result<Self, NodeStructureError> {
        let parsed = Self::parse(buf, strings, 0)?;

        if parsed.node.name != "" {
            return Err(NodeStructureError::InvalidRootNodeName);
        }

        let mut cursor = Cursor::new(buf);
        cursor.skip(parsed.end)?;
        if peek_token(&mut cursor).ok() != Some(FDT_END) {
            return Err(NodeStructureError::NoStructEndToken);
        }

        Ok(parsed.node)
    }

    /// Parse node information from a buffer which starts with the node (optionally preceded by FDT_NOP tokens)
    fn parse(
        buf: &'buf [u8],
        strings: &Strings<'buf>,
        depth: usize,
    ) -> Result<ParsedNode<'buf>, NodeStructureError> {
        if depth > MAX_NODE_DEPTH {
            return Err(NodeStructureError::TooDeep);
        }

        let mut cursor = Cursor::new(buf);
        if peek_token(&mut cursor).ok() != Some(FDT_BEGIN_NODE) {
            return Err(NodeStructureError::NoNodeBeginToken);
        }
        let node_begin = cursor.position();
        cursor.skip(TOKEN_SIZE)?;

        // extract node name which follows immediately after FDT_BEGIN_NODE
        let node_name = cursor
            .read_cstr()
            .map_err(|_| NodeStructureError::NoNodeName)?;
        let node_name_str = node_name
            .to_str()
            .map_err(|_| NodeStructureError::InvalidNodeName)?;
        cursor.align_to_token()?;

        // parse all properties and record where the last one was parsed
        let i_props_begin = cursor.position();
        while peek_token(&mut cursor) == Ok(FDT_PROP) {
            let (prop_size, _) = NodeProperty::from_buffer(cursor.rest(), strings)?;
            cursor.skip(prop_size)?;
            cursor.align_to_token()?;
        }
        let i_props_end = cursor.position();

        // parse all child nodes and record where the last one was parsed
        let i_children_begin = cursor.position();
        while peek_token(&mut cursor) == Ok(FDT_BEGIN_NODE) {
            let child = Self::parse(cursor.rest(), strings, depth + 1)?;
            cursor.skip(child.end)?;
        }
        let i_children_end = cursor.position();

        // assert that there is an FDT_NODE_END token now
        if peek_token(&mut cursor).ok() != Some(FDT_END_NODE) {
            return Err(NodeStructureError::NoNodeEndToken);
        }
        cursor.skip(TOKEN_SIZE)?;
        let end = cursor.position();

        Ok(ParsedNode {
            node: Self {
                name: node_name_str,
                depth,
                raw: &buf[node_begin..end],
                props_buf: &buf[i_props_begin..i_props_end],
                children_buf: &buf[i_children_begin..i_children_end],
                strings: *strings,
            },
            end,
            children_begin: i_children_begin,
        })
    }

    pub fn props(&self) -> PropertyIter<'buf> {
        PropertyIter::new(self.props_buf, self.strings)
    }

    pub fn children(&self) -> NodeIter<'buf> {
        NodeIter::new(self.children_buf, self.strings, self.depth + 1)
    }

    /// Find the property called `name`
    pub fn prop(&self, name: &str) -> Option<NodeProperty<'buf>> {
        self.props().find(|prop| prop.has_name(name))
    }

    /// Whether one of the entries of this nodes `compatible` property is exactly `compatible`.
    ///
    /// A `compatible` property that is not a valid string list never matches.
    pub fn is_compatible(&self, compatible: &str) -> bool {
        self.prop("compatible")
            .and_then(|prop| prop.as_string_list().ok())
            .is_some_and(|mut list| list.any(|entry| entry == compatible))
    }

    /// Iterate over this node and all of its descendants in the order in which they are encoded.
    ///
    /// This is a depth-first pre-order traversal which does not need any allocations.
    pub fn walk(&self) -> NodeWalk<'buf> {
        NodeWalk {
            cursor: Some(Cursor::new(self.raw)),
            strings: self.strings,
            depth: self.depth,
            open_nodes: 0,
        }
    }
}

/// An iterator over nodes that are encoded in a buffer
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct NodeIter<'buf> {
    pub buf: Option<&'buf [u8]>,
    pub strings: Strings<'buf>,
    depth: usize,
}

impl<'buf> NodeIter<'buf> {
    pub(super) fn new(buf: &'buf [u8], strings: Strings<'buf>, depth: usize) -> Self {
        Self {
            strings,
            buf: if buf.is_empty() { None } else { Some(buf) },
            depth,
        }
    }
}

impl<'buf> Iterator for NodeIter<'buf> {
    type Item = StructureNode<'buf>;

    fn next(&mut self) -> Option<Self::Item> {
        let buf = self.buf.take()?;
        let parsed = StructureNode::parse(buf, &self.strings, self.depth).ok()?;
        self.buf = buf.get(parsed.end..).filter(|rest| !rest.is_empty());
        Some(parsed.node)
    }
}

/// A depth-first iterator over a node and all of its descendants, see [`StructureNode::walk`].
///
/// The encoding is walked linearly: every FDT_BEGIN_NODE yields a node, FDT_END_NODE closes the innermost open node.
#[derive(Debug, Clone)]
pub struct NodeWalk<'buf> {
    cursor: Option<Cursor<'buf>>,
    strings: Strings<'buf>,
    depth: usize,
    open_nodes: usize,
}

impl<'buf> Iterator for NodeWalk<'buf> {
    type Item = StructureNode<'buf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let cursor = self.cursor.as_mut()?;
            match peek_token(cursor) {
                Ok(FDT_BEGIN_NODE) => {
                    let parsed =
                        match StructureNode::parse(cursor.rest(), &self.strings, self.depth) {
                            Ok(parsed) => parsed,
                            Err(_) => break,
                        };
                    // continue with the first child, the node's properties have already been looked at
                    if cursor.skip(parsed.children_begin).is_err() {
                        break;
                    }
                    self.depth += 1;
                    self.open_nodes += 1;
                    return Some(parsed.node);
                }
                Ok(FDT_END_NODE) if self.open_nodes > 0 => {
                    if cursor.skip(TOKEN_SIZE).is_err() {
                        break;
                    }
                    self.depth -= 1;
                    self.open_nodes -= 1;
                    if self.open_nodes == 0 {
                        break;
                    }
                }
                // properties trailing the children can not exist, so anything else ends the walk
                _ => break,
            }
        }

        self.cursor = None;
        None
    }
}
