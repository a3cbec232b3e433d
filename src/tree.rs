//! Arena-owned lossless syntax tree
//!
//! The tree owns every node. Interior nodes carry children, leaves carry the
//! source text; concatenating the leaves of any subtree yields exactly the
//! text that subtree was parsed from. Checks navigate by [`NodeId`]; fix-mode
//! mutations replace or remove subtrees by index in the parent's child list,
//! so a replaced subtree never leaves a dangling reference.
//!
//! Byte offsets are assigned once after parsing. A mutation leaves offsets of
//! later nodes stale; positions reported after a mutation refer to the text
//! as it was parsed.

use std::fmt;

/// Node kind tag. The set is closed: every node a parser produces carries
/// exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    /// Root of a parsed file
    File,
    /// `package a.b.c`
    PackageDirective,
    /// `import a.b.c`
    ImportDirective,
    /// `class Name(...) : Super { ... }`
    ClassDecl,
    /// `fun name(...): T { ... }`
    FunDecl,
    /// `val x: T = init` / `var x`
    PropertyDecl,
    /// Super-type list after the colon in a class header
    SuperTypeList,
    /// Declaration-site parameter list `(a: T, b: U)`
    ParamList,
    /// Call-site argument list `(a, b)`
    ValueArgList,
    /// Brace-delimited block
    Block,
    /// `/** ... */`
    DocComment,
    /// `// ...`
    EolComment,
    /// `/* ... */`
    BlockComment,
    /// Spaces, tabs and newlines
    Whitespace,
    /// Binary/assignment operator token
    Operator,
    Identifier,
    Keyword,
    Literal,
    /// Structural punctuation: braces, parens, commas, colons, dots
    Punct,
    /// Type reference `List<String>`
    TypeRef,
    /// Call expression `f(...)`
    CallExpr,
    /// Member access chain `a.b.c`
    DotExpr,
    /// Binary expression `a + b`
    BinaryExpr,
    ReturnStmt,
    /// Expression used in statement position
    ExprStmt,
    /// Unparsable region
    Error,
}

impl SyntaxKind {
    /// Whitespace and comments
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            SyntaxKind::Whitespace
                | SyntaxKind::EolComment
                | SyntaxKind::BlockComment
                | SyntaxKind::DocComment
        )
    }

    /// Comment kinds only
    pub fn is_comment(self) -> bool {
        matches!(
            self,
            SyntaxKind::EolComment | SyntaxKind::BlockComment | SyntaxKind::DocComment
        )
    }

    /// Kinds that appear in statement position inside a block
    pub fn is_statement(self) -> bool {
        matches!(
            self,
            SyntaxKind::PropertyDecl
                | SyntaxKind::ExprStmt
                | SyntaxKind::ReturnStmt
                | SyntaxKind::ClassDecl
                | SyntaxKind::FunDecl
        )
    }
}

impl fmt::Display for SyntaxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Stable identity of a node within its tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: SyntaxKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Leaf text; `None` for interior nodes
    text: Option<String>,
    /// Byte offset at parse time
    offset: usize,
}

/// Line lookup table built from the source at parse time
#[derive(Debug, Clone, Default)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { line_starts }
    }

    /// Convert a byte offset to a 1-based (line, column) pair
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let col = offset - self.line_starts.get(line.saturating_sub(1)).unwrap_or(&0) + 1;
        (line, col)
    }

    /// 1-based line containing the offset
    pub fn line_of(&self, offset: usize) -> usize {
        self.line_col(offset).0
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

/// The tree for one parsed file
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    nodes: Vec<NodeData>,
    root: NodeId,
    line_index: LineIndex,
}

impl SyntaxTree {
    /// Create a tree containing only a root node
    pub fn new(root_kind: SyntaxKind) -> Self {
        let root_data = NodeData {
            kind: root_kind,
            parent: None,
            children: Vec::new(),
            text: None,
            offset: 0,
        };
        Self {
            nodes: vec![root_data],
            root: NodeId(0),
            line_index: LineIndex::default(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Append an interior node under `parent`
    pub fn push_interior(&mut self, parent: NodeId, kind: SyntaxKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            kind,
            parent: Some(parent),
            children: Vec::new(),
            text: None,
            offset: 0,
        });
        self.nodes[parent.index()].children.push(id);
        id
    }

    /// Append a leaf node under `parent`
    pub fn push_leaf(&mut self, parent: NodeId, kind: SyntaxKind, text: &str) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            kind,
            parent: Some(parent),
            children: Vec::new(),
            text: Some(text.to_string()),
            offset: 0,
        });
        self.nodes[parent.index()].children.push(id);
        id
    }

    /// Create a detached interior node (for building replacement subtrees)
    pub fn new_detached(&mut self, kind: SyntaxKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
            text: None,
            offset: 0,
        });
        id
    }

    /// Create a detached leaf node
    pub fn new_detached_leaf(&mut self, kind: SyntaxKind, text: &str) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
            text: Some(text.to_string()),
            offset: 0,
        });
        id
    }

    /// Assign offsets in document order and build the line index.
    /// Called once by the parser after construction.
    pub fn finalize(&mut self) {
        let mut offset = 0usize;
        let order: Vec<NodeId> = self.descendants(self.root).collect();
        for id in order {
            self.nodes[id.index()].offset = offset;
            if let Some(text) = &self.nodes[id.index()].text {
                offset += text.len();
            }
        }
        let text = self.text();
        self.line_index = LineIndex::new(&text);
    }

    pub fn kind(&self, id: NodeId) -> SyntaxKind {
        self.nodes[id.index()].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    /// Byte offset assigned at parse time (stale after mutation)
    pub fn offset(&self, id: NodeId) -> usize {
        self.nodes[id.index()].offset
    }

    /// Leaf text, `None` for interior nodes
    pub fn leaf_text(&self, id: NodeId) -> Option<&str> {
        self.nodes[id.index()].text.as_deref()
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.nodes[id.index()].text.is_some()
    }

    /// 1-based (line, column) of the node's parse-time offset
    pub fn line_col(&self, id: NodeId) -> (usize, usize) {
        self.line_index.line_col(self.offset(id))
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    /// Text of a subtree, reassembled from its leaves
    pub fn text_of(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    /// Full document text
    pub fn text(&self) -> String {
        self.text_of(self.root)
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let data = &self.nodes[id.index()];
        if let Some(text) = &data.text {
            out.push_str(text);
        } else {
            for &child in &data.children {
                self.collect_text(child, out);
            }
        }
    }

    /// Pre-order traversal of a subtree, including `id` itself
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            stack: vec![id],
        }
    }

    /// Ancestors from the parent up to the root
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            current: self.parent(id),
        }
    }

    /// Leaves of a subtree in document order
    pub fn leaves(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.descendants(id).filter(|&n| self.is_leaf(n))
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&c| c == id)?;
        siblings.get(pos + 1).copied()
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&c| c == id)?;
        if pos == 0 {
            None
        } else {
            siblings.get(pos - 1).copied()
        }
    }

    /// A node is attached while its parent chain still reaches the root.
    /// Fix-mode mutations check this before touching a subtree that an
    /// earlier check in the same pass may already have replaced.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.parent(current) {
                Some(p) => current = p,
                None => return false,
            }
        }
    }

    /// Replace `old` with `new_node` at the same index in the parent's child
    /// list. The old subtree is detached.
    pub fn replace_node(&mut self, old: NodeId, new_node: NodeId) -> bool {
        let Some(parent) = self.parent(old) else {
            return false;
        };
        let Some(pos) = self.children(parent).iter().position(|&c| c == old) else {
            return false;
        };
        self.nodes[parent.index()].children[pos] = new_node;
        self.nodes[new_node.index()].parent = Some(parent);
        self.nodes[old.index()].parent = None;
        true
    }

    /// Remove a node from its parent's child list, detaching the subtree
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.parent(id) else {
            return false;
        };
        let Some(pos) = self.children(parent).iter().position(|&c| c == id) else {
            return false;
        };
        self.nodes[parent.index()].children.remove(pos);
        self.nodes[id.index()].parent = None;
        true
    }

    /// Insert a detached node under `parent` at `index`
    pub fn insert_node(&mut self, parent: NodeId, index: usize, id: NodeId) {
        let index = index.min(self.nodes[parent.index()].children.len());
        self.nodes[parent.index()].children.insert(index, id);
        self.nodes[id.index()].parent = Some(parent);
    }

    /// Rewrite the text of a leaf in place
    pub fn set_leaf_text(&mut self, id: NodeId, text: String) -> bool {
        if self.nodes[id.index()].text.is_none() {
            return false;
        }
        self.nodes[id.index()].text = Some(text);
        true
    }

    /// Nearest ancestor (or self) of the given kind
    pub fn ancestor_of_kind(&self, id: NodeId, kind: SyntaxKind) -> Option<NodeId> {
        if self.kind(id) == kind {
            return Some(id);
        }
        self.ancestors(id).find(|&a| self.kind(a) == kind)
    }
}

/// Pre-order iterator over a subtree
pub struct Descendants<'a> {
    tree: &'a SyntaxTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        let children = self.tree.children(id);
        for &child in children.iter().rev() {
            self.stack.push(child);
        }
        Some(id)
    }
}

/// Iterator over a node's ancestors
pub struct Ancestors<'a> {
    tree: &'a SyntaxTree,
    current: Option<NodeId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.current?;
        self.current = self.tree.parent(id);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> SyntaxTree {
        // fun f() { }
        let mut tree = SyntaxTree::new(SyntaxKind::File);
        let root = tree.root();
        let fun = tree.push_interior(root, SyntaxKind::FunDecl);
        tree.push_leaf(fun, SyntaxKind::Keyword, "fun");
        tree.push_leaf(fun, SyntaxKind::Whitespace, " ");
        tree.push_leaf(fun, SyntaxKind::Identifier, "f");
        let params = tree.push_interior(fun, SyntaxKind::ParamList);
        tree.push_leaf(params, SyntaxKind::Punct, "(");
        tree.push_leaf(params, SyntaxKind::Punct, ")");
        tree.push_leaf(fun, SyntaxKind::Whitespace, " ");
        let block = tree.push_interior(fun, SyntaxKind::Block);
        tree.push_leaf(block, SyntaxKind::Punct, "{");
        tree.push_leaf(block, SyntaxKind::Whitespace, " ");
        tree.push_leaf(block, SyntaxKind::Punct, "}");
        tree.finalize();
        tree
    }

    #[test]
    fn test_text_reassembly() {
        let tree = sample_tree();
        assert_eq!(tree.text(), "fun f() { }");
    }

    #[test]
    fn test_offsets_monotonic() {
        let tree = sample_tree();
        let mut last = 0;
        for id in tree.descendants(tree.root()) {
            assert!(tree.offset(id) >= last || !tree.is_leaf(id));
            if tree.is_leaf(id) {
                last = tree.offset(id);
            }
        }
    }

    #[test]
    fn test_line_col() {
        let index = LineIndex::new("ab\ncd\n");
        assert_eq!(index.line_col(0), (1, 1));
        assert_eq!(index.line_col(3), (2, 1));
        assert_eq!(index.line_col(4), (2, 2));
    }

    #[test]
    fn test_replace_detaches_old() {
        let mut tree = sample_tree();
        let root = tree.root();
        let fun = tree.children(root)[0];
        assert!(tree.is_attached(fun));

        let replacement = tree.new_detached(SyntaxKind::Error);
        assert!(tree.replace_node(fun, replacement));
        assert!(!tree.is_attached(fun));
        assert!(tree.is_attached(replacement));
    }

    #[test]
    fn test_remove_node() {
        let mut tree = sample_tree();
        let root = tree.root();
        let fun = tree.children(root)[0];
        assert!(tree.remove_node(fun));
        assert!(tree.children(root).is_empty());
        assert!(!tree.is_attached(fun));
        assert_eq!(tree.text(), "");
    }

    #[test]
    fn test_set_leaf_text() {
        let mut tree = sample_tree();
        let ws = tree
            .leaves(tree.root())
            .find(|&l| tree.kind(l) == SyntaxKind::Whitespace)
            .unwrap();
        assert!(tree.set_leaf_text(ws, "  ".to_string()));
        assert_eq!(tree.text(), "fun  f() { }");
    }

    #[test]
    fn test_siblings() {
        let tree = sample_tree();
        let root = tree.root();
        let fun = tree.children(root)[0];
        let kids = tree.children(fun);
        assert_eq!(tree.next_sibling(kids[0]), Some(kids[1]));
        assert_eq!(tree.prev_sibling(kids[1]), Some(kids[0]));
        assert_eq!(tree.prev_sibling(kids[0]), None);
    }

    #[test]
    fn test_ancestor_of_kind() {
        let tree = sample_tree();
        let brace = tree
            .leaves(tree.root())
            .find(|&l| tree.leaf_text(l) == Some("{"))
            .unwrap();
        let block = tree.ancestor_of_kind(brace, SyntaxKind::Block);
        assert!(block.is_some());
        assert_eq!(tree.kind(block.unwrap()), SyntaxKind::Block);
    }
}
