//! Parser for the analyzed declaration language
//!
//! Produces a lossless [`SyntaxTree`]: every character of the input, trivia
//! included, ends up in exactly one leaf. The grammar is the declaration
//! subset the checks operate on: `package`/`import` directives, `class`,
//! `fun` and `val`/`var` declarations, brace blocks, and enough of the
//! expression language (calls, member access, binary operators, assignment)
//! to locate usages and continuation lines.
//!
//! Parsing is deterministic and side-effect-free. Any syntax error makes
//! `parse` return `Err`; the commented-code detector relies on that to treat
//! a failed trial reparse as a normal, expected outcome.

use crate::tree::{NodeId, SyntaxKind, SyntaxTree};
use thiserror::Error;

/// Parse failure for one input
#[derive(Debug, Error)]
#[error("syntax error at line {line}: {message} ({error_count} error(s) total)")]
pub struct ParseError {
    /// 1-based line of the first error
    pub line: usize,
    /// First error message
    pub message: String,
    /// Total number of syntax errors found
    pub error_count: usize,
}

const KEYWORDS: &[&str] = &[
    "package", "import", "class", "object", "fun", "val", "var", "return", "true", "false", "null",
];

const OPERATORS: &[&str] = &[
    "==", "!=", "<=", ">=", "&&", "||", "?:", "+=", "-=", "=", "+", "-", "*", "/", "%", "<", ">",
    "!",
];

#[derive(Debug, Clone)]
struct Token {
    kind: SyntaxKind,
    text: String,
    offset: usize,
}

/// Parse source text into a lossless tree.
///
/// In script mode bare statements are allowed at the top level; otherwise the
/// top level must consist of directives and declarations only.
pub fn parse(text: &str, is_script: bool) -> Result<SyntaxTree, ParseError> {
    let tokens = tokenize(text);
    let mut parser = Parser {
        tokens,
        pos: 0,
        tree: SyntaxTree::new(SyntaxKind::File),
        errors: Vec::new(),
        is_script,
        line_starts: std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect(),
    };
    parser.parse_file();
    let mut tree = parser.tree;
    tree.finalize();

    if let Some((offset, message)) = parser.errors.first().cloned() {
        let line = parser
            .line_starts
            .partition_point(|&start| start <= offset);
        return Err(ParseError {
            line,
            message,
            error_count: parser.errors.len(),
        });
    }
    Ok(tree)
}

/// True when the text parses without a single syntax error
pub fn parses_cleanly(text: &str, is_script: bool) -> bool {
    parse(text, is_script).is_ok()
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut i = 0;

    // `i` always sits on a char boundary: every branch advances by whole
    // characters, so non-ASCII input can never split a slice.
    while let Some(c) = text[i..].chars().next() {
        let start = i;

        if c.is_whitespace() {
            i = scan_while(text, i, char::is_whitespace);
            tokens.push(Token {
                kind: SyntaxKind::Whitespace,
                text: text[start..i].to_string(),
                offset: start,
            });
            continue;
        }

        if text[i..].starts_with("//") {
            i = text[i..].find('\n').map(|p| i + p).unwrap_or(text.len());
            tokens.push(Token {
                kind: SyntaxKind::EolComment,
                text: text[start..i].to_string(),
                offset: start,
            });
            continue;
        }

        if text[i..].starts_with("/*") {
            let kind = if text[i..].starts_with("/**") && !text[i..].starts_with("/**/") {
                SyntaxKind::DocComment
            } else {
                SyntaxKind::BlockComment
            };
            i = text[i + 2..]
                .find("*/")
                .map(|p| i + 2 + p + 2)
                .unwrap_or(text.len());
            tokens.push(Token {
                kind,
                text: text[start..i].to_string(),
                offset: start,
            });
            continue;
        }

        if c == '"' {
            let mut chars = text[i + 1..].chars();
            i += 1;
            while let Some(ch) = chars.next() {
                i += ch.len_utf8();
                match ch {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            i += escaped.len_utf8();
                        }
                    }
                    '"' => break,
                    _ => {}
                }
            }
            tokens.push(Token {
                kind: SyntaxKind::Literal,
                text: text[start..i].to_string(),
                offset: start,
            });
            continue;
        }

        if c.is_ascii_digit() {
            let mut chars = text[i..].char_indices().peekable();
            while let Some((off, ch)) = chars.next() {
                let dot_in_number =
                    ch == '.' && chars.peek().is_some_and(|&(_, next)| next.is_ascii_digit());
                if !ch.is_ascii_alphanumeric() && !dot_in_number {
                    break;
                }
                i = start + off + ch.len_utf8();
            }
            tokens.push(Token {
                kind: SyntaxKind::Literal,
                text: text[start..i].to_string(),
                offset: start,
            });
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            i = scan_while(text, i, |ch| ch.is_alphanumeric() || ch == '_');
            let word = &text[start..i];
            let kind = if KEYWORDS.contains(&word) {
                match word {
                    "true" | "false" | "null" => SyntaxKind::Literal,
                    _ => SyntaxKind::Keyword,
                }
            } else {
                SyntaxKind::Identifier
            };
            tokens.push(Token {
                kind,
                text: word.to_string(),
                offset: start,
            });
            continue;
        }

        if let Some(op) = OPERATORS.iter().find(|op| text[i..].starts_with(**op)) {
            i += op.len();
            tokens.push(Token {
                kind: SyntaxKind::Operator,
                text: op.to_string(),
                offset: start,
            });
            continue;
        }

        // Everything else is structural punctuation: braces, parens, commas,
        // colons, dots, semicolons, question marks. Characters outside the
        // grammar land here too and surface as ordinary syntax errors.
        i += c.len_utf8();
        tokens.push(Token {
            kind: SyntaxKind::Punct,
            text: c.to_string(),
            offset: start,
        });
    }

    tokens
}

/// First byte offset at or after `from` whose character fails `pred`
fn scan_while(text: &str, from: usize, pred: impl Fn(char) -> bool) -> usize {
    text[from..]
        .find(|ch: char| !pred(ch))
        .map(|p| from + p)
        .unwrap_or(text.len())
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    tree: SyntaxTree,
    errors: Vec<(usize, String)>,
    is_script: bool,
    line_starts: Vec<usize>,
}

impl Parser {
    // ----- token helpers -----

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Next significant token, skipping trivia without consuming
    fn peek(&self) -> Option<&Token> {
        self.tokens[self.pos..]
            .iter()
            .find(|t| !t.kind.is_trivia())
    }

    fn peek_text(&self) -> &str {
        self.peek().map(|t| t.text.as_str()).unwrap_or("")
    }

    fn peek_kind(&self) -> Option<SyntaxKind> {
        self.peek().map(|t| t.kind)
    }

    /// Second significant token ahead
    fn peek2(&self) -> Option<&Token> {
        self.tokens[self.pos..]
            .iter()
            .filter(|t| !t.kind.is_trivia())
            .nth(1)
    }

    /// True when trivia between the cursor and the next significant token
    /// contains a newline
    fn newline_before_next(&self) -> bool {
        for t in &self.tokens[self.pos..] {
            if !t.kind.is_trivia() {
                return false;
            }
            if t.text.contains('\n') {
                return true;
            }
        }
        false
    }

    /// Attach pending trivia leaves to `parent`
    fn eat_trivia(&mut self, parent: NodeId) {
        while self.pos < self.tokens.len() && self.tokens[self.pos].kind.is_trivia() {
            let t = self.tokens[self.pos].clone();
            self.tree.push_leaf(parent, t.kind, &t.text);
            self.pos += 1;
        }
    }

    /// Consume the next significant token as a leaf of `parent`
    fn bump(&mut self, parent: NodeId) {
        self.eat_trivia(parent);
        if self.pos < self.tokens.len() {
            let t = self.tokens[self.pos].clone();
            self.tree.push_leaf(parent, t.kind, &t.text);
            self.pos += 1;
        }
    }

    /// Consume the next significant token if its text matches
    fn accept(&mut self, parent: NodeId, text: &str) -> bool {
        if self.peek_text() == text {
            self.bump(parent);
            true
        } else {
            false
        }
    }

    fn expect(&mut self, parent: NodeId, text: &str) {
        if !self.accept(parent, text) {
            self.error_here(&format!("expected '{}'", text));
        }
    }

    fn error_here(&mut self, message: &str) {
        let offset = self
            .peek()
            .map(|t| t.offset)
            .unwrap_or_else(|| self.tokens.last().map(|t| t.offset).unwrap_or(0));
        self.errors.push((offset, message.to_string()));
    }

    /// Record an error and consume the offending token so parsing advances
    fn error_and_bump(&mut self, parent: NodeId, message: &str) {
        self.error_here(message);
        self.bump(parent);
    }

    /// Statements are separated by newlines or semicolons; anything else on
    /// the same line is a syntax error. A trailing semicolon is consumed.
    fn expect_statement_end(&mut self, parent: NodeId) {
        if self.peek_text() == ";" {
            self.bump(parent);
            return;
        }
        if self.newline_before_next() {
            return;
        }
        if !matches!(self.peek_text(), "" | "}") {
            self.error_here("expected a newline or ';' after the statement");
        }
    }

    // ----- grammar -----

    fn parse_file(&mut self) {
        let root = self.tree.root();
        while !self.at_end() {
            self.eat_trivia(root);
            if self.at_end() {
                break;
            }
            match self.peek_text() {
                "package" => self.parse_directive(root, SyntaxKind::PackageDirective),
                "import" => self.parse_directive(root, SyntaxKind::ImportDirective),
                "class" | "object" => self.parse_class(root),
                "fun" => self.parse_fun(root),
                "val" | "var" => self.parse_property(root),
                ";" => self.bump(root),
                _ => {
                    if self.is_script {
                        self.parse_statement(root);
                    } else {
                        self.error_and_bump(root, "expected a declaration at top level");
                        continue;
                    }
                }
            }
            self.expect_statement_end(root);
        }
    }

    fn parse_directive(&mut self, parent: NodeId, kind: SyntaxKind) {
        let node = self.tree.push_interior(parent, kind);
        self.bump(node); // package / import
        if self.peek_kind() != Some(SyntaxKind::Identifier) {
            self.error_here("expected a qualified name");
            return;
        }
        self.bump(node);
        while self.peek_text() == "." {
            self.bump(node); // '.'
            if self.peek_kind() == Some(SyntaxKind::Identifier) || self.peek_text() == "*" {
                self.bump(node);
            } else {
                self.error_here("expected a name segment after '.'");
                break;
            }
        }
    }

    fn parse_class(&mut self, parent: NodeId) {
        let node = self.tree.push_interior(parent, SyntaxKind::ClassDecl);
        self.bump(node); // class / object
        if self.peek_kind() == Some(SyntaxKind::Identifier) {
            self.bump(node);
        } else {
            self.error_here("expected a class name");
        }
        if self.peek_text() == "(" {
            self.parse_param_list(node);
        }
        if self.peek_text() == ":" {
            self.bump(node); // ':'
            self.parse_super_type_list(node);
        }
        if self.peek_text() == "{" {
            self.parse_block(node);
        }
    }

    fn parse_super_type_list(&mut self, parent: NodeId) {
        let node = self.tree.push_interior(parent, SyntaxKind::SuperTypeList);
        loop {
            self.parse_type_ref(node);
            // Constructor call on a super type
            if self.peek_text() == "(" {
                self.parse_value_args(node);
            }
            if self.peek_text() == "," {
                self.bump(node);
            } else {
                break;
            }
        }
    }

    fn parse_fun(&mut self, parent: NodeId) {
        let node = self.tree.push_interior(parent, SyntaxKind::FunDecl);
        self.bump(node); // fun
        if self.peek_kind() == Some(SyntaxKind::Identifier) {
            self.bump(node);
        } else {
            self.error_here("expected a function name");
        }
        if self.peek_text() == "(" {
            self.parse_param_list(node);
        } else {
            self.error_here("expected a parameter list");
        }
        if self.peek_text() == ":" {
            self.bump(node);
            self.parse_type_ref(node);
        }
        if self.peek_text() == "{" {
            self.parse_block(node);
        } else if self.peek_text() == "=" {
            self.bump(node);
            self.parse_expression(node);
        }
    }

    fn parse_param_list(&mut self, parent: NodeId) {
        let node = self.tree.push_interior(parent, SyntaxKind::ParamList);
        self.expect(node, "(");
        while !self.at_end() && self.peek_text() != ")" {
            if self.accept(node, "val") || self.accept(node, "var") {
                // Constructor property parameter
            }
            if self.peek_kind() == Some(SyntaxKind::Identifier) {
                self.bump(node);
            } else {
                self.error_and_bump(node, "expected a parameter name");
                continue;
            }
            if self.accept(node, ":") {
                self.parse_type_ref(node);
            }
            if self.accept(node, "=") {
                self.parse_expression(node);
            }
            if !self.accept(node, ",") {
                break;
            }
        }
        self.expect(node, ")");
    }

    fn parse_type_ref(&mut self, parent: NodeId) {
        let node = self.tree.push_interior(parent, SyntaxKind::TypeRef);
        if self.peek_kind() == Some(SyntaxKind::Identifier) {
            self.bump(node);
        } else {
            self.error_here("expected a type name");
            return;
        }
        while self.peek_text() == "." && self.peek2().map(|t| t.kind) == Some(SyntaxKind::Identifier)
        {
            self.bump(node);
            self.bump(node);
        }
        if self.peek_text() == "<" {
            self.bump(node);
            loop {
                self.parse_type_ref(node);
                if !self.accept(node, ",") {
                    break;
                }
            }
            self.expect(node, ">");
        }
        self.accept(node, "?");
    }

    fn parse_block(&mut self, parent: NodeId) {
        let node = self.tree.push_interior(parent, SyntaxKind::Block);
        self.expect(node, "{");
        while !self.at_end() && self.peek_text() != "}" {
            self.parse_statement(node);
            self.expect_statement_end(node);
        }
        if !self.accept(node, "}") {
            self.error_here("expected '}'");
        }
    }

    fn parse_statement(&mut self, parent: NodeId) {
        self.eat_trivia(parent);
        match self.peek_text() {
            "class" | "object" => self.parse_class(parent),
            "fun" => self.parse_fun(parent),
            "val" | "var" => self.parse_property(parent),
            "return" => {
                let node = self.tree.push_interior(parent, SyntaxKind::ReturnStmt);
                self.bump(node);
                if !self.newline_before_next()
                    && !matches!(self.peek_text(), "}" | ";" | "")
                {
                    self.parse_expression(node);
                }
            }
            ";" => self.bump(parent),
            "" => {}
            "{" => self.parse_block(parent),
            _ => {
                let node = self.tree.push_interior(parent, SyntaxKind::ExprStmt);
                self.parse_expression(node);
            }
        }
    }

    fn parse_property(&mut self, parent: NodeId) {
        let node = self.tree.push_interior(parent, SyntaxKind::PropertyDecl);
        self.bump(node); // val / var
        if self.peek_kind() == Some(SyntaxKind::Identifier) {
            self.bump(node);
        } else {
            self.error_here("expected a property name");
            return;
        }
        if self.accept(node, ":") {
            self.parse_type_ref(node);
        }
        if self.peek_text() == "=" {
            self.bump(node);
            self.parse_expression(node);
        }
    }

    /// Expression with assignment as the lowest-precedence form
    fn parse_expression(&mut self, parent: NodeId) {
        let checkpoint = self.pos;
        self.parse_binary(parent);
        if self.peek_text() == "=" && self.pos > checkpoint {
            // Re-wrap would lose losslessness; assignment RHS simply continues
            // in the same parent. Statement-position assignments are what the
            // checks care about, and those read children linearly.
            let node = self.tree.push_interior(parent, SyntaxKind::BinaryExpr);
            self.bump(node); // '='
            self.parse_binary(node);
        }
    }

    fn parse_binary(&mut self, parent: NodeId) {
        self.parse_postfix(parent);
        loop {
            // A newline ends the expression unless the next line starts with
            // an operator or a member access (continuation layouts).
            if self.newline_before_next() {
                let continues = matches!(self.peek_kind(), Some(SyntaxKind::Operator))
                    && self.peek_text() != "!"
                    || self.peek_text() == ".";
                if !continues {
                    return;
                }
            }
            if self.peek_kind() == Some(SyntaxKind::Operator)
                && self.peek_text() != "="
                && self.peek_text() != "!"
            {
                let node = self.tree.push_interior(parent, SyntaxKind::BinaryExpr);
                self.bump(node); // operator
                self.parse_postfix(node);
            } else if self.peek_text() == "." {
                let node = self.tree.push_interior(parent, SyntaxKind::DotExpr);
                self.bump(node); // '.'
                if self.peek_kind() == Some(SyntaxKind::Identifier) {
                    self.bump(node);
                } else {
                    self.error_here("expected a member name after '.'");
                    return;
                }
                if self.peek_text() == "(" {
                    self.parse_value_args(node);
                }
            } else {
                return;
            }
        }
    }

    fn parse_postfix(&mut self, parent: NodeId) {
        match self.peek_kind() {
            Some(SyntaxKind::Literal) => self.bump(parent),
            Some(SyntaxKind::Identifier) => {
                if self.peek2().map(|t| t.text.as_str()) == Some("(") {
                    let node = self.tree.push_interior(parent, SyntaxKind::CallExpr);
                    self.bump(node); // callee
                    self.parse_value_args(node);
                } else {
                    self.bump(parent);
                }
            }
            Some(SyntaxKind::Operator) if self.peek_text() == "!" || self.peek_text() == "-" => {
                self.bump(parent);
                self.parse_postfix(parent);
            }
            Some(SyntaxKind::Punct) if self.peek_text() == "(" => {
                self.bump(parent);
                self.parse_expression(parent);
                self.expect(parent, ")");
            }
            _ => self.error_and_bump(parent, "expected an expression"),
        }
    }

    fn parse_value_args(&mut self, parent: NodeId) {
        let node = self.tree.push_interior(parent, SyntaxKind::ValueArgList);
        self.expect(node, "(");
        while !self.at_end() && self.peek_text() != ")" {
            self.parse_expression(node);
            if !self.accept(node, ",") {
                break;
            }
        }
        self.expect(node, ")");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::SyntaxKind;

    #[test]
    fn test_lossless_roundtrip() {
        let src = "package com.example\n\nclass Foo {\n    fun bar(x: Int): Int {\n        val y = x + 1\n        return y\n    }\n}\n";
        let tree = parse(src, false).unwrap();
        assert_eq!(tree.text(), src);
    }

    #[test]
    fn test_import_parses() {
        assert!(parses_cleanly("import some.pkg", false));
        assert!(parses_cleanly("import some.pkg.*", false));
        assert!(parses_cleanly("package a.b.c", false));
    }

    #[test]
    fn test_prose_does_not_parse() {
        assert!(!parses_cleanly("this explains the next line", true));
        assert!(!parses_cleanly("remember to call the helper first", true));
    }

    #[test]
    fn test_script_statements() {
        assert!(parses_cleanly("val x = listOf(1, 2)\nprintln(x)", true));
        // Bare statements are rejected outside script mode
        assert!(!parses_cleanly("println(1)", false));
    }

    #[test]
    fn test_unbalanced_braces_fail() {
        assert!(!parses_cleanly("fun f() { val x = 1", false));
        assert!(!parses_cleanly("fun f() { } }", false));
    }

    #[test]
    fn test_class_with_supertypes() {
        let src = "class Foo : Base(), Marker {\n}\n";
        let tree = parse(src, false).unwrap();
        let class = tree
            .descendants(tree.root())
            .find(|&n| tree.kind(n) == SyntaxKind::ClassDecl)
            .unwrap();
        assert!(tree
            .children(class)
            .iter()
            .any(|&c| tree.kind(c) == SyntaxKind::SuperTypeList));
        assert_eq!(tree.text(), src);
    }

    #[test]
    fn test_chained_call_continuation() {
        let src = "fun f() {\n    val x = builder()\n        .with(1)\n        .build()\n}\n";
        let tree = parse(src, false).unwrap();
        assert_eq!(tree.text(), src);
    }

    #[test]
    fn test_comment_kinds() {
        let src = "// eol\n/* block */\n/** doc */\nfun f() { }\n";
        let tree = parse(src, false).unwrap();
        let kinds: Vec<SyntaxKind> = tree
            .leaves(tree.root())
            .filter(|&l| tree.kind(l).is_comment())
            .map(|l| tree.kind(l))
            .collect();
        assert_eq!(
            kinds,
            vec![
                SyntaxKind::EolComment,
                SyntaxKind::BlockComment,
                SyntaxKind::DocComment
            ]
        );
    }

    #[test]
    fn test_two_identifiers_same_line_is_error() {
        assert!(!parses_cleanly("foo bar", true));
    }

    #[test]
    fn test_non_ascii_identifier_roundtrips() {
        let src = "fun f() {\n    val café = 1\n    println(café)\n}\n";
        let tree = parse(src, false).unwrap();
        assert_eq!(tree.text(), src);
    }

    #[test]
    fn test_non_ascii_punctuation_is_a_syntax_error() {
        // Out-of-grammar characters lex as punctuation, never panic.
        assert!(!parses_cleanly("val x = 1 — 2", true));
        assert!(!parses_cleanly("val x = €", true));
    }

    #[test]
    fn test_non_ascii_in_trivia_and_strings() {
        assert!(parses_cleanly("// prose with — and •\nfun f() { }\n", false));
        assert!(parses_cleanly("val s = \"héllo – wörld\"", true));
    }

    #[test]
    fn test_error_reports_line() {
        let err = parse("fun f() {\n  val = 3\n}", false).unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.error_count >= 1);
    }
}
