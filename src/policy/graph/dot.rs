//! Parser for the subset of the DOT language used to describe policies
//!
//! Accepts a single `digraph` made of node statements, edge chains,
//! attribute lists, default-attribute statements and subgraphs. Attribute
//! values come back unquoted; their meaning is left to the graph compiler.

use crate::error::CompileError;
use std::collections::HashMap;

/// Ordered attribute list; later entries win on lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    /// Last value set for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Last value set under any of `keys`, treating them as one attribute
    pub fn get_any(&self, keys: &[&str]) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(k, _)| keys.contains(&k.as_str()))
            .map(|(_, v)| v.as_str())
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    pub fn extend(&mut self, other: &Attributes) {
        self.0.extend(other.0.iter().cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A node declaration, merged across repeated statements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DotNode {
    pub id: String,
    pub attrs: Attributes,
}

/// A single directed edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DotEdge {
    pub from: String,
    pub to: String,
    pub attrs: Attributes,
}

/// Parsed graph: nodes in first-seen order, edges in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DotGraph {
    pub nodes: Vec<DotNode>,
    pub edges: Vec<DotEdge>,
}

impl DotGraph {
    pub fn node(&self, id: &str) -> Option<&DotNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Deepest subgraph nesting accepted
const MAX_SUBGRAPH_DEPTH: usize = 128;

/// Parse DOT text into a `DotGraph`
pub fn parse(input: &str) -> Result<DotGraph, CompileError> {
    let tokens = Lexer::new(input).tokenize()?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        graph: DotGraph::default(),
        node_index: HashMap::new(),
        depth: 0,
    };
    parser.parse_graph()?;
    Ok(parser.graph)
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    /// Identifier, numeral or string; `quoted` IDs are never keywords
    Id { value: String, quoted: bool },
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Equals,
    Semi,
    Comma,
    Colon,
    Arrow,
    DashDash,
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    line: usize,
    column: usize,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        CompileError::syntax(self.line, self.column, message)
    }

    fn tokenize(mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();
        let mut line_start = true;

        loop {
            let Some(c) = self.peek() else {
                break;
            };

            if c == '\n' {
                self.bump();
                line_start = true;
                continue;
            }
            if c.is_whitespace() {
                self.bump();
                continue;
            }
            if c == '#' && line_start {
                self.skip_line();
                continue;
            }
            if c == '/' && self.peek_at(1) == Some('/') {
                self.skip_line();
                continue;
            }
            if c == '/' && self.peek_at(1) == Some('*') {
                self.skip_block_comment()?;
                continue;
            }
            line_start = false;

            let (line, column) = (self.line, self.column);
            let tok = match c {
                '{' => self.single(Tok::LBrace),
                '}' => self.single(Tok::RBrace),
                '[' => self.single(Tok::LBracket),
                ']' => self.single(Tok::RBracket),
                '=' => self.single(Tok::Equals),
                ';' => self.single(Tok::Semi),
                ',' => self.single(Tok::Comma),
                ':' => self.single(Tok::Colon),
                '-' if self.peek_at(1) == Some('>') => {
                    self.bump();
                    self.single(Tok::Arrow)
                }
                '-' if self.peek_at(1) == Some('-') => {
                    self.bump();
                    self.single(Tok::DashDash)
                }
                '"' => self.quoted()?,
                '<' => self.html()?,
                c if c.is_ascii_digit() || c == '.' || c == '-' => self.numeral()?,
                c if c.is_alphabetic() || c == '_' || !c.is_ascii() => self.identifier(),
                other => return Err(self.error(format!("unexpected character '{}'", other))),
            };

            tokens.push(Token { tok, line, column });
        }

        tokens.push(Token {
            tok: Tok::Eof,
            line: self.line,
            column: self.column,
        });
        Ok(tokens)
    }

    fn single(&mut self, tok: Tok) -> Tok {
        self.bump();
        tok
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), CompileError> {
        let start = self.error("unterminated comment");
        self.bump();
        self.bump();
        while let Some(c) = self.bump() {
            if c == '*' && self.peek() == Some('/') {
                self.bump();
                return Ok(());
            }
        }
        Err(start)
    }

    /// Double-quoted string, including `"a" + "b"` concatenation
    fn quoted(&mut self) -> Result<Tok, CompileError> {
        let mut value = self.quoted_part()?;

        loop {
            let save = (self.pos, self.line, self.column);
            while self.peek().is_some_and(char::is_whitespace) {
                self.bump();
            }
            if self.peek() == Some('+') {
                self.bump();
                while self.peek().is_some_and(char::is_whitespace) {
                    self.bump();
                }
                if self.peek() == Some('"') {
                    value.push_str(&self.quoted_part()?);
                    continue;
                }
                return Err(self.error("expected a quoted string after '+'"));
            }
            (self.pos, self.line, self.column) = save;
            break;
        }

        Ok(Tok::Id {
            value,
            quoted: true,
        })
    }

    fn quoted_part(&mut self) -> Result<String, CompileError> {
        let start = self.error("unterminated string");
        self.bump();
        let mut value = String::new();

        while let Some(c) = self.bump() {
            match c {
                '"' => return Ok(value),
                '\\' => match self.peek() {
                    Some('"') => {
                        self.bump();
                        value.push('"');
                    }
                    // Line continuation
                    Some('\n') => {
                        self.bump();
                    }
                    _ => value.push('\\'),
                },
                c => value.push(c),
            }
        }

        Err(start)
    }

    /// HTML-like string `<...>`; nested angle brackets must balance
    fn html(&mut self) -> Result<Tok, CompileError> {
        let start = self.error("unterminated HTML string");
        self.bump();
        let mut depth = 1;
        let mut value = String::new();

        while let Some(c) = self.bump() {
            match c {
                '<' => depth += 1,
                '>' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(Tok::Id {
                            value,
                            quoted: true,
                        });
                    }
                }
                _ => {}
            }
            value.push(c);
        }

        Err(start)
    }

    fn numeral(&mut self) -> Result<Tok, CompileError> {
        let mut value = String::new();
        if self.peek() == Some('-') {
            value.push('-');
            self.bump();
        }

        let mut seen_dot = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                value.push(c);
            } else if c == '.' && !seen_dot {
                seen_dot = true;
                value.push(c);
            } else {
                break;
            }
            self.bump();
        }

        if !value.chars().any(|c| c.is_ascii_digit()) {
            return Err(self.error(format!("invalid numeral '{}'", value)));
        }

        Ok(Tok::Id {
            value,
            quoted: false,
        })
    }

    fn identifier(&mut self) -> Tok {
        let mut value = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || !c.is_ascii() {
                value.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Tok::Id {
            value,
            quoted: false,
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    graph: DotGraph,
    node_index: HashMap<String, usize>,
    /// Subgraphs currently open
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.tokens[self.pos].tok
    }

    fn peek_next(&self) -> &Tok {
        let idx = (self.pos + 1).min(self.tokens.len() - 1);
        &self.tokens[idx].tok
    }

    fn advance(&mut self) -> Tok {
        let tok = self.tokens[self.pos].tok.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        let token = &self.tokens[self.pos];
        CompileError::syntax(token.line, token.column, message)
    }

    fn expect(&mut self, expected: Tok, what: &str) -> Result<(), CompileError> {
        if self.peek() == &expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected {}, found {}", what, describe(self.peek()))))
        }
    }

    /// Is the next token the unquoted keyword `word` (case-insensitive)?
    fn at_keyword(&self, word: &str) -> bool {
        is_keyword(self.peek(), word)
    }

    fn expect_id(&mut self, what: &str) -> Result<String, CompileError> {
        match self.peek() {
            Tok::Id { .. } if !self.at_any_keyword() => match self.advance() {
                Tok::Id { value, .. } => Ok(value),
                _ => unreachable!(),
            },
            other => Err(self.error(format!("expected {}, found {}", what, describe(other)))),
        }
    }

    fn at_any_keyword(&self) -> bool {
        ["strict", "graph", "digraph", "node", "edge", "subgraph"]
            .iter()
            .any(|k| self.at_keyword(k))
    }

    fn parse_graph(&mut self) -> Result<(), CompileError> {
        if self.at_keyword("strict") {
            self.advance();
        }

        if self.at_keyword("graph") {
            return Err(self.error("policy graphs must be directed: use 'digraph'"));
        }
        if !self.at_keyword("digraph") {
            return Err(self.error(format!("expected 'digraph', found {}", describe(self.peek()))));
        }
        self.advance();

        if matches!(self.peek(), Tok::Id { .. }) {
            self.expect_id("graph name")?;
        }

        self.expect(Tok::LBrace, "'{'")?;
        self.parse_stmt_list()?;
        self.expect(Tok::RBrace, "'}'")?;

        match self.peek() {
            Tok::Eof => Ok(()),
            other => Err(self.error(format!("unexpected {} after graph", describe(other)))),
        }
    }

    /// Parse statements up to (not including) the closing brace and return
    /// every node id mentioned in them
    fn parse_stmt_list(&mut self) -> Result<Vec<String>, CompileError> {
        let mut members = Vec::new();

        loop {
            match self.peek() {
                Tok::RBrace | Tok::Eof => break,
                Tok::Semi => {
                    self.advance();
                    continue;
                }
                _ => {}
            }

            let mentioned = self.parse_stmt()?;
            for id in mentioned {
                if !members.contains(&id) {
                    members.push(id);
                }
            }

            if self.peek() == &Tok::Semi {
                self.advance();
            }
        }

        Ok(members)
    }

    fn parse_stmt(&mut self) -> Result<Vec<String>, CompileError> {
        if self.at_keyword("graph") || self.at_keyword("node") || self.at_keyword("edge") {
            self.advance();
            // Default attributes do not carry policy semantics
            self.parse_attr_lists()?;
            return Ok(Vec::new());
        }

        if self.at_keyword("subgraph") || self.peek() == &Tok::LBrace {
            let members = self.parse_subgraph()?;
            return self.parse_edge_rhs(members);
        }

        if matches!(self.peek(), Tok::Id { .. }) && self.peek_next() == &Tok::Equals {
            // Graph attribute `ID = ID`
            self.advance();
            self.advance();
            self.expect_id("attribute value")?;
            return Ok(Vec::new());
        }

        let id = self.parse_node_id()?;
        if matches!(self.peek(), Tok::Arrow | Tok::DashDash) {
            return self.parse_edge_rhs(vec![id]);
        }

        let attrs = self.parse_attr_lists()?;
        self.declare_node(&id, &attrs);
        Ok(vec![id])
    }

    /// Node id with an optional, ignored `:port[:compass]` suffix
    fn parse_node_id(&mut self) -> Result<String, CompileError> {
        let id = self.expect_id("node id")?;
        for _ in 0..2 {
            if self.peek() == &Tok::Colon {
                self.advance();
                self.expect_id("port")?;
            }
        }
        Ok(id)
    }

    fn parse_subgraph(&mut self) -> Result<Vec<String>, CompileError> {
        if self.at_keyword("subgraph") {
            self.advance();
            if matches!(self.peek(), Tok::Id { .. }) {
                self.expect_id("subgraph name")?;
            }
        }
        self.expect(Tok::LBrace, "'{'")?;
        if self.depth >= MAX_SUBGRAPH_DEPTH {
            return Err(self.error("subgraphs nested too deeply"));
        }
        self.depth += 1;
        let members = self.parse_stmt_list();
        self.depth -= 1;
        let members = members?;
        self.expect(Tok::RBrace, "'}'")?;
        Ok(members)
    }

    fn parse_edge_endpoint(&mut self) -> Result<Vec<String>, CompileError> {
        if self.at_keyword("subgraph") || self.peek() == &Tok::LBrace {
            self.parse_subgraph()
        } else {
            Ok(vec![self.parse_node_id()?])
        }
    }

    /// Parse `-> endpoint (-> endpoint)* [attrs]` following `first`
    fn parse_edge_rhs(&mut self, first: Vec<String>) -> Result<Vec<String>, CompileError> {
        let mut chain = vec![first];

        loop {
            match self.peek() {
                Tok::Arrow => {
                    self.advance();
                    chain.push(self.parse_edge_endpoint()?);
                }
                Tok::DashDash => {
                    return Err(self.error("undirected edge '--' in a directed graph, use '->'"))
                }
                _ => break,
            }
        }

        let attrs = self.parse_attr_lists()?;

        let mut mentioned = Vec::new();
        for group in &chain {
            for id in group {
                self.declare_node(id, &Attributes::default());
                if !mentioned.contains(id) {
                    mentioned.push(id.clone());
                }
            }
        }

        for pair in chain.windows(2) {
            for from in &pair[0] {
                for to in &pair[1] {
                    self.graph.edges.push(DotEdge {
                        from: from.clone(),
                        to: to.clone(),
                        attrs: attrs.clone(),
                    });
                }
            }
        }

        Ok(mentioned)
    }

    fn parse_attr_lists(&mut self) -> Result<Attributes, CompileError> {
        let mut attrs = Attributes::default();

        while self.peek() == &Tok::LBracket {
            self.advance();
            loop {
                match self.peek() {
                    Tok::RBracket => {
                        self.advance();
                        break;
                    }
                    Tok::Comma | Tok::Semi => {
                        self.advance();
                    }
                    Tok::Id { .. } => {
                        let key = match self.advance() {
                            Tok::Id { value, .. } => value,
                            _ => unreachable!(),
                        };
                        self.expect(Tok::Equals, "'=' after attribute name")?;
                        let value = match self.advance() {
                            Tok::Id { value, .. } => value,
                            other => {
                                return Err(self.error(format!(
                                    "expected value for attribute '{}', found {}",
                                    key,
                                    describe(&other)
                                )))
                            }
                        };
                        attrs.push(key, value);
                    }
                    other => {
                        return Err(self.error(format!(
                            "expected attribute or ']', found {}",
                            describe(other)
                        )))
                    }
                }
            }
        }

        Ok(attrs)
    }

    fn declare_node(&mut self, id: &str, attrs: &Attributes) {
        match self.node_index.get(id) {
            Some(&idx) => self.graph.nodes[idx].attrs.extend(attrs),
            None => {
                self.node_index
                    .insert(id.to_string(), self.graph.nodes.len());
                self.graph.nodes.push(DotNode {
                    id: id.to_string(),
                    attrs: attrs.clone(),
                });
            }
        }
    }
}

fn is_keyword(tok: &Tok, word: &str) -> bool {
    matches!(tok, Tok::Id { value, quoted: false } if value.eq_ignore_ascii_case(word))
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Id { value, .. } => format!("'{}'", value),
        Tok::LBrace => "'{'".to_string(),
        Tok::RBrace => "'}'".to_string(),
        Tok::LBracket => "'['".to_string(),
        Tok::RBracket => "']'".to_string(),
        Tok::Equals => "'='".to_string(),
        Tok::Semi => "';'".to_string(),
        Tok::Comma => "','".to_string(),
        Tok::Colon => "':'".to_string(),
        Tok::Arrow => "'->'".to_string(),
        Tok::DashDash => "'--'".to_string(),
        Tok::Eof => "end of input".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nodes_and_edges() {
        let graph = parse(
            r#"digraph Policy {
                start [result=""];
                approved [result="approved=true"];
                rejected [result="approved=false"];
                start -> approved [cond="age>=18"];
                start -> rejected [cond="age<18"];
            }"#,
        )
        .unwrap();

        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(
            graph.node("approved").unwrap().attrs.get("result"),
            Some("approved=true")
        );
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(graph.edges[0].from, "start");
        assert_eq!(graph.edges[0].to, "approved");
        assert_eq!(graph.edges[0].attrs.get("cond"), Some("age>=18"));
        assert_eq!(graph.edges[1].attrs.get("cond"), Some("age<18"));
    }

    #[test]
    fn test_escaped_quotes_are_unescaped() {
        let graph = parse(r#"digraph { a -> b [cond="name == \"bob\""] }"#).unwrap();
        assert_eq!(graph.edges[0].attrs.get("cond"), Some(r#"name == "bob""#));
    }

    #[test]
    fn test_unquoted_and_numeral_ids() {
        let graph = parse("digraph { 1 -> 2.5 [weight=3] x -> -4 }").unwrap();
        let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2.5", "x", "-4"]);
        assert_eq!(graph.edges[0].attrs.get("weight"), Some("3"));
    }

    #[test]
    fn test_edge_chain() {
        let graph = parse("digraph { a -> b -> c [cond=\"x\"] }").unwrap();
        assert_eq!(graph.edges.len(), 2);
        assert_eq!((graph.edges[0].from.as_str(), graph.edges[0].to.as_str()), ("a", "b"));
        assert_eq!((graph.edges[1].from.as_str(), graph.edges[1].to.as_str()), ("b", "c"));
        assert!(graph.edges.iter().all(|e| e.attrs.get("cond") == Some("x")));
    }

    #[test]
    fn test_repeated_declarations_merge() {
        let graph = parse(
            r#"digraph {
                a -> b
                b [result="first"]
                b [label="x", result="second"]
            }"#,
        )
        .unwrap();
        assert_eq!(graph.nodes.len(), 2);
        let b = graph.node("b").unwrap();
        assert_eq!(b.attrs.get("result"), Some("second"));
        assert_eq!(b.attrs.get("label"), Some("x"));
    }

    #[test]
    fn test_comments_and_defaults_are_ignored() {
        let graph = parse(
            r#"
            # generated
            /* policy */ digraph G {
                // defaults
                rankdir = LR;
                node [shape=box];
                edge [color=red]
                graph [fontsize=10]
                a -> b; // trailing
            }"#,
        )
        .unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);
        assert!(graph.node("a").unwrap().attrs.is_empty());
    }

    #[test]
    fn test_subgraph_edges_expand() {
        let graph = parse("digraph { start -> subgraph s { x; y } }").unwrap();
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(graph.edges[0].to, "x");
        assert_eq!(graph.edges[1].to, "y");
    }

    #[test]
    fn test_multiple_attr_lists_and_separators() {
        let graph = parse(r#"digraph { a [x=1; y=2] [z="3"] }"#).unwrap();
        let attrs = &graph.node("a").unwrap().attrs;
        assert_eq!(attrs.get("x"), Some("1"));
        assert_eq!(attrs.get("y"), Some("2"));
        assert_eq!(attrs.get("z"), Some("3"));
    }

    #[test]
    fn test_string_concatenation_and_html() {
        let graph = parse(r#"digraph { a [result="tier=" + "prime", note=<<b>hi</b>>] }"#).unwrap();
        let attrs = &graph.node("a").unwrap().attrs;
        assert_eq!(attrs.get("result"), Some("tier=prime"));
        assert_eq!(attrs.get("note"), Some("<b>hi</b>"));
    }

    #[test]
    fn test_keywords_case_insensitive_and_strict() {
        let graph = parse("STRICT DiGraph Named { A -> B }").unwrap();
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.nodes.len(), 2);
    }

    #[test]
    fn test_ports_are_ignored() {
        let graph = parse("digraph { a:p1:n -> b:s }").unwrap();
        assert_eq!(graph.edges[0].from, "a");
        assert_eq!(graph.edges[0].to, "b");
    }

    #[test]
    fn test_undirected_graph_rejected() {
        assert!(matches!(
            parse("graph { a -- b }"),
            Err(CompileError::Syntax { .. })
        ));
        assert!(matches!(
            parse("digraph { a -- b }"),
            Err(CompileError::Syntax { .. })
        ));
    }

    #[test]
    fn test_syntax_errors_report_position() {
        let err = parse("digraph {\n  a -> \n}").unwrap_err();
        match err {
            CompileError::Syntax { line, column, .. } => {
                assert_eq!(line, 3);
                assert_eq!(column, 1);
            }
            other => panic!("Expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_inputs() {
        for text in [
            "",
            "not a graph",
            "digraph {",
            "digraph { a [cond=] }",
            "digraph { a [cond=\"x\" }",
            "digraph { a -> b [cond=\"unterminated] }",
            "digraph { } extra",
            "digraph { a -> }",
            "digraph { /* open",
        ] {
            assert!(
                matches!(parse(text), Err(CompileError::Syntax { .. })),
                "{:?}",
                text
            );
        }
    }

    #[test]
    fn test_deep_subgraphs_rejected() {
        let text = format!(
            "digraph {{ {}start{} }}",
            "{".repeat(50_000),
            "}".repeat(50_000)
        );
        match parse(&text) {
            Err(CompileError::Syntax { message, .. }) => {
                assert_eq!(message, "subgraphs nested too deeply")
            }
            other => panic!("Expected Syntax error, got {:?}", other),
        }

        let text = format!(
            "digraph {{ start -> {}ok{} }}",
            "subgraph {".repeat(50_000),
            "}".repeat(50_000)
        );
        assert!(matches!(parse(&text), Err(CompileError::Syntax { .. })));
    }

    #[test]
    fn test_nested_subgraphs_within_limit() {
        let text = format!(
            "digraph {{ {}start -> ok{} }}",
            "{".repeat(100),
            "}".repeat(100)
        );
        let graph = parse(&text).unwrap();
        assert_eq!(graph.edges.len(), 1);
    }
}
