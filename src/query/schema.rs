//! 查询语句解析
//!
//! 语法（与页面查询服务一致）：
//!
//! ```text
//! {
//!     pagination {
//!         next_page_btn(button with link to next page)
//!     }
//!     startup_list[] {
//!         Name(name of the company)
//!         Website
//!     }
//! }
//! ```
//!
//! 节点 = 标识符 + 可选 `[]`（列表）+ 可选括号描述 + 可选 `{ 子节点 }`。
//! 节点之间用空白或逗号分隔。

use crate::error::{AppResult, QueryError};

/// 查询语句中的一个节点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaNode {
    pub name: String,
    pub description: Option<String>,
    pub is_list: bool,
    pub children: Vec<SchemaNode>,
}

impl SchemaNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// 解析后的查询语句
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySchema {
    pub nodes: Vec<SchemaNode>,
}

impl QuerySchema {
    pub fn parse(text: &str) -> AppResult<Self> {
        let mut parser = Parser { src: text, pos: 0 };
        parser.skip_separators();
        parser.expect('{')?;
        let nodes = parser.parse_block()?;
        parser.skip_separators();
        if parser.pos < text.len() {
            return Err(parser.error("语句结束后存在多余内容"));
        }
        Ok(Self { nodes })
    }

    /// 所有叶子节点的点分路径，如 `pagination.next_page_btn`
    pub fn leaf_paths(&self) -> Vec<String> {
        fn walk(node: &SchemaNode, prefix: &str, out: &mut Vec<String>) {
            let path = join_path(prefix, &node.name);
            if node.is_leaf() {
                out.push(path);
            } else {
                for child in &node.children {
                    walk(child, &path, out);
                }
            }
        }
        let mut out = Vec::new();
        for node in &self.nodes {
            walk(node, "", &mut out);
        }
        out
    }

    /// 顶层第一个列表节点
    pub fn first_list(&self) -> Option<&SchemaNode> {
        self.nodes.iter().find(|n| n.is_list)
    }
}

pub(crate) fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_separators(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == ',' {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, wanted: char) -> AppResult<()> {
        match self.peek() {
            Some(c) if c == wanted => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(self.error(&format!("期望 '{}'，实际为 '{}'", wanted, c))),
            None => Err(self.error(&format!("期望 '{}'，但语句已结束", wanted))),
        }
    }

    /// 解析 `{` 之后直到匹配的 `}` 的节点列表
    fn parse_block(&mut self) -> AppResult<Vec<SchemaNode>> {
        let mut nodes = Vec::new();
        loop {
            self.skip_separators();
            match self.peek() {
                Some('}') => {
                    self.bump();
                    return Ok(nodes);
                }
                Some(_) => nodes.push(self.parse_node()?),
                None => return Err(self.error("缺少 '}'")),
            }
        }
    }

    fn parse_node(&mut self) -> AppResult<SchemaNode> {
        let name = self.parse_ident()?;
        let mut node = SchemaNode {
            name,
            description: None,
            is_list: false,
            children: Vec::new(),
        };

        self.skip_whitespace();
        if self.src[self.pos..].starts_with("[]") {
            self.pos += 2;
            node.is_list = true;
            self.skip_whitespace();
        }
        if self.peek() == Some('(') {
            node.description = Some(self.parse_description()?);
            self.skip_whitespace();
        }
        if self.peek() == Some('{') {
            self.bump();
            node.children = self.parse_block()?;
            if node.children.is_empty() {
                return Err(self.error(&format!("节点 {} 的子节点为空", node.name)));
            }
        }
        Ok(node)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn parse_ident(&mut self) -> AppResult<String> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_' || c == '-') {
            self.bump();
        }
        if start == self.pos {
            return Err(self.error("期望标识符"));
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn parse_description(&mut self) -> AppResult<String> {
        let open = self.pos;
        self.bump();
        let start = self.pos;
        let mut depth = 1usize;
        while let Some(c) = self.bump() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        let text = self.src[start..self.pos - 1].trim();
                        return Ok(text.to_string());
                    }
                }
                _ => {}
            }
        }
        self.pos = open;
        Err(self.error("描述缺少 ')'"))
    }

    fn error(&self, message: &str) -> crate::error::AppError {
        QueryError::SchemaSyntax {
            offset: self.pos,
            message: message.to_string(),
        }
        .into()
    }
}
