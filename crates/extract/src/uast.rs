//! Universal syntax tree nodes and function enumeration.

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

/// One node of a language-agnostic syntax tree as returned by the AST
/// service.
///
/// `id` is synthesized by the service and unique within a response. Trees may
/// carry reference back-edges (a child repeating an ancestor's id), so every
/// traversal guards with a visited set keyed on `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UastNode {
    pub id: u64,
    pub internal_type: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub start_line: Option<u32>,
    #[serde(default)]
    pub children: Vec<UastNode>,
}

impl UastNode {
    /// Whether this node declares a function.
    ///
    /// Language-agnostic: the type token names a function, or the node
    /// carries the bblfsh-style `Function` + `Declaration` role pair.
    pub fn is_function(&self) -> bool {
        if self.internal_type.to_ascii_lowercase().contains("function") {
            return true;
        }
        self.roles.iter().any(|r| r == "Function")
            && self.roles.iter().any(|r| r == "Declaration")
    }

    /// Best-effort declared name: the node's own token, or the token of the
    /// first child carrying a `Name` role.
    pub fn declared_name(&self) -> Option<&str> {
        if let Some(token) = self.token.as_deref() {
            return Some(token);
        }
        self.children
            .iter()
            .find(|c| c.roles.iter().any(|r| r == "Name"))
            .and_then(|c| c.token.as_deref())
    }
}

/// A function found in a UAST, ready for per-function extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionUnit<'a> {
    pub name: String,
    pub start_line: u32,
    pub node: &'a UastNode,
}

/// Enumerate top-level function nodes.
///
/// Functions nested inside another function are not emitted separately; the
/// outer declaration owns them. Nodes already visited (reference back-edges)
/// are skipped so traversal terminates on cyclic trees.
pub fn enumerate_functions(root: &UastNode) -> Vec<FunctionUnit<'_>> {
    let mut out = Vec::new();
    let mut visited: HashSet<u64> = HashSet::new();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        if !visited.insert(node.id) {
            continue;
        }
        if node.is_function() {
            out.push(FunctionUnit {
                name: node
                    .declared_name()
                    .unwrap_or("<anonymous>")
                    .to_string(),
                start_line: node.start_line.unwrap_or(0),
                node,
            });
            continue;
        }
        // Reverse keeps document order on the explicit stack.
        for child in node.children.iter().rev() {
            stack.push(child);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u64, internal_type: &str) -> UastNode {
        UastNode {
            id,
            internal_type: internal_type.to_string(),
            token: None,
            roles: Vec::new(),
            start_line: None,
            children: Vec::new(),
        }
    }

    fn func(id: u64, name: &str, line: u32) -> UastNode {
        let mut f = node(id, "FunctionDeclaration");
        f.start_line = Some(line);
        let mut name_node = node(id + 1000, "Identifier");
        name_node.roles = vec!["Name".to_string()];
        name_node.token = Some(name.to_string());
        f.children.push(name_node);
        f
    }

    #[test]
    fn finds_functions_by_type_token() {
        let mut root = node(0, "Module");
        root.children.push(func(1, "parse", 42));
        root.children.push(node(2, "ImportStatement"));
        root.children.push(func(3, "render", 80));

        let fns = enumerate_functions(&root);
        assert_eq!(fns.len(), 2);
        assert_eq!(fns[0].name, "parse");
        assert_eq!(fns[0].start_line, 42);
        assert_eq!(fns[1].name, "render");
    }

    #[test]
    fn finds_functions_by_role_pair() {
        let mut decl = node(5, "MethodDecl");
        decl.roles = vec!["Function".to_string(), "Declaration".to_string()];
        decl.token = Some("handler".to_string());
        decl.start_line = Some(7);

        let mut root = node(0, "File");
        root.children.push(decl);

        let fns = enumerate_functions(&root);
        assert_eq!(fns.len(), 1);
        assert_eq!(fns[0].name, "handler");
    }

    #[test]
    fn role_pair_requires_both_roles() {
        let mut decl = node(5, "VarDecl");
        decl.roles = vec!["Declaration".to_string()];
        let mut root = node(0, "File");
        root.children.push(decl);
        assert!(enumerate_functions(&root).is_empty());
    }

    #[test]
    fn nested_functions_belong_to_the_outer_one() {
        let mut outer = func(1, "outer", 1);
        outer.children.push(func(2, "inner", 3));
        let mut root = node(0, "Module");
        root.children.push(outer);

        let fns = enumerate_functions(&root);
        assert_eq!(fns.len(), 1);
        assert_eq!(fns[0].name, "outer");
    }

    #[test]
    fn anonymous_functions_get_a_placeholder_name() {
        let mut f = node(1, "FunctionLiteral");
        f.start_line = Some(9);
        let mut root = node(0, "Module");
        root.children.push(f);

        let fns = enumerate_functions(&root);
        assert_eq!(fns[0].name, "<anonymous>");
    }

    #[test]
    fn cyclic_references_terminate() {
        // A child that repeats the root id models a reference back-edge.
        let mut root = node(0, "Module");
        let mut loop_node = node(1, "Block");
        loop_node.children.push(node(0, "Module"));
        root.children.push(loop_node);
        root.children.push(func(2, "f", 1));

        let fns = enumerate_functions(&root);
        assert_eq!(fns.len(), 1);
    }

    #[test]
    fn uast_deserializes_with_sparse_fields() {
        let json = r#"{"id": 3, "internal_type": "File"}"#;
        let n: UastNode = serde_json::from_str(json).unwrap();
        assert_eq!(n.id, 3);
        assert!(n.children.is_empty());
        assert!(n.token.is_none());
    }
}
