//! Tree-sitter backed syntax trees.

use crate::{Language, SyntaxBackend, SyntaxError, SyntaxTree};
use tracing::debug;
use tree_sitter::{Parser, Point, Tree};

/// Rust grammar backend.
pub struct TreeSitterRust;

impl SyntaxBackend for TreeSitterRust {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn parse(&self, source: &str) -> Result<Box<dyn SyntaxTree>, SyntaxError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_rust::LANGUAGE.into())
            .map_err(|e| SyntaxError::LanguageRejected {
                language: Language::Rust,
                reason: e.to_string(),
            })?;
        let tree = parser
            .parse(source, None)
            .ok_or(SyntaxError::ParseFailed(Language::Rust))?;
        debug!(
            target: "syntax",
            language = %Language::Rust,
            size_bytes = source.len(),
            has_error = tree.root_node().has_error(),
            "tree_parsed"
        );
        Ok(Box::new(TreeSitterTree { tree: Some(tree) }))
    }
}

/// Owned tree-sitter tree; `release` drops it.
pub struct TreeSitterTree {
    tree: Option<Tree>,
}

impl SyntaxTree for TreeSitterTree {
    fn node_kind_at(&self, row: usize, byte_column: usize) -> Option<String> {
        let tree = self.tree.as_ref()?;
        let point = Point::new(row, byte_column);
        tree.root_node()
            .descendant_for_point_range(point, point)
            .map(|node| node.kind().to_string())
    }

    fn release(&mut self) -> Result<(), SyntaxError> {
        match self.tree.take() {
            Some(tree) => {
                drop(tree);
                Ok(())
            }
            None => Err(SyntaxError::AlreadyReleased),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_keyword_and_identifier() {
        let mut tree = TreeSitterRust.parse("fn main() {}\n").unwrap();
        assert_eq!(tree.node_kind_at(0, 0).as_deref(), Some("fn"));
        assert_eq!(tree.node_kind_at(0, 3).as_deref(), Some("identifier"));
        tree.release().unwrap();
        assert_eq!(tree.node_kind_at(0, 0), None, "released tree answers nothing");
    }
}
