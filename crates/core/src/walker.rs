//! Shape tree traversal.
//!
//! Visits a shape and everything below it in document order, appending the
//! rendered text of each text-bearing shape. A shape whose text cannot be
//! decoded contributes nothing and is reported as a [`ShapeWarning`].

use crate::error::{Error, ShapePath, ShapeWarning};
use crate::options::ExtractOptions;
use crate::render::{push_segment, render_text_body};
use crate::types::{Shape, Table, TextBody};

/// Recursive walker over a slide's shape tree.
#[derive(Debug, Clone)]
pub struct ShapeWalker {
    max_depth: usize,
}

impl Default for ShapeWalker {
    fn default() -> Self {
        Self::new(&ExtractOptions::default())
    }
}

impl ShapeWalker {
    pub fn new(options: &ExtractOptions) -> Self {
        Self {
            max_depth: options.max_group_depth(),
        }
    }

    /// Append all text reachable from `shape` to `out`.
    ///
    /// `path` must point at `shape`; it is restored before returning.
    pub fn walk<B: TextBody>(
        &self,
        shape: &Shape<B>,
        path: &mut ShapePath,
        out: &mut String,
        warnings: &mut Vec<ShapeWarning>,
    ) {
        self.visit(shape, 0, path, out, warnings);
    }

    fn visit<B: TextBody>(
        &self,
        shape: &Shape<B>,
        depth: usize,
        path: &mut ShapePath,
        out: &mut String,
        warnings: &mut Vec<ShapeWarning>,
    ) {
        match shape {
            Shape::Text(body) => self.visit_text(body, path, out, warnings),
            Shape::Group(children) => {
                if depth >= self.max_depth {
                    record(
                        warnings,
                        path,
                        Error::ShapeTextError(format!(
                            "group nesting exceeds {} levels, skipping its children",
                            self.max_depth
                        )),
                    );
                    return;
                }
                for (index, child) in children.iter().enumerate() {
                    path.push(index);
                    self.visit(child, depth + 1, path, out, warnings);
                    path.pop();
                }
            }
            Shape::Table(table) => self.visit_table(table, path, out, warnings),
            Shape::Other => {}
        }
    }

    fn visit_table<B: TextBody>(
        &self,
        table: &Table<B>,
        path: &mut ShapePath,
        out: &mut String,
        warnings: &mut Vec<ShapeWarning>,
    ) {
        for (row_index, row) in table.rows.iter().enumerate() {
            for (col_index, cell) in row.iter().enumerate() {
                path.push(row_index);
                path.push(col_index);
                self.visit_text(cell, path, out, warnings);
                path.pop();
                path.pop();
            }
        }
    }

    fn visit_text<B: TextBody>(
        &self,
        body: &B,
        path: &ShapePath,
        out: &mut String,
        warnings: &mut Vec<ShapeWarning>,
    ) {
        match render_text_body(body) {
            Ok(text) => push_segment(out, &text),
            Err(e) => record(warnings, path, e),
        }
    }
}

fn record(warnings: &mut Vec<ShapeWarning>, path: &ShapePath, error: Error) {
    log::warn!("Skipping shape at {}: {}", path, error);
    warnings.push(ShapeWarning {
        path: path.clone(),
        error,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::types::Paragraph;

    /// Test body that either yields fixed paragraphs or fails.
    enum Body {
        Lines(Vec<&'static str>),
        Broken,
    }

    impl TextBody for Body {
        fn paragraphs(&self) -> Result<Vec<Paragraph>> {
            match self {
                Body::Lines(lines) => Ok(lines.iter().map(|l| Paragraph::plain(*l)).collect()),
                Body::Broken => Err(Error::ShapeTextError("malformed run".to_string())),
            }
        }
    }

    fn text(lines: &[&'static str]) -> Shape<Body> {
        Shape::Text(Body::Lines(lines.to_vec()))
    }

    fn walk_all(shapes: &[Shape<Body>], walker: &ShapeWalker) -> (String, Vec<ShapeWarning>) {
        let mut out = String::new();
        let mut warnings = Vec::new();
        let mut path = ShapePath::new(1);
        for (i, shape) in shapes.iter().enumerate() {
            path.push(i);
            walker.walk(shape, &mut path, &mut out, &mut warnings);
            path.pop();
        }
        (out, warnings)
    }

    #[test]
    fn test_nested_groups_are_visited() {
        let shapes = vec![Shape::Group(vec![
            text(&["Outer"]),
            Shape::Group(vec![Shape::Other, text(&["Inner"])]),
        ])];

        let (out, warnings) = walk_all(&shapes, &ShapeWalker::default());
        assert_eq!(out, "Outer\nInner");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_table_cells_in_row_major_order() {
        let table = Table::new(vec![
            vec![Body::Lines(vec!["R0C0"]), Body::Lines(vec!["R0C1"])],
            vec![Body::Lines(vec!["R1C0"]), Body::Lines(vec!["R1C1"])],
        ]);
        let (out, _) = walk_all(&[Shape::Table(table)], &ShapeWalker::default());
        assert_eq!(out, "R0C0\nR0C1\nR1C0\nR1C1");
    }

    #[test]
    fn test_empty_cells_add_no_separators() {
        let table = Table::new(vec![vec![
            Body::Lines(vec![]),
            Body::Lines(vec!["B"]),
            Body::Lines(vec!["  "]),
        ]]);
        let (out, _) = walk_all(&[text(&["A"]), Shape::Table(table)], &ShapeWalker::default());
        assert_eq!(out, "A\nB");
    }

    #[test]
    fn test_broken_shape_is_isolated() {
        let shapes = vec![
            text(&["Before"]),
            Shape::Group(vec![Shape::Text(Body::Broken), text(&["Sibling"])]),
            text(&["After"]),
        ];

        let (out, warnings) = walk_all(&shapes, &ShapeWalker::default());
        assert_eq!(out, "Before\nSibling\nAfter");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].path.indices, vec![1, 0]);
        assert_eq!(warnings[0].path.to_string(), "slide 1, shape 1.0");
    }

    #[test]
    fn test_broken_table_cell_only_loses_itself() {
        let table = Table::new(vec![vec![Body::Lines(vec!["ok"]), Body::Broken]]);
        let (out, warnings) = walk_all(&[Shape::Table(table)], &ShapeWalker::default());
        assert_eq!(out, "ok");
        assert_eq!(warnings[0].path.indices, vec![0, 0, 1]);
    }

    #[test]
    fn test_depth_limit() {
        let mut shape = text(&["deep"]);
        for _ in 0..5 {
            shape = Shape::Group(vec![shape]);
        }

        let shallow = ShapeWalker::new(&ExtractOptions::new().with_max_group_depth(3));
        let (out, warnings) = walk_all(std::slice::from_ref(&shape), &shallow);
        assert_eq!(out, "");
        assert_eq!(warnings.len(), 1);

        let (out, warnings) = walk_all(std::slice::from_ref(&shape), &ShapeWalker::default());
        assert_eq!(out, "deep");
        assert!(warnings.is_empty());
    }
}
