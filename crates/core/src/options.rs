//! Extraction options.

/// Default limit on group nesting.
pub const DEFAULT_MAX_GROUP_DEPTH: usize = 64;

/// Options shared by the loaders and the shape walker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Groups nested deeper than this are not entered.
    max_group_depth: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_group_depth: DEFAULT_MAX_GROUP_DEPTH,
        }
    }
}

impl ExtractOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the group nesting limit.
    pub fn with_max_group_depth(mut self, depth: usize) -> Self {
        self.max_group_depth = depth.max(1); // The slide's own level always counts
        self
    }

    pub fn max_group_depth(&self) -> usize {
        self.max_group_depth
    }
}
