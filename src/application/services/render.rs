//! Terminal rendering of value trees

use std::time::{Duration, Instant};

use colored::Colorize;
use generational_arena::Index;
use termtree::Tree;
use tracing::{info, instrument};

use crate::application::{ApplicationError, ApplicationResult};
use crate::config::{parse_hex_color, Appearance};
use crate::domain::{format_value, Marker, TreeArena};

/// Display class of a node, chosen from its marker and value sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorClass {
    Default,
    Positive,
    Negative,
    Skipped,
}

/// Classify a node for coloring.
pub fn color_class(tree: &TreeArena, idx: Index, use_positive_negative: bool) -> ColorClass {
    let marker = tree
        .get_node(idx)
        .map(|node| node.data.marker())
        .unwrap_or_default();
    match marker {
        Marker::Skip => ColorClass::Skipped,
        Marker::None | Marker::Invert if !use_positive_negative => ColorClass::Default,
        Marker::None | Marker::Invert => {
            if tree.aggregated_value(idx) < 0.0 {
                ColorClass::Negative
            } else {
                ColorClass::Positive
            }
        }
    }
}

type Rgb = (u8, u8, u8);

/// Resolved colors for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub default: Rgb,
    pub positive: Rgb,
    pub negative: Rgb,
    pub skipped: Rgb,
    pub debug: Rgb,
    pub use_positive_negative_colors: bool,
}

impl Palette {
    pub fn from_appearance(appearance: &Appearance) -> ApplicationResult<Self> {
        let parse = |name: &str, value: &str| {
            parse_hex_color(value).ok_or_else(|| ApplicationError::Config {
                message: format!("{name}: expected #rrggbb, got '{value}'"),
            })
        };
        Ok(Self {
            default: parse("default_color", &appearance.default_color)?,
            positive: parse("positive_color", &appearance.positive_color)?,
            negative: parse("negative_color", &appearance.negative_color)?,
            skipped: parse("skipped_color", &appearance.skipped_color)?,
            debug: parse("debug_color", &appearance.debug_color)?,
            use_positive_negative_colors: appearance.use_positive_negative_colors,
        })
    }

    /// Without sign coloring, positive and negative fall back to the default color.
    pub fn color_for(&self, class: ColorClass) -> Rgb {
        match class {
            ColorClass::Skipped => self.skipped,
            ColorClass::Positive if self.use_positive_negative_colors => self.positive,
            ColorClass::Negative if self.use_positive_negative_colors => self.negative,
            ColorClass::Default | ColorClass::Positive | ColorClass::Negative => self.default,
        }
    }
}

/// Timing and size of one render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderStats {
    pub branches: usize,
    pub elapsed: Duration,
}

impl RenderStats {
    pub fn lines(&self) -> Vec<String> {
        vec![
            format!("Tree took {:.4} ms", self.elapsed.as_secs_f64() * 1000.0),
            format!("Total branches: {}", self.branches),
        ]
    }
}

/// Projects a tree into a `termtree::Tree` of labels.
pub struct TreeRenderer {
    palette: Palette,
    debug: bool,
    colorize: bool,
    collapse_depth: Option<usize>,
}

impl TreeRenderer {
    pub fn new(palette: Palette, debug: bool) -> Self {
        Self {
            palette,
            debug,
            colorize: true,
            collapse_depth: None,
        }
    }

    /// Render labels without ANSI colors.
    pub fn plain(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// Collapse branches at this depth (top level = 1) into a child count.
    pub fn collapse_at(mut self, depth: Option<usize>) -> Self {
        self.collapse_depth = depth;
        self
    }

    /// Uncolored label for a node.
    ///
    /// Skipped nodes show their raw value, all others the aggregated value.
    /// Debug mode appends `(raw) [marker]`.
    pub fn label(&self, tree: &TreeArena, idx: Index) -> Option<String> {
        let (base, suffix) = self.label_parts(tree, idx)?;
        Some(match suffix {
            Some(suffix) => format!("{base} {suffix}"),
            None => base,
        })
    }

    fn label_parts(&self, tree: &TreeArena, idx: Index) -> Option<(String, Option<String>)> {
        let node = tree.get_node(idx)?;
        let raw = tree.display_raw_value(idx)?;
        let value = match node.data.marker() {
            Marker::Skip => raw.clone(),
            Marker::None | Marker::Invert => format_value(tree.aggregated_value(idx)),
        };
        let base = format!("{} {}", node.data.name, value);
        let suffix = self.debug.then(|| match node.data.marker() {
            Marker::None => format!("({raw})"),
            marker => format!("({raw}) [{marker}]"),
        });
        Some((base, suffix))
    }

    fn paint(&self, text: &str, rgb: Rgb) -> String {
        if self.colorize {
            text.truecolor(rgb.0, rgb.1, rgb.2).to_string()
        } else {
            text.to_string()
        }
    }

    /// Render `tree` under a `title` line.
    ///
    /// The synthetic root is only shown in debug mode; otherwise its children
    /// form the top level.
    #[instrument(level = "debug", skip(self, tree))]
    pub fn render(&self, tree: &TreeArena, title: &str) -> (Tree<String>, RenderStats) {
        let started = Instant::now();
        let mut branches = 0;
        let mut top = Tree::new(title.to_string());

        if let Some(root) = tree.root() {
            if self.debug {
                top.push(self.render_branch(tree, root, 0, &mut branches));
            } else if let Some(node) = tree.get_node(root) {
                for &child in &node.children {
                    top.push(self.render_branch(tree, child, 1, &mut branches));
                }
            }
        }

        let stats = RenderStats {
            branches,
            elapsed: started.elapsed(),
        };
        info!("render: {} branches in {:?}", stats.branches, stats.elapsed);
        (top, stats)
    }

    fn render_branch(
        &self,
        tree: &TreeArena,
        idx: Index,
        depth: usize,
        branches: &mut usize,
    ) -> Tree<String> {
        *branches += 1;
        let class = color_class(tree, idx, self.palette.use_positive_negative_colors);
        let (base, suffix) = self
            .label_parts(tree, idx)
            .unwrap_or_else(|| (String::new(), None));

        let mut label = self.paint(&base, self.palette.color_for(class));
        if let Some(suffix) = suffix {
            label.push(' ');
            label.push_str(&self.paint(&suffix, self.palette.debug));
        }

        let children = tree
            .get_node(idx)
            .map(|node| node.children.as_slice())
            .unwrap_or_default();
        if children.is_empty() {
            return Tree::new(label);
        }
        if self.collapse_depth.is_some_and(|limit| depth >= limit) {
            label.push_str(&format!(" [+{}]", children.len()));
            return Tree::new(label);
        }

        Tree::new(label).with_leaves(
            children
                .iter()
                .map(|&child| self.render_branch(tree, child, depth + 1, branches)),
        )
    }
}
