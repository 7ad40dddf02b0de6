#![forbid(unsafe_code)]

//! Text outline of the published tree.
//!
//! Renders one line per mirrored node, indented with guide characters:
//!
//! ```text
//! project
//! ├── src
//! │   ├── lib.rs
//! │   └── main.rs
//! └── Cargo.toml
//! ```
//!
//! Only delivered children are drawn; a node whose children were never
//! read shows none, and a loading node shows its placeholder.

use arbor_core::DomainNode;
use unicode_width::UnicodeWidthChar;

use crate::node::WidgetNode;
use crate::state::Mirror;

/// Guide character styles for outline rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeGuides {
    /// ASCII guides: `|`, `+--`, `` `-- ``.
    Ascii,
    /// Unicode box-drawing characters (default).
    #[default]
    Unicode,
    /// Bold Unicode box-drawing characters.
    Bold,
    /// Double-line Unicode characters.
    Double,
    /// Rounded Unicode characters.
    Rounded,
}

impl TreeGuides {
    /// Vertical continuation (item has siblings below).
    #[must_use]
    pub const fn vertical(&self) -> &str {
        match self {
            Self::Ascii => "|   ",
            Self::Unicode | Self::Rounded => "\u{2502}   ",
            Self::Bold => "\u{2503}   ",
            Self::Double => "\u{2551}   ",
        }
    }

    /// Branch guide (item has siblings below).
    #[must_use]
    pub const fn branch(&self) -> &str {
        match self {
            Self::Ascii => "+-- ",
            Self::Unicode | Self::Rounded => "\u{251C}\u{2500}\u{2500} ",
            Self::Bold => "\u{2523}\u{2501}\u{2501} ",
            Self::Double => "\u{2560}\u{2550}\u{2550} ",
        }
    }

    /// Last-item guide (no siblings below).
    #[must_use]
    pub const fn last(&self) -> &str {
        match self {
            Self::Ascii => "`-- ",
            Self::Unicode => "\u{2514}\u{2500}\u{2500} ",
            Self::Bold => "\u{2517}\u{2501}\u{2501} ",
            Self::Double => "\u{255A}\u{2550}\u{2550} ",
            Self::Rounded => "\u{2570}\u{2500}\u{2500} ",
        }
    }

    /// Empty indentation (no guide needed).
    #[must_use]
    pub const fn space(&self) -> &str {
        "    "
    }

    /// Width in columns of each guide segment.
    #[must_use]
    pub fn width(&self) -> usize {
        4
    }
}

/// Render the mirror as outline lines, each at most `max_width` columns.
pub(crate) fn render<N: DomainNode>(
    mirror: &Mirror<N>,
    guides: TreeGuides,
    max_width: Option<usize>,
) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(root) = mirror.root() {
        let mut is_last = Vec::with_capacity(8);
        render_node(mirror, root, 0, &mut is_last, guides, &mut out);
    }
    if let Some(max) = max_width {
        for line in &mut out {
            truncate_to_width(line, max);
        }
    }
    out
}

fn render_node<N: DomainNode>(
    mirror: &Mirror<N>,
    node: &WidgetNode<N>,
    depth: usize,
    is_last: &mut Vec<bool>,
    guides: TreeGuides,
    out: &mut Vec<String>,
) {
    let mut line = String::new();
    for d in 0..depth {
        let is_last_at_depth = is_last.get(d).copied().unwrap_or(false);
        let guide = if d == depth - 1 {
            if is_last_at_depth {
                guides.last()
            } else {
                guides.branch()
            }
        } else if is_last_at_depth {
            guides.space()
        } else {
            guides.vertical()
        };
        line.push_str(guide);
    }
    line.push_str(&node.label());
    out.push(line);

    if let Some(children) = mirror.children(node.id()) {
        let count = children.len();
        for (i, child) in children.iter().enumerate() {
            is_last.push(i + 1 == count);
            render_node(mirror, child, depth + 1, is_last, guides, out);
            is_last.pop();
        }
    }
}

/// Cut `line` to at most `max` display columns, marking the cut with `…`.
fn truncate_to_width(line: &mut String, max: usize) {
    let total: usize = line.chars().map(|c| c.width().unwrap_or(0)).sum();
    if total <= max {
        return;
    }
    if max == 0 {
        line.clear();
        return;
    }
    let budget = max - 1;
    let mut used = 0;
    let mut cut = 0;
    for (i, c) in line.char_indices() {
        let w = c.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        cut = i + c.len_utf8();
    }
    line.truncate(cut);
    line.push('…');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::CachedNode;
    use arbor_core::Presentation;

    fn cached(key: &str) -> WidgetNode<u32> {
        WidgetNode::Cached(CachedNode::new(key, Presentation::text(key), false))
    }

    fn sample() -> Mirror<u32> {
        let mut mirror = Mirror::new();
        let root = cached("project");
        let (src, cargo) = (cached("src"), cached("Cargo.toml"));
        let (lib, main) = (cached("lib.rs"), cached("main.rs"));
        mirror.set_root(Some(root.clone()));
        mirror.set_children(root.id(), vec![src.clone(), cargo]);
        mirror.set_children(src.id(), vec![lib, main]);
        mirror
    }

    #[test]
    fn unicode_outline() {
        let lines = render(&sample(), TreeGuides::Unicode, None);
        assert_eq!(
            lines,
            vec![
                "project",
                "├── src",
                "│   ├── lib.rs",
                "│   └── main.rs",
                "└── Cargo.toml",
            ]
        );
    }

    #[test]
    fn ascii_outline() {
        let lines = render(&sample(), TreeGuides::Ascii, None);
        assert_eq!(lines[1], "+-- src");
        assert_eq!(lines[3], "|   `-- main.rs");
    }

    #[test]
    fn empty_mirror_renders_nothing() {
        let mirror: Mirror<u32> = Mirror::new();
        assert!(render(&mirror, TreeGuides::default(), None).is_empty());
    }

    #[test]
    fn truncation_respects_display_width() {
        let mut line = "│   └── main.rs".to_string();
        truncate_to_width(&mut line, 8);
        assert_eq!(line, "│   └──…");

        let mut wide = "日本語".to_string();
        truncate_to_width(&mut wide, 4);
        assert_eq!(wide, "日…");

        let mut short = "ok".to_string();
        truncate_to_width(&mut short, 10);
        assert_eq!(short, "ok");
    }

    #[test]
    fn guides_have_uniform_width() {
        for guides in [
            TreeGuides::Ascii,
            TreeGuides::Unicode,
            TreeGuides::Bold,
            TreeGuides::Double,
            TreeGuides::Rounded,
        ] {
            for segment in [guides.vertical(), guides.branch(), guides.last(), guides.space()] {
                let width: usize = segment.chars().map(|c| c.width().unwrap_or(0)).sum();
                assert_eq!(width, guides.width());
            }
        }
    }
}
