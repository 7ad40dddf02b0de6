#![forbid(unsafe_code)]

//! Immutable node presentation values.
//!
//! A [`Presentation`] is rebuilt on every recompute and never mutated in
//! place. Construct one with [`Presentation::builder`]:
//!
//! ```
//! use arbor_core::presentation::{Presentation, TextAttributes};
//!
//! let p = Presentation::builder("main.rs")
//!     .with_icon("file")
//!     .with_fragment(" 12 KiB", TextAttributes::GRAYED)
//!     .with_tooltip("src/main.rs")
//!     .with_leaf(true)
//!     .build();
//! assert_eq!(p.main_text(), "main.rs");
//! assert!(p.is_leaf());
//! ```

use bitflags::bitflags;

bitflags! {
    /// Style bits of a text fragment.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct TextAttributes: u8 {
        const BOLD = 1 << 0;
        const ITALIC = 1 << 1;
        const GRAYED = 1 << 2;
        const STRIKEOUT = 1 << 3;
        const UNDERLINE = 1 << 4;
        const ERROR = 1 << 5;
    }
}

/// A run of styled text following the main text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fragment {
    pub text: String,
    pub attributes: TextAttributes,
}

impl Fragment {
    #[must_use]
    pub fn new(text: impl Into<String>, attributes: TextAttributes) -> Self {
        Self {
            text: text.into(),
            attributes,
        }
    }

    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, TextAttributes::empty())
    }
}

/// Everything a widget needs to draw one row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Presentation {
    icon: Option<String>,
    main_text: String,
    fragments: Vec<Fragment>,
    tooltip: Option<String>,
    leaf: bool,
}

impl Presentation {
    #[must_use]
    pub fn builder(main_text: impl Into<String>) -> PresentationBuilder {
        PresentationBuilder {
            inner: Presentation {
                main_text: main_text.into(),
                ..Presentation::default()
            },
        }
    }

    /// Plain text presentation.
    #[must_use]
    pub fn text(main_text: impl Into<String>) -> Self {
        Self::builder(main_text).build()
    }

    /// Icon handle, interpreted by the widget.
    #[must_use]
    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    #[must_use]
    pub fn main_text(&self) -> &str {
        &self.main_text
    }

    #[must_use]
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    #[must_use]
    pub fn tooltip(&self) -> Option<&str> {
        self.tooltip.as_deref()
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.leaf
    }

    /// Copy with a different leaf flag.
    #[must_use]
    pub fn with_leaf(mut self, leaf: bool) -> Self {
        self.leaf = leaf;
        self
    }

    /// Main text followed by every fragment, unstyled.
    #[must_use]
    pub fn plain_text(&self) -> String {
        let extra: usize = self.fragments.iter().map(|f| f.text.len()).sum();
        let mut out = String::with_capacity(self.main_text.len() + extra);
        out.push_str(&self.main_text);
        for fragment in &self.fragments {
            out.push_str(&fragment.text);
        }
        out
    }
}

/// Builder for [`Presentation`].
#[derive(Debug, Clone)]
pub struct PresentationBuilder {
    inner: Presentation,
}

impl PresentationBuilder {
    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.inner.icon = Some(icon.into());
        self
    }

    #[must_use]
    pub fn with_fragment(mut self, text: impl Into<String>, attributes: TextAttributes) -> Self {
        self.inner.fragments.push(Fragment::new(text, attributes));
        self
    }

    #[must_use]
    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.inner.tooltip = Some(tooltip.into());
        self
    }

    #[must_use]
    pub fn with_leaf(mut self, leaf: bool) -> Self {
        self.inner.leaf = leaf;
        self
    }

    #[must_use]
    pub fn build(self) -> Presentation {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_all_fields() {
        let p = Presentation::builder("name")
            .with_icon("folder")
            .with_fragment(" (3)", TextAttributes::GRAYED | TextAttributes::ITALIC)
            .with_tooltip("tip")
            .with_leaf(false)
            .build();
        assert_eq!(p.icon(), Some("folder"));
        assert_eq!(p.main_text(), "name");
        assert_eq!(p.fragments().len(), 1);
        assert!(p.fragments()[0].attributes.contains(TextAttributes::GRAYED));
        assert_eq!(p.tooltip(), Some("tip"));
        assert!(!p.is_leaf());
    }

    #[test]
    fn plain_text_concatenates_fragments() {
        let p = Presentation::builder("a")
            .with_fragment("b", TextAttributes::BOLD)
            .with_fragment("c", TextAttributes::empty())
            .build();
        assert_eq!(p.plain_text(), "abc");
    }

    #[test]
    fn with_leaf_returns_modified_copy() {
        let p = Presentation::text("x");
        let leaf = p.clone().with_leaf(true);
        assert!(!p.is_leaf());
        assert!(leaf.is_leaf());
        assert_ne!(p, leaf);
    }
}
