//! Consumer-facing image props and the element tree they render to

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Rendered node: a tag with attributes and children
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Tag name
    pub tag: String,
    /// Attributes, sorted by name
    pub attributes: BTreeMap<String, String>,
    /// Child nodes
    pub children: Vec<Element>,
}

impl Element {
    /// Create an element without attributes
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// With attribute
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// With attribute when `value` is present
    #[must_use]
    pub fn with_opt_attr<V: ToString>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with_attr(name, value.to_string()),
            None => self,
        }
    }

    /// With child
    #[must_use]
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Attribute value
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Browser decoding hint passed through to the rendered `<img>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decoding {
    /// Decode synchronously with other content
    Sync,
    /// Decode off the critical path
    Async,
    /// No preference
    Auto,
}

impl Decoding {
    /// Attribute value
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Decoding::Sync => "sync",
            Decoding::Async => "async",
            Decoding::Auto => "auto",
        }
    }
}

impl fmt::Display for Decoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render function for a placeholder
pub type PlaceholderFn = Arc<dyn Fn(&ImageProps) -> Element + Send + Sync>;

/// What to show while the image is loading
#[derive(Clone)]
pub enum Placeholder {
    /// Literal image source, rendered as an `<img>` with the props' styling
    Source(String),
    /// Called with the props on every render
    Render(PlaceholderFn),
    /// Shown as-is
    Element(Element),
}

impl Placeholder {
    /// Wrap a render function
    pub fn render_fn(f: impl Fn(&ImageProps) -> Element + Send + Sync + 'static) -> Self {
        Self::Render(Arc::new(f))
    }
}

impl fmt::Debug for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(src) => f.debug_tuple("Source").field(src).finish(),
            Self::Render(_) => f.write_str("Render(..)"),
            Self::Element(element) => f.debug_tuple("Element").field(element).finish(),
        }
    }
}

impl From<Element> for Placeholder {
    fn from(element: Element) -> Self {
        Self::Element(element)
    }
}

impl From<&str> for Placeholder {
    fn from(src: &str) -> Self {
        Self::Source(src.to_string())
    }
}

/// Image props
#[derive(Debug, Clone, Default)]
pub struct ImageProps {
    /// Image reference
    pub src: Option<String>,
    /// Lazy-loading alias for `src`, used when `src` is unset or empty
    pub data_src: Option<String>,
    /// Shown while loading
    pub placeholder: Option<Placeholder>,
    /// `alt` of a literal placeholder
    pub placeholder_alt: Option<String>,
    /// `alt` of the loaded image
    pub alt: Option<String>,
    /// Inline style declarations
    pub style: BTreeMap<String, String>,
    /// Width in pixels
    pub width: Option<u32>,
    /// Height in pixels
    pub height: Option<u32>,
    /// Decoding hint
    pub decoding: Option<Decoding>,
    /// CSS class list
    pub class_name: Option<String>,
}

impl ImageProps {
    /// Props with `src` set
    #[must_use]
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: Some(src.into()),
            ..Self::default()
        }
    }

    /// Props with only `data-src` set
    #[must_use]
    pub fn with_data_src(data_src: impl Into<String>) -> Self {
        Self {
            data_src: Some(data_src.into()),
            ..Self::default()
        }
    }

    /// The reference to load: `src`, else `data-src`; empty strings count as unset
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        [self.src.as_deref(), self.data_src.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
    }

    /// With placeholder
    #[must_use]
    pub fn placeholder(mut self, placeholder: impl Into<Placeholder>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    /// With placeholder alt text
    #[must_use]
    pub fn placeholder_alt(mut self, alt: impl Into<String>) -> Self {
        self.placeholder_alt = Some(alt.into());
        self
    }

    /// With image alt text
    #[must_use]
    pub fn alt(mut self, alt: impl Into<String>) -> Self {
        self.alt = Some(alt.into());
        self
    }

    /// With a style declaration
    #[must_use]
    pub fn style(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.style.insert(property.into(), value.into());
        self
    }

    /// With dimensions
    #[must_use]
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// With decoding hint
    #[must_use]
    pub fn decoding(mut self, decoding: Decoding) -> Self {
        self.decoding = Some(decoding);
        self
    }

    /// With class list
    #[must_use]
    pub fn class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    /// Inline style serialized as `prop: value; prop: value`
    #[must_use]
    pub fn style_attr(&self) -> Option<String> {
        if self.style.is_empty() {
            return None;
        }
        let declarations = self
            .style
            .iter()
            .map(|(property, value)| format!("{property}: {value}"))
            .collect::<Vec<_>>();
        Some(declarations.join("; "))
    }
}
