//! Rendering of the placeholder and the loaded image

use crate::props::{Element, ImageProps, Placeholder};

/// Output of [`crate::ImageLoadController::render`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    /// Still loading (or failed under the surfacing policy)
    Placeholder(Element),
    /// The loaded image
    Image(Element),
}

impl Rendered {
    /// The rendered element
    #[must_use]
    pub fn element(&self) -> &Element {
        match self {
            Rendered::Placeholder(element) | Rendered::Image(element) => element,
        }
    }

    /// Check if the placeholder is showing
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Rendered::Placeholder(_))
    }
}

fn img(src: Option<&str>, alt: Option<&str>, props: &ImageProps) -> Element {
    Element::new("img")
        .with_opt_attr("src", src)
        .with_opt_attr("alt", alt)
        .with_opt_attr("style", props.style_attr())
        .with_opt_attr("class", props.class_name.as_deref())
        .with_opt_attr("width", props.width)
        .with_opt_attr("height", props.height)
        .with_opt_attr("decoding", props.decoding)
}

pub(crate) fn placeholder(props: &ImageProps) -> Element {
    match &props.placeholder {
        Some(Placeholder::Render(render)) => render(props),
        Some(Placeholder::Element(element)) => element.clone(),
        Some(Placeholder::Source(src)) => img(Some(src), props.placeholder_alt.as_deref(), props),
        None => img(None, props.placeholder_alt.as_deref(), props),
    }
}

pub(crate) fn image(url: &str, props: &ImageProps) -> Element {
    img(Some(url), props.alt.as_deref(), props)
}
