//! Declarative style directives
//!
//! Layout decisions are expressed as property/value pairs plus a z-index
//! and applied by a thin adapter, so the renderers never reach into a
//! specific styling mechanism directly.

use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlElement};

/// Overlay colors cycle through this palette, keyed by label hash, when
/// the schema carries no fixed color
const LABEL_PALETTE: &[&str] = &[
    "rgba(59, 130, 246, 0.28)",
    "rgba(16, 185, 129, 0.28)",
    "rgba(249, 115, 22, 0.28)",
    "rgba(139, 92, 246, 0.28)",
    "rgba(236, 72, 153, 0.28)",
    "rgba(234, 179, 8, 0.28)",
];

/// A set of style properties to apply to one element
#[derive(Clone, Debug, PartialEq)]
pub struct StyleDirective {
    pub z_index: i32,
    pub properties: Vec<(String, String)>,
}

impl StyleDirective {
    pub fn new(z_index: i32) -> Self {
        Self {
            z_index,
            properties: Vec::new(),
        }
    }

    /// Builder-style property append
    pub fn set(mut self, property: &str, value: impl Into<String>) -> Self {
        self.properties.push((property.to_string(), value.into()));
        self
    }

    /// Look up a property value (test and adapter convenience)
    pub fn get(&self, property: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(p, _)| p == property)
            .map(|(_, v)| v.as_str())
    }
}

/// Apply a directive to a DOM element
///
/// Elements that are not HTML elements (e.g. SVG) take the properties via
/// an inline style attribute instead of the CSSOM interface.
pub fn apply_directive(element: &Element, directive: &StyleDirective) {
    if let Some(html) = element.dyn_ref::<HtmlElement>() {
        let style = html.style();
        let _ = style.set_property("z-index", &directive.z_index.to_string());
        for (property, value) in &directive.properties {
            let _ = style.set_property(property, value);
        }
    } else {
        let mut inline = format!("z-index: {};", directive.z_index);
        for (property, value) in &directive.properties {
            inline.push_str(&format!(" {}: {};", property, value));
        }
        let _ = element.set_attribute("style", &inline);
    }
}

/// Deterministic palette color for a label
pub fn label_color(label: &str) -> &'static str {
    let hash = label
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    LABEL_PALETTE[hash % LABEL_PALETTE.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_builder() {
        let directive = StyleDirective::new(12)
            .set("position", "absolute")
            .set("left", "10px");
        assert_eq!(directive.z_index, 12);
        assert_eq!(directive.get("position"), Some("absolute"));
        assert_eq!(directive.get("left"), Some("10px"));
        assert_eq!(directive.get("top"), None);
    }

    #[test]
    fn test_label_color_is_stable() {
        assert_eq!(label_color("ANIMAL"), label_color("ANIMAL"));
    }
}
