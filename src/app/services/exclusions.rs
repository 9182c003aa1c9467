//! Elements the font override must never touch.
//!
//! Icon fonts render ligatures or private-use code points, math renderers
//! position glyphs against their own font metrics, and code blocks rely on a
//! monospaced face. Forcing a text font onto any of them corrupts the page,
//! so the override's universal selector carries a `:not(...)` for each entry.

/// One denylist entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    /// Element has exactly this class: `:not(.fa)`
    Class(&'static str),
    /// The class attribute contains this substring: `:not([class*="fa-"])`
    ClassContains(&'static str),
    /// Element has this tag name: `:not(code)`
    Tag(&'static str),
}

use Exclusion::{Class, ClassContains, Tag};

pub const EXCLUSIONS: &[Exclusion] = &[
    // Font Awesome
    Class("fa"),
    Class("fas"),
    Class("far"),
    Class("fab"),
    Class("fal"),
    // Material Icons / Symbols
    Class("material-icons"),
    Class("material-icons-outlined"),
    Class("material-icons-round"),
    Class("material-icons-sharp"),
    Class("material-icons-two-tone"),
    Class("material-symbols-outlined"),
    Class("material-symbols-rounded"),
    Class("material-symbols-sharp"),
    ClassContains("icon"),
    ClassContains("Icon"),
    ClassContains("fa-"),
    // Math
    Tag("math"),
    ClassContains("math"),
    ClassContains("Math"),
    Class("katex"),
    ClassContains("katex"),
    Class("MathJax"),
    ClassContains("MathJax"),
    // Code
    Tag("code"),
    Tag("pre"),
    ClassContains("symbol"),
    ClassContains("Symbol"),
    // Phosphor, Bootstrap Icons, Remix, Boxicons, Tabler, Ionicons
    Class("ph"),
    ClassContains("ph-"),
    Class("bi"),
    ClassContains("bi-"),
    Class("ri"),
    ClassContains("ri-"),
    Class("bx"),
    ClassContains("bx-"),
    Class("ti"),
    ClassContains("ti-"),
    Class("ion"),
    ClassContains("ion-"),
    ClassContains("icon-"),
    // Glyphicons, Octicons
    Class("glyphicon"),
    ClassContains("glyphicon-"),
    Class("octicon"),
    ClassContains("octicon-"),
];

impl Exclusion {
    /// The `:not(...)` pseudo-class for this entry.
    pub fn selector(&self) -> String {
        match self {
            Class(class) => format!(":not(.{})", class),
            ClassContains(fragment) => format!(":not([class*=\"{}\"])", fragment),
            Tag(tag) => format!(":not({})", tag),
        }
    }

    /// Whether an element with `tag` and raw `class` attribute is excluded by this entry.
    pub fn matches(&self, tag: &str, class_attr: &str) -> bool {
        match self {
            Class(class) => class_attr.split_ascii_whitespace().any(|c| c == *class),
            ClassContains(fragment) => class_attr.contains(fragment),
            Tag(name) => tag.eq_ignore_ascii_case(name),
        }
    }
}

/// `*` followed by every exclusion.
pub fn override_selector() -> String {
    let mut selector = String::from("*");
    for exclusion in EXCLUSIONS {
        selector.push_str(&exclusion.selector());
    }
    selector
}

/// The rule that forces `family` onto every non-excluded element.
pub fn override_rule(family: &str) -> String {
    format!(
        "{} {{ font-family: '{}', sans-serif !important; }}",
        override_selector(),
        escape_family(family)
    )
}

/// Whether the override rule applies to an element.
pub fn override_applies(tag: &str, class_attr: &str) -> bool {
    !EXCLUSIONS
        .iter()
        .any(|exclusion| exclusion.matches(tag, class_attr))
}

fn escape_family(family: &str) -> String {
    family.replace('\\', "\\\\").replace('\'', "\\'")
}
