use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use crate::app::domain::Theme;
use crate::app::infrastructure::dom::{Document, NodeId};

/// `id` attribute of the theme stylesheet link.
pub const THEME_LINK_ID: &str = "font-changer-themes";

/// Loads the theme stylesheet once and toggles the theme class on the root element.
#[derive(Debug)]
pub struct ThemeInjector {
    document: Rc<RefCell<Document>>,
    href: String,
    link: Option<NodeId>,
}

impl ThemeInjector {
    pub fn new(document: Rc<RefCell<Document>>, href: impl Into<String>) -> Self {
        Self {
            document,
            href: href.into(),
            link: None,
        }
    }

    pub fn apply(&mut self, theme: Theme, enabled: bool) {
        let mut doc = self.document.borrow_mut();
        if self.link.is_none() {
            self.link = Some(create_link(&mut doc, &self.href));
        }

        let Some(root) = doc.document_element() else {
            debug!("No root element, theme {} not applied", theme);
            return;
        };
        for class in Theme::CLASSES {
            doc.remove_class(root, class);
        }
        if !enabled {
            return;
        }
        if let Some(class) = theme.class_name() {
            doc.add_class(root, class);
        }
    }

    pub fn link(&self) -> Option<NodeId> {
        self.link
    }
}

fn create_link(doc: &mut Document, href: &str) -> NodeId {
    let link = doc.create_element("link");
    doc.set_attribute(link, "rel", "stylesheet");
    doc.set_attribute(link, "href", href);
    doc.set_attribute(link, "id", THEME_LINK_ID);
    match doc.injection_target() {
        Some(target) => doc.append_child(target, link),
        None => debug!("No head or root element for the theme stylesheet"),
    }
    link
}
