use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::debug;

use crate::app::infrastructure::dom::{Document, NodeId};

/// `id` attribute of the injected style node.
pub const STYLE_ELEMENT_ID: &str = "font-changer-style";

/// Owns the single override `<style>` node of a document.
///
/// Each [`apply`](Self::apply) replaces the previous node, so the document
/// never holds more than one. When the document has neither head nor root
/// element yet, the node is attached by a local task waiting on the
/// document's readiness signal.
#[derive(Debug)]
pub struct StyleInjector {
    document: Rc<RefCell<Document>>,
    current: Rc<Cell<Option<NodeId>>>,
    waiting: Rc<Cell<bool>>,
}

impl StyleInjector {
    pub fn new(document: Rc<RefCell<Document>>) -> Self {
        Self {
            document,
            current: Rc::new(Cell::new(None)),
            waiting: Rc::new(Cell::new(false)),
        }
    }

    /// Replaces the owned style node with one holding `css`; empty `css` removes it.
    ///
    /// Deferred attachment spawns a local task, so an `apply` on a document
    /// that is not ready must run inside a `tokio::task::LocalSet`.
    pub fn apply(&self, css: &str) {
        let mut doc = self.document.borrow_mut();

        if let Some(old) = self.current.take() {
            doc.drop_node(old);
        }
        if css.is_empty() {
            return;
        }

        let style = doc.create_element("style");
        doc.set_attribute(style, "id", STYLE_ELEMENT_ID);
        doc.set_text_content(style, css);
        self.current.set(Some(style));

        match doc.injection_target() {
            Some(target) => doc.append_child(target, style),
            None => self.attach_when_ready(&mut doc),
        }
    }

    /// The owned node, attached or waiting for the document.
    pub fn current(&self) -> Option<NodeId> {
        self.current.get()
    }

    pub fn is_attached(&self) -> bool {
        self.current
            .get()
            .is_some_and(|node| self.document.borrow().is_connected(node))
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting.get()
    }

    fn attach_when_ready(&self, doc: &mut Document) {
        if self.waiting.get() {
            // The pending task attaches whichever node is current when it fires.
            return;
        }
        debug!("Document has no head or root yet, deferring style injection");
        self.waiting.set(true);

        let mut ready = doc.ready_signal();
        let document = Rc::clone(&self.document);
        let current = Rc::clone(&self.current);
        let waiting = Rc::clone(&self.waiting);

        tokio::task::spawn_local(async move {
            loop {
                if ready.await.is_err() {
                    // Document dropped
                    return;
                }
                let mut doc = document.borrow_mut();
                let Some(target) = doc.injection_target() else {
                    // Root was removed again before this task ran.
                    ready = doc.ready_signal();
                    continue;
                };
                waiting.set(false);
                if let Some(node) = current.get() {
                    if !doc.is_connected(node) {
                        doc.append_child(target, node);
                    }
                }
                return;
            }
        });
    }
}
