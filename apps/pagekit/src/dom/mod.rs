//! Headless page model.
//!
//! `Page` is the document every pagekit component renders into: an arena of
//! elements with ids, classes, attributes, text and form values, plus an
//! event registry and the selection-based copy command used by the
//! clipboard fallback. Cloning a `Page` clones the handle, not the document.

pub mod events;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

pub use events::{DomEvent, EventKind, EventOutcome, FileDescriptor, Listener};

const TEXT_CONTROLS: &[&str] = &["input", "textarea"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

#[derive(Debug, Clone, Default)]
struct Element {
    tag: String,
    dom_id: Option<String>,
    classes: BTreeSet<String>,
    attributes: BTreeMap<String, String>,
    text: String,
    value: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

struct Document {
    next_id: u64,
    nodes: HashMap<NodeId, Element>,
    root: NodeId,
    body: NodeId,
    listeners: HashMap<NodeId, BTreeMap<(EventKind, String), Listener>>,
    selection: Option<NodeId>,
    copy_command_enabled: bool,
    copied_text: Option<String>,
}

impl Document {
    fn new() -> Self {
        let mut doc = Document {
            next_id: 0,
            nodes: HashMap::new(),
            root: NodeId(0),
            body: NodeId(0),
            listeners: HashMap::new(),
            selection: None,
            copy_command_enabled: true,
            copied_text: None,
        };
        let root = doc.alloc("html");
        let body = doc.alloc("body");
        doc.link(root, body);
        doc.root = root;
        doc.body = body;
        doc
    }

    fn alloc(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Element {
                tag: tag.to_string(),
                ..Element::default()
            },
        );
        id
    }

    fn detach(&mut self, node: NodeId) {
        let parent = self.nodes.get_mut(&node).and_then(|el| el.parent.take());
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != node);
        }
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        if let Some(el) = self.nodes.get_mut(&child) {
            el.parent = Some(parent);
        }
        if let Some(el) = self.nodes.get_mut(&parent) {
            el.children.push(child);
        }
    }

    fn subtree(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if let Some(el) = self.nodes.get(&current) {
                out.push(current);
                stack.extend(el.children.iter().rev().copied());
            }
        }
        out
    }

    fn is_attached(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == self.root {
                return true;
            }
            current = self.nodes.get(&id).and_then(|el| el.parent);
        }
        false
    }
}

/// Shared handle to one page's document.
#[derive(Clone)]
pub struct Page {
    inner: Arc<Mutex<Document>>,
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl Page {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Document::new())),
        }
    }

    fn doc(&self) -> MutexGuard<'_, Document> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_element<R>(&self, node: NodeId, f: impl FnOnce(&Element) -> R) -> Option<R> {
        self.doc().nodes.get(&node).map(f)
    }

    fn with_element_mut<R>(&self, node: NodeId, f: impl FnOnce(&mut Element) -> R) -> Option<R> {
        self.doc().nodes.get_mut(&node).map(f)
    }

    pub fn root(&self) -> NodeId {
        self.doc().root
    }

    pub fn body(&self) -> NodeId {
        self.doc().body
    }

    /// Creates a detached element.
    pub fn create_element(&self, tag: &str) -> NodeId {
        self.doc().alloc(tag)
    }

    /// Moves `child` under `parent`. Returns false if either node is unknown.
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> bool {
        let mut doc = self.doc();
        if !doc.nodes.contains_key(&parent) || !doc.nodes.contains_key(&child) {
            return false;
        }
        doc.link(parent, child);
        true
    }

    /// Removes `node` and its subtree from the document, dropping their listeners.
    pub fn remove(&self, node: NodeId) -> bool {
        let mut doc = self.doc();
        if !doc.nodes.contains_key(&node) || node == doc.root {
            return false;
        }
        doc.detach(node);
        for id in doc.subtree(node) {
            doc.nodes.remove(&id);
            doc.listeners.remove(&id);
            if doc.selection == Some(id) {
                doc.selection = None;
            }
        }
        true
    }

    /// True when `node` exists and is reachable from the document root.
    pub fn contains(&self, node: NodeId) -> bool {
        self.doc().is_attached(node)
    }

    pub fn exists(&self, node: NodeId) -> bool {
        self.doc().nodes.contains_key(&node)
    }

    pub fn set_element_id(&self, node: NodeId, id: &str) -> bool {
        self.with_element_mut(node, |el| el.dom_id = Some(id.to_string()))
            .is_some()
    }

    /// Looks up an attached element by DOM id.
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        let doc = self.doc();
        let found = doc
            .subtree(doc.root)
            .into_iter()
            .find(|n| doc.nodes[n].dom_id.as_deref() == Some(id));
        found
    }

    pub fn add_class(&self, node: NodeId, class: &str) -> bool {
        self.with_element_mut(node, |el| el.classes.insert(class.to_string()))
            .is_some()
    }

    pub fn remove_class(&self, node: NodeId, class: &str) -> bool {
        self.with_element_mut(node, |el| el.classes.remove(class))
            .is_some()
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.with_element(node, |el| el.classes.contains(class))
            .unwrap_or(false)
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> bool {
        self.with_element_mut(node, |el| {
            el.attributes.insert(name.to_string(), value.to_string())
        })
        .is_some()
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.with_element(node, |el| el.attributes.get(name).cloned())
            .flatten()
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.with_element(node, |el| el.attributes.contains_key(name))
            .unwrap_or(false)
    }

    pub fn set_text(&self, node: NodeId, text: &str) -> bool {
        self.with_element_mut(node, |el| el.text = text.to_string())
            .is_some()
    }

    pub fn text(&self, node: NodeId) -> Option<String> {
        self.with_element(node, |el| el.text.clone())
    }

    pub fn set_value(&self, node: NodeId, value: &str) -> bool {
        self.with_element_mut(node, |el| el.value = value.to_string())
            .is_some()
    }

    pub fn value(&self, node: NodeId) -> Option<String> {
        self.with_element(node, |el| el.value.clone())
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.with_element(node, |el| el.children.clone())
            .unwrap_or_default()
    }

    /// All elements below `node` in document order, excluding `node` itself.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let doc = self.doc();
        doc.subtree(node).into_iter().skip(1).collect()
    }

    /// Registers `listener` for `kind` on `node` under `key`.
    ///
    /// Registering the same key and kind again replaces the earlier listener,
    /// so repeated initialization never double-binds. Returns true when the
    /// binding is new.
    pub fn add_listener(
        &self,
        node: NodeId,
        key: &str,
        kind: EventKind,
        listener: Listener,
    ) -> bool {
        let mut doc = self.doc();
        if !doc.nodes.contains_key(&node) {
            return false;
        }
        let replaced = doc
            .listeners
            .entry(node)
            .or_default()
            .insert((kind, key.to_string()), listener)
            .is_some();
        if replaced {
            debug!(?node, key, ?kind, "Listener re-registered; previous binding replaced");
        }
        !replaced
    }

    /// Runs every listener bound to `node` for the event's kind.
    /// Returns true if any listener prevented the default action.
    ///
    /// Listeners run without the document lock held, so they may freely
    /// mutate the page.
    pub fn dispatch(&self, node: NodeId, event: &DomEvent) -> bool {
        let listeners: Vec<Listener> = {
            let doc = self.doc();
            doc.listeners
                .get(&node)
                .map(|m| {
                    m.iter()
                        .filter(|((kind, _), _)| *kind == event.kind)
                        .map(|(_, l)| Arc::clone(l))
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut prevented = false;
        for listener in listeners {
            if listener(self, event) == EventOutcome::PreventDefault {
                prevented = true;
            }
        }
        prevented
    }

    /// Selects the contents of a text control. Other elements cannot be selected.
    pub fn select(&self, node: NodeId) -> bool {
        let mut doc = self.doc();
        let selectable = doc
            .nodes
            .get(&node)
            .is_some_and(|el| TEXT_CONTROLS.contains(&el.tag.as_str()));
        if selectable {
            doc.selection = Some(node);
        }
        selectable
    }

    /// Copies the current selection, the way `document.execCommand("copy")` does.
    /// Fails when the command is unsupported or nothing attached is selected.
    pub fn exec_copy(&self) -> bool {
        let mut doc = self.doc();
        if !doc.copy_command_enabled {
            return false;
        }
        let Some(selected) = doc.selection.filter(|n| doc.is_attached(*n)) else {
            return false;
        };
        let text = doc.nodes[&selected].value.clone();
        doc.copied_text = Some(text);
        true
    }

    pub fn set_copy_command_enabled(&self, enabled: bool) {
        self.doc().copy_command_enabled = enabled;
    }

    /// Text last placed on the clipboard by `exec_copy`.
    pub fn copied_text(&self) -> Option<String> {
        self.doc().copied_text.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_new_page_has_attached_body() {
        let page = Page::new();
        assert!(page.contains(page.body()));
        assert_eq!(page.children(page.root()), vec![page.body()]);
    }

    #[test]
    fn test_detached_element_is_not_found_by_id() {
        let page = Page::new();
        let div = page.create_element("div");
        page.set_element_id(div, "box");
        assert_eq!(page.get_element_by_id("box"), None);

        page.append_child(page.body(), div);
        assert_eq!(page.get_element_by_id("box"), Some(div));
    }

    fn counting(hits: &Arc<AtomicUsize>) -> Listener {
        let hits = Arc::clone(hits);
        Arc::new(move |_: &Page, _: &DomEvent| {
            hits.fetch_add(1, Ordering::SeqCst);
            EventOutcome::Continue
        })
    }

    #[test]
    fn test_remove_drops_subtree_and_listeners() {
        let page = Page::new();
        let outer = page.create_element("div");
        let inner = page.create_element("span");
        page.append_child(page.body(), outer);
        page.append_child(outer, inner);
        let hits = Arc::new(AtomicUsize::new(0));
        page.add_listener(inner, "t", EventKind::Click, counting(&hits));

        assert!(page.remove(outer));
        assert!(!page.exists(outer));
        assert!(!page.exists(inner));
        page.dispatch(inner, &DomEvent::new(EventKind::Click));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(page.children(page.body()).is_empty());
    }

    #[test]
    fn test_root_cannot_be_removed() {
        let page = Page::new();
        assert!(!page.remove(page.root()));
    }

    #[test]
    fn test_listener_registration_is_idempotent_per_key() {
        let page = Page::new();
        let button = page.create_element("button");
        let hits = Arc::new(AtomicUsize::new(0));

        assert!(page.add_listener(button, "init", EventKind::Click, counting(&hits)));
        assert!(!page.add_listener(button, "init", EventKind::Click, counting(&hits)));
        page.dispatch(button, &DomEvent::new(EventKind::Click));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(page.add_listener(button, "other", EventKind::Click, counting(&hits)));
        page.dispatch(button, &DomEvent::new(EventKind::Click));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_dispatch_reports_prevent_default_and_allows_mutation() {
        let page = Page::new();
        let form = page.create_element("form");
        page.append_child(page.body(), form);
        page.add_listener(
            form,
            "guard",
            EventKind::Submit,
            Arc::new(|page: &Page, _: &DomEvent| {
                let body = page.body();
                page.add_class(body, "submitted");
                EventOutcome::PreventDefault
            }),
        );

        assert!(page.dispatch(form, &DomEvent::new(EventKind::Submit)));
        assert!(page.has_class(page.body(), "submitted"));
        assert!(!page.dispatch(form, &DomEvent::new(EventKind::Click)));
    }

    #[test]
    fn test_descendants_in_document_order() {
        let page = Page::new();
        let form = page.create_element("form");
        let a = page.create_element("input");
        let group = page.create_element("div");
        let b = page.create_element("input");
        page.append_child(form, a);
        page.append_child(form, group);
        page.append_child(group, b);
        assert_eq!(page.descendants(form), vec![a, group, b]);
    }

    #[test]
    fn test_exec_copy_requires_attached_selection() {
        let page = Page::new();
        let field = page.create_element("textarea");
        page.set_value(field, "hello");
        page.select(field);
        assert!(!page.exec_copy());

        page.append_child(page.body(), field);
        assert!(page.exec_copy());
        assert_eq!(page.copied_text().as_deref(), Some("hello"));

        page.set_copy_command_enabled(false);
        assert!(!page.exec_copy());
    }

    #[test]
    fn test_only_text_controls_can_be_selected() {
        let page = Page::new();
        let div = page.create_element("div");
        page.append_child(page.body(), div);
        assert!(!page.select(div));
        assert!(!page.exec_copy());

        let input = page.create_element("input");
        page.append_child(page.body(), input);
        assert!(page.select(input));
    }
}
