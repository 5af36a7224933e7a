//! Activation tree node.

use crate::error::{FsmError, FsmResult};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

struct NodeState {
    name: String,
    is_power_source: bool,
    is_switched_on: bool,
    has_power: bool,
    is_active: bool,
    parent: Weak<RefCell<NodeState>>,
    children: Vec<PowerNode>,
}

/// A node in the activation ("power") tree.
///
/// A node is active when it is switched on and powered. It is powered when it
/// is a switched-on power source, or when its parent is active. Every
/// mutation re-derives the node and its whole subtree top-down, so a child
/// never observes a stale parent.
///
/// `PowerNode` is a cheap, cloneable handle; clones refer to the same node.
/// A parent owns its children, a child only keeps a weak link to its parent.
///
/// # Example
///
/// ```rust
/// use framestate::power::PowerNode;
///
/// let root = PowerNode::source("machine");
/// let child = PowerNode::new("graph");
/// root.attach_child(&child).unwrap();
///
/// assert!(!child.is_active());
/// root.set_switched_on(true);
/// assert!(child.is_active());
///
/// root.set_switched_on(false);
/// assert!(!child.has_power());
/// ```
#[derive(Clone)]
pub struct PowerNode {
    inner: Rc<RefCell<NodeState>>,
}

impl PowerNode {
    /// A switched-on, non-source node with no parent (and therefore no power).
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), false, true)
    }

    /// A switched-off power source. It becomes active once switched on.
    pub fn source(name: impl Into<String>) -> Self {
        Self::build(name.into(), true, false)
    }

    fn build(name: String, is_power_source: bool, is_switched_on: bool) -> Self {
        let node = PowerNode {
            inner: Rc::new(RefCell::new(NodeState {
                name,
                is_power_source,
                is_switched_on,
                has_power: false,
                is_active: false,
                parent: Weak::new(),
                children: Vec::new(),
            })),
        };
        node.refresh();
        node
    }

    pub fn name(&self) -> String {
        self.inner.borrow().name.clone()
    }

    pub fn is_power_source(&self) -> bool {
        self.inner.borrow().is_power_source
    }

    pub fn is_switched_on(&self) -> bool {
        self.inner.borrow().is_switched_on
    }

    pub fn has_power(&self) -> bool {
        self.inner.borrow().has_power
    }

    pub fn is_active(&self) -> bool {
        self.inner.borrow().is_active
    }

    pub fn parent(&self) -> Option<PowerNode> {
        self.inner
            .borrow()
            .parent
            .upgrade()
            .map(|inner| PowerNode { inner })
    }

    pub fn children(&self) -> Vec<PowerNode> {
        self.inner.borrow().children.clone()
    }

    pub fn child_count(&self) -> usize {
        self.inner.borrow().children.len()
    }

    /// Whether both handles refer to the same node.
    pub fn ptr_eq(&self, other: &PowerNode) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn has_child(&self, child: &PowerNode) -> bool {
        self.inner
            .borrow()
            .children
            .iter()
            .any(|c| c.ptr_eq(child))
    }

    /// Attach `child` under this node, moving it away from any previous parent.
    ///
    /// Attaching a node that is already a child is a no-op. Only
    /// self-attachment is rejected; deeper cycles are prevented by the
    /// ownership transfer, not detected.
    pub fn attach_child(&self, child: &PowerNode) -> FsmResult<()> {
        if self.ptr_eq(child) {
            return Err(FsmError::SelfAttachment(self.name()));
        }
        if self.has_child(child) {
            return Ok(());
        }
        if let Some(previous) = child.parent() {
            previous.detach_child(child);
        }

        self.inner.borrow_mut().children.push(child.clone());
        child.inner.borrow_mut().parent = Rc::downgrade(&self.inner);
        child.refresh();
        Ok(())
    }

    /// Remove `child` from this node. Idempotent.
    pub fn detach_child(&self, child: &PowerNode) {
        let removed = {
            let mut state = self.inner.borrow_mut();
            let before = state.children.len();
            state.children.retain(|c| !c.ptr_eq(child));
            state.children.len() != before
        };
        if removed {
            child.inner.borrow_mut().parent = Weak::new();
            child.refresh();
        }
    }

    /// Re-parent this node, or orphan it with `None`.
    pub fn set_parent(&self, parent: Option<&PowerNode>) -> FsmResult<()> {
        match parent {
            Some(parent) if parent.ptr_eq(self) => Err(FsmError::SelfParenting(self.name())),
            Some(parent) => parent.attach_child(self),
            None => {
                if let Some(previous) = self.parent() {
                    previous.detach_child(self);
                }
                Ok(())
            }
        }
    }

    pub fn set_switched_on(&self, on: bool) {
        {
            let mut state = self.inner.borrow_mut();
            if state.is_switched_on == on {
                return;
            }
            state.is_switched_on = on;
        }
        self.refresh();
    }

    pub fn set_power_source(&self, source: bool) {
        {
            let mut state = self.inner.borrow_mut();
            if state.is_power_source == source {
                return;
            }
            state.is_power_source = source;
        }
        self.refresh();
    }

    // Self first, then children, so every child reads its parent's fresh state.
    fn refresh(&self) {
        let parent_active = self
            .inner
            .borrow()
            .parent
            .upgrade()
            .is_some_and(|p| p.borrow().is_active);

        let child_count = {
            let mut state = self.inner.borrow_mut();
            state.has_power = (state.is_power_source && state.is_switched_on) || parent_active;
            state.is_active = state.is_switched_on && state.has_power;
            state.children.len()
        };

        for i in 0..child_count {
            let child = self.inner.borrow().children.get(i).cloned();
            if let Some(child) = child {
                child.refresh();
            }
        }
    }
}

impl fmt::Debug for PowerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.borrow();
        f.debug_struct("PowerNode")
            .field("name", &state.name)
            .field("is_power_source", &state.is_power_source)
            .field("is_switched_on", &state.is_switched_on)
            .field("has_power", &state.has_power)
            .field("is_active", &state.is_active)
            .field("children", &state.children.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_nodes_are_inactive() {
        let plain = PowerNode::new("plain");
        assert!(plain.is_switched_on());
        assert!(!plain.has_power());
        assert!(!plain.is_active());

        let source = PowerNode::source("source");
        assert!(!source.is_switched_on());
        assert!(!source.is_active());
    }

    #[test]
    fn switched_on_source_powers_itself() {
        let source = PowerNode::source("source");
        source.set_switched_on(true);
        assert!(source.has_power());
        assert!(source.is_active());
    }

    #[test]
    fn power_cascades_through_grandchildren() {
        let root = PowerNode::source("root");
        let mid = PowerNode::new("mid");
        let leaf = PowerNode::new("leaf");
        root.attach_child(&mid).unwrap();
        mid.attach_child(&leaf).unwrap();

        root.set_switched_on(true);
        assert!(leaf.is_active());

        mid.set_switched_on(false);
        assert!(!mid.is_active());
        assert!(mid.has_power());
        assert!(!leaf.has_power());

        mid.set_switched_on(true);
        root.set_switched_on(false);
        assert!(!mid.is_active());
        assert!(!leaf.is_active());
    }

    #[test]
    fn attach_is_idempotent() {
        let root = PowerNode::source("root");
        let child = PowerNode::new("child");
        root.attach_child(&child).unwrap();
        root.attach_child(&child).unwrap();
        assert_eq!(root.child_count(), 1);
    }

    #[test]
    fn attaching_moves_child_between_parents() {
        let first = PowerNode::source("first");
        let second = PowerNode::source("second");
        let child = PowerNode::new("child");
        first.set_switched_on(true);

        first.attach_child(&child).unwrap();
        assert!(child.is_active());

        second.attach_child(&child).unwrap();
        assert_eq!(first.child_count(), 0);
        assert_eq!(second.child_count(), 1);
        assert!(child.parent().unwrap().ptr_eq(&second));
        assert!(!child.is_active());
    }

    #[test]
    fn self_links_are_rejected() {
        let node = PowerNode::new("loop");
        assert!(matches!(
            node.attach_child(&node),
            Err(FsmError::SelfAttachment(_))
        ));
        assert!(matches!(
            node.set_parent(Some(&node)),
            Err(FsmError::SelfParenting(_))
        ));
        assert_eq!(node.child_count(), 0);
        assert!(node.parent().is_none());
    }

    #[test]
    fn detach_is_idempotent_and_clears_parent() {
        let root = PowerNode::source("root");
        let child = PowerNode::new("child");
        root.set_switched_on(true);
        root.attach_child(&child).unwrap();

        root.detach_child(&child);
        root.detach_child(&child);
        assert!(child.parent().is_none());
        assert!(!child.is_active());
    }

    #[test]
    fn set_parent_rewires_and_recomputes() {
        let root = PowerNode::source("root");
        root.set_switched_on(true);
        let child = PowerNode::new("child");

        child.set_parent(Some(&root)).unwrap();
        assert!(child.is_active());
        child.set_parent(Some(&root)).unwrap();
        assert_eq!(root.child_count(), 1);

        child.set_parent(None).unwrap();
        assert!(!child.is_active());
        assert_eq!(root.child_count(), 0);
    }

    #[test]
    fn power_source_flag_can_change() {
        let node = PowerNode::new("node");
        assert!(!node.is_active());
        node.set_power_source(true);
        assert!(node.is_active());
        node.set_power_source(false);
        assert!(!node.is_active());
    }
}
