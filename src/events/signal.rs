//! External triggers for signal-driven transitions.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Identifies one listener connected to a [`Signal`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Rc<dyn Fn()>;

#[derive(Default)]
struct SignalCore {
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(ListenerId, Listener)>>,
}

/// A trigger that code outside the machine can raise.
///
/// The signal owns its observer list. Signal-driven transitions connect a
/// listener while their graph is running and attached, and disconnect it
/// again on exit, detach or dispose. Clones share the same listener list.
///
/// # Example
///
/// ```rust
/// use framestate::events::Signal;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let alarm = Signal::new();
/// let heard = Rc::new(Cell::new(false));
/// let flag = Rc::clone(&heard);
/// let id = alarm.connect(move || flag.set(true));
///
/// alarm.fire();
/// assert!(heard.get());
/// assert!(alarm.disconnect(id));
/// ```
#[derive(Clone, Default)]
pub struct Signal {
    core: Rc<SignalCore>,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + 'static,
    {
        self.connect_rc(Rc::new(listener))
    }

    pub(crate) fn connect_rc(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.core.next_id.get());
        self.core.next_id.set(id.0 + 1);
        self.core.listeners.borrow_mut().push((id, listener));
        id
    }

    pub fn disconnect(&self, id: ListenerId) -> bool {
        let mut listeners = self.core.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.core.listeners.borrow().len()
    }

    /// Invoke every connected listener in connection order.
    pub fn fire(&self) {
        let listeners: Vec<Listener> = self
            .core
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in listeners {
            listener();
        }
    }

    pub fn ptr_eq(&self, other: &Signal) -> bool {
        Rc::ptr_eq(&self.core, &other.core)
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
