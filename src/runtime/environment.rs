use crate::resolve::BindingId;
use crate::runtime::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Runtime counterpart of a lexical scope: a module body, a function call, a
/// block, or one loop iteration.
///
/// Bindings are keyed by the resolver's ids, so no name lookup happens here.
#[derive(Debug, Default)]
pub struct Frame {
    parent: Option<Rc<Frame>>,
    values: RefCell<HashMap<BindingId, Value>>,
}

impl Frame {
    pub fn root() -> Rc<Frame> {
        Rc::new(Frame::default())
    }

    pub fn child(parent: &Rc<Frame>) -> Rc<Frame> {
        Rc::new(Frame {
            parent: Some(parent.clone()),
            values: RefCell::new(HashMap::new()),
        })
    }

    pub fn define(&self, id: BindingId, value: Value) {
        self.values.borrow_mut().insert(id, value);
    }

    pub fn get(&self, id: BindingId) -> Option<Value> {
        if let Some(value) = self.get_local(id) {
            return Some(value);
        }
        self.parent.as_ref().and_then(|parent| parent.get(id))
    }

    /// Value defined in this frame itself, ignoring parents.
    pub fn get_local(&self, id: BindingId) -> Option<Value> {
        self.values.borrow().get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_sees_parent_until_shadowed() {
        let root = Frame::root();
        root.define(BindingId(0), Value::Number(1.0));
        let child = Frame::child(&root);
        assert_eq!(child.get(BindingId(0)).and_then(|v| v.as_number()), Some(1.0));
        assert!(child.get_local(BindingId(0)).is_none());

        child.define(BindingId(1), Value::Bool(true));
        assert!(root.get(BindingId(1)).is_none());
    }
}
