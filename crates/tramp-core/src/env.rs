use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::HashMap as SymbolMap;

use crate::error::TrampError;
use crate::symbol::Symbol;
use crate::value::Value;

/// One lexical frame. Cloning an `Env` shares its bindings.
#[derive(Debug, Clone)]
pub struct Env {
    pub bindings: Rc<RefCell<SymbolMap<Symbol, Value>>>,
    pub parent: Option<Rc<Env>>,
}

impl Env {
    pub fn new() -> Self {
        Env {
            bindings: Rc::new(RefCell::new(SymbolMap::new())),
            parent: None,
        }
    }

    pub fn with_parent(parent: Rc<Env>) -> Self {
        Env {
            bindings: Rc::new(RefCell::new(SymbolMap::new())),
            parent: Some(parent),
        }
    }

    /// Build a child frame binding `names` to `values` pairwise.
    pub fn from_bindings(
        names: &[Symbol],
        values: &[Value],
        parent: Rc<Env>,
    ) -> Result<Self, TrampError> {
        if names.len() != values.len() {
            return Err(TrampError::ParameterCount {
                expected: names.len(),
                got: values.len(),
            });
        }
        let env = Env::with_parent(parent);
        {
            let mut bindings = env.bindings.borrow_mut();
            for (name, value) in names.iter().zip(values) {
                bindings.insert(name.clone(), value.clone());
            }
        }
        Ok(env)
    }

    pub fn get(&self, name: &Symbol) -> Option<Value> {
        let frame = self.find_frame(name)?;
        let bindings = frame.bindings.borrow();
        bindings.get(name).cloned()
    }

    /// Bind `name` in this frame, shadowing any outer binding.
    pub fn define(&self, name: Symbol, val: Value) {
        self.bindings.borrow_mut().insert(name, val);
    }

    pub fn contains_local(&self, name: &Symbol) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    /// The innermost frame that binds `name`.
    pub fn find_frame(&self, name: &Symbol) -> Option<&Env> {
        let mut env = self;
        loop {
            if env.contains_local(name) {
                return Some(env);
            }
            env = env.parent.as_deref()?;
        }
    }

    pub fn depth(&self) -> usize {
        std::iter::successors(Some(self), |env| env.parent.as_deref()).count()
    }

    /// Names bound directly in this frame, sorted.
    pub fn local_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .bindings
            .borrow()
            .keys()
            .map(|s| s.name().to_string())
            .collect();
        names.sort();
        names
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::Interner;

    #[test]
    fn lookup_walks_outward() {
        let interner = Interner::default();
        let x = interner.intern("x");
        let y = interner.intern("y");
        let global = Rc::new(Env::new());
        global.define(x.clone(), Value::Int(1));
        let child = Env::with_parent(global.clone());
        child.define(y.clone(), Value::Int(2));

        assert_eq!(child.get(&x), Some(Value::Int(1)));
        assert_eq!(child.get(&y), Some(Value::Int(2)));
        assert_eq!(global.get(&y), None);
        assert_eq!(child.depth(), 2);
    }

    #[test]
    fn define_shadows_and_set_mutates_resolving_frame() {
        let interner = Interner::default();
        let x = interner.intern("x");
        let global = Rc::new(Env::new());
        global.define(x.clone(), Value::Int(1));
        let child = Env::with_parent(global.clone());

        child
            .find_frame(&x)
            .expect("x is bound globally")
            .define(x.clone(), Value::Int(5));
        assert_eq!(global.get(&x), Some(Value::Int(5)));
        assert!(!child.contains_local(&x));

        child.define(x.clone(), Value::Int(9));
        assert_eq!(child.get(&x), Some(Value::Int(9)));
        assert_eq!(global.get(&x), Some(Value::Int(5)));
    }

    #[test]
    fn unbound_names_have_no_frame() {
        let interner = Interner::default();
        let env = Env::with_parent(Rc::new(Env::new()));
        assert!(env.find_frame(&interner.intern("nope")).is_none());
    }

    #[test]
    fn from_bindings_checks_lengths() {
        let interner = Interner::default();
        let names = vec![interner.intern("a"), interner.intern("b")];
        let parent = Rc::new(Env::new());
        let err = Env::from_bindings(&names, &[Value::Int(1)], parent.clone()).unwrap_err();
        assert!(matches!(
            err,
            TrampError::ParameterCount {
                expected: 2,
                got: 1
            }
        ));
        let env = Env::from_bindings(&names, &[Value::Int(1), Value::Int(2)], parent).unwrap();
        assert_eq!(env.local_names(), vec!["a", "b"]);
    }
}
