use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use super::*;

mod inject;
mod model;

/// Shared record of the callbacks fired during a test
#[derive(Clone)]
struct Calls<T>(Rc<RefCell<Vec<T>>>);

impl<T> Default for Calls<T> {
    fn default() -> Self {
        Calls(Rc::new(RefCell::new(Vec::new())))
    }
}

impl<T: Clone + 'static> Calls<T> {
    fn push(&self, value: T) {
        self.0.borrow_mut().push(value);
    }

    fn all(&self) -> Vec<T> {
        self.0.borrow().clone()
    }

    fn count(&self) -> usize {
        self.0.borrow().len()
    }
}

/// Provider returning a fresh integer model
fn number(value: i32) -> impl Fn(Args) -> Result<Model, BoxError> {
    move |_| Ok(Arc::new(value) as Model)
}

/// Read back integer arguments, `None` for absent ones
fn numbers(args: &Args) -> Vec<Option<i32>> {
    (0..args.len())
        .map(|i| args.optional::<i32>(i).ok().flatten().map(|v| *v))
        .collect()
}

fn dep(name: &str) -> Dependency {
    Dependency::new(name)
}
