use std::rc::Rc;

use log::trace;

use crate::class::Class;
use crate::error::VmError;
use crate::interning::Interned;
use crate::invokable::Invokable;
use crate::universe::Universe;

impl Class {
    /// Find the invokable for `selector`, starting at this class.
    ///
    /// Hits in the own table and in superclasses are remembered in this
    /// class's cache. Misses are not, so a method added later is found.
    pub fn lookup_invokable(&self, selector: Interned) -> Option<Rc<Invokable>> {
        if let Some(invokable) = self.cache.borrow().get(&selector) {
            return Some(invokable.clone());
        }

        let own = self
            .invokables
            .borrow()
            .iter()
            .find(|i| i.signature() == selector)
            .cloned();
        if let Some(invokable) = own {
            self.cache.borrow_mut().insert(selector, invokable.clone());
            return Some(invokable);
        }

        let inherited = self.superclass()?.lookup_invokable(selector)?;
        self.cache.borrow_mut().insert(selector, inherited.clone());
        Some(inherited)
    }
}

/// Resolve `super selector` for a method of `holder`.
///
/// The lookup starts at the superclass of the lexically enclosing class
/// (or of its metaclass for class-side methods); the receiver plays no
/// part. Failing to find a method is fatal: there is no
/// `doesNotUnderstand:` fallback for super sends.
///
/// The holder is found through its global binding, so a super send follows
/// whatever class currently owns that name, and a holder that is not bound
/// as a global fails with [`VmError::UnknownHolderClass`].
pub fn lookup_super(
    u: &Universe,
    selector: Interned,
    holder: Interned,
    class_side: bool,
) -> Result<Rc<Invokable>, VmError> {
    let holder_class = u
        .get_global(holder)
        .and_then(|v| v.as_class().cloned())
        .ok_or_else(|| VmError::UnknownHolderClass(u.symbol_text(holder).to_string()))?;

    let lookup_class = if class_side {
        holder_class.class()
    } else {
        Some(holder_class)
    };

    trace!(
        "resolving super #{} from {}",
        u.symbol_text(selector),
        u.symbol_text(holder)
    );
    lookup_class
        .and_then(|c| c.superclass())
        .and_then(|c| c.lookup_invokable(selector))
        .ok_or_else(|| VmError::SuperSendNotUnderstood {
            selector: u.symbol_text(selector).to_string(),
            holder: u.symbol_text(holder).to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Exec;
    use crate::frame::Frame;
    use crate::interning::InternedStrings;
    use crate::invokable::InvokableKind;
    use crate::object::Value;

    fn answer_one(_: &Universe, _: Option<&Rc<Frame>>, _: Vec<Value>) -> Exec<Value> {
        Ok(Value::Integer(1))
    }

    fn class(strings: &InternedStrings, name: &str) -> Rc<Class> {
        let id = strings.add(name);
        Class::new(id, strings.get(id))
    }

    fn primitive(strings: &InternedStrings, selector: &str) -> Rc<Invokable> {
        let id = strings.add(selector);
        Invokable::new(id, strings.get(id), InvokableKind::Primitive(answer_one))
    }

    #[test]
    fn finds_own_then_inherited() {
        let strings = InternedStrings::new();
        let base = class(&strings, "Base");
        let derived = class(&strings, "Derived");
        derived.set_superclass(Some(base.clone()));

        let foo = primitive(&strings, "foo");
        let bar = primitive(&strings, "bar");
        base.set_instance_invokables(vec![foo.clone()]);
        derived.set_instance_invokables(vec![bar.clone()]);

        let found = derived.lookup_invokable(strings.add("foo")).expect("foo");
        assert!(Rc::ptr_eq(&found, &foo));
        let found = derived.lookup_invokable(strings.add("bar")).expect("bar");
        assert!(Rc::ptr_eq(&found, &bar));
        assert!(base.lookup_invokable(strings.add("bar")).is_none());
        assert!(Rc::ptr_eq(
            &foo.holder().expect("holder"),
            &base
        ));
    }

    #[test]
    fn misses_are_not_cached() {
        let strings = InternedStrings::new();
        let base = class(&strings, "Base");
        let derived = class(&strings, "Derived");
        derived.set_superclass(Some(base.clone()));

        let late = strings.add("late");
        assert!(derived.lookup_invokable(late).is_none());
        assert!(derived.cache.borrow().is_empty());

        base.add_instance_invokable(primitive(&strings, "late"));
        assert!(derived.lookup_invokable(late).is_some());
        assert!(derived.cache.borrow().contains_key(&late));
    }

    #[test]
    fn adding_replaces_same_signature() {
        let strings = InternedStrings::new();
        let cls = class(&strings, "Thing");
        assert!(cls.add_instance_invokable(primitive(&strings, "x")));
        let replacement = primitive(&strings, "x");
        assert!(!cls.add_instance_invokable(replacement.clone()));
        assert_eq!(cls.number_of_invokables(), 1);
        let found = cls.lookup_invokable(strings.add("x")).expect("x");
        assert!(Rc::ptr_eq(&found, &replacement));
    }

    #[test]
    fn super_lookup_follows_the_holder_binding() {
        let u = crate::universe::tests::test_universe();
        u.load_class_from_string("HolderBase = ( foo = ( ^ 1 ) )").expect("base");
        u.load_class_from_string("HolderSub = HolderBase ( foo = ( ^ 2 ) )").expect("sub");
        let foo = u.symbol("foo");
        let holder = u.symbol("HolderSub");

        let found = lookup_super(&u, foo, holder, false).expect("inherited foo");
        assert_eq!(
            found.holder().map(|c| c.name()),
            Some(u.symbol("HolderBase"))
        );

        u.set_global(holder, Value::Integer(3));
        assert!(matches!(
            lookup_super(&u, foo, holder, false),
            Err(VmError::UnknownHolderClass(_))
        ));
    }
}
