/// The runtime context.
///
/// A [`Universe`] owns everything that is global to one SOM program: the
/// symbol table, the globals, the bootstrap classes, the source loaders and
/// the output sink. It is passed explicitly to the parser, the interpreter
/// and every primitive; there is no process-wide state.
///
/// # Bootstrap
///
/// The class hierarchy is circular (`Metaclass class class == Metaclass`),
/// so [`Universe::new`] builds it in two phases: all system classes are
/// allocated first with their metaclass links, then names, superclasses and
/// globals are patched in. Only then are the core library sources compiled
/// into the preallocated classes.
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use log::{debug, trace};

use crate::class::Class;
use crate::compiler;
use crate::error::{Exec, VmError};
use crate::frame::Frame;
use crate::interning::{Interned, InternedStrings};
use crate::invokable::InvokableKind;
use crate::loader::{ClassPathLoader, ClassSource, CoreLibLoader, SourceLoader};
use crate::object::{Instance, Value};
use crate::primitives;

/// A global variable. Cached global reads hold on to the binding, never to
/// the value, so reassignments stay visible.
pub struct Binding {
    name: Interned,
    value: RefCell<Value>,
}

impl Binding {
    fn new(name: Interned, value: Value) -> Self {
        Self {
            name,
            value: RefCell::new(value),
        }
    }

    pub fn name(&self) -> Interned {
        self.name
    }

    pub fn value(&self) -> Value {
        self.value.borrow().clone()
    }

    pub fn set_value(&self, value: Value) {
        *self.value.borrow_mut() = value;
    }
}

/// The classes the runtime itself needs to know about.
pub struct CoreClasses {
    pub metaclass: Rc<Class>,
    pub object: Rc<Class>,
    pub class: Rc<Class>,
    pub nil: Rc<Class>,
    pub array: Rc<Class>,
    pub method: Rc<Class>,
    pub symbol: Rc<Class>,
    pub integer: Rc<Class>,
    pub primitive: Rc<Class>,
    pub string: Rc<Class>,
    pub double: Rc<Class>,
    pub boolean: Rc<Class>,
    pub true_: Rc<Class>,
    pub false_: Rc<Class>,
}

impl CoreClasses {
    /// First bootstrap phase: allocate, link metaclasses, nothing else.
    fn allocate(symbols: &InternedStrings) -> Self {
        let unnamed = symbols.add("");
        let new_class = || Class::new(unnamed, symbols.get(unnamed));

        let metaclass = new_class();
        let metaclass_class = new_class();
        metaclass_class.set_class(metaclass.clone());
        metaclass.set_class(metaclass_class);

        let new_system_class = || {
            let class = new_class();
            let meta = new_class();
            meta.set_class(metaclass.clone());
            class.set_class(meta);
            class
        };

        Self {
            object: new_system_class(),
            class: new_system_class(),
            nil: new_system_class(),
            array: new_system_class(),
            method: new_system_class(),
            symbol: new_system_class(),
            integer: new_system_class(),
            primitive: new_system_class(),
            string: new_system_class(),
            double: new_system_class(),
            boolean: new_system_class(),
            true_: new_system_class(),
            false_: new_system_class(),
            metaclass,
        }
    }
}

pub struct UniverseCreateInfo {
    /// Directories searched for `<Class>.som`, before the embedded core
    /// library.
    pub class_path: Vec<PathBuf>,
    /// Print every loaded method as a Graphviz graph.
    pub dump_ast: bool,
}

impl Default for UniverseCreateInfo {
    fn default() -> Self {
        Self {
            class_path: vec![PathBuf::from(".")],
            dump_ast: false,
        }
    }
}

pub struct Universe {
    symbols: InternedStrings,
    globals: RefCell<HashMap<Interned, Rc<Binding>>>,
    core: CoreClasses,
    /// Indexed by block arity including the block itself; slot 0 is the
    /// generic `Block`.
    block_classes: RefCell<Vec<Rc<Class>>>,
    system_class: RefCell<Option<Rc<Class>>>,
    system_object: RefCell<Value>,
    loaders: Vec<Box<dyn SourceLoader>>,
    output: RefCell<Box<dyn Write>>,
    dump_ast: bool,
    start: Instant,
    random: Cell<u64>,
}

impl Universe {
    pub fn new(info: UniverseCreateInfo) -> Result<Self, VmError> {
        let mut loaders: Vec<Box<dyn SourceLoader>> = info
            .class_path
            .into_iter()
            .map(|dir| Box::new(ClassPathLoader::new(dir)) as Box<dyn SourceLoader>)
            .collect();
        loaders.push(Box::new(CoreLibLoader));
        Self::with_loaders(loaders, info.dump_ast, Box::new(io::stdout()))
    }

    /// Bootstrap with explicit loaders and output sink. The loaders must
    /// between them supply the core library.
    pub fn with_loaders(
        loaders: Vec<Box<dyn SourceLoader>>,
        dump_ast: bool,
        output: Box<dyn Write>,
    ) -> Result<Self, VmError> {
        let symbols = InternedStrings::new();
        let core = CoreClasses::allocate(&symbols);
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x2545_f491_4f6c_dd1d);

        let u = Self {
            symbols,
            globals: RefCell::new(HashMap::new()),
            core,
            block_classes: RefCell::new(Vec::new()),
            system_class: RefCell::new(None),
            system_object: RefCell::new(Value::Nil),
            loaders,
            output: RefCell::new(output),
            dump_ast,
            start: Instant::now(),
            random: Cell::new(seed | 1),
        };
        u.initialize_object_system()?;
        Ok(u)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Bootstrap
    // ═══════════════════════════════════════════════════════════════════

    fn initialize_object_system(&self) -> Result<(), VmError> {
        let c = &self.core;
        let system_classes = [
            (&c.object, None, "Object"),
            (&c.class, Some(&c.object), "Class"),
            (&c.metaclass, Some(&c.class), "Metaclass"),
            (&c.nil, Some(&c.object), "Nil"),
            (&c.array, Some(&c.object), "Array"),
            (&c.method, Some(&c.object), "Method"),
            (&c.symbol, Some(&c.string), "Symbol"),
            (&c.integer, Some(&c.object), "Integer"),
            (&c.primitive, Some(&c.object), "Primitive"),
            (&c.string, Some(&c.object), "String"),
            (&c.double, Some(&c.object), "Double"),
            (&c.boolean, Some(&c.object), "Boolean"),
            (&c.true_, Some(&c.boolean), "True"),
            (&c.false_, Some(&c.boolean), "False"),
        ];

        for (class, superclass, name) in &system_classes {
            self.initialize_system_class(class, *superclass, name);
        }
        for (class, _, _) in &system_classes {
            self.load_system_class(class)?;
        }

        let block = self.load_class(self.symbol("Block"))?;
        self.block_classes.borrow_mut().push(block);

        let system = self.load_class(self.symbol("System"))?;
        *self.system_object.borrow_mut() = self.new_instance(&system);
        *self.system_class.borrow_mut() = Some(system);

        self.set_global(self.symbol("nil"), Value::Nil);
        self.set_global(self.symbol("true"), Value::Boolean(true));
        self.set_global(self.symbol("false"), Value::Boolean(false));
        self.set_global(self.symbol("system"), self.system_object());

        for arity in 1..=3 {
            self.load_block_class(arity)?;
        }
        debug!("object system initialized");
        Ok(())
    }

    /// Second bootstrap phase for one class: names, superclass links and
    /// the global. A class without superclass still gets a metaclass that
    /// inherits from `Class`.
    fn initialize_system_class(
        &self,
        system_class: &Rc<Class>,
        superclass: Option<&Rc<Class>>,
        name: &str,
    ) {
        let meta = system_class.class();
        match superclass {
            Some(superclass) => {
                system_class.set_superclass(Some(superclass.clone()));
                if let Some(meta) = &meta {
                    meta.set_superclass(superclass.class());
                }
            }
            None => {
                if let Some(meta) = &meta {
                    meta.set_superclass(Some(self.core.class.clone()));
                }
            }
        }

        let id = self.symbol(name);
        system_class.set_name(id, self.symbol_text(id));
        if let Some(meta) = &meta {
            let meta_id = self.symbol(&format!("{} class", name));
            meta.set_name(meta_id, self.symbol_text(meta_id));
        }
        self.set_global(id, Value::Class(system_class.clone()));
    }

    fn load_system_class(&self, system_class: &Rc<Class>) -> Result<(), VmError> {
        let name = system_class.name_string();
        let source = self
            .find_source(&name)?
            .ok_or_else(|| VmError::ClassNotFound(name.to_string()))?;
        let class = compiler::compile_class_file(self, &source, &name, Some(system_class))?;
        primitives::install(self, &class, true);
        self.dump(&class)?;
        Ok(())
    }

    fn load_block_class(&self, arity: usize) -> Result<(), VmError> {
        let name = self.symbol(&format!("Block{}", arity));
        debug_assert!(!self.has_global(name), "block class loaded twice");
        let class = self.load_class(name)?;
        self.block_classes.borrow_mut().push(class);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Class loading
    // ═══════════════════════════════════════════════════════════════════

    fn find_source(&self, name: &str) -> Result<Option<ClassSource>, VmError> {
        for loader in &self.loaders {
            if let Some(source) = loader.load(name)? {
                return Ok(Some(source));
            }
        }
        Ok(None)
    }

    /// The class registered under `name`, loading it on first use.
    pub fn load_class(&self, name: Interned) -> Result<Rc<Class>, VmError> {
        if let Some(Value::Class(class)) = self.get_global(name) {
            return Ok(class);
        }

        let text = self.symbol_text(name);
        let source = self
            .find_source(&text)?
            .ok_or_else(|| VmError::ClassNotFound(text.to_string()))?;
        let class = compiler::compile_class_file(self, &source, &text, None)?;
        self.dump(&class)?;

        if class.has_primitives() {
            primitives::install(self, &class, false);
        }
        self.set_global(name, Value::Class(class.clone()));
        debug!("loaded class {}", text);
        Ok(class)
    }

    /// Compile `source` and register the class as a global, replacing any
    /// earlier class of the same name.
    pub fn load_class_from_string(&self, source: &str) -> Result<Rc<Class>, VmError> {
        let class = compiler::compile_class_string(self, source, None)?;
        self.dump(&class)?;
        if class.has_primitives() {
            primitives::install(self, &class, false);
        }
        self.set_global(class.name(), Value::Class(class.clone()));
        Ok(class)
    }

    fn dump(&self, class: &Rc<Class>) -> Result<(), VmError> {
        if !self.dump_ast {
            return Ok(());
        }
        let sides = class.class().into_iter().chain(std::iter::once(class.clone()));
        for side in sides {
            for invokable in side.invokables() {
                if let InvokableKind::Method { source, ast, .. } = invokable.kind() {
                    let dot = ast.to_dot(&source.qualifier, &self.symbols);
                    self.output.borrow_mut().write_all(dot.as_bytes())?;
                }
            }
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Symbols and globals
    // ═══════════════════════════════════════════════════════════════════

    pub fn symbols(&self) -> &InternedStrings {
        &self.symbols
    }

    pub fn symbol(&self, text: &str) -> Interned {
        self.symbols.add(text)
    }

    pub fn symbol_text(&self, symbol: Interned) -> Arc<str> {
        self.symbols.get(symbol)
    }

    pub fn global_binding(&self, name: Interned) -> Option<Rc<Binding>> {
        self.globals.borrow().get(&name).cloned()
    }

    pub fn get_global(&self, name: Interned) -> Option<Value> {
        self.global_binding(name).map(|b| b.value())
    }

    pub fn has_global(&self, name: Interned) -> bool {
        self.globals.borrow().contains_key(&name)
    }

    /// Define or reassign a global. Reassigning keeps the binding, so
    /// specialized reads observe the new value.
    pub fn set_global(&self, name: Interned, value: Value) {
        let existing = self.global_binding(name);
        match existing {
            Some(binding) => binding.set_value(value),
            None => {
                trace!("defining global {}", self.symbol_text(name));
                self.globals
                    .borrow_mut()
                    .insert(name, Rc::new(Binding::new(name, value)));
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Objects
    // ═══════════════════════════════════════════════════════════════════

    pub fn core(&self) -> &CoreClasses {
        &self.core
    }

    pub fn system_class(&self) -> Option<Rc<Class>> {
        self.system_class.borrow().clone()
    }

    pub fn system_object(&self) -> Value {
        self.system_object.borrow().clone()
    }

    pub fn block_class(&self, number_of_arguments: usize) -> Option<Rc<Class>> {
        self.block_classes.borrow().get(number_of_arguments).cloned()
    }

    pub fn new_instance(&self, class: &Rc<Class>) -> Value {
        Value::Object(Rc::new(Instance::new(class.clone())))
    }

    pub fn class_of(&self, value: &Value) -> Rc<Class> {
        let c = &self.core;
        match value {
            Value::Nil => c.nil.clone(),
            Value::Boolean(true) => c.true_.clone(),
            Value::Boolean(false) => c.false_.clone(),
            Value::Integer(_) | Value::BigInteger(_) => c.integer.clone(),
            Value::Double(_) => c.double.clone(),
            Value::String(_) => c.string.clone(),
            Value::Symbol(_) => c.symbol.clone(),
            Value::Array(_) => c.array.clone(),
            Value::Object(o) => o.class(),
            Value::Class(class) => class.class().unwrap_or_else(|| c.metaclass.clone()),
            Value::Block(b) => self
                .block_class(b.number_of_arguments())
                .or_else(|| self.block_class(0))
                .unwrap_or_else(|| c.object.clone()),
            Value::Invokable(i) if i.is_primitive() => c.primitive.clone(),
            Value::Invokable(_) => c.method.clone(),
        }
    }

    /// Host-side rendering of a value for diagnostics. SOM code prints
    /// through `printString` instead.
    pub fn print_string(&self, value: &Value) -> String {
        match value {
            Value::Nil => "nil".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::BigInteger(i) => i.to_string(),
            Value::Double(d) => format!("{:?}", d),
            Value::String(s) => s.to_string(),
            Value::Symbol(s) => format!("#{}", self.symbol_text(*s)),
            Value::Array(a) => {
                let items: Vec<_> = a.borrow().iter().map(|v| self.print_string(v)).collect();
                format!("({})", items.join(" "))
            }
            Value::Object(o) => format!("instance of {}", o.class().name_string()),
            Value::Class(c) => c.name_string().to_string(),
            Value::Block(_) => "instance of Block".to_string(),
            Value::Invokable(i) => match i.holder() {
                Some(holder) => format!("{}>>#{}", holder.name_string(), i.signature_string()),
                None => format!("#{}", i.signature_string()),
            },
        }
    }

    /// Next value of a xorshift generator seeded at startup.
    pub fn next_random(&self) -> u64 {
        let mut x = self.random.get();
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.random.set(x);
        x
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }

    // ═══════════════════════════════════════════════════════════════════
    // Output
    // ═══════════════════════════════════════════════════════════════════

    pub fn print(&self, text: &str) -> Result<(), VmError> {
        let mut out = self.output.borrow_mut();
        out.write_all(text.as_bytes())?;
        out.flush()?;
        Ok(())
    }

    pub fn println(&self, text: &str) -> Result<(), VmError> {
        self.print(text)?;
        self.print("\n")
    }

    // ═══════════════════════════════════════════════════════════════════
    // Sending
    // ═══════════════════════════════════════════════════════════════════

    /// A full message send: lookup on the receiver's class, falling back to
    /// `doesNotUnderstand:arguments:`. `args[0]` is the receiver.
    pub fn dispatch(
        &self,
        selector: Interned,
        args: Vec<Value>,
        caller: Option<&Rc<Frame>>,
    ) -> Exec<Value> {
        let Some(receiver) = args.first() else {
            return Err(VmError::MissingSendTarget(self.symbol_text(selector).to_string()).into());
        };
        match self.class_of(receiver).lookup_invokable(selector) {
            Some(method) => method.invoke(self, caller, args),
            None => self.send_does_not_understand(selector, args),
        }
    }

    /// Send one of the runtime's own protocol messages. These have no
    /// further fallback; a class that does not implement them is fatal.
    pub fn send(&self, selector: &str, args: Vec<Value>) -> Exec<Value> {
        let id = self.symbol(selector);
        let receiver = args.first().cloned().unwrap_or_default();
        let class = self.class_of(&receiver);
        match class.lookup_invokable(id) {
            Some(method) => method.invoke(self, None, args),
            None => Err(VmError::ProtocolNotUnderstood {
                selector: selector.to_string(),
                class: class.name_string().to_string(),
            }
            .into()),
        }
    }

    /// `args` holds the receiver followed by the original arguments; the
    /// handler gets the arguments without the receiver.
    pub fn send_does_not_understand(&self, selector: Interned, mut args: Vec<Value>) -> Exec<Value> {
        trace!("#{} not understood", self.symbol_text(selector));
        let receiver = if args.is_empty() {
            Value::Nil
        } else {
            args.remove(0)
        };
        self.send(
            "doesNotUnderstand:arguments:",
            vec![receiver, Value::Symbol(selector), Value::array(args)],
        )
    }

    pub fn send_unknown_global(&self, receiver: Value, name: Interned) -> Exec<Value> {
        self.send("unknownGlobal:", vec![receiver, Value::Symbol(name)])
    }

    pub fn send_escaped_block(&self, receiver: Value, block: Value) -> Exec<Value> {
        self.send("escapedBlock:", vec![receiver, block])
    }

    // ═══════════════════════════════════════════════════════════════════
    // Entry points
    // ═══════════════════════════════════════════════════════════════════

    /// Run the program: `system initialize: arguments`.
    pub fn execute(&self, arguments: &[String]) -> Exec<Value> {
        let args = Value::array(arguments.iter().map(|a| Value::string(a)).collect());
        self.send("initialize:", vec![self.system_object(), args])
    }

    /// Invoke the class-side method `selector` of `class_name`.
    pub fn interpret_method_in_class(&self, class_name: &str, selector: &str) -> Exec<Value> {
        let class = self.load_class(self.symbol(class_name))?;
        let class_value = Value::Class(class);
        self.send(selector, vec![class_value])
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::loader::InMemoryLoader;
    use pretty_assertions::assert_eq;

    pub(crate) fn test_universe() -> Universe {
        Universe::with_loaders(vec![Box::new(CoreLibLoader)], false, Box::new(io::sink()))
            .expect("bootstrap failed")
    }

    /// Load `class_source` and send `selector` to a fresh instance.
    pub(crate) fn run(u: &Universe, class_source: &str, selector: &str) -> Value {
        let class = u
            .load_class_from_string(class_source)
            .expect("class did not compile");
        let receiver = u.new_instance(&class);
        u.dispatch(u.symbol(selector), vec![receiver], None)
            .expect("evaluation failed")
    }

    #[derive(Clone, Default)]
    pub(crate) struct Capture(Rc<RefCell<Vec<u8>>>);

    impl Capture {
        pub(crate) fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.borrow()).into_owned()
        }
    }

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    pub(crate) fn capturing_universe(loaders: Vec<Box<dyn SourceLoader>>) -> (Universe, Capture) {
        let capture = Capture::default();
        let mut loaders = loaders;
        loaders.push(Box::new(CoreLibLoader));
        let u = Universe::with_loaders(loaders, false, Box::new(capture.clone()))
            .expect("bootstrap failed");
        (u, capture)
    }

    #[test]
    fn metaclass_hierarchy_is_circular() {
        let u = test_universe();
        let c = u.core();
        let meta_meta = c.metaclass.class().expect("Metaclass class");
        assert_eq!(&*meta_meta.name_string(), "Metaclass class");
        assert!(Rc::ptr_eq(&meta_meta.class().expect("class"), &c.metaclass));

        let object_meta = c.object.class().expect("Object class");
        assert!(Rc::ptr_eq(&object_meta.superclass().expect("super"), &c.class));
        assert!(c.object.superclass().is_none());
        assert!(Rc::ptr_eq(&c.true_.superclass().expect("super"), &c.boolean));
    }

    #[test]
    fn globals_after_bootstrap() {
        let u = test_universe();
        for name in ["Object", "Block", "Block1", "Block3", "System", "nil", "true", "system"] {
            assert!(u.has_global(u.symbol(name)), "{} missing", name);
        }
        assert!(matches!(u.get_global(u.symbol("true")), Some(Value::Boolean(true))));
    }

    #[test]
    fn block_classes_follow_arity() {
        let u = test_universe();
        let result = run(&u, "Foo = ( run = ( ^ [:a :b | a ] class name ) )", "run");
        assert_eq!(u.print_string(&result), "#Block3");
    }

    #[test]
    fn load_class_is_idempotent() {
        let loader = InMemoryLoader::new().with("Thing", "Thing = ( )");
        let (u, _) = capturing_universe(vec![Box::new(loader)]);
        let a = u.load_class(u.symbol("Thing")).expect("Thing");
        let b = u.load_class(u.symbol("Thing")).expect("Thing");
        assert!(Rc::ptr_eq(&a, &b));
        assert!(matches!(
            u.load_class(u.symbol("Missing")),
            Err(VmError::ClassNotFound(_))
        ));
    }

    #[test]
    fn superclasses_load_on_demand() {
        let loader = InMemoryLoader::new()
            .with("Base", "Base = ( | x | x = ( ^ x ) x: v = ( x := v ) )")
            .with("Derived", "Derived = Base ( | y | both = ( ^ x + y ) y: v = ( y := v ) )");
        let (u, _) = capturing_universe(vec![Box::new(loader)]);
        let derived = u.load_class(u.symbol("Derived")).expect("Derived");
        assert_eq!(derived.number_of_instance_fields(), 2);
        assert!(u.has_global(u.symbol("Base")));
    }

    #[test]
    fn global_reads_follow_the_binding() {
        let u = test_universe();
        let class = u
            .load_class_from_string(
                "Reader = (
                    read = ( ^ Late )
                    unknownGlobal: name = ( ^ #undefined )
                )",
            )
            .expect("compile");
        let reader = u.new_instance(&class);
        let read = || u.dispatch(u.symbol("read"), vec![reader.clone()], None).expect("read");

        assert_eq!(u.print_string(&read()), "#undefined");
        assert_eq!(u.print_string(&read()), "#undefined");

        u.set_global(u.symbol("Late"), Value::Integer(1));
        assert_eq!(read().as_integer(), Some(1));
        u.set_global(u.symbol("Late"), Value::Integer(2));
        assert_eq!(read().as_integer(), Some(2));
    }

    #[test]
    fn super_send_is_bound_to_the_lexical_holder() {
        let u = test_universe();
        u.load_class_from_string("SC = ( m = ( ^ 'C' ) )").expect("C");
        u.load_class_from_string("SB = SC ( m = ( ^ 'B' ) viaSuper = ( ^ super m ) )")
            .expect("B");
        u.load_class_from_string("SA = SB ( m = ( ^ 'A' ) )").expect("A");
        let sub = u.load_class_from_string("SSub = SA ( )").expect("Sub");
        let other = u
            .load_class_from_string("SOther = SB ( m = ( ^ 'Other' ) )")
            .expect("Other");

        let object = u.new_instance(&sub);
        let send = |o: &Value| {
            u.dispatch(u.symbol("viaSuper"), vec![o.clone()], None)
                .expect("viaSuper")
        };
        assert_eq!(u.print_string(&send(&object)), "C");

        if let Value::Object(instance) = &object {
            instance.set_class(other);
        }
        assert_eq!(u.print_string(&send(&object)), "C");
    }

    #[test]
    fn super_send_without_target_is_fatal() {
        let u = test_universe();
        u.load_class_from_string("Lonely = ( m = ( ^ super nothingHere ) )")
            .expect("compile");
        let class = u.load_class(u.symbol("Lonely")).expect("Lonely");
        let err = u
            .dispatch(u.symbol("m"), vec![u.new_instance(&class)], None)
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::Unwind::Error(VmError::SuperSendNotUnderstood { .. })
        ));
    }

    #[test]
    fn class_side_methods_and_fields() {
        let u = test_universe();
        u.load_class_from_string(
            "Counter = ( ---- | count | next = ( count isNil ifTrue: [ count := 0 ]. count := count + 1. ^ count ) )",
        )
        .expect("compile");
        u.interpret_method_in_class("Counter", "next").expect("next");
        let second = u.interpret_method_in_class("Counter", "next").expect("next");
        assert_eq!(second.as_integer(), Some(2));
    }

    #[test]
    fn program_entry_runs_the_named_class() {
        let loader = InMemoryLoader::new().with(
            "Hello",
            "Hello = ( run = ( 'Hello, ' print. 'world' println ) )",
        );
        let (u, out) = capturing_universe(vec![Box::new(loader)]);
        u.execute(&["Hello".to_string()]).expect("run");
        assert_eq!(out.text(), "Hello, world\n");
    }

    #[test]
    fn exit_unwinds_to_the_caller() {
        let u = test_universe();
        u.load_class_from_string("Quitter = ( run = ( system exit: 3. ^ 1 ) )")
            .expect("compile");
        let class = u.load_class(u.symbol("Quitter")).expect("Quitter");
        let err = u
            .dispatch(u.symbol("run"), vec![u.new_instance(&class)], None)
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, crate::error::Unwind::Exit(3)));
    }
}
