/// Where class sources come from.
///
/// A [`SourceLoader`] maps a class name to SOM source text. The universe
/// asks its loaders in order and compiles the first hit, so class path
/// directories listed before the embedded core library can override core
/// classes.
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use log::debug;

/// Source text of one class plus the name diagnostics refer to it by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSource {
    pub text: String,
    pub file_name: String,
}

pub trait SourceLoader {
    /// `Ok(None)` when this loader does not know the class.
    fn load(&self, class_name: &str) -> io::Result<Option<ClassSource>>;
}

macro_rules! core_lib {
    ($($name:literal),* $(,)?) => {
        &[$(($name, include_str!(concat!("../core-lib/", $name, ".som")))),*]
    };
}

const CORE_LIB: &[(&str, &str)] = core_lib![
    "Object",
    "Class",
    "Metaclass",
    "Nil",
    "Array",
    "Method",
    "Primitive",
    "Symbol",
    "String",
    "Integer",
    "Double",
    "Boolean",
    "True",
    "False",
    "Block",
    "Block1",
    "Block2",
    "Block3",
    "System",
];

/// The core library compiled into the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct CoreLibLoader;

impl SourceLoader for CoreLibLoader {
    fn load(&self, class_name: &str) -> io::Result<Option<ClassSource>> {
        Ok(CORE_LIB
            .iter()
            .find(|(name, _)| *name == class_name)
            .map(|(name, text)| ClassSource {
                text: text.to_string(),
                file_name: format!("core-lib/{}.som", name),
            }))
    }
}

/// `<dir>/<ClassName>.som` on disk.
#[derive(Debug, Clone)]
pub struct ClassPathLoader {
    dir: PathBuf,
}

impl ClassPathLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SourceLoader for ClassPathLoader {
    fn load(&self, class_name: &str) -> io::Result<Option<ClassSource>> {
        let path = self.dir.join(format!("{}.som", class_name));
        if !path.is_file() {
            return Ok(None);
        }
        debug!("loading {} from {}", class_name, path.display());
        let text = fs::read_to_string(&path)?;
        Ok(Some(ClassSource {
            text,
            file_name: path.display().to_string(),
        }))
    }
}

/// Sources held in memory, for embedding and tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLoader {
    sources: HashMap<String, String>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, class_name: &str, text: &str) -> Self {
        self.sources.insert(class_name.to_string(), text.to_string());
        self
    }
}

impl SourceLoader for InMemoryLoader {
    fn load(&self, class_name: &str) -> io::Result<Option<ClassSource>> {
        Ok(self.sources.get(class_name).map(|text| ClassSource {
            text: text.clone(),
            file_name: format!("{}.som", class_name),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_lib_has_every_bootstrap_class() {
        for name in ["Object", "Metaclass", "Block3", "System"] {
            let source = CoreLibLoader.load(name).unwrap().expect(name);
            assert!(source.text.trim_start().starts_with(name));
        }
        assert!(CoreLibLoader.load("Nope").unwrap().is_none());
    }

    #[test]
    fn missing_class_path_file_is_not_an_error() {
        let loader = ClassPathLoader::new("/definitely/not/here");
        assert!(loader.load("Foo").unwrap().is_none());
    }

    #[test]
    fn in_memory_sources() {
        let loader = InMemoryLoader::new().with("Foo", "Foo = ()");
        let source = loader.load("Foo").unwrap().expect("Foo");
        assert_eq!(source.text, "Foo = ()");
        assert_eq!(source.file_name, "Foo.som");
    }
}
