//! RON program loader

use crate::error::{Error, Result};
use crate::schema::{Declaration, ProgramFile};
use indexmap::IndexMap;
use reflex_core::{EngineContext, EntityValue, Reference, RuleExpression, Value};
use reflex_hub::{Engine, EngineConfig};
use std::fs;
use std::path::Path;
use tracing::debug;

/// A loaded program: everything needed to build an engine
#[derive(Debug, Clone, Default)]
pub struct Program {
    /// Declarations by reference
    pub declarations: IndexMap<Reference, Declaration>,
    /// Rules in load order
    pub rules: Vec<RuleExpression>,
    /// Initial context entries from `context` blocks
    pub context: IndexMap<Reference, Vec<Value>>,
    /// The last configuration seen, if any
    pub config: Option<EngineConfig>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a declaration
    pub fn get_declaration(&self, reference: &Reference) -> Option<&Declaration> {
        self.declarations.get(reference)
    }

    /// The initial context: declaration values, then `context` entries
    pub fn initial_context(&self) -> Result<EngineContext> {
        let declared = self
            .declarations
            .values()
            .filter_map(|d| d.initial().map(|v| (d.reference.clone(), v)));
        let listed = self
            .context
            .iter()
            .map(|(r, values)| (r.clone(), EntityValue::from_values(values.iter().cloned())));

        let mut context = EngineContext::from_map(declared.chain(listed))?;
        for declaration in self.declarations.values().filter(|d| d.symbolic) {
            context.declare_symbolic(declaration.reference.clone());
        }
        Ok(context)
    }

    /// Build an engine with this program's rules, declarations and context
    pub fn into_engine(self) -> Result<Engine> {
        let context = self.initial_context()?;
        let mut engine = Engine::from_config(self.config.unwrap_or_default()).with_context(context);
        for reference in self.declarations.keys() {
            engine.declare(reference);
        }
        engine.add(self.rules)?;
        Ok(engine)
    }
}

/// Loader for RON programs
pub struct Loader {
    program: Program,
}

impl Loader {
    /// Create a new loader
    pub fn new() -> Self {
        Self {
            program: Program::new(),
        }
    }

    /// Load a program from a RON string
    pub fn load_str(&mut self, content: &str) -> Result<()> {
        let file: ProgramFile = ron::from_str(content)?;

        // validate before touching the program so a bad file loads nothing
        let mut seen = Vec::new();
        for declaration in &file.declarations {
            let reference = &declaration.reference;
            if self.program.declarations.contains_key(reference) || seen.contains(&reference) {
                return Err(Error::DuplicateDeclaration(reference.to_string()));
            }
            seen.push(reference);
        }
        for rule in &file.rules {
            rule.validate()?;
        }

        debug!(
            declarations = file.declarations.len(),
            rules = file.rules.len(),
            context = file.context.len(),
            "loaded program"
        );

        for declaration in file.declarations {
            self.program
                .declarations
                .insert(declaration.reference.clone(), declaration);
        }
        self.program.rules.extend(file.rules);
        for (reference, values) in file.context {
            self.program.context.entry(reference).or_default().extend(values);
        }
        if file.config.is_some() {
            self.program.config = file.config;
        }
        Ok(())
    }

    /// Load a single RON file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let content = fs::read_to_string(path.as_ref())?;
        self.load_str(&content)
    }

    /// Load all RON files from a directory, recursively, in name order
    pub fn load_directory(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if !path.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Not a directory: {:?}", path),
            )));
        }

        let mut entries = fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort();

        for file_path in entries {
            if file_path.extension().map(|e| e == "ron").unwrap_or(false) {
                self.load_file(&file_path)?;
            } else if file_path.is_dir() {
                self.load_directory(&file_path)?;
            }
        }

        Ok(())
    }

    /// Finish loading and return the program
    pub fn finish(self) -> Program {
        self.program
    }

    /// Get the current program (for inspection during loading)
    pub fn program(&self) -> &Program {
        &self.program
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}
