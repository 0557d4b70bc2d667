//! Hierarchical context tree of entity values
//!
//! Every node stores its *own* value; its *entity* (effective value) is the
//! union of its own value and all descendants' entities. A node is void when
//! its entity is not truthy.
//!
//! Nodes are shared through `Arc` and copied on write, so cloning an
//! [`EngineContext`] is a cheap snapshot that later mutations never disturb.

use crate::reference::Degree;
use crate::{Change, ChangeSet, Delta, EntityValue, Error, Reference, Result};
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// One node of the context tree
#[derive(Debug, Clone, Default)]
pub struct ContextNode {
    reference: Reference,
    value: EntityValue,
    entity: EntityValue,
    children: IndexMap<String, Arc<ContextNode>>,
}

impl ContextNode {
    fn new(reference: Reference) -> Self {
        Self {
            reference,
            ..Self::default()
        }
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    /// The value stored at this node itself
    pub fn own(&self) -> &EntityValue {
        &self.value
    }

    /// Own value plus every descendant's entity
    pub fn entity(&self) -> &EntityValue {
        &self.entity
    }

    pub fn is_void(&self) -> bool {
        !self.entity.is_truthy()
    }

    pub fn children(&self) -> impl Iterator<Item = &ContextNode> {
        self.children.values().map(Arc::as_ref)
    }

    pub fn child(&self, name: &str) -> Option<&ContextNode> {
        self.children.get(name).map(Arc::as_ref)
    }

    fn children_union(&self) -> EntityValue {
        self.children
            .values()
            .fold(EntityValue::empty(), |acc, child| acc.union(&child.entity))
    }

    fn refresh(&mut self) {
        self.entity = self
            .children
            .values()
            .fold(self.value.clone(), |acc, child| acc.union(&child.entity));
    }

    fn emit(&self, before: &EntityValue, was_void: bool, delta: &mut Delta) {
        if self.reference.is_root() {
            return;
        }
        if self.entity != *before {
            delta.insert(self.reference.clone(), self.entity.clone());
        }
        let void = self.is_void();
        if void != was_void {
            let flag = if void {
                EntityValue::truthy()
            } else {
                EntityValue::empty()
            };
            delta.insert(self.reference.void(), flag);
        }
    }

    /// Empty this node and its whole subtree
    fn clear_subtree(&mut self, delta: &mut Delta) {
        let (before, was_void) = (self.entity.clone(), self.is_void());
        for child in self.children.values_mut() {
            Arc::make_mut(child).clear_subtree(delta);
        }
        self.value = EntityValue::empty();
        self.refresh();
        self.emit(&before, was_void, delta);
    }

    fn flatten_into(&self, out: &mut IndexMap<Reference, EntityValue>) {
        if !self.reference.is_root() {
            out.insert(self.reference.clone(), self.entity.clone());
            if self.is_void() {
                out.insert(self.reference.void(), EntityValue::truthy());
            }
        }
        for child in self.children.values() {
            child.flatten_into(out);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Write {
    /// Replace the own value
    Change,
    /// Merge into the own value
    Add,
}

fn walk(node: &mut ContextNode, target: &Reference, value: &EntityValue, write: Write, delta: &mut Delta) -> Result<()> {
    match node.reference.degree(target) {
        Degree::Same => {
            if target.is_void() {
                if value.is_truthy() {
                    node.clear_subtree(delta);
                }
                return Ok(());
            }
            let (before, was_void) = (node.entity.clone(), node.is_void());
            let fresh = value.difference(&node.children_union());
            node.value = match write {
                Write::Change => fresh,
                Write::Add => node.value.union(&fresh),
            };
            node.reference.merge_types(target);
            node.refresh();
            node.emit(&before, was_void, delta);
            Ok(())
        }
        Degree::Ancestor(_) => {
            let name = target
                .segments()
                .get(node.reference.depth())
                .cloned()
                .ok_or_else(|| Error::InvariantViolation(format!("{} has no segment below {}", target, node.reference)))?;
            let (before, was_void) = (node.entity.clone(), node.is_void());
            if !node.children.contains_key(&name) {
                let materialize = match write {
                    Write::Add => !target.is_void(),
                    Write::Change => !target.is_void() && !value.is_empty(),
                };
                if !materialize {
                    return Ok(());
                }
                let child = ContextNode::new(node.reference.child(name.clone()));
                node.children.insert(name.clone(), Arc::new(child));
            }
            if let Some(child) = node.children.get_mut(&name) {
                walk(Arc::make_mut(child), target, value, write, delta)?;
            }
            node.value = node.value.difference(&node.children_union());
            node.refresh();
            node.emit(&before, was_void, delta);
            Ok(())
        }
        Degree::Descendant(_) => Err(Error::InvariantViolation(format!(
            "walked past {} to {}",
            target, node.reference
        ))),
        Degree::Unrelated => Ok(()),
    }
}

/// The engine's view of all entities, plus the set of symbolic references
#[derive(Debug, Clone, Default)]
pub struct EngineContext {
    root: Arc<ContextNode>,
    symbols: BTreeSet<Reference>,
}

impl EngineContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from `(reference, value)` pairs; void entries are skipped
    pub fn from_map<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Reference, EntityValue)>,
    {
        let mut context = Self::new();
        for (reference, value) in entries {
            if reference.is_void() {
                continue;
            }
            context.add(&reference, value)?;
        }
        Ok(context)
    }

    pub fn root(&self) -> &ContextNode {
        &self.root
    }

    pub fn node(&self, reference: &Reference) -> Option<&ContextNode> {
        let mut node = self.root.as_ref();
        for segment in reference.segments() {
            node = node.children.get(segment)?.as_ref();
        }
        Some(node)
    }

    /// Merge `value` into the node at `reference`, creating missing nodes
    pub fn add(&mut self, reference: &Reference, value: EntityValue) -> Result<Delta> {
        let mut delta = Delta::new();
        walk(Arc::make_mut(&mut self.root), reference, &value, Write::Add, &mut delta)?;
        Ok(delta)
    }

    /// Set the node at `reference` so its entity becomes `value`.
    ///
    /// A void reference with a truthy value clears the whole subtree.
    pub fn change(&mut self, reference: &Reference, value: EntityValue) -> Result<Delta> {
        let mut delta = Delta::new();
        walk(Arc::make_mut(&mut self.root), reference, &value, Write::Change, &mut delta)?;
        Ok(delta)
    }

    /// Change each reference to the empty value
    pub fn clear<'a, I>(&mut self, references: I) -> Result<Delta>
    where
        I: IntoIterator<Item = &'a Reference>,
    {
        let mut delta = Delta::new();
        for reference in references {
            delta.extend(self.change(reference, EntityValue::empty())?);
        }
        Ok(delta)
    }

    /// Apply every entry of a delta.
    ///
    /// Void flags are applied only when set; cleared flags follow from the
    /// other entries.
    pub fn update(&mut self, delta: &Delta) -> Result<Delta> {
        let mut out = Delta::new();
        for (reference, value) in delta {
            if reference.is_void() && !value.is_truthy() {
                continue;
            }
            out.extend(self.change(reference, value.clone())?);
        }
        Ok(out)
    }

    /// Current entity for a reference.
    ///
    /// For a void reference, `{true}` when the subtree is void and the empty
    /// value otherwise. `None` when no node exists for a non-void reference.
    pub fn get(&self, reference: &Reference) -> Option<EntityValue> {
        if reference.is_void() {
            return Some(if self.is_void(reference) {
                EntityValue::truthy()
            } else {
                EntityValue::empty()
            });
        }
        self.node(reference).map(|node| node.entity.clone())
    }

    /// Whether nothing is active under `reference`
    pub fn is_void(&self, reference: &Reference) -> bool {
        self.node(reference).map_or(true, ContextNode::is_void)
    }

    /// Value of a reference as seen by expression evaluation.
    ///
    /// Symbolic references without a concrete value become placeholders;
    /// stored symbolic members are substituted one level deep.
    pub fn resolve(&self, reference: &Reference) -> Result<EntityValue> {
        let value = self.get(reference).unwrap_or_default();
        if self.is_symbolic(reference) && !value.is_truthy() {
            return Ok(EntityValue::symbol(reference.non_void()).union(&value));
        }
        if !value.has_symbolic() {
            return Ok(value);
        }
        value.substitute(&|r: &Reference| self.get(r).filter(EntityValue::is_truthy))
    }

    pub fn declare_symbolic(&mut self, reference: Reference) {
        self.symbols.insert(reference.non_void());
    }

    pub fn is_symbolic(&self, reference: &Reference) -> bool {
        self.symbols.contains(&reference.non_void())
    }

    pub fn symbols(&self) -> &BTreeSet<Reference> {
        &self.symbols
    }

    /// Every non-root node reference, parents before children
    pub fn references(&self) -> Vec<Reference> {
        self.flatten().into_keys().filter(|r| !r.is_void()).collect()
    }

    /// Every node's entity, with a `.void` entry for each void node
    pub fn flatten(&self) -> IndexMap<Reference, EntityValue> {
        let mut out = IndexMap::new();
        self.root.flatten_into(&mut out);
        out
    }

    /// Non-void references with their entities
    pub fn active(&self) -> IndexMap<Reference, EntityValue> {
        self.flatten()
            .into_iter()
            .filter(|(reference, value)| !reference.is_void() && value.is_truthy())
            .collect()
    }

    /// Non-empty entities in reference order
    fn snapshot(&self) -> BTreeMap<Reference, EntityValue> {
        self.flatten()
            .into_iter()
            .filter(|(reference, value)| !reference.is_void() && !value.is_empty())
            .collect()
    }

    /// Differences in effective value between two contexts
    pub fn get_diff(before: &EngineContext, after: &EngineContext) -> ChangeSet {
        let (old, new) = (before.flatten(), after.flatten());
        let mut changes = ChangeSet::new();
        for reference in old.keys().chain(new.keys()) {
            if reference.is_void() || reference.is_root() || changes.contains(reference) {
                continue;
            }
            let was = old.get(reference).cloned().unwrap_or_default();
            let now = new.get(reference).cloned().unwrap_or_default();
            if was != now {
                changes.insert(reference.clone(), Change::new(was, now));
            }
        }
        changes
    }

    /// [`get_diff`](Self::get_diff) plus an unchanged entry for every
    /// ancestor of a changed reference.
    ///
    /// A write below an ancestor can move part of the ancestor's own value
    /// into the child without changing the ancestor's entity. Applying the
    /// inverse of this set deepest-first puts that value back.
    pub fn get_anchored_diff(before: &EngineContext, after: &EngineContext) -> ChangeSet {
        let mut changes = Self::get_diff(before, after);
        let changed: Vec<Reference> = changes.keys().cloned().collect();
        for reference in changed {
            for depth in 1..reference.depth() {
                let ancestor = reference.ancestor_at(depth);
                if changes.contains(&ancestor) {
                    continue;
                }
                let old = before.get(&ancestor).unwrap_or_default();
                changes.insert(ancestor, Change::new(old.clone(), old));
            }
        }
        changes
    }
}

impl PartialEq for EngineContext {
    fn eq(&self, other: &Self) -> bool {
        self.symbols == other.symbols && self.snapshot() == other.snapshot()
    }
}

impl Eq for EngineContext {}

impl Hash for EngineContext {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for (reference, value) in self.snapshot() {
            reference.hash(state);
            value.hash(state);
        }
        self.symbols.hash(state);
    }
}
