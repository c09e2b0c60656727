//! Instances, instance paths and the implicit instance tree.
//!
//! Instances live inside designs, so the instance tree is never
//! stored: an occurrence of an instance in the tree is the path of
//! instances leading to it from a root design.

use std::fmt;
use std::collections::HashSet;
use compact_str::CompactString;
use crate::*;

/// An opaque instance handle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub(crate) usize);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "inst{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Instance {
    pub(crate) name: CompactString,
    pub(crate) parent: DesignId,
    pub(crate) model: DesignId,
    /// Model interface bit to the net in the parent design.
    pub(crate) bit_nets: Vec<Option<NetId>>,
}

/// Where to look for or create child instances.
///
/// An instance scope stands for the inside of its model. Since the
/// model is shared, editing inside an instance scope affects every
/// instantiation of that model.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    Design(DesignId),
    Instance(InstanceId),
}

impl From<DesignId> for Scope {
    #[inline]
    fn from(d: DesignId) -> Scope {
        Scope::Design(d)
    }
}

impl From<InstanceId> for Scope {
    #[inline]
    fn from(i: InstanceId) -> Scope {
        Scope::Instance(i)
    }
}

/// A path of instances from a root design down the hierarchy.
///
/// The root is usually the top design, but any design can serve as
/// a root, e.g. to look at a design that is never instantiated.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstancePath {
    root: DesignId,
    instances: Vec<InstanceId>,
}

impl InstancePath {
    /// The empty path at a root design.
    #[inline]
    pub fn root(root: DesignId) -> InstancePath {
        InstancePath { root, instances: Vec::new() }
    }

    #[inline]
    pub fn root_design(&self) -> DesignId {
        self.root
    }

    /// Instances from the top-most one downwards.
    #[inline]
    pub fn instances(&self) -> &[InstanceId] {
        &self.instances
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.instances.is_empty()
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.instances.len()
    }

    #[inline]
    pub fn last(&self) -> Option<InstanceId> {
        self.instances.last().copied()
    }

    /// The path one level down, through `inst`.
    ///
    /// This does not check that `inst` lives in the design at the
    /// end of this path; see [`NetlistDB::path_design`].
    #[inline]
    pub fn child(&self, inst: InstanceId) -> InstancePath {
        let mut instances = Vec::with_capacity(self.instances.len() + 1);
        instances.extend_from_slice(&self.instances);
        instances.push(inst);
        InstancePath { root: self.root, instances }
    }

    /// Split off the last instance, giving the enclosing path.
    #[inline]
    pub fn parent(&self) -> Option<(InstancePath, InstanceId)> {
        let (&last, rest) = self.instances.split_last()?;
        Some((InstancePath { root: self.root, instances: rest.to_vec() }, last))
    }
}

impl NetlistDB {
    pub(crate) fn instance(&self, inst: InstanceId) -> Result<&Instance> {
        match self.instances.get(inst.0) {
            Some(Some(i)) => Ok(i),
            _ => Err(HierError::not_found("instance", inst))
        }
    }

    /// The design a scope stands for.
    pub fn scope_design(&self, scope: impl Into<Scope>) -> Result<DesignId> {
        match scope.into() {
            Scope::Design(d) => Ok(d),
            Scope::Instance(i) => Ok(self.instance(i)?.model),
        }
    }

    pub fn instance_name(&self, inst: InstanceId) -> Result<&str> {
        Ok(&self.instance(inst)?.name)
    }

    pub fn instance_model(&self, inst: InstanceId) -> Result<DesignId> {
        Ok(self.instance(inst)?.model)
    }

    pub fn instance_parent(&self, inst: InstanceId) -> Result<DesignId> {
        Ok(self.instance(inst)?.parent)
    }

    /// Whether `target` is `from` or appears anywhere below it.
    fn design_reaches(&self, from: DesignId, target: DesignId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![from];
        while let Some(d) = stack.pop() {
            if d == target {
                return true
            }
            if !visited.insert(d) {
                continue
            }
            for &inst in self.design(d).instances.values() {
                if let Ok(i) = self.instance(inst) {
                    stack.push(i.model);
                }
            }
        }
        false
    }

    /// Create an instance of `model` inside a scope.
    ///
    /// Fails with [`HierError::TypeMismatch`] if the parent is a
    /// primitive, or if the model contains the parent (directly or
    /// transitively), which would make the hierarchy infinite.
    pub fn create_instance(
        &mut self, scope: impl Into<Scope>, model: DesignId,
        name: impl Into<CompactString>
    ) -> Result<InstanceId> {
        let parent = self.scope_design(scope)?;
        let name = name.into();
        let pd = self.design(parent);
        if pd.is_primitive() {
            return Err(HierError::TypeMismatch(format!(
                "cannot instantiate {} inside primitive {}",
                self.design(model).name, pd.name)))
        }
        if pd.instances.contains_key(&name) {
            return Err(HierError::duplicate(
                "instance", name, format!("design {}", pd.name)))
        }
        if self.design_reaches(model, parent) {
            return Err(HierError::TypeMismatch(format!(
                "instantiating {} inside {} creates a hierarchy cycle",
                self.design(model).name, pd.name)))
        }

        let id = InstanceId(self.instances.len());
        let num_bits = self.design(model).num_bits();
        self.instances.push(Some(Instance {
            name: name.clone(),
            parent,
            model,
            bit_nets: vec![None; num_bits],
        }));
        clilog::debug!(HD_INST_NEW, "created instance {} of {} in {}",
                       name, self.design(model).name, self.design(parent).name);
        self.design_mut(parent).instances.insert(name, id);
        Ok(id)
    }

    pub fn child_instance(
        &self, scope: impl Into<Scope>, name: &str
    ) -> Result<InstanceId> {
        let d = self.design(self.scope_design(scope)?);
        d.instances.get(name).copied().ok_or_else(|| {
            HierError::not_found("instance", format!("{}/{}", d.name, name))
        })
    }

    /// Child instances of a scope in creation order.
    ///
    /// The returned iterator is a view over the scope: cloning it
    /// restarts the iteration.
    pub fn child_instances(
        &self, scope: impl Into<Scope>
    ) -> Result<impl Iterator<Item = InstanceId> + Clone + '_> {
        let d = self.scope_design(scope)?;
        Ok(self.design(d).instances.values().copied())
    }

    /// Delete an instance.
    ///
    /// All its instance terminals are disconnected first; the nets
    /// themselves are kept, even when they become dangling.
    pub fn delete_instance(&mut self, inst: InstanceId) -> Result<()> {
        let i = self.instance(inst)?;
        let (parent, name) = (i.parent, i.name.clone());
        for bit in 0..i.bit_nets.len() {
            self.disconnect(InstTerm { inst, bit })?;
        }
        self.design_mut(parent).instances.shift_remove(&name);
        self.instances[inst.0] = None;
        clilog::debug!(HD_INST_DEL, "deleted instance {} in {}",
                       name, self.design(parent).name);
        Ok(())
    }

    /// The root path at the top design.
    pub fn top_path(&self) -> Result<InstancePath> {
        Ok(InstancePath::root(self.top_design()?))
    }

    /// Resolve a path of instance names below a root design.
    pub fn path_from_names<S: AsRef<str>>(
        &self, root: DesignId, names: impl IntoIterator<Item = S>
    ) -> Result<InstancePath> {
        let mut path = InstancePath::root(root);
        let mut cur = root;
        for name in names {
            let inst = self.child_instance(cur, name.as_ref())?;
            cur = self.instance(inst)?.model;
            path.instances.push(inst);
        }
        Ok(path)
    }

    /// The design at the end of a path.
    ///
    /// Fails if some instance was deleted or does not live in the
    /// design above it.
    pub fn path_design(&self, path: &InstancePath) -> Result<DesignId> {
        let mut cur = path.root;
        for &inst in &path.instances {
            let i = self.instance(inst)?;
            if i.parent != cur {
                return Err(HierError::TypeMismatch(format!(
                    "instance {} is not a child of {}",
                    i.name, self.design(cur).name)))
            }
            cur = i.model;
        }
        Ok(cur)
    }

    /// All primitive instance occurrences below a root design,
    /// depth-first in creation order.
    pub fn leaf_instances(&self, root: DesignId) -> Result<Vec<InstancePath>> {
        let mut leaves = Vec::new();
        let mut stack = vec![InstancePath::root(root)];
        while let Some(path) = stack.pop() {
            let d = self.path_design(&path)?;
            if !path.is_root() && self.design(d).is_primitive() {
                leaves.push(path);
                continue
            }
            for &inst in self.design(d).instances.values().rev() {
                stack.push(path.child(inst));
            }
        }
        Ok(leaves)
    }
}
