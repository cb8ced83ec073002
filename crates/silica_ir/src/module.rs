//! The module: a name-indexed collection of units.
//!
//! Unit names are unique within a module and are the linkage key used by
//! `call` and `inst` through per-unit
//! [`ExtUnitData`](crate::dfg::ExtUnitData) references. Value and
//! instruction IDs are only meaningful within their unit; nothing in one
//! unit can alias state in another.

use crate::arena::Arena;
use crate::ids::UnitId;
use crate::unit::{DeclData, Signature, UnitData, UnitName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A unit slot in the module: a definition or an external declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModUnit {
    /// A unit with a body.
    Data(UnitData),
    /// An external declaration.
    Decl(DeclData),
}

impl ModUnit {
    /// The name of the unit or declaration.
    pub fn name(&self) -> &UnitName {
        match self {
            ModUnit::Data(unit) => unit.name(),
            ModUnit::Decl(decl) => &decl.name,
        }
    }

    /// The signature of the unit or declaration.
    pub fn sig(&self) -> &Signature {
        match self {
            ModUnit::Data(unit) => unit.sig(),
            ModUnit::Decl(decl) => &decl.sig,
        }
    }

    /// The unit data, if this is a definition.
    pub fn get_data(&self) -> Option<&UnitData> {
        match self {
            ModUnit::Data(unit) => Some(unit),
            ModUnit::Decl(_) => None,
        }
    }

    /// Mutable unit data, if this is a definition.
    pub fn get_data_mut(&mut self) -> Option<&mut UnitData> {
        match self {
            ModUnit::Data(unit) => Some(unit),
            ModUnit::Decl(_) => None,
        }
    }
}

/// An error mutating the module table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModuleError {
    /// A unit with the same name already exists.
    #[error("a unit named `@{0}` already exists in the module")]
    DuplicateName(String),
}

/// A collection of units, keyed by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Module {
    units: Arena<UnitId, ModUnit>,
    names: BTreeMap<String, UnitId>,
}

impl Module {
    /// Creates a new, empty module.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a unit definition to the module.
    pub fn add_unit(&mut self, data: UnitData) -> Result<UnitId, ModuleError> {
        self.insert(ModUnit::Data(data))
    }

    /// Adds an external declaration to the module.
    pub fn declare(&mut self, name: UnitName, sig: Signature) -> Result<UnitId, ModuleError> {
        self.insert(ModUnit::Decl(DeclData { name, sig }))
    }

    fn insert(&mut self, unit: ModUnit) -> Result<UnitId, ModuleError> {
        let key = unit.name().as_str().to_string();
        if self.names.contains_key(&key) {
            return Err(ModuleError::DuplicateName(key));
        }
        let id = self.units.alloc(unit);
        self.names.insert(key, id);
        Ok(id)
    }

    /// Removes a unit from the module, cascading the disposal of its
    /// blocks, instructions, and values.
    ///
    /// # Panics
    ///
    /// Panics if the ID is stale.
    pub fn remove_unit(&mut self, id: UnitId) -> ModUnit {
        let unit = self.units.remove(id);
        self.names.remove(unit.name().as_str());
        unit
    }

    /// Replaces the unit at `id` with a new definition, keeping the same
    /// slot. The new definition may carry a different name as long as it
    /// does not collide with another unit.
    pub fn replace_unit(&mut self, id: UnitId, data: UnitData) -> Result<ModUnit, ModuleError> {
        let old_key = self.units.get(id).name().as_str().to_string();
        let new_key = data.name().as_str().to_string();
        if new_key != old_key {
            if self.names.contains_key(&new_key) {
                return Err(ModuleError::DuplicateName(new_key));
            }
            self.names.remove(&old_key);
            self.names.insert(new_key, id);
        }
        Ok(std::mem::replace(
            self.units.get_mut(id),
            ModUnit::Data(data),
        ))
    }

    /// Renames a unit, maintaining the name index.
    pub fn rename_unit(&mut self, id: UnitId, name: UnitName) -> Result<(), ModuleError> {
        let old_key = self.units.get(id).name().as_str().to_string();
        let new_key = name.as_str().to_string();
        if new_key == old_key {
            return Ok(());
        }
        if self.names.contains_key(&new_key) {
            return Err(ModuleError::DuplicateName(new_key));
        }
        match self.units.get_mut(id) {
            ModUnit::Data(unit) => unit.set_name(name),
            ModUnit::Decl(decl) => decl.name = name,
        }
        self.names.remove(&old_key);
        self.names.insert(new_key, id);
        Ok(())
    }

    /// Looks a unit up by name (without the `@` sigil).
    pub fn lookup(&self, name: &str) -> Option<UnitId> {
        self.names.get(name).copied()
    }

    /// The unit slot with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if the ID is stale.
    pub fn get(&self, id: UnitId) -> &ModUnit {
        self.units.get(id)
    }

    /// Mutable access to the unit slot with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if the ID is stale.
    pub fn get_mut(&mut self, id: UnitId) -> &mut ModUnit {
        self.units.get_mut(id)
    }

    /// The unit definition with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if the ID is stale or refers to a declaration.
    pub fn unit(&self, id: UnitId) -> &UnitData {
        self.units
            .get(id)
            .get_data()
            .expect("unit ID refers to a declaration")
    }

    /// Mutable access to the unit definition with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if the ID is stale or refers to a declaration.
    pub fn unit_mut(&mut self, id: UnitId) -> &mut UnitData {
        self.units
            .get_mut(id)
            .get_data_mut()
            .expect("unit ID refers to a declaration")
    }

    /// Returns `true` if the module still holds the unit.
    pub fn contains(&self, id: UnitId) -> bool {
        self.units.contains(id)
    }

    /// Iterates over all unit slots in the module.
    pub fn units(&self) -> impl Iterator<Item = (UnitId, &ModUnit)> {
        self.units.iter()
    }

    /// The IDs of all unit slots in the module.
    pub fn unit_ids(&self) -> Vec<UnitId> {
        self.units.ids().collect()
    }

    /// The number of units, definitions and declarations combined.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns `true` if the module has no units.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::Type;
    use crate::unit::UnitKind;

    fn func(name: &str) -> UnitData {
        UnitData::new(
            UnitKind::Function,
            UnitName::new(name),
            Signature::new_function(vec![Type::Int(32)], Type::Int(32)),
        )
        .unwrap()
    }

    #[test]
    fn add_and_lookup() {
        let mut module = Module::new();
        let id = module.add_unit(func("f")).unwrap();
        assert_eq!(module.lookup("f"), Some(id));
        assert_eq!(module.lookup("g"), None);
        assert_eq!(module.unit(id).name().as_str(), "f");
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut module = Module::new();
        module.add_unit(func("f")).unwrap();
        let err = module.add_unit(func("f"));
        assert_eq!(err.unwrap_err(), ModuleError::DuplicateName("f".into()));
        // Declarations share the namespace.
        let err = module.declare(
            UnitName::new("f"),
            Signature::new_function(vec![], Type::Int(1)),
        );
        assert!(err.is_err());
    }

    #[test]
    fn remove_frees_name() {
        let mut module = Module::new();
        let id = module.add_unit(func("f")).unwrap();
        module.remove_unit(id);
        assert_eq!(module.lookup("f"), None);
        assert!(module.is_empty());
        // The name can be reused.
        module.add_unit(func("f")).unwrap();
    }

    #[test]
    fn replace_keeps_slot() {
        let mut module = Module::new();
        let id = module.add_unit(func("f")).unwrap();
        let other = module.add_unit(func("g")).unwrap();
        module.replace_unit(id, func("f")).unwrap();
        assert_eq!(module.lookup("f"), Some(id));
        // Colliding rename through replace is rejected.
        assert!(module.replace_unit(id, func("g")).is_err());
        assert_eq!(module.lookup("g"), Some(other));
    }

    #[test]
    fn rename_unit() {
        let mut module = Module::new();
        let id = module.add_unit(func("f")).unwrap();
        module.rename_unit(id, UnitName::new("h")).unwrap();
        assert_eq!(module.lookup("f"), None);
        assert_eq!(module.lookup("h"), Some(id));
        module.add_unit(func("f")).unwrap();
        assert!(module.rename_unit(id, UnitName::new("f")).is_err());
    }

    #[test]
    fn declarations_carry_signatures() {
        let mut module = Module::new();
        let sig = Signature::new_ports(vec![Type::signal(Type::Int(1))], vec![]);
        let id = module.declare(UnitName::new("ext"), sig.clone()).unwrap();
        assert_eq!(module.get(id).sig(), &sig);
        assert!(module.get(id).get_data().is_none());
    }
}
