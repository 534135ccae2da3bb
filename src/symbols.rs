use std::collections::HashMap;

use crate::error::SourceLoc;
use crate::unit::LabelKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub position: u32,
    pub kind: LabelKind,
    pub loc: SourceLoc,
}

/// Label positions, filled during layout.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    map: HashMap<String, Symbol>,
}

impl SymbolTable {
    /// Registers a label. The first definition wins; on a clash the existing
    /// entry is returned and the table is left unchanged.
    pub fn define(
        &mut self,
        name: &str,
        position: u32,
        kind: LabelKind,
        loc: SourceLoc,
    ) -> Result<(), &Symbol> {
        if self.map.contains_key(name) {
            return Err(&self.map[name]);
        }
        self.map.insert(
            name.to_string(),
            Symbol {
                position,
                kind,
                loc,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.map.get(name)
    }

    pub fn position(&self, name: &str) -> Option<u32> {
        self.map.get(name).map(|s| s.position)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Entries ordered by name.
    pub fn sorted(&self) -> Vec<(&str, &Symbol)> {
        let mut v: Vec<_> = self.map.iter().map(|(k, s)| (k.as_str(), s)).collect();
        v.sort_unstable_by_key(|(k, _)| *k);
        v
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constant {
    pub value: i32,
    pub loc: SourceLoc,
}

/// Named integers from `constant` statements, known as soon as they are parsed.
#[derive(Debug, Clone, Default)]
pub struct ConstantTable {
    map: HashMap<String, Constant>,
}

impl ConstantTable {
    /// Defines or replaces a constant. Returns the previous definition.
    pub fn define(&mut self, name: &str, value: i32, loc: SourceLoc) -> Option<Constant> {
        self.map.insert(name.to_string(), Constant { value, loc })
    }

    pub fn get(&self, name: &str) -> Option<i32> {
        self.map.get(name).map(|c| c.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn sorted(&self) -> Vec<(&str, &Constant)> {
        let mut v: Vec<_> = self.map.iter().map(|(k, c)| (k.as_str(), c)).collect();
        v.sort_unstable_by_key(|(k, _)| *k);
        v
    }
}
