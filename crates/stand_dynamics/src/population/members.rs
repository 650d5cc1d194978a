//! Registry of named, typed per-tree data members.
//!
//! Behaviors register members by label for the (species, stage) combinations they
//! govern and receive a code. One code exists per label and type; registering the
//! same label for another combination extends the existing member.
use crate::applicability::AppliesTo;
use crate::population::{LifeStage, SpeciesId};

/// Code of an integer data member.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IntCode(pub(crate) usize);

/// Code of a float data member.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FloatCode(pub(crate) usize);

/// Code of a bool data member.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoolCode(pub(crate) usize);

#[derive(Debug, Clone)]
struct MemberDef {
    label: String,
    applies: AppliesTo,
}

#[derive(Debug, Clone, Default)]
struct MemberTable {
    defs: Vec<MemberDef>,
}

impl MemberTable {
    fn register(
        &mut self,
        label: &str,
        species: SpeciesId,
        stage: LifeStage,
        n_species: usize,
    ) -> usize {
        if let Some(i) = self.defs.iter().position(|d| d.label == label) {
            self.defs[i].applies.set(species, stage, true);
            return i;
        }
        let mut applies = AppliesTo::new(n_species);
        applies.set(species, stage, true);
        self.defs.push(MemberDef {
            label: label.to_owned(),
            applies,
        });
        self.defs.len() - 1
    }

    fn lookup(&self, label: &str, species: SpeciesId, stage: LifeStage) -> Option<usize> {
        self.defs
            .iter()
            .position(|d| d.label == label)
            .filter(|&i| self.defs[i].applies.applies(species, stage))
    }

    fn registrations(&self, label: &str) -> usize {
        self.defs
            .iter()
            .find(|d| d.label == label)
            .map(|d| d.applies.count())
            .unwrap_or(0)
    }
}

/// Registry of int, float and bool data members.
#[derive(Debug, Clone)]
pub struct DataMemberRegistry {
    n_species: usize,
    ints: MemberTable,
    floats: MemberTable,
    bools: MemberTable,
}

impl DataMemberRegistry {
    pub fn new(n_species: usize) -> Self {
        Self {
            n_species,
            ints: MemberTable::default(),
            floats: MemberTable::default(),
            bools: MemberTable::default(),
        }
    }

    pub fn register_int(&mut self, label: &str, species: SpeciesId, stage: LifeStage) -> IntCode {
        IntCode(self.ints.register(label, species, stage, self.n_species))
    }

    pub fn register_float(
        &mut self,
        label: &str,
        species: SpeciesId,
        stage: LifeStage,
    ) -> FloatCode {
        FloatCode(self.floats.register(label, species, stage, self.n_species))
    }

    pub fn register_bool(&mut self, label: &str, species: SpeciesId, stage: LifeStage) -> BoolCode {
        BoolCode(self.bools.register(label, species, stage, self.n_species))
    }

    /// Code of the int member `label` for the combination, or `None` if it was
    /// never registered for it.
    pub fn int_code(&self, label: &str, species: SpeciesId, stage: LifeStage) -> Option<IntCode> {
        self.ints.lookup(label, species, stage).map(IntCode)
    }

    pub fn float_code(
        &self,
        label: &str,
        species: SpeciesId,
        stage: LifeStage,
    ) -> Option<FloatCode> {
        self.floats.lookup(label, species, stage).map(FloatCode)
    }

    pub fn bool_code(&self, label: &str, species: SpeciesId, stage: LifeStage) -> Option<BoolCode> {
        self.bools.lookup(label, species, stage).map(BoolCode)
    }

    /// Number of (species, stage) combinations the int member `label` is registered for.
    pub fn int_registrations(&self, label: &str) -> usize {
        self.ints.registrations(label)
    }

    pub(crate) fn int_len(&self) -> usize {
        self.ints.defs.len()
    }

    pub(crate) fn float_len(&self) -> usize {
        self.floats.defs.len()
    }

    pub(crate) fn bool_len(&self) -> usize {
        self.bools.defs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_label_shares_one_code() {
        let mut reg = DataMemberRegistry::new(3);
        let a = reg.register_int("dead", 0, LifeStage::Adult);
        let b = reg.register_int("dead", 2, LifeStage::Sapling);
        assert_eq!(a, b);
        assert_eq!(reg.int_registrations("dead"), 2);
        assert_eq!(reg.int_len(), 1);
    }

    #[test]
    fn lookup_is_scoped_to_registered_combos() {
        let mut reg = DataMemberRegistry::new(2);
        reg.register_float("Growth", 1, LifeStage::Sapling);
        assert!(reg.float_code("Growth", 1, LifeStage::Sapling).is_some());
        assert!(reg.float_code("Growth", 0, LifeStage::Sapling).is_none());
        assert!(reg.float_code("Growth", 1, LifeStage::Adult).is_none());
        assert!(reg.float_code("Light", 1, LifeStage::Sapling).is_none());
    }

    #[test]
    fn types_have_independent_namespaces() {
        let mut reg = DataMemberRegistry::new(1);
        reg.register_bool("Browsed", 0, LifeStage::Seedling);
        assert!(reg.int_code("Browsed", 0, LifeStage::Seedling).is_none());
        assert!(reg.bool_code("Browsed", 0, LifeStage::Seedling).is_some());
    }
}
