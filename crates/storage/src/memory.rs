use std::{
    collections::{BTreeMap, HashMap},
    ops::Range,
    sync::{Arc, Mutex},
};

use haevn_core::{
    AbsoluteAddress, Disassembly, Function, Instruction, Label, LabelKind, Location, LocationId,
    Project, RelativeAddress, Section, StringLabel, Xref,
};

use crate::{Error, Store};

/// `(section name, upsert key)`: labels are keyed per
/// [`haevn_core::Label::upsert_key`], but that key alone is ambiguous
/// across sections, so every label is additionally scoped by the section
/// it belongs to (or, for a `Section` label, by its own name).
type LabelIdentity = (LabelKind, String, u64);

fn label_identity(label: &Label) -> LabelIdentity {
    let sec_name = match label {
        Label::Function(function) => function.sec_name.clone(),
        Label::String(string) => string.sec_name.clone(),
        Label::Section(section) => section.name.clone(),
        Label::Location(location) => location.sec_name.clone(),
    };

    (label.kind(), sec_name, label.upsert_key())
}

#[derive(Default)]
struct Inner {
    projects: HashMap<String, Project>,
    current_project: Option<String>,
    disassemblies: HashMap<(String, String), Disassembly>,
    current_disassembly: Option<String>,
    sections: HashMap<(String, String, String), Section>,
    instructions: HashMap<(String, String, String), BTreeMap<RelativeAddress, Instruction>>,
    labels: HashMap<(String, String), Vec<Label>>,
    xrefs: HashMap<(String, String), Vec<Xref>>,
    section_containing_addr_memo: HashMap<(String, String, AbsoluteAddress), Option<String>>,
}

impl Inner {
    fn scope(&self) -> (String, String) {
        (
            self.current_project.clone().expect("load_project must be called before this operation"),
            self.current_disassembly.clone().expect("add_disassembly must be called before this operation"),
        )
    }
}

/// An in-memory [`Store`] used by every unit test in this workspace.
///
/// Cheaply cloneable: every clone shares the same underlying state, so a
/// recursive-strategy worker pool can hand each worker its own `MemoryStore`
/// handle the same way it would hand each worker its own [`SledStore`]
/// connection.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Build a fresh, empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn load_project(&self, name: &str) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();

        inner.projects.entry(name.to_string()).or_insert_with(|| Project::new(name));
        inner.current_project = Some(name.to_string());
        inner.current_disassembly = None;

        Ok(())
    }

    fn add_disassembly(&self, disassembly: Disassembly) -> Result<bool, Error> {
        let mut inner = self.inner.lock().unwrap();
        let project_name =
            inner.current_project.clone().expect("load_project must be called before add_disassembly");
        let key = (project_name.clone(), disassembly.name.clone());

        if inner.disassemblies.contains_key(&key) {
            return Ok(false);
        }

        inner.disassemblies.insert(key, disassembly.clone());
        inner
            .projects
            .get_mut(&project_name)
            .expect("project was created by load_project")
            .push_disassembly(disassembly.name.clone());
        inner.current_disassembly = Some(disassembly.name);

        Ok(true)
    }

    fn add_section(&self, section: Section) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        let (project, disassembly) = inner.scope();

        inner.sections.insert((project, disassembly, section.name.clone()), section);

        Ok(())
    }

    fn upsert_section(&self, section: Section) -> Result<(), Error> {
        self.add_section(section)
    }

    fn batch_add_instructions(&self, sec_name: &str, instructions: Vec<Instruction>) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        let (project, disassembly) = inner.scope();
        let key = (project, disassembly, sec_name.to_string());
        let map = inner.instructions.entry(key).or_default();

        for instruction in instructions {
            map.insert(instruction.r_addr, instruction);
        }

        Ok(())
    }

    fn add_instruction(&self, sec_name: &str, instruction: Instruction, update: bool) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        let (project, disassembly) = inner.scope();
        let key = (project, disassembly, sec_name.to_string());
        let map = inner.instructions.entry(key).or_default();

        if update || !map.contains_key(&instruction.r_addr) {
            map.insert(instruction.r_addr, instruction);
        }

        Ok(())
    }

    fn batch_delete_insts_in_addr_ranges(
        &self,
        sec_name: &str,
        ranges: &[Range<RelativeAddress>],
    ) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        let (project, disassembly) = inner.scope();
        let key = (project, disassembly, sec_name.to_string());

        if let Some(map) = inner.instructions.get_mut(&key) {
            map.retain(|addr, _| !ranges.iter().any(|range| range.contains(addr)));
        }

        Ok(())
    }

    fn add_label(&self, label: Label) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        let scope = inner.scope();
        let identity = label_identity(&label);
        let labels = inner.labels.entry(scope).or_default();

        if !labels.iter().any(|existing| label_identity(existing) == identity) {
            labels.push(label);
        }

        Ok(())
    }

    fn upsert_label(&self, label: Label) -> Result<LocationId, Error> {
        let mut inner = self.inner.lock().unwrap();
        let scope = inner.scope();
        let identity = label_identity(&label);
        let key = label.upsert_key();
        let labels = inner.labels.entry(scope).or_default();

        match labels.iter_mut().find(|existing| label_identity(existing) == identity) {
            Some(existing) => *existing = label,
            None => labels.push(label),
        }

        Ok(key)
    }

    fn add_xref(&self, xref: Xref) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        let scope = inner.scope();

        inner.xrefs.entry(scope).or_default().push(xref);

        Ok(())
    }

    fn get_sections(&self, executable: Option<bool>) -> Result<Vec<Section>, Error> {
        let inner = self.inner.lock().unwrap();
        let (project, disassembly) = inner.scope();

        Ok(inner
            .sections
            .iter()
            .filter(|((p, d, _), _)| *p == project && *d == disassembly)
            .map(|(_, section)| section.clone())
            .filter(|section| executable.map_or(true, |executable| section.is_executable() == executable))
            .collect())
    }

    fn get_section(&self, name: &str) -> Result<Option<Section>, Error> {
        let inner = self.inner.lock().unwrap();
        let (project, disassembly) = inner.scope();

        Ok(inner.sections.get(&(project, disassembly, name.to_string())).cloned())
    }

    fn get_section_containing_addr(&self, addr: AbsoluteAddress) -> Result<Option<Section>, Error> {
        let mut inner = self.inner.lock().unwrap();
        let (project, disassembly) = inner.scope();
        let memo_key = (project.clone(), disassembly.clone(), addr);

        if let Some(cached) = inner.section_containing_addr_memo.get(&memo_key) {
            let name = cached.clone();

            return Ok(name.and_then(|name| {
                inner.sections.get(&(project.clone(), disassembly.clone(), name)).cloned()
            }));
        }

        let found = inner
            .sections
            .iter()
            .filter(|((p, d, _), _)| *p == project && *d == disassembly)
            .map(|(_, section)| section)
            .find(|section| section.contains_addr(addr))
            .cloned();

        inner.section_containing_addr_memo.insert(memo_key, found.as_ref().map(|section| section.name.clone()));

        Ok(found)
    }

    fn get_functions(&self) -> Result<Vec<Function>, Error> {
        let inner = self.inner.lock().unwrap();
        let scope = inner.scope();

        Ok(inner
            .labels
            .get(&scope)
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|label| match label {
                        Label::Function(function) => Some(function.clone()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn get_strings(&self) -> Result<Vec<StringLabel>, Error> {
        let inner = self.inner.lock().unwrap();
        let scope = inner.scope();

        Ok(inner
            .labels
            .get(&scope)
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|label| match label {
                        Label::String(string) => Some(string.clone()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn get_locations(&self) -> Result<Vec<Location>, Error> {
        let inner = self.inner.lock().unwrap();
        let scope = inner.scope();

        Ok(inner
            .labels
            .get(&scope)
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|label| match label {
                        Label::Location(location) => Some(location.clone()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn get_instructions(&self, sec_name: &str) -> Result<Vec<Instruction>, Error> {
        let inner = self.inner.lock().unwrap();
        let (project, disassembly) = inner.scope();
        let key = (project, disassembly, sec_name.to_string());

        Ok(inner.instructions.get(&key).map(|map| map.values().cloned().collect()).unwrap_or_default())
    }

    fn get_instructions_count(&self, sec_name: &str) -> Result<usize, Error> {
        let inner = self.inner.lock().unwrap();
        let (project, disassembly) = inner.scope();
        let key = (project, disassembly, sec_name.to_string());

        Ok(inner.instructions.get(&key).map(BTreeMap::len).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use haevn_core::{Arch, Attribute, Format, Instruction};

    use super::*;

    fn disassembly(name: &str) -> Disassembly {
        Disassembly {
            name: name.to_string(),
            binary_name: "a.out".to_string(),
            format: Format::Elf,
            arch: Arch::X86,
            mode: haevn_core::Mode::Bits64Little,
            md5: [0; 16],
            size: 0,
            entry_point: 0x1000,
        }
    }

    #[test]
    fn test_add_disassembly_is_idempotent() {
        let store = MemoryStore::new();
        store.load_project("proj").unwrap();

        assert!(store.add_disassembly(disassembly("main")).unwrap());
        assert!(!store.add_disassembly(disassembly("main")).unwrap());
    }

    #[test]
    fn test_instructions_are_returned_address_ascending() {
        let store = MemoryStore::new();
        store.load_project("proj").unwrap();
        store.add_disassembly(disassembly("main")).unwrap();

        store
            .batch_add_instructions(
                ".text",
                vec![
                    Instruction::data_byte(2, 0x1002, 0x90),
                    Instruction::data_byte(0, 0x1000, 0x90),
                    Instruction::data_byte(1, 0x1001, 0x90),
                ],
            )
            .unwrap();

        let addresses: Vec<_> =
            store.get_instructions(".text").unwrap().iter().map(|i| i.r_addr).collect();

        assert_eq!(addresses, vec![0, 1, 2]);
    }

    #[test]
    fn test_batch_delete_removes_only_the_given_range() {
        let store = MemoryStore::new();
        store.load_project("proj").unwrap();
        store.add_disassembly(disassembly("main")).unwrap();

        store
            .batch_add_instructions(
                ".rodata",
                (0..10).map(|i| Instruction::data_byte(i, 0x2000 + i, 0x41)).collect(),
            )
            .unwrap();

        store.batch_delete_insts_in_addr_ranges(".rodata", &[2..5]).unwrap();

        let addresses: Vec<_> =
            store.get_instructions(".rodata").unwrap().iter().map(|i| i.r_addr).collect();

        assert_eq!(addresses, vec![0, 1, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_upsert_label_replaces_same_identity() {
        let store = MemoryStore::new();
        store.load_project("proj").unwrap();
        store.add_disassembly(disassembly("main")).unwrap();

        let location = |name: &str| {
            Label::Location(Location { name: name.to_string(), r_addr: 0x10, sec_name: ".text".to_string() })
        };

        store.upsert_label(location("loc_00001010")).unwrap();
        store.upsert_label(location("loc_00001010_renamed")).unwrap();

        let locations = store.get_locations().unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].name, "loc_00001010_renamed");
    }

    #[test]
    fn test_get_section_containing_addr() {
        let store = MemoryStore::new();
        store.load_project("proj").unwrap();
        store.add_disassembly(disassembly("main")).unwrap();
        store.add_section(Section::new(".text", vec![0u8; 16], Attribute::Execute.into(), 0x1000)).unwrap();

        let found = store.get_section_containing_addr(0x1008).unwrap();
        assert_eq!(found.map(|section| section.name), Some(".text".to_string()));

        assert!(store.get_section_containing_addr(0x9000).unwrap().is_none());
    }
}
