use std::{
    ops::Range,
    sync::{Arc, Mutex},
};

use haevn_core::{
    AbsoluteAddress, Disassembly, Function, Instruction, Label, Location, LocationId, Project,
    RelativeAddress, Section, StringLabel, Xref,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{Error, Store};

const PROJECTS_TREE: &str = "projects";
const DISASSEMBLIES_TREE: &str = "disassemblies";
const SECTIONS_TREE: &str = "sections";
const INSTRUCTIONS_TREE: &str = "instructions";
const LABELS_TREE: &str = "labels";
const XREFS_TREE: &str = "xrefs";

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, Error> {
    Ok(bincode::serialize(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
    Ok(bincode::deserialize(bytes)?)
}

/// Join NUL-separated key parts, e.g. `[b"section", b"\0", &addr_be]`.
fn join_parts(parts: &[&[u8]]) -> Vec<u8> {
    parts.concat()
}

/// The sled-backed production [`Store`]. Every collection lives in its own
/// sled tree, keyed so a `(project, disassembly)` scope is a contiguous
/// key-prefix range, the same way the embedded database's own trees are
/// range-scannable by prefix.
///
/// `Clone` is shallow: every clone shares the same underlying `sled::Db`
/// handle, so the recursive strategy's worker pool can open the store once
/// and hand every worker a clone.
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
    scope: Arc<Mutex<(Option<String>, Option<String>)>>,
}

impl SledStore {
    /// Open (creating if absent) the embedded database rooted at `path`.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        let db = sled::open(path)?;

        Ok(Self { db, scope: Arc::new(Mutex::new((None, None))) })
    }

    /// The current `(project, disassembly)` scope. Panics if
    /// [`Store::load_project`]/[`Store::add_disassembly`] have not yet been
    /// called, the same precondition [`crate::MemoryStore`] enforces.
    fn scope(&self) -> (String, String) {
        let scope = self.scope.lock().unwrap();
        let project = scope.0.clone().expect("load_project must be called before this operation");
        let disassembly = scope.1.clone().expect("add_disassembly must be called before this operation");

        (project, disassembly)
    }

    /// `(project, disassembly, ...)` keys are `<project>\0<disassembly>\0<rest>`
    /// so every scoped collection is a contiguous range under that prefix.
    fn scoped_key(project: &str, disassembly: &str, rest: &[u8]) -> Vec<u8> {
        let mut key = Vec::with_capacity(project.len() + disassembly.len() + rest.len() + 2);
        key.extend_from_slice(project.as_bytes());
        key.push(0);
        key.extend_from_slice(disassembly.as_bytes());
        key.push(0);
        key.extend_from_slice(rest);
        key
    }

    fn scan_scope<T: DeserializeOwned>(
        &self,
        tree: &str,
        project: &str,
        disassembly: &str,
    ) -> Result<Vec<T>, Error> {
        let tree = self.db.open_tree(tree)?;
        let prefix = Self::scoped_key(project, disassembly, &[]);
        let mut values = Vec::new();

        for entry in tree.scan_prefix(prefix) {
            let (_, value) = entry?;
            values.push(decode(&value)?);
        }

        Ok(values)
    }
}

impl Store for SledStore {
    fn load_project(&self, name: &str) -> Result<(), Error> {
        let tree = self.db.open_tree(PROJECTS_TREE)?;

        if !tree.contains_key(name)? {
            tree.insert(name, encode(&Project::new(name))?)?;
        }

        let mut scope = self.scope.lock().unwrap();
        scope.0 = Some(name.to_string());
        scope.1 = None;

        Ok(())
    }

    fn add_disassembly(&self, disassembly: Disassembly) -> Result<bool, Error> {
        let project_name = self
            .scope
            .lock()
            .unwrap()
            .0
            .clone()
            .expect("load_project must be called before add_disassembly");

        let disassemblies = self.db.open_tree(DISASSEMBLIES_TREE)?;
        let key = Self::scoped_key(&project_name, &disassembly.name, b"meta");

        if disassemblies.contains_key(&key)? {
            return Ok(false);
        }

        disassemblies.insert(key, encode(&disassembly)?)?;

        let projects = self.db.open_tree(PROJECTS_TREE)?;
        if let Some(bytes) = projects.get(&project_name)? {
            let mut project: Project = decode(&bytes)?;
            project.push_disassembly(disassembly.name.clone());
            projects.insert(&project_name, encode(&project)?)?;
        }

        {
            let mut scope = self.scope.lock().unwrap();
            scope.0 = Some(project_name);
            scope.1 = Some(disassembly.name);
        }

        Ok(true)
    }

    fn add_section(&self, section: Section) -> Result<(), Error> {
        let (project, disassembly) = self.scope();
        let tree = self.db.open_tree(SECTIONS_TREE)?;
        let key = Self::scoped_key(&project, &disassembly, section.name.as_bytes());

        tree.insert(key, encode(&section)?)?;

        Ok(())
    }

    fn upsert_section(&self, section: Section) -> Result<(), Error> {
        self.add_section(section)
    }

    fn batch_add_instructions(&self, sec_name: &str, instructions: Vec<Instruction>) -> Result<(), Error> {
        let (project, disassembly) = self.scope();
        let tree = self.db.open_tree(INSTRUCTIONS_TREE)?;
        let mut batch = sled::Batch::default();

        for instruction in instructions {
            let rest = join_parts(&[sec_name.as_bytes(), b"\0", &instruction.r_addr.to_be_bytes()]);
            let key = Self::scoped_key(&project, &disassembly, &rest);

            batch.insert(key, encode(&instruction)?);
        }

        tree.apply_batch(batch)?;

        Ok(())
    }

    fn add_instruction(&self, sec_name: &str, instruction: Instruction, update: bool) -> Result<(), Error> {
        let (project, disassembly) = self.scope();
        let tree = self.db.open_tree(INSTRUCTIONS_TREE)?;
        let rest = join_parts(&[sec_name.as_bytes(), b"\0", &instruction.r_addr.to_be_bytes()]);
        let key = Self::scoped_key(&project, &disassembly, &rest);

        if update || !tree.contains_key(&key)? {
            tree.insert(key, encode(&instruction)?)?;
        }

        Ok(())
    }

    fn batch_delete_insts_in_addr_ranges(
        &self,
        sec_name: &str,
        ranges: &[Range<RelativeAddress>],
    ) -> Result<(), Error> {
        let (project, disassembly) = self.scope();
        let tree = self.db.open_tree(INSTRUCTIONS_TREE)?;
        let prefix = Self::scoped_key(&project, &disassembly, &join_parts(&[sec_name.as_bytes(), b"\0"]));
        let mut batch = sled::Batch::default();

        for entry in tree.scan_prefix(&prefix) {
            let (key, value) = entry?;
            let instruction: Instruction = decode(&value)?;

            if ranges.iter().any(|range| range.contains(&instruction.r_addr)) {
                batch.remove(key);
            }
        }

        tree.apply_batch(batch)?;

        Ok(())
    }

    fn add_label(&self, label: Label) -> Result<(), Error> {
        let (project, disassembly) = self.scope();
        let tree = self.db.open_tree(LABELS_TREE)?;
        let key = label_key(&project, &disassembly, &label);

        if !tree.contains_key(&key)? {
            tree.insert(key, encode(&label)?)?;
        }

        Ok(())
    }

    fn upsert_label(&self, label: Label) -> Result<LocationId, Error> {
        let (project, disassembly) = self.scope();
        let tree = self.db.open_tree(LABELS_TREE)?;
        let key = label_key(&project, &disassembly, &label);
        let id = label.upsert_key();

        tree.insert(key, encode(&label)?)?;

        Ok(id)
    }

    fn add_xref(&self, xref: Xref) -> Result<(), Error> {
        let (project, disassembly) = self.scope();
        let tree = self.db.open_tree(XREFS_TREE)?;
        let rest = join_parts(&[
            xref.base_sec_name.as_bytes(),
            b"\0",
            &xref.base_addr.to_be_bytes(),
            xref.ref_sec_name.as_bytes(),
            b"\0",
            &xref.ref_addr.to_be_bytes(),
        ]);
        let key = Self::scoped_key(&project, &disassembly, &rest);

        tree.insert(key, encode(&xref)?)?;

        Ok(())
    }

    fn get_sections(&self, executable: Option<bool>) -> Result<Vec<Section>, Error> {
        let (project, disassembly) = self.scope();
        let sections: Vec<Section> = self.scan_scope(SECTIONS_TREE, &project, &disassembly)?;

        Ok(sections
            .into_iter()
            .filter(|section| executable.map_or(true, |executable| section.is_executable() == executable))
            .collect())
    }

    fn get_section(&self, name: &str) -> Result<Option<Section>, Error> {
        let (project, disassembly) = self.scope();
        let tree = self.db.open_tree(SECTIONS_TREE)?;
        let key = Self::scoped_key(&project, &disassembly, name.as_bytes());

        tree.get(key)?.map(|bytes| decode(&bytes)).transpose()
    }

    fn get_section_containing_addr(&self, addr: AbsoluteAddress) -> Result<Option<Section>, Error> {
        Ok(self.get_sections(None)?.into_iter().find(|section| section.contains_addr(addr)))
    }

    fn get_functions(&self) -> Result<Vec<Function>, Error> {
        let (project, disassembly) = self.scope();
        let labels: Vec<Label> = self.scan_scope(LABELS_TREE, &project, &disassembly)?;

        Ok(labels
            .into_iter()
            .filter_map(|label| match label {
                Label::Function(function) => Some(function),
                _ => None,
            })
            .collect())
    }

    fn get_strings(&self) -> Result<Vec<StringLabel>, Error> {
        let (project, disassembly) = self.scope();
        let labels: Vec<Label> = self.scan_scope(LABELS_TREE, &project, &disassembly)?;

        Ok(labels
            .into_iter()
            .filter_map(|label| match label {
                Label::String(string) => Some(string),
                _ => None,
            })
            .collect())
    }

    fn get_locations(&self) -> Result<Vec<Location>, Error> {
        let (project, disassembly) = self.scope();
        let labels: Vec<Label> = self.scan_scope(LABELS_TREE, &project, &disassembly)?;

        Ok(labels
            .into_iter()
            .filter_map(|label| match label {
                Label::Location(location) => Some(location),
                _ => None,
            })
            .collect())
    }

    fn get_instructions(&self, sec_name: &str) -> Result<Vec<Instruction>, Error> {
        let (project, disassembly) = self.scope();
        let tree = self.db.open_tree(INSTRUCTIONS_TREE)?;
        let prefix = Self::scoped_key(&project, &disassembly, &join_parts(&[sec_name.as_bytes(), b"\0"]));
        let mut instructions = Vec::new();

        for entry in tree.scan_prefix(prefix) {
            let (_, value) = entry?;
            instructions.push(decode(&value)?);
        }

        // Keys embed `r_addr` as big-endian bytes, so `scan_prefix` already
        // yields entries address-ascending; no separate sort is needed.
        Ok(instructions)
    }

    fn get_instructions_count(&self, sec_name: &str) -> Result<usize, Error> {
        Ok(self.get_instructions(sec_name)?.len())
    }
}

fn label_key(project: &str, disassembly: &str, label: &Label) -> Vec<u8> {
    let sec_name = match label {
        Label::Function(function) => function.sec_name.as_str(),
        Label::String(string) => string.sec_name.as_str(),
        Label::Section(section) => section.name.as_str(),
        Label::Location(location) => location.sec_name.as_str(),
    };
    let kind_byte = [label.kind() as u8];
    let rest = join_parts(&[&kind_byte, sec_name.as_bytes(), b"\0", &label.upsert_key().to_be_bytes()]);

    SledStore::scoped_key(project, disassembly, &rest)
}

#[cfg(test)]
mod tests {
    use haevn_core::{Arch, Attribute, Format, Mode};

    use super::*;

    fn disassembly(name: &str) -> Disassembly {
        Disassembly {
            name: name.to_string(),
            binary_name: "a.out".to_string(),
            format: Format::Elf,
            arch: Arch::X86,
            mode: Mode::Bits64Little,
            md5: [0; 16],
            size: 0,
            entry_point: 0x1000,
        }
    }

    fn open_temp() -> SledStore {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!("haevn-storage-test-{}-{id}", std::process::id()));

        SledStore::open(dir).unwrap()
    }

    #[test]
    fn test_add_disassembly_is_idempotent() {
        let store = open_temp();
        store.load_project("proj").unwrap();

        assert!(store.add_disassembly(disassembly("main")).unwrap());
        assert!(!store.add_disassembly(disassembly("main")).unwrap());
    }

    #[test]
    fn test_instructions_round_trip_address_ascending() {
        let store = open_temp();
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
    fn test_sections_round_trip_and_filter_by_executable() {
        let store = open_temp();
        store.load_project("proj").unwrap();
        store.add_disassembly(disassembly("main")).unwrap();

        store.add_section(Section::new(".text", vec![0x90; 4], Attribute::Execute.into(), 0x1000)).unwrap();
        store.add_section(Section::new(".data", vec![0u8; 4], Attribute::Read.into(), 0x2000)).unwrap();

        assert_eq!(store.get_sections(Some(true)).unwrap().len(), 1);
        assert_eq!(store.get_sections(None).unwrap().len(), 2);
    }
}
