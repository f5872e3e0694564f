use futures_lite::future::block_on;
use haevn_core::{AbsoluteAddress, Arch, Attribute, Format, Mode, Section};
use haevn_file::{fs::File as FileReaderImpl, FileReader};
use haevn_object::elf64;
use md5::{Digest, Md5};

use crate::{BinaryFrontend, Error};

/// A binary front-end for the ELF container format.
///
/// The whole binary file is read once at construction time and immediately
/// translated into the owned [`Section`] list of `haevn-core`: there is no
/// lazy re-reading of the byte-level `haevn-object` types afterwards, which
/// is also why MD5 and size need not reopen the file as the original tool's
/// front-end did.
pub struct ElfFrontend {
    format: Format,
    arch: Option<Arch>,
    mode: Option<Mode>,
    md5: [u8; 16],
    size: u64,
    entry_point: Option<AbsoluteAddress>,
    sections: Vec<Section>,
}

impl ElfFrontend {
    /// Open `path`, read its entire contents, and parse it.
    ///
    /// The file handle (via [`haevn_file::fs::File`]) is held only for the
    /// duration of this call, since every byte needed afterwards has
    /// already been copied into the returned [`Self`].
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        let file = FileReaderImpl::open(path)?;
        let bytes = block_on(file.read_as_bytes())?;

        Ok(Self::from_bytes(&bytes))
    }

    /// Parse an in-memory buffer, without touching the filesystem. Exposed
    /// for tests and for callers that already have the bytes in hand.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let md5 = {
            let mut hasher = Md5::new();
            hasher.update(bytes);
            hasher.finalize().into()
        };
        let size = bytes.len() as u64;

        match elf64::File::read::<haevn_object::errors::SingleError>(bytes) {
            Ok((_remaining, mut file)) => {
                file.fetch_section_names();

                let endian_little = matches!(file.endianness, elf64::Endianness::Little);
                let (arch, mode) = map_machine(file.machine, endian_little)
                    .map_or((None, None), |(arch, mode)| (Some(arch), Some(mode)));

                let sections = file
                    .sections
                    .iter()
                    .filter(|section| section.r#type != elf64::SectionType::Null)
                    .map(|section| {
                        let mut attributes = enumflags2::BitFlags::from(Attribute::Read);

                        if section.flags.contains(elf64::SectionFlag::Writable) {
                            attributes |= Attribute::Write;
                        }
                        if section.flags.contains(elf64::SectionFlag::Executable) {
                            attributes |= Attribute::Execute;
                        }
                        if section.flags.contains(elf64::SectionFlag::Allocable) {
                            attributes |= Attribute::Append;
                        }

                        Section::new(
                            section.name.as_ref().map_or_else(String::new, |name| name.to_string()),
                            section.data.to_vec(),
                            attributes,
                            section.virtual_address.0,
                        )
                    })
                    .collect();

                Self {
                    format: Format::Elf,
                    arch,
                    mode,
                    md5,
                    size,
                    entry_point: file.entry_point.map(|address| address.0),
                    sections,
                }
            }

            // Unrecognized or malformed ELF: report an empty section list
            // rather than failing the whole run.
            Err(_) => Self {
                format: Format::Elf,
                arch: None,
                mode: None,
                md5,
                size,
                entry_point: None,
                sections: Vec::new(),
            },
        }
    }
}

impl BinaryFrontend for ElfFrontend {
    fn format(&self) -> Format {
        self.format
    }

    fn arch(&self) -> Option<Arch> {
        self.arch
    }

    fn mode(&self) -> Option<Mode> {
        self.mode
    }

    fn md5(&self) -> [u8; 16] {
        self.md5
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn entry_point(&self) -> Option<AbsoluteAddress> {
        self.entry_point
    }

    fn sections(&self) -> &[Section] {
        &self.sections
    }
}

/// Map an ELF `e_machine` value to an `(Arch, Mode)` pair.
fn map_machine(machine: elf64::Machine, little_endian: bool) -> Option<(Arch, Mode)> {
    use elf64::Machine;

    let bits32 = if little_endian { Mode::Bits32Little } else { Mode::Bits32Big };
    let bits64 = if little_endian { Mode::Bits64Little } else { Mode::Bits64Big };

    match machine {
        Machine::X86 => Some((Arch::X86, bits32)),
        Machine::X86_64 => Some((Arch::X86, bits64)),
        Machine::Arm => Some((Arch::Arm, bits32)),
        Machine::Aarch64 => Some((Arch::Arm64, bits64)),
        Machine::Mips => Some((Arch::Mips, bits32)),
        Machine::PowerPc => Some((Arch::Ppc, bits32)),
        Machine::PowerPc64 => Some((Arch::Ppc, bits64)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXIT_FILE: &[u8] = include_bytes!("../../object/tests/fixtures/exit_elf_amd64.o");

    #[test]
    fn test_from_bytes_recognizes_x86_64() {
        let frontend = ElfFrontend::from_bytes(EXIT_FILE);

        assert_eq!(frontend.format(), Format::Elf);
        assert_eq!(frontend.arch(), Some(Arch::X86));
        assert_eq!(frontend.mode(), Some(Mode::Bits64Little));
        assert_eq!(frontend.size(), EXIT_FILE.len() as u64);
    }

    #[test]
    fn test_from_bytes_garbage_is_not_a_crash() {
        let frontend = ElfFrontend::from_bytes(b"not an elf file");

        assert_eq!(frontend.arch(), None);
        assert_eq!(frontend.mode(), None);
        assert!(frontend.sections().is_empty());
    }

    #[test]
    fn test_map_machine_table() {
        assert_eq!(map_machine(elf64::Machine::X86, true), Some((Arch::X86, Mode::Bits32Little)));
        assert_eq!(
            map_machine(elf64::Machine::X86_64, true),
            Some((Arch::X86, Mode::Bits64Little))
        );
        assert_eq!(
            map_machine(elf64::Machine::Aarch64, false),
            Some((Arch::Arm64, Mode::Bits64Big))
        );
        assert_eq!(map_machine(elf64::Machine::Sparc, true), None);
    }
}
