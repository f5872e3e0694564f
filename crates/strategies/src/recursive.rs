use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use haevn_core::{AbsoluteAddress, Arch, Instruction, Mode, Section};
use haevn_heuristics::{build_capstone, for_arch, ArchHeuristics, RawInsn};
use haevn_storage::Store;

use crate::{bitmap::VisitedBitmap, common::build_text_instruction, linear, Error};

/// Per-worker buffer size that triggers a flush to the store.
const BATCH_SIZE: usize = 300;

/// How long a worker waits on an empty queue before counting a miss.
const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Run the control-flow-following sweep over every executable section of
/// the current disassembly, seeded with `entry_points`.
///
/// Non-executable sections are decoded by the same linear rule the linear
/// strategy uses.
pub fn run(
    store: &dyn Store,
    arch: Arch,
    mode: Mode,
    entry_points: &[AbsoluteAddress],
    num_procs: usize,
    single_threaded: bool,
) -> Result<(), Error> {
    let executable = store.get_sections(Some(true))?;
    let bitmaps: HashMap<String, VisitedBitmap> =
        executable.iter().map(|section| (section.name.clone(), VisitedBitmap::new(section.bytes.len()))).collect();

    let (tx, rx) = crossbeam_channel::unbounded::<AbsoluteAddress>();

    for entry_point in entry_points {
        let _ = tx.send(*entry_point);
    }

    let worker_count = if single_threaded { 1 } else { num_procs.max(1) };
    // A small multiple of the worker count; a worker exits once its
    // consecutive empty-queue misses exceed this.
    let max_misses = worker_count.saturating_mul(3).max(3);
    let miss_counter = AtomicUsize::new(0);

    thread::scope(|scope| -> Result<(), Error> {
        let mut handles = Vec::with_capacity(worker_count);

        for _ in 0..worker_count {
            let rx = rx.clone();
            let tx = tx.clone();
            let bitmaps = &bitmaps;
            let miss_counter = &miss_counter;

            handles.push(scope.spawn(move || {
                worker_loop(store, arch, mode, bitmaps, rx, tx, miss_counter, max_misses)
            }));
        }

        // Drop this scope's own handles so the channel closes once every
        // worker has also dropped its clone, rather than relying solely on
        // the miss-counter exit path.
        drop(tx);
        drop(rx);

        for handle in handles {
            handle.join().expect("recursive strategy worker thread panicked")?;
        }

        Ok(())
    })?;

    // Finalizer: every byte the workers never reached becomes one-byte data,
    // so every section ends up fully covered.
    for section in &executable {
        let bitmap = &bitmaps[&section.name];
        let mut buffer = Vec::with_capacity(BATCH_SIZE);

        for offset in bitmap.iter_unset() {
            buffer.push(Instruction::data_byte(offset as u64, section.base_addr + offset as u64, section.bytes[offset]));

            if buffer.len() >= BATCH_SIZE {
                store.batch_add_instructions(&section.name, std::mem::take(&mut buffer))?;
            }
        }

        if !buffer.is_empty() {
            store.batch_add_instructions(&section.name, buffer)?;
        }
    }

    for section in store.get_sections(Some(false))? {
        linear::decode_data_section(store, &section)?;
    }

    Ok(())
}

fn worker_loop(
    store: &dyn Store,
    arch: Arch,
    mode: Mode,
    bitmaps: &HashMap<String, VisitedBitmap>,
    rx: Receiver<AbsoluteAddress>,
    tx: Sender<AbsoluteAddress>,
    miss_counter: &AtomicUsize,
    max_misses: usize,
) -> Result<(), Error> {
    let cs = build_capstone(arch, mode)?;
    let heuristics = for_arch(arch);
    let mut buffer: Vec<(String, Instruction)> = Vec::with_capacity(BATCH_SIZE);

    loop {
        match rx.recv_timeout(POLL_TIMEOUT) {
            Ok(target) => {
                miss_counter.store(0, Ordering::Relaxed);
                decode_from_target(store, &cs, heuristics.as_ref(), bitmaps, target, &tx, &mut buffer)?;

                if buffer.len() >= BATCH_SIZE {
                    flush(store, &mut buffer)?;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if miss_counter.fetch_add(1, Ordering::Relaxed) + 1 > max_misses {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    flush(store, &mut buffer)
}

fn flush(store: &dyn Store, buffer: &mut Vec<(String, Instruction)>) -> Result<(), Error> {
    let mut by_section: HashMap<String, Vec<Instruction>> = HashMap::new();

    for (sec_name, instruction) in buffer.drain(..) {
        by_section.entry(sec_name).or_default().push(instruction);
    }

    for (sec_name, instructions) in by_section {
        store.batch_add_instructions(&sec_name, instructions)?;
    }

    Ok(())
}

/// Decode from `target` until a stop condition is reached: an already
/// visited byte, a `ret`, a resolvable unconditional jump/call, or the end
/// of the section.
fn decode_from_target(
    store: &dyn Store,
    cs: &capstone::Capstone,
    heuristics: &dyn ArchHeuristics,
    bitmaps: &HashMap<String, VisitedBitmap>,
    target: AbsoluteAddress,
    tx: &Sender<AbsoluteAddress>,
    buffer: &mut Vec<(String, Instruction)>,
) -> Result<(), Error> {
    let Some(section) = store.get_section_containing_addr(target)? else {
        tracing::debug!(target, "recursive strategy: target is not in any section, dropping");
        return Ok(());
    };

    if !section.is_executable() {
        tracing::debug!(target, section = %section.name, "recursive strategy: target escapes text, dropping");
        return Ok(());
    }

    let Some(bitmap) = bitmaps.get(&section.name) else { return Ok(()) };
    let mut offset = (target - section.base_addr) as usize;

    while offset < section.bytes.len() {
        if bitmap.is_set(offset) {
            break;
        }

        let abs_addr = section.base_addr + offset as u64;
        let remaining = &section.bytes[offset..];

        let stall = || {
            tracing::debug!(abs_addr, "recursive strategy: decode stall, emitting one byte of data");
        };

        let Ok(insns) = cs.disasm_count(remaining, abs_addr, 1) else {
            stall();
            bitmap.set(offset);
            buffer.push((section.name.clone(), Instruction::data_byte(offset as u64, abs_addr, section.bytes[offset])));
            offset += 1;
            continue;
        };

        let Some(insn) = insns.iter().next() else {
            stall();
            bitmap.set(offset);
            buffer.push((section.name.clone(), Instruction::data_byte(offset as u64, abs_addr, section.bytes[offset])));
            offset += 1;
            continue;
        };

        let Ok(detail) = cs.insn_detail(&insn) else {
            stall();
            bitmap.set(offset);
            buffer.push((section.name.clone(), Instruction::data_byte(offset as u64, abs_addr, section.bytes[offset])));
            offset += 1;
            continue;
        };

        let insn_len = insn.bytes().len();

        // Truncated at the section boundary: treat the remaining bytes as
        // data rather than reading past the section.
        if insn_len > remaining.len() {
            stall();
            bitmap.set(offset);
            buffer.push((section.name.clone(), Instruction::data_byte(offset as u64, abs_addr, section.bytes[offset])));
            offset += 1;
            continue;
        }

        let raw = RawInsn { cs, insn: &insn, detail: &detail };

        bitmap.set_range(offset..offset + insn_len);
        let instruction = build_text_instruction(offset as u64, abs_addr, &raw, heuristics);
        buffer.push((section.name.clone(), instruction));

        if heuristics.is_conditional_jump(&raw) {
            if let Some(resolved) = resolve_target(heuristics.op_conditional_jump_option(&raw), &section, store)? {
                let _ = tx.send(resolved);
            }

            offset += insn_len;
            continue;
        }

        if heuristics.is_call(&raw) {
            if let Some(resolved) = resolve_target(heuristics.op_call_get_addr(&raw), &section, store)? {
                let _ = tx.send(resolved);
                break;
            }

            offset += insn_len;
            continue;
        }

        if heuristics.is_jump(&raw) {
            if let Some(resolved) = resolve_target(heuristics.op_jump_get_addr(&raw), &section, store)? {
                let _ = tx.send(resolved);
            }

            break;
        }

        if heuristics.is_ret(&raw) {
            break;
        }

        offset += insn_len;
    }

    Ok(())
}

/// Resolve a branch/call target to an absolute address in some executable
/// section, re-interpreting it as section-relative if the literal value
/// doesn't land in one directly.
fn resolve_target(
    raw_target: Option<i64>,
    current_section: &Section,
    store: &dyn Store,
) -> Result<Option<AbsoluteAddress>, Error> {
    let Some(raw_target) = raw_target else { return Ok(None) };
    let target = raw_target as u64;

    if store.get_section_containing_addr(target)?.is_some_and(|section| section.is_executable()) {
        return Ok(Some(target));
    }

    let reinterpreted = current_section.base_addr.wrapping_add(target);

    if store.get_section_containing_addr(reinterpreted)?.is_some_and(|section| section.is_executable()) {
        return Ok(Some(reinterpreted));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use haevn_core::{Attribute, Disassembly, Format, Section};
    use haevn_storage::MemoryStore;

    use super::*;

    fn disassembly() -> Disassembly {
        Disassembly {
            name: "main".to_string(),
            binary_name: "a.out".to_string(),
            format: Format::Elf,
            arch: Arch::X86,
            mode: Mode::Bits32Little,
            md5: [0; 16],
            size: 0,
            entry_point: 0x1000,
        }
    }

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.load_project("proj").unwrap();
        store.add_disassembly(disassembly()).unwrap();
        store
    }

    #[test]
    fn test_e2_linear_section_fully_covered_with_no_data_fill() {
        let store = seeded_store();
        store
            .add_section(Section::new(".text", vec![0x90; 16], Attribute::Execute | Attribute::Read, 0x1000))
            .unwrap();

        run(&store, Arch::X86, Mode::Bits32Little, &[0x1000], 1, true).unwrap();

        let instructions = store.get_instructions(".text").unwrap();
        assert_eq!(instructions.len(), 16);
        assert!(instructions.iter().all(|instruction| instruction.is_text && instruction.bytes.len() == 1));
    }

    #[test]
    fn test_e3_short_jump_then_data_fill_over_unreached_bytes() {
        let store = seeded_store();
        // `jmp +2` ; 2 unreachable bytes (0xcc 0xcc) ; `nop` (the jump's
        // target).
        store
            .add_section(
                Section::new(".text", vec![0xeb, 0x02, 0xcc, 0xcc, 0x90], Attribute::Execute | Attribute::Read, 0x2000),
            )
            .unwrap();

        run(&store, Arch::X86, Mode::Bits32Little, &[0x2000], 1, true).unwrap();

        let instructions = store.get_instructions(".text").unwrap();
        assert_eq!(instructions.len(), 4);

        let jmp = &instructions[0];
        assert_eq!(jmp.mnemonic, "jmp");
        assert_eq!(jmp.r_addr, 0);

        let nop = instructions.iter().find(|instruction| instruction.r_addr == 4).unwrap();
        assert_eq!(nop.mnemonic, "nop");

        let data: Vec<_> = instructions.iter().filter(|instruction| !instruction.is_text).collect();
        assert_eq!(data.len(), 2);
        assert!(data.iter().all(|instruction| instruction.bytes == vec![0xcc]));
    }

    #[test]
    fn test_target_outside_any_section_is_dropped_without_panicking() {
        let store = seeded_store();
        store
            .add_section(Section::new(".text", vec![0x90; 4], Attribute::Execute | Attribute::Read, 0x1000))
            .unwrap();

        // Entry point falls outside any section: the run should still
        // complete and data-fill the whole section.
        run(&store, Arch::X86, Mode::Bits32Little, &[0x9000], 1, true).unwrap();

        let instructions = store.get_instructions(".text").unwrap();
        assert_eq!(instructions.len(), 4);
        assert!(instructions.iter().all(|instruction| !instruction.is_text));
    }

    #[test]
    fn test_ret_stops_decoding_without_consuming_trailing_bytes() {
        let store = seeded_store();
        // `ret` followed by bytes no edge reaches.
        store
            .add_section(Section::new(".text", vec![0xc3, 0xcc, 0xcc], Attribute::Execute | Attribute::Read, 0x1000))
            .unwrap();

        run(&store, Arch::X86, Mode::Bits32Little, &[0x1000], 1, true).unwrap();

        let instructions = store.get_instructions(".text").unwrap();
        let ret = instructions.iter().find(|instruction| instruction.r_addr == 0).unwrap();
        assert_eq!(ret.mnemonic, "ret");
        assert!(ret.is_text);

        let tail: Vec<_> = instructions.iter().filter(|instruction| instruction.r_addr > 0).collect();
        assert_eq!(tail.len(), 2);
        assert!(tail.iter().all(|instruction| !instruction.is_text));
    }
}
