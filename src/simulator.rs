use std::collections::VecDeque;
use std::io::{self, Write};
use std::mem::size_of;

use crate::constants::*;
use crate::frame::{Frame, Tenant};
use crate::pagers::Pager;
use crate::process::{Process, Pte};

/// One line of the instruction trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    ContextSwitch(usize),
    Exit(usize),
    Read(usize),
    Write(usize),
}

impl Instruction {
    pub fn opcode(self) -> char {
        match self {
            Instruction::ContextSwitch(_) => 'c',
            Instruction::Exit(_) => 'e',
            Instruction::Read(_) => 'r',
            Instruction::Write(_) => 'w',
        }
    }

    pub fn operand(self) -> usize {
        match self {
            Instruction::ContextSwitch(v)
            | Instruction::Exit(v)
            | Instruction::Read(v)
            | Instruction::Write(v) => v,
        }
    }
}

/// The whole simulation context: frame table, free list, process table,
/// the chosen pager and the event counters, writing simulated events to an
/// owned sink so runs can be captured byte-for-byte.
pub struct Simulator<W: Write> {
    frames: Vec<Frame>,
    free_frames: VecDeque<usize>,
    processes: Vec<Process>,
    pager: Box<dyn Pager>,
    current: Option<usize>,
    inst_count: u64,
    ctx_switches: u64,
    process_exits: u64,
    rw_count: u64,
    trace: bool,
    out: W,
}

impl<W: Write> Simulator<W> {
    pub fn new(
        num_frames: usize,
        processes: Vec<Process>,
        pager: Box<dyn Pager>,
        trace: bool,
        out: W,
    ) -> Simulator<W> {
        Simulator {
            frames: vec![Frame::default(); num_frames],
            free_frames: (0..num_frames).collect(),
            processes,
            pager,
            current: None,
            inst_count: 0,
            ctx_switches: 0,
            process_exits: 0,
            rw_count: 0,
            trace,
            out,
        }
    }

    pub fn run(&mut self, instructions: &[Instruction]) -> io::Result<()> {
        for &inst in instructions {
            self.step(inst)?;
        }
        Ok(())
    }

    pub fn step(&mut self, inst: Instruction) -> io::Result<()> {
        if self.trace {
            writeln!(self.out, "{}: ==> {} {}", self.inst_count, inst.opcode(), inst.operand())?;
        }
        self.inst_count += 1;
        match inst {
            Instruction::ContextSwitch(pid) => {
                self.current = Some(pid);
                self.ctx_switches += 1;
            }
            Instruction::Exit(pid) => {
                self.process_exit(pid)?;
                self.process_exits += 1;
            }
            Instruction::Read(vpage) => self.access(vpage, false)?,
            Instruction::Write(vpage) => self.access(vpage, true)?,
        }
        Ok(())
    }

    fn access(&mut self, vpage: usize, is_write: bool) -> io::Result<()> {
        self.rw_count += 1;
        let pid = self.current.expect("memory access before any context switch");

        if self.processes[pid].vma_covering(vpage).is_none() {
            if self.trace {
                writeln!(self.out, " SEGV")?;
            }
            self.processes[pid].stats.segv += 1;
            return Ok(());
        }

        if !self.processes[pid].page_table[vpage].present() {
            self.page_fault(pid, vpage)?;
        }

        self.processes[pid].page_table[vpage].set_referenced(true);
        if is_write {
            let pte = self.processes[pid].page_table[vpage];
            if pte.write_protect() {
                if self.trace {
                    writeln!(self.out, " SEGPROT")?;
                }
                self.processes[pid].stats.segprot += 1;
            } else {
                self.processes[pid].page_table[vpage].set_modified(true);
                self.frames[pte.frame_number()].dirty = true;
            }
        }
        Ok(())
    }

    /// Services a fault for a vpage known to be covered by a VMA of `pid`.
    fn page_fault(&mut self, pid: usize, vpage: usize) -> io::Result<()> {
        let vma = *self.processes[pid]
            .vma_covering(vpage)
            .expect("page fault outside any vma");
        {
            let pte = &mut self.processes[pid].page_table[vpage];
            pte.set_write_protect(vma.write_protected);
            pte.set_file_mapped(vma.file_mapped);
        }

        let frame_idx = self.get_frame();
        if self.frames[frame_idx].tenant.is_some() {
            self.unmap_victim(frame_idx)?;
        }

        let pte = self.processes[pid].page_table[vpage];
        if pte.file_mapped() {
            if self.trace {
                writeln!(self.out, " FIN")?;
            }
            self.processes[pid].stats.fins += 1;
        } else if pte.paged_out() {
            if self.trace {
                writeln!(self.out, " IN")?;
            }
            self.processes[pid].stats.ins += 1;
        } else {
            if self.trace {
                writeln!(self.out, " ZERO")?;
            }
            self.processes[pid].stats.zeros += 1;
        }
        self.frames[frame_idx].dirty = false;

        self.frames[frame_idx].tenant = Some(Tenant { pid, vpage });
        self.frames[frame_idx].reset_age(self.inst_count);
        let pte = &mut self.processes[pid].page_table[vpage];
        pte.set_present(true);
        pte.set_frame_number(frame_idx);
        if self.trace {
            writeln!(self.out, " MAP {}", frame_idx)?;
        }
        self.processes[pid].stats.maps += 1;
        Ok(())
    }

    fn get_frame(&mut self) -> usize {
        if let Some(idx) = self.free_frames.pop_front() {
            return idx;
        }
        let victim = self
            .pager
            .select_victim(&mut self.frames, &mut self.processes, self.inst_count);
        assert!(victim < self.frames.len(), "pager returned frame {} out of range", victim);
        victim
    }

    /// Eviction on the fault path: a dirty page goes OUT to swap or FOUT
    /// back to its file.
    fn unmap_victim(&mut self, frame_idx: usize) -> io::Result<()> {
        let Tenant { pid, vpage } = self.frames[frame_idx]
            .tenant
            .expect("unmap of a free frame");
        if self.trace {
            writeln!(self.out, " UNMAP {}:{}", pid, vpage)?;
        }
        self.processes[pid].stats.unmaps += 1;

        if self.frames[frame_idx].dirty {
            if self.processes[pid].page_table[vpage].file_mapped() {
                if self.trace {
                    writeln!(self.out, " FOUT")?;
                }
                self.processes[pid].stats.fouts += 1;
            } else {
                if self.trace {
                    writeln!(self.out, " OUT")?;
                }
                self.processes[pid].page_table[vpage].set_paged_out(true);
                self.processes[pid].stats.outs += 1;
            }
        }
        self.release(frame_idx, pid, vpage);
        Ok(())
    }

    /// Eviction on the exit path: dirty file-mapped pages still FOUT, dirty
    /// anonymous pages are discarded without an OUT.
    fn unmap_on_exit(&mut self, frame_idx: usize, pid: usize, vpage: usize) -> io::Result<()> {
        debug_assert_eq!(self.frames[frame_idx].tenant, Some(Tenant { pid, vpage }));
        if self.trace {
            writeln!(self.out, " UNMAP {}:{}", pid, vpage)?;
        }
        self.processes[pid].stats.unmaps += 1;

        if self.frames[frame_idx].dirty && self.processes[pid].page_table[vpage].file_mapped() {
            if self.trace {
                writeln!(self.out, " FOUT")?;
            }
            self.processes[pid].stats.fouts += 1;
        }
        self.release(frame_idx, pid, vpage);
        Ok(())
    }

    fn release(&mut self, frame_idx: usize, pid: usize, vpage: usize) {
        let pte = &mut self.processes[pid].page_table[vpage];
        pte.set_present(false);
        pte.set_modified(false);
        pte.set_frame_number(0);
        let frame = &mut self.frames[frame_idx];
        frame.tenant = None;
        frame.dirty = false;
    }

    fn process_exit(&mut self, pid: usize) -> io::Result<()> {
        if self.trace {
            writeln!(self.out, "EXIT current process {}", pid)?;
        }
        for vpage in 0..NUM_VIRTUAL_PAGES {
            self.processes[pid].page_table[vpage].set_paged_out(false);
            if !self.processes[pid].page_table[vpage].present() {
                continue;
            }
            let frame_idx = self.processes[pid].page_table[vpage].frame_number();
            self.unmap_on_exit(frame_idx, pid, vpage)?;
            self.free_frames.push_back(frame_idx);
        }
        Ok(())
    }

    pub fn print_page_tables(&mut self) -> io::Result<()> {
        for proc in &self.processes {
            let entries: Vec<String> = proc
                .page_table
                .iter()
                .enumerate()
                .map(|(vpage, pte)| {
                    if pte.present() {
                        format!(
                            "{}:{}{}{}",
                            vpage,
                            if pte.referenced() { "R" } else { "-" },
                            if pte.modified() { "M" } else { "-" },
                            if pte.paged_out() { "S" } else { "-" },
                        )
                    } else if pte.paged_out() {
                        "#".to_string()
                    } else {
                        "*".to_string()
                    }
                })
                .collect();
            writeln!(self.out, "PT[{}]: {}", proc.pid, entries.join(" "))?;
        }
        Ok(())
    }

    pub fn print_frame_table(&mut self) -> io::Result<()> {
        let slots: Vec<String> = self
            .frames
            .iter()
            .map(|frame| match frame.tenant {
                Some(t) => format!("{}:{}", t.pid, t.vpage),
                None => "*".to_string(),
            })
            .collect();
        writeln!(self.out, "FT: {}", slots.join(" "))
    }

    pub fn print_process_stats(&mut self) -> io::Result<()> {
        for proc in &self.processes {
            let s = &proc.stats;
            writeln!(
                self.out,
                "PROC[{}]: U={} M={} I={} O={} FI={} FO={} Z={} SV={} SP={}",
                proc.pid, s.unmaps, s.maps, s.ins, s.outs, s.fins, s.fouts, s.zeros, s.segv, s.segprot,
            )?;
        }
        Ok(())
    }

    pub fn print_summary(&mut self) -> io::Result<()> {
        writeln!(
            self.out,
            "TOTALCOST {} {} {} {} {}",
            self.inst_count,
            self.ctx_switches,
            self.process_exits,
            self.total_cost(),
            size_of::<Pte>(),
        )
    }

    pub fn total_cost(&self) -> u64 {
        self.rw_count * COST_READ_WRITE
            + self.ctx_switches * COST_CTX_SWITCH
            + self.process_exits * COST_PROCESS_EXIT
            + self.processes.iter().map(|p| p.stats.total_cost()).sum::<u64>()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    pub fn free_frames(&self) -> &VecDeque<usize> {
        &self.free_frames
    }

    pub fn inst_count(&self) -> u64 {
        self.inst_count
    }

    pub fn ctx_switches(&self) -> u64 {
        self.ctx_switches
    }

    pub fn process_exits(&self) -> u64 {
        self.process_exits
    }

    pub fn rw_count(&self) -> u64 {
        self.rw_count
    }

    /// Consumes the simulator and hands back the output sink.
    pub fn into_output(self) -> W {
        self.out
    }
}
