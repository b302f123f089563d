use crate::constants::{NRU_RESET_INTERVAL, TAU};
use crate::frame::Frame;
use crate::process::{Process, Pte};
use crate::rand_generator::RandGenerator;

/// A page-replacement policy. `select_victim` is only ever invoked when the
/// free list is empty, so every frame is occupied. Policies may read and
/// clear the referenced bit of tenant PTEs and maintain the per-frame
/// `age_bits` / `last_use_inst` fields; everything else belongs to the
/// simulator.
pub trait Pager {
    fn select_victim(&mut self, frames: &mut [Frame], processes: &mut [Process], now: u64) -> usize;
}

fn tenant_pte<'a>(frame: &Frame, processes: &'a mut [Process]) -> &'a mut Pte {
    let tenant = frame.tenant.expect("pager invoked with a free frame");
    &mut processes[tenant.pid].page_table[tenant.vpage]
}

pub struct FifoPager {
    hand: usize,
}

impl FifoPager {
    pub fn new() -> FifoPager {
        FifoPager { hand: 0 }
    }
}

impl Default for FifoPager {
    fn default() -> Self {
        Self::new()
    }
}

impl Pager for FifoPager {
    fn select_victim(&mut self, frames: &mut [Frame], _processes: &mut [Process], _now: u64) -> usize {
        let victim = self.hand;
        self.hand = (self.hand + 1) % frames.len();
        victim
    }
}

pub struct RandomPager {
    randgen: RandGenerator,
}

impl RandomPager {
    pub fn new(randgen: RandGenerator) -> RandomPager {
        RandomPager { randgen }
    }
}

impl Pager for RandomPager {
    fn select_victim(&mut self, frames: &mut [Frame], _processes: &mut [Process], _now: u64) -> usize {
        self.randgen.next_in(frames.len()) - 1
    }
}

pub struct ClockPager {
    hand: usize,
}

impl ClockPager {
    pub fn new() -> ClockPager {
        ClockPager { hand: 0 }
    }
}

impl Default for ClockPager {
    fn default() -> Self {
        Self::new()
    }
}

impl Pager for ClockPager {
    fn select_victim(&mut self, frames: &mut [Frame], processes: &mut [Process], _now: u64) -> usize {
        // Terminates within one full revolution: every pass over a
        // referenced frame clears its bit.
        loop {
            let idx = self.hand;
            self.hand = (self.hand + 1) % frames.len();
            let pte = tenant_pte(&frames[idx], processes);
            if !pte.referenced() {
                return idx;
            }
            pte.set_referenced(false);
        }
    }
}

/// Enhanced second chance: frames are classified by (referenced, modified)
/// into classes 0..3 and the first frame of the lowest non-empty class wins.
pub struct NruPager {
    hand: usize,
    last_reset: u64,
}

impl NruPager {
    pub fn new() -> NruPager {
        NruPager { hand: 0, last_reset: 0 }
    }
}

impl Default for NruPager {
    fn default() -> Self {
        Self::new()
    }
}

impl Pager for NruPager {
    fn select_victim(&mut self, frames: &mut [Frame], processes: &mut [Process], now: u64) -> usize {
        let n = frames.len();
        let reset = now - self.last_reset >= NRU_RESET_INTERVAL;
        if reset {
            self.last_reset = now;
        }

        let mut class_first: [Option<usize>; 4] = [None; 4];
        for i in 0..n {
            let idx = (self.hand + i) % n;
            let pte = tenant_pte(&frames[idx], processes);
            let class = (pte.referenced() as usize) * 2 + pte.modified() as usize;
            if class_first[class].is_none() {
                class_first[class] = Some(idx);
            }
            if reset {
                pte.set_referenced(false);
            }
            // A reset pass must visit every frame; otherwise class 0 ends
            // the scan as soon as it shows up.
            if !reset && class_first[0].is_some() {
                break;
            }
        }

        let victim = class_first
            .iter()
            .copied()
            .flatten()
            .next()
            .expect("nru scan over occupied frames found no candidate");
        self.hand = (victim + 1) % n;
        victim
    }
}

pub struct AgingPager {
    hand: usize,
}

impl AgingPager {
    pub fn new() -> AgingPager {
        AgingPager { hand: 0 }
    }
}

impl Default for AgingPager {
    fn default() -> Self {
        Self::new()
    }
}

impl Pager for AgingPager {
    fn select_victim(&mut self, frames: &mut [Frame], processes: &mut [Process], _now: u64) -> usize {
        // Age every occupied frame in table order before picking.
        for frame in frames.iter_mut() {
            if frame.is_free() {
                continue;
            }
            frame.age_bits >>= 1;
            let pte = tenant_pte(frame, processes);
            if pte.referenced() {
                frame.age_bits |= 0x8000_0000;
                pte.set_referenced(false);
            }
        }

        let n = frames.len();
        let mut victim = self.hand;
        for i in 0..n {
            let idx = (self.hand + i) % n;
            if frames[idx].age_bits < frames[victim].age_bits {
                victim = idx;
            }
        }

        frames[victim].age_bits = 0;
        self.hand = (victim + 1) % n;
        victim
    }
}

pub struct WorkingSetPager {
    hand: usize,
}

impl WorkingSetPager {
    pub fn new() -> WorkingSetPager {
        WorkingSetPager { hand: 0 }
    }
}

impl Default for WorkingSetPager {
    fn default() -> Self {
        Self::new()
    }
}

impl Pager for WorkingSetPager {
    fn select_victim(&mut self, frames: &mut [Frame], processes: &mut [Process], now: u64) -> usize {
        let n = frames.len();
        // Fallback tracks the frame with the largest age seen so far, first
        // one wins ties. Keep it that way: reference traces depend on it.
        let mut fallback: Option<(usize, u64)> = None;

        for i in 0..n {
            let idx = (self.hand + i) % n;
            let frame = &mut frames[idx];
            let pte = tenant_pte(frame, processes);
            if pte.referenced() {
                pte.set_referenced(false);
                frame.last_use_inst = now;
            }

            let temp_age = now - frame.last_use_inst;
            if temp_age > TAU {
                self.hand = (idx + 1) % n;
                return idx;
            }
            match fallback {
                Some((_, oldest)) if temp_age <= oldest => {}
                _ => fallback = Some((idx, temp_age)),
            }
        }

        let victim = fallback.map_or(self.hand, |(idx, _)| idx);
        self.hand = (victim + 1) % n;
        victim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Tenant;
    use crate::process::Vma;

    /// One process with vpages 0..n each mapped to the same-numbered frame.
    fn setup(n: usize) -> (Vec<Frame>, Vec<Process>) {
        let vma = Vma { start_vpage: 0, end_vpage: 63, write_protected: false, file_mapped: false };
        let mut processes = vec![Process::new(0, vec![vma])];
        let mut frames = vec![Frame::default(); n];
        for (i, frame) in frames.iter_mut().enumerate() {
            frame.tenant = Some(Tenant { pid: 0, vpage: i });
            let pte = &mut processes[0].page_table[i];
            pte.set_present(true);
            pte.set_frame_number(i);
        }
        (frames, processes)
    }

    fn set_referenced(processes: &mut [Process], vpage: usize, v: bool) {
        processes[0].page_table[vpage].set_referenced(v);
    }

    #[test]
    fn fifo_cycles_through_frames() {
        let (mut frames, mut processes) = setup(3);
        let mut pager = FifoPager::new();
        assert_eq!(pager.select_victim(&mut frames, &mut processes, 0), 0);
        assert_eq!(pager.select_victim(&mut frames, &mut processes, 0), 1);
        assert_eq!(pager.select_victim(&mut frames, &mut processes, 0), 2);
        assert_eq!(pager.select_victim(&mut frames, &mut processes, 0), 0);
    }

    #[test]
    fn random_consumes_one_value_per_call() {
        let (mut frames, mut processes) = setup(4);
        let mut pager = RandomPager::new(RandGenerator::new(vec![6, 0, 3]));
        assert_eq!(pager.select_victim(&mut frames, &mut processes, 0), 2);
        assert_eq!(pager.select_victim(&mut frames, &mut processes, 0), 0);
        assert_eq!(pager.select_victim(&mut frames, &mut processes, 0), 3);
        // table wraps
        assert_eq!(pager.select_victim(&mut frames, &mut processes, 0), 2);
    }

    #[test]
    fn clock_skips_and_clears_referenced_frames() {
        let (mut frames, mut processes) = setup(3);
        let mut pager = ClockPager::new();
        set_referenced(&mut processes, 0, true);
        set_referenced(&mut processes, 1, true);

        assert_eq!(pager.select_victim(&mut frames, &mut processes, 0), 2);
        assert!(!processes[0].page_table[0].referenced());
        assert!(!processes[0].page_table[1].referenced());
    }

    #[test]
    fn clock_with_all_referenced_takes_one_revolution() {
        let (mut frames, mut processes) = setup(3);
        let mut pager = ClockPager::new();
        for v in 0..3 {
            set_referenced(&mut processes, v, true);
        }

        // One full revolution clears everything, the second pass stops at
        // the frame where the hand started.
        assert_eq!(pager.select_victim(&mut frames, &mut processes, 0), 0);
        // Hand ended one past the victim.
        assert_eq!(pager.select_victim(&mut frames, &mut processes, 0), 1);
    }

    #[test]
    fn nru_picks_lowest_class_and_exits_early() {
        let (mut frames, mut processes) = setup(4);
        let mut pager = NruPager::new();
        // classes: f0 = 3 (R,M), f1 = 2 (R,-), f2 = 1 (-,M), f3 = 0 (-,-)
        set_referenced(&mut processes, 0, true);
        processes[0].page_table[0].set_modified(true);
        set_referenced(&mut processes, 1, true);
        processes[0].page_table[2].set_modified(true);

        assert_eq!(pager.select_victim(&mut frames, &mut processes, 10), 3);
        // No reset happened, so referenced bits survive the scan.
        assert!(processes[0].page_table[0].referenced());
        assert!(processes[0].page_table[1].referenced());
    }

    #[test]
    fn nru_falls_back_to_next_class_when_no_class_zero() {
        let (mut frames, mut processes) = setup(3);
        let mut pager = NruPager::new();
        set_referenced(&mut processes, 0, true);
        processes[0].page_table[0].set_modified(true);
        set_referenced(&mut processes, 1, true);
        set_referenced(&mut processes, 2, true);
        processes[0].page_table[2].set_modified(true);

        // Lowest non-empty class is 2, first member is frame 1.
        assert_eq!(pager.select_victim(&mut frames, &mut processes, 10), 1);
    }

    #[test]
    fn nru_reset_pass_scans_everything_and_clears_referenced() {
        let (mut frames, mut processes) = setup(4);
        let mut pager = NruPager::new();
        set_referenced(&mut processes, 0, true);
        set_referenced(&mut processes, 1, true);

        // now - last_reset >= 48 forces the reset pass.
        assert_eq!(pager.select_victim(&mut frames, &mut processes, 48), 2);
        for v in 0..4 {
            assert!(!processes[0].page_table[v].referenced());
        }

        // Classification used the pre-reset bits; immediately after the
        // reset everything is class 0 and the hand frame wins.
        assert_eq!(pager.select_victim(&mut frames, &mut processes, 49), 3);
    }

    #[test]
    fn aging_shifts_and_merges_referenced_bit() {
        let (mut frames, mut processes) = setup(3);
        frames[0].age_bits = 0b100;
        frames[1].age_bits = 0b010;
        frames[2].age_bits = 0b001;
        set_referenced(&mut processes, 1, true);
        let mut pager = AgingPager::new();

        // After aging: f0 = 0b10, f1 = 0x80000001, f2 = 0.
        assert_eq!(pager.select_victim(&mut frames, &mut processes, 0), 2);
        assert_eq!(frames[0].age_bits, 0b10);
        assert_eq!(frames[1].age_bits, 0x8000_0001);
        assert_eq!(frames[2].age_bits, 0);
        assert!(!processes[0].page_table[1].referenced());
    }

    #[test]
    fn aging_breaks_ties_at_the_hand() {
        let (mut frames, mut processes) = setup(3);
        let mut pager = AgingPager::new();

        // All ages equal: scan starts at hand 0, frame 0 wins.
        assert_eq!(pager.select_victim(&mut frames, &mut processes, 0), 0);
        // Still all equal; hand moved to 1, so frame 1 wins now.
        assert_eq!(pager.select_victim(&mut frames, &mut processes, 0), 1);
    }

    #[test]
    fn working_set_returns_first_frame_over_tau() {
        let (mut frames, mut processes) = setup(3);
        let mut pager = WorkingSetPager::new();
        frames[0].last_use_inst = 100;
        frames[1].last_use_inst = 10; // age 90 at now=100... over TAU
        frames[2].last_use_inst = 20;

        let now = 100;
        assert_eq!(pager.select_victim(&mut frames, &mut processes, now), 1);
        // Early return: frame 2 was never inspected, hand sits past victim.
        assert_eq!(frames[2].last_use_inst, 20);
    }

    #[test]
    fn working_set_refreshes_referenced_frames() {
        let (mut frames, mut processes) = setup(2);
        let mut pager = WorkingSetPager::new();
        frames[0].last_use_inst = 1;
        frames[1].last_use_inst = 5;
        set_referenced(&mut processes, 0, true);

        // Frame 0 is referenced: refreshed instead of evicted despite its
        // age; frame 1 is unreferenced but under TAU, so it becomes the
        // largest-age fallback.
        let now = 40;
        assert_eq!(pager.select_victim(&mut frames, &mut processes, now), 1);
        assert_eq!(frames[0].last_use_inst, now);
        assert!(!processes[0].page_table[0].referenced());
    }

    #[test]
    fn working_set_fallback_prefers_largest_age_first_seen() {
        let (mut frames, mut processes) = setup(3);
        let mut pager = WorkingSetPager::new();
        let now = 50;
        frames[0].last_use_inst = 20; // age 30
        frames[1].last_use_inst = 10; // age 40, the oldest under TAU
        frames[2].last_use_inst = 10; // age 40 again, seen later

        assert_eq!(pager.select_victim(&mut frames, &mut processes, now), 1);
    }
}
