/// The process/page pair currently backed by a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tenant {
    pub pid: usize,
    pub vpage: usize,
}

/// One slot of the physical frame table. Frames hold indices and policy
/// bookkeeping only; no memory contents are simulated.
#[derive(Debug, Clone, Copy, Default)]
pub struct Frame {
    pub tenant: Option<Tenant>,
    pub dirty: bool,
    /// Aging policy shift register.
    pub age_bits: u32,
    /// Instruction count at the last map or working-set refresh.
    pub last_use_inst: u64,
}

impl Frame {
    pub fn is_free(&self) -> bool {
        self.tenant.is_none()
    }

    /// Both age trackers restart when a page is mapped into the frame.
    pub fn reset_age(&mut self, now: u64) {
        self.age_bits = 0;
        self.last_use_inst = now;
    }
}
