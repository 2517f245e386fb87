//! The shared job buffer: one contiguous, 16-byte-aligned allocation
//! holding everything workers need to read or write for a single
//! valuation job (§4.6).
//!
//! The buffer is allocated once by the driver and handed to every worker
//! by reference; workers never reallocate. Policies and assumption tables
//! are read-only after [`SharedBuffer::new`] returns. The only mutable
//! sections are the control-word region (read/written through the atomic
//! views in [`crate::scheduler`]) and the per-scenario result slots, which
//! are partitioned one-writer-per-scenario.

use crate::assumptions::Assumptions;
use crate::error::{ValuationError, ValuationResult};
use crate::policy::{loader, Policy};
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::sync::atomic::AtomicU32;

const ALIGNMENT: usize = 16;
const MAGIC: u32 = 0x5653_4C4D; // "VSLM"
const VERSION: u32 = 1;

fn round_up(n: usize, align: usize) -> usize {
    n.div_ceil(align) * align
}

/// Byte offsets of each section within the buffer, published to workers at
/// job start.
#[derive(Debug, Clone, Copy)]
pub struct SectionOffsets {
    pub header: usize,
    pub control_words: usize,
    pub policies: usize,
    pub mortality_table: usize,
    pub lapse_table: usize,
    pub expense_record: usize,
    pub result_slots: usize,
    pub distribution: Option<usize>,
}

/// Header written at offset 0: magic, version, section count, total size.
#[repr(C)]
struct Header {
    magic: u32,
    version: u32,
    section_count: u32,
    total_size: u32,
}

/// One contiguous, manually allocated region backing a single valuation
/// job. Dropped at the end of the job, freeing the allocation.
pub struct SharedBuffer {
    ptr: *mut u8,
    layout: Layout,
    offsets: SectionOffsets,
    scenario_count: usize,
    policy_count: usize,
    control_word_count: usize,
    retains_distribution: bool,
}

// The buffer's sections are either read-only after setup or partitioned
// one-writer-per-slot; concurrent access across workers is safe under
// that discipline, which callers in `scheduler` and `driver` uphold.
unsafe impl Send for SharedBuffer {}
unsafe impl Sync for SharedBuffer {}

impl SharedBuffer {
    /// Allocate and populate the shared buffer for a job with `policies`,
    /// `assumptions`, `scenario_count` scenarios, and `control_word_count`
    /// atomic control cells (one per worker deque, plus a fixed few for
    /// the progress counter and termination flag — see
    /// [`crate::scheduler`]).
    pub fn new(
        policies: &[Policy],
        assumptions: &Assumptions,
        scenario_count: usize,
        control_word_count: usize,
        retain_distribution: bool,
    ) -> ValuationResult<Self> {
        let policy_count = policies.len();

        let header_size = round_up(std::mem::size_of::<Header>(), ALIGNMENT);
        let control_size = round_up(control_word_count * 4, ALIGNMENT);
        let policies_size = round_up(policy_count * loader::RECORD_SIZE, ALIGNMENT);
        let mortality_size = round_up((crate::assumptions::MAX_AGE + 1) * 16, ALIGNMENT);
        let lapse_size = round_up(crate::assumptions::MAX_POLICY_YEAR * 8, ALIGNMENT);
        let expense_size = round_up(4 * 8, ALIGNMENT);
        let results_size = round_up(scenario_count * 8, ALIGNMENT);
        let distribution_size = if retain_distribution {
            round_up(scenario_count * 8, ALIGNMENT)
        } else {
            0
        };

        let mut offset = 0usize;
        let header_offset = offset;
        offset += header_size;
        let control_offset = offset;
        offset += control_size;
        let policies_offset = offset;
        offset += policies_size;
        let mortality_offset = offset;
        offset += mortality_size;
        let lapse_offset = offset;
        offset += lapse_size;
        let expense_offset = offset;
        offset += expense_size;
        let results_offset = offset;
        offset += results_size;
        let distribution_offset = if retain_distribution {
            let o = offset;
            offset += distribution_size;
            Some(o)
        } else {
            None
        };
        let total_size = offset;

        let layout = Layout::from_size_align(total_size.max(ALIGNMENT), ALIGNMENT)
            .map_err(|e| ValuationError::ResourceExhausted(format!("invalid buffer layout: {e}")))?;

        let ptr = unsafe { alloc_zeroed(layout) };
        if ptr.is_null() {
            return Err(ValuationError::ResourceExhausted(
                "shared buffer allocation failed".to_string(),
            ));
        }

        let offsets = SectionOffsets {
            header: header_offset,
            control_words: control_offset,
            policies: policies_offset,
            mortality_table: mortality_offset,
            lapse_table: lapse_offset,
            expense_record: expense_offset,
            result_slots: results_offset,
            distribution: distribution_offset,
        };

        let mut buffer = Self {
            ptr,
            layout,
            offsets,
            scenario_count,
            policy_count,
            control_word_count,
            retains_distribution: retain_distribution,
        };

        // Safety: all sections were just zero-allocated with the sizes
        // computed above, so every write below stays in bounds.
        unsafe {
            buffer.write_header(total_size);
            buffer.write_policies(policies);
            buffer.write_mortality(assumptions);
            buffer.write_lapse(assumptions);
            buffer.write_expense(assumptions);
        }

        Ok(buffer)
    }

    unsafe fn write_header(&mut self, total_size: usize) {
        let header = Header {
            magic: MAGIC,
            version: VERSION,
            section_count: 8,
            total_size: total_size as u32,
        };
        let dst = self.ptr.add(self.offsets.header) as *mut Header;
        dst.write(header);
    }

    unsafe fn write_policies(&mut self, policies: &[Policy]) {
        let base = self.ptr.add(self.offsets.policies);
        for (i, policy) in policies.iter().enumerate() {
            let record = loader::encode_record(policy);
            let dst = base.add(i * loader::RECORD_SIZE);
            std::ptr::copy_nonoverlapping(record.as_ptr(), dst, loader::RECORD_SIZE);
        }
    }

    unsafe fn write_mortality(&mut self, assumptions: &Assumptions) {
        let base = self.ptr.add(self.offsets.mortality_table);
        for age in 0..=crate::assumptions::MAX_AGE {
            let female = assumptions.mortality.qx(age as u8, crate::policy::Gender::Female);
            let male = assumptions.mortality.qx(age as u8, crate::policy::Gender::Male);
            let dst = base.add(age * 16) as *mut f64;
            dst.write(female);
            dst.add(1).write(male);
        }
    }

    unsafe fn write_lapse(&mut self, assumptions: &Assumptions) {
        let base = self.ptr.add(self.offsets.lapse_table) as *mut f64;
        for y in 0..crate::assumptions::MAX_POLICY_YEAR {
            base.add(y).write(assumptions.lapse.rate((y + 1) as u32));
        }
    }

    unsafe fn write_expense(&mut self, assumptions: &Assumptions) {
        let base = self.ptr.add(self.offsets.expense_record) as *mut f64;
        base.write(assumptions.expenses.acquisition);
        base.add(1).write(assumptions.expenses.maintenance);
        base.add(2).write(assumptions.expenses.percent_of_premium);
        base.add(3).write(assumptions.expenses.claim_expense);
    }

    pub fn offsets(&self) -> SectionOffsets {
        self.offsets
    }

    pub fn policy_count(&self) -> usize {
        self.policy_count
    }

    pub fn scenario_count(&self) -> usize {
        self.scenario_count
    }

    /// View of the control-word region as atomic 32-bit cells (progress
    /// counter, termination flag, per-deque state words). The scheduler is
    /// the sole writer through this view; ordering is documented per-call
    /// at the scheduler call sites.
    pub fn control_words(&self) -> &[AtomicU32] {
        unsafe {
            let base = self.ptr.add(self.offsets.control_words) as *const AtomicU32;
            std::slice::from_raw_parts(base, self.control_word_count)
        }
    }

    /// Write a scenario's NPV into its pre-assigned result slot. The
    /// caller (a worker) must be the unique owner of `scenario` for the
    /// duration of the job.
    ///
    /// # Safety
    /// Caller must guarantee exclusive access to `scenario`'s slot.
    pub unsafe fn write_result(&self, scenario: usize, value: f64) {
        debug_assert!(scenario < self.scenario_count);
        let base = self.ptr.add(self.offsets.result_slots) as *mut f64;
        base.add(scenario).write(value);
        if self.retains_distribution {
            if let Some(dist_offset) = self.offsets.distribution {
                let dist_base = self.ptr.add(dist_offset) as *mut f64;
                dist_base.add(scenario).write(value);
            }
        }
    }

    /// Read the full, dense result array in scenario order. Only valid
    /// after every worker has terminated.
    pub fn results(&self) -> &[f64] {
        unsafe {
            let base = self.ptr.add(self.offsets.result_slots) as *const f64;
            std::slice::from_raw_parts(base, self.scenario_count)
        }
    }
}

impl Drop for SharedBuffer {
    fn drop(&mut self) {
        unsafe {
            dealloc(self.ptr, self.layout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assumptions::ExpenseAssumptions;
    use crate::policy::{Gender, ProductTag, UnderwritingClass};

    fn sample_policy(id: u32) -> Policy {
        Policy::new(
            id,
            40,
            Gender::Male,
            ProductTag::Term,
            UnderwritingClass::Standard,
            100_000.0,
            1_200.0,
            20,
        )
    }

    fn sample_assumptions() -> Assumptions {
        Assumptions::flat(0.01, 0.02, ExpenseAssumptions::new(500.0, 50.0, 0.02, 100.0).unwrap())
    }

    #[test]
    fn sections_are_16_byte_aligned() {
        let policies = vec![sample_policy(1), sample_policy(2)];
        let buffer = SharedBuffer::new(&policies, &sample_assumptions(), 10, 4, false).unwrap();
        let o = buffer.offsets();
        assert_eq!(o.header % ALIGNMENT, 0);
        assert_eq!(o.control_words % ALIGNMENT, 0);
        assert_eq!(o.policies % ALIGNMENT, 0);
        assert_eq!(o.mortality_table % ALIGNMENT, 0);
        assert_eq!(o.lapse_table % ALIGNMENT, 0);
        assert_eq!(o.expense_record % ALIGNMENT, 0);
        assert_eq!(o.result_slots % ALIGNMENT, 0);
    }

    #[test]
    fn policies_round_trip_through_buffer() {
        let policies = vec![sample_policy(7), sample_policy(9)];
        let buffer = SharedBuffer::new(&policies, &sample_assumptions(), 5, 4, false).unwrap();
        let base_offset = buffer.offsets().policies;
        let raw = unsafe {
            std::slice::from_raw_parts(buffer.ptr.add(base_offset), loader::RECORD_SIZE * 2)
        };
        let decoded = loader::decode_record(raw[0..32].try_into().unwrap()).unwrap();
        assert_eq!(decoded.policy_id, 7);
    }

    #[test]
    fn result_slots_are_writable_and_readable() {
        let policies = vec![sample_policy(1)];
        let buffer = SharedBuffer::new(&policies, &sample_assumptions(), 3, 4, true).unwrap();
        unsafe {
            buffer.write_result(0, 1.5);
            buffer.write_result(1, -2.5);
            buffer.write_result(2, 3.5);
        }
        assert_eq!(buffer.results(), &[1.5, -2.5, 3.5]);
    }

    #[test]
    fn control_words_start_zeroed() {
        let policies = vec![sample_policy(1)];
        let buffer = SharedBuffer::new(&policies, &sample_assumptions(), 3, 8, false).unwrap();
        for word in buffer.control_words() {
            assert_eq!(word.load(std::sync::atomic::Ordering::Relaxed), 0);
        }
    }
}
