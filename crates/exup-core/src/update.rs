//! Update orchestration
//!
//! [`Updater`] runs the whole attempt:
//!
//! ```text
//! Idle --footer--> Verifying --hash--> Programming --EOF--> Done
//!   \                  \                   \
//!    `-- no footer      `-- mismatch        `-- malformed/truncated/storage
//! ```
//!
//! Nothing is erased or programmed before the hash over the staged image
//! matches the footer. Programming runs inside a [`CriticalSection`].
//!
//! Pages are committed as soon as the write cursor leaves them, before the
//! EndOfFile record is seen. A failure during programming can therefore
//! leave a partially updated application; there is no rollback.

use crate::config::{ConfigError, UpdateConfig, DEFAULT_PAGE_SIZE};
use crate::critical::{CriticalSection, InterruptControl};
use crate::error::UpdateError;
use crate::flash::BlockReader;
use crate::footer::{read_footer, Footer};
use crate::hash::hash_range;
use crate::hex::{apply_image, HexParser, ParseStats};
use crate::page::PageProgrammer;
use crate::programmer::{ProgramMemory, Restart};

/// Phase of an update attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    /// Nothing read yet
    Idle,
    /// Footer accepted; hashing the staged image
    Verifying,
    /// Hash matched; parsing and programming with interrupts disabled
    Programming,
    /// Attempt finished; `success` is set only when the image was applied
    Done {
        /// Whether the new image was programmed completely
        success: bool,
    },
}

/// Observer for long-running phases
///
/// All methods default to doing nothing. Implementations must not touch the
/// external flash or program memory.
pub trait UpdateProgress {
    /// The attempt entered `state`; `image_size` is the declared image
    /// length, or 0 before the footer is known
    fn state_changed(&mut self, _state: UpdateState, _image_size: u32) {}

    /// Bytes hashed so far
    fn hash_progress(&mut self, _done: u32) {}

    /// Bytes of staged image consumed by the parser so far
    fn program_progress(&mut self, _done: u32) {}
}

impl<P: UpdateProgress + ?Sized> UpdateProgress for &mut P {
    fn state_changed(&mut self, state: UpdateState, image_size: u32) {
        (**self).state_changed(state, image_size)
    }

    fn hash_progress(&mut self, done: u32) {
        (**self).hash_progress(done)
    }

    fn program_progress(&mut self, done: u32) {
        (**self).program_progress(done)
    }
}

/// Progress observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl UpdateProgress for NoProgress {}

/// Summary of an applied update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateReport {
    /// Footer that described the image
    pub footer: Footer,
    /// Parser counters
    pub stats: ParseStats,
    /// Pages erased and programmed
    pub pages_committed: u32,
}

/// One update attempt over an external flash reader and the program memory
///
/// `PAGE` is the programming granularity of the internal flash.
pub struct Updater<
    'a,
    R: BlockReader + ?Sized,
    M: ProgramMemory + ?Sized,
    const PAGE: usize = DEFAULT_PAGE_SIZE,
> {
    config: UpdateConfig,
    reader: &'a mut R,
    memory: &'a mut M,
    state: UpdateState,
}

impl<'a, R, M, const PAGE: usize> Updater<'a, R, M, PAGE>
where
    R: BlockReader + ?Sized,
    M: ProgramMemory + ?Sized,
{
    /// Create an updater after checking `config` against the page size
    pub fn new(
        config: UpdateConfig,
        reader: &'a mut R,
        memory: &'a mut M,
    ) -> Result<Self, ConfigError> {
        config.validate(PAGE)?;
        Ok(Self {
            config,
            reader,
            memory,
            state: UpdateState::Idle,
        })
    }

    /// Current phase
    pub fn state(&self) -> UpdateState {
        self.state
    }

    /// Configuration in use
    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// Run the attempt without restarting
    ///
    /// On success the new image has been programmed. Interrupts are
    /// restored to their prior state before this returns, whatever the
    /// outcome.
    pub fn run<I, P>(
        &mut self,
        irq: &mut I,
        progress: &mut P,
    ) -> Result<UpdateReport, UpdateError>
    where
        I: InterruptControl + ?Sized,
        P: UpdateProgress + ?Sized,
    {
        self.set_state(UpdateState::Idle, 0, progress);
        let result = self.run_inner(irq, progress);
        let image_size = match &result {
            Ok(report) => report.footer.image_size,
            Err(_) => 0,
        };
        let done = UpdateState::Done {
            success: result.is_ok(),
        };
        self.set_state(done, image_size, progress);

        match &result {
            Ok(report) => log::info!(
                "update applied: {} records, {} bytes, {} pages",
                report.stats.records,
                report.stats.data_bytes,
                report.pages_committed
            ),
            Err(err) if err.is_pending() => log::warn!("update aborted: {}", err),
            Err(err) => log::info!("{}", err),
        }
        result
    }

    /// Bootloader entry point
    ///
    /// Restarts through `restart` after a successful update and so never
    /// returns `true`. Returns `false` whenever the resident application
    /// should be started unchanged.
    pub fn attempt_update<I, X>(&mut self, irq: &mut I, restart: &mut X) -> bool
    where
        I: InterruptControl + ?Sized,
        X: Restart + ?Sized,
    {
        match self.run(irq, &mut NoProgress) {
            Ok(_) => {
                log::info!("restarting");
                restart.restart()
            }
            Err(_) => false,
        }
    }

    fn set_state<P: UpdateProgress + ?Sized>(
        &mut self,
        state: UpdateState,
        image_size: u32,
        progress: &mut P,
    ) {
        log::debug!("state {:?} -> {:?}", self.state, state);
        self.state = state;
        progress.state_changed(state, image_size);
    }

    fn run_inner<I, P>(
        &mut self,
        irq: &mut I,
        progress: &mut P,
    ) -> Result<UpdateReport, UpdateError>
    where
        I: InterruptControl + ?Sized,
        P: UpdateProgress + ?Sized,
    {
        let footer = read_footer(&mut *self.reader, &self.config)?
            .ok_or(UpdateError::NoUpdatePending)?;

        self.set_state(UpdateState::Verifying, footer.image_size, progress);
        log::info!(
            "staged image: {} bytes, hash 0x{:08X}",
            footer.image_size,
            footer.image_hash
        );
        let actual = hash_range(&mut *self.reader, footer.image_size, progress)?;
        if actual != footer.image_hash {
            return Err(UpdateError::IntegrityMismatch {
                expected: footer.image_hash,
                actual,
            });
        }

        self.set_state(UpdateState::Programming, footer.image_size, progress);
        let mut parser = HexParser::new(self.config.protected_start);
        let mut pages = PageProgrammer::<M, PAGE>::new(&mut *self.memory);
        let result = {
            let _cs = CriticalSection::enter(irq);
            apply_image(
                &mut *self.reader,
                footer.image_size,
                &mut parser,
                &mut pages,
                progress,
            )
        };

        let pages_committed = pages.pages_committed();
        match result {
            Ok(stats) => Ok(UpdateReport {
                footer,
                stats,
                pages_committed,
            }),
            Err(err) => {
                if pages_committed > 0 {
                    log::warn!(
                        "{} pages already committed, application image may be inconsistent",
                        pages_committed
                    );
                }
                Err(err)
            }
        }
    }
}

/// Attempt an update with the default page size
///
/// Convenience wrapper for bootloaders: builds an [`Updater`], runs it and
/// restarts on success. An invalid `config` is logged and treated as "no
/// update".
pub fn attempt_update<R, M, I, X>(
    config: UpdateConfig,
    reader: &mut R,
    memory: &mut M,
    irq: &mut I,
    restart: &mut X,
) -> bool
where
    R: BlockReader + ?Sized,
    M: ProgramMemory + ?Sized,
    I: InterruptControl + ?Sized,
    X: Restart + ?Sized,
{
    match Updater::<R, M, DEFAULT_PAGE_SIZE>::new(config, reader, memory) {
        Ok(mut updater) => updater.attempt_update(irq, restart),
        Err(err) => {
            log::warn!("invalid update configuration: {}", err);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::flash::SliceReader;
    use crate::footer::FOOTER_LEN;
    use crate::hash::Fnv1a;
    use crate::hex::RecordError;

    const FLASH: usize = 0x2000;
    const MEM: usize = 0x2000;
    const PAGE: usize = 512;

    const SCENARIO_A: &[u8] = b":0410000001020304E2\n:00000001FF\n";

    fn config() -> UpdateConfig {
        UpdateConfig {
            flash_size: FLASH as u32,
            sector_size: 0x1000,
            protected_start: 0x1800,
            ..Default::default()
        }
    }

    fn stage(text: &[u8]) -> [u8; FLASH] {
        stage_with(text, text.len() as u32, Fnv1a::digest(text))
    }

    fn stage_with(text: &[u8], size: u32, hash: u32) -> [u8; FLASH] {
        let mut flash = [0xFF; FLASH];
        flash[..text.len()].copy_from_slice(text);
        let footer = Footer {
            image_size: size,
            image_hash: hash,
        };
        let addr = config().footer_addr() as usize;
        flash[addr..addr + FOOTER_LEN].copy_from_slice(&footer.encode(&config().magic));
        flash
    }

    /// Program memory emulation with operation counters
    struct Nvm {
        data: [u8; MEM],
        erases: u32,
        programs: u32,
    }

    impl Nvm {
        fn new() -> Self {
            Self {
                data: [0x5A; MEM],
                erases: 0,
                programs: 0,
            }
        }

        fn touched(&self) -> bool {
            self.erases + self.programs > 0
        }
    }

    impl ProgramMemory for Nvm {
        fn erase_page(&mut self, base: u32) -> Result<()> {
            let base = base as usize;
            let page = self
                .data
                .get_mut(base..base + PAGE)
                .ok_or(Error::AddressOutOfBounds)?;
            page.fill(0xFF);
            self.erases += 1;
            Ok(())
        }

        fn program_halfword(&mut self, addr: u32, value: u16) -> Result<()> {
            let addr = addr as usize;
            let cells = self
                .data
                .get_mut(addr..addr + 2)
                .ok_or(Error::AddressOutOfBounds)?;
            let [lo, hi] = value.to_le_bytes();
            cells[0] &= lo;
            cells[1] &= hi;
            self.programs += 1;
            Ok(())
        }
    }

    /// Reader that records how much was read and where
    struct Tracking<'a> {
        inner: SliceReader<'a>,
        reads: u32,
        highest: u32,
        lowest: u32,
    }

    impl<'a> Tracking<'a> {
        fn new(data: &'a [u8]) -> Self {
            Self {
                inner: SliceReader::new(data),
                reads: 0,
                highest: 0,
                lowest: u32::MAX,
            }
        }
    }

    impl BlockReader for Tracking<'_> {
        fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
            self.reads += 1;
            self.lowest = self.lowest.min(addr);
            self.highest = self.highest.max(addr + buf.len() as u32);
            self.inner.read(addr, buf)
        }
    }

    struct Flag {
        enabled: bool,
        disables: u32,
    }

    impl Flag {
        fn enabled() -> Self {
            Self {
                enabled: true,
                disables: 0,
            }
        }
    }

    impl InterruptControl for Flag {
        type State = bool;

        fn save_and_disable(&mut self) -> bool {
            let prior = self.enabled;
            self.enabled = false;
            self.disables += 1;
            prior
        }

        fn restore(&mut self, state: bool) {
            self.enabled = state;
        }
    }

    struct PanicRestart;

    impl Restart for PanicRestart {
        fn restart(&mut self) -> ! {
            panic!("restart requested")
        }
    }

    /// Records the sequence of states
    #[derive(Default)]
    struct States {
        seen: heapless::Vec<UpdateState, 8>,
        hashed: u32,
    }

    impl UpdateProgress for States {
        fn state_changed(&mut self, state: UpdateState, _image_size: u32) {
            let _ = self.seen.push(state);
        }

        fn hash_progress(&mut self, done: u32) {
            self.hashed = done;
        }
    }

    fn run(
        flash: &[u8],
        nvm: &mut Nvm,
        irq: &mut Flag,
    ) -> core::result::Result<UpdateReport, UpdateError> {
        let mut reader = SliceReader::new(flash);
        let mut updater = Updater::<_, _, PAGE>::new(config(), &mut reader, nvm).unwrap();
        updater.run(irq, &mut NoProgress)
    }

    #[test]
    fn test_scenario_a_applies() {
        let flash = stage(SCENARIO_A);
        assert_eq!(SCENARIO_A.len(), 32);
        let mut nvm = Nvm::new();
        let mut irq = Flag::enabled();

        let report = run(&flash, &mut nvm, &mut irq).unwrap();
        assert_eq!(report.footer.image_size, 32);
        assert_eq!(report.stats.data_bytes, 4);
        assert_eq!(report.pages_committed, 1);
        assert_eq!(&nvm.data[0x1000..0x1004], &[1, 2, 3, 4]);
        assert!(nvm.data[0x1004..0x1200].iter().all(|&b| b == 0xFF));
        // Untouched pages keep their old content
        assert_eq!(nvm.data[0x0FFF], 0x5A);
        assert_eq!(nvm.data[0x1200], 0x5A);
        assert!(irq.enabled);
        assert_eq!(irq.disables, 1);
    }

    #[test]
    #[should_panic(expected = "restart requested")]
    fn test_scenario_a_restarts() {
        let flash = stage(SCENARIO_A);
        let mut reader = SliceReader::new(&flash);
        let mut nvm = Nvm::new();
        let mut updater = Updater::<_, _, PAGE>::new(config(), &mut reader, &mut nvm).unwrap();
        updater.attempt_update(&mut Flag::enabled(), &mut PanicRestart);
    }

    #[test]
    fn test_scenario_b_checksum_aborts() {
        let text = b":0410000001020305E2\n:00000001FF\n";
        let flash = stage(text);
        let mut nvm = Nvm::new();
        let mut irq = Flag::enabled();

        let err = run(&flash, &mut nvm, &mut irq).unwrap_err();
        assert_eq!(
            err,
            UpdateError::MalformedRecord(RecordError::ChecksumMismatch { sum: 0x01 })
        );
        assert!(!nvm.touched());
        assert_eq!(nvm.data[0x1000], 0x5A);
        assert!(irq.enabled);
    }

    #[test]
    fn test_scenario_d_protected_skipped() {
        // 0x1800 is the protected start in this configuration
        let text = b":021800001122B3\n:00000001FF\n";
        let flash = stage(text);
        let mut nvm = Nvm::new();

        let report = run(&flash, &mut nvm, &mut Flag::enabled()).unwrap();
        assert_eq!(report.stats.discarded_bytes, 2);
        assert_eq!(report.pages_committed, 0);
        assert!(!nvm.touched());
    }

    #[test]
    fn test_wrong_magic_reads_only_footer() {
        let mut flash = stage(SCENARIO_A);
        let addr = config().footer_addr() as usize;
        flash[addr] = b'X';
        let mut reader = Tracking::new(&flash);
        let mut nvm = Nvm::new();

        let mut updater = Updater::<_, _, PAGE>::new(config(), &mut reader, &mut nvm).unwrap();
        assert!(!updater.attempt_update(&mut Flag::enabled(), &mut PanicRestart));
        assert_eq!(updater.state(), UpdateState::Done { success: false });

        assert_eq!(reader.reads, 1);
        assert_eq!(reader.lowest, addr as u32);
        assert_eq!(reader.highest, (addr + FOOTER_LEN) as u32);
        assert!(!nvm.touched());
    }

    #[test]
    fn test_blank_flash_is_not_pending() {
        let flash = [0xFFu8; FLASH];
        let mut nvm = Nvm::new();
        let err = run(&flash, &mut nvm, &mut Flag::enabled()).unwrap_err();
        assert_eq!(err, UpdateError::NoUpdatePending);
        assert!(!err.is_pending());
    }

    #[test]
    fn test_hash_mismatch_no_programming() {
        let hash = Fnv1a::digest(SCENARIO_A) ^ 1;
        let flash = stage_with(SCENARIO_A, SCENARIO_A.len() as u32, hash);
        let mut nvm = Nvm::new();
        let mut irq = Flag::enabled();

        let err = run(&flash, &mut nvm, &mut irq).unwrap_err();
        assert!(matches!(err, UpdateError::IntegrityMismatch { .. }));
        assert!(!nvm.touched());
        assert_eq!(irq.disables, 0);
    }

    #[test]
    fn test_bit_flip_in_later_record() {
        // First record lands in page 0x000, second in page 0x200 with a bad checksum
        let text = b":0100000011EE\n:0102000022DC\n:00000001FF\n";
        let flash = stage(text);
        let mut nvm = Nvm::new();
        let mut irq = Flag::enabled();

        let err = run(&flash, &mut nvm, &mut irq).unwrap_err();
        assert!(matches!(err, UpdateError::MalformedRecord(_)));
        // Page 0 was never left, so it was never committed
        assert!(!nvm.touched());
        assert!(irq.enabled);
    }

    #[test]
    fn test_checksum_error_after_commit() {
        // Moving to page 0x200 commits page 0x000, then the third record is
        // corrupt before any of its bytes reach the page buffer
        let text = b":0100000011EE\n:0102000022DB\n:0104000033C9\n:00000001FF\n";
        let flash = stage(text);
        let mut nvm = Nvm::new();
        let mut irq = Flag::enabled();

        let err = run(&flash, &mut nvm, &mut irq).unwrap_err();
        assert!(matches!(
            err,
            UpdateError::MalformedRecord(RecordError::ChecksumMismatch { .. })
        ));
        assert_eq!(nvm.erases, 1);
        assert_eq!(nvm.programs, (PAGE / 2) as u32);
        assert_eq!(nvm.data[0x000], 0x11);
        assert!(nvm.data[0x001..0x200].iter().all(|&b| b == 0xFF));
        // Page 0x200 was buffered but never committed
        assert!(nvm.data[0x200..].iter().all(|&b| b == 0x5A));
        assert!(irq.enabled);
    }

    #[test]
    fn test_failure_after_commit_keeps_earlier_pages() {
        let text = b":0100000011EE\n:0102000022DB\n:0100000033CC\n";
        let flash = stage(text);
        let mut nvm = Nvm::new();
        let mut irq = Flag::enabled();

        let err = run(&flash, &mut nvm, &mut irq).unwrap_err();
        assert_eq!(err, UpdateError::TruncatedImage);
        // Page 0x000 committed when the cursor moved, page 0x200 when it
        // moved back, page 0x000 again by the final flush
        assert_eq!(nvm.erases, 3);
        assert_eq!(nvm.data[0x200], 0x22);
        assert_eq!(nvm.data[0x000], 0x33);
        assert!(irq.enabled);
    }

    #[test]
    fn test_revisited_page_keeps_only_later_bytes() {
        let text = b":0100000011EE\n:0102000022DB\n:0100010033CB\n:00000001FF\n";
        let flash = stage(text);
        let mut nvm = Nvm::new();

        let report = run(&flash, &mut nvm, &mut Flag::enabled()).unwrap();
        assert_eq!(report.pages_committed, 3);
        // The second commit of page 0x000 starts from a fresh 0xFF buffer
        assert_eq!(nvm.data[0x000], 0xFF);
        assert_eq!(nvm.data[0x001], 0x33);
        assert_eq!(nvm.data[0x200], 0x22);
    }

    #[test]
    fn test_truncated_image() {
        let text = b":0410000001020304E2\n";
        let flash = stage(text);
        let mut nvm = Nvm::new();
        let err = run(&flash, &mut nvm, &mut Flag::enabled()).unwrap_err();
        assert_eq!(err, UpdateError::TruncatedImage);
        assert_eq!(&nvm.data[0x1000..0x1004], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_idempotent() {
        let flash = stage(SCENARIO_A);
        let mut nvm = Nvm::new();
        run(&flash, &mut nvm, &mut Flag::enabled()).unwrap();
        let first = nvm.data;
        run(&flash, &mut nvm, &mut Flag::enabled()).unwrap();
        assert_eq!(nvm.data, first);
    }

    #[test]
    fn test_storage_error_restores_interrupts() {
        // Target page lies beyond the emulated memory
        let text = b":020000040001F9\n:01000400AA51\n:00000001FF\n";
        let config = UpdateConfig {
            protected_start: 0x20000,
            ..config()
        };
        let flash = stage(text);
        let mut reader = SliceReader::new(&flash);
        let mut nvm = Nvm::new();
        let mut irq = Flag::enabled();
        let mut updater = Updater::<_, _, PAGE>::new(config, &mut reader, &mut nvm).unwrap();

        let err = updater.run(&mut irq, &mut NoProgress).unwrap_err();
        assert_eq!(err, UpdateError::Storage(Error::AddressOutOfBounds));
        assert!(irq.enabled);
    }

    #[test]
    fn test_state_sequence() {
        let flash = stage(SCENARIO_A);
        let mut reader = SliceReader::new(&flash);
        let mut nvm = Nvm::new();
        let mut states = States::default();
        let mut updater = Updater::<_, _, PAGE>::new(config(), &mut reader, &mut nvm).unwrap();
        assert_eq!(updater.state(), UpdateState::Idle);

        updater.run(&mut Flag::enabled(), &mut states).unwrap();
        assert_eq!(
            states.seen.as_slice(),
            &[
                UpdateState::Idle,
                UpdateState::Verifying,
                UpdateState::Programming,
                UpdateState::Done { success: true }
            ]
        );
        assert_eq!(states.hashed, 32);
        assert_eq!(updater.state(), UpdateState::Done { success: true });
    }

    #[test]
    fn test_failed_attempt_ends_unsuccessful() {
        let hash = Fnv1a::digest(SCENARIO_A) ^ 1;
        let flash = stage_with(SCENARIO_A, SCENARIO_A.len() as u32, hash);
        let mut reader = SliceReader::new(&flash);
        let mut nvm = Nvm::new();
        let mut states = States::default();
        let mut updater = Updater::<_, _, PAGE>::new(config(), &mut reader, &mut nvm).unwrap();

        assert!(updater.run(&mut Flag::enabled(), &mut states).is_err());
        assert_eq!(
            states.seen.as_slice(),
            &[
                UpdateState::Idle,
                UpdateState::Verifying,
                UpdateState::Done { success: false }
            ]
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let flash = stage(SCENARIO_A);
        let mut reader = SliceReader::new(&flash);
        let mut nvm = Nvm::new();
        let bad = UpdateConfig {
            protected_start: 0x1801,
            ..config()
        };
        assert!(!attempt_update(
            bad,
            &mut reader,
            &mut nvm,
            &mut Flag::enabled(),
            &mut PanicRestart
        ));
        assert!(Updater::<_, _, PAGE>::new(bad, &mut reader, &mut nvm).is_err());
        assert!(!nvm.touched());
    }
}
