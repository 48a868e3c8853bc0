//! `simulate` command

use std::path::Path;

use exup_core::config::{TargetConfig, UpdateConfig};
use exup_core::flash::SpiFlashReader;
use exup_core::update::{UpdateReport, Updater};
use exup_dummy::{DummyConfig, DummyFlash, DummyInterrupts, DummyProgramMemory};

use super::{read_file, write_file, CommandError, IndicatifProgress};

/// Emulated hardware for one simulated boot
struct Bench {
    flash: DummyFlash,
    memory: DummyProgramMemory,
    irq: DummyInterrupts,
}

/// Run the engine with a compile-time page size
fn run_engine<const PAGE: usize>(
    config: UpdateConfig,
    bench: &mut Bench,
    progress: &mut IndicatifProgress,
) -> Result<UpdateReport, CommandError> {
    let mut reader = SpiFlashReader::new(&mut bench.flash);
    let mut updater = Updater::<_, _, PAGE>::new(config, &mut reader, &mut bench.memory)?;
    Ok(updater.run(&mut bench.irq, progress)?)
}

/// Boot a staged flash image on emulated hardware
pub fn run(
    target: &TargetConfig,
    input: &Path,
    app: Option<&Path>,
    output: Option<&Path>,
) -> Result<(), CommandError> {
    let image = read_file(input)?;
    let config = target.update;
    if image.len() != config.flash_size as usize {
        return Err(CommandError::ImageSize {
            size: image.len(),
            expected: config.flash_size,
        });
    }

    let program_size = target.program_size as usize;
    let memory = match app {
        Some(path) => DummyProgramMemory::with_data(
            program_size,
            target.page_size,
            config.protected_start,
            &read_file(path)?,
        ),
        None => DummyProgramMemory::new(program_size, target.page_size, config.protected_start),
    };
    let mut bench = Bench {
        flash: DummyFlash::with_data(
            DummyConfig {
                size: image.len(),
                ..Default::default()
            },
            &image,
        ),
        memory,
        irq: DummyInterrupts::new(true),
    };

    let mut progress = IndicatifProgress::new();
    let result = match target.page_size {
        128 => run_engine::<128>(config, &mut bench, &mut progress),
        256 => run_engine::<256>(config, &mut bench, &mut progress),
        512 => run_engine::<512>(config, &mut bench, &mut progress),
        1024 => run_engine::<1024>(config, &mut bench, &mut progress),
        2048 => run_engine::<2048>(config, &mut bench, &mut progress),
        4096 => run_engine::<4096>(config, &mut bench, &mut progress),
        other => Err(CommandError::PageSize(other)),
    };

    println!("SPI reads:       {}", bench.flash.reads().len());
    println!("Page erases:     {}", bench.memory.erase_count());
    println!("Halfwords:       {}", bench.memory.program_count());
    println!(
        "Interrupts:      {} after {} disable(s)",
        if bench.irq.is_enabled() { "enabled" } else { "disabled" },
        bench.irq.disable_count()
    );

    if let Some(path) = output {
        write_file(path, bench.memory.data())?;
        println!("Wrote program memory to {:?}", path);
    }

    let report = result?;
    println!(
        "Update applied:  {} records, {} data bytes, {} pages",
        report.stats.records,
        report.stats.data_bytes,
        report.pages_committed
    );
    if report.stats.discarded_bytes > 0 {
        println!(
            "Skipped:         {} bytes in the protected region",
            report.stats.discarded_bytes
        );
    }
    println!("The bootloader would now restart into the new application");
    Ok(())
}
