use anyhow::Result;
use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use time::macros::format_description;

/// Level for the given flags. `quiet` wins over `verbose`.
pub fn level_for(verbose: bool, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Installs the terminal logger on stderr with local-time timestamps.
pub fn init_logging(verbose: bool, quiet: bool) -> Result<()> {
    let mut builder = ConfigBuilder::new();
    builder.set_time_format_custom(format_description!(
        "[hour]:[minute]:[second].[subsecond digits:3]"
    ));
    // Falls back to UTC when the local offset cannot be determined.
    let _ = builder.set_time_offset_to_local();
    builder.set_target_level(LevelFilter::Off);
    builder.set_thread_level(LevelFilter::Off);

    TermLogger::init(
        level_for(verbose, quiet),
        builder.build(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )?;
    Ok(())
}
