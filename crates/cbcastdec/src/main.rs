use std::io::{self, BufRead};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use chrono::Duration;
use clap::Parser;
use log::{info, LevelFilter};

use cbcast::{CoordinatorBuilder, LocationArbiter, MessageFormat, OctetEncoding};

mod app;
mod cli;

use cli::{Args, CliError};

fn main() {
    match cbcastdec() {
        Ok(()) => {}
        Err(cli_error) => cli_error.exit(),
    }
}

fn cbcastdec() -> Result<(), CliError> {
    // Parse options and start logging
    let args = Args::try_parse()?;
    log_setup(&args);

    // one pipeline per radio technology, sharing a location arbiter
    let octet = if args.latin1 {
        OctetEncoding::Latin1
    } else {
        OctetEncoding::Utf8
    };
    let arbiter = Arc::new(LocationArbiter::new());
    let mut gsm = CoordinatorBuilder::new(MessageFormat::Gsm)
        .with_geofence_threshold(args.threshold)
        .with_default_max_wait(args.max_wait)
        .with_octet_encoding(octet)
        .with_body_comparison(args.compare_body)
        .with_duplicate_retention(Duration::hours(24))
        .with_location_arbiter(Arc::clone(&arbiter))
        .build();
    let mut cdma = CoordinatorBuilder::new(MessageFormat::Cdma)
        .with_geofence_threshold(args.threshold)
        .with_default_max_wait(args.max_wait)
        .with_octet_encoding(octet)
        .with_body_comparison(args.compare_body)
        .with_duplicate_retention(Duration::hours(24))
        .with_location_arbiter(arbiter)
        .build();

    // file setup: locks stdin in case we need it
    let stdin = io::stdin();
    let stdin_handle = stdin.lock();
    let inbuf = file_setup(&args, stdin_handle)?;

    let rejects = app::run(
        &args,
        &mut gsm,
        &mut cdma,
        inbuf.lines().map_while(|line| line.ok()),
    );
    if rejects > 0 {
        return Err(CliError::new(
            anyhow!("{} input line(s) failed to decode", rejects),
            2,
        ));
    }

    Ok(())
}

fn log_setup(args: &Args) {
    if args.quiet {
        // no logging
        return;
    } else if std::env::var_os("RUST_LOG").is_none() {
        // parameter controls
        let log_filter = match args.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        pretty_env_logger::formatted_builder()
            .filter_module("cbcast", log_filter)
            .filter_module("cbcastdec", log_filter)
            .init();
    } else {
        // environment controls
        pretty_env_logger::init();
    }
}

fn file_setup<'stdin>(
    args: &Args,
    stdin: std::io::StdinLock<'stdin>,
) -> Result<Box<dyn io::BufRead + 'stdin>, anyhow::Error> {
    if args.input_is_stdin() {
        info!("cell broadcast decoder reading standard input");
        Ok(Box::new(io::BufReader::new(stdin)))
    } else {
        info!("cell broadcast decoder reading file: \"{}\"", &args.file);
        Ok(Box::new(io::BufReader::new(
            std::fs::File::open(&args.file)
                .with_context(|| format!("Unable to open --file \"{}\"", args.file))?,
        )))
    }
}
