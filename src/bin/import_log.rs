use std::env;
use std::fs;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use tracevault::align::align;
use tracevault::splitter::split_log;
use tracevault::store::{ChannelStore, FsChannelStore, NewImport};

struct Args {
    file: String,
    data_dir: Option<String>,
    name: Option<String>,
}

fn parse_args() -> Result<Args> {
    let mut file = None;
    let mut data_dir = None;
    let mut name = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--data-dir" => data_dir = Some(args.next().context("--data-dir needs a value")?),
            "--name" => name = Some(args.next().context("--name needs a value")?),
            "--help" | "-h" => {
                println!("Usage: import-log <file> [--data-dir DIR] [--name NAME]");
                println!();
                println!("Parses a sensor log, aligns its channels and prints a summary.");
                println!("With --data-dir, the result is stored as a new import.");
                std::process::exit(0);
            }
            other if file.is_none() => file = Some(other.to_string()),
            other => bail!("unexpected argument '{other}'"),
        }
    }

    Ok(Args {
        file: file.context("usage: import-log <file> [--data-dir DIR] [--name NAME]")?,
        data_dir,
        name,
    })
}

fn run() -> Result<()> {
    let args = parse_args()?;

    println!("Reading file: {}", args.file);
    let contents = fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read '{}'", args.file))?;
    println!("File size: {} bytes", contents.len());

    let output = split_log(&contents)?;
    let summary = output.summary.clone();
    let aligned = align(output.channels);

    println!("\n=== Parse Results ===");
    println!("Rows:           {}", summary.rows_total);
    println!("Rows skipped:   {}", summary.rows_skipped);
    println!("Values dropped: {}", summary.values_dropped);
    if !summary.unit_conflicts.is_empty() {
        println!("Unit conflicts:");
        for conflict in &summary.unit_conflicts {
            println!(
                "  {}: kept '{}', rejected '{}'",
                conflict.channel_id, conflict.kept, conflict.rejected
            );
        }
    }

    let preview = aligned.summary();
    println!("\n=== Aligned Set ===");
    println!("Channels:    {}", preview.channel_count);
    println!("Data points: {}", preview.total_data_points);
    println!("Duration:    {:.3} s", preview.duration);

    println!("\n=== First 15 Channels (with units) ===");
    for (i, channel) in aligned.channels.iter().take(15).enumerate() {
        let unit_str = if channel.unit.is_empty() {
            String::new()
        } else {
            format!(" [{}]", channel.unit)
        };
        println!(
            "  {:2}. {} ({} points){}",
            i + 1,
            channel.channel_id,
            channel.len(),
            unit_str
        );
    }
    if aligned.channel_count() > 15 {
        println!("  ... and {} more channels", aligned.channel_count() - 15);
    }

    if let Some(data_dir) = args.data_dir {
        let store = FsChannelStore::open(&data_dir)
            .with_context(|| format!("failed to open store at '{data_dir}'"))?;
        let import = store.create(
            NewImport {
                name: args.name.unwrap_or_else(|| args.file.clone()),
                original_filename: args.file.clone(),
            },
            aligned,
        )?;
        println!("\nStored import {} ('{}')", import.id, import.name);
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
