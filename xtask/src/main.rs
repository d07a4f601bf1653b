//! Build automation tasks for eventload
//!
//! - Generating CLI documentation from the clap definitions

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for eventload", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate CLI documentation in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<eventload::Cli>();

    let content = format!(
        r#"# eventload CLI Reference

Generated from the CLI source code. Last updated: {}.

## Overview

`eventload` loads delimited event-log files from an intake directory into a
database table, then moves each processed file to an archive directory. One
invocation is one run; a lock file keeps concurrent runs apart.

## Quick Start

```bash
# Create the target table
eventload init-schema

# Load everything waiting in ./data/incoming
eventload run

# Validate a file without loading it
eventload check ./data/incoming/events.csv
```

## Exit Codes

- `0` - run completed, or there was nothing to do
- `1` - fatal error (configuration, database, filesystem)
- `2` - another run holds the lock

## Commands

{}

## Environment Variables

- `EVENTLOAD_DATA_DIR` - base directory (default: `./data`)
- `EVENTLOAD_INTAKE_DIR` - intake directory (default: `<data>/incoming`)
- `EVENTLOAD_ARCHIVE_DIR` - archive directory (default: `<data>/archive`)
- `EVENTLOAD_LOCK_FILE` - run lock marker (default: `<data>/eventload.lock`)
- `EVENTLOAD_FILE_EXTENSION` - input file extension (default: `csv`)
- `EVENTLOAD_DELIMITER` - field delimiter (default: `,`)
- `EVENTLOAD_ON_STORE_ERROR` - `skip` or `abort` (default: `skip`)
- `DATABASE_URL` - PostgreSQL or `sqlite:` URL
- `DATABASE_TABLE` - target table (default: `event_log`)
- `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT`, `LOG_DIR` - logging

---

*To update, run `cargo run -p xtask -- generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli.md");
    fs::write(&file_path, content)?;

    println!("Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
