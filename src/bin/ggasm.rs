use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ggasm::{assemble_file, report, AsmConfig, AsmError, ObjectFile};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Assemble a Glulx game image"
)]
struct Opts {
    /// Assembly source to read
    #[arg(value_name = "INFILE")]
    input: PathBuf,
    /// Game file to write
    #[arg(value_name = "OUTFILE")]
    output: PathBuf,
    /// Write code, symbol and string dumps into this directory
    #[arg(long, value_name = "DIR")]
    reports: Option<PathBuf>,
    /// JSON assembler config
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Stack size in bytes (overrides config)
    #[arg(long)]
    stack_size: Option<u32>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let opts = Opts::parse();
    let mut cfg = match &opts.config {
        Some(path) => AsmConfig::from_json_file(path)?,
        None => AsmConfig::default(),
    };
    if let Some(size) = opts.stack_size {
        cfg.stack_size = size;
    }

    let mut obj = ObjectFile::new(&cfg);
    if let Err(e) = assemble_file(&mut obj, &opts.input) {
        report_errors(&e);
        anyhow::bail!("errors occurred during assembly of {}", opts.input.display());
    }

    let built = obj.build();
    if let Some(dir) = &opts.reports {
        write_reports(&obj, dir)?;
    }
    let img = built?;
    std::fs::write(&opts.output, img.bytes())
        .with_context(|| format!("writing {}", opts.output.display()))?;
    info!(
        "wrote {} ({} bytes)",
        opts.output.display(),
        img.bytes().len()
    );
    Ok(())
}

fn report_errors(e: &AsmError) {
    match e {
        AsmError::Aborted { errors } => {
            for e in errors {
                error!("{e}");
            }
        }
        other => error!("{other}"),
    }
}

fn write_reports(obj: &ObjectFile, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let files = [
        ("codedump.txt", report::dump_code(obj)),
        (
            "symbols.txt",
            format!(
                "{}\n{}",
                report::dump_symbols(obj),
                report::dump_constants(obj)
            ),
        ),
        ("strings.txt", report::dump_strings(obj)),
    ];
    for (name, text) in files {
        let path = dir.join(name);
        std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}
