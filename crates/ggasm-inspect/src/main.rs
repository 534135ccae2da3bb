use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use std::path::Path;

use ggasm::image::checksum;

mod model;
use model::{load_image, sections};

#[derive(Parser, Debug)]
#[command(author, version, about = "Glulx game image inspector", long_about=None)]
struct Cli {
    /// Game image path
    #[arg(value_name = "IMAGE")]
    input: String,
    /// Output format: text or json
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,
    /// Subcommand
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List header, ROM and RAM ranges
    Sections,
    /// Print the header fields
    Header,
    /// Check magic, page alignment, length and checksum
    Verify,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat { Text, Json }

#[derive(Debug, Clone, serde::Serialize)]
struct VerifyOut { ok: bool, stored: u32, computed: u32, error: Option<String> }

fn main() -> Result<()> {
    let cli = Cli::parse();
    let img = load_image(Path::new(&cli.input))?;

    match cli.cmd {
        Command::Sections => {
            let secs = sections(&img);
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&secs)?),
                OutputFormat::Text => {
                    println!("{:<10} {:<12} {:<12} {:<6}", "name", "start", "end", "perms");
                    for s in &secs {
                        println!("{:<10} {:#010x}   {:#010x}   {:<6}", s.name, s.start, s.end, s.perms);
                    }
                }
            }
        }
        Command::Header => {
            let h = img.header();
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(h)?),
                OutputFormat::Text => {
                    println!("magic          {:#010x}", h.magic);
                    println!("version        {}.{}.{}", h.version >> 16, (h.version >> 8) & 0xFF, h.version & 0xFF);
                    println!("ramstart       {:#010x}", h.ram_start);
                    println!("extstart       {:#010x}", h.ext_start);
                    println!("endmem         {:#010x}", h.end_mem);
                    println!("stack size     {:#010x}", h.stack_size);
                    println!("start func     {:#010x}", h.start_func);
                    println!("decoding tbl   {:#010x}", h.decoding_table);
                    println!("checksum       {:#010x}", h.checksum);
                }
            }
        }
        Command::Verify => {
            let res = img.verify();
            let out = VerifyOut {
                ok: res.is_ok(),
                stored: img.header().checksum,
                computed: checksum(img.bytes()),
                error: res.as_ref().err().map(|e| e.to_string()),
            };
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&out)?),
                OutputFormat::Text => match &out.error {
                    None => println!("ok: checksum {:#010x}", out.computed),
                    Some(e) => println!("FAILED: {e}"),
                },
            }
            res?;
        }
    }

    Ok(())
}
