//! Man page generator for hidflash
//!
//! Usage: cargo run --bin gen-manpage -- [output-dir]
//!
//! Writes one page for the top-level command and one per subcommand.

use clap::CommandFactory;
use std::fs;
use std::path::{Path, PathBuf};

#[path = "../cli.rs"]
#[allow(dead_code)]
mod cli;

fn render(man: clap_mangen::Man, output_path: &Path) -> std::io::Result<()> {
    let mut buffer = Vec::new();
    man.render(&mut buffer)?;
    fs::write(output_path, buffer)?;
    println!("Generated {}", output_path.display());
    Ok(())
}

fn main() -> std::io::Result<()> {
    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));

    fs::create_dir_all(&output_dir)?;

    let cmd = cli::Cli::command();
    for sub in cmd.get_subcommands() {
        let name = format!("hidflash-{}", sub.get_name());
        let man = clap_mangen::Man::new(sub.clone()).title(name.clone());
        render(man, &output_dir.join(format!("{}.1", name)))?;
    }
    render(clap_mangen::Man::new(cmd), &output_dir.join("hidflash.1"))?;

    println!("\nTo view: man -l {}", output_dir.join("hidflash.1").display());

    Ok(())
}
