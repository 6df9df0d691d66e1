//! Man page generator for sipolicy
//!
//! Writes `sipolicy.1` and one `sipolicy-<command>.1` page per subcommand.
//!
//! Usage: cargo run --bin gen-manpage -- [output-dir]

use clap::CommandFactory;
use std::fs;
use std::path::{Path, PathBuf};

#[path = "../cli.rs"]
mod cli;

fn render(cmd: clap::Command, title: &str, path: &Path) -> std::io::Result<()> {
    let mut buffer = Vec::new();
    clap_mangen::Man::new(cmd).title(title).render(&mut buffer)?;
    fs::write(path, buffer)?;
    println!("  {}", path.display());
    Ok(())
}

fn main() -> std::io::Result<()> {
    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));
    fs::create_dir_all(&output_dir)?;

    let cmd = cli::Cli::command();
    println!("Man pages generated:");
    for sub in cmd.get_subcommands() {
        let title = format!("sipolicy-{}", sub.get_name());
        render(sub.clone(), &title, &output_dir.join(format!("{}.1", title)))?;
    }
    let main_page = output_dir.join("sipolicy.1");
    render(cmd, "sipolicy", &main_page)?;

    println!("\nTo view the man page:");
    println!("  man -l {}", main_page.display());
    Ok(())
}
