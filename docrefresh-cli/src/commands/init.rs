//! `docrefresh init [--force]`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use docrefresh_core::manifest::{self, InitResult};

use crate::Verdict;

/// Install the built-in document manifest under ~/.docrefresh/.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing manifest.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<Verdict> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        self.run_at(&home)
    }

    fn run_at(self, home: &Path) -> Result<Verdict> {
        match manifest::init_at(home, self.force).context("failed to write manifest")? {
            InitResult::Written(path) => {
                println!("{} Wrote default manifest", "✓".green().bold());
                println!("  Saved to: {}", path.display());
            }
            InitResult::AlreadyPresent(path) => {
                println!(
                    "{} Manifest already present at {} (use --force to overwrite)",
                    "·".dimmed(),
                    path.display()
                );
            }
        }
        Ok(Verdict::Success)
    }
}
