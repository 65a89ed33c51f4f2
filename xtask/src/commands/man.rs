use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;

#[derive(Args, Debug)]
pub struct ManArgs {
    /// Output directory, relative to the workspace root
    #[arg(long = "out-dir", default_value = "dist/share/man/man1")]
    pub out_dir: PathBuf,
}

pub fn cmd_man(args: ManArgs) -> Result<(), String> {
    let out_dir = crate::prepare_out_dir(&args.out_dir)?;
    let cmd = rcbump::command();

    write_page(cmd.clone(), &out_dir.join(format!("{}.1", crate::BIN_NAME)))?;

    // One page per subcommand, named like `rcbump-sync.1`.
    for subcommand in cmd.get_subcommands() {
        let file = format!("{}-{}.1", crate::BIN_NAME, subcommand.get_name());
        write_page(subcommand.clone(), &out_dir.join(file))?;
    }

    Ok(())
}

fn write_page(cmd: clap::Command, path: &Path) -> Result<(), String> {
    let mut buffer: Vec<u8> = Vec::new();
    clap_mangen::Man::new(cmd)
        .render(&mut buffer)
        .map_err(|e| format!("render {}: {e}", path.display()))?;
    fs::write(path, buffer).map_err(|e| format!("{}: {e}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}
