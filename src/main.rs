use colored::Colorize;
use shellbridge::cli;

fn main() -> anyhow::Result<()> {
    if let Err(err) = cli::run() {
        eprintln!("{} {err:#}", "error:".red().bold());
        std::process::exit(1);
    }
    Ok(())
}
