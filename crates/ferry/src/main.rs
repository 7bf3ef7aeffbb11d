use clap::Parser;

fn main() -> anyhow::Result<()> {
    ferry::init();

    let cli = ferry::cli::Cli::parse();
    ferry::cli::run(cli)
}
