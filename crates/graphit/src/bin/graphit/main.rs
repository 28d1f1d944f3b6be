mod cli;

use anyhow::Context;
use graphit::render::Render;
use tracing_subscriber::filter::LevelFilter;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("GRAPHIT_LOG")
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

fn run(cli: cli::Cli) -> anyhow::Result<()> {
    tracing::info!(path=%cli.ifile.display(), "reading LinuxKit configuration file");
    tracing::info!(path=%cli.ofile.display(), "diagram will be written");

    let manifest = graphit::manifest::Manifest::load_file(&cli.ifile)
        .with_context(|| format!("Failed to read manifest {}", cli.ifile.display()))?;

    let source = graphit::metadata::ContainerCli::from_env();
    let graph = graphit::diagram(&manifest, &source);

    graphit::render::Graphviz::from_env()
        .render(&graph, &cli.ofile)
        .with_context(|| format!("Failed to write diagram {}", cli.ofile.display()))?;

    Ok(())
}
