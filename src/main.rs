use clap::Parser;
use env_logger::Env;
use lookalike::Opts;
use lookalike::cli::SubCommandExtend;
use lookalike::config::SubCommand;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();

    let level = if opts.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    match &opts.subcmd {
        SubCommand::Server(config) => config.run(&opts).await,
        SubCommand::Search(config) => config.run(&opts).await,
    }
}
