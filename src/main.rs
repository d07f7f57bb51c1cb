use clap::Parser;
use imagen::Opts;
use imagen::cli::SubCommandExtend;
use imagen::config::SubCommand;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();

    match &opts.subcmd {
        SubCommand::Init(config) => config.run(&opts).await,
        SubCommand::Add(config) => config.run(&opts).await,
        SubCommand::Count(config) => config.run(&opts).await,
        SubCommand::Export(config) => config.run(&opts).await,
        SubCommand::Clean(config) => config.run(&opts).await,
        SubCommand::Generate(config) => config.run(&opts).await,
        SubCommand::Search(config) => config.run(&opts).await,
        SubCommand::Server(config) => config.run(&opts).await,
    }
}
