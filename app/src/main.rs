use clap::Parser;
use whirlroute_lib::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("whirlpool=info".parse()?)
                .add_directive("whirlpool_rpc=info".parse()?)
                .add_directive("warn".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let output = whirlroute_lib::run(cli).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
