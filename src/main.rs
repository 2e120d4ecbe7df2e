use clap::Parser;
use switchyard::cli::{
    handle_backends, handle_classify, handle_config_init, serve::run_serve, Cli, Commands,
    ConfigCommands,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve(args) => run_serve(args).await,
        Commands::Classify(args) => handle_classify(&args).map(|output| println!("{}", output)),
        Commands::Backends(args) => handle_backends(&args).map(|output| println!("{}", output)),
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Init(args) => handle_config_init(&args),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
