mod cli;

use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, Daemon, Grant, Health, Init, Keys, Open, Seal, Version};

command_enum! {
    (Daemon, Daemon),
    (Grant, Grant),
    (Health, Health),
    (Init, Init),
    (Keys, Keys),
    (Open, Open),
    (Seal, Seal),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let ctx = cli::op::OpContext::new(args.config_path);

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
