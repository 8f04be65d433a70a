// CLI modules
mod args;
mod op;
mod ops;
mod process;
mod state;

use args::Args;
use clap::{Parser, Subcommand};
use op::Op;
use ops::{Backup, Cleanup, Init, Status, Version};
use process::LogOptions;

command_enum! {
    (Init, Init),
    (Backup, Backup),
    (Cleanup, Cleanup),
    (Status, Status),
    (Version, Version),
}

/// Run the parsed command and return the process exit code.
/// Log guards are dropped (and flushed) before this returns.
async fn run(args: Args) -> i32 {
    let _guards = process::init_logging(&LogOptions {
        verbose: args.verbose,
        json: args.json,
        log_dir: args.log_dir,
    });

    let ctx = op::OpContext::new(args.config_path, args.json);

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("Error: {}", e);
            1
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let code = run(args).await;
    std::process::exit(code);
}
