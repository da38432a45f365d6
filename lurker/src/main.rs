use colored::Colorize;
use lurker::command_argument_builder;
use lurker::handlers::{handle_run, init_tracing};

#[tokio::main]
async fn main() {
    let matches = command_argument_builder().get_matches();
    init_tracing();

    if let Err(e) = handle_run(&matches).await {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
