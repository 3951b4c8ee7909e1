use clap::Parser;
use jeep_tracker::opts::{Command, Opts};
use jeep_tracker::{logging, viewer, web};

#[tokio::main]
async fn main() -> jeep_tracker::Result {
    let opts = Opts::parse();
    logging::init(opts.verbose)?;
    match opts.command {
        Command::Serve(opts) => web::run(opts).await,
        Command::Watch(opts) => viewer::client::watch(opts).await,
    }
}
