use clap::Parser;
use log::warn;
use snafu::ErrorCompat;

mod args;
mod sim;

fn main() {
    let args = args::Args::parse();
    if args.verbose {
        env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }

    let res = sim::run_from_config(args.scenario, args.reference, args.out, args.total_votes);
    if let Err(e) = res {
        warn!("Error occured {:?}", e);
        eprintln!("An error occured {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        } else {
            eprintln!("No trace found");
        }
        std::process::exit(1);
    }
}
