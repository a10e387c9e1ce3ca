use anyhow::Result;
use clap::Parser;

mod cli;
mod device;
mod dispatch;
mod host;
mod link;
mod port;
mod proto;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    match args.cmd {
        cli::Cmd::Host(opts) => host::run(opts),
        cli::Cmd::Device(opts) => device::run(opts),
    }
}
