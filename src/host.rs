use anyhow::Result;
use std::time::Duration;

use crate::cli::HostOpts;
use crate::dispatch::Dispatcher;
use crate::link::Connection;
use crate::proto::frame::{Command, Payload};

pub fn run(opts: HostOpts) -> Result<()> {
    let cmd = match opts.payload()? {
        Payload::Integer(v) => Command::numeric(opts.op, v),
        Payload::Text(s) => Command::text(opts.op, s),
        Payload::Absent => Command::query(opts.op),
    };

    let mut conn = Connection::default();
    conn.connect(&opts.ser)?;
    if opts.debug
        && let Some(name) = conn.port_name()
    {
        eprintln!("[host] connected to {} at {} baud", name, opts.ser.baud);
    }

    let mut dispatcher = Dispatcher::new(conn);
    dispatcher.debug = opts.debug;

    let busy_budget = Duration::from_secs_f64(opts.busy_timeout);
    let resp = dispatcher.dispatch(&cmd, busy_budget)?;

    match &resp.payload {
        Payload::Absent => println!("{} (query ack)", resp.opcode),
        Payload::Integer(v) => println!("{} = {}", resp.opcode, v),
        Payload::Text(s) => println!("{} = {:?}", resp.opcode, s),
    }

    dispatcher.connection_mut().disconnect();
    Ok(())
}
