use std::io;
use std::path::Path;

#[path = "../catalog.rs"]
mod catalog;
#[allow(dead_code)]
#[path = "../session.rs"]
mod session;
#[allow(dead_code)]
#[path = "../sim.rs"]
mod sim;

use sequencer_core::controller::ControllerConfig;
use session::Session;

const TRANSCRIPT_DIR: &str = "transcripts";

fn main() -> io::Result<()> {
    record("intake", "Sequencer emulator intake transcript", &[
        "run start-intaking",
        "enable",
        "run start-intaking",
        "wait 200ms",
        "status",
        "wait 200ms",
        "run stop-intaking",
        "wait 500ms",
        "status",
    ])?;
    record("shooting", "Sequencer emulator shooting transcript", &[
        "enable",
        "run spin-up-shooter",
        "tick 10",
        "status",
        "run start-shooting",
        "wait 1s",
        "status",
        "run stop-shooting",
        "wait 500ms",
    ])?;
    record("climb", "Sequencer emulator climb transcript", &[
        "enable",
        "run extend-climber-left",
        "run extend-climber-right",
        "tick",
        "status",
        "run stop-climber-left",
        "run unstick-wheels-after-climb",
        "wait 1s",
        "disable",
        "status",
    ])
}

fn record(name: &str, header: &str, script: &[&str]) -> io::Result<()> {
    let path = Path::new(TRANSCRIPT_DIR).join(format!("emulator-{name}.log"));
    let mut session =
        Session::manual(ControllerConfig::DEFAULT).with_transcript(&path, header)?;
    for line in script {
        let _ = session.handle_command(line)?;
    }
    Ok(())
}
