use std::time::Duration;

use clap::Parser;

/// Simulate a voice room on an in-process network.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Number of participants, the first one hosts the room
    #[arg(short = 'n', long, env = "VOICE_MESH_PARTICIPANTS", default_value_t = 3)]
    pub participants: usize,

    /// Have the host kick the last participant before everyone leaves
    #[arg(short = 'k', long, env = "VOICE_MESH_KICK", default_value_t = false)]
    pub kick: bool,

    /// Delay before the host drops a kicked participant on its own side
    #[arg(long, env = "VOICE_MESH_KICK_GRACE_MS", default_value_t = 500)]
    pub kick_grace_ms: u64,

    /// Log filter, overridden by RUST_LOG
    #[arg(short = 'l', long, env = "VOICE_MESH_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn kick_grace(&self) -> Duration {
        Duration::from_millis(self.kick_grace_ms)
    }
}
