mod cli;
mod logging;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use transport::MemoryNetwork;

use voice_mesh::audio::DeviceTableAudio;
use voice_mesh::config::guest_name;
use voice_mesh::events::TracingEventHandler;
use voice_mesh::{Room, RoomConfig, RoomHandle, RoomSnapshot};

use crate::cli::Args;

const CONVERGENCE_TIMEOUT: Duration = Duration::from_secs(5);

struct Participant {
    name: String,
    handle: RoomHandle,
    task: JoinHandle<RoomSnapshot>,
}

fn spawn_participant(
    network: &MemoryNetwork,
    config: RoomConfig,
) -> anyhow::Result<Participant> {
    let (transport, events) = network.join_random();
    let name = config.display_name.clone();
    let handler = TracingEventHandler::new(name.clone());
    let room = Room::new(
        Arc::new(transport),
        Arc::new(DeviceTableAudio::default()),
        Arc::new(handler),
        config,
    )
    .with_context(|| format!("failed to start {name}"))?;
    let (handle, task) = room.spawn(events);
    Ok(Participant { name, handle, task })
}

/// Wait until every participant has an open link to every other one.
async fn wait_for_clique(participants: &[Participant]) -> anyhow::Result<()> {
    let expected = participants.len().saturating_sub(1);
    let converged = async {
        loop {
            let mut done = true;
            for participant in participants {
                let snapshot = participant.handle.snapshot().await?;
                done &= snapshot.open_peers().len() == expected;
            }
            if done {
                return anyhow::Ok(());
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };
    tokio::time::timeout(CONVERGENCE_TIMEOUT, converged)
        .await
        .context("mesh did not converge")?
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let level = logging::init_logging(&args.log_level);
    info!("[main]: Log filter {level}");

    if args.participants < 2 {
        bail!("a room needs at least two participants");
    }

    let network = MemoryNetwork::new();
    let mut host_config = RoomConfig::host(&guest_name());
    host_config.kick_grace = args.kick_grace();
    let host = spawn_participant(&network, host_config)?;
    let rendezvous = host.handle.my_id().clone();
    info!("[main]: {} hosts the room as {rendezvous}", host.name);

    let mut participants = vec![host];
    for _ in 1..args.participants {
        let config = RoomConfig::join(&guest_name(), rendezvous.clone());
        participants.push(spawn_participant(&network, config)?);
    }

    wait_for_clique(&participants).await?;
    info!("[main]: Mesh of {} participants converged", participants.len());

    for participant in &participants {
        let delivered = participant
            .handle
            .send_chat(&format!("hello from {}", participant.name))
            .await?;
        info!("[main]: {} reached {delivered} peers", participant.name);
    }

    if args.kick {
        if let Some(target) = participants.last() {
            let target_id = target.handle.my_id().clone();
            participants[0].handle.kick(&target_id).await?;
        }
    }

    // Let in-flight messages and the kick grace delay play out.
    tokio::time::sleep(args.kick_grace() + Duration::from_millis(100)).await;

    for participant in participants {
        if let Err(e) = participant.handle.leave().await {
            warn!("[main]: {} could not leave: {e}", participant.name);
        }
        let snapshot = participant.task.await?;
        info!(
            "[main]: {} ended {} with {} peers left",
            snapshot.my_name,
            snapshot.session,
            snapshot.peers.len()
        );
    }
    Ok(())
}
