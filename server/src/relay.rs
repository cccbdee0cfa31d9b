use office_shared::participant::ParticipantId;
use office_shared::protocol::{ContentKind, MoveMsg, ServerMsg};
use tokio::sync::{mpsc, oneshot};

use crate::registry::{Admission, SessionRegistry};

/// Commands from client connections to the relay
pub enum RelayCommand {
    Join {
        outbound: mpsc::Sender<ServerMsg>,
        response: oneshot::Sender<Admission>,
    },
    Move {
        id: ParticipantId,
        msg: MoveMsg,
    },
    Content {
        id: ParticipantId,
        kind: ContentKind,
        data: String,
    },
    Leave {
        id: ParticipantId,
    },
}

/// Run the relay. Owns the registry, so every join, move, and leave is
/// applied and fanned out before the next command is looked at.
pub async fn run_relay(mut cmd_rx: mpsc::Receiver<RelayCommand>, mut registry: SessionRegistry) {
    while let Some(cmd) = cmd_rx.recv().await {
        handle_command(&mut registry, cmd);
    }

    tracing::info!("Relay ended");
}

pub fn handle_command(registry: &mut SessionRegistry, cmd: RelayCommand) {
    match cmd {
        RelayCommand::Join { outbound, response } => {
            let admission = registry.register(outbound);
            tracing::info!(
                "Participant {} joined ({} online)",
                admission.id.short(),
                registry.len()
            );
            if let Err(admission) = response.send(admission) {
                // Handler went away before hearing back.
                registry.unregister(&admission.id);
            }
        }
        RelayCommand::Move { id, msg } => {
            if !registry.relay_move(&id, msg) {
                tracing::debug!("Dropping move from unregistered {}", id.short());
            }
        }
        RelayCommand::Content { id, kind, data } => {
            if registry.relay_content(&id, kind, data) {
                tracing::debug!("Relayed {} from {}", kind.wire_name(), id.short());
            }
        }
        RelayCommand::Leave { id } => {
            if registry.unregister(&id) {
                tracing::info!("Participant {} left ({} online)", id.short(), registry.len());
            }
        }
    }
}
