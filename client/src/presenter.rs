use office_shared::participant::{ParticipantId, ParticipantState};
use office_shared::protocol::ContentKind;

/// Whatever draws the office. The reconciler decides what changed and the
/// presenter only turns those decisions into visuals.
pub trait Presenter {
    /// Per-avatar representation (sprite, name tag, ...).
    type Handle;

    fn show_identity(&mut self, id: &ParticipantId);
    fn spawn(&mut self, id: &ParticipantId, state: &ParticipantState) -> Self::Handle;
    fn update(&mut self, handle: &mut Self::Handle, state: &ParticipantState);
    /// Tear down the avatar and everything attached to it.
    fn despawn(&mut self, id: &ParticipantId, handle: Self::Handle);

    fn show_content(&mut self, _kind: ContentKind, _from: Option<&ParticipantId>, _data: &str) {}

    fn connection_lost(&mut self) {}
}

/// Headless presenter that narrates the office through `tracing`.
#[derive(Debug, Default)]
pub struct LogPresenter;

/// Name tag a headless avatar carries.
#[derive(Debug, Clone, PartialEq)]
pub struct Label(pub String);

impl Label {
    pub fn for_participant(id: &ParticipantId) -> Self {
        Self(format!("playerID: {}", id.short()))
    }
}

impl Presenter for LogPresenter {
    type Handle = Label;

    fn show_identity(&mut self, id: &ParticipantId) {
        tracing::info!("You are {}", id.short());
    }

    fn spawn(&mut self, id: &ParticipantId, state: &ParticipantState) -> Label {
        let label = Label::for_participant(id);
        tracing::info!("{} appeared at ({:.0}, {:.0})", label.0, state.x, state.y);
        label
    }

    fn update(&mut self, handle: &mut Label, state: &ParticipantState) {
        tracing::trace!(
            "{} -> ({:.0}, {:.0}) {} flip={}",
            handle.0,
            state.x,
            state.y,
            state.anim,
            state.flip_x
        );
    }

    fn despawn(&mut self, _id: &ParticipantId, handle: Label) {
        tracing::info!("{} left", handle.0);
    }

    fn show_content(&mut self, kind: ContentKind, from: Option<&ParticipantId>, data: &str) {
        tracing::info!(
            "{} from {} ({} bytes)",
            kind.wire_name(),
            from.map(ParticipantId::short).unwrap_or("?"),
            data.len()
        );
    }

    fn connection_lost(&mut self) {
        tracing::warn!("Lost connection to the office");
    }
}
