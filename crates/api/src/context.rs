use millerp_core::UserId;

/// Actor attributed to a request.
///
/// Inserted by the actor middleware and present for every protected route.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ActorContext {
    actor_id: UserId,
}

impl ActorContext {
    pub fn new(actor_id: UserId) -> Self {
        Self { actor_id }
    }

    pub fn actor_id(&self) -> UserId {
        self.actor_id
    }
}
