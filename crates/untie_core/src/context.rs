//! Collaborators a monitor works against while handling one timer.

use std::fmt::Display;

use crate::error::UntieError;
use crate::ids::ActorId;
use crate::messages::{MessageCatalog, MessageKey};
use crate::scheduler::Scheduler;
use crate::world::World;

/// Delivers rendered chat lines to a single actor.
pub trait ChatSink {
    /// Send `text` to `actor`.
    fn send_chat(&mut self, actor: ActorId, text: &str);
}

impl ChatSink for Vec<(ActorId, String)> {
    fn send_chat(&mut self, actor: ActorId, text: &str) {
        self.push((actor, text.to_string()));
    }
}

/// Answers whether an actor holds a permission.
pub trait Permissions {
    /// `true` if `actor` currently holds `permission`.
    fn has_permission(&self, actor: ActorId, permission: &str) -> bool;
}

impl<F> Permissions for F
where
    F: Fn(ActorId, &str) -> bool,
{
    fn has_permission(&self, actor: ActorId, permission: &str) -> bool {
        self(actor, permission)
    }
}

/// Everything a monitor handler may touch, borrowed for one timer firing.
pub struct MonitorContext<'a> {
    /// The instant the timer was due.
    pub now: f64,
    /// Scheduler for arming and canceling timers.
    pub scheduler: &'a mut Scheduler,
    /// Actors and targets.
    pub world: &'a mut dyn World,
    /// Where notifications go.
    pub chat: &'a mut dyn ChatSink,
    /// Templates for notifications.
    pub messages: &'a MessageCatalog,
}

impl MonitorContext<'_> {
    /// Render `key` in the actor's language, wrap it in the chat prefix and
    /// deliver it.
    ///
    /// # Errors
    ///
    /// Returns [`UntieError::Message`] if either template fails to render.
    pub fn notify(
        &mut self,
        actor: ActorId,
        key: MessageKey,
        args: &[&dyn Display],
    ) -> Result<(), UntieError> {
        let language = self
            .world
            .actor(actor)
            .and_then(|state| state.language.as_deref());
        let text = self.messages.chat(key, language, args)?;
        self.chat.send_chat(actor, &text);
        Ok(())
    }
}
