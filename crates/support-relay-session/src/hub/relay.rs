//! Screen / mouse / keyboard relay.
//!
//! Every event re-reads the session table. Events for a pair that is not
//! active are dropped without telling either side.

use bytes::Bytes;
use support_relay_core::{ClientDirectory, ClientId, ConnectionId, HubEvent, KeyboardInput, MouseInput};
use tracing::{debug, trace};

use super::SessionHub;

impl<D> SessionHub<D>
where
    D: ClientDirectory,
{
    /// Forward a screen frame from a client to the support connection controlling it.
    ///
    /// Returns whether the frame was forwarded.
    pub fn relay_screen_data(
        &self,
        caller: &ConnectionId,
        client_id: &ClientId,
        target: &ConnectionId,
        data: Bytes,
    ) -> bool {
        if !self.registry.is_registered_on(client_id, caller) {
            debug!("Dropping screen data for {client_id} from foreign connection {caller}");
            return false;
        }
        if self.sessions.support_for(client_id).as_ref() != Some(target) {
            debug!("Dropping stale screen data from {client_id} to {target}");
            return false;
        }

        trace!("Relaying {} bytes of screen data {client_id} -> {target}", data.len());
        self.send_to(
            target,
            HubEvent::ScreenData {
                client_id: client_id.clone(),
                data,
            },
        );
        true
    }

    /// Forward a mouse event from a support connection to the client it controls.
    pub fn relay_mouse_event(
        &self,
        caller: &ConnectionId,
        target: &ClientId,
        input: MouseInput,
    ) -> bool {
        self.relay_input(caller, target, HubEvent::Mouse(input))
    }

    /// Forward a keyboard event from a support connection to the client it controls.
    pub fn relay_keyboard_event(
        &self,
        caller: &ConnectionId,
        target: &ClientId,
        input: KeyboardInput,
    ) -> bool {
        self.relay_input(caller, target, HubEvent::Keyboard(input))
    }

    fn relay_input(&self, caller: &ConnectionId, target: &ClientId, event: HubEvent) -> bool {
        if self.sessions.client_for(caller).as_ref() != Some(target) {
            debug!("Dropping stale {} from {caller} to {target}", event.name());
            return false;
        }
        let Some(client_conn) = self.registry.lookup(target) else {
            debug!("Dropping {} for offline client {target}", event.name());
            return false;
        };

        trace!("Relaying {} {caller} -> {target}", event.name());
        self.send_to(&client_conn, event);
        true
    }
}
