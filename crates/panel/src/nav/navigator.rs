use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::docker::{DockerError, RuntimeBackend};
use crate::gate::AccessGate;

use super::action::{Action, ControlOp, Event};
use super::render::{self, clip_logs, Outcome, Render, UNKNOWN_ACTION_NOTICE};
use super::view::View;

pub const DEFAULT_LOG_TAIL: usize = 20;
pub const DEFAULT_LOG_CAP: usize = 3000;

/// Turns chat events into screens.
///
/// Every data-bearing screen is fetched from the backend when it is shown.
pub struct Navigator {
    backend: Arc<dyn RuntimeBackend>,
    gate: AccessGate,
    log_tail: usize,
    log_cap: usize,
}

impl Navigator {
    pub fn new(backend: Arc<dyn RuntimeBackend>, gate: AccessGate) -> Self {
        Self {
            backend,
            gate,
            log_tail: DEFAULT_LOG_TAIL,
            log_cap: DEFAULT_LOG_CAP,
        }
    }

    pub fn with_log_limits(mut self, tail_lines: usize, max_bytes: usize) -> Self {
        self.log_tail = tail_lines;
        self.log_cap = max_bytes;
        self
    }

    pub async fn handle(&self, event: Event) -> Render {
        let actor = event.actor();
        if let Err(denied) = self.gate.check(actor) {
            warn!(actor, "Rejected interaction from user outside the allow-list");
            return render::denied(&denied);
        }

        match event {
            Event::Command { name, .. } => {
                info!(actor, command = %name, "Command received");
                if name == "start" {
                    render::main_menu(None)
                } else {
                    render::command_hint(&name)
                }
            }
            Event::Button { tag, .. } => match tag.parse::<Action>() {
                Ok(action) => {
                    debug!(actor, action = %tag, "Button pressed");
                    self.dispatch(action).await
                }
                Err(err) => {
                    debug!(actor, error = %err, "Ignoring undecodable button");
                    render::main_menu(Some(UNKNOWN_ACTION_NOTICE))
                }
            },
        }
    }

    async fn dispatch(&self, action: Action) -> Render {
        match action {
            Action::Open(view) => self.show(view).await,
            Action::Back(view) => self.show(view.parent()).await,
            Action::Control(op, id) => self.control(op, id).await,
        }
    }

    async fn control(&self, op: ControlOp, id: String) -> Render {
        info!(container_id = %id, operation = op.verb(), "Running container operation");
        let result = match op {
            ControlOp::Start => self.backend.start(&id).await,
            ControlOp::Stop => self.backend.stop(&id).await,
            ControlOp::Restart => self.backend.restart(&id).await,
        };
        if let Err(err) = &result {
            warn!(container_id = %id, operation = op.verb(), error = %err, "Container operation failed");
        }
        let overlay = Outcome::from_result(result).describe(op, &id);

        match self.backend.container_detail(&id).await {
            Ok(detail) => render::container_detail(&detail, Some(&overlay)),
            Err(err) => {
                let mut screen = render::error(&View::ContainerDetail(id), &err);
                screen.text = format!("{}\n\n{}", overlay, screen.text);
                screen
            }
        }
    }

    async fn show(&self, view: View) -> Render {
        match self.fetch(&view).await {
            Ok(screen) => screen,
            Err(err) => {
                warn!(view = %view, error = %err, "Failed to load view");
                render::error(&view, &err)
            }
        }
    }

    async fn fetch(&self, view: &View) -> Result<Render, DockerError> {
        let screen = match view {
            View::Main => render::main_menu(None),
            View::ContainerList => render::container_list(&self.backend.list_containers(true).await?),
            View::ContainerDetail(id) => render::container_detail(&self.backend.container_detail(id).await?, None),
            View::ImageList => render::image_list(&self.backend.list_images().await?),
            View::Stats => render::stats(&self.backend.stats().await?),
            View::Logs(id) => {
                let text = self.backend.logs(id, self.log_tail).await?;
                render::logs(id, &clip_logs(&text, self.log_cap))
            }
        };
        Ok(screen)
    }
}
