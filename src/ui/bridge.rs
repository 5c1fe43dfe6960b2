// CommandBridge - Delivers queued commands to the controller on the Slint thread
//
// Widget callbacks and device watcher threads never touch the controller
// directly. They enqueue a Command, and a repeating Slint timer drains the
// queue on the UI thread, dispatches each command and re-renders the window.

use crate::controller::{CommandReceiver, Flow, MainController, WindowView};
use slint::{ComponentHandle, Timer, TimerMode};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// How often the queue is polled
pub const POLL_INTERVAL: Duration = Duration::from_millis(30);

/// Owns the polling timer; dropping the bridge stops command delivery
pub struct CommandBridge {
    timer: Timer,
}

impl CommandBridge {
    /// Start draining `receiver` into `controller`.
    ///
    /// `render` is called after every non-empty batch. A batch ending in
    /// [`Flow::Exit`] hides the window and quits the event loop instead.
    pub fn start<T, R>(
        ui: &T,
        controller: Rc<RefCell<MainController>>,
        mut receiver: CommandReceiver,
        render: R,
    ) -> Self
    where
        T: ComponentHandle + 'static,
        R: Fn(&T, &WindowView) + 'static,
    {
        let ui_weak = ui.as_weak();
        let timer = Timer::default();

        timer.start(TimerMode::Repeated, POLL_INTERVAL, move || {
            let Some(ui) = ui_weak.upgrade() else {
                return;
            };
            // A native dialog may spin a nested event loop while the
            // controller is borrowed; leave the queue for the next tick.
            let Ok(mut controller) = controller.try_borrow_mut() else {
                return;
            };

            let commands = receiver.drain();
            if commands.is_empty() {
                return;
            }
            tracing::trace!("Dispatching {} queued command(s)", commands.len());

            match controller.dispatch_all(commands) {
                Flow::Continue => render(&ui, &controller.view()),
                Flow::Exit => {
                    tracing::info!("Exit requested from the menu");
                    if let Err(e) = ui.hide() {
                        tracing::warn!("Failed to hide main window: {}", e);
                    }
                    if let Err(e) = slint::quit_event_loop() {
                        tracing::warn!("Failed to quit event loop: {}", e);
                    }
                }
            }
        });

        tracing::debug!("Command bridge polling every {:?}", POLL_INTERVAL);
        Self { timer }
    }

    pub fn is_running(&self) -> bool {
        self.timer.running()
    }

    pub fn stop(&self) {
        self.timer.stop();
    }
}
