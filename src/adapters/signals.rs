//! Termination signals.
//!
//! SIGINT and SIGTERM are turned into a single `Event::Shutdown`.  A small
//! current-thread tokio runtime on its own thread waits for whichever
//! arrives first.

use std::thread::{self, JoinHandle};

use log::info;

use crate::events::{Event, EventSender};

/// Install the handlers and start waiting in the background.
///
/// On unix the handlers are registered before this returns, so a signal
/// that arrives afterwards never hits the default disposition.
pub fn spawn_listener(events: EventSender) -> std::io::Result<JoinHandle<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    #[cfg(unix)]
    let signals = {
        let _guard = runtime.enter();
        unix::Signals::install()
    };

    thread::Builder::new().name("signals".into()).spawn(move || {
        #[cfg(unix)]
        let reason = runtime.block_on(signals.wait());
        #[cfg(not(unix))]
        let reason = runtime.block_on(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::warn!("SIGNAL: ctrl-c listener failed: {}", e);
                std::future::pending::<()>().await;
            }
            crate::events::ShutdownReason::Interrupt
        });

        info!("SIGNAL: {:?} received, shutting down", reason);
        events.post(Event::Shutdown(reason));
    })
}

#[cfg(unix)]
mod unix {
    use log::warn;
    use tokio::signal::unix::{Signal, SignalKind, signal};

    use crate::events::ShutdownReason;

    pub(super) struct Signals {
        interrupt: Option<Signal>,
        terminate: Option<Signal>,
    }

    impl Signals {
        /// Must run inside the runtime context.
        pub(super) fn install() -> Self {
            Self {
                interrupt: register(SignalKind::interrupt(), "SIGINT"),
                terminate: register(SignalKind::terminate(), "SIGTERM"),
            }
        }

        pub(super) async fn wait(mut self) -> ShutdownReason {
            tokio::select! {
                () = recv(self.interrupt.as_mut()) => ShutdownReason::Interrupt,
                () = recv(self.terminate.as_mut()) => ShutdownReason::Terminate,
            }
        }
    }

    fn register(kind: SignalKind, name: &str) -> Option<Signal> {
        match signal(kind) {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!("SIGNAL: {} handler not installed: {}", name, e);
                None
            }
        }
    }

    async fn recv(stream: Option<&mut Signal>) {
        match stream {
            Some(stream) => {
                stream.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}
