use std::future::pending;
use std::io::BufRead;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// What ended the wait for the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitReason {
    /// The quit key was entered.
    Key,
    /// Ctrl+C / SIGINT.
    Interrupt,
    /// The token was cancelled by someone else.
    Cancelled,
}

/// Operator stop request: the quit key on an input stream, or Ctrl+C.
#[derive(Debug)]
pub struct QuitSignal {
    key: String,
    key_rx: oneshot::Receiver<()>,
}

impl QuitSignal {
    /// Listen for `key` on the process's stdin.
    pub fn stdin(key: &str) -> Self {
        Self::from_reader(key, std::io::stdin())
    }

    /// Listen for `key` on `input`, one line at a time.
    ///
    /// The input is read on a detached thread so a pending read never keeps
    /// the process alive after shutdown. End of input is not a quit request.
    pub fn from_reader<R>(key: &str, input: R) -> Self
    where
        R: std::io::Read + Send + 'static,
    {
        let (tx, key_rx) = oneshot::channel();
        let key_owned = key.to_string();

        let spawned = std::thread::Builder::new()
            .name("quit-listener".to_string())
            .spawn(move || {
                let reader = std::io::BufReader::new(input);
                for line in reader.lines() {
                    match line {
                        Ok(line) if is_quit_line(&line, &key_owned) => {
                            let _ = tx.send(());
                            return;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            debug!(error = %e, "stopped reading quit input");
                            return;
                        }
                    }
                }
            });

        if let Err(e) = spawned {
            error!(error = %e, "failed to start quit listener, only Ctrl+C will stop watching");
        }

        Self {
            key: key.to_string(),
            key_rx,
        }
    }

    /// Print the operator prompt.
    pub fn prompt(&self) {
        println!("Press '{}' then Enter to stop watching.", self.key);
    }

    /// Wait for the quit key, Ctrl+C, or cancellation of `stop`.
    pub async fn wait(self, stop: &CancellationToken) -> QuitReason {
        let key_rx = self.key_rx;
        let key = async move {
            if key_rx.await.is_err() {
                debug!("quit input closed, waiting for Ctrl+C");
                pending::<()>().await;
            }
        };

        let interrupt = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "unable to listen for Ctrl+C");
                pending::<()>().await;
            }
        };

        tokio::select! {
            biased;
            () = stop.cancelled() => QuitReason::Cancelled,
            () = key => QuitReason::Key,
            () = interrupt => QuitReason::Interrupt,
        }
    }
}

/// A line requests shutdown when it is the quit key, ignoring case and
/// surrounding whitespace.
pub fn is_quit_line(line: &str, key: &str) -> bool {
    line.trim().eq_ignore_ascii_case(key.trim())
}
