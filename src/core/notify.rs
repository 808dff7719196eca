//! Delivery of the run's notification message.

use crate::core::report::Message;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Local;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &Message) -> Result<()>;
}

/// Prints the message to stdout.
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send(&self, message: &Message) -> Result<()> {
        println!("{}", render(message));
        Ok(())
    }
}

/// Drops each message as a text file into a directory, for a mail
/// transport to pick up.
pub struct OutboxNotifier {
    dir: PathBuf,
}

impl OutboxNotifier {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        OutboxNotifier { dir: dir.into() }
    }

    /// Creates `<stamp>.txt`, or `<stamp>-<n>.txt` when messages share a
    /// timestamp. Existing messages are never overwritten.
    async fn create_message_file(&self, stamp: &str) -> Result<(PathBuf, fs::File)> {
        let mut attempt = 0u32;
        loop {
            let file_name = match attempt {
                0 => format!("{stamp}.txt"),
                n => format!("{stamp}-{n}.txt"),
            };
            let path = self.dir.join(file_name);
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to create message: {}", path.display()));
                }
            }
        }
    }
}

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn send(&self, message: &Message) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create outbox: {}", self.dir.display()))?;

        let stamp = Local::now().format("%Y%m%dT%H%M%S%.3f").to_string();
        let (path, mut file) = self.create_message_file(&stamp).await?;
        file.write_all(render(message).as_bytes())
            .await
            .with_context(|| format!("Failed to write message: {}", path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("Failed to write message: {}", path.display()))?;

        info!(to = %message.to, "Queued notification at {}", path.display());
        Ok(())
    }
}

fn render(message: &Message) -> String {
    format!(
        "To: {}\nSubject: {}\n\n{}",
        message.to, message.subject, message.body
    )
}
