use async_trait::async_trait;
use std::io::{self, BufRead};
use tokio::io::{AsyncBufRead, Lines};
use tokio::sync::mpsc;
use tracing::debug;

/// Line-oriented input for the interactive shell.
#[async_trait]
pub trait LineInput: Send {
    /// Next line without its terminator, or `None` at end of input.
    async fn next_line(&mut self) -> io::Result<Option<String>>;
}

#[async_trait]
impl<R> LineInput for Lines<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        Lines::next_line(self).await
    }
}

#[async_trait]
impl LineInput for mpsc::Receiver<io::Result<String>> {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.recv().await.transpose()
    }
}

/// Reads process stdin on a detached thread.
///
/// The thread is never joined: dropping the receiver leaves it parked in a
/// blocking read until the process exits, and the runtime does not wait for it.
pub fn stdin_lines() -> mpsc::Receiver<io::Result<String>> {
    let (tx, rx) = mpsc::channel(1);
    std::thread::spawn(move || {
        let stdin = io::stdin();
        forward_lines(stdin.lock(), tx);
    });
    rx
}

fn forward_lines<R: BufRead>(reader: R, tx: mpsc::Sender<io::Result<String>>) {
    for line in reader.lines() {
        if tx.blocking_send(line).is_err() {
            debug!("Input receiver dropped, stopping stdin reader");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncBufReadExt;

    #[tokio::test]
    async fn test_forwarded_lines_arrive_in_order() {
        let (tx, mut rx) = mpsc::channel(1);
        let reader = std::thread::spawn(move || forward_lines(&b"EUR\r\nyes\nGBP"[..], tx));

        assert_eq!(rx.next_line().await.unwrap().as_deref(), Some("EUR"));
        assert_eq!(rx.next_line().await.unwrap().as_deref(), Some("yes"));
        assert_eq!(rx.next_line().await.unwrap().as_deref(), Some("GBP"));
        assert!(rx.next_line().await.unwrap().is_none());
        reader.join().unwrap();
    }

    #[tokio::test]
    async fn test_reader_stops_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let reader = std::thread::spawn(move || forward_lines(&b"EUR\nGBP\n"[..], tx));
        reader.join().unwrap();
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_an_error_not_the_end() {
        let mut lines = AsyncBufReadExt::lines(&b"\xff\xfe\nEUR\n"[..]);

        let err = LineInput::next_line(&mut lines).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(
            LineInput::next_line(&mut lines).await.unwrap().as_deref(),
            Some("EUR")
        );
    }
}
