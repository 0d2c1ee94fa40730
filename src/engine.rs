//! Asking an external engine for a move.
//!
//! [`EngineMoveProvider`] hands out one request at a time as a boxed future
//! the front end can run on whatever executor it has. Every request carries
//! a generation number; a reply from an older generation, or one that was
//! cancelled, is never applied. [`UciEngine`] talks UCI to a child process
//! that lives only as long as the request.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{AbortHandle, Abortable, BoxFuture, FutureExt};
use log::{debug, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{ChildStdin, ChildStdout, Command};

use crate::error::EngineError;
use crate::rules::Move;

/// Time and depth budget for one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimit {
    pub movetime_ms: Option<u64>,
    pub depth: Option<u32>,
}

impl Default for SearchLimit {
    fn default() -> Self {
        SearchLimit { movetime_ms: Some(100), depth: Some(1) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRequest {
    pub fen: String,
    pub limit: SearchLimit,
    /// `setoption` name/value pairs sent before the search.
    pub options: Vec<(String, String)>,
    pub chess960: bool,
}

/// Something that can pick a move for a position.
pub trait EngineProcess: Send + Sync {
    fn best_move(&self, request: EngineRequest) -> BoxFuture<'static, Result<Move, EngineError>>;
}

/// Completion of a request, tagged with the generation it was issued under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineReply {
    pub generation: u64,
    pub outcome: Result<Move, EngineError>,
}

/// An issued request. Dropping the future without polling it is fine; the
/// provider still treats the request as pending until cancelled.
pub struct EngineTicket {
    pub generation: u64,
    pub future: BoxFuture<'static, EngineReply>,
}

pub struct EngineMoveProvider {
    process: Arc<dyn EngineProcess>,
    limit: SearchLimit,
    options: Vec<(String, String)>,
    generation: u64,
    pending: Option<(u64, AbortHandle)>,
}

impl EngineMoveProvider {
    pub fn new(process: Arc<dyn EngineProcess>, limit: SearchLimit, options: Vec<(String, String)>) -> Self {
        EngineMoveProvider { process, limit, options, generation: 0, pending: None }
    }

    /// Starts a search of `fen`, cancelling any request still outstanding.
    pub fn request(&mut self, fen: &str, chess960: bool) -> EngineTicket {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        let request = EngineRequest {
            fen: fen.to_string(),
            limit: self.limit,
            options: self.options.clone(),
            chess960,
        };
        debug!("engine request #{} for {}", generation, fen);

        let (handle, registration) = AbortHandle::new_pair();
        let search = Abortable::new(self.process.best_move(request), registration);
        self.pending = Some((generation, handle));

        let future = async move {
            let outcome = match search.await {
                Ok(outcome) => outcome,
                Err(_aborted) => Err(EngineError::Cancelled),
            };
            EngineReply { generation, outcome }
        }
        .boxed();
        EngineTicket { generation, future }
    }

    /// Returns true when `reply` answers the outstanding request, which is
    /// then no longer pending. Stale and cancelled replies return false.
    pub fn accept(&mut self, reply: &EngineReply) -> bool {
        match self.pending {
            Some((generation, _)) if generation == reply.generation => {
                self.pending = None;
                reply.outcome != Err(EngineError::Cancelled)
            }
            _ => {
                debug!("discarding engine reply #{}", reply.generation);
                false
            }
        }
    }

    /// Aborts the outstanding request, which kills its process.
    pub fn cancel(&mut self) {
        if let Some((generation, handle)) = self.pending.take() {
            debug!("cancelling engine request #{}", generation);
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl Drop for EngineMoveProvider {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// A UCI engine binary, started fresh for every search.
#[derive(Debug, Clone)]
pub struct UciEngine {
    program: PathBuf,
    handshake_timeout: Duration,
}

impl UciEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        UciEngine { program: program.into(), handshake_timeout: Duration::from_secs(5) }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl EngineProcess for UciEngine {
    fn best_move(&self, request: EngineRequest) -> BoxFuture<'static, Result<Move, EngineError>> {
        run_uci(self.program.clone(), self.handshake_timeout, request).boxed()
    }
}

async fn run_uci(program: PathBuf, handshake: Duration, request: EngineRequest) -> Result<Move, EngineError> {
    let mut child = Command::new(&program)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| EngineError::Unavailable(format!("{}: {}", program.display(), e)))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| EngineError::Unavailable(String::from("engine stdin not captured")))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| EngineError::Unavailable(String::from("engine stdout not captured")))?;
    let mut lines = BufReader::new(stdout).lines();

    send(&mut stdin, "uci").await?;
    wait_for(&mut lines, "uciok", handshake).await?;
    if request.chess960 {
        send(&mut stdin, "setoption name UCI_Chess960 value true").await?;
    }
    for (name, value) in &request.options {
        send(&mut stdin, &format!("setoption name {} value {}", name, value)).await?;
    }
    send(&mut stdin, "isready").await?;
    wait_for(&mut lines, "readyok", handshake).await?;

    send(&mut stdin, &format!("position fen {}", request.fen)).await?;
    send(&mut stdin, &go_command(request.limit)).await?;

    let reply = loop {
        let line = lines
            .next_line()
            .await
            .map_err(|e| EngineError::Unavailable(e.to_string()))?
            .ok_or(EngineError::NoMove)?;
        if let Some(reply) = parse_bestmove(&line) {
            break reply;
        }
    };

    if let Err(e) = send(&mut stdin, "quit").await {
        warn!("engine did not take quit: {}", e);
    }
    if tokio::time::timeout(handshake, child.wait()).await.is_err() {
        warn!("engine {} still running after quit", program.display());
    }
    reply
}

async fn send(stdin: &mut ChildStdin, command: &str) -> Result<(), EngineError> {
    debug!("uci > {}", command);
    stdin
        .write_all(format!("{}\n", command).as_bytes())
        .await
        .map_err(|e| EngineError::Unavailable(e.to_string()))?;
    stdin.flush().await.map_err(|e| EngineError::Unavailable(e.to_string()))
}

async fn wait_for(
    lines: &mut Lines<BufReader<ChildStdout>>,
    token: &str,
    limit: Duration,
) -> Result<(), EngineError> {
    tokio::time::timeout(limit, read_until(lines, token))
        .await
        .map_err(|_| EngineError::Unavailable(format!("timed out waiting for {}", token)))?
}

async fn read_until(lines: &mut Lines<BufReader<ChildStdout>>, token: &str) -> Result<(), EngineError> {
    while let Some(line) = lines.next_line().await.map_err(|e| EngineError::Unavailable(e.to_string()))? {
        debug!("uci < {}", line);
        if line.trim() == token {
            return Ok(());
        }
    }
    Err(EngineError::Unavailable(format!("engine exited before {}", token)))
}

/// The `go` line for a search budget.
pub fn go_command(limit: SearchLimit) -> String {
    let mut command = String::from("go");
    if let Some(ms) = limit.movetime_ms {
        command.push_str(&format!(" movetime {}", ms));
    }
    if let Some(depth) = limit.depth {
        command.push_str(&format!(" depth {}", depth));
    }
    if limit.movetime_ms.is_none() && limit.depth.is_none() {
        command.push_str(" infinite");
    }
    command
}

/// Reads a `bestmove` line. Other lines give `None`.
pub fn parse_bestmove(line: &str) -> Option<Result<Move, EngineError>> {
    let mut tokens = line.split_whitespace();
    if tokens.next()? != "bestmove" {
        return None;
    }
    Some(match tokens.next() {
        None | Some("(none)") | Some("0000") => Err(EngineError::NoMove),
        Some(text) => Move::from_uci(text).ok_or_else(|| EngineError::IllegalReply(text.to_string())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEngine(Result<Move, EngineError>);

    impl EngineProcess for FixedEngine {
        fn best_move(&self, _request: EngineRequest) -> BoxFuture<'static, Result<Move, EngineError>> {
            let reply = self.0.clone();
            async move { reply }.boxed()
        }
    }

    struct SilentEngine;

    impl EngineProcess for SilentEngine {
        fn best_move(&self, _request: EngineRequest) -> BoxFuture<'static, Result<Move, EngineError>> {
            futures::future::pending().boxed()
        }
    }

    fn e2e4() -> Move {
        Move::from_uci("e2e4").unwrap()
    }

    fn provider(process: impl EngineProcess + 'static) -> EngineMoveProvider {
        EngineMoveProvider::new(Arc::new(process), SearchLimit::default(), Vec::new())
    }

    #[tokio::test]
    async fn test_reply_accepted_once() {
        let mut provider = provider(FixedEngine(Ok(e2e4())));
        let ticket = provider.request(crate::rules::STARTING_FEN, false);
        assert!(provider.is_pending());
        let reply = ticket.future.await;
        assert_eq!(reply.outcome, Ok(e2e4()));
        assert!(provider.accept(&reply));
        assert!(!provider.is_pending());
        assert!(!provider.accept(&reply));
    }

    #[tokio::test]
    async fn test_cancelled_request_reports_cancelled() {
        let mut provider = provider(SilentEngine);
        let ticket = provider.request(crate::rules::STARTING_FEN, false);
        provider.cancel();
        let reply = ticket.future.await;
        assert_eq!(reply.outcome, Err(EngineError::Cancelled));
        assert!(!provider.accept(&reply));
    }

    #[tokio::test]
    async fn test_newer_request_supersedes_older() {
        let mut provider = provider(FixedEngine(Ok(e2e4())));
        let first = provider.request(crate::rules::STARTING_FEN, false);
        let second = provider.request(crate::rules::STARTING_FEN, false);
        assert_eq!(second.generation, first.generation + 1);
        let old = first.future.await;
        assert_eq!(old.outcome, Err(EngineError::Cancelled));
        assert!(!provider.accept(&old));
        let new = second.future.await;
        assert!(provider.accept(&new));
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let engine = UciEngine::new("/nonexistent/boardside-engine");
        let request = EngineRequest {
            fen: crate::rules::STARTING_FEN.to_string(),
            limit: SearchLimit::default(),
            options: Vec::new(),
            chess960: false,
        };
        let result = engine.best_move(request).await;
        assert!(matches!(result, Err(EngineError::Unavailable(_))));
    }

    #[test]
    fn test_go_command() {
        assert_eq!(go_command(SearchLimit::default()), "go movetime 100 depth 1");
        assert_eq!(go_command(SearchLimit { movetime_ms: None, depth: Some(12) }), "go depth 12");
        assert_eq!(go_command(SearchLimit { movetime_ms: None, depth: None }), "go infinite");
    }

    #[test]
    fn test_parse_bestmove() {
        assert_eq!(parse_bestmove("bestmove e2e4 ponder e7e5"), Some(Ok(e2e4())));
        assert_eq!(parse_bestmove("bestmove (none)"), Some(Err(EngineError::NoMove)));
        assert_eq!(
            parse_bestmove("bestmove zz99"),
            Some(Err(EngineError::IllegalReply(String::from("zz99"))))
        );
        assert_eq!(parse_bestmove("info depth 1 score cp 20"), None);
        assert_eq!(parse_bestmove(""), None);
    }
}
