use super::model::Message;
use super::protocol::{decode_server_event, ClientEvent};
use super::session::{ChatSession, Draft, Reaction};
use super::{ChatConfig, ChatError, ChatEvent, HistoryLoader};
use chrono::Utc;
use futures::{Sink, SinkExt, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as Frame};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const EVENT_CAPACITY: usize = 256;
const TYPING_TICK: Duration = Duration::from_millis(500);
/// A channel that stayed up this long earns a fresh reconnect budget.
const STABLE_AFTER: Duration = Duration::from_secs(10);

enum Command {
    Send {
        draft: Draft,
        reply: oneshot::Sender<Result<Message, ChatError>>,
    },
    Typing(bool),
    Messages(oneshot::Sender<Vec<Message>>),
    TypingUsers(oneshot::Sender<Vec<String>>),
    Close,
}

/// Cheap, cloneable front of a running conversation task. The task stops
/// on `close()` or once every handle is dropped.
#[derive(Clone)]
pub struct ChatHandle {
    conversation_id: String,
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<ChatEvent>,
}

impl ChatHandle {
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Appends `draft` locally and writes it to the channel. There is no
    /// delivery acknowledgement; write failures surface as `ChatEvent::Error`.
    pub async fn send(&self, draft: Draft) -> Result<Message, ChatError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Send { draft, reply })?;
        rx.await.map_err(|_| ChatError::Closed)?
    }

    pub fn typing(&self, is_typing: bool) -> Result<(), ChatError> {
        self.command(Command::Typing(is_typing))
    }

    pub async fn messages(&self) -> Result<Vec<Message>, ChatError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Messages(reply))?;
        rx.await.map_err(|_| ChatError::Closed)
    }

    pub async fn typing_users(&self) -> Result<Vec<String>, ChatError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::TypingUsers(reply))?;
        rx.await.map_err(|_| ChatError::Closed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    pub fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn command(&self, command: Command) -> Result<(), ChatError> {
        self.commands.send(command).map_err(|_| ChatError::Closed)
    }
}

/// The task owning one conversation's state and socket.
pub struct ChatConnection {
    config: ChatConfig,
    loader: Arc<dyn HistoryLoader>,
    session: ChatSession,
    commands: mpsc::UnboundedReceiver<Command>,
    events: broadcast::Sender<ChatEvent>,
}

impl ChatConnection {
    /// Loads history, connects, and spawns the conversation task. The
    /// returned receiver observes every event from the first one on.
    pub async fn open(
        config: ChatConfig,
        loader: Arc<dyn HistoryLoader>,
    ) -> Result<(ChatHandle, broadcast::Receiver<ChatEvent>), ChatError> {
        let mut session = ChatSession::new(
            config.user_id.clone(),
            config.conversation_id.clone(),
            config.typing_timeout,
        );
        let history = loader.load_history(&config.conversation_id).await?;
        let initial = session.load_history(history);
        let socket = connect(&config.socket_url, config.connect_timeout).await?;
        info!(
            conversation = %config.conversation_id,
            url = %config.socket_url,
            "chat channel connected"
        );

        let (events, receiver) = broadcast::channel(EVENT_CAPACITY);
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let handle = ChatHandle {
            conversation_id: config.conversation_id.clone(),
            commands: commands_tx,
            events: events.clone(),
        };
        let connection = ChatConnection {
            config,
            loader,
            session,
            commands,
            events,
        };
        tokio::spawn(connection.run(socket, initial));
        Ok((handle, receiver))
    }

    fn emit(&self, event: ChatEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn emit_all(&self, events: Vec<ChatEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    async fn run(mut self, socket: Socket, initial: Reaction) {
        let mut next = Some((socket, initial));
        // consecutive reconnects since the channel was last stable
        let mut failures: u32 = 0;
        while let Some((socket, pending)) = next.take() {
            let connected_at = Instant::now();
            match self.serve(socket, pending).await {
                Ok(()) => break,
                Err(e) => {
                    if connected_at.elapsed() >= STABLE_AFTER {
                        failures = 0;
                    }
                    warn!(conversation = %self.config.conversation_id, error = %e, failures, "chat channel lost");
                    self.emit(ChatEvent::Disconnected {
                        reason: e.to_string(),
                    });
                    if let Some(event) = self.session.reset_typing() {
                        self.emit(event);
                    }
                    next = self.reconnect(&mut failures).await;
                }
            }
        }
        debug!(conversation = %self.config.conversation_id, "chat task finished");
        self.emit(ChatEvent::Closed);
    }

    /// `Ok` means the user closed the session; `Err` means the channel broke.
    async fn serve(&mut self, socket: Socket, pending: Reaction) -> Result<(), ChatError> {
        let (mut sink, mut stream) = socket.split();
        for frame in self.session.handshake().iter().chain(&pending.outbound) {
            write(&mut sink, frame).await?;
        }
        self.emit(ChatEvent::Connected {
            conversation_id: self.config.conversation_id.clone(),
        });
        self.emit_all(pending.events);

        let mut tick = tokio::time::interval(TYPING_TICK);
        loop {
            tokio::select! {
                frame = stream.next() => self.on_frame(frame, &mut sink).await?,
                command = self.commands.recv() => match command {
                    None | Some(Command::Close) => {
                        if let Err(e) = sink.send(Frame::Close(None)).await {
                            debug!(error = %e, "close frame not delivered");
                        }
                        return Ok(());
                    }
                    Some(command) => self.on_command(command, &mut sink).await?,
                },
                _ = tick.tick() => {
                    if let Some(event) = self.session.expire_typing(Instant::now()) {
                        self.emit(event);
                    }
                }
            }
        }
    }

    async fn on_frame<W>(
        &mut self,
        frame: Option<Result<Frame, WsError>>,
        sink: &mut W,
    ) -> Result<(), ChatError>
    where
        W: Sink<Frame, Error = WsError> + Unpin,
    {
        let text = match frame {
            Some(Ok(Frame::Text(text))) => text,
            Some(Ok(Frame::Binary(bytes))) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    debug!("ignoring non-utf8 binary frame");
                    return Ok(());
                }
            },
            Some(Ok(Frame::Close(_))) => {
                return Err(ChatError::Disconnected("closed by server".into()))
            }
            Some(Ok(_)) => return Ok(()),
            Some(Err(e)) => return Err(e.into()),
            None => return Err(ChatError::Disconnected("stream ended".into())),
        };

        let event = match decode_server_event(&text) {
            Ok(Some(event)) => event,
            Ok(None) => {
                debug!(frame = %text, "ignoring unhandled event");
                return Ok(());
            }
            Err(e) => {
                warn!(error = %e, "dropping malformed frame");
                return Ok(());
            }
        };
        let reaction = self.session.handle(event, Instant::now());
        for frame in &reaction.outbound {
            write(sink, frame).await?;
        }
        self.emit_all(reaction.events);
        Ok(())
    }

    async fn on_command<W>(&mut self, command: Command, sink: &mut W) -> Result<(), ChatError>
    where
        W: Sink<Frame, Error = WsError> + Unpin,
    {
        match command {
            Command::Send { draft, reply } => match self.session.compose(draft, Utc::now()) {
                Ok((message, frame)) => {
                    self.emit(ChatEvent::MessageAdded {
                        message: message.clone(),
                    });
                    let _ = reply.send(Ok(message));
                    if let Err(e) = write(sink, &frame).await {
                        warn!(error = %e, "message send failed");
                        self.emit(ChatEvent::Error {
                            message: format!("Message not sent: {}", e),
                        });
                        return Err(e);
                    }
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            Command::Typing(is_typing) => {
                write(sink, &self.session.typing_frame(is_typing)).await?;
            }
            Command::Messages(reply) => {
                let _ = reply.send(self.session.store().messages().to_vec());
            }
            Command::TypingUsers(reply) => {
                let _ = reply.send(self.session.typing_users());
            }
            Command::Close => {}
        }
        Ok(())
    }

    /// Handles commands while no socket is open. Returns `false` once the
    /// session should end.
    fn on_command_offline(&mut self, command: Command) -> bool {
        match command {
            Command::Close => return false,
            Command::Send { draft, reply } => match self.session.compose(draft, Utc::now()) {
                Ok((message, _)) => {
                    warn!(id = %message.id, "chat offline, message kept locally only");
                    self.emit(ChatEvent::MessageAdded {
                        message: message.clone(),
                    });
                    self.emit(ChatEvent::Error {
                        message: "Message not sent: chat is reconnecting".into(),
                    });
                    let _ = reply.send(Ok(message));
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            Command::Typing(_) => {}
            Command::Messages(reply) => {
                let _ = reply.send(self.session.store().messages().to_vec());
            }
            Command::TypingUsers(reply) => {
                let _ = reply.send(self.session.typing_users());
            }
        }
        true
    }

    /// Sleeps for `delay` while still answering commands.
    async fn wait(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                command = self.commands.recv() => match command {
                    None => return false,
                    Some(command) => {
                        if !self.on_command_offline(command) {
                            return false;
                        }
                    }
                },
            }
        }
    }

    /// Reconnects with linear backoff and re-fetches history on success.
    /// `failures` carries over between drops, so a server that accepts the
    /// upgrade and then hangs up still runs out of attempts.
    async fn reconnect(&mut self, failures: &mut u32) -> Option<(Socket, Reaction)> {
        while *failures < self.config.reconnect_attempts {
            *failures += 1;
            let attempt = *failures;
            self.emit(ChatEvent::Reconnecting { attempt });
            if !self.wait(self.config.reconnect_delay * attempt).await {
                return None;
            }
            let socket = match connect(&self.config.socket_url, self.config.connect_timeout).await {
                Ok(socket) => socket,
                Err(e) => {
                    warn!(attempt, error = %e, "chat reconnect failed");
                    continue;
                }
            };
            info!(attempt, conversation = %self.config.conversation_id, "chat channel reconnected");
            let pending = match self.loader.load_history(&self.config.conversation_id).await {
                Ok(history) => self.session.load_history(history),
                Err(e) => {
                    warn!(error = %e, "history re-fetch failed after reconnect");
                    Reaction::default()
                }
            };
            return Some((socket, pending));
        }
        self.emit(ChatEvent::Error {
            message: format!(
                "Chat connection lost after {} reconnect attempts",
                self.config.reconnect_attempts
            ),
        });
        None
    }
}

async fn connect(socket_url: &str, limit: Duration) -> Result<Socket, ChatError> {
    let url = url::Url::parse(socket_url)?;
    let (socket, _response) = tokio::time::timeout(limit, connect_async(url.as_str()))
        .await
        .map_err(|_| ChatError::Timeout(socket_url.to_string()))??;
    Ok(socket)
}

async fn write<W>(sink: &mut W, event: &ClientEvent) -> Result<(), ChatError>
where
    W: Sink<Frame, Error = WsError> + Unpin,
{
    debug!(event = event.name(), "chat send");
    sink.send(Frame::Text(event.encode()?)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct NoHistory;

    #[async_trait]
    impl HistoryLoader for NoHistory {
        async fn load_history(&self, _conversation_id: &str) -> Result<Vec<Message>, ChatError> {
            Ok(vec![])
        }
    }

    fn connection() -> (ChatConnection, broadcast::Receiver<ChatEvent>) {
        let config = ChatConfig::new("ws://127.0.0.1:9", "student", "c1");
        let session = ChatSession::new(
            config.user_id.clone(),
            config.conversation_id.clone(),
            config.typing_timeout,
        );
        let (events, receiver) = broadcast::channel(EVENT_CAPACITY);
        let (_commands_tx, commands) = mpsc::unbounded_channel();
        let connection = ChatConnection {
            config,
            loader: Arc::new(NoHistory),
            session,
            commands,
            events,
        };
        (connection, receiver)
    }

    #[tokio::test]
    async fn test_failed_write_reports_error_and_drops_channel() {
        let (mut connection, mut events) = connection();
        let mut broken = Box::pin(futures::sink::unfold((), |(), _frame: Frame| async {
            Err::<(), WsError>(WsError::ConnectionClosed)
        }));

        let (reply, sent) = oneshot::channel();
        let result = connection
            .on_command(
                Command::Send {
                    draft: Draft::text("hello"),
                    reply,
                },
                &mut broken,
            )
            .await;
        // Err makes `serve` return, which hands over to `reconnect`
        assert!(matches!(result, Err(ChatError::Connection(_))));

        let message = sent.await.unwrap().unwrap();
        assert!(matches!(
            events.try_recv().unwrap(),
            ChatEvent::MessageAdded { message: added } if added.id == message.id
        ));
        assert!(matches!(
            events.try_recv().unwrap(),
            ChatEvent::Error { message } if message.starts_with("Message not sent")
        ));
        assert_eq!(connection.session.store().messages().len(), 1);
    }

    #[tokio::test]
    async fn test_offline_send_is_kept_locally() {
        let (mut connection, mut events) = connection();
        let (reply, sent) = oneshot::channel();
        assert!(connection.on_command_offline(Command::Send {
            draft: Draft::text("are you there?"),
            reply,
        }));
        let message = sent.await.unwrap().unwrap();
        assert!(matches!(events.try_recv().unwrap(), ChatEvent::MessageAdded { .. }));
        assert!(matches!(events.try_recv().unwrap(), ChatEvent::Error { .. }));
        assert_eq!(connection.session.store().messages()[0].id, message.id);
        assert!(!connection.on_command_offline(Command::Close));
    }

    #[tokio::test]
    async fn test_connect_times_out_on_silent_endpoint() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        // accept TCP and never answer the upgrade
        let _hold = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((tcp, _)) = listener.accept().await {
                held.push(tcp);
            }
        });
        let result = connect(&url, Duration::from_millis(200)).await;
        assert!(matches!(result, Err(ChatError::Timeout(u)) if u == url));
    }
}
