//! End-to-end session flows over in-memory streams.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};

use pewter_core::truncate::client_budget;
use pewter_core::{
    Command, Context, Listener, ListenerRegistry, ListenerResult, Message, Outcome, Router,
};
use pewter_runtime::{Connection, ConnectionHandle, ConnectionState, ServerConfig};
use pewter_transport::StreamConnector;

const RECV_TIMEOUT: Duration = Duration::from_secs(60);

// ─── Fake server ──────────────────────────────────────────────────────────────

struct FakeServer {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
}

impl FakeServer {
    /// Queues the client end on `connector` and keeps the server end.
    fn accept(connector: &StreamConnector<DuplexStream>) -> Self {
        let (client, server) = tokio::io::duplex(4096);
        connector.push(client);
        let (read, writer) = tokio::io::split(server);
        Self {
            lines: BufReader::new(read).lines(),
            writer,
        }
    }

    async fn recv(&mut self) -> String {
        tokio::time::timeout(RECV_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .expect("read failed")
            .expect("client closed the connection")
    }

    async fn expect(&mut self, line: &str) {
        assert_eq!(self.recv().await, line);
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .unwrap();
    }

    /// Round-trips a PING so everything sent before it has been dispatched.
    async fn sync(&mut self) {
        self.send("PING :sync").await;
        self.expect("PONG :sync").await;
    }

    /// Consumes the client's opening lines.
    async fn expect_registration(&mut self, nick: &str) {
        self.expect("CAP LS 302").await;
        self.expect(&format!("NICK {nick}")).await;
        self.expect("USER pewter 0 * :Pewter IRC bot").await;
    }

    async fn closed(&mut self) -> bool {
        matches!(
            tokio::time::timeout(RECV_TIMEOUT, self.lines.next_line()).await,
            Ok(Ok(None) | Err(_))
        )
    }
}

// ─── Listeners ────────────────────────────────────────────────────────────────

/// Remembers every message it sees.
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<Message>>,
}

impl Recorder {
    fn commands(&self) -> Vec<Command> {
        self.seen
            .lock()
            .iter()
            .filter_map(|m| m.command().cloned())
            .collect()
    }

    fn find(&self, command: &Command) -> Option<Message> {
        self.seen.lock().iter().find(|m| m.is(command)).cloned()
    }
}

#[async_trait]
impl Listener for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    async fn receive_message(&self, _ctx: &Context, msg: &Message) -> ListenerResult {
        self.seen.lock().push(msg.clone());
        Ok(Outcome::Continue)
    }
}

/// Replies to `ping?`, reports uptime, and never returns from `hang`.
struct Responder;

#[async_trait]
impl Listener for Responder {
    fn name(&self) -> &str {
        "responder"
    }

    async fn receive_message(&self, ctx: &Context, msg: &Message) -> ListenerResult {
        match msg.text() {
            Some("hang") => {
                std::future::pending::<()>().await;
                Ok(Outcome::Handled)
            }
            Some("ping?") => {
                ctx.reply(msg, "pong!").await?;
                Ok(Outcome::Handled)
            }
            Some("uptime?") => {
                let up = ctx
                    .get::<ConnectionHandle>()
                    .and_then(|conn| conn.uptime())
                    .is_some();
                ctx.reply(msg, if up { "up" } else { "down" }).await?;
                Ok(Outcome::Handled)
            }
            _ => Ok(Outcome::Continue),
        }
    }
}

// ─── Fixture ──────────────────────────────────────────────────────────────────

fn server_config(addresses: &[&str]) -> ServerConfig {
    let mut config = ServerConfig::new("test", addresses[0], "pewter");
    config.addresses = addresses.iter().map(|a| a.to_string()).collect();
    config.throttle_rate = 0.0;
    config.reconnect_delay_secs = 0;
    config
}

struct Fixture {
    connector: Arc<StreamConnector<DuplexStream>>,
    recorder: Arc<Recorder>,
    router: Router,
}

impl Fixture {
    fn new() -> Self {
        let registry = Arc::new(ListenerRegistry::new());
        let recorder = Arc::new(Recorder::default());
        registry.register(recorder.clone());
        registry.register(Arc::new(Responder));
        Self {
            connector: Arc::new(StreamConnector::new()),
            recorder,
            router: Router::new(registry),
        }
    }

    fn connect(&self, config: ServerConfig) -> (Arc<Connection>, tokio::task::JoinHandle<()>) {
        let conn = Connection::new(config, self.router.clone(), self.connector.clone());
        let task = tokio::spawn(Arc::clone(&conn).run());
        (conn, task)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_registration_and_cap_negotiation() {
    let f = Fixture::new();
    let mut server = FakeServer::accept(&f.connector);
    let (conn, task) = f.connect(server_config(&["irc.test:6667"]));

    server.expect_registration("pewter").await;
    assert_eq!(conn.state(), ConnectionState::LoggingIn);

    server.send(":srv CAP * LS * :multi-prefix sasl=PLAIN").await;
    server.send(":srv CAP * LS :identify-msg away-notify").await;
    server.expect("CAP REQ :identify-msg multi-prefix").await;

    let before = conn.client_budget();
    server.send(":srv CAP * ACK :identify-msg multi-prefix").await;
    server.expect("CAP END").await;
    assert_eq!(conn.client_budget(), before - 1);
    assert!(conn.has_capability("identify-msg"));

    server.send(":srv 433 * pewter :Nickname is already in use").await;
    server.expect("NICK pewter_").await;

    server
        .send(":srv 001 pewter_ :Welcome to the Test Network pewter_!pewter@bot.example")
        .await;
    server.sync().await;

    assert_eq!(conn.state(), ConnectionState::Operational);
    assert_eq!(conn.current_nick(), "pewter_");
    assert_eq!(conn.host().as_deref(), Some("bot.example"));
    assert_eq!(
        conn.client_budget(),
        client_budget("pewter_", "pewter", Some("bot.example"), true)
    );

    // identify-msg markers are stripped and reported.
    server.send(":al!a@h PRIVMSG #c :+hello").await;
    server.sync().await;
    let msg = f.recorder.find(&Command::Privmsg).unwrap();
    assert_eq!(msg.text(), Some("hello"));
    assert_eq!(msg.identified(), Some(true));

    server.send(":al!a@h PRIVMSG #c :-uptime?").await;
    server.expect("PRIVMSG #c :up").await;

    conn.stop();
    task.await.unwrap();
    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert_eq!(conn.uptime(), None);
}

#[tokio::test]
async fn test_nickserv_and_autojoin() {
    let f = Fixture::new();
    let mut server = FakeServer::accept(&f.connector);
    let mut config = server_config(&["irc.test:6667"]);
    config.password = Some("serverpass".into());
    config.nickserv_password = Some("hunter2".into());
    config.channels = vec!["#pewter".into(), "#secret key".into()];
    let (conn, task) = f.connect(config);

    server.expect("CAP LS 302").await;
    server.expect("PASS serverpass").await;
    server.expect("NICK pewter").await;
    server.expect("USER pewter 0 * :Pewter IRC bot").await;

    server.send(":srv CAP * LS :sasl").await;
    server.expect("CAP END").await;

    server.send(":srv 001 pewter :Welcome").await;
    server.expect("PRIVMSG NickServ :IDENTIFY hunter2").await;

    server.send(":srv 376 pewter :End of /MOTD command.").await;
    server.expect("JOIN #pewter").await;
    server.expect("JOIN #secret key").await;

    // Only once per session.
    server.send(":srv 422 pewter :MOTD File is missing").await;
    server.sync().await;

    conn.stop();
    task.await.unwrap();
}

#[tokio::test]
async fn test_try_again_resends_last_line() {
    let f = Fixture::new();
    let mut server = FakeServer::accept(&f.connector);
    let (conn, task) = f.connect(server_config(&["irc.test:6667"]));

    server.expect_registration("pewter").await;
    server
        .send(":srv 263 pewter USER :Please wait a while and try again.")
        .await;
    server.expect("USER pewter 0 * :Pewter IRC bot").await;

    conn.stop();
    task.await.unwrap();
}

#[tokio::test]
async fn test_ctcp_version() {
    let f = Fixture::new();
    let mut server = FakeServer::accept(&f.connector);
    let mut config = server_config(&["irc.test:6667"]);
    config.version_reply = "Pewter test".into();
    let (conn, task) = f.connect(config);

    server.expect_registration("pewter").await;
    server.send(":al!a@h PRIVMSG pewter :\x01VERSION\x01").await;
    server.expect("NOTICE al :\x01VERSION Pewter test\x01").await;

    conn.stop();
    task.await.unwrap();
}

#[tokio::test]
async fn test_server_error_reconnects() {
    let f = Fixture::new();
    let mut first = FakeServer::accept(&f.connector);
    let mut second = FakeServer::accept(&f.connector);
    let (conn, task) = f.connect(server_config(&["irc.test:6667"]));

    first.expect_registration("pewter").await;
    first.send("ERROR :Closing Link: too many bots").await;
    assert!(first.closed().await);

    second.expect_registration("pewter").await;
    second.sync().await;
    let commands = f.recorder.commands();
    assert_eq!(
        commands[..4],
        [
            Command::Connection,
            Command::Error,
            Command::Disconnection,
            Command::Connection,
        ]
    );
    assert_eq!(f.connector.attempts(), ["irc.test:6667", "irc.test:6667"]);

    conn.stop();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_round_robin_rotation() {
    let f = Fixture::new();
    let mut config = server_config(&["a.test:1", "b.test:2", "c.test:3"]);
    config.reconnect_delay_secs = 10;

    f.connector.push_failure("connection refused");
    let mut server = FakeServer::accept(&f.connector);
    let (conn, task) = f.connect(config);

    // First address refused, second accepted and logged in.
    server.expect_registration("pewter").await;
    server.send(":srv 001 pewter :Welcome").await;
    server.sync().await;
    drop(server);

    // A login resets the rotation; later attempts fail and rotate again.
    while f.connector.attempts().len() < 5 {
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    assert_eq!(
        f.connector.attempts()[..5],
        ["a.test:1", "b.test:2", "a.test:1", "b.test:2", "c.test:3"]
    );

    conn.stop();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_watchdog_waits_for_first_line() {
    let f = Fixture::new();
    let mut server = FakeServer::accept(&f.connector);
    let mut config = server_config(&["irc.test:6667"]);
    config.reconnect_delay_secs = 10;
    let (conn, task) = f.connect(config);

    server.expect_registration("pewter").await;

    // A silent server is never timed out before it says anything.
    tokio::time::sleep(Duration::from_secs(1000)).await;
    assert_eq!(f.connector.attempts().len(), 1);
    assert_eq!(conn.state(), ConnectionState::LoggingIn);

    server.sync().await;

    // Default interval is 300 s, checked every 30 s.
    tokio::time::sleep(Duration::from_secs(400)).await;
    assert!(server.closed().await);
    assert!(f.connector.attempts().len() >= 2);

    conn.stop();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_disabled_watchdog_never_times_out() {
    let f = Fixture::new();
    let mut server = FakeServer::accept(&f.connector);
    let mut config = server_config(&["irc.test:6667"]);
    config.reconnect_delay_secs = 10;
    config.watchdog_secs = 0;
    let (conn, task) = f.connect(config);

    server.expect_registration("pewter").await;
    server.send(":srv 001 pewter :Welcome").await;
    server.sync().await;

    // Far past the default interval, still the same connection.
    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(f.connector.attempts().len(), 1);
    assert_eq!(conn.state(), ConnectionState::Operational);
    server.sync().await;

    conn.stop();
    task.await.unwrap();
}

#[tokio::test]
async fn test_hung_handler_blocks_only_its_connection() {
    let f = Fixture::new();
    let other = Arc::new(StreamConnector::new());

    let mut hung = FakeServer::accept(&f.connector);
    let mut healthy = FakeServer::accept(&other);
    let (conn_a, task_a) = f.connect(server_config(&["a.test:1"]));
    let conn_b = Connection::new(server_config(&["b.test:2"]), f.router.clone(), other.clone());
    let task_b = tokio::spawn(Arc::clone(&conn_b).run());

    hung.expect_registration("pewter").await;
    healthy.expect_registration("pewter").await;

    hung.send(":al!a@h PRIVMSG #c :hang").await;
    hung.send(":al!a@h PRIVMSG #c :ping?").await;

    healthy.send(":al!a@h PRIVMSG #c :ping?").await;
    healthy.expect("PRIVMSG #c :pong!").await;

    // The stuck dispatch holds back every later line of its own connection.
    let blocked = tokio::time::timeout(Duration::from_millis(200), hung.recv()).await;
    assert!(blocked.is_err());

    conn_a.stop();
    conn_b.stop();
    task_a.await.unwrap();
    task_b.await.unwrap();
}
