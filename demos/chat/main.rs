//! Chat room over Socket.IO
//!
//! Run with `cargo run --example chat` and point a Socket.IO 0.9 client at
//! `http://127.0.0.1:3000`. Every `"say"` event is relayed to all connected
//! clients as `"said"`; joining `/lobby` announces the newcomer there.
//!
//! Set `SOCKETIO_CONFIG=path/to/config.yaml` to load settings from YAML and
//! `RUST_LOG=socketio=debug` for protocol-level logs.

use parking_lot::Mutex;
use socketio::prelude::*;
use std::sync::Weak;
use tracing_subscriber::EnvFilter;

/// Every default namespace that has handshaken so far
type Room = Arc<Mutex<Vec<Weak<NameSpace>>>>;

fn broadcast(room: &Room, event: &str, args: Vec<Value>) {
    let mut members = room.lock();
    members.retain(|member| member.strong_count() > 0);
    for member in members.iter().filter_map(Weak::upgrade) {
        member.emit(event, args.clone());
    }
}

fn join(room: &Room, ns: &Arc<NameSpace>) {
    room.lock().push(Arc::downgrade(ns));

    let members = room.clone();
    let from = ns.session_id().to_string();
    ns.on("say", move |args| {
        let text = args.first().cloned().unwrap_or(Value::Null);
        broadcast(&members, "said", vec![json!({ "from": from, "text": text })]);
    });

    if let Some(session) = ns.session() {
        let lobby = session.namespace("/lobby");
        let joined = Arc::downgrade(&lobby);
        let who = ns.session_id().to_string();
        lobby.on("connect", move |_| {
            if let Some(lobby) = joined.upgrade() {
                lobby.send(format!("{} joined the lobby", who));
            }
        });
    }

    ns.emit("welcome", vec![json!({ "id": ns.session_id() })]);
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::var("SOCKETIO_CONFIG") {
        Ok(path) => ServerConfig::from_yaml_file(&path)?,
        Err(_) => ServerConfig::default(),
    };

    let server = ServerBuilder::new().with_config(config).build()?;

    let room: Room = Arc::default();
    let members = room.clone();
    server.on("connect", move |ns: Arc<NameSpace>| join(&members, &ns));

    println!("💬 Chat server on http://127.0.0.1:3000/socket.io/1/");
    server.serve("127.0.0.1:3000").await
}
