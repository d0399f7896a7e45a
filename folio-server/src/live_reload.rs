use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use axum::{
    extract::State,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use notify_debouncer_mini::{DebounceEventResult, new_debouncer};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::AppState;

pub const LIVE_RELOAD_PATH: &str = "/__livereload";

const RELOAD_MESSAGE: &str = "reload";

pub(crate) async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    match state.reload_tx {
        Some(reload_tx) => ws.on_upgrade(|socket| websocket_connection(socket, reload_tx)),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn websocket_connection(mut socket: WebSocket, reload_tx: broadcast::Sender<String>) {
    let mut rx = reload_tx.subscribe();

    // Send initial connection confirmation
    if socket
        .send(Message::Text("connected".to_string().into()))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    Ok(reload_msg) => {
                        if socket.send(Message::Text(reload_msg.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
            msg = socket.recv() => {
                if msg.is_none() {
                    break;
                }
            }
        }
    }
}

/// Watch the catalog and templates and tell connected browsers to reload.
///
/// Pages are rendered from disk on every request, so a reload is all that is
/// needed to pick up a change.
pub(crate) async fn start_file_watcher(
    watch_paths: Vec<PathBuf>,
    reload_tx: broadcast::Sender<String>,
) -> Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::channel(100);

    let mut debouncer = new_debouncer(Duration::from_millis(500), move |res: DebounceEventResult| {
        match res {
            Ok(events) => {
                for event in events {
                    let _ = tx.blocking_send(event.path);
                }
            }
            Err(e) => warn!("watch error: {e}"),
        }
    })?;

    for path in &watch_paths {
        if !path.exists() {
            warn!("not watching missing path {}", path.display());
            continue;
        }
        debouncer
            .watcher()
            .watch(path, notify::RecursiveMode::Recursive)?;
        info!("watching {}", path.display());
    }

    let mut last_reload: Option<Instant> = None;
    while let Some(path) = rx.recv().await {
        debug!("file changed: {}", path.display());

        let now = Instant::now();
        if last_reload.is_some_and(|last| now.duration_since(last) <= Duration::from_millis(1000)) {
            debug!("skipping reload (too soon)");
            continue;
        }

        // No receivers just means no browser is connected right now
        let _ = reload_tx.send(RELOAD_MESSAGE.to_string());
        last_reload = Some(now);
        debug!("sent reload signal");
    }

    Ok(())
}

/// Inject the live reload client before `</body>`, or append it.
pub fn inject_livereload_script(html: &str) -> String {
    let script = format!(
        r#"
<script>
(function() {{
    const scheme = location.protocol === 'https:' ? 'wss' : 'ws';
    const socket = new WebSocket(scheme + '://' + location.host + '{LIVE_RELOAD_PATH}');
    socket.onmessage = function(event) {{
        if (event.data === '{RELOAD_MESSAGE}') {{
            location.reload();
        }}
    }};
    socket.onclose = function() {{
        console.log('Live reload disconnected');
    }};
}})();
</script>
"#
    );

    if let Some(pos) = html.rfind("</body>") {
        let mut result = String::with_capacity(html.len() + script.len());
        result.push_str(&html[..pos]);
        result.push_str(&script);
        result.push_str(&html[pos..]);
        result
    } else {
        format!("{html}{script}")
    }
}
