/// mpv-backed audio resource.
///
/// Architecture:
///
/// ```text
///   MpvResource::start()
///         │
///         ├── MpvDriver::spawn_and_connect()
///         │       ├── writer_task   ← MpvRequest via mpsc, serialises → socket
///         │       └── reader_task   ← JSON lines from socket
///         │                              ├── response (request_id) → oneshot
///         │                              └── event / property-change → mpv_tx
///         ├── command_task  ← AudioResource calls, sent to mpv in order
///         │                     └── loadfile reply → (playlist entry, token) → event_pump
///         └── event_pump    ← mpv events → EntryTracker → translate() → ResourceEvent
/// ```
///
/// Platform notes:
/// - Unix:   Unix domain sockets
/// - Windows: Named pipes  \\.\pipe\<name>
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::resource::{AudioResource, LoadToken, ResourceEvent};

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

// ── global request-id counter ─────────────────────────────────────────────────

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

// ── observation property IDs ──────────────────────────────────────────────────

pub const OBS_TIME_POS: u64 = 1;
pub const OBS_DURATION: u64 = 2;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>;

struct PendingRequest {
    req_id: u64,
    payload: String, // serialised JSON line (already has '\n')
    reply: oneshot::Sender<anyhow::Result<Value>>,
}

/// An mpv event / property-change that arrived unsolicited (no request_id).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    /// Returns `Some((obs_id, data))` if this is a property-change event.
    pub fn as_property_change(&self) -> Option<(u64, &Value)> {
        if self.raw.get("event")?.as_str()? == "property-change" {
            let id = self.raw.get("id")?.as_u64()?;
            let data = self.raw.get("data").unwrap_or(&Value::Null);
            Some((id, data))
        } else {
            None
        }
    }

    /// Returns the event name, e.g. "end-file", "start-file", "file-loaded".
    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }

    /// Playlist entry a `start-file` / `end-file` refers to.
    pub fn playlist_entry_id(&self) -> Option<u64> {
        self.raw.get("playlist_entry_id")?.as_u64()
    }
}

/// Ties mpv playlist entries to the load tokens that created them.
///
/// mpv reports `start-file` / `end-file` per playlist entry, while property
/// changes carry no entry at all and belong to the entry last started.  The
/// `loadfile` reply naming the entry can arrive after the entry's first
/// events, so events for an entry that is not bound yet are held until it is.
#[derive(Debug, Default)]
struct EntryTracker {
    tokens: HashMap<u64, LoadToken>,
    active: Option<u64>,
    held: Vec<MpvEvent>,
}

const MAX_HELD: usize = 64;

impl EntryTracker {
    fn bind(&mut self, entry: u64, token: LoadToken) -> Vec<ResourceEvent> {
        debug!("mpv: playlist entry {} is {}", entry, token);
        self.tokens.insert(entry, token);
        if self.active != Some(entry) {
            return Vec::new();
        }
        self.held
            .drain(..)
            .filter_map(|ev| translate(&ev, token))
            .collect()
    }

    fn observe(&mut self, ev: MpvEvent) -> Vec<ResourceEvent> {
        match ev.event_name() {
            Some("start-file") => {
                self.active = ev.playlist_entry_id();
                self.held.clear();
                if let Some(entry) = self.active {
                    self.tokens.retain(|id, _| *id >= entry);
                }
                debug!("mpv: start-file for entry {:?}", self.active);
                Vec::new()
            }
            Some("end-file") => {
                let entry = ev.playlist_entry_id().or(self.active);
                self.route(entry, ev)
            }
            _ => {
                let entry = self.active;
                self.route(entry, ev)
            }
        }
    }

    fn route(&mut self, entry: Option<u64>, ev: MpvEvent) -> Vec<ResourceEvent> {
        let Some(entry) = entry else {
            return Vec::new();
        };
        if let Some(token) = self.tokens.get(&entry) {
            return translate(&ev, *token).into_iter().collect();
        }
        if Some(entry) == self.active && self.held.len() < MAX_HELD {
            self.held.push(ev);
        } else {
            debug!("mpv: dropping event for unknown entry {}", entry);
        }
        Vec::new()
    }
}

/// Map one mpv event onto the resource event it stands for, tagged with the
/// token of the source it belongs to.
pub fn translate(event: &MpvEvent, active: LoadToken) -> Option<ResourceEvent> {
    if let Some((id, data)) = event.as_property_change() {
        let value = data.as_f64()?;
        return match id {
            OBS_TIME_POS => Some(ResourceEvent::TimeUpdate {
                token: active,
                position: value,
            }),
            OBS_DURATION => Some(ResourceEvent::DurationChanged {
                token: active,
                duration: value,
            }),
            _ => None,
        };
    }

    match event.event_name()? {
        "playback-restart" => Some(ResourceEvent::Started { token: active }),
        "end-file" => match event.raw.get("reason").and_then(|r| r.as_str()) {
            Some("eof") => Some(ResourceEvent::Ended { token: active }),
            Some("error") => {
                let reason = event
                    .raw
                    .get("file_error")
                    .and_then(|e| e.as_str())
                    .unwrap_or("decode error")
                    .to_string();
                Some(ResourceEvent::Rejected {
                    token: active,
                    reason,
                })
            }
            // stop / quit / redirect: the source was replaced or torn down
            _ => None,
        },
        _ => None,
    }
}

// ── public handle ─────────────────────────────────────────────────────────────

/// Cloneable handle to the mpv writer task.
#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvHandle {
    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut raw = serde_json::to_string(&msg)?;
        raw.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload: raw,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(tokio::time::Duration::from_secs(5), reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    /// Must run on every fresh connection; mpv pushes property-change events
    /// for these from then on.
    pub async fn observe_properties(&self) {
        let props = [(OBS_TIME_POS, "time-pos"), (OBS_DURATION, "duration")];
        for (id, name) in &props {
            match self.send(json!(["observe_property", id, name])).await {
                Ok(_) => debug!("mpv: observe_property id={} name={}", id, name),
                Err(e) => warn!("mpv: observe_property {} failed: {}", name, e),
            }
        }
    }
}

// ── driver ────────────────────────────────────────────────────────────────────

/// Owns the mpv child process.  The process is killed when the driver drops.
pub struct MpvDriver {
    pub socket_name: String,
    process: Option<tokio::process::Child>,
    initial_volume: f32,
}

impl MpvDriver {
    pub fn new(initial_volume: f32) -> Self {
        Self {
            socket_name: nowplaying_proto::platform::mpv_socket_name(),
            process: None,
            initial_volume,
        }
    }

    fn spawn_process(&mut self) -> anyhow::Result<()> {
        info!("mpv: spawning new process");
        let mpv_binary = nowplaying_proto::platform::find_mpv_binary()
            .ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;

        let vol_arg = format!(
            "--volume={}",
            (self.initial_volume * 100.0).clamp(0.0, 100.0).round() as i64
        );
        let ipc_arg = nowplaying_proto::platform::mpv_socket_arg(&self.socket_name);

        let stderr_path = nowplaying_proto::platform::data_dir().join("mpv-stderr.log");
        let stderr_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&stderr_path)?;
        debug!("mpv: logging stderr to {:?}", stderr_path);

        let child = tokio::process::Command::new(&mpv_binary)
            .arg("--no-video")
            .arg("--idle=yes")
            .arg("--keep-open=no")
            .arg(&ipc_arg)
            .arg("--quiet")
            .arg(&vol_arg)
            .stdout(std::process::Stdio::null())
            .stderr(stderr_file)
            .kill_on_drop(true)
            .spawn()?;
        info!("mpv: spawned process with pid {:?}", child.id());
        self.process = Some(child);
        Ok(())
    }

    #[cfg(unix)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        let socket_path = std::path::PathBuf::from(&self.socket_name);
        let _ = tokio::fs::remove_file(&socket_path).await;

        self.spawn_process()?;

        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear");
        }

        let stream = UnixStream::connect(&socket_path).await?;
        info!("mpv: connected to IPC socket");
        Ok(start_io_tasks(stream, event_tx))
    }

    #[cfg(windows)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.spawn_process()?;

        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if let Ok(client) = ClientOptions::new().open(&pipe_path) {
                info!("mpv: connected to named pipe");
                return Ok(start_io_tasks(client, event_tx));
            }
        }
        anyhow::bail!("mpv named pipe did not appear")
    }
}

impl Drop for MpvDriver {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            let _ = std::fs::remove_file(&self.socket_name);
        }
    }
}

fn start_io_tasks<S>(stream: S, event_tx: mpsc::Sender<MpvEvent>) -> MpvHandle
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let reader = BufReader::new(read_half);

    // req_id → reply channel, shared between writer (inserts) and reader (resolves)
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);

    tokio::spawn(writer_task(write_half, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(reader, pending, event_tx));

    MpvHandle { tx: cmd_tx }
}

// ── reader task ───────────────────────────────────────────────────────────────

async fn fail_pending(pending: &PendingMap, why: &str) {
    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(anyhow::anyhow!("{}", why)));
    }
}

async fn reader_task<R>(
    mut reader: BufReader<R>,
    pending: PendingMap,
    event_tx: mpsc::Sender<MpvEvent>,
) where
    R: AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                fail_pending(&pending, "mpv IPC connection closed").await;
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = val.get("request_id").and_then(|v| v.as_u64()) {
                    let mut map = pending.lock().await;
                    if let Some(tx) = map.remove(&req_id) {
                        let result = if val["error"].as_str() == Some("success") {
                            Ok(val)
                        } else {
                            let err = val["error"].as_str().unwrap_or("unknown error").to_string();
                            debug!("mpv reader: response req={} err={}", req_id, err);
                            Err(anyhow::anyhow!("mpv error: {}", err))
                        };
                        let _ = tx.send(result);
                    } else {
                        debug!("mpv reader: response for unknown req={}", req_id);
                    }
                } else if event_tx.send(MpvEvent { raw: val }).await.is_err() {
                    debug!("mpv reader: event receiver gone");
                    break;
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                fail_pending(&pending, "mpv IPC read error").await;
                break;
            }
        }
    }
}

// ── writer task ───────────────────────────────────────────────────────────────

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // register before writing so the reader can match the reply
        pending.lock().await.insert(req.req_id, req.reply);
        debug!("mpv writer: send req={} payload={}", req.req_id, req.payload.trim());
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow::anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

// ── resource ──────────────────────────────────────────────────────────────────

/// One queued IPC command.  `token` is set for commands whose failure means
/// the source cannot start.
struct Queued {
    what: &'static str,
    token: Option<LoadToken>,
    command: Value,
}

pub struct MpvResource {
    queue: mpsc::Sender<Queued>,
    driver: MpvDriver,
    tasks: Vec<JoinHandle<()>>,
}

impl MpvResource {
    /// Spawn mpv and wire its events into `events`.
    pub async fn start(
        initial_volume: f32,
        events: mpsc::Sender<ResourceEvent>,
    ) -> anyhow::Result<Self> {
        let (mpv_tx, mpv_rx) = mpsc::channel::<MpvEvent>(256);
        let mut driver = MpvDriver::new(initial_volume);
        let handle = driver.spawn_and_connect(mpv_tx).await?;
        handle.observe_properties().await;

        let (queue_tx, queue_rx) = mpsc::channel::<Queued>(64);
        let (bound_tx, bound_rx) = mpsc::channel::<(u64, LoadToken)>(64);
        let tasks = vec![
            tokio::spawn(command_task(handle, queue_rx, bound_tx, events.clone())),
            tokio::spawn(event_pump(mpv_rx, bound_rx, events)),
        ];

        Ok(Self {
            queue: queue_tx,
            driver,
            tasks,
        })
    }

    fn enqueue(&self, what: &'static str, token: Option<LoadToken>, command: Value) -> anyhow::Result<()> {
        self.queue
            .try_send(Queued { what, token, command })
            .map_err(|e| anyhow::anyhow!("mpv {} not queued: {}", what, e))
    }
}

impl AudioResource for MpvResource {
    fn load(&mut self, token: LoadToken, source: &str) -> anyhow::Result<()> {
        self.enqueue("loadfile", Some(token), json!(["loadfile", source, "replace"]))
    }

    fn play(&mut self, token: LoadToken) -> anyhow::Result<()> {
        self.enqueue("play", Some(token), json!(["set_property", "pause", false]))
    }

    fn pause(&mut self) -> anyhow::Result<()> {
        self.enqueue("pause", None, json!(["set_property", "pause", true]))
    }

    fn seek(&mut self, position_secs: f64) -> anyhow::Result<()> {
        self.enqueue("seek", None, json!(["seek", position_secs, "absolute"]))
    }

    fn set_volume(&mut self, volume: f32) -> anyhow::Result<()> {
        let vol_pct = (volume * 100.0).clamp(0.0, 100.0);
        self.enqueue("volume", None, json!(["set_property", "volume", vol_pct]))
    }

    fn release(&mut self) {
        if let Err(e) = self.enqueue("stop", None, json!(["stop"])) {
            debug!("{:#}", e);
        }
        // the command task drains the stop before seeing the closed queue
        let (closed, _) = mpsc::channel(1);
        self.queue = closed;
        for task in self.tasks.drain(1..) {
            task.abort();
        }
        info!("mpv: released (socket {})", self.driver.socket_name);
    }
}

async fn command_task(
    handle: MpvHandle,
    mut rx: mpsc::Receiver<Queued>,
    bound: mpsc::Sender<(u64, LoadToken)>,
    events: mpsc::Sender<ResourceEvent>,
) {
    // mpv numbers playlist entries from 1; used when a reply omits the id
    let mut last_entry = 0u64;
    while let Some(q) = rx.recv().await {
        match handle.send(q.command).await {
            Ok(reply) => {
                let Some(token) = q.token.filter(|_| q.what == "loadfile") else {
                    continue;
                };
                last_entry = reply
                    .get("data")
                    .and_then(|d| d.get("playlist_entry_id"))
                    .and_then(|id| id.as_u64())
                    .unwrap_or(last_entry + 1);
                let _ = bound.send((last_entry, token)).await;
            }
            Err(e) => {
                warn!("mpv: {} failed: {:#}", q.what, e);
                if let Some(token) = q.token {
                    let _ = events
                        .send(ResourceEvent::Rejected {
                            token,
                            reason: format!("{:#}", e),
                        })
                        .await;
                }
            }
        }
    }
    debug!("mpv: command task exiting");
}

async fn event_pump(
    mut rx: mpsc::Receiver<MpvEvent>,
    mut bound: mpsc::Receiver<(u64, LoadToken)>,
    events: mpsc::Sender<ResourceEvent>,
) {
    let mut entries = EntryTracker::default();
    loop {
        let mapped = tokio::select! {
            biased;
            Some((entry, token)) = bound.recv() => entries.bind(entry, token),
            ev = rx.recv() => match ev {
                Some(ev) => entries.observe(ev),
                None => break,
            },
        };
        for ev in mapped {
            if events.send(ev).await.is_err() {
                return;
            }
        }
    }
    warn!("mpv: event stream closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(raw: Value) -> MpvEvent {
        MpvEvent { raw }
    }

    #[test]
    fn test_translate_property_changes() {
        let t = LoadToken(3);
        assert_eq!(
            translate(
                &ev(json!({"event": "property-change", "id": OBS_TIME_POS, "name": "time-pos", "data": 12.5})),
                t
            ),
            Some(ResourceEvent::TimeUpdate { token: t, position: 12.5 })
        );
        assert_eq!(
            translate(
                &ev(json!({"event": "property-change", "id": OBS_DURATION, "name": "duration", "data": 201.0})),
                t
            ),
            Some(ResourceEvent::DurationChanged { token: t, duration: 201.0 })
        );
        // time-pos goes null between files
        assert_eq!(
            translate(
                &ev(json!({"event": "property-change", "id": OBS_TIME_POS, "name": "time-pos"})),
                t
            ),
            None
        );
    }

    #[test]
    fn test_translate_end_file_reasons() {
        let t = LoadToken(7);
        assert_eq!(
            translate(&ev(json!({"event": "end-file", "reason": "eof"})), t),
            Some(ResourceEvent::Ended { token: t })
        );
        assert_eq!(
            translate(
                &ev(json!({"event": "end-file", "reason": "error", "file_error": "unrecognized file format"})),
                t
            ),
            Some(ResourceEvent::Rejected {
                token: t,
                reason: "unrecognized file format".into()
            })
        );
        assert_eq!(translate(&ev(json!({"event": "end-file", "reason": "stop"})), t), None);
        assert_eq!(translate(&ev(json!({"event": "end-file", "reason": "quit"})), t), None);
    }

    #[test]
    fn test_translate_other_events() {
        let t = LoadToken(1);
        assert_eq!(
            translate(&ev(json!({"event": "playback-restart"})), t),
            Some(ResourceEvent::Started { token: t })
        );
        assert_eq!(translate(&ev(json!({"event": "file-loaded"})), t), None);
        assert_eq!(translate(&ev(json!({"event": "idle"})), t), None);
    }

    fn start(entry: u64) -> MpvEvent {
        ev(json!({"event": "start-file", "playlist_entry_id": entry}))
    }

    #[test]
    fn test_quick_reload_keeps_events_with_their_own_file() {
        let mut entries = EntryTracker::default();
        entries.bind(1, LoadToken(1));
        entries.bind(2, LoadToken(2));

        // file 1 starts and fails after file 2 was already requested
        assert!(entries.observe(start(1)).is_empty());
        assert_eq!(
            entries.observe(ev(json!({"event": "property-change", "id": OBS_DURATION, "data": 30.0}))),
            vec![ResourceEvent::DurationChanged {
                token: LoadToken(1),
                duration: 30.0
            }]
        );
        assert_eq!(
            entries.observe(ev(json!({
                "event": "end-file", "reason": "error", "file_error": "404 on file 1",
                "playlist_entry_id": 1
            }))),
            vec![ResourceEvent::Rejected {
                token: LoadToken(1),
                reason: "404 on file 1".into()
            }]
        );

        entries.observe(start(2));
        assert_eq!(
            entries.observe(ev(json!({"event": "property-change", "id": OBS_TIME_POS, "data": 1.0}))),
            vec![ResourceEvent::TimeUpdate {
                token: LoadToken(2),
                position: 1.0
            }]
        );
    }

    #[test]
    fn test_events_before_the_loadfile_reply_are_held() {
        let mut entries = EntryTracker::default();
        entries.observe(start(4));
        assert!(entries
            .observe(ev(json!({"event": "property-change", "id": OBS_DURATION, "data": 90.0})))
            .is_empty());

        // a late binding for an older entry releases nothing
        assert!(entries.bind(3, LoadToken(3)).is_empty());
        assert_eq!(
            entries.bind(4, LoadToken(9)),
            vec![ResourceEvent::DurationChanged {
                token: LoadToken(9),
                duration: 90.0
            }]
        );
        // a late end-file for the replaced entry keeps its own token
        assert_eq!(
            entries.observe(ev(json!({"event": "end-file", "reason": "eof", "playlist_entry_id": 3}))),
            vec![ResourceEvent::Ended { token: LoadToken(3) }]
        );
    }

    #[tokio::test]
    async fn test_event_pump_tags_by_playlist_entry() {
        let (mpv_tx, mpv_rx) = mpsc::channel(8);
        let (bound_tx, bound_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let pump = tokio::spawn(event_pump(mpv_rx, bound_rx, out_tx));

        bound_tx.send((1, LoadToken(1))).await.unwrap();
        bound_tx.send((2, LoadToken(2))).await.unwrap();
        mpv_tx.send(start(1)).await.unwrap();
        mpv_tx
            .send(ev(json!({"event": "end-file", "reason": "eof", "playlist_entry_id": 1})))
            .await
            .unwrap();
        mpv_tx.send(start(2)).await.unwrap();
        mpv_tx
            .send(ev(json!({"event": "property-change", "id": OBS_TIME_POS, "data": 1.0})))
            .await
            .unwrap();

        assert_eq!(out_rx.recv().await, Some(ResourceEvent::Ended { token: LoadToken(1) }));
        assert_eq!(
            out_rx.recv().await,
            Some(ResourceEvent::TimeUpdate {
                token: LoadToken(2),
                position: 1.0
            })
        );
        drop(mpv_tx);
        pump.await.unwrap();
    }

    #[tokio::test]
    async fn test_loadfile_reply_binds_its_entry() {
        let (req_tx, mut req_rx) = mpsc::channel::<PendingRequest>(8);
        let handle = MpvHandle { tx: req_tx };
        tokio::spawn(async move {
            while let Some(req) = req_rx.recv().await {
                let _ = req.reply.send(Ok(json!({
                    "error": "success",
                    "data": {"playlist_entry_id": 7},
                    "request_id": req.req_id
                })));
            }
        });

        let (queue_tx, queue_rx) = mpsc::channel(8);
        let (bound_tx, mut bound_rx) = mpsc::channel(8);
        let (out_tx, _out_rx) = mpsc::channel(8);
        tokio::spawn(command_task(handle, queue_rx, bound_tx, out_tx));

        queue_tx
            .send(Queued {
                what: "play",
                token: Some(LoadToken(5)),
                command: json!(["set_property", "pause", false]),
            })
            .await
            .unwrap();
        queue_tx
            .send(Queued {
                what: "loadfile",
                token: Some(LoadToken(5)),
                command: json!(["loadfile", "s1.mp3", "replace"]),
            })
            .await
            .unwrap();

        assert_eq!(bound_rx.recv().await, Some((7, LoadToken(5))));
    }

    #[tokio::test]
    async fn test_failed_load_is_reported_as_rejection() {
        let (req_tx, mut req_rx) = mpsc::channel::<PendingRequest>(8);
        let handle = MpvHandle { tx: req_tx };
        tokio::spawn(async move {
            while let Some(req) = req_rx.recv().await {
                let _ = req.reply.send(Err(anyhow::anyhow!("mpv error: loading failed")));
            }
        });

        let (queue_tx, queue_rx) = mpsc::channel(8);
        let (bound_tx, _bound_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        tokio::spawn(command_task(handle, queue_rx, bound_tx, out_tx));

        queue_tx
            .send(Queued {
                what: "volume",
                token: None,
                command: json!(["set_property", "volume", 50.0]),
            })
            .await
            .unwrap();
        queue_tx
            .send(Queued {
                what: "loadfile",
                token: Some(LoadToken(4)),
                command: json!(["loadfile", "nope.mp3", "replace"]),
            })
            .await
            .unwrap();

        match out_rx.recv().await {
            Some(ResourceEvent::Rejected { token, reason }) => {
                assert_eq!(token, LoadToken(4));
                assert!(reason.contains("loading failed"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }
}
