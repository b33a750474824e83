//! Web player entry page
//!
//! `GET /{chat_id}` serves a self-contained HTML player that opens a
//! WebSocket back to `/ws/{chat_id}` and switches between an audio and
//! a video element as payloads arrive. The page is static apart from
//! the chat id; authorization happens on the Telegram side.

use axum::{
    extract::{Path, State},
    response::Html,
};

use crate::AppState;

pub async fn player_page(
    Path(chat_id): Path<i64>,
    State(state): State<AppState>,
) -> Html<String> {
    let ws_scheme = if state.config.server.protocol == "https" {
        "wss"
    } else {
        "ws"
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>WebBridge Player</title>
<style>
  body {{ margin: 0; background: #111; color: #ddd; font-family: sans-serif; }}
  #stage {{ display: flex; flex-direction: column; align-items: center; padding: 1rem; }}
  video, audio {{ width: 100%; max-width: 960px; }}
  #title {{ margin: 0.5rem 0; font-size: 1rem; word-break: break-all; }}
  #status {{ color: #888; font-size: 0.8rem; }}
</style>
</head>
<body>
<div id="stage">
  <p id="title">Waiting for media...</p>
  <video id="video" controls autoplay hidden></video>
  <audio id="audio" controls autoplay hidden></audio>
  <p id="status">connecting</p>
</div>
<script>
(function () {{
  var video = document.getElementById("video");
  var audio = document.getElementById("audio");
  var title = document.getElementById("title");
  var status = document.getElementById("status");

  function play(payload) {{
    var isVideo = payload.mimeType.indexOf("video/") === 0 ||
                  payload.mimeType.indexOf("image/") === 0 ||
                  payload.isAnimation === "true";
    var active = isVideo ? video : audio;
    var idle = isVideo ? audio : video;
    idle.pause();
    idle.hidden = true;
    idle.removeAttribute("src");
    active.hidden = false;
    active.src = payload.url;
    active.play().catch(function () {{}});
    title.textContent = payload.title || payload.fileName;
  }}

  function connect() {{
    var ws = new WebSocket("{ws_scheme}://" + location.host + "/ws/{chat_id}");
    ws.onopen = function () {{ status.textContent = "connected"; }};
    ws.onmessage = function (event) {{
      try {{ play(JSON.parse(event.data)); }} catch (e) {{}}
    }};
    ws.onclose = function () {{
      status.textContent = "disconnected, retrying";
      setTimeout(connect, 2000);
    }};
  }}
  connect();
}})();
</script>
</body>
</html>
"#
    ))
}
