//! Human-Facing Pages
//!
//! The landing page and the per-channel observer page. Both are rendered
//! inline; the observer page connects to `/ws/{channel}`, splits frames on
//! newlines and posts override updates to `/api/{channel}/update`.

use axum::{
    extract::{Path, State},
    response::Html,
};
use tracing::instrument;

use crate::api::AppState;

const STYLE: &str = r"
body { font-family: ui-monospace, monospace; margin: 2rem; background: #0f1420; color: #d8dee9; }
a { color: #88c0d0; }
input, select, button, textarea { font: inherit; padding: .3rem .5rem; }
.entry { border-top: 1px solid #2e3440; padding: .5rem 0; }
.entry pre { white-space: pre-wrap; background: #151b29; padding: .5rem; display: none; }
.entry.open pre { display: block; }
.status { color: #a3be8c; }
";

/// Landing page.
///
/// GET /
pub async fn landing(State(state): State<AppState>) -> Html<String> {
    let domain = escape_html(&state.config.hook_domain);
    let public_url = escape_html(&state.config.public_url);

    Html(format!(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>hooktap</title><style>{STYLE}</style></head>
<body>
<h1>hooktap</h1>
<p>Pick a listener name, open its page, then point webhooks at
<code>http://&lt;name&gt;.{domain}/</code> or <code>{public_url}/hook/&lt;name&gt;</code>.</p>
<form onsubmit="location.href='/_/'+encodeURIComponent(this.name.value);return false;">
<input name="name" placeholder="listener name" required> .{domain}
<button type="submit">Go</button>
</form>
</body>
</html>"#
    ))
}

/// Observer page for one channel.
///
/// GET /_/{channel}
#[instrument(skip(state))]
pub async fn observer(State(state): State<AppState>, Path(channel): Path<String>) -> Html<String> {
    let title = escape_html(&channel);
    let domain = escape_html(&state.config.hook_domain);
    let public_url = escape_html(&state.config.public_url);
    let channel_js = js_string(&channel);

    Html(format!(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>{title} - hooktap</title><style>{STYLE}</style></head>
<body>
<h1>{title}</h1>
<p>Send webhooks to <code>http://{title}.{domain}/</code> or
<code>{public_url}/hook/{title}</code>. <span class="status" id="status">connecting</span></p>
<form id="override">
<select name="statusCode">
<option value="200">200 OK</option><option value="201">201 Created</option>
<option value="202">202 Accepted</option><option value="204">204 No Content</option>
<option value="400">400 Bad Request</option><option value="401">401 Unauthorized</option>
<option value="403">403 Forbidden</option><option value="404">404 Not Found</option>
<option value="500">500 Internal Server Error</option><option value="503">503 Service Unavailable</option>
</select>
<input name="responseBody" placeholder="response body (empty echoes the request)" size="48">
<button type="submit">Set response</button>
</form>
<div id="log"></div>
<script>
const channel = {channel_js};
const log = document.getElementById("log");
const status = document.getElementById("status");

function show(msg) {{
  const entry = document.createElement("div");
  entry.className = "entry";
  const head = document.createElement("div");
  head.textContent = msg.timestamp + "  " + msg.request.Method + " " + msg.request.Host + msg.url + " " + msg.request.Proto;
  head.onclick = () => entry.classList.toggle("open");
  const dump = document.createElement("pre");
  dump.textContent = msg.dump;
  entry.append(head, dump);
  log.prepend(entry);
}}

function connect() {{
  const scheme = location.protocol === "https:" ? "wss://" : "ws://";
  const ws = new WebSocket(scheme + location.host + "/ws/" + encodeURIComponent(channel));
  ws.onopen = () => status.textContent = "listening";
  ws.onclose = () => {{ status.textContent = "disconnected, retrying"; setTimeout(connect, 2000); }};
  ws.onmessage = (ev) => {{
    for (const frame of ev.data.split("\n")) {{
      if (frame.length === 0) continue;
      try {{ show(JSON.parse(frame)); }} catch (e) {{ console.error(e); }}
    }}
  }};
}}

document.getElementById("override").onsubmit = (ev) => {{
  ev.preventDefault();
  const form = ev.target;
  fetch("/api/" + encodeURIComponent(channel) + "/update", {{
    method: "POST",
    headers: {{ "Content-Type": "application/json" }},
    body: JSON.stringify({{
      statusCode: parseInt(form.statusCode.value, 10),
      responseBody: form.responseBody.value,
    }}),
  }});
}};

connect();
</script>
</body>
</html>"#
    ))
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// A JS string literal that cannot close the surrounding script tag.
fn js_string(raw: &str) -> String {
    serde_json::Value::from(raw)
        .to_string()
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
}
