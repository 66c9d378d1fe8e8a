//! Inline HTML pages and static assets

/// Browser-side chat script: posts to /api/chat and keeps history in
/// sessionStorage.
pub const CHAT_SCRIPT: &str = r"const chatWindow = document.getElementById('chat-window');
const chatForm = document.getElementById('chat-form');
const messageInput = document.getElementById('message');

function appendMessage(role, text) {
    const div = document.createElement('div');
    div.className = role;
    div.textContent = text;
    chatWindow.appendChild(div);
    chatWindow.scrollTop = chatWindow.scrollHeight;
}

function loadHistory() {
    const history = JSON.parse(sessionStorage.getItem('chatHistory') || '[]');
    history.forEach(item => appendMessage(item.role, item.text));
}

function saveMessage(role, text) {
    const history = JSON.parse(sessionStorage.getItem('chatHistory') || '[]');
    history.push({role, text});
    sessionStorage.setItem('chatHistory', JSON.stringify(history));
}

chatForm.addEventListener('submit', async (e) => {
    e.preventDefault();
    const text = messageInput.value.trim();
    if (!text) return;
    appendMessage('user', text);
    saveMessage('user', text);
    messageInput.value = '';
    const resp = await fetch('/api/chat', {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify({message: text})
    });
    const data = await resp.json();
    if (data.answer) {
        appendMessage('assistant', data.answer);
        saveMessage('assistant', data.answer);
    } else {
        appendMessage('error', data.error || 'Error');
    }
});

loadHistory();
";

/// Chat page for an authenticated user
pub fn index_page(display_name: &str) -> String {
    let name = escape_html(display_name);
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Chat Portal</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            max-width: 640px;
            margin: 2rem auto;
            padding: 0 1rem;
        }}
        header {{ display: flex; justify-content: space-between; align-items: baseline; }}
        #chat-window {{
            border: 1px solid #ccc;
            border-radius: 8px;
            height: 60vh;
            overflow-y: auto;
            padding: 0.5rem;
            margin: 1rem 0;
        }}
        #chat-window .user {{ text-align: right; color: #1a4f8b; margin: 0.25rem 0; }}
        #chat-window .assistant {{ text-align: left; margin: 0.25rem 0; }}
        #chat-window .error {{ color: #c0392b; font-style: italic; }}
        #chat-form {{ display: flex; gap: 0.5rem; }}
        #message {{ flex: 1; padding: 0.5rem; }}
    </style>
</head>
<body>
    <header>
        <h1>Chat Portal</h1>
        <span>{name} &middot; <a href="/logout">Sign out</a></span>
    </header>
    <div id="chat-window"></div>
    <form id="chat-form">
        <input id="message" type="text" autocomplete="off" placeholder="Ask something...">
        <button type="submit">Send</button>
    </form>
    <script src="/static/chat.js"></script>
</body>
</html>"#
    )
}

/// Minimal HTML escaping for values interpolated into pages
fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
