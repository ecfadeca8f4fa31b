//! Viewer page served at `/`.

const TEMPLATE: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>camrelay</title>
  <style>
    body { margin: 0; background: #101418; color: #e8e8e8; font-family: system-ui, sans-serif; }
    form { display: flex; gap: 8px; padding: 12px 16px; background: rgba(0,0,0,0.25); }
    input { flex: 1; padding: 6px 8px; border-radius: 8px; border: 1px solid #333; background: #0b0e11; color: inherit; }
    img { display: block; max-width: 100%; margin: 0 auto; }
  </style>
</head>
<body>
  <form id="source">
    <input id="src" name="src" type="text" value="" placeholder="{{SOURCE}}" autocomplete="off" />
    <button type="submit">Watch</button>
  </form>
  <img id="feed" alt="live stream" src="/video_feed" />
  <script>
    const $src = document.getElementById('src');
    const $feed = document.getElementById('feed');
    const watch = src => {
      $feed.src = src ? `/video_feed?src=${encodeURIComponent(src)}` : '/video_feed';
    };
    const saved = localStorage.getItem('camrelay_src');
    if (saved) { $src.value = saved; watch(saved); }
    document.getElementById('source').addEventListener('submit', ev => {
      ev.preventDefault();
      const src = $src.value.trim();
      if (src) {
        localStorage.setItem('camrelay_src', src);
      } else {
        localStorage.removeItem('camrelay_src');
      }
      watch(src);
    });
  </script>
</body>
</html>
"#;

/// Render the viewer page with `default_source` as the input placeholder.
///
/// The input itself starts empty, so submitting it unchanged streams the
/// configured default. Callers pass the redacted descriptor.
pub fn render_index(default_source: &str) -> String {
    TEMPLATE.replace("{{SOURCE}}", &escape(default_source))
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
