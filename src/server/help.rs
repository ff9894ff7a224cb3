/// Usage page served when no `url` parameter is given
pub const HELP_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>webdown</title>
  <style>
    body { font-family: system-ui, sans-serif; max-width: 46rem; margin: 3rem auto; padding: 0 1rem; line-height: 1.5; }
    code, pre { background: #f4f4f4; border-radius: 4px; padding: 0.1rem 0.3rem; }
    pre { padding: 0.8rem; overflow-x: auto; }
    td { padding: 0.2rem 0.8rem 0.2rem 0; vertical-align: top; }
  </style>
</head>
<body>
  <h1>webdown</h1>
  <p>Convert any web page, subreddit, post, profile or video link into markdown with YAML frontmatter.</p>

  <h2>Usage</h2>
  <pre>GET /?url=https://example.com</pre>

  <h2>Parameters</h2>
  <table>
    <tr><td><code>url</code></td><td>Absolute http(s) URL to convert (required)</td></tr>
    <tr><td><code>subpages=true</code></td><td>Also convert up to 10 same-site links found on the page</td></tr>
    <tr><td><code>nocache=true</code></td><td>Skip the cache and fetch a fresh copy</td></tr>
    <tr><td><code>llmFilter=true</code></td><td>Strip navigation and boilerplate with a language model</td></tr>
  </table>

  <h2>Response format</h2>
  <p>Send <code>Content-Type: application/json</code> to receive an array of
  <code>{url, md, error?, status?, errorDetails?}</code> objects. Any other content type returns
  the markdown document as plain text.</p>

  <h2>Rate limits</h2>
  <p>Anonymous callers are limited per IP address. Send <code>Authorization: Bearer &lt;token&gt;</code>
  with the configured API secret to bypass the limit.</p>

  <h2>Examples</h2>
  <pre>curl 'http://localhost:8787/?url=https://example.com'
curl -H 'Content-Type: application/json' 'http://localhost:8787/?url=https://example.com&amp;subpages=true'</pre>
</body>
</html>
"#;
