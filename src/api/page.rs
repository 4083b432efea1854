//! Server-rendered search page.

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0 2rem; color: #1f2328; }
.columns { display: grid; grid-template-columns: 1fr 2fr; gap: 2rem; }
.info { background: #e8f1fb; border-radius: 6px; padding: 1rem 1.25rem; }
input[type=text] { width: 100%; padding: .5rem; box-sizing: border-box; }
button { margin-top: .75rem; padding: .5rem 1rem; }
#spinner { display: none; margin-top: 1rem; font-style: italic; }
footer { margin-top: 2rem; border-top: 1px solid #d0d7de; padding: 1rem 0; color: #656d76; }
"#;

const INSTRUCTIONS: &str = "<div class=\"info\"><h3>Instructions</h3>\
<p>Enter a subject in the text box on the left and click 'Search for News' to see the latest news about your topic.</p>\
<p>The results will appear here.</p></div>\
<h3>Results will appear here</h3><hr><p><em>Waiting for your search query...</em></p>";

/// Render the whole page. `results` is markdown; empty shows the instructions.
pub fn render(app_name: &str, subject_max_chars: usize, results: &str) -> String {
    let results_html = if results.is_empty() {
        INSTRUCTIONS.to_string()
    } else {
        // Raw HTML in the markdown is escaped, not passed through.
        markdown::to_html(results)
    };
    let app_name = escape_html(app_name);

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{app_name}</title>
<style>{STYLE}</style>
</head>
<body>
<h1>Your News</h1>
<div class="columns">
<section>
<form method="post" action="/search" onsubmit="var s=document.getElementById('spinner');s.textContent='Searching for news about '+this.subject.value+'...';s.style.display='block';">
<label for="subject">Enter a subject to search for news about:</label>
<input type="text" id="subject" name="subject" maxlength="{subject_max_chars}" autofocus>
<button type="submit">Search for News</button>
<div id="spinner"></div>
</form>
</section>
<section id="results">
{results_html}
</section>
</div>
<footer>{app_name} | Built with Rust</footer>
</body>
</html>
"#
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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
