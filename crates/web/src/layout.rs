//! Page chrome shared by every HTML response

use viewkit_common::markup::escape_html;
use viewkit_common::Markup;

/// Wrap a body fragment in a complete HTML document
pub fn page(title: &str, body: &Markup) -> Markup {
    Markup::from_trusted(format!(
        r#"<!doctype html>
<html>
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>{title}</title>
    <style>
      body {{ font-family: ui-sans-serif, system-ui, -apple-system, Segoe UI, Roboto, Helvetica, Arial; padding: 18px; max-width: 920px; margin: 0 auto; }}
      .card {{ border: 1px solid #e5e7eb; border-radius: 10px; padding: 14px 16px; margin: 12px 0; }}
      .sample-button {{ display: inline-block; margin: 4px 8px 4px 0; }}
      .sample-button__link {{ display: inline-block; padding: 10px 12px; border-radius: 8px; background: #111827; color: #fff; text-decoration: none; }}
      .hint {{ color: #6b7280; }}
      code {{ background: #f3f4f6; padding: 2px 6px; border-radius: 6px; }}
    </style>
  </head>
  <body>
    <main>
{body}
    </main>
  </body>
</html>"#,
        title = escape_html(title),
        body = body,
    ))
}

/// A page reporting an error message
pub fn error_page(title: &str, message: &str) -> Markup {
    let body = Markup::from_trusted(format!(
        "<h1>{}</h1>\n<p class=\"error\">{}</p>",
        escape_html(title),
        escape_html(message)
    ));
    page(title, &body)
}
