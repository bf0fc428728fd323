//! HTML rendering for the catalog pages.
//!
//! Pages are plain strings assembled around a shared layout. Every value
//! that originates from a user or the index goes through [`escape`].

use std::fmt::Write;

use crate::models::{ItemRecord, SearchPage, Welcome};

/// Escape text for HTML element content and double-quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

/// Link to an item page, with the id form-encoded for the query string.
fn item_href(id: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(id.as_bytes()).collect();
    escape(&format!("/items/?id={}", encoded))
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title} · Inventopedia</title>
<link rel="stylesheet" href="/static/style.css">
</head>
<body>
<nav><a href="/">Home</a> <a href="/create/">New item</a></nav>
<form class="search" action="/search/" method="get">
<input type="text" name="name" placeholder="Exact item name">
<button type="submit">Search</button>
</form>
<main>
{body}
</main>
</body>
</html>
"#,
        title = escape(title),
        body = body
    )
}

pub fn landing(welcome: &Welcome) -> String {
    let body = format!(
        "<h1>Welcome, {}</h1>\n<p class=\"time\">{}</p>\n",
        escape(&welcome.name),
        escape(&welcome.time)
    );
    layout("Welcome", &body)
}

fn item_details(record: &ItemRecord) -> String {
    let item = &record.item;
    let mut out = String::new();
    let _ = writeln!(out, "<h1>{}</h1>", escape(&item.name));
    let _ = writeln!(out, "<dl>");
    let _ = writeln!(out, "<dt>Id</dt><dd>{}</dd>", escape(&record.id));
    let _ = writeln!(
        out,
        "<dt>Description</dt><dd>{}</dd>",
        escape(&item.description)
    );
    let _ = writeln!(out, "<dt>Stock</dt><dd class=\"stock\">{}</dd>", item.stock);
    if let Some(ref image) = item.image {
        let _ = writeln!(
            out,
            "<dt>Image</dt><dd><img src=\"{}\" alt=\"{}\"></dd>",
            escape(image),
            escape(&item.name)
        );
    }
    if let Some(created) = item.created {
        let _ = writeln!(
            out,
            "<dt>Created</dt><dd>{}</dd>",
            created.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    if !item.tags.is_empty() {
        let tags: Vec<String> = item.tags.iter().map(|t| escape(t)).collect();
        let _ = writeln!(out, "<dt>Tags</dt><dd>{}</dd>", tags.join(", "));
    }
    if let Some(loc) = item.location {
        let _ = writeln!(out, "<dt>Location</dt><dd>{}, {}</dd>", loc.lat, loc.lon);
    }
    let _ = writeln!(out, "</dl>");
    out
}

fn item_forms(id: &str) -> String {
    let id = escape(id);
    format!(
        r#"<form action="/edit/" method="post">
<input type="hidden" name="id" value="{id}">
<input type="text" name="name" placeholder="New name">
<button type="submit">Rename</button>
</form>
<form action="/stock/" method="post">
<input type="hidden" name="id" value="{id}">
<input type="number" name="by" value="1" min="1">
<button type="submit">Add stock</button>
</form>
"#
    )
}

/// Item detail page.
pub fn item(record: &ItemRecord) -> String {
    let body = format!("{}{}", item_details(record), item_forms(&record.id));
    layout(&record.item.name, &body)
}

/// Item page for an id the index does not know.
pub fn item_not_found(id: &str) -> String {
    let body = if id.is_empty() {
        "<h1>Item</h1>\n<p class=\"notice\">No item id given.</p>\n".to_string()
    } else {
        format!(
            "<h1>Item</h1>\n<p class=\"notice\">No item with id {}.</p>\n",
            escape(id)
        )
    };
    layout("Item not found", &body)
}

/// Create form, optionally with a validation message and prior input.
pub fn create_form(message: Option<&str>, name: &str, description: &str) -> String {
    let notice = message
        .map(|m| format!("<p class=\"notice\">{}</p>\n", escape(m)))
        .unwrap_or_default();
    let body = format!(
        r#"<h1>New item</h1>
{notice}<form action="/create/" method="post">
<label>Name <input type="text" name="name" value="{name}"></label>
<label>Description <textarea name="description">{description}</textarea></label>
<button type="submit">Create</button>
</form>
"#,
        notice = notice,
        name = escape(name),
        description = escape(description)
    );
    layout("New item", &body)
}

pub fn created(record: &ItemRecord) -> String {
    let body = format!(
        "<p class=\"notice\">Created <a href=\"{}\">{}</a>.</p>\n{}",
        item_href(&record.id),
        escape(&record.item.name),
        item_details(record)
    );
    layout("Item created", &body)
}

/// Search results page.
pub fn list(query: &str, page: &SearchPage) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "<h1>Items named “{}”</h1>", escape(query));

    if page.items.is_empty() {
        let _ = writeln!(body, "<p class=\"empty\">Found no items.</p>");
    } else {
        let _ = writeln!(
            body,
            "<p class=\"total\">{} of {} matching items</p>",
            page.items.len(),
            page.total
        );
        let _ = writeln!(
            body,
            "<table>\n<tr><th>Name</th><th>Description</th><th>Stock</th></tr>"
        );
        for record in &page.items {
            let _ = writeln!(
                body,
                "<tr><td><a href=\"{}\">{}</a></td><td>{}</td><td>{}</td></tr>",
                item_href(&record.id),
                escape(&record.item.name),
                escape(&record.item.description),
                record.item.stock
            );
        }
        let _ = writeln!(body, "</table>");
    }
    if page.skipped > 0 {
        let _ = writeln!(
            body,
            "<p class=\"notice\">{} unreadable documents were left out.</p>",
            page.skipped
        );
    }

    layout("Search", &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Item;

    fn record(name: &str) -> ItemRecord {
        ItemRecord {
            id: "abc".to_string(),
            version: Some(1),
            item: Item::new(name, "<b>bold</b> & more"),
        }
    }

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_landing_shows_name() {
        let html = landing(&Welcome {
            name: "<Ana>".to_string(),
            time: "Jan  2 15:04:05".to_string(),
        });
        assert!(html.contains("Welcome, &lt;Ana&gt;"));
        assert!(!html.contains("<Ana>"));
    }

    #[test]
    fn test_item_page_escapes_fields() {
        let html = item(&record("Chair"));
        assert!(html.contains("<h1>Chair</h1>"));
        assert!(html.contains("&lt;b&gt;bold&lt;/b&gt; &amp; more"));
        assert!(html.contains(r#"name="id" value="abc""#));
        assert!(!html.contains("Tags"));
    }

    #[test]
    fn test_list_empty_and_skipped() {
        let html = list(
            "chair",
            &SearchPage {
                total: 1,
                items: vec![],
                skipped: 1,
            },
        );
        assert!(html.contains("Found no items."));
        assert!(html.contains("1 unreadable documents"));
    }

    #[test]
    fn test_list_rows_link_to_items() {
        let html = list(
            "Chair",
            &SearchPage {
                total: 1,
                items: vec![record("Chair")],
                skipped: 0,
            },
        );
        assert!(html.contains(r#"<a href="/items/?id=abc">Chair</a>"#));
        assert!(html.contains("1 of 1 matching items"));
    }

    #[test]
    fn test_item_links_encode_ids() {
        let mut odd = record("Chair");
        odd.id = "a&b+c d".to_string();
        let expected = r#"href="/items/?id=a%26b%2Bc+d""#;

        let html = list(
            "Chair",
            &SearchPage {
                total: 1,
                items: vec![odd.clone()],
                skipped: 0,
            },
        );
        assert!(html.contains(expected), "{}", html);
        assert!(created(&odd).contains(expected));
    }

    #[test]
    fn test_create_form_keeps_input() {
        let html = create_form(Some("item name must not be empty"), "", "desc");
        assert!(html.contains("item name must not be empty"));
        assert!(html.contains("<textarea name=\"description\">desc</textarea>"));
    }
}
