//! HTML rendering for the browser-facing pages.

use std::time::Duration;

const HEAD: &str = "<html>\n<head>\n<title>Memphis Search</title>\n</head>\n<body>\n\
<div><h1 align='center' style='padding-top:5%'>Memphis Search</h1></div>\n\
<form action='/results' method='get'>\n\
<div style='text-align:center'><input type='text' style='height:50px' name='searchQuery' size='100' placeholder='What would you like to search?'></div>\n\
<div style='text-align:center'><input type='submit' style='height:36px;font-size:16px' value='Search'/></div>\n\
</form>\n";

const TAIL: &str = "</body></html>\n";

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

pub fn start_page() -> String {
    [HEAD, TAIL].concat()
}

/// Search form, elapsed time, then the numbered ranking or a "no results" notice.
pub fn results_page(query: &str, links: &[(String, f64)], elapsed: Duration) -> String {
    let q = escape(query);
    let mut page = String::from(HEAD);
    if links.is_empty() {
        page.push_str(&format!(
            "<div style='text-align:center; margin-top:50px'>No results found for \"{q}\". Please try a new query.</div>\n"
        ));
    } else {
        page.push_str(&format!("<div style='text-align:center'>Showing {} results for \"{q}\"</div>\n", links.len()));
    }
    page.push_str(&format!(
        "<div style='text-align:center;margin-bottom:10px'>({:.6} s)</div>\n",
        elapsed.as_secs_f64()
    ));
    for (rank, (link, score)) in links.iter().enumerate() {
        let href = escape(link);
        page.push_str(&format!(
            "<div style='text-align:center;margin-bottom:5px'>{} ({score:.5}): <a href=\"{href}\" target=\"_blank\">{href}</a></div><br/>\n",
            rank + 1
        ));
    }
    page.push_str(TAIL);
    page
}
