//! Renders assembled sections into the archive page and the email body.
//! Plain string assembly; every interpolated value is escaped.

use crate::section::{
    EventsData, InboxData, InboxMessage, NewsData, Section, SectionData, WeatherData,
};

const BASE_CSS: &str = "\
<style>
  body { font-family: -apple-system, Segoe UI, Roboto, Arial, sans-serif; background:#f6f7f9; margin:0; padding:24px; }
  .container { max-width: 980px; margin: 0 auto; }
  .h1 { font-size: 24px; margin: 0 0 12px 0; }
  .meta { color:#555; margin-bottom: 18px; }
  .card { background:#fff; border:1px solid #e6e8ec; border-radius: 12px; padding:16px; margin: 14px 0; box-shadow: 0 1px 1px rgba(0,0,0,.03); }
  .card h2 { font-size: 18px; margin: 0 0 10px 0; }
  table { width:100%; border-collapse: collapse; }
  th, td { text-align:left; padding:8px; border-bottom:1px solid #eee; vertical-align: top; }
  th { background:#fafafa; font-weight:600; }
  .pill { display:inline-block; padding:2px 8px; border-radius: 999px; background:#eef2ff; font-size:12px; }
  .small { color:#666; font-size: 12px; }
  a { color:#0b57d0; text-decoration:none; }
  a:hover { text-decoration:underline; }
  .two-col { display:grid; grid-template-columns: 1fr 1fr; gap: 12px; }
  @media (max-width: 760px) { .two-col { grid-template-columns: 1fr; } }
</style>
";

pub fn render_digest_html(digest_date: &str, sections: &[Section]) -> String {
    let cards: String = sections.iter().map(render_section).collect();
    format!(
        "<html><head><meta charset='utf-8'>{}</head><body><div class='container'>\
         <div class='h1'>Daily Digest — {}</div>\
         <div class='meta small'>Generated automatically.</div>\
         {}</div></body></html>",
        BASE_CSS,
        escape_html(digest_date),
        cards
    )
}

pub fn render_email_html(
    digest_date: &str,
    sections: &[Section],
    archive_url: Option<&str>,
) -> String {
    let mut cards = String::new();
    if let Some(url) = archive_url {
        cards.push_str(&format!(
            "<div class='card'><div><span class='pill'>Archive</span> \
             <a href='{}'>View today's digest page</a></div></div>",
            escape_html(url)
        ));
    }
    for section in sections {
        cards.push_str(&render_section(section));
    }
    format!(
        "<html><head><meta charset='utf-8'>{}</head><body><div class='container'>\
         <div class='h1'>Daily Digest — {}</div>\
         {}</div></body></html>",
        BASE_CSS,
        escape_html(digest_date),
        cards
    )
}

fn render_section(section: &Section) -> String {
    match &section.data {
        SectionData::Weather(data) => render_weather(&section.title, data),
        SectionData::News(data) => render_news(&section.title, data),
        SectionData::Events(data) => render_events(&section.title, data),
        SectionData::Inbox(data) => render_inbox(&section.title, data),
        SectionData::Error { error } => card(
            &section.title,
            &format!("<div class='small'>Error: {}</div>", escape_html(error)),
        ),
    }
}

fn card(title: &str, inner_html: &str) -> String {
    format!(
        "<div class='card'><h2>{}</h2>{}</div>",
        escape_html(title),
        inner_html
    )
}

fn render_weather(title: &str, data: &WeatherData) -> String {
    let mut cards_html = String::new();

    for c in &data.cards {
        if let Some(error) = &c.error {
            cards_html.push_str(&format!(
                "<div class='card'><div><strong>{}</strong></div>\
                 <div class='small'>Error: {}</div></div>",
                escape_html(&c.zip),
                escape_html(error)
            ));
            continue;
        }

        let mut rows = String::new();
        for r in &c.table {
            let rain = r
                .rain_chance
                .map(|v| format!("{}%", v))
                .unwrap_or_default();
            rows.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&r.date),
                r.high,
                r.low,
                escape_html(&rain)
            ));
        }
        let table_html = format!(
            "<table><thead><tr><th>Date</th><th>High</th><th>Low</th><th>Rain %</th></tr></thead>\
             <tbody>{}</tbody></table>",
            rows
        );

        let mut alerts_html = String::new();
        if !c.alerts.is_empty() {
            let mut alert_rows = String::new();
            for a in c.alerts.iter().take(10) {
                alert_rows.push_str(&format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                    escape_html(&a.event),
                    escape_html(&a.severity),
                    escape_html(&a.headline)
                ));
            }
            alerts_html = format!(
                "<div class='small' style='margin-top:10px;'><strong>Active Alerts</strong></div>\
                 <table><thead><tr><th>Event</th><th>Severity</th><th>Headline</th></tr></thead>\
                 <tbody>{}</tbody></table>",
                alert_rows
            );
        }

        cards_html.push_str(&format!(
            "<div class='card'><div><strong>{}</strong> <span class='small'>({})</span></div>{}{}</div>",
            escape_html(&c.zip),
            escape_html(&c.place),
            table_html,
            alerts_html
        ));
    }

    card(title, &format!("<div class='two-col'>{}</div>", cards_html))
}

fn render_news(title: &str, data: &NewsData) -> String {
    if let Some(error) = &data.error {
        return card(
            title,
            &format!("<div class='small'>Error: {}</div>", escape_html(error)),
        );
    }

    let mut rows = String::new();
    for item in &data.items {
        let meta = if item.seendate.is_empty() {
            item.domain.clone()
        } else {
            format!("{} • {}", item.domain, item.seendate)
        };
        rows.push_str(&format!(
            "<tr><td><a href='{}'>{}</a><div class='small'>{}</div></td></tr>",
            escape_html(&item.url),
            escape_html(&item.title),
            escape_html(&meta)
        ));
    }

    let html = format!(
        "<div class='small'>Query: {}</div>\
         <table><thead><tr><th>Top Headlines</th></tr></thead><tbody>{}</tbody></table>",
        escape_html(&data.query),
        rows
    );
    card(title, &html)
}

fn render_events(title: &str, data: &EventsData) -> String {
    if data.events.is_empty() {
        return card(title, "<div class='small'>No events found.</div>");
    }

    let mut rows = String::new();
    for e in data.events.iter().take(500) {
        rows.push_str(&format!(
            "<tr><td>{}</td><td><a href='{}'>{}</a><div class='small'>{}</div></td><td>{}</td></tr>",
            escape_html(&e.start),
            escape_html(e.html_link.as_deref().unwrap_or("")),
            escape_html(&e.summary),
            escape_html(&e.calendar),
            escape_html(e.location.as_deref().unwrap_or(""))
        ));
    }

    let html = format!(
        "<table><thead><tr><th>Start</th><th>Event</th><th>Location</th></tr></thead>\
         <tbody>{}</tbody></table>",
        rows
    );
    card(title, &html)
}

fn render_inbox(title: &str, data: &InboxData) -> String {
    let needs_html = if data.needs_response.is_empty() {
        "<div class='small'>No obvious question-style emails found.</div>".to_string()
    } else {
        message_table(&data.needs_response, 50)
    };

    let all_html = if data.items.is_empty() {
        "<div class='small'>No inbox messages found in the last 48 hours.</div>".to_string()
    } else {
        message_table(&data.items, 100)
    };

    let html = format!(
        "<div class='small'><span class='pill'>Needs Response</span></div>{}\
         <div style='height:14px;'></div>\
         <div class='small'><span class='pill'>All Inbox (48h)</span> Query: {}</div>{}",
        needs_html,
        escape_html(&data.query),
        all_html
    );
    card(title, &html)
}

fn message_table(messages: &[InboxMessage], limit: usize) -> String {
    let mut rows = String::new();
    for m in messages.iter().take(limit) {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td><strong>{}</strong>\
             <div class='small'>{}</div></td></tr>",
            escape_html(&m.date),
            escape_html(&m.from),
            escape_html(&m.subject),
            escape_html(&m.snippet)
        ));
    }
    format!(
        "<table><thead><tr><th>Date</th><th>From</th><th>Message</th></tr></thead>\
         <tbody>{}</tbody></table>",
        rows
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
