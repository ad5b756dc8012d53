//! XMLTV export
//!
//! Programme times are rendered in UTC and then passed through
//! [`XmltvTimezoneRewriter`], which rewrites every `YYYYMMDDhhmmss +zzzz`
//! timestamp into the provider's zone. Clients that ignore the offset and
//! read the wall-clock digits then see the same local times the provider
//! uses for catch-up.

use std::sync::LazyLock;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures::{Stream, StreamExt};
use quick_xml::escape::escape;
use regex::{Captures, Regex};
use tracing::debug;

use crate::errors::TimeshiftResult;
use crate::models::{Channel, Program, User};
use crate::repositories::{ChannelCatalog, EpgRepository};
use crate::utils::time::XMLTV_FORMAT;

static XMLTV_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{14}) ([+-]\d{4})").expect("XMLTV timestamp pattern is valid")
});

pub const XMLTV_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<!DOCTYPE tv SYSTEM \"xmltv.dtd\">\n\
<tv generator-info-name=\"xc-timeshift\">\n";

pub const XMLTV_FOOTER: &str = "</tv>\n";

/// Identifier used for a channel in the XMLTV document
pub fn channel_key(channel: &Channel) -> String {
    channel
        .tvg_id
        .clone()
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| channel.id.to_string())
}

pub fn render_channel(channel: &Channel) -> String {
    let mut out = format!("  <channel id=\"{}\">\n", escape(&channel_key(channel)));
    out.push_str(&format!(
        "    <display-name>{}</display-name>\n",
        escape(&channel.name)
    ));
    if let Some(logo) = channel.logo_url.as_deref().filter(|l| !l.is_empty()) {
        out.push_str(&format!("    <icon src=\"{}\"/>\n", escape(logo)));
    }
    out.push_str("  </channel>\n");
    out
}

pub fn render_programme(program: &Program, key: &str) -> String {
    let mut out = format!(
        "  <programme start=\"{}\" stop=\"{}\" channel=\"{}\">\n",
        program.start_time.format(XMLTV_FORMAT),
        program.end_time.format(XMLTV_FORMAT),
        escape(key)
    );
    out.push_str(&format!("    <title>{}</title>\n", escape(&program.title)));
    if let Some(desc) = program.description.as_deref().filter(|d| !d.is_empty()) {
        out.push_str(&format!("    <desc>{}</desc>\n", escape(desc)));
    }
    out.push_str("  </programme>\n");
    out
}

/// Render the document for `user` as UTC fragments, header to footer
pub async fn render_xmltv(
    catalog: &dyn ChannelCatalog,
    epg: &dyn EpgRepository,
    user: &User,
    since: DateTime<Utc>,
) -> TimeshiftResult<Vec<String>> {
    let channels: Vec<Channel> = catalog
        .list_channels()
        .await?
        .into_iter()
        .filter(|c| user.is_admin() || user.can_access(c))
        .collect();

    let mut fragments = Vec::with_capacity(channels.len() * 2 + 2);
    fragments.push(XMLTV_HEADER.to_string());
    for channel in &channels {
        fragments.push(render_channel(channel));
    }

    let mut programme_count = 0;
    for channel in &channels {
        let key = channel_key(channel);
        for program in epg.programs_since(channel.id, since).await? {
            fragments.push(render_programme(&program, &key));
            programme_count += 1;
        }
    }
    fragments.push(XMLTV_FOOTER.to_string());

    debug!(
        "XMLTV rendered: channels={} programmes={}",
        channels.len(),
        programme_count
    );
    Ok(fragments)
}

/// Line-buffered rewrite of XMLTV timestamps into one timezone
///
/// Input may be split anywhere; only complete lines are rewritten, the
/// remainder waits for the next chunk or [`finish`](Self::finish).
pub struct XmltvTimezoneRewriter {
    tz: Tz,
    pending: Vec<u8>,
}

impl XmltvTimezoneRewriter {
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            pending: Vec::new(),
        }
    }

    /// Feed a chunk, returning the rewritten complete lines
    pub fn push(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        match self.pending.iter().rposition(|b| *b == b'\n') {
            Some(pos) => {
                let rest = self.pending.split_off(pos + 1);
                let complete = std::mem::replace(&mut self.pending, rest);
                self.rewrite(&String::from_utf8_lossy(&complete))
            }
            None => String::new(),
        }
    }

    /// Flush whatever is left after the last newline
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        self.rewrite(&String::from_utf8_lossy(&rest))
    }

    /// Rewrite every timestamp in `text`; unparseable ones are kept
    pub fn rewrite(&self, text: &str) -> String {
        XMLTV_TIMESTAMP
            .replace_all(text, |caps: &Captures<'_>| {
                let raw = format!("{} {}", &caps[1], &caps[2]);
                match DateTime::parse_from_str(&raw, XMLTV_FORMAT) {
                    Ok(dt) => dt.with_timezone(&self.tz).format(XMLTV_FORMAT).to_string(),
                    Err(_) => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

/// Apply [`XmltvTimezoneRewriter`] to a byte stream
pub fn rewrite_stream<S, E>(input: S, tz: Tz) -> impl Stream<Item = Result<Bytes, E>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Send + 'static,
{
    async_stream::stream! {
        let mut rewriter = XmltvTimezoneRewriter::new(tz);
        let mut input = Box::pin(input);
        while let Some(chunk) = input.next().await {
            match chunk {
                Ok(bytes) => {
                    let out = rewriter.push(&bytes);
                    if !out.is_empty() {
                        yield Ok(Bytes::from(out));
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
        let tail = rewriter.finish();
        if !tail.is_empty() {
            yield Ok(Bytes::from(tail));
        }
    }
}
