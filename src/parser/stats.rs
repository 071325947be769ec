//! Per-conversation message statistics, ported from
//! `skypedata.py::MessageParser`'s `stats`/`get_collected_stats` pair.
//! Word-cloud text accumulation stays a pure collaborator interface
//! ([`WordCloudSink`]); the frequency algorithm itself is out of scope.

use std::collections::HashMap;

use crate::parser::dom::DomNode;
use crate::parser::rewrite::{MessageContext, SharedMediaInfo};

/// Accepts plaintext fragments (quote bodies, emphasis runs, root text) as
/// `parse` walks each message; a real word-cloud frequency pass lives
/// outside this crate and implements this trait itself.
pub trait WordCloudSink {
    fn add_text(&mut self, author: &str, text: &str);
}

/// A sink that drops every fragment; the default when no collector is wired up.
#[derive(Debug, Default)]
pub struct NullWordCloudSink;

impl WordCloudSink for NullWordCloudSink {
    fn add_text(&mut self, _author: &str, _text: &str) {}
}

#[derive(Debug, Clone, Default)]
pub struct AuthorCounts {
    pub messages: u64,
    pub chars: u64,
    pub smses: u64,
    pub smschars: u64,
    pub files: u64,
    pub bytes: u64,
    pub shares: u64,
    pub sharebytes: u64,
    pub call_seconds: u64,
}

#[derive(Debug, Clone, Default)]
pub struct WorkHistogram {
    /// `hours[hour][author] -> count`
    pub hours: HashMap<u32, HashMap<String, u64>>,
    /// `days[date (days since epoch)][author] -> count`
    pub days: HashMap<i64, HashMap<String, u64>>,
    /// Earliest `(timestamp, message_id)` seen per date bucket.
    pub earliest_per_day: HashMap<i64, (i64, i64)>,
}

/// Accumulates statistics across a sequence of [`MessageContext`]s handed to
/// [`Stats::record`], mirroring `MessageParser(stats=True)`'s running state.
#[derive(Debug, Default)]
pub struct Stats {
    pub per_author: HashMap<String, AuthorCounts>,
    pub emoticons: HashMap<String, HashMap<String, u64>>,
    pub links: HashMap<String, Vec<String>>,
    pub shared_media: HashMap<i64, SharedMediaInfo>,
    pub histogram: WorkHistogram,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one parsed message into the running totals. `dom` is the
    /// rewritten body (post [`crate::parser::rewrite::parse_message_dom`]);
    /// `shared_media`, if any, is recorded against `ctx.id`.
    pub fn record(&mut self, ctx: &MessageContext, dom: &DomNode, shared_media: Option<SharedMediaInfo>, sink: &mut dyn WordCloudSink) {
        let counts = self.per_author.entry(ctx.author.clone()).or_default();
        counts.messages += 1;
        let body_text = dom.all_text();
        counts.chars += body_text.chars().count() as u64;

        if ctx.msg_type == crate::parser::message_types::MESSAGE_TYPE_SMS {
            counts.smses += 1;
            counts.smschars += body_text.chars().count() as u64;
        }
        if ctx.msg_type == crate::parser::message_types::MESSAGE_TYPE_FILE {
            counts.files += ctx.transfers.len().max(1) as u64;
            counts.bytes += ctx.transfers.iter().filter_map(|t| t.filesize).sum::<i64>() as u64;
        }
        if let Some(media) = &shared_media {
            counts.shares += 1;
            counts.sharebytes += media.filesize.unwrap_or(0) as u64;
            self.shared_media.insert(ctx.id, media.clone());
        }

        for ss in dom.iter_tag("ss") {
            if let Some(kind) = ss.get_attr("type") {
                *self
                    .emoticons
                    .entry(ctx.author.clone())
                    .or_default()
                    .entry(kind.to_string())
                    .or_insert(0) += 1;
            }
        }

        for a in dom.iter_tag("a") {
            if let Some(text) = &a.text {
                self.links.entry(ctx.author.clone()).or_default().push(text.clone());
            }
        }

        for text_node in collect_cloud_text(dom) {
            sink.add_text(&ctx.author, &text_node);
        }

        record_timeline(&mut self.histogram, ctx);
    }
}

/// Collects "cloud text": ordinary text nodes, quote bodies, and
/// emphasis-run contents, matching the original's word-cloud feed (not its
/// tag-structure output — `<msgstatus>`/`<at>` scaffolding is excluded).
fn collect_cloud_text(dom: &DomNode) -> Vec<String> {
    let mut out = Vec::new();
    fn walk(node: &DomNode, out: &mut Vec<String>) {
        if matches!(node.tag.as_str(), "xml" | "quote" | "quotefrom" | "i" | "b" | "s") {
            if let Some(t) = &node.text {
                if !t.trim().is_empty() {
                    out.push(t.clone());
                }
            }
        }
        for child in &node.children {
            walk(child, out);
        }
    }
    walk(dom, &mut out);
    out
}

const SECONDS_PER_DAY: i64 = 86_400;

fn record_timeline(hist: &mut WorkHistogram, ctx: &MessageContext) {
    let hour = ((ctx.timestamp.rem_euclid(SECONDS_PER_DAY)) / 3600) as u32;
    *hist
        .hours
        .entry(hour)
        .or_default()
        .entry(ctx.author.clone())
        .or_insert(0) += 1;

    let day = ctx.timestamp.div_euclid(SECONDS_PER_DAY);
    *hist
        .days
        .entry(day)
        .or_default()
        .entry(ctx.author.clone())
        .or_insert(0) += 1;

    hist.earliest_per_day
        .entry(day)
        .and_modify(|(ts, id)| {
            if ctx.timestamp < *ts {
                *ts = ctx.timestamp;
                *id = ctx.id;
            }
        })
        .or_insert((ctx.timestamp, ctx.id));
}

/// One bucket of [`finalize_day_histogram`]'s output: a span of days with
/// totals plus the earliest message seen in it.
#[derive(Debug, Clone)]
pub struct DayBin {
    pub start_day: i64,
    pub end_day: i64,
    pub total: u64,
    pub per_author: HashMap<String, u64>,
    pub earliest_message_id: Option<i64>,
}

/// Buckets `histogram.days` into `bin_count` bins spanning the full date
/// range, bin width `ceil(days / bin_count)`, matching
/// `get_collected_stats`'s day-histogram construction (default 10 bins).
pub fn finalize_day_histogram(hist: &WorkHistogram, bin_count: u32) -> Vec<DayBin> {
    if hist.days.is_empty() || bin_count == 0 {
        return Vec::new();
    }
    let min_day = *hist.days.keys().min().unwrap();
    let max_day = *hist.days.keys().max().unwrap();
    let span = (max_day - min_day + 1).max(1);
    let bin_width = ((span as f64) / (bin_count as f64)).ceil().max(1.0) as i64;

    let mut bins: Vec<DayBin> = Vec::new();
    let mut day = min_day;
    while day <= max_day {
        let end = (day + bin_width - 1).min(max_day);
        bins.push(DayBin {
            start_day: day,
            end_day: end,
            total: 0,
            per_author: HashMap::new(),
            earliest_message_id: None,
        });
        day += bin_width;
    }

    let mut bin_earliest: HashMap<usize, i64> = HashMap::new();
    for (bin_idx, bin) in bins.iter_mut().enumerate() {
        for day in bin.start_day..=bin.end_day {
            let Some(authors) = hist.days.get(&day) else { continue };
            for (author, count) in authors {
                bin.total += count;
                *bin.per_author.entry(author.clone()).or_insert(0) += count;
            }
            if let Some(&(ts, id)) = hist.earliest_per_day.get(&day) {
                let is_better = bin_earliest.get(&bin_idx).map(|&best| ts < best).unwrap_or(true);
                if is_better {
                    bin_earliest.insert(bin_idx, ts);
                    bin.earliest_message_id = Some(id);
                }
            }
        }
    }
    bins
}

/// A 24-hour activity histogram, one entry per author plus a combined total.
pub fn hour_histogram(hist: &WorkHistogram) -> HashMap<u32, HashMap<String, u64>> {
    hist.hours.clone()
}

/// Summary line items the original calls `info_items`: period, message
/// count, SMS count, call count, file count, share count, per-day rate.
#[derive(Debug, Clone)]
pub struct InfoItems {
    pub first_day: Option<i64>,
    pub last_day: Option<i64>,
    pub total_messages: u64,
    pub total_smses: u64,
    pub total_files: u64,
    pub total_shares: u64,
    pub messages_per_day: f64,
}

pub fn info_items(stats: &Stats) -> InfoItems {
    let total_messages: u64 = stats.per_author.values().map(|c| c.messages).sum();
    let total_smses: u64 = stats.per_author.values().map(|c| c.smses).sum();
    let total_files: u64 = stats.per_author.values().map(|c| c.files).sum();
    let total_shares: u64 = stats.per_author.values().map(|c| c.shares).sum();

    let first_day = stats.histogram.days.keys().min().copied();
    let last_day = stats.histogram.days.keys().max().copied();
    let days_span = match (first_day, last_day) {
        (Some(a), Some(b)) => (b - a + 1).max(1) as f64,
        _ => 1.0,
    };

    InfoItems {
        first_day,
        last_day,
        total_messages,
        total_smses,
        total_files,
        total_shares,
        messages_per_day: total_messages as f64 / days_span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::dom::make_xml;

    fn ctx(id: i64, author: &str, timestamp: i64) -> MessageContext {
        MessageContext {
            id,
            msg_type: crate::parser::message_types::MESSAGE_TYPE_MESSAGE,
            body_xml: String::new(),
            author: author.to_string(),
            timestamp,
            identities: None,
            edited_timestamp: None,
            transfers: Vec::new(),
        }
    }

    #[test]
    fn record_increments_author_message_and_char_counts() {
        let mut stats = Stats::new();
        let dom = make_xml("hello there");
        let mut sink = NullWordCloudSink;
        stats.record(&ctx(1, "alice", 0), &dom, None, &mut sink);
        stats.record(&ctx(2, "alice", 10), &dom, None, &mut sink);
        let counts = &stats.per_author["alice"];
        assert_eq!(counts.messages, 2);
        assert_eq!(counts.chars, 22);
    }

    #[test]
    fn emoticon_usage_is_tallied_per_author_per_type() {
        let mut stats = Stats::new();
        let dom = make_xml(r#"<ss type="smile">:)</ss>"#);
        let mut sink = NullWordCloudSink;
        stats.record(&ctx(1, "bob", 0), &dom, None, &mut sink);
        assert_eq!(stats.emoticons["bob"]["smile"], 1);
    }

    #[test]
    fn day_histogram_buckets_span_into_requested_bin_count() {
        let mut hist = WorkHistogram::default();
        for day in 0..20 {
            hist.days.entry(day).or_default().insert("alice".to_string(), 1);
            hist.earliest_per_day.insert(day, (day * 86_400, day));
        }
        let bins = finalize_day_histogram(&hist, 10);
        assert_eq!(bins.len(), 10);
        assert_eq!(bins.iter().map(|b| b.total).sum::<u64>(), 20);
    }
}
