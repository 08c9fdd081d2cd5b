use std::io::{stdout, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use difi::{Config, ContextRecord, ContextSnapshot, Engine, MetadataEvent, Pull, Stats, Tag};
use hifitime::Epoch;
use num_complex::Complex;
use serde::Serialize;
use tracing::debug;

use crate::Format;

const CHUNK: usize = 0xffff;

#[derive(Debug, Clone, Serialize)]
struct ContextSummary {
    kind: String,
    stream_id: u32,
    sample_rate: f64,
    bandwidth: f64,
    rf_ref_freq: f64,
    bit_depth: u8,
    record: ContextRecord,
}

impl From<&ContextSnapshot> for ContextSummary {
    fn from(snapshot: &ContextSnapshot) -> Self {
        let kind = match snapshot.record {
            ContextRecord::Compact(_) => "compact",
            ContextRecord::Full(_) => "full",
        };
        ContextSummary {
            kind: kind.to_string(),
            stream_id: snapshot.stream_id,
            sample_rate: snapshot.record.sample_rate(),
            bandwidth: snapshot.record.bandwidth(),
            rf_ref_freq: snapshot.record.rf_ref_freq(),
            bit_depth: snapshot.record.bit_depth(),
            record: snapshot.record.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct Info {
    filename: String,
    first_data_time: Option<String>,
    last_data_time: Option<String>,
    duration: Option<String>,
    stats: Stats,
    context: Option<ContextSummary>,
}

fn summarize(fpath: &Path, config: Config) -> Result<Info> {
    let reader = std::fs::File::open(fpath).context("opening input")?;
    let mut engine = Engine::<Complex<f32>>::from_reader(config, reader);
    let mut samples = vec![Complex::default(); CHUNK];
    let mut tags: Vec<Tag> = Vec::new();

    let mut first: Option<Epoch> = None;
    let mut last: Option<Epoch> = None;
    let mut context: Option<ContextSummary> = None;

    loop {
        let pull = engine
            .pull(&mut samples, &mut tags)
            .context("decoding capture")?;
        match pull {
            Pull::Idle => break,
            Pull::Again => {}
            Pull::Samples(_) => {
                let epoch = engine.latched_timestamp().epoch();
                first = first.map_or(Some(epoch), |cur| Some(cur.min(epoch)));
                last = last.map_or(Some(epoch), |cur| Some(cur.max(epoch)));
            }
        }
        for tag in tags.drain(..) {
            if let MetadataEvent::ContextSnapshot(snapshot) = &tag.event {
                context = Some(ContextSummary::from(snapshot.as_ref()));
            }
        }
    }
    // context that arrived after the last data packet was never attached
    if let Some(pending) = engine.pending_context() {
        context = Some(ContextSummary::from(pending));
    }
    debug!(stats = ?engine.stats(), "capture decoded");

    Ok(Info {
        filename: fpath.to_string_lossy().to_string(),
        first_data_time: first.map(|e| e.to_string()),
        last_data_time: last.map(|e| e.to_string()),
        duration: first.zip(last).map(|(first, last)| (last - first).to_string()),
        stats: engine.stats().clone(),
        context,
    })
}

pub fn info(fpath: &Path, config: Config, format: &Format) -> Result<()> {
    let info = summarize(fpath, config)?;

    match format {
        Format::Json => {
            serde_json::to_writer_pretty(stdout(), &info).context("serializing to json")
        }
        Format::Text => {
            let data = render_text(&info).context("serializing info")?;
            stdout()
                .write_all(data.as_bytes())
                .context("writing to stdout")
        }
    }
}

fn render_text(info: &Info) -> Result<String> {
    let mut hb = handlebars::Handlebars::new();
    hb.register_escape_fn(handlebars::no_escape);
    hb.register_template_string("info", TEXT_TEMPLATE)
        .map_err(|err| anyhow!("parsing template: {err}"))?;

    hb.render("info", &info).context("rendering text")
}

const TEXT_TEMPLATE: &str = r"{{ filename }}
===============================================================================
First:       {{ first_data_time }}
Last:        {{ last_data_time }}
Duration:    {{ duration }}
Packets:     {{ stats.packets }} ({{ stats.data_packets }} data, {{ stats.context_packets }} context, {{ stats.dropped }} dropped)
Bytes:       {{ stats.bytes }}
Samples:     {{ stats.samples }}
Missing:     {{ stats.missing }}
Anomalies:   {{ stats.sequence_anomalies }}
Static:      {{ stats.static_changes }}
-------------------------------------------------------------------------------
{{ #if context }}Context:     {{ context.kind }}
Stream:      {{ context.stream_id }}
Sample rate: {{ context.sample_rate }}
Bandwidth:   {{ context.bandwidth }}
RF ref:      {{ context.rf_ref_freq }}
Bit depth:   {{ context.bit_depth }}
{{ else }}Context:     none
{{ /if }}";
