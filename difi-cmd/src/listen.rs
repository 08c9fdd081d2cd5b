use std::fs::File;
use std::io::{stdout, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use difi::{Config, ContextRecord, Engine, MetadataEvent, Pull, Tag};
use num_complex::Complex;
use tracing::{info, warn};

use crate::Format;

/// Samples requested per pull; larger than any single DIFI packet carries.
const CHUNK: usize = 0xffff;
const IDLE_WAIT: Duration = Duration::from_millis(5);

/// Write samples as interleaved little-endian f32 I/Q.
fn write_samples<W: Write>(w: &mut W, samples: &[Complex<f32>]) -> std::io::Result<()> {
    for s in samples {
        w.write_all(&s.re.to_le_bytes())?;
        w.write_all(&s.im.to_le_bytes())?;
    }
    Ok(())
}

fn describe(tag: &Tag) -> String {
    match &tag.event {
        MetadataEvent::StaticChange(bits) => {
            format!("{:>12}  static header bits changed to {bits:#05x}", tag.offset)
        }
        MetadataEvent::SequenceAnomaly(a) if a.is_initial() => {
            format!("{:>12}  stream started at packet count {}", tag.offset, a.actual)
        }
        MetadataEvent::SequenceAnomaly(a) => format!(
            "{:>12}  sequence gap: expected packet count {} got {}",
            tag.offset, a.expected, a.actual
        ),
        MetadataEvent::ContextSnapshot(s) => {
            let kind = match s.record {
                ContextRecord::Compact(_) => "compact",
                ContextRecord::Full(_) => "full",
            };
            format!(
                "{:>12}  {kind} context stream={} sample_rate={} bandwidth={} rf_ref_freq={} bit_depth={}",
                tag.offset,
                s.stream_id,
                s.record.sample_rate(),
                s.record.bandwidth(),
                s.record.rf_ref_freq(),
                s.record.bit_depth(),
            )
        }
    }
}

fn write_tag<W: Write>(w: &mut W, tag: &Tag, format: &Format) -> Result<()> {
    match format {
        Format::Json => {
            serde_json::to_writer(&mut *w, tag).context("serializing tag")?;
            writeln!(w).context("writing to stdout")
        }
        Format::Text => writeln!(w, "{}", describe(tag)).context("writing to stdout"),
    }
}

pub fn listen(config: Config, count: Option<u64>, output: Option<&Path>, format: &Format) -> Result<()> {
    let mut engine = Engine::<Complex<f32>>::new(config).context("starting receiver")?;
    let mut dest = match output {
        Some(path) => Some(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create output {path:?}"))?,
        )),
        None => None,
    };

    let mut samples = vec![Complex::default(); CHUNK];
    let mut tags: Vec<Tag> = Vec::new();
    let mut stdout = stdout().lock();
    let mut written: u64 = 0;

    loop {
        let n = match engine.pull(&mut samples, &mut tags) {
            Ok(Pull::Samples(n)) => n,
            Ok(Pull::Again) => 0,
            Ok(Pull::Idle) => {
                std::thread::sleep(IDLE_WAIT);
                0
            }
            Err(err) if err.is_fatal() => return Err(err).context("receiving stream"),
            Err(err) => {
                warn!(%err, "receive failed");
                0
            }
        };

        for tag in tags.drain(..) {
            write_tag(&mut stdout, &tag, format)?;
        }

        let n = match count {
            Some(count) => n.min(usize::try_from(count - written).unwrap_or(usize::MAX)),
            None => n,
        };
        if let Some(dest) = dest.as_mut() {
            write_samples(dest, &samples[..n]).context("writing samples")?;
        }
        written += n as u64;

        if count.is_some_and(|count| written >= count) {
            break;
        }
    }

    if let Some(mut dest) = dest {
        dest.flush().context("flushing output")?;
    }
    info!(written, stats = ?engine.stats(), "done");
    Ok(())
}
