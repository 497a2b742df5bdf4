use anyhow::{Context, Result};
use dvbgse::{
    gse::{FrameKind, GseFrame, Payload, ProtocolSink, SinkRegistry, PROTOCOL_IPV4, PROTOCOL_IPV6},
    DecodeOpts, Dissection,
};
use handlebars::handlebars_helper;
use serde::Serialize;
use std::{
    fs::File,
    io::{stdout, Write},
    path::Path,
};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub enum Format {
    Json,
    Text,
}

impl clap::ValueEnum for Format {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Json, Self::Text]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            Self::Json => Some(clap::builder::PossibleValue::new("json")),
            Self::Text => Some(clap::builder::PossibleValue::new("text")),
        }
    }
}

/// A named buffer to decode.
pub struct Source {
    name: String,
    data: Vec<u8>,
}

impl Source {
    pub fn new(name: String, data: Vec<u8>) -> Self {
        Self { name, data }
    }
}

/// Writes recovered IP payloads back to back to a file.
struct ExtractSink {
    file: File,
}

impl ProtocolSink for ExtractSink {
    fn consume(&mut self, protocol_type: u16, payload: &[u8]) {
        if let Err(err) = self.file.write_all(payload) {
            warn!(protocol_type, "failed to write payload: {err}");
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonRecord<'a> {
    name: &'a str,
    len: usize,
    consumed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dissection: Option<&'a Dissection>,
}

#[derive(Debug, Serialize)]
struct FrameSummary {
    offset: usize,
    len: usize,
    kind: String,
    frag_id: String,
    protocol: String,
    label: String,
    payload_len: usize,
    disposition: String,
}

impl FrameSummary {
    fn new(frame: &GseFrame) -> Self {
        let protocol = match (frame.protocol_type, frame.protocol_name()) {
            (Some(_), Some(name)) => name.to_string(),
            (Some(pt), None) => format!("0x{pt:04x}"),
            (None, _) => "-".to_string(),
        };
        FrameSummary {
            offset: frame.offset,
            len: frame.len(),
            kind: format!("{:?}", frame.kind()),
            frag_id: frame
                .frag_id
                .map_or_else(|| "-".to_string(), |id| id.to_string()),
            protocol,
            label: frame
                .label
                .map_or_else(|| "-".to_string(), |l| l.to_string()),
            payload_len: frame.payload.len(),
            disposition: match (frame.kind(), frame.disposition) {
                (FrameKind::Padding, _) => "-".to_string(),
                (_, Payload::Opaque) => "opaque".to_string(),
                (_, Payload::Dissected) => "dissected".to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct TextRecord {
    name: String,
    len: usize,
    consumed: usize,
    ma_len: usize,
    modcod: String,
    fecframe: String,
    pilot: bool,
    cni: String,
    frame_number: String,
    stream_type: String,
    input_stream: String,
    ccm: bool,
    rolloff: String,
    dfl: u16,
    crc_valid: bool,
    truncation: Option<String>,
    trailing: usize,
    frames: Vec<FrameSummary>,
}

impl TextRecord {
    fn new(name: &str, len: usize, d: &Dissection) -> Self {
        let ma = &d.mode_adaptation;
        let bb = &d.baseband;
        TextRecord {
            name: name.to_string(),
            len,
            consumed: d.consumed(),
            ma_len: ma.len(),
            modcod: format!("{} ({})", ma.modcod_name(), ma.modcod),
            fecframe: ma.fecframe_name().to_string(),
            pilot: ma.pilot,
            cni: ma.cni.map_or_else(|| "-".to_string(), |v| v.to_string()),
            frame_number: ma
                .frame_number
                .map_or_else(|| "-".to_string(), |v| v.to_string()),
            stream_type: bb.header.stream_type().to_string(),
            input_stream: bb
                .header
                .isi()
                .map_or_else(|| "single".to_string(), |isi| format!("multiple, isi={isi}")),
            ccm: bb.header.is_ccm(),
            rolloff: bb
                .header
                .rolloff()
                .map_or_else(|| "reserved".to_string(), |ro| format!("{ro:.2}")),
            dfl: bb.header.dfl,
            crc_valid: bb.crc_valid,
            truncation: bb.truncation.map(|t| {
                format!(
                    "{}: gse frame at {} declares {} bytes, {} remaining",
                    t.reason, t.offset, t.declared, t.remaining
                )
            }),
            trailing: bb.trailing.len(),
            frames: bb.frames.iter().map(FrameSummary::new).collect(),
        }
    }
}

pub fn decode(
    sources: &[Source],
    format: &Format,
    full: bool,
    extract: Option<&Path>,
) -> Result<()> {
    let mut sinks = SinkRegistry::new();
    if let Some(path) = extract {
        let file = File::create(path).with_context(|| format!("creating {path:?}"))?;
        let dup = file.try_clone().context("cloning extract file handle")?;
        sinks.register(PROTOCOL_IPV4, Box::new(ExtractSink { file }));
        sinks.register(PROTOCOL_IPV6, Box::new(ExtractSink { file: dup }));
    }
    let opts = DecodeOpts::new().with_full_dissection(full || extract.is_some());

    let mut json = Vec::default();
    let mut out = stdout();
    let hb = new_renderer()?;
    for source in sources {
        match dvbgse::decode(&source.data, &opts, &mut sinks) {
            Ok(dissection) => match format {
                Format::Json => json.push((source, Ok(dissection))),
                Format::Text => {
                    let record = TextRecord::new(&source.name, source.data.len(), &dissection);
                    let text = hb.render("decode", &record).context("rendering text")?;
                    out.write_all(text.as_bytes()).context("writing to stdout")?;
                }
            },
            Err(err) => {
                info!("{}: {err}", source.name);
                if let Format::Json = format {
                    json.push((source, Err(err)));
                }
            }
        }
    }

    if let Format::Json = format {
        let records: Vec<JsonRecord> = json
            .iter()
            .map(|(source, zult)| match zult {
                Ok(dissection) => JsonRecord {
                    name: &source.name,
                    len: source.data.len(),
                    consumed: dissection.consumed(),
                    error: None,
                    dissection: Some(dissection),
                },
                Err(err) => JsonRecord {
                    name: &source.name,
                    len: source.data.len(),
                    consumed: err.consumed(),
                    error: Some(err.to_string()),
                    dissection: None,
                },
            })
            .collect();
        serde_json::to_writer_pretty(&mut out, &records).context("serializing to json")?;
        writeln!(out).context("writing to stdout")?;
    }

    Ok(())
}

fn new_renderer() -> Result<handlebars::Handlebars<'static>> {
    handlebars_helper!(left_pad: |num: u64, v: Json| {
        let v = match v {
            serde_json::Value::String(s) => s.to_owned(),
            serde_json::Value::Null => String::new(),
            _ => v.to_string()
        };
        let num = usize::try_from(num).unwrap_or(v.len()).max(v.len());
        format!("{v:>num$}")
    });
    let mut hb = handlebars::Handlebars::new();
    hb.register_escape_fn(handlebars::no_escape);
    hb.register_helper("lpad", Box::new(left_pad));
    hb.register_template_string("decode", TEXT_TEMPLATE)
        .context("registering text template")?;
    Ok(hb)
}

const TEXT_TEMPLATE: &str = r"{{ name }} ({{ len }} bytes, {{ consumed }} consumed)
===============================================================================================
Mode Adaptation ({{ ma_len }} bytes)
    MODCOD:      {{ modcod }}
    FECFRAME:    {{ fecframe }}
    Pilots:      {{ pilot }}
    CNI:         {{ cni }}
    Frame:       {{ frame_number }}
Baseband
    Stream:      {{ stream_type }}, {{ input_stream }}
    CCM:         {{ ccm }}
    Roll-off:    {{ rolloff }}
    DFL:         {{ dfl }} bits
    CRC-8:       {{ #if crc_valid }}valid{{ else }}invalid{{ /if }}
{{ #if truncation }}    Truncated:   {{ truncation }}
{{ /if }}    Trailing:    {{ trailing }} bytes
-----------------------------------------------------------------------------------------------
  Offset     Len  Kind          FragID  Protocol  Label               Payload  Disposition
-----------------------------------------------------------------------------------------------
{{ #each frames }}{{ lpad 8 offset }}  {{ lpad 6 len }}  {{ lpad 12 kind }}  {{ lpad 6 frag_id }}  {{ lpad 8 protocol }}  {{ lpad 17 label }}  {{ lpad 7 payload_len }}  {{ disposition }}
{{/each }}
";
