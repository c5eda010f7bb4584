use std::{
    collections::BTreeMap,
    fs::File,
    io::{stdout, Read, Write},
    path::Path,
};

use ais::{read_sentences, DecodedMessage, Error, Header, Pipeline, PipelineStats};
use anyhow::{Context, Result};
use handlebars::{handlebars_helper, Handlebars};
use serde::Serialize;
use tracing::warn;

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

#[derive(Debug, Clone, Serialize)]
struct Entry {
    index: usize,
    sentence: String,
    header: Option<Header>,
    message: Option<DecodedMessage>,
    error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
struct Summary {
    stats: PipelineStats,
    types: BTreeMap<u8, usize>,
}

#[derive(Debug, Clone, Serialize)]
struct Decoded {
    filename: String,
    entries: Vec<Entry>,
    summary: Summary,
}

fn decode_all<R>(filename: &str, reader: R) -> Result<Decoded>
where
    R: Read + Send,
{
    let pipeline = Pipeline::new();
    let mut entries = Vec::default();
    let mut summary = Summary::default();

    for (index, zult) in read_sentences(reader).enumerate() {
        let sentence = match zult {
            Ok(sentence) => sentence,
            Err(Error::Io(err)) => return Err(err).context("reading input"),
            Err(err) => {
                warn!(index, error = %err, "skipping input");
                summary.stats.overflows += 1;
                continue;
            }
        };

        let text = sentence.to_string();
        let outcome = pipeline.process(sentence);
        summary.stats.record(&outcome);

        let entry = match outcome {
            Ok(report) => {
                let (message, error) = match report.message {
                    Ok(msg) => {
                        *summary.types.entry(msg.message_type).or_default() += 1;
                        (Some(msg), None)
                    }
                    Err(err) => (None, Some(err.to_string())),
                };
                Entry {
                    index,
                    sentence: text,
                    header: Some(report.header),
                    message,
                    error,
                }
            }
            Err(Error::Sentence(err)) if err.is_ignorable() => continue,
            Err(err) => {
                warn!(index, error = %err, "invalid sentence");
                Entry {
                    index,
                    sentence: text,
                    header: None,
                    message: None,
                    error: Some(err.to_string()),
                }
            }
        };
        entries.push(entry);
    }

    Ok(Decoded {
        filename: filename.to_string(),
        entries,
        summary,
    })
}

pub fn decode(fpath: &Path, format: &Format) -> Result<()> {
    let reader = File::open(fpath).context("opening input")?;
    let decoded = decode_all(&fpath.to_string_lossy(), reader)?;

    match format {
        Format::Json => {
            serde_json::to_writer_pretty(stdout(), &decoded).context("serializing to json")
        }
        Format::Text => {
            let data = render_text(&decoded).context("serializing decoded messages")?;
            stdout()
                .write_all(str::as_bytes(&data))
                .context("writing to stdout")
        }
    }
}

fn render_text(decoded: &Decoded) -> Result<String> {
    handlebars_helper!(left_pad: |num: u64, v: Json| {
        let v = match v {
            serde_json::Value::String(s) => s.to_owned(),
            serde_json::Value::Null => String::new(),
            _ => v.to_string()
        };
        let num = usize::try_from(num).unwrap_or_default().max(v.len());
        format!("{v:>num$}")
    });
    let mut hb = Handlebars::new();
    hb.register_escape_fn(handlebars::no_escape);
    hb.register_helper("lpad", Box::new(left_pad));
    hb.register_template_string("decoded", TEXT_TEMPLATE)
        .context("compiling template")?;

    hb.render("decoded", decoded).context("rendering text")
}

const TEXT_TEMPLATE: &str = r"{{ #each entries }}{{ index }}: {{ sentence }}
{{ #if message }}    type {{ message.message_type }} {{ message.name }}, channel {{ header.channel }}, fragment {{ header.fragment_index }}/{{ header.fragment_count }}
{{ #each message.fields }}    {{ lpad 20 name }}: {{ value }}
{{ /each }}{{ else }}    error: {{ error }}
{{ /if }}{{ /each }}
{{ filename }}
===============================================================================================
Sentences:   {{ summary.stats.sentences }}
Valid:       {{ summary.stats.valid }}
Invalid:     {{ summary.stats.invalid }}
Ignored:     {{ summary.stats.ignored }}
Decoded:     {{ summary.stats.decoded }}
Unsupported: {{ summary.stats.unsupported }}
Truncated:   {{ summary.stats.truncated }}
Types:       {{ #each summary.types }}{{ @key }}={{ this }}{{ #if @last }}{{ else }}, {{ /if }}{{ /each }}
";
